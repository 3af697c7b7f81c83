//! Sample entity definitions shared by the test suites.

use vault_attributes::{
    AttributeOptions, AttributeType, ConfigurationError, PolicyRegistry, ProxyOptions,
    RegistryBuilder, SerializerKind, Value,
};

/// Application name used by the fixtures.
pub const APP: &str = "dummy_app";

/// Eagerly decrypted entity type.
pub const PERSON: &str = "Person";

/// Table behind [`PERSON`].
pub const PEOPLE: &str = "people";

/// Entity type with lazy decryption.
pub const LAZY_PERSON: &str = "LazyPerson";

/// Table behind [`LAZY_PERSON`].
pub const LAZY_PEOPLE: &str = "lazy_people";

/// Key used for `credit_card`.
pub const CREDIT_CARD_KEY: &str = "people_credit_cards";

/// Key used for the `email` copy.
pub const EMAIL_COPY_KEY: &str = "people_email_v2";

/// Registry with a person entity covering every attribute option.
///
/// `Person` (`people`):
/// - `ssn`: defaults
/// - `non_ascii`: defaults
/// - `credit_card`: explicit key
/// - `details`: JSON serializer
/// - `business_card`: custom encode/decode pair
/// - `favorite_color`: custom pair that decodes absent plaintext to a default
/// - `ip_address`: IP serializer
/// - `age`: integer, `birthday`: date
/// - `email`: encrypted copy under [`EMAIL_COPY_KEY`]
/// - `driving_license_number`: convergent
/// - `secure_name`: proxied from the legacy `name` column as `name`
///
/// `LazyPerson` (`lazy_people`): `ssn` and `email`, decrypted lazily.
///
/// # Errors
///
/// Returns the first definition error; the fixtures define none.
pub fn people_registry() -> Result<PolicyRegistry, ConfigurationError> {
    let mut builder = RegistryBuilder::new(APP);

    builder
        .entity(PERSON, PEOPLE)?
        .define("ssn", AttributeOptions::new())?
        .define("non_ascii", AttributeOptions::new())?
        .define("credit_card", AttributeOptions::new().key(CREDIT_CARD_KEY))?
        .define("details", AttributeOptions::new().serializer(SerializerKind::Json))?
        .define(
            "business_card",
            AttributeOptions::new()
                .encode(|v| Ok(v.as_str().map(|s| s.chars().rev().collect())))
                .decode(|raw| Ok(Value::from(raw.map(|s| s.chars().rev().collect::<String>())))),
        )?
        .define(
            "favorite_color",
            AttributeOptions::new()
                .encode(|v| Ok(v.as_str().map(str::to_string)))
                .decode(|raw| Ok(Value::from(raw.unwrap_or("blue")))),
        )?
        .define("ip_address", AttributeOptions::new().serializer(SerializerKind::IpAddr))?
        .define("age", AttributeOptions::new().attr_type(AttributeType::Integer))?
        .define("birthday", AttributeOptions::new().attr_type(AttributeType::Date))?
        .define(
            "email",
            AttributeOptions::new().encrypted_copy("email_copy_encrypted", EMAIL_COPY_KEY),
        )?
        .define("driving_license_number", AttributeOptions::new().convergent(true))?
        .define("secure_name", AttributeOptions::new())?
        .proxy("name", "name", "secure_name", ProxyOptions::default())?;

    builder
        .entity(LAZY_PERSON, LAZY_PEOPLE)?
        .lazy_decrypt(true)
        .define("ssn", AttributeOptions::new())?
        .define("email", AttributeOptions::new())?;

    Ok(builder.build())
}
