//! Address validation
//!
//! `validate` is a pure function over a candidate address and the country
//! registry. It reports one error per failing field, in field order.

use crate::{country, AddressFields, AddressInput};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum length of address lines and city, in characters
pub const MAX_LINE_LENGTH: usize = 50;

/// Maximum length of a zip code, in characters
pub const MAX_ZIP_LENGTH: usize = 10;

/// Address fields subject to validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Country,
    AddressLineOne,
    AddressLineTwo,
    City,
    ZipCode,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Country => "country",
            Field::AddressLineOne => "address_line_one",
            Field::AddressLineTwo => "address_line_two",
            Field::City => "city",
            Field::ZipCode => "zip_code",
        }
    }

    /// Maximum accepted length for this field
    pub fn max_length(&self) -> usize {
        match self {
            Field::Country => 2,
            Field::ZipCode => MAX_ZIP_LENGTH,
            _ => MAX_LINE_LENGTH,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Country is not valid")]
    InvalidCountry,

    #[error("{}", too_long(.0))]
    FieldTooLong(Field),

    #[error("This field is required.")]
    MissingField(Field),
}

impl ValidationError {
    /// The field this error is reported against
    pub fn field(&self) -> Field {
        match self {
            ValidationError::InvalidCountry => Field::Country,
            ValidationError::FieldTooLong(field) | ValidationError::MissingField(field) => *field,
        }
    }
}

fn too_long(field: &Field) -> String {
    match field {
        Field::ZipCode => format!("Zip code can be up to {MAX_ZIP_LENGTH} characters long"),
        _ => format!("{} is too long", describe(field)),
    }
}

fn describe(field: &Field) -> &'static str {
    match field {
        Field::Country => "Country",
        Field::AddressLineOne => "Address line one",
        Field::AddressLineTwo => "Address line two",
        Field::City => "City",
        Field::ZipCode => "Zip code",
    }
}

/// All validation failures for one candidate address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summary(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

fn summary(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {e}", e.field()))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn first(&self) -> Option<&ValidationError> {
        self.0.first()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    /// Messages grouped by field name, for API responses
    pub fn by_field(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in &self.0 {
            map.entry(error.field().as_str())
                .or_default()
                .push(error.to_string());
        }
        map
    }
}

/// A candidate address that passed validation
///
/// Only `validate` constructs this type, so holding one proves the fields
/// satisfy every field-level rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress(AddressFields);

impl ValidatedAddress {
    pub fn fields(&self) -> &AddressFields {
        &self.0
    }

    pub fn into_fields(self) -> AddressFields {
        self.0
    }
}

/// Validate a candidate address
pub fn validate(candidate: &AddressInput) -> Result<ValidatedAddress, ValidationErrors> {
    let mut errors = Vec::new();

    let country = required(&candidate.country, Field::Country, &mut errors).and_then(|code| {
        match country::lookup(code) {
            Some(canonical) => Some(canonical.to_string()),
            None => {
                errors.push(ValidationError::InvalidCountry);
                None
            }
        }
    });
    let line_one = required(&candidate.address_line_one, Field::AddressLineOne, &mut errors)
        .and_then(|v| bounded(v, Field::AddressLineOne, &mut errors));
    let line_two = optional(&candidate.address_line_two)
        .and_then(|v| bounded(v, Field::AddressLineTwo, &mut errors));
    let city = required(&candidate.city, Field::City, &mut errors)
        .and_then(|v| bounded(v, Field::City, &mut errors));
    let zip_code = required(&candidate.zip_code, Field::ZipCode, &mut errors)
        .and_then(|v| bounded(v, Field::ZipCode, &mut errors));

    match (country, line_one, city, zip_code) {
        (Some(country), Some(address_line_one), Some(city), Some(zip_code)) if errors.is_empty() => {
            Ok(ValidatedAddress(AddressFields {
                country,
                address_line_one,
                address_line_two: line_two,
                city,
                zip_code,
            }))
        }
        _ => Err(ValidationErrors(errors)),
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: Field,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a str> {
    match optional(value) {
        Some(v) => Some(v),
        None => {
            errors.push(ValidationError::MissingField(field));
            None
        }
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn bounded(value: &str, field: Field, errors: &mut Vec<ValidationError>) -> Option<String> {
    if value.chars().count() > field.max_length() {
        errors.push(ValidationError::FieldTooLong(field));
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> AddressInput {
        AddressInput::new("US", "1 Testerson Street", "Bean City", "TE1 1ST").with_line_two("Test Town")
    }

    #[test]
    fn test_valid_address() {
        let validated = validate(&sample()).unwrap();
        let fields = validated.fields();
        assert_eq!(fields.country, "US");
        assert_eq!(fields.address_line_one, "1 Testerson Street");
        assert_eq!(fields.address_line_two.as_deref(), Some("Test Town"));
        assert_eq!(fields.city, "Bean City");
        assert_eq!(fields.zip_code, "TE1 1ST");
    }

    #[test]
    fn test_country_codes() {
        for code in ["US", "GB", "gb"] {
            let input = AddressInput {
                country: Some(code.to_string()),
                ..sample()
            };
            assert!(validate(&input).is_ok(), "{code} should be valid");
        }

        let input = AddressInput {
            country: Some("JA".to_string()),
            ..sample()
        };
        let errors = validate(&input).unwrap_err();
        assert_eq!(errors.errors(), &[ValidationError::InvalidCountry]);
    }

    #[test]
    fn test_country_is_normalised() {
        let input = AddressInput {
            country: Some(" gb ".to_string()),
            ..sample()
        };
        assert_eq!(validate(&input).unwrap().fields().country, "GB");
    }

    #[test]
    fn test_missing_required_fields() {
        let errors = validate(&AddressInput::default()).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[
                ValidationError::MissingField(Field::Country),
                ValidationError::MissingField(Field::AddressLineOne),
                ValidationError::MissingField(Field::City),
                ValidationError::MissingField(Field::ZipCode),
            ]
        );
    }

    #[test]
    fn test_blank_is_missing() {
        let input = AddressInput {
            city: Some("   ".to_string()),
            ..sample()
        };
        let errors = validate(&input).unwrap_err();
        assert_eq!(errors.errors(), &[ValidationError::MissingField(Field::City)]);
    }

    #[test]
    fn test_line_two_optional() {
        let mut input = sample();
        input.address_line_two = None;
        assert_eq!(validate(&input).unwrap().fields().address_line_two, None);

        input.address_line_two = Some(String::new());
        assert_eq!(validate(&input).unwrap().fields().address_line_two, None);
    }

    #[test]
    fn test_too_long_fields() {
        let input = AddressInput {
            address_line_one: Some("a".repeat(51)),
            address_line_two: Some("b".repeat(51)),
            city: Some("c".repeat(51)),
            zip_code: Some("1".repeat(11)),
            ..sample()
        };
        let errors = validate(&input).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[
                ValidationError::FieldTooLong(Field::AddressLineOne),
                ValidationError::FieldTooLong(Field::AddressLineTwo),
                ValidationError::FieldTooLong(Field::City),
                ValidationError::FieldTooLong(Field::ZipCode),
            ]
        );
    }

    #[test]
    fn test_length_counts_characters() {
        let input = AddressInput {
            city: Some("é".repeat(50)),
            ..sample()
        };
        assert!(validate(&input).is_ok());
    }

    #[test]
    fn test_messages_by_field() {
        let input = AddressInput {
            country: Some("JA".to_string()),
            zip_code: Some("1".repeat(11)),
            ..sample()
        };
        let errors = validate(&input).unwrap_err();
        let map = errors.by_field();
        assert_eq!(map["country"], vec!["Country is not valid".to_string()]);
        assert_eq!(
            map["zip_code"],
            vec!["Zip code can be up to 10 characters long".to_string()]
        );
    }

    proptest! {
        #[test]
        fn prop_zip_code_length_boundary(len in 1usize..30) {
            let input = AddressInput {
                zip_code: Some("9".repeat(len)),
                ..sample()
            };
            let result = validate(&input);
            if len <= MAX_ZIP_LENGTH {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result
                    .unwrap_err()
                    .contains(&ValidationError::FieldTooLong(Field::ZipCode)));
            }
        }

        #[test]
        fn prop_line_one_length_boundary(len in 1usize..120) {
            let input = AddressInput {
                address_line_one: Some("x".repeat(len)),
                ..sample()
            };
            prop_assert_eq!(validate(&input).is_ok(), len <= MAX_LINE_LENGTH);
        }
    }
}
