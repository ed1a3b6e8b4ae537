//! Employee domain model and its lenient decoder.
//!
//! # Design
//! Records arrive as untyped JSON objects. Decoding never fails: every field
//! is read by a fixed key, a missing key or a value of the wrong JSON type
//! degrades to `None` (optional fields) or an empty string (required fields),
//! and the type token falls back to `EmployeeType::Unknown`. Callers decide
//! what to do with a record by checking `Employee::is_valid`.

use serde::Serialize;
use serde_json::Value;

/// JSON keys recognized in the employees payload.
pub mod keys {
    pub const EMPLOYEES: &str = "employees";

    pub const UUID: &str = "uuid";
    pub const FULL_NAME: &str = "full_name";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const EMAIL_ADDRESS: &str = "email_address";
    pub const BIOGRAPHY: &str = "biography";
    pub const PHOTO_URL_SMALL: &str = "photo_url_small";
    pub const PHOTO_URL_LARGE: &str = "photo_url_large";
    pub const TEAM: &str = "team";
    pub const EMPLOYEE_TYPE: &str = "employee_type";
    /// Short spelling of `employee_type`, consulted only when the long key is absent.
    pub const EMPLOYEE_TYPE_ALIAS: &str = "type";
}

/// Employment classification of an employee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeType {
    FullTime,
    PartTime,
    Contractor,
    #[default]
    Unknown,
}

impl EmployeeType {
    /// Map a wire token to a type. Matching is case-sensitive; anything other
    /// than the three known tokens, including a missing token, is `Unknown`.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("FULL_TIME") => EmployeeType::FullTime,
            Some("PART_TIME") => EmployeeType::PartTime,
            Some("CONTRACTOR") => EmployeeType::Contractor,
            _ => EmployeeType::Unknown,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            EmployeeType::FullTime => "Full Time",
            EmployeeType::PartTime => "Part Time",
            EmployeeType::Contractor => "Contractor",
            EmployeeType::Unknown => "Unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EmployeeType::Unknown)
    }
}

/// A single directory entry.
///
/// Produced by `Employee::from_value`, which accepts any JSON value. Only
/// entries for which `is_valid` returns true are safe to display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Employee {
    pub uuid: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url_small: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url_large: Option<String>,
    pub team: String,
    #[serde(skip_serializing_if = "EmployeeType::is_unknown")]
    pub employee_type: EmployeeType,
}

impl Employee {
    /// Decode a record. Non-object values decode to an empty, invalid employee.
    pub fn from_value(value: &Value) -> Self {
        let type_token = string_field(value, keys::EMPLOYEE_TYPE)
            .or_else(|| string_field(value, keys::EMPLOYEE_TYPE_ALIAS));

        Self {
            uuid: required_field(value, keys::UUID),
            full_name: required_field(value, keys::FULL_NAME),
            phone_number: optional_field(value, keys::PHONE_NUMBER),
            email_address: required_field(value, keys::EMAIL_ADDRESS),
            biography: optional_field(value, keys::BIOGRAPHY),
            photo_url_small: optional_field(value, keys::PHOTO_URL_SMALL),
            photo_url_large: optional_field(value, keys::PHOTO_URL_LARGE),
            team: required_field(value, keys::TEAM),
            employee_type: EmployeeType::from_token(type_token),
        }
    }

    /// True when `uuid`, `full_name` and `email_address` are all non-empty.
    pub fn is_valid(&self) -> bool {
        !self.uuid.is_empty() && !self.full_name.is_empty() && !self.email_address.is_empty()
    }
}

/// Read `key` as a string, treating a missing key or a non-string value as absent.
fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn required_field(value: &Value, key: &str) -> String {
    string_field(value, key).unwrap_or_default().to_string()
}

fn optional_field(value: &Value, key: &str) -> Option<String> {
    string_field(value, key).map(str::to_string)
}
