//! Display-ready copy of an employee for a detail screen.

use url::Url;

use crate::types::Employee;

/// Fields of an `Employee` prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeDetail {
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub biography: Option<String>,
    pub team: String,
    pub employee_type: &'static str,
    pub photo_url_small: Option<Url>,
    pub photo_url_large: Option<Url>,
}

impl EmployeeDetail {
    pub fn new(employee: &Employee) -> Self {
        Self {
            full_name: employee.full_name.clone(),
            phone_number: employee.phone_number.as_deref().and_then(format_phone_number),
            email_address: non_empty(Some(employee.email_address.as_str())),
            biography: non_empty(employee.biography.as_deref()),
            team: employee.team.clone(),
            employee_type: employee.employee_type.label(),
            photo_url_small: parse_url(employee.photo_url_small.as_deref()),
            photo_url_large: parse_url(employee.photo_url_large.as_deref()),
        }
    }
}

impl From<&Employee> for EmployeeDetail {
    fn from(employee: &Employee) -> Self {
        Self::new(employee)
    }
}

/// Format North American numbers as `(555) 328-0123`, optionally prefixed
/// with `+1`. Anything else is returned trimmed but otherwise untouched.
pub fn format_phone_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let formatted = match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => trimmed.to_string(),
    };
    Some(formatted)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_url(value: Option<&str>) -> Option<Url> {
    value.and_then(|v| Url::parse(v.trim()).ok())
}
