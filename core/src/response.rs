//! Top-level list payload.

use serde_json::Value;

use crate::types::{keys, Employee};

/// The decoded employees payload, in arrival order.
///
/// Holds every decoded record, valid or not. Filtering is left to the
/// consumer; see `into_valid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeListResponse {
    pub employees: Vec<Employee>,
}

impl EmployeeListResponse {
    /// Decode the `employees` array of a top-level record.
    ///
    /// A missing key or a non-array value yields an empty list. Each element
    /// is decoded with `Employee::from_value`, so malformed elements become
    /// invalid employees instead of aborting the parse.
    pub fn from_value(value: &Value) -> Self {
        let employees = value
            .get(keys::EMPLOYEES)
            .and_then(Value::as_array)
            .map(|records| records.iter().map(Employee::from_value).collect())
            .unwrap_or_default();
        Self { employees }
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    /// Consume the response, keeping only entries that pass `Employee::is_valid`.
    pub fn into_valid(self) -> Vec<Employee> {
        self.employees.into_iter().filter(Employee::is_valid).collect()
    }
}
