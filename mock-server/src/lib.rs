use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Employee {
    pub uuid: Uuid,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url_small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url_large: Option<String>,
    pub team: String,
    pub employee_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmployeeList {
    pub employees: Vec<Employee>,
}

pub type Roster = Arc<Vec<Employee>>;

/// A small fixed roster with fresh ids. Every entry is complete and valid.
pub fn sample_roster() -> Vec<Employee> {
    vec![
        Employee {
            uuid: Uuid::new_v4(),
            full_name: "Justine Mason".to_string(),
            phone_number: Some("5553280123".to_string()),
            email_address: "jmason.demo@example.com".to_string(),
            biography: Some("Engineer on the Point of Sale team.".to_string()),
            photo_url_small: Some("https://example.com/photos/jmason/small.jpg".to_string()),
            photo_url_large: Some("https://example.com/photos/jmason/large.jpg".to_string()),
            team: "Point of Sale".to_string(),
            employee_type: "FULL_TIME".to_string(),
        },
        Employee {
            uuid: Uuid::new_v4(),
            full_name: "Camille Rogers".to_string(),
            phone_number: Some("5558531970".to_string()),
            email_address: "crogers.demo@example.com".to_string(),
            biography: None,
            photo_url_small: None,
            photo_url_large: None,
            team: "Public Web & Marketing".to_string(),
            employee_type: "PART_TIME".to_string(),
        },
        Employee {
            uuid: Uuid::new_v4(),
            full_name: "Richard Stein".to_string(),
            phone_number: None,
            email_address: "rstein.demo@example.com".to_string(),
            biography: Some("Contract designer.".to_string()),
            photo_url_small: None,
            photo_url_large: None,
            team: "Payments".to_string(),
            employee_type: "CONTRACTOR".to_string(),
        },
    ]
}

pub fn app() -> Router {
    app_with_roster(sample_roster())
}

/// Routes the employees list under one base path per payload shape, so a
/// client picks the scenario through its base URL alone.
pub fn app_with_roster(roster: Vec<Employee>) -> Router {
    let roster: Roster = Arc::new(roster);
    Router::new()
        .route("/employees.json", get(list_employees))
        .route("/empty/employees.json", get(list_empty))
        .route("/malformed/employees.json", get(list_malformed))
        .route("/bare-array/employees.json", get(list_bare_array))
        .route("/broken/employees.json", get(broken_body))
        .route("/no-content/employees.json", get(no_content))
        .route("/unavailable/employees.json", get(unavailable))
        .with_state(roster)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_employees(State(roster): State<Roster>) -> Json<EmployeeList> {
    debug!(count = roster.len(), "serving employee roster");
    Json(EmployeeList {
        employees: roster.as_ref().clone(),
    })
}

async fn list_empty() -> Json<EmployeeList> {
    Json(EmployeeList::default())
}

/// The roster plus records a strict decoder would choke on: one without an
/// email address, one that is not an object, and one with an unknown type.
async fn list_malformed(State(roster): State<Roster>) -> Result<Json<Value>, StatusCode> {
    let mut records = match serde_json::to_value(roster.as_ref()) {
        Ok(Value::Array(records)) => records,
        _ => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };
    records.push(json!({
        "uuid": Uuid::new_v4().to_string(),
        "full_name": "Missing Email",
        "team": "Core",
        "employee_type": "FULL_TIME"
    }));
    records.push(json!("not an employee"));
    records.push(json!({
        "uuid": Uuid::new_v4().to_string(),
        "full_name": "Odd Type",
        "email_address": "odd.demo@example.com",
        "employee_type": "INTERN"
    }));
    Ok(Json(json!({ "employees": records })))
}

async fn list_bare_array(State(roster): State<Roster>) -> Json<Vec<Employee>> {
    Json(roster.as_ref().clone())
}

async fn broken_body() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>Service maintenance</body></html>",
    )
}

async fn no_content() -> impl IntoResponse {
    (StatusCode::OK, "")
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}
