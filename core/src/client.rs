//! Fetch client for the employees list endpoint.
//!
//! # Design
//! `DirectoryClient` holds the configured base URL and a shared `Transport`.
//! As with a host-does-IO client, the request is built by `build_list_employees`
//! and the response interpreted by `parse_list_employees`; `fetch_employees`
//! only glues the two around a single transport call. There is no retry:
//! one call is one attempt, and every failure is terminal for it.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::response::EmployeeListResponse;

/// Fixed path of the employees list, relative to the base URL.
pub const EMPLOYEES_PATH: &str = "employees.json";

/// Client for the employee directory API.
#[derive(Clone)]
pub struct DirectoryClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl DirectoryClient {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.to_string(),
            transport,
        }
    }

    /// Compose the employees list URL.
    ///
    /// The base must be an absolute `http` or `https` URL. A missing trailing
    /// slash is tolerated so `http://host/api` and `http://host/api/` both
    /// resolve to `http://host/api/employees.json`.
    pub fn endpoint(&self) -> Result<Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(invalid("base url is empty".to_string()));
        }

        let mut base = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(EMPLOYEES_PATH).map_err(|e| invalid(e.to_string()))
    }

    pub fn build_list_employees(&self) -> Result<HttpRequest, FetchError> {
        let url = self.endpoint()?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
        })
    }

    /// Interpret a successful transport response.
    ///
    /// An empty `employees` array is a valid, empty result. Records are kept
    /// regardless of validity.
    pub fn parse_list_employees(
        &self,
        response: HttpResponse,
    ) -> Result<EmployeeListResponse, FetchError> {
        if response.body.is_empty() {
            return Err(FetchError::NoData);
        }
        let payload: Value =
            serde_json::from_slice(&response.body).map_err(FetchError::JsonParsingFailed)?;
        if !payload.is_object() {
            return Err(FetchError::InvalidResponseFormat);
        }
        Ok(EmployeeListResponse::from_value(&payload))
    }

    /// Perform one fetch attempt against the employees endpoint.
    ///
    /// Fails with `InvalidUrl` before touching the transport when the base
    /// URL is unusable.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_employees(&self) -> Result<EmployeeListResponse, FetchError> {
        let request = self.build_list_employees()?;
        debug!(url = %request.url, "requesting employee list");

        let response = self.transport.send(request).await?;
        debug!(
            status = response.status,
            bytes = response.body.len(),
            "employee list response received"
        );

        let list = self.parse_list_employees(response)?;
        debug!(records = list.len(), "employee list decoded");
        Ok(list)
    }
}

impl fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
