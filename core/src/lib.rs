//! Employee directory client core.
//!
//! # Overview
//! Fetches the employee list from a remote endpoint, decodes it into a
//! validated model and exposes the outcome as observable load/error/success
//! state for a presentation layer.
//!
//! # Design
//! - `types` decodes single records leniently; validity is a separate check.
//! - `response` decodes the top-level payload and keeps every record.
//! - `DirectoryClient` builds the request, hands it to an injected
//!   `Transport`, and maps failures into `FetchError`.
//! - `DirectoryCoordinator` serializes state writes and discards stale
//!   outcomes by request token.
//! - `detail` prepares a single employee for display.

pub mod client;
pub mod coordinator;
pub mod detail;
pub mod error;
pub mod http;
pub mod response;
pub mod types;

pub use client::{DirectoryClient, EMPLOYEES_PATH};
pub use coordinator::{DirectoryCoordinator, DirectoryObserver, FetchPhase, FetchState};
pub use detail::EmployeeDetail;
pub use error::{FetchError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use response::EmployeeListResponse;
pub use types::{Employee, EmployeeType};
