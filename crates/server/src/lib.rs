//! HTTP front end for the Span compiler
//!
//! Accepts Span queries over JSON and returns the generated SQL. The server
//! never executes the SQL it produces.

pub mod error;
pub mod http;
pub mod metrics;

pub use error::{Result, ServerError};
pub use http::{create_router, AppState, CompileRequest, CompileResponse};
pub use metrics::Metrics;
