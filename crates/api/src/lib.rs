//! HTTP API layer for comunimapp.
//!
//! Thin axum handlers over the services in `comunimapp-core`:
//!
//! - **Endpoints**: one router per resource, nested in [`endpoints::router`]
//! - **Extractors**: authenticated user pulled from request extensions
//! - **Middleware**: bearer-token authentication
//!
//! Handlers translate HTTP shapes (query strings, multipart forms) into
//! service calls; every policy decision lives in the service layer.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
