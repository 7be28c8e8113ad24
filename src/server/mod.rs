//! Inbound HTTP surface

mod client;
mod error;
mod routes;

pub use client::{ClientError, NodeClient};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{create_router, AppState, MAX_UPLOAD_BYTES};
