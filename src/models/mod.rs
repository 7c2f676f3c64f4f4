//! Models Module
//!
//! Request and response DTOs for the ops API.

mod requests;
mod responses;

pub use requests::InvalidateRequest;
pub use responses::{HealthResponse, InvalidateResponse};
