//! Audio forwarding HTTP service
//!
//! A thin REST surface in front of the hosted speech API:
//! - POST /transcribe - Validate a multipart audio upload and forward it
//! - GET /transcribe - Capability probe (formats, size cap, model)
//! - GET /health - Health check
//!
//! Handlers validate and shape responses; transcription itself always
//! happens upstream.

mod handlers;
mod routes;
mod state;

pub use handlers::{CapabilitiesResponse, ErrorResponse, TranscribeResponse};
pub use routes::create_router;
pub use state::AppState;
