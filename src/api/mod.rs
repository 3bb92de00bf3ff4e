mod routes;
mod types;

pub use routes::router;
pub use types::{ChatRequest, ChatResponse, DebugResponse, StatusResponse};
