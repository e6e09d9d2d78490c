pub mod auth;
pub mod users;

use serde::Serialize;

/// Generic `{message}` success body, mirroring the error body shape.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
