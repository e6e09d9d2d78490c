pub mod require_role;
pub mod session_auth;
