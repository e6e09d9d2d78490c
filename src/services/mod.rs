pub mod oidc;
pub mod password;
pub mod session;
pub mod store;
