use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LocalLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body field stays snake_case: the frontend reads `force_password_change`.
#[derive(Debug, Serialize)]
pub struct LocalLoginResponse {
    pub message: &'static str,
    pub force_password_change: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub email: Option<String>,
    #[serde(rename = "oldPassword")]
    pub old_password: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: Option<String>,
}
