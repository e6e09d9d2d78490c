use serde::{Deserialize, Serialize};

use crate::repos::UserRecord;

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub approved: bool,
    pub local: bool,
    pub force_password_change: bool,
}

impl From<UserRecord> for UserDto {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            role: u.role,
            approved: u.approved,
            local: u.local,
            force_password_change: u.force_password_change,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequest {
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct UserUpdateResponse {
    pub message: &'static str,
    pub user: UserDto,
}
