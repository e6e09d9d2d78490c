/*
 * Responsibility
 * - user/role directory abstraction and record types
 * - PgDirectory is the production implementation; MemoryDirectory backs
 *   router-level tests
 */
pub mod error;
pub mod memory;
pub mod pg;

use async_trait::async_trait;

use error::RepoError;

/// A user as the rest of the application sees one: role already joined in.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i32,
    /// OIDC subject. Synthetic (`local:<uuid>`) for password-only accounts.
    pub oidc_id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub local: bool,
    pub force_password_change: bool,
    pub approved: bool,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub oidc_id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub local: bool,
    pub force_password_change: bool,
    pub approved: bool,
    pub role_id: i32,
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_id(&self, id: i32) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_subject(&self, oidc_id: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn list(&self) -> Result<Vec<UserRecord>, RepoError>;

    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError>;

    /// Returns `None` when no user with `user_id` exists.
    async fn update_role(&self, user_id: i32, role_id: i32)
    -> Result<Option<UserRecord>, RepoError>;

    /// Replaces the stored hash and clears the force-password-change flag.
    async fn update_password(&self, user_id: i32, password_hash: &str) -> Result<(), RepoError>;

    async fn set_approved(
        &self,
        user_id: i32,
        approved: bool,
    ) -> Result<Option<UserRecord>, RepoError>;

    async fn find_role(&self, name: &str) -> Result<Option<Role>, RepoError>;

    /// Lazy role creation: used by provisioning, never by the role-change API.
    async fn find_or_create_role(&self, name: &str) -> Result<Role, RepoError>;
}
