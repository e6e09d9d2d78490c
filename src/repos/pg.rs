/*
 * Responsibility
 * - Postgres-backed UserDirectory
 * - every user query joins roles so callers always get the role name
 */
use async_trait::async_trait;
use sqlx::PgPool;

use super::error::RepoError;
use super::{NewUser, Role, UserDirectory, UserRecord};

// role_id is nullable (ON DELETE SET NULL), hence the LEFT JOIN + COALESCE.
const USER_COLUMNS: &str = "u.id, u.oidc_id, u.email, \
     COALESCE(u.display_name, '') AS display_name, u.password_hash, \
     u.local, u.force_password_change, u.approved, COALESCE(r.name, '') AS role";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    oidc_id: String,
    email: String,
    display_name: String,
    password_hash: Option<String>,
    local: bool,
    force_password_change: bool,
    approved: bool,
    role: String,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            oidc_id: r.oidc_id,
            email: r.email,
            display_name: r.display_name,
            password_hash: r.password_hash,
            local: r.local,
            force_password_change: r.force_password_change,
            approved: r.approved,
            role: r.role,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i32,
    name: String,
}

impl From<RoleRow> for Role {
    fn from(r: RoleRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
        }
    }
}

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn select_user(where_clause: &str) -> String {
    format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN roles r ON r.id = u.role_id {where_clause}"
    )
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn find_by_id(&self, id: i32) -> Result<Option<UserRecord>, RepoError> {
        let sql = select_user("WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = select_user("WHERE u.email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_subject(&self, oidc_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = select_user("WHERE u.oidc_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(oidc_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let sql = select_user("ORDER BY u.id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let sql = "INSERT INTO users \
             (oidc_id, email, display_name, password_hash, local, force_password_change, approved, role_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id";
        let (id,): (i32,) = sqlx::query_as(sql)
            .bind(&user.oidc_id)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(&user.password_hash)
            .bind(user.local)
            .bind(user.force_password_change)
            .bind(user.approved)
            .bind(user.role_id)
            .fetch_one(&self.pool)
            .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            RepoError::Integrity(format!("user {id} vanished immediately after insert"))
        })
    }

    async fn update_role(
        &self,
        user_id: i32,
        role_id: i32,
    ) -> Result<Option<UserRecord>, RepoError> {
        let result = sqlx::query("UPDATE users SET role_id = $1 WHERE id = $2")
            .bind(role_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(user_id).await
    }

    async fn update_password(&self, user_id: i32, password_hash: &str) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE users SET password_hash = $1, force_password_change = FALSE WHERE id = $2",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_approved(
        &self,
        user_id: i32,
        approved: bool,
    ) -> Result<Option<UserRecord>, RepoError> {
        let result = sqlx::query("UPDATE users SET approved = $1 WHERE id = $2")
            .bind(approved)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(user_id).await
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, RepoError> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_or_create_role(&self, name: &str) -> Result<Role, RepoError> {
        // Upsert keeps concurrent provisioning from racing on the unique name.
        let row = sqlx::query_as::<_, RoleRow>(
            "INSERT INTO roles (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}
