/*
 * Responsibility
 * - in-memory UserDirectory for router-level tests (no Postgres required)
 */
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::RepoError;
use super::{NewUser, Role, UserDirectory, UserRecord};

#[derive(Default)]
struct Inner {
    users: HashMap<i32, StoredUser>,
    roles: HashMap<i32, String>,
    next_user_id: i32,
    next_role_id: i32,
}

#[derive(Clone)]
struct StoredUser {
    record: UserRecord,
    role_id: i32,
}

#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a role, returning its id. Convenience for test setup.
    pub fn seed_role(&self, name: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        if let Some((id, _)) = inner.roles.iter().find(|(_, n)| n.as_str() == name) {
            return *id;
        }
        inner.next_role_id += 1;
        let id = inner.next_role_id;
        inner.roles.insert(id, name.to_string());
        id
    }
}

impl Inner {
    fn with_role(&self, user: &StoredUser) -> UserRecord {
        let mut record = user.record.clone();
        record.role = self
            .roles
            .get(&user.role_id)
            .cloned()
            .unwrap_or_default();
        record
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: i32) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).map(|u| inner.with_role(u)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.record.email == email)
            .map(|u| inner.with_role(u)))
    }

    async fn find_by_subject(&self, oidc_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.record.oidc_id == oidc_id)
            .map(|u| inner.with_role(u)))
    }

    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<_> = inner.users.values().map(|u| inner.with_role(u)).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        let stored = StoredUser {
            record: UserRecord {
                id,
                oidc_id: user.oidc_id,
                email: user.email,
                display_name: user.display_name,
                password_hash: user.password_hash,
                local: user.local,
                force_password_change: user.force_password_change,
                approved: user.approved,
                role: String::new(),
            },
            role_id: user.role_id,
        };
        let record = inner.with_role(&stored);
        inner.users.insert(id, stored);
        Ok(record)
    }

    async fn update_role(
        &self,
        user_id: i32,
        role_id: i32,
    ) -> Result<Option<UserRecord>, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.role_id = role_id;
        let user = user.clone();
        Ok(Some(inner.with_role(&user)))
    }

    async fn update_password(&self, user_id: i32, password_hash: &str) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.record.password_hash = Some(password_hash.to_string());
            user.record.force_password_change = false;
        }
        Ok(())
    }

    async fn set_approved(
        &self,
        user_id: i32,
        approved: bool,
    ) -> Result<Option<UserRecord>, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.record.approved = approved;
        let user = user.clone();
        Ok(Some(inner.with_role(&user)))
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .roles
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, n)| Role {
                id: *id,
                name: n.clone(),
            }))
    }

    async fn find_or_create_role(&self, name: &str) -> Result<Role, RepoError> {
        let id = self.seed_role(name);
        Ok(Role {
            id,
            name: name.to_string(),
        })
    }
}
