use crate::{error::*, models::*};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

mod postgres;

pub use postgres::PostgresUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `UserAlreadyExists` on a taken email.
    async fn create_user(&self, user: &User) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Lookup by email, case-insensitive
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    /// Replace every mutable column of an existing user
    async fn update_user(&self, user: &User) -> Result<User>;
}

/// In-memory user repository for testing and development
pub struct InMemoryUserRepository {
    users: Arc<DashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        let email = user.email.to_lowercase();
        if self.users.iter().any(|entry| entry.value().email == email) {
            return Err(IdentityError::UserAlreadyExists);
        }
        let mut stored = user.clone();
        stored.email = email;
        self.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email == email)
            .map(|entry| entry.value().clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        match self.users.get_mut(&user.id) {
            Some(mut entry) => {
                *entry = user.clone();
                Ok(user.clone())
            }
            None => Err(IdentityError::UserNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: email.into(),
            phone: None,
            password_hash: "hash".into(),
            role: Role::Patient,
            is_active: false,
            is_verified: false,
            otp: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create_user(&user("Mixed@Case.com")).await.unwrap();
        assert_eq!(created.email, "mixed@case.com");

        let found = repo.find_by_email("MIXED@case.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        let dup = repo.create_user(&user("mixed@case.com")).await;
        assert!(matches!(dup, Err(IdentityError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let repo = InMemoryUserRepository::new();
        let result = repo.update_user(&user("ghost@example.com")).await;
        assert!(matches!(result, Err(IdentityError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_find_many_skips_missing() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create_user(&user("a@example.com")).await.unwrap();
        let found = repo.find_many(&[a.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
