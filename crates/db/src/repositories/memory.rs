use std::collections::HashMap;

use tokio::sync::RwLock;

use tailor_core::domain::profile::{Profile, UserId};

use super::{ProfileRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Profile>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id.0).cloned())
    }

    async fn save(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.0.clone(), profile);
        Ok(())
    }
}

/// Store that fails every call, for exercising outage handling.
#[derive(Default)]
pub struct UnavailableProfileRepository;

#[async_trait::async_trait]
impl ProfileRepository for UnavailableProfileRepository {
    async fn find_by_id(&self, _id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn save(&self, _profile: Profile) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}
