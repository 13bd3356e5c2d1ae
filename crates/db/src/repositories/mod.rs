use async_trait::async_trait;
use thiserror::Error;

use tailor_core::domain::profile::{Profile, UserId};

pub mod memory;
pub mod profile;

pub use memory::{InMemoryProfileRepository, UnavailableProfileRepository};
pub use profile::SqlProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError>;
    async fn save(&self, profile: Profile) -> Result<(), RepositoryError>;
}
