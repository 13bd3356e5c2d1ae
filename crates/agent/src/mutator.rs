use std::sync::Arc;

use tailor_core::domain::command::ProfileCommand;
use tailor_core::domain::profile::{Profile, UserId};
use tailor_db::repositories::{ProfileRepository, RepositoryError};

/// Applies a single command to one user's record: read current state, fall
/// back to an empty record for first-time users, mutate, write back. The
/// write happens even when the mutation was a no-op.
pub struct ProfileMutator {
    store: Arc<dyn ProfileRepository>,
}

impl ProfileMutator {
    pub fn new(store: Arc<dyn ProfileRepository>) -> Self {
        Self { store }
    }

    pub async fn apply(
        &self,
        user_id: &UserId,
        command: &ProfileCommand,
    ) -> Result<String, RepositoryError> {
        let mut profile = self
            .store
            .find_by_id(user_id)
            .await?
            .unwrap_or_else(|| Profile::empty(user_id.clone()));

        let outcome = command.apply(&mut profile);
        self.store.save(profile).await?;

        Ok(outcome.confirmation())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tailor_core::domain::command::ProfileCommand;
    use tailor_core::domain::profile::{
        ListField, ListTarget, StringField, StringTarget, UserId,
    };
    use tailor_db::repositories::{
        InMemoryProfileRepository, ProfileRepository, UnavailableProfileRepository,
    };

    use super::ProfileMutator;

    fn user() -> UserId {
        UserId("casey@example.com".to_string())
    }

    #[tokio::test]
    async fn apply_creates_the_record_lazily() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let mutator = ProfileMutator::new(store.clone());

        let confirmation = mutator
            .apply(
                &user(),
                &ProfileCommand::AddToList {
                    field: ListTarget::Known(ListField::Skills),
                    item: "Excel".to_string(),
                },
            )
            .await
            .expect("apply command");

        assert_eq!(confirmation, "Added 'Excel' to skills.");
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.skills, vec!["Excel"]);
    }

    #[tokio::test]
    async fn apply_reports_duplicate_adds_without_changing_state() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let mutator = ProfileMutator::new(store.clone());
        let command = ProfileCommand::AddToList {
            field: ListTarget::Known(ListField::Skills),
            item: "Excel".to_string(),
        };

        mutator.apply(&user(), &command).await.expect("first apply");
        let confirmation = mutator.apply(&user(), &command).await.expect("second apply");

        assert_eq!(confirmation, "'Excel' is already in skills.");
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.skills, vec!["Excel"]);
    }

    #[tokio::test]
    async fn apply_set_string_round_trips_through_the_store() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let mutator = ProfileMutator::new(store.clone());

        let confirmation = mutator
            .apply(
                &user(),
                &ProfileCommand::SetString {
                    field: StringTarget::Known(StringField::Location),
                    value: "Berlin".to_string(),
                },
            )
            .await
            .expect("apply command");

        assert_eq!(confirmation, "Set location to 'Berlin'.");
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.location, "Berlin");
    }

    #[tokio::test]
    async fn apply_propagates_store_failures() {
        let mutator = ProfileMutator::new(Arc::new(UnavailableProfileRepository));

        let result = mutator
            .apply(
                &user(),
                &ProfileCommand::AddToList {
                    field: ListTarget::Known(ListField::Skills),
                    item: "Excel".to_string(),
                },
            )
            .await;

        assert!(result.is_err());
    }
}
