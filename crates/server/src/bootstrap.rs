use std::sync::Arc;

use tailor_agent::{AgentRuntime, LlmError, OpenAiChatModel};
use tailor_core::config::{AppConfig, ConfigError, LoadOptions};
use tailor_db::repositories::{ProfileRepository, SqlProfileRepository};
use tailor_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthError, AuthVerifier};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<dyn ProfileRepository>,
    pub runtime: Arc<AgentRuntime>,
    pub verifier: AuthVerifier,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("auth verifier initialization failed: {0}")]
    Auth(#[source] AuthError),
    #[error("model client initialization failed: {0}")]
    ModelClient(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Builds every service handle the server needs, in dependency order. Any
/// failure aborts startup with a diagnostic naming the component.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let verifier = AuthVerifier::from_config(&config.auth).await.map_err(BootstrapError::Auth)?;
    info!(
        event_name = "system.bootstrap.auth_ready",
        correlation_id = "bootstrap",
        mode = ?config.auth.mode,
        "auth verifier initialized"
    );

    let model = OpenAiChatModel::new(&config.llm).map_err(BootstrapError::ModelClient)?;
    let store: Arc<dyn ProfileRepository> = Arc::new(SqlProfileRepository::new(db_pool.clone()));
    let runtime =
        Arc::new(AgentRuntime::new(Arc::new(model), store.clone(), config.llm.max_tool_rounds));
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "agent runtime initialized"
    );

    Ok(Application { config, db_pool, store, runtime, verifier })
}

#[cfg(test)]
mod tests {
    use tailor_core::config::{AuthMode, ConfigOverrides, LoadOptions};
    use tailor_core::domain::profile::{ListField, ListTarget, Profile, UserId};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_when_jwks_mode_lacks_an_issuer() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                auth_mode: Some(AuthMode::Jwks),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("auth.issuer"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_schema_and_profile_path() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'profile'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected profile table to be available after bootstrap");
        assert_eq!(table_count, 1, "bootstrap should expose the profile table");

        let user = UserId("smoke@example.com".to_string());
        let mut profile = Profile::empty(user.clone());
        profile.add_to_list(&ListTarget::Known(ListField::Skills), "Rust");
        app.store.save(profile).await.expect("save profile");

        let loaded =
            app.store.find_by_id(&user).await.expect("find profile").expect("record exists");
        assert_eq!(loaded.skills, vec!["Rust"]);

        app.db_pool.close().await;
    }

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
