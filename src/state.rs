use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::{
    claims::JwtKeys,
    repo::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
    services::AuthService,
};
use crate::config::AppConfig;
use crate::insight::{DisabledInsights, GeminiClient, InsightGenerator};
use crate::journal::{
    repo::{EntryStore, MemoryEntryStore, PgEntryStore},
    services::JournalService,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub journal: JournalService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (users, entries): (Arc<dyn CredentialStore>, Arc<dyn EntryStore>) =
            match &config.database_url {
                Some(url) => {
                    let db = PgPoolOptions::new()
                        .max_connections(10)
                        .connect(url)
                        .await
                        .context("connect to database")?;
                    sqlx::migrate!("./migrations")
                        .run(&db)
                        .await
                        .context("run migrations")?;
                    info!("connected to postgres");
                    (
                        Arc::new(PgCredentialStore::new(db.clone())),
                        Arc::new(PgEntryStore::new(db)),
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; using in-memory stores, data will not survive a restart");
                    (
                        Arc::new(MemoryCredentialStore::new()),
                        Arc::new(MemoryEntryStore::new()),
                    )
                }
            };

        let insights: Arc<dyn InsightGenerator> = match config.gemini.api_key {
            Some(_) => Arc::new(GeminiClient::new(&config.gemini)?),
            None => {
                warn!("GEMINI_API_KEY not set; entries will be stored without insights");
                Arc::new(DisabledInsights)
            }
        };

        Ok(Self::from_parts(&config, users, entries, insights))
    }

    pub fn from_parts(
        config: &AppConfig,
        users: Arc<dyn CredentialStore>,
        entries: Arc<dyn EntryStore>,
        insights: Arc<dyn InsightGenerator>,
    ) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            auth: AuthService::new(users, keys),
            journal: JournalService::new(entries, insights),
        }
    }

    /// In-memory state with the given insight generator.
    pub fn fake(insights: Arc<dyn InsightGenerator>) -> Self {
        Self::from_parts(
            &AppConfig::for_tests(),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryEntryStore::new()),
            insights,
        )
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for JournalService {
    fn from_ref(state: &AppState) -> Self {
        state.journal.clone()
    }
}
