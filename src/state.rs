use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::password::{Argon2Hasher, PasswordHasher};
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::pages::{HtmlPages, PageRenderer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub pages: Arc<dyn PageRenderer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = crate::db::connect(&config.database_url).await?;
        crate::db::init_schema(&db).await?;
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher);
        let auth = AuthService::new(db.clone(), hasher);
        let pages: Arc<dyn PageRenderer> = Arc::new(HtmlPages);
        Self {
            db,
            config,
            auth,
            pages,
        }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        let db = crate::db::test_pool().await;
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 0,
            session_ttl_minutes: 60,
        });
        Self::from_parts(db, config)
    }
}
