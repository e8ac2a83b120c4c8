//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::domain::User;
use quill_core::ports::{
    CategoryRepository, Clock, CommentRepository, LocationRepository, PasswordService,
    PostRepository, SystemClock, TokenService, UserRepository,
};
use quill_infra::database::{DatabaseConnections, InMemoryStore};
use quill_infra::{Argon2PasswordService, JwtTokenService};

#[cfg(feature = "postgres")]
use quill_infra::database::{
    PostgresCategoryRepository, PostgresCommentRepository, PostgresLocationRepository,
    PostgresPostRepository, PostgresUserRepository,
};

use crate::config::{AdminBootstrap, AppConfig};
use crate::middleware::error::AppResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub clock: Arc<dyn Clock>,
    pub posts_per_page: u64,
    pub db: Option<Arc<DatabaseConnections>>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone()));
        let passwords: Arc<dyn PasswordService> = Arc::new(Argon2PasswordService::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        #[cfg(feature = "postgres")]
        if let Some(db_config) = &config.database {
            match DatabaseConnections::init(db_config).await {
                Ok(connections) => {
                    let conn = connections.main.clone();
                    tracing::info!("Application state initialized (postgres)");
                    return Self {
                        users: Arc::new(PostgresUserRepository::new(conn.clone())),
                        categories: Arc::new(PostgresCategoryRepository::new(conn.clone())),
                        locations: Arc::new(PostgresLocationRepository::new(conn.clone())),
                        posts: Arc::new(PostgresPostRepository::new(conn.clone())),
                        comments: Arc::new(PostgresCommentRepository::new(conn)),
                        tokens,
                        passwords,
                        clock,
                        posts_per_page: config.posts_per_page,
                        db: Some(Arc::new(connections)),
                    };
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                }
            }
        } else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        }

        #[cfg(not(feature = "postgres"))]
        tracing::info!("Running without postgres feature - using in-memory repositories");

        tracing::info!("Application state initialized (in-memory)");
        Self::in_memory(tokens, passwords, clock, config.posts_per_page)
    }

    /// State backed by a fresh [`InMemoryStore`].
    pub fn in_memory(
        tokens: Arc<dyn TokenService>,
        passwords: Arc<dyn PasswordService>,
        clock: Arc<dyn Clock>,
        posts_per_page: u64,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            users: store.clone(),
            categories: store.clone(),
            locations: store.clone(),
            posts: store.clone(),
            comments: store,
            tokens,
            passwords,
            clock,
            posts_per_page,
            db: None,
        }
    }

    /// Create the configured administrator unless the username is taken.
    pub async fn bootstrap_admin(&self, admin: &AdminBootstrap) -> AppResult<()> {
        if self.users.find_by_username(&admin.username).await?.is_some() {
            tracing::debug!(username = %admin.username, "Administrator already exists");
            return Ok(());
        }

        let hash = self.passwords.hash(&admin.password)?;
        let user = User::new(admin.username.clone(), admin.email.clone(), hash)
            .staff()
            .created(self.clock.now());
        self.users.create(user).await?;

        tracing::info!(username = %admin.username, "Administrator account created");
        Ok(())
    }
}
