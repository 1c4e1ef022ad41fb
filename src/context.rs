/// Application context and dependency injection
use crate::{
    auth::{AuthResolver, JwtAuthResolver},
    config::RegistryConfig,
    db,
    did::{DidRegistry, DidService},
    error::RegistryResult,
    notify::{FanoutNotifier, Notifier, PushNotifier, SocketHub},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<RegistryConfig>,
    pub db: SqlitePool,
    pub registry: DidRegistry,
    pub service: DidService,
    pub auth: Arc<dyn AuthResolver>,
    // Live subscribers attach here
    pub socket_hub: SocketHub,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: RegistryConfig) -> RegistryResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directory if it doesn't exist
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.database, options).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Self::with_pool(config, pool)
    }

    /// Assemble the context around an existing, migrated pool
    pub fn with_pool(config: RegistryConfig, pool: SqlitePool) -> RegistryResult<Self> {
        let socket_hub = SocketHub::new(config.notifications.socket_buffer);

        let mut channels: Vec<Arc<dyn Notifier>> = vec![Arc::new(socket_hub.clone()) as Arc<dyn Notifier>];
        if let Some(url) = &config.notifications.push_url {
            tracing::info!("Push notifications enabled via {}", url);
            channels.push(Arc::new(PushNotifier::new(
                url.clone(),
                config.notifications.push_api_key.clone(),
            )?));
        } else {
            tracing::info!("Push notifications disabled - socket channel only");
        }
        let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(channels));

        let registry = DidRegistry::new(pool.clone());
        let service = DidService::new(registry.clone(), notifier);
        let auth: Arc<dyn AuthResolver> =
            Arc::new(JwtAuthResolver::new(&config.authentication.jwt_secret));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            registry,
            service,
            auth,
            socket_hub,
        })
    }

    /// Close the storage pool
    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
