#![forbid(unsafe_code)]

pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod services;

use crate::config::AppConfig;
use crate::db::StoreRegistry;
use crate::errors::ServiceError;
use crate::gateway::conekta::ConektaGateway;
use crate::gateway::PaymentGateway;
use crate::services::checkout::CheckoutService;
use crate::services::coordinator::MutationCoordinator;
use crate::services::customers::CustomerService;
use crate::services::ledger::LedgerService;
use crate::services::notifications::NotificationService;
use axum::{http::HeaderValue, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    /// Ledger database (orders table)
    pub db: Arc<DatabaseConnection>,
    pub stores: StoreRegistry,
    pub checkout: CheckoutService,
}

impl AppState {
    /// Connects all databases and wires the service graph.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, ServiceError> {
        let db = Arc::new(db::establish_connection(&config.database_url).await?);
        let stores = StoreRegistry::connect(&config).await?;

        let gateway: Arc<dyn PaymentGateway> = Arc::new(ConektaGateway::new(&config.gateway)?);
        Ok(Self::assemble(config, db, stores, gateway))
    }

    /// Wires the service graph from already-built parts. Tests use this to
    /// substitute the gateway and the databases.
    pub fn assemble(
        config: AppConfig,
        db: Arc<DatabaseConnection>,
        stores: StoreRegistry,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Arc<Self> {
        // Customer profiles live in the merchandise store database.
        let profile_db = stores
            .get(common::CatalogSection::Merchandise)
            .map(|h| h.conn.clone())
            .unwrap_or_else(|| db.clone());

        let checkout = CheckoutService::new(
            CustomerService::new(profile_db),
            gateway,
            MutationCoordinator::new(stores.clone()),
            LedgerService::new(db.clone()),
            NotificationService::new(config.notification_url.clone()),
            config.gateway.currency.clone(),
        );

        Arc::new(Self {
            config,
            db,
            stores,
            checkout,
        })
    }
}

/// Builds the HTTP router with tracing, CORS and a request timeout.
pub fn create_router(app: Arc<AppState>) -> Router {
    let cors = build_cors(app.config.cors_allowed_origins.as_deref());

    Router::new()
        .merge(handlers::checkout::routes())
        .merge(handlers::health::routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(app)
}

fn build_cors(allowed_origins: Option<&str>) -> CorsLayer {
    match allowed_origins {
        Some(origins) if !origins.trim().is_empty() => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| {
                    let trimmed = o.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(v) => Some(v),
                        Err(_) => {
                            warn!(origin = trimmed, "Ignoring unparseable CORS origin");
                            None
                        }
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
