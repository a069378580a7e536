use crate::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use sea_orm::{ConnectionTrait, Statement};
use serde_json::json;
use std::sync::Arc;

/// Liveness probe; answers as long as the process is serving.
async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe; pings the ledger database and each catalog store.
async fn readiness(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let mut stores = serde_json::Map::new();
    let mut healthy = true;

    let ledger_ok = ping(&app.db).await;
    healthy &= ledger_ok;

    for handle in app.stores.in_order() {
        let ok = ping(handle.conn.as_ref()).await;
        healthy &= ok;
        stores.insert(handle.section.to_string(), json!(status_str(ok)));
    }

    Json(json!({
        "status": status_str(healthy),
        "ledger": status_str(ledger_ok),
        "stores": stores,
    }))
}

async fn ping(conn: &sea_orm::DatabaseConnection) -> bool {
    conn.execute(Statement::from_string(
        conn.get_database_backend(),
        "SELECT 1",
    ))
    .await
    .is_ok()
}

fn status_str(ok: bool) -> &'static str {
    if ok {
        "up"
    } else {
        "down"
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
}
