use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::Value;
use tienda_api::{
    auth::{issue_token, Claims},
    common::{CatalogSection, PaymentMethod},
    config::{AppConfig, GatewayConfig, StoresConfig},
    create_router,
    db::{StoreHandle, StoreRegistry},
    errors::ServiceError,
    gateway::{BankTransferDetails, GatewayChargeRequest, GatewayChargeResult, PaymentGateway},
    AppState,
};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only";
pub const TEST_USER_ID: i64 = 7;

/// What the mock gateway should do on the next call.
#[derive(Debug, Clone, Copy)]
pub enum GatewayBehavior {
    Succeed,
    Timeout,
    Unavailable,
    Rejected,
}

/// Test double for the payment gateway. Counts calls and replays one fixed
/// gateway order id so duplicate-submission behavior can be exercised.
pub struct MockGateway {
    pub calls: AtomicUsize,
    behavior: Mutex<GatewayBehavior>,
    order_id: Mutex<String>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: Mutex::new(GatewayBehavior::Succeed),
            order_id: Mutex::new("ord_test_0001".to_string()),
        })
    }

    pub fn set_behavior(&self, behavior: GatewayBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_order_id(&self, id: &str) {
        *self.order_id.lock().unwrap() = id.to_string();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        request: &GatewayChargeRequest,
    ) -> Result<GatewayChargeResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            GatewayBehavior::Succeed => {
                let method = request.method;
                let bank_details = match method {
                    PaymentMethod::Spei => Some(BankTransferDetails {
                        clabe: "646180111812345678".to_string(),
                        bank: "STP".to_string(),
                    }),
                    PaymentMethod::Cash => None,
                };
                let barcode_url = match method {
                    PaymentMethod::Cash => {
                        Some("https://pagos.example.com/barcode/test.png".to_string())
                    }
                    PaymentMethod::Spei => None,
                };
                Ok(GatewayChargeResult {
                    gateway_order_id: self.order_id.lock().unwrap().clone(),
                    payment_method: method,
                    reference: "93000262700000001".to_string(),
                    expires_at: Utc::now() + ChronoDuration::hours(24),
                    bank_details,
                    barcode_url,
                })
            }
            GatewayBehavior::Timeout => Err(ServiceError::GatewayTimeout),
            GatewayBehavior::Unavailable => Err(ServiceError::GatewayUnavailable(
                "connection refused".to_string(),
            )),
            GatewayBehavior::Rejected => Err(ServiceError::GatewayRejected(
                "card_declined".to_string(),
            )),
        }
    }
}

/// Application harness backed by in-memory SQLite, one database per catalog
/// store plus the ledger.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub gateway: Arc<MockGateway>,
    token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let ledger = Arc::new(memory_db().await);
        bootstrap_ledger(&ledger).await;

        let merchandise = Arc::new(memory_db().await);
        let books = Arc::new(memory_db().await);
        let ebooks = Arc::new(memory_db().await);
        let webinars = Arc::new(memory_db().await);
        bootstrap_merchandise(&merchandise).await;
        bootstrap_books(&books).await;
        bootstrap_digital(&ebooks, "ebooks", "ebook_id").await;
        bootstrap_digital(&webinars, "webinars", "webinar_id").await;

        let registry = StoreRegistry::new([
            StoreHandle::new(CatalogSection::Merchandise, merchandise),
            StoreHandle::new(CatalogSection::Book, books),
            StoreHandle::new(CatalogSection::Ebook, ebooks),
            StoreHandle::new(CatalogSection::Webinar, webinars),
        ]);

        let gateway = MockGateway::new();
        let state = AppState::assemble(test_config(), ledger, registry, gateway.clone());
        let router = create_router(state.clone());

        let claims = Claims {
            user_id: TEST_USER_ID,
            email: Some("cliente@example.com".to_string()),
            name: Some("Cliente Prueba".to_string()),
            exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
            iat: Some(Utc::now().timestamp()),
        };
        let token = issue_token(&claims, TEST_SECRET).unwrap();

        Self {
            router,
            state,
            gateway,
            token,
        }
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.post_with_token(path, body, Some(&self.token)).await
    }

    pub async fn post_with_token(
        &self,
        path: &str,
        body: Value,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn order_count(&self) -> i64 {
        scalar(&self.state.db, "SELECT COUNT(*) AS n FROM orders").await
    }

    pub async fn order_status(&self, gateway_order_id: &str) -> Option<String> {
        let stmt = Statement::from_sql_and_values(
            self.state.db.get_database_backend(),
            "SELECT status FROM orders WHERE gateway_order_id = ?",
            [gateway_order_id.into()],
        );
        let row = self.state.db.query_one(stmt).await.unwrap()?;
        Some(row.try_get::<String>("", "status").unwrap())
    }

    pub async fn order_user_id(&self, gateway_order_id: &str) -> Option<i64> {
        let stmt = Statement::from_sql_and_values(
            self.state.db.get_database_backend(),
            "SELECT user_id FROM orders WHERE gateway_order_id = ?",
            [gateway_order_id.into()],
        );
        let row = self.state.db.query_one(stmt).await.unwrap()?;
        Some(row.try_get::<i64>("", "user_id").unwrap())
    }

    pub async fn stock(&self, section: CatalogSection, product_id: i64) -> i64 {
        let conn = self.store(section);
        let (table, id_col) = match section {
            CatalogSection::Merchandise => ("products", "product_id"),
            CatalogSection::Book => ("libros", "libro_id"),
            _ => panic!("digital sections carry no stock"),
        };
        let stmt = Statement::from_sql_and_values(
            conn.get_database_backend(),
            format!("SELECT stock AS n FROM {} WHERE {} = ?", table, id_col),
            [product_id.into()],
        );
        let row = conn.query_one(stmt).await.unwrap().unwrap();
        row.try_get::<i64>("", "n").unwrap()
    }

    pub async fn cart_item_count(&self, section: CatalogSection) -> i64 {
        let table = match section {
            CatalogSection::Merchandise => "carrito_items",
            CatalogSection::Book => "carrito_items_libros",
            CatalogSection::Ebook => "carrito_items_ebooks",
            CatalogSection::Webinar => "carrito_items_webinars",
        };
        scalar(
            self.store(section),
            &format!("SELECT COUNT(*) AS n FROM {}", table),
        )
        .await
    }

    fn store(&self, section: CatalogSection) -> &DatabaseConnection {
        self.state
            .stores
            .get(section)
            .map(|h| h.conn.as_ref())
            .expect("store connected")
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        stores: StoresConfig {
            merchandise_url: "sqlite::memory:".to_string(),
            books_url: "sqlite::memory:".to_string(),
            ebooks_url: "sqlite::memory:".to_string(),
            webinars_url: "sqlite::memory:".to_string(),
        },
        jwt_secret: TEST_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        gateway: GatewayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "key_test".to_string(),
            currency: "MXN".to_string(),
            timeout_secs: 1,
        },
        notification_url: None,
        cors_allowed_origins: None,
    }
}

/// In-memory SQLite limited to one connection so every statement sees the
/// same database.
async fn memory_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).sqlx_logging(false);
    Database::connect(opt).await.unwrap()
}

async fn exec(conn: &DatabaseConnection, sql: &str) {
    conn.execute(Statement::from_string(conn.get_database_backend(), sql))
        .await
        .unwrap();
}

async fn scalar(conn: &DatabaseConnection, sql: &str) -> i64 {
    let row = conn
        .query_one(Statement::from_string(conn.get_database_backend(), sql))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

async fn bootstrap_ledger(conn: &DatabaseConnection) {
    exec(
        conn,
        "CREATE TABLE orders (
            id TEXT PRIMARY KEY,
            gateway_order_id TEXT NOT NULL UNIQUE,
            user_id INTEGER NOT NULL,
            items_json TEXT NOT NULL,
            subtotal REAL NOT NULL,
            tax REAL NOT NULL,
            total REAL NOT NULL,
            payment_method TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
    )
    .await;
}

async fn bootstrap_merchandise(conn: &DatabaseConnection) {
    exec(
        conn,
        "CREATE TABLE products (product_id INTEGER PRIMARY KEY, stock INTEGER NOT NULL)",
    )
    .await;
    exec(
        conn,
        "CREATE TABLE carritos (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL)",
    )
    .await;
    exec(
        conn,
        "CREATE TABLE carrito_items (
            id INTEGER PRIMARY KEY,
            carrito_id INTEGER NOT NULL,
            product_id INTEGER,
            cantidad INTEGER
        )",
    )
    .await;
    exec(
        conn,
        "CREATE TABLE usuarios (
            id INTEGER PRIMARY KEY,
            email TEXT,
            nombre TEXT,
            telefono TEXT,
            calle TEXT,
            colonia TEXT,
            municipio TEXT,
            estado TEXT,
            codigo_postal TEXT
        )",
    )
    .await;

    exec(
        conn,
        "INSERT INTO usuarios (id, email, nombre, telefono, calle, colonia, municipio, estado, codigo_postal)
         VALUES (7, 'cliente@example.com', 'Cliente Prueba', '5551234567',
                 'Av. Insurgentes 100', 'Roma Norte', 'CDMX', 'CDMX', '06700')",
    )
    .await;
    exec(conn, "INSERT INTO products (product_id, stock) VALUES (1, 10)").await;
    exec(conn, "INSERT INTO products (product_id, stock) VALUES (3, 0)").await;
    exec(conn, "INSERT INTO carritos (id, user_id) VALUES (1, 7)").await;
    exec(
        conn,
        "INSERT INTO carrito_items (id, carrito_id, product_id, cantidad) VALUES (1, 1, 1, 1)",
    )
    .await;
}

async fn bootstrap_books(conn: &DatabaseConnection) {
    exec(
        conn,
        "CREATE TABLE libros (libro_id INTEGER PRIMARY KEY, stock INTEGER NOT NULL)",
    )
    .await;
    exec(
        conn,
        "CREATE TABLE carritos_libros (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL)",
    )
    .await;
    exec(
        conn,
        "CREATE TABLE carrito_items_libros (
            id INTEGER PRIMARY KEY,
            carrito_id INTEGER NOT NULL,
            libro_id INTEGER,
            cantidad INTEGER
        )",
    )
    .await;

    exec(conn, "INSERT INTO libros (libro_id, stock) VALUES (2, 5)").await;
    exec(conn, "INSERT INTO libros (libro_id, stock) VALUES (4, 0)").await;
    exec(conn, "INSERT INTO carritos_libros (id, user_id) VALUES (1, 7)").await;
    exec(
        conn,
        "INSERT INTO carrito_items_libros (id, carrito_id, libro_id, cantidad) VALUES (1, 1, 2, 1)",
    )
    .await;
}

async fn bootstrap_digital(conn: &DatabaseConnection, kind: &str, id_col: &str) {
    exec(
        conn,
        &format!("CREATE TABLE carritos_{} (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL)", kind),
    )
    .await;
    exec(
        conn,
        &format!(
            "CREATE TABLE carrito_items_{} (
                id INTEGER PRIMARY KEY,
                carrito_id INTEGER NOT NULL,
                {} INTEGER,
                cantidad INTEGER
            )",
            kind, id_col
        ),
    )
    .await;

    exec(
        conn,
        &format!("INSERT INTO carritos_{} (id, user_id) VALUES (1, 7)", kind),
    )
    .await;
    exec(
        conn,
        &format!(
            "INSERT INTO carrito_items_{} (id, carrito_id, {}, cantidad) VALUES (1, 1, 9, 1)",
            kind, id_col
        ),
    )
    .await;
}
