#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value;
use sobuy_api::{
    auth,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{bkash_number, coupon, delivery_option, otp_token, product, user, UserRole},
    events::{self, EventContext, EventSender},
    handlers::AppServices,
    mailer::NoopMailer,
    services::{
        bkash::CreateBkashNumberInput, catalog::CreateProductInput, coupons::CreateCouponInput,
        delivery::CreateDeliveryOptionInput,
    },
    session::{InMemorySessionStore, SESSION_ID_HEADER},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Password every seeded account gets, so login tests have a known
/// credential to present.
pub const SEED_PASSWORD: &str = "correct horse battery staple";

const TEST_JWT_SECRET: &str = "g7kP2mXqR9sT4vWyBzD6fHjL8nQ1cE5aU3iO0pY7rK2tM9xS4wV6bN8dF1hJ3lZ5";

/// Harness that spins up the full application over an in-memory SQLite
/// database, an in-memory session store and a no-op mailer. Each
/// TestApp is fully isolated; nothing external is required.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub admin: user::Model,
    pub customer: user::Model,
    admin_token: String,
    customer_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with a fresh, migrated database
    /// and one seeded admin plus one seeded customer account.
    pub async fn new() -> Self {
        let config = Arc::new(AppConfig::new(
            "sqlite::memory:".to_string(),
            None,
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "development".to_string(),
        ));

        // A single connection keeps every query on the same in-memory
        // database; a pool of them would each see an empty schema.
        let db_cfg = DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("create test database");
        db::run_migrations(&pool)
            .await
            .expect("run migrations in tests");
        let db_arc = Arc::new(pool);

        let sessions = Arc::new(InMemorySessionStore::new());
        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            EventContext {
                db: db_arc.clone(),
                mailer: Arc::new(NoopMailer),
                order_recipients: vec!["office@sobuy.example".to_string()],
            },
        ));

        let admin = seed_user(&db_arc, UserRole::Admin, "admin", "admin@sobuy.example").await;
        let customer = seed_user(&db_arc, UserRole::Customer, "rahim", "rahim@example.com").await;

        let admin_token = auth::issue_token(&admin, &config.jwt_secret, config.jwt_expiration_secs)
            .expect("issue admin token");
        let customer_token =
            auth::issue_token(&customer, &config.jwt_secret, config.jwt_expiration_secs)
                .expect("issue customer token");

        let services = AppServices::new(
            db_arc.clone(),
            config.clone(),
            sessions,
            event_sender,
        );
        let state = Arc::new(AppState {
            db: db_arc,
            config,
            services,
        });
        let router = sobuy_api::app(state.clone());

        Self {
            router,
            state,
            admin,
            customer,
            admin_token,
            customer_token,
            _event_task: event_task,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn customer_token(&self) -> &str {
        &self.customer_token
    }

    /// Fresh opaque session id, the way a browser would mint one.
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    /// Same, with an x-session-id header attached.
    pub async fn request_with_session(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        session_id: &str,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[(SESSION_ID_HEADER, session_id)])
            .await
    }

    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.admin_token.as_str()))
            .await
    }

    pub async fn request_as_customer(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.customer_token.as_str()))
            .await
    }

    async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // ==================== Seed Helpers ====================

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        colors: Option<Vec<&str>>,
    ) -> product::Model {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: Some(format!("{} seeded for tests", name)),
                price,
                stock: Some(25),
                colors: colors.map(|c| c.into_iter().map(str::to_string).collect()),
                status: None,
            })
            .await
            .expect("seed product")
    }

    pub async fn seed_delivery_option(
        &self,
        key: &str,
        label: &str,
        amount: Decimal,
    ) -> delivery_option::Model {
        self.state
            .services
            .delivery
            .create_option(CreateDeliveryOptionInput {
                key: key.to_string(),
                label: label.to_string(),
                amount,
                position: None,
            })
            .await
            .expect("seed delivery option")
    }

    pub async fn seed_coupon(&self, input: CreateCouponInput) -> coupon::Model {
        self.state
            .services
            .coupons
            .create_coupon(input)
            .await
            .expect("seed coupon")
    }

    /// Register a bKash receiving number and make it the active one.
    pub async fn seed_active_bkash_number(&self, number: &str) -> bkash_number::Model {
        let created = self
            .state
            .services
            .bkash
            .create_number(CreateBkashNumberInput {
                number: number.to_string(),
            })
            .await
            .expect("seed bkash number");
        self.state
            .services
            .bkash
            .activate_number(created.id)
            .await
            .expect("activate bkash number")
    }

    /// The newest verification code issued for an email, read straight
    /// from the otp_tokens table the way the mail would carry it.
    pub async fn latest_otp_code(&self, email: &str) -> String {
        otp_token::Entity::find()
            .filter(otp_token::Column::Email.eq(email.to_lowercase()))
            .order_by_desc(otp_token::Column::CreatedAt)
            .one(&*self.state.db)
            .await
            .expect("query otp tokens")
            .expect("an otp token for the email")
            .code
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Simple percent-off coupon with no caps, active, never expiring.
pub fn percent_coupon(code: &str, percent: Decimal) -> CreateCouponInput {
    CreateCouponInput {
        code: code.to_string(),
        discount_percent: percent,
        max_discount_amount: None,
        max_uses_per_user: None,
        max_total_uses: None,
        is_active: Some(true),
        expires_at: None,
    }
}

async fn seed_user(
    db: &Arc<sea_orm::DatabaseConnection>,
    role: UserRole,
    username: &str,
    email: &str,
) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(auth::hash_password(SEED_PASSWORD).expect("hash seed password")),
        role: Set(role),
        phone: Set(None),
        address: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&**db)
    .await
    .expect("seed user")
}
