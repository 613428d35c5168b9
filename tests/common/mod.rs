use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use casebook::auth::jwt::JwtService;
use casebook::auth::password::hash_password;
use casebook::config::AppConfig;
use casebook::db::{self, PgPool};
use casebook::mail::{MailError, Mailer, OutgoingMail};
use casebook::models::NewUser;
use casebook::routes;
use casebook::state::AppState;
use casebook::storage::{LocalDiskStorage, ObjectStorage};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const TEST_MAX_FILE_SIZE: u64 = 1024;
pub const TEST_STORAGE_LIMIT: u64 = 4096;

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Rejected(503));
        }
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}

impl RecordingMailer {
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    mailer: Arc<RecordingMailer>,
    upload_dir: TempDir,
}

impl TestApp {
    /// Builds the app against `TEST_DATABASE_URL`, which must point at a
    /// disposable database: every table is truncated.
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let upload_dir = tempfile::tempdir().context("failed to create upload dir")?;
        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            session_expiry_minutes: 60,
            remember_expiry_days: 30,
            cors_allowed_origin: None,
            upload_dir: upload_dir.path().to_path_buf(),
            max_file_size: TEST_MAX_FILE_SIZE,
            storage_limit: TEST_STORAGE_LIMIT,
            admin_password: Some("Admin.Pass1".to_string()),
            mail_relay_url: None,
            mail_relay_token: None,
            mail_sender: "noreply@example.com".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage: Arc<dyn ObjectStorage> =
            Arc::new(LocalDiskStorage::new(config.upload_dir.clone()));
        let mailer = Arc::new(RecordingMailer::default());
        let mailer_for_state: Arc<dyn Mailer> = mailer.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, storage, mailer_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            mailer,
            upload_dir,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<RecordingMailer> {
        self.mailer.clone()
    }

    #[allow(dead_code)]
    #[allow(dead_code)]
    pub fn stored_path(&self, name: &str) -> std::path::PathBuf {
        self.upload_dir.path().join(name)
    }

    pub fn stored_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.upload_dir.path())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub async fn insert_user(&self, name: &str, password: &str, is_admin: bool) -> Result<i32> {
        let name = name.to_string();
        let password = password.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                name,
                email: None,
                password_hash: hash_password(&password)?,
                is_active: true,
                is_admin,
            };
            let id = diesel::insert_into(casebook::schema::users::table)
                .values(&user)
                .returning(casebook::schema::users::id)
                .get_result(conn)
                .context("failed to insert user")?;
            Ok(id)
        })
        .await
    }

    pub async fn login(&self, name: &str, password: &str) -> Result<hyper::Response<Body>> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            name: &'a str,
            password: &'a str,
        }

        self.post_json("/api/auth/login", &LoginPayload { name, password }, None)
            .await
    }

    pub async fn login_token(&self, name: &str, password: &str) -> Result<String> {
        let response = self.login(name, password).await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = body_json(response).await?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::DELETE, path, token).await
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        path: &str,
        filename: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        self.dispatch(request).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.dispatch(builder.body(Body::from(body))?).await
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.dispatch(builder.body(Body::empty())?).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE case_files, notes, cases, courts, sessions, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
