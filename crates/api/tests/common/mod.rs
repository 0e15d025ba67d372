#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing;
use axum::{Json, Router};
use http_body_util::BodyExt;
use imagerelay_api::config::{ReplicateConfig, ServerConfig};
use imagerelay_api::router::build_app_router;
use imagerelay_api::state::AppState;
use imagerelay_imgbb::{ImageHost, ImgbbError};
use imagerelay_replicate::poller::PollConfig;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Bytes served by the fake upstream for `/images/out.png`.
pub const GENERATED_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nfake-generated";

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` pointing at `replicate_url`.
///
/// Polls every 10 ms with a 1 s budget so timeouts stay fast. Image hosting
/// is disabled; use [`build_test_app_with_host`] to plug in a fake.
pub fn test_config(replicate_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        replicate: ReplicateConfig {
            api_url: replicate_url.to_string(),
            api_token: None,
            model_version: Some("owner/controlnet:abc".to_string()),
            text_model_version: Some("owner/sdxl:def".to_string()),
        },
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
        },
        imgbb: None,
    }
}

/// Build the full application router (same middleware stack as production).
pub fn build_test_app(config: ServerConfig) -> Router {
    build_app_router(AppState::from_config(config, CancellationToken::new()))
}

/// Same as [`build_test_app`] with a fake image host installed.
pub fn build_test_app_with_host(config: ServerConfig, host: Arc<FakeImageHost>) -> Router {
    let state = AppState::from_config(config, CancellationToken::new()).with_image_host(host);
    build_app_router(state)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Boundary used for every multipart body built by the tests.
const BOUNDARY: &str = "----imagerelay-test-boundary";

/// A file part for [`multipart_body`].
pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

/// Encode text fields and an optional file as `multipart/form-data`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                file.field, file.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart body, optionally with an `Authorization` header.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    authorization: Option<&str>,
    body: Vec<u8>,
) -> Response<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }
    app.oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fake prediction service
// ---------------------------------------------------------------------------

/// In-process stand-in for the prediction API.
///
/// `POST /predictions` answers with `create`; each `GET /predictions/{id}`
/// pops the next entry of `polls`, repeating the last one. The string
/// `{base}` anywhere in a scripted payload is replaced with the server's
/// base URL, and a `urls.get` pointing back at the server is added when
/// the payload has none. `GET /images/out.png` serves [`GENERATED_IMAGE`].
pub struct FakeReplicate {
    base: String,
    create: Value,
    polls: Mutex<VecDeque<Value>>,
    last_poll: Mutex<Option<Value>>,
    /// Bodies received by `POST /predictions`.
    pub created: Mutex<Vec<Value>>,
    /// `Authorization` headers seen on every request.
    pub authorizations: Mutex<Vec<String>>,
    /// Number of status reads served.
    pub poll_count: Mutex<u32>,
}

impl FakeReplicate {
    pub fn polls(&self) -> u32 {
        *self.poll_count.lock().unwrap()
    }

    pub fn created_bodies(&self) -> Vec<Value> {
        self.created.lock().unwrap().clone()
    }

    pub fn seen_authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }

    fn render(&self, value: &Value) -> Value {
        let text = value.to_string().replace("{base}", &self.base);
        let mut value: Value = serde_json::from_str(&text).unwrap();
        if value.get("urls").is_none() {
            let id = value["id"].as_str().unwrap_or("p1").to_string();
            value["urls"] = serde_json::json!({
                "get": format!("{}/predictions/{id}", self.base)
            });
        }
        value
    }

    fn record_auth(&self, headers: &HeaderMap) -> Option<String> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(ref value) = auth {
            self.authorizations.lock().unwrap().push(value.clone());
        }
        auth
    }
}

/// A token the fake rejects with 401.
pub const REJECTED_TOKEN: &str = "r8_rejected";

async fn fake_create(
    State(fake): State<Arc<FakeReplicate>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = fake.record_auth(&headers);
    if auth.as_deref() == Some(format!("Bearer {REJECTED_TOKEN}").as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"detail": "Invalid token."})),
        )
            .into_response();
    }
    fake.created.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(fake.render(&fake.create))).into_response()
}

async fn fake_get(
    State(fake): State<Arc<FakeReplicate>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Json<Value> {
    fake.record_auth(&headers);
    *fake.poll_count.lock().unwrap() += 1;
    let mut last = fake.last_poll.lock().unwrap();
    if let Some(next) = fake.polls.lock().unwrap().pop_front() {
        *last = Some(next);
    }
    let payload = last.clone().unwrap_or_else(|| fake.create.clone());
    Json(fake.render(&payload))
}

async fn fake_image(Path(name): Path<String>) -> Response {
    if name == "out.png" {
        (StatusCode::OK, Bytes::from_static(GENERATED_IMAGE)).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Start a fake prediction service on an ephemeral port.
///
/// Returns the base URL (use it as `REPLICATE_API_URL`) and a handle for
/// inspecting what the relay sent.
pub async fn spawn_fake_replicate(create: Value, polls: Vec<Value>) -> (String, Arc<FakeReplicate>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let fake = Arc::new(FakeReplicate {
        base: base.clone(),
        create,
        polls: Mutex::new(polls.into()),
        last_poll: Mutex::new(None),
        created: Mutex::new(Vec::new()),
        authorizations: Mutex::new(Vec::new()),
        poll_count: Mutex::new(0),
    });

    let app = Router::new()
        .route("/predictions", routing::post(fake_create))
        .route("/predictions/{id}", routing::get(fake_get))
        .route("/images/{name}", routing::get(fake_image))
        .with_state(Arc::clone(&fake));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base, fake)
}

// ---------------------------------------------------------------------------
// Fake image host
// ---------------------------------------------------------------------------

/// Records uploads and hands back `https://i.ibb.co/fake/{filename}`.
#[derive(Default)]
pub struct FakeImageHost {
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail: bool,
}

impl FakeImageHost {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploaded(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImgbbError> {
        if self.fail {
            return Err(ImgbbError::ApiError {
                status: 400,
                body: "Invalid API v1 key.".into(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes));
        Ok(format!("https://i.ibb.co/fake/{filename}"))
    }
}
