//! In-memory stand-in for the sm.ms v2 API.
//!
//! Serves the seven endpoints the client uses with the same envelope and
//! status conventions as the real service: bad credentials and unknown
//! hashes come back as HTTP 200 with `success: false`, a missing or unknown
//! token as 401.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-password";

const DISK_LIMIT_RAW: u64 = 5 * 1024 * 1024 * 1024;

/// Largest file the upload endpoint accepts.
pub const MAX_UPLOAD_SIZE: usize = 5 << 20;
/// Request body cap for uploads: one full-size file plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_SIZE + (64 << 10);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "RequestId")]
    pub request_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Image {
    pub file_id: u64,
    pub width: u32,
    pub height: u32,
    pub filename: String,
    pub storename: String,
    pub size: u64,
    pub path: String,
    pub hash: String,
    pub url: String,
    pub delete: String,
    pub page: String,
}

#[derive(Clone, Debug)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub token: String,
    pub role: String,
    pub group_expire: String,
}

impl Account {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            token: Uuid::new_v4().simple().to_string(),
            role: "user".to_string(),
            group_expire: "0000-00-00".to_string(),
        }
    }
}

#[derive(Default)]
pub struct Store {
    accounts: Vec<Account>,
    images: HashMap<String, Vec<Image>>,
    next_file_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

type Reply = (StatusCode, Json<Envelope>);

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Router with the demo account seeded.
pub fn app() -> Router {
    app_with_accounts(vec![Account::new(DEMO_USERNAME, DEMO_PASSWORD)])
}

pub fn app_with_accounts(accounts: Vec<Account>) -> Router {
    let db: Db = Arc::new(RwLock::new(Store {
        accounts,
        ..Store::default()
    }));
    Router::new()
        .route("/api/v2/token", post(token))
        .route(
            "/api/v2/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v2/history", get(history))
        .route("/api/v2/upload_history", get(upload_history))
        .route("/api/v2/profile", post(profile))
        .route("/api/v2/delete/{hash}", get(delete_image))
        .route("/api/v2/clear", get(clear))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn reply(status: StatusCode, success: bool, code: &str, message: &str, data: Value) -> Reply {
    (
        status,
        Json(Envelope {
            success,
            code: code.to_string(),
            message: message.to_string(),
            data,
            request_id: Uuid::new_v4().simple().to_string().to_uppercase(),
        }),
    )
}

fn ok(message: &str, data: Value) -> Reply {
    reply(StatusCode::OK, true, "success", message, data)
}

fn fail(status: StatusCode, code: &str, message: &str) -> Reply {
    reply(status, false, code, message, Value::Null)
}

/// Resolve the account behind the `Authorization` header.
fn authorize(store: &Store, headers: &HeaderMap) -> Result<String, Reply> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Basic ").unwrap_or(v))
        .unwrap_or_default();
    store
        .accounts
        .iter()
        .find(|a| !token.is_empty() && a.token == token)
        .map(|a| a.username.clone())
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "unauthorized", "Authorization failed."))
}

async fn token(State(db): State<Db>, Form(creds): Form<Credentials>) -> Reply {
    let store = db.read().await;
    match store
        .accounts
        .iter()
        .find(|a| a.username == creds.username && a.password == creds.password)
    {
        Some(account) => ok("Get API token success.", json!({ "token": account.token })),
        None => reply(
            StatusCode::OK,
            false,
            "error",
            "Username or password incorrect.",
            Value::Null,
        ),
    }
}

async fn upload(State(db): State<Db>, headers: HeaderMap, mut multipart: Multipart) -> Reply {
    let username = match authorize(&*db.read().await, &headers) {
        Ok(username) => username,
        Err(reply) => return reply,
    };

    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("smfile") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes)),
                    Err(e) => return multipart_failure(e),
                }
            }
            Ok(None) => break,
            Err(e) => return multipart_failure(e),
        }
    }
    let Some((filename, bytes)) = file else {
        return reply(StatusCode::OK, false, "no_files", "No files were uploaded.", Value::Null);
    };
    if bytes.len() > MAX_UPLOAD_SIZE {
        return too_large();
    }

    let (width, height) = png_dimensions(&bytes).unwrap_or((0, 0));
    let hash = Uuid::new_v4().simple().to_string();
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    let storename = format!("{}.{ext}", &hash[..12]);
    let path = format!("/mock/{storename}");

    let mut store = db.write().await;
    store.next_file_id += 1;
    let image = Image {
        file_id: store.next_file_id,
        width,
        height,
        filename,
        storename,
        size: bytes.len() as u64,
        url: format!("https://i.mock.test{path}"),
        path,
        delete: format!("https://sm.ms/delete/{hash}"),
        page: format!("https://sm.ms/image/{hash}"),
        hash,
    };
    info!(%username, filename = %image.filename, size = image.size, "stored upload");
    store.images.entry(username).or_default().push(image.clone());
    ok("Upload success.", json!(image))
}

fn too_large() -> Reply {
    reply(
        StatusCode::OK,
        false,
        "file_too_large",
        "File is too large, the limit is 5 MB.",
        Value::Null,
    )
}

fn multipart_failure(e: MultipartError) -> Reply {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large();
    }
    fail(StatusCode::BAD_REQUEST, "invalid_body", &e.body_text())
}

async fn history(State(db): State<Db>, headers: HeaderMap) -> Reply {
    list_images(db, headers).await
}

async fn upload_history(State(db): State<Db>, headers: HeaderMap) -> Reply {
    list_images(db, headers).await
}

async fn list_images(db: Db, headers: HeaderMap) -> Reply {
    let store = db.read().await;
    let username = match authorize(&store, &headers) {
        Ok(username) => username,
        Err(reply) => return reply,
    };
    let images = store.images.get(&username).cloned().unwrap_or_default();
    ok("Get list success.", json!(images))
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let store = db.read().await;
    let username = match authorize(&store, &headers) {
        Ok(username) => username,
        Err(reply) => return reply,
    };
    let Some(account) = store.accounts.iter().find(|a| a.username == username) else {
        return fail(StatusCode::UNAUTHORIZED, "unauthorized", "Authorization failed.");
    };
    let used: u64 = store
        .images
        .get(&username)
        .map(|images| images.iter().map(|i| i.size).sum())
        .unwrap_or(0);
    ok(
        "Get user profile success.",
        json!({
            "username": account.username,
            "email": format!("{}@mock.test", account.username),
            "role": account.role,
            "group_expire": account.group_expire,
            "email_verified": 1,
            "disk_usage": human_size(used),
            "disk_usage_raw": used,
            "disk_limit": human_size(DISK_LIMIT_RAW),
            "disk_limit_raw": DISK_LIMIT_RAW,
        }),
    )
}

async fn delete_image(
    State(db): State<Db>,
    Path(hash): Path<String>,
    headers: HeaderMap,
) -> Reply {
    let mut store = db.write().await;
    let username = match authorize(&store, &headers) {
        Ok(username) => username,
        Err(reply) => return reply,
    };
    let images = store.images.entry(username).or_default();
    match images.iter().position(|i| i.hash == hash) {
        Some(idx) => {
            let removed = images.remove(idx);
            info!(hash = %removed.hash, filename = %removed.filename, "deleted image");
            ok("File delete success.", json!([]))
        }
        None => reply(StatusCode::OK, false, "error", "File already deleted.", Value::Null),
    }
}

async fn clear(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let mut store = db.write().await;
    let username = match authorize(&store, &headers) {
        Ok(username) => username,
        Err(reply) => return reply,
    };
    store.images.remove(&username);
    ok("Clear list success.", json!([]))
}

/// Width and height from a PNG IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.len() < 24 || &bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

/// Display form used for disk usage, e.g. `"1.50 KB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
