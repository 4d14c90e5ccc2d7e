//! In-memory object-storage service for the harness tests: the
//! container/blob wire surface the store client speaks, plus counters
//! the tests assert against.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{debug_handler, Json, Router};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Account {
    live: HashMap<String, HashSet<String>>,
    created: HashMap<String, u32>,
    deleted: HashMap<String, u32>,
    blobs_put: u64,
}

lazy_static! {
    static ref ACCOUNT: RwLock<Account> = RwLock::new(Account::default());
}

static REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Blob puts left to answer with a 500, for retry tests.
static FAIL_PUTS: AtomicU64 = AtomicU64::new(0);

pub async fn run(addr: SocketAddr) {
    let app = Router::new()
        .route("/", get(list_containers))
        .route(
            "/:container",
            put(create_container).delete(delete_container),
        )
        .route("/:container/:blob", put(put_blob));

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[debug_handler]
async fn list_containers() -> Json<Vec<String>> {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    let account = ACCOUNT.read().unwrap();
    let mut names: Vec<String> = account.live.keys().cloned().collect();
    names.sort();
    Json(names)
}

#[debug_handler]
async fn create_container(Path(container): Path<String>) -> StatusCode {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    let mut account = ACCOUNT.write().unwrap();
    if account.live.contains_key(&container) {
        return StatusCode::CONFLICT;
    }
    debug!(%container, "create container");
    account.live.insert(container.clone(), HashSet::new());
    *account.created.entry(container).or_default() += 1;
    StatusCode::CREATED
}

#[debug_handler]
async fn delete_container(Path(container): Path<String>) -> StatusCode {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    let mut account = ACCOUNT.write().unwrap();
    if account.live.remove(&container).is_none() {
        return StatusCode::NOT_FOUND;
    }
    debug!(%container, "delete container");
    *account.deleted.entry(container).or_default() += 1;
    StatusCode::ACCEPTED
}

#[debug_handler]
async fn put_blob(Path((container, blob)): Path<(String, String)>) -> StatusCode {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    if FAIL_PUTS
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut account = ACCOUNT.write().unwrap();
    let Some(blobs) = account.live.get_mut(&container) else {
        return StatusCode::NOT_FOUND;
    };
    if !blobs.insert(blob) {
        return StatusCode::CONFLICT;
    }
    account.blobs_put += 1;
    StatusCode::CREATED
}

/** Test accessors **/

pub fn reset() {
    *ACCOUNT.write().unwrap() = Account::default();
    REQUESTS.store(0, Ordering::Relaxed);
    FAIL_PUTS.store(0, Ordering::Relaxed);
}

/// Makes the next `n` blob puts answer with a 500.
pub fn fail_next_puts(n: u64) {
    FAIL_PUTS.store(n, Ordering::Relaxed);
}

/// Containers currently live on the account.
pub fn live_containers() -> Vec<String> {
    ACCOUNT.read().unwrap().live.keys().cloned().collect()
}

/// How many times each container name has been created.
pub fn created_counts() -> HashMap<String, u32> {
    ACCOUNT.read().unwrap().created.clone()
}

/// How many times each container name has been deleted.
pub fn deleted_counts() -> HashMap<String, u32> {
    ACCOUNT.read().unwrap().deleted.clone()
}

/// Total blobs accepted since the last reset.
pub fn blobs_put() -> u64 {
    ACCOUNT.read().unwrap().blobs_put
}

pub fn request_count() -> u64 {
    REQUESTS.load(Ordering::Relaxed)
}
