//! drafter-da library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod analysis;
pub mod api;
pub mod assembler;
pub mod cache;
pub mod error;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod queue;
pub mod sessions;
pub mod tempfiles;
pub mod thumbnail;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::analysis::AiClient;
use crate::cache::{CacheStore, MemoryCache};
use crate::parsers::ParserDispatch;
use crate::queue::TaskQueue;
use crate::sessions::{MemorySessionStore, SessionStore};
use crate::tempfiles::TempResourceManager;
use crate::validators::FormatValidator;
use drafter_common::config::DaConfig;
use drafter_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service configuration
    pub config: Arc<DaConfig>,
    /// Injectable session store **[DA-WF-030]**
    pub sessions: Arc<dyn SessionStore>,
    /// Bounded task queue for the analyze endpoint **[DA-QUE-010]**
    pub queue: TaskQueue,
    /// Result cache collaborator **[DA-EXT-010]**
    pub cache: Arc<dyn CacheStore>,
    /// Format-specific extraction routing **[DA-PAR-010]**
    pub dispatch: Arc<ParserDispatch>,
    /// AI insight collaborator, when configured **[DA-INT-020]**
    pub ai: Option<Arc<AiClient>>,
    /// Transient upload storage **[DA-TMP-010]**
    pub temp: TempResourceManager,
    /// Upload signature validation **[DA-VAL-010]**
    pub validator: FormatValidator,
    /// Event bus for SSE broadcasting **[DA-MS-010]**
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire up all collaborators from configuration
    pub fn from_config(config: DaConfig) -> ApiResult<Self> {
        let temp = TempResourceManager::new(config.temp_dir.clone())?;
        let queue = TaskQueue::new(
            config.queue.concurrency,
            Duration::from_secs(config.queue.timeout_secs),
        );
        let dispatch = Arc::new(ParserDispatch::from_config(&config));
        let ai = AiClient::from_config(&config.ai).map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(MemorySessionStore::new()),
            queue,
            cache: Arc::new(MemoryCache::new()),
            dispatch,
            ai,
            temp,
            validator: FormatValidator::new(),
            event_bus: EventBus::new(100),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }
}

/// Build application router
///
/// The transport body cap follows `max_upload_bytes` (plus headroom for
/// multipart framing) so the handler's own size check is what rejects an
/// oversize file, not axum's 2MB default limit.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::get;

    let body_limit = state.config.max_upload_bytes as usize + 64 * 1024;

    Router::new()
        .merge(api::analyze_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
