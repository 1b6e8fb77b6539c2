use crate::config::AppConfig;
use crate::data::DatasetCache;
use crate::error::MapError;
use crate::filter::{filter_records, CategorySelection};
use crate::markers::{build_markers, CategoryPalette, MarkerBatch};
use crate::page::{error_page, render_page, FilterControls};
use crate::render::{render_pass, LeafletMap};
use crate::types::{Dataset, MarkerDescriptor};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "baches_session";

pub struct AppState {
    cache: Arc<std::sync::Mutex<DatasetCache>>,
    /// Filter choices per browser. Handlers hold this lock for the whole
    /// pass, so passes never overlap.
    sessions: Mutex<HashMap<Uuid, CategorySelection>>,
    pub palette: CategoryPalette,
    pub map: LeafletMap,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        Ok(Self {
            cache: Arc::new(std::sync::Mutex::new(DatasetCache::new(config.delimiter_byte()?))),
            sessions: Mutex::new(HashMap::new()),
            palette: CategoryPalette::from_config(&config.categories),
            map: LeafletMap::from_config(&config.map),
            config,
        })
    }

    /// Loads (or reuses) the dataset on the blocking pool.
    async fn dataset(&self) -> std::result::Result<Arc<Dataset>, MapError> {
        let cache = Arc::clone(&self.cache);
        let path = self.config.input.data_csv.clone();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || {
            let mut cache = cache
                .lock()
                .map_err(|_| MapError::load(&task_path, "dataset cache lock poisoned"))?;
            cache.get(&task_path)
        })
        .await
        .map_err(|e| MapError::load(&path, e))?
    }
}

/// Browser session taken from the request cookie, or a new one.
#[derive(Debug, Clone, Copy)]
struct SessionId {
    id: Uuid,
    fresh: bool,
}

impl SessionId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let existing = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value).ok());

        match existing {
            Some(id) => Self { id, fresh: false },
            None => Self { id: Uuid::new_v4(), fresh: true },
        }
    }

    fn attach(self, mut response: Response) -> Response {
        if self.fresh {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(SET_COOKIE, value);
            }
        }
        response
    }
}

/// The session's selection, with any categories new to it enabled.
fn selection_for<'a>(
    sessions: &'a mut HashMap<Uuid, CategorySelection>,
    session: SessionId,
    dataset: &Dataset,
) -> &'a mut CategorySelection {
    let selection = sessions.entry(session.id).or_insert_with(|| {
        debug!(session = %session.id, "New filter session");
        CategorySelection::default()
    });
    selection.sync(dataset.distinct_categories());
    selection
}

#[derive(Deserialize)]
pub struct FilterParams {
    category: String,
    enabled: bool,
}

#[derive(Serialize)]
pub struct MarkersResponse {
    markers: Vec<MarkerDescriptor>,
    skipped: usize,
}

#[derive(Serialize)]
pub struct CategoryStatus {
    name: String,
    enabled: bool,
    color: String,
}

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/filter", get(filter_handler))
        .route("/api/markers", get(markers_handler))
        .route("/api/categories", get(categories_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState::new(config)?);

    // Load once up front so a broken source shows up in the log immediately
    match state.dataset().await {
        Ok(dataset) => info!(records = dataset.len(), "Dataset ready"),
        Err(e) => warn!(error = %e, "Dataset unavailable"),
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

fn unavailable(err: &MapError) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
}

async fn index_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = SessionId::from_headers(&headers);
    let mut sessions = state.sessions.lock().await;

    let dataset = match state.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(error = %e, "Failed to load dataset");
            let page = (StatusCode::SERVICE_UNAVAILABLE, Html(error_page(&e))).into_response();
            return session.attach(page);
        }
    };
    let selection = selection_for(&mut sessions, session, &dataset);

    let map = render_pass(&dataset, selection, &state.palette, &state.map);
    if let Err(e) = &map {
        warn!(error = %e, "Map not rendered");
    }

    let page = render_page(
        selection,
        &state.palette,
        &state.map,
        FilterControls::Submit { action: "/filter" },
        &map,
    );
    session.attach(Html(page).into_response())
}

async fn filter_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<FilterParams>,
) -> Response {
    let session = SessionId::from_headers(&headers);
    let mut sessions = state.sessions.lock().await;

    // Categories are only known once the dataset has been seen
    match state.dataset().await {
        Ok(dataset) => {
            let selection = selection_for(&mut sessions, session, &dataset);
            if selection.update(&params.category, params.enabled) {
                info!(category = %params.category, enabled = params.enabled, "Filter changed");
            } else {
                warn!(category = %params.category, "Ignoring filter for unknown category");
            }
        }
        Err(e) => warn!(error = %e, "Failed to load dataset"),
    }

    session.attach(Redirect::to("/").into_response())
}

async fn markers_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = SessionId::from_headers(&headers);
    let mut sessions = state.sessions.lock().await;

    let dataset = match state.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => return session.attach(unavailable(&e)),
    };
    let selection = selection_for(&mut sessions, session, &dataset);

    let MarkerBatch { markers, skipped } =
        build_markers(filter_records(&dataset, selection), &state.palette);
    session.attach(Json(MarkersResponse { markers, skipped }).into_response())
}

async fn categories_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = SessionId::from_headers(&headers);
    let mut sessions = state.sessions.lock().await;

    let dataset = match state.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => return session.attach(unavailable(&e)),
    };
    let selection = selection_for(&mut sessions, session, &dataset);

    let categories: Vec<CategoryStatus> = selection
        .entries()
        .map(|(name, enabled)| CategoryStatus {
            name: name.to_string(),
            enabled,
            color: state.palette.color_for(Some(name)).to_string(),
        })
        .collect();
    session.attach(Json(categories).into_response())
}
