use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use findata_market_data::{AssetCategory, Listing, Market};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    scheduler: String,
    jobs: Vec<String>,
    cache_enabled: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        scheduler: format!("{:?}", state.scheduler.state()),
        jobs: state.scheduler.jobs(),
        cache_enabled: state.cache.is_enabled(),
    })
}

#[derive(Deserialize)]
struct ListQuery {
    market: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    data: Vec<Listing>,
    count: usize,
}

async fn list_category(
    Path(category): Path<String>,
    Query(query): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ListResponse>> {
    let category: AssetCategory = category.parse()?;
    let market = query
        .market
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::parse::<Market>)
        .transpose()?;

    let service = state
        .service(category)
        .ok_or_else(|| ApiError::Internal(format!("No service for category {}", category)))?;
    let data = service.list(market).await?;
    Ok(Json(ListResponse {
        count: data.len(),
        data,
    }))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/health", get(health))
        .route("/market-data/{category}/list", get(list_category));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
