use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{CatalogExtra, UserConfig},
    routes::AppState,
};

/// Handler for `/{config}/catalog/{type}/{id}.json`
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((config, media_type, file)): Path<(String, String, String)>,
    Query(query): Query<CatalogExtra>,
) -> AppResult<Response> {
    let catalog_id = file.strip_suffix(".json").unwrap_or(&file);
    serve_catalog(
        &state,
        &request_id,
        &config,
        &media_type,
        catalog_id,
        query,
    )
    .await
}

/// Handler for `/{config}/catalog/{type}/{id}/{extra}.json`
pub async fn catalog_with_extra(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((config, media_type, catalog_id, extra)): Path<(String, String, String, String)>,
    Query(query): Query<CatalogExtra>,
) -> AppResult<Response> {
    let extra = CatalogExtra::from_path_segment(&extra).merged_over(query);
    serve_catalog(
        &state,
        &request_id,
        &config,
        &media_type,
        &catalog_id,
        extra,
    )
    .await
}

async fn serve_catalog(
    state: &AppState,
    request_id: &RequestId,
    config: &str,
    media_type: &str,
    catalog_id: &str,
    extra: CatalogExtra,
) -> AppResult<Response> {
    let credentials = UserConfig::from_path_segment(config)?;

    tracing::info!(
        request_id = %request_id,
        media_type = %media_type,
        catalog_id = %catalog_id,
        skip = extra.skip(),
        genre = ?extra.genre,
        "Processing catalog request"
    );

    let response = state
        .recommender
        .catalog(media_type, catalog_id, &extra, &credentials)
        .await;

    tracing::info!(
        request_id = %request_id,
        metas = response.metas.len(),
        "Catalog request completed"
    );

    let cache_control = response
        .cache_control()
        .and_then(|value| HeaderValue::from_str(&value).ok());

    let mut http_response = Json(response).into_response();
    if let Some(value) = cache_control {
        http_response
            .headers_mut()
            .insert(header::CACHE_CONTROL, value);
    }

    Ok(http_response)
}
