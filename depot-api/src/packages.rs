use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use depot_core::{NewPackage, Package, PackageUpdate};
use serde_json::{json, Value};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/packages", get(list_packages).post(create_package))
        .route("/packages/", get(list_packages).post(create_package))
        .route("/packages/heavy", get(list_heavy_packages))
        .route(
            "/packages/{id}",
            get(get_package).put(update_package).delete(delete_package),
        )
}

/// POST /packages (also /packages/)
async fn create_package(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<NewPackage>, AppError>,
) -> Result<(StatusCode, Json<Package>), AppError> {
    let package = state.engine.create_package(req).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// GET /packages (also /packages/)
async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>, AppError> {
    Ok(Json(state.engine.list_packages().await?))
}

/// GET /packages/heavy
async fn list_heavy_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>, AppError> {
    let threshold = state.business_rules.heavy_weight_threshold;
    Ok(Json(state.engine.list_heavy_packages(threshold).await?))
}

/// GET /packages/{id}
async fn get_package(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(state.engine.get_package(id).await?))
}

/// PUT /packages/{id}
/// Only description and weight are writable.
async fn update_package(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<PackageUpdate>, AppError>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(state.engine.update_package(id, req).await?))
}

/// DELETE /packages/{id}
async fn delete_package(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    state.engine.delete_package(id).await?;
    Ok(Json(json!({ "detail": "deleted" })))
}
