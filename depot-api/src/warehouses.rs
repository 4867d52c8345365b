use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use depot_core::{NewWarehouse, Package, Warehouse, WarehouseUpdate};
use serde_json::{json, Value};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/warehouses/", get(list_warehouses).post(create_warehouse))
        .route(
            "/warehouses/{id}",
            get(get_warehouse).put(update_warehouse).delete(delete_warehouse),
        )
        .route("/warehouses/{id}/packages", get(list_warehouse_packages))
}

/// POST /warehouses (also /warehouses/)
async fn create_warehouse(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<NewWarehouse>, AppError>,
) -> Result<(StatusCode, Json<Warehouse>), AppError> {
    let warehouse = state.engine.create_warehouse(req).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// GET /warehouses (also /warehouses/)
async fn list_warehouses(State(state): State<AppState>) -> Result<Json<Vec<Warehouse>>, AppError> {
    Ok(Json(state.engine.list_warehouses().await?))
}

/// GET /warehouses/{id}
async fn get_warehouse(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Warehouse>, AppError> {
    Ok(Json(state.engine.get_warehouse(id).await?))
}

/// PUT /warehouses/{id}
/// Changing name or handling_fee re-synchronizes every package of the warehouse.
async fn update_warehouse(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<WarehouseUpdate>, AppError>,
) -> Result<Json<Warehouse>, AppError> {
    Ok(Json(state.engine.update_warehouse(id, req).await?))
}

/// DELETE /warehouses/{id}
/// Cascades to the warehouse's packages.
async fn delete_warehouse(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    let removal = state.engine.delete_warehouse(id).await?;
    Ok(Json(json!({
        "detail": "deleted",
        "packages_deleted": removal.packages_deleted,
    })))
}

/// GET /warehouses/{id}/packages
async fn list_warehouse_packages(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Vec<Package>>, AppError> {
    Ok(Json(state.engine.list_warehouse_packages(id).await?))
}
