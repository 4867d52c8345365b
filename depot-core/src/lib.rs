pub mod models;
pub mod pricing;
pub mod validation;
pub mod sync;
pub mod repository;
pub mod memory;
pub mod engine;

pub use engine::LogisticsEngine;
pub use memory::InMemoryStore;
pub use models::{
    NewPackage, NewWarehouse, Package, PackageUpdate, Warehouse, WarehouseRemoval,
    WarehouseUpdate,
};
pub use repository::{LogisticsStore, StoreError, StoreTransaction};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{entity} {id} not found")]
    NotFoundError { entity: &'static str, id: i64 },
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Storage failure: {0}")]
    StoreError(#[from] StoreError),
}

impl CoreError {
    pub fn warehouse_not_found(id: i64) -> Self {
        CoreError::NotFoundError { entity: "Warehouse", id }
    }

    pub fn package_not_found(id: i64) -> Self {
        CoreError::NotFoundError { entity: "Package", id }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
