use async_trait::async_trait;

use crate::models::{Package, PackageDraft, Warehouse, WarehouseDraft};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point into persistent storage of warehouses and packages.
///
/// Every engine operation runs inside one transaction obtained here, so a
/// warehouse change and the package writes it causes are committed together.
#[async_trait]
pub trait LogisticsStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// A unit of work against the store.
///
/// Dropping a transaction without calling `commit` discards every write made
/// through it.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>>;

    /// Fetches a warehouse and locks it for the rest of the transaction.
    async fn lock_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>>;

    async fn find_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>>;

    async fn find_warehouse_by_name(&mut self, name: &str) -> StoreResult<Option<Warehouse>>;

    async fn insert_warehouse(&mut self, draft: &WarehouseDraft) -> StoreResult<Warehouse>;

    async fn save_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()>;

    async fn delete_warehouse(&mut self, id: i64) -> StoreResult<bool>;

    async fn list_packages(&mut self) -> StoreResult<Vec<Package>>;

    async fn list_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<Vec<Package>>;

    async fn list_packages_heavier_than(&mut self, weight: f64) -> StoreResult<Vec<Package>>;

    async fn find_package(&mut self, id: i64) -> StoreResult<Option<Package>>;

    /// Fetches a package and locks it for the rest of the transaction.
    async fn lock_package(&mut self, id: i64) -> StoreResult<Option<Package>>;

    async fn insert_package(&mut self, draft: &PackageDraft) -> StoreResult<Package>;

    async fn save_package(&mut self, package: &Package) -> StoreResult<()>;

    async fn delete_package(&mut self, id: i64) -> StoreResult<bool>;

    /// Removes every package of a warehouse, returning how many were removed.
    async fn delete_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<u64>;

    async fn commit(&mut self) -> StoreResult<()>;
}
