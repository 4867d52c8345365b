use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::{
    NewPackage, NewWarehouse, Package, PackageDraft, PackageUpdate, Warehouse, WarehouseDraft,
    WarehouseRemoval, WarehouseUpdate,
};
use crate::repository::{LogisticsStore, StoreError, StoreTransaction};
use crate::sync::{apply_warehouse, sync_warehouse_update};
use crate::validation::{normalize_warehouse_name, validate_handling_fee, validate_weight};
use crate::{CoreError, CoreResult};

/// Keeps warehouses and their packages consistent.
///
/// Every mutating call runs in one store transaction; on any error the
/// transaction is dropped and nothing is written.
#[derive(Clone)]
pub struct LogisticsEngine {
    store: Arc<dyn LogisticsStore>,
}

impl LogisticsEngine {
    pub fn new(store: Arc<dyn LogisticsStore>) -> Self {
        Self { store }
    }

    async fn begin(&self) -> CoreResult<Box<dyn StoreTransaction>> {
        Ok(self.store.begin().await?)
    }

    // ------------------------------------------------------------------
    // Warehouses
    // ------------------------------------------------------------------

    pub async fn create_warehouse(&self, new: NewWarehouse) -> CoreResult<Warehouse> {
        let name = normalize_warehouse_name(&new.name)?;
        validate_handling_fee(new.handling_fee)?;

        let mut tx = self.begin().await?;
        if tx.find_warehouse_by_name(&name).await?.is_some() {
            return Err(name_conflict(&name));
        }

        let draft = WarehouseDraft {
            name,
            city: new.city,
            handling_fee: new.handling_fee,
            created_at: Utc::now(),
        };
        let warehouse = tx.insert_warehouse(&draft).await.map_err(conflict_on_unique)?;
        tx.commit().await?;

        info!(warehouse_id = warehouse.id, name = %warehouse.name, "Warehouse created");
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self) -> CoreResult<Vec<Warehouse>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_warehouses().await?)
    }

    pub async fn get_warehouse(&self, id: i64) -> CoreResult<Warehouse> {
        let mut tx = self.begin().await?;
        tx.find_warehouse(id)
            .await?
            .ok_or_else(|| CoreError::warehouse_not_found(id))
    }

    /// Applies a partial update and re-synchronizes the warehouse's packages
    /// when its name or handling fee changed.
    pub async fn update_warehouse(&self, id: i64, update: WarehouseUpdate) -> CoreResult<Warehouse> {
        let name = update.name.as_deref().map(normalize_warehouse_name).transpose()?;
        if let Some(fee) = update.handling_fee {
            validate_handling_fee(fee)?;
        }

        let mut tx = self.begin().await?;
        let mut warehouse = tx
            .lock_warehouse(id)
            .await?
            .ok_or_else(|| CoreError::warehouse_not_found(id))?;

        let mut denormalized_changed = false;

        if let Some(name) = name {
            if name != warehouse.name {
                if tx.find_warehouse_by_name(&name).await?.is_some() {
                    return Err(name_conflict(&name));
                }
                warehouse.name = name;
                denormalized_changed = true;
            }
        }
        if let Some(city) = update.city {
            warehouse.city = city;
        }
        if let Some(fee) = update.handling_fee {
            if fee != warehouse.handling_fee {
                warehouse.handling_fee = fee;
                denormalized_changed = true;
            }
        }

        warehouse.updated_at = Utc::now();
        tx.save_warehouse(&warehouse).await.map_err(conflict_on_unique)?;

        let synced = if denormalized_changed {
            sync_warehouse_update(tx.as_mut(), &warehouse).await?
        } else {
            0
        };
        tx.commit().await?;

        info!(warehouse_id = id, packages_synced = synced, "Warehouse updated");
        Ok(warehouse)
    }

    /// Deletes a warehouse together with all of its packages.
    pub async fn delete_warehouse(&self, id: i64) -> CoreResult<WarehouseRemoval> {
        let mut tx = self.begin().await?;
        if tx.lock_warehouse(id).await?.is_none() {
            return Err(CoreError::warehouse_not_found(id));
        }

        let packages_deleted = tx.delete_packages_for_warehouse(id).await?;
        if !tx.delete_warehouse(id).await? {
            return Err(CoreError::warehouse_not_found(id));
        }
        tx.commit().await?;

        info!(warehouse_id = id, packages_deleted, "Warehouse deleted");
        Ok(WarehouseRemoval {
            warehouse_id: id,
            packages_deleted,
        })
    }

    pub async fn list_warehouse_packages(&self, warehouse_id: i64) -> CoreResult<Vec<Package>> {
        let mut tx = self.begin().await?;
        if tx.find_warehouse(warehouse_id).await?.is_none() {
            return Err(CoreError::warehouse_not_found(warehouse_id));
        }
        Ok(tx.list_packages_for_warehouse(warehouse_id).await?)
    }

    // ------------------------------------------------------------------
    // Packages
    // ------------------------------------------------------------------

    pub async fn create_package(&self, new: NewPackage) -> CoreResult<Package> {
        reject_read_only(0, &new.read_only_fields())?;
        validate_weight(new.weight)?;

        let mut tx = self.begin().await?;
        let warehouse = tx
            .lock_warehouse(new.warehouse_id)
            .await?
            .ok_or_else(|| CoreError::warehouse_not_found(new.warehouse_id))?;

        let draft = PackageDraft::for_warehouse(new, &warehouse, Utc::now());
        let package = tx.insert_package(&draft).await?;
        tx.commit().await?;

        info!(
            package_id = package.id,
            warehouse_id = package.warehouse_id,
            shipping_cost = package.shipping_cost,
            "Package created"
        );
        Ok(package)
    }

    pub async fn list_packages(&self) -> CoreResult<Vec<Package>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_packages().await?)
    }

    /// Packages strictly heavier than `threshold` kilograms.
    pub async fn list_heavy_packages(&self, threshold: f64) -> CoreResult<Vec<Package>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_packages_heavier_than(threshold).await?)
    }

    pub async fn get_package(&self, id: i64) -> CoreResult<Package> {
        let mut tx = self.begin().await?;
        tx.find_package(id)
            .await?
            .ok_or_else(|| CoreError::package_not_found(id))
    }

    /// Updates description and/or weight. Derived and denormalized fields are
    /// rejected.
    ///
    /// Locks the owning warehouse before the package, the same order a
    /// warehouse update takes, and re-derives the copies from the locked
    /// warehouse.
    pub async fn update_package(&self, id: i64, update: PackageUpdate) -> CoreResult<Package> {
        reject_read_only(id, &update.read_only_fields())?;
        if let Some(weight) = update.weight {
            validate_weight(weight)?;
        }

        let mut tx = self.begin().await?;
        // warehouse_id never changes, so an unlocked read is enough to find it.
        let warehouse_id = tx
            .find_package(id)
            .await?
            .ok_or_else(|| CoreError::package_not_found(id))?
            .warehouse_id;
        let warehouse = tx
            .lock_warehouse(warehouse_id)
            .await?
            .ok_or_else(|| CoreError::package_not_found(id))?;
        let mut package = tx
            .lock_package(id)
            .await?
            .ok_or_else(|| CoreError::package_not_found(id))?;

        if let Some(description) = update.description {
            package.description = description;
        }
        if let Some(weight) = update.weight {
            package.weight = weight;
        }
        apply_warehouse(&mut package, &warehouse);
        package.updated_at = Utc::now();

        tx.save_package(&package).await?;
        tx.commit().await?;

        info!(package_id = id, shipping_cost = package.shipping_cost, "Package updated");
        Ok(package)
    }

    pub async fn delete_package(&self, id: i64) -> CoreResult<()> {
        let mut tx = self.begin().await?;
        if !tx.delete_package(id).await? {
            return Err(CoreError::package_not_found(id));
        }
        tx.commit().await?;

        info!(package_id = id, "Package deleted");
        Ok(())
    }
}

fn reject_read_only(package_id: i64, fields: &[&'static str]) -> CoreResult<()> {
    if fields.is_empty() {
        return Ok(());
    }
    warn!(package_id, ?fields, "Rejected write to read-only package fields");
    Err(CoreError::ValidationError(format!(
        "read-only package fields cannot be set: {}",
        fields.join(", ")
    )))
}

fn name_conflict(name: &str) -> CoreError {
    CoreError::ConflictError(format!("warehouse name '{}' is already taken", name))
}

fn conflict_on_unique(err: StoreError) -> CoreError {
    match err {
        StoreError::UniqueViolation(detail) => CoreError::ConflictError(detail),
        other => CoreError::StoreError(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::pricing::shipping_cost;
    use crate::repository::StoreResult;
    use async_trait::async_trait;

    /// Store whose transactions fail on `delete_warehouse` and pass every
    /// other call through.
    struct FailingDeleteStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl LogisticsStore for FailingDeleteStore {
        async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
            Ok(Box::new(FailingDeleteTransaction {
                inner: self.inner.begin().await?,
            }))
        }
    }

    struct FailingDeleteTransaction {
        inner: Box<dyn StoreTransaction>,
    }

    #[async_trait]
    impl StoreTransaction for FailingDeleteTransaction {
        async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>> {
            self.inner.list_warehouses().await
        }
        async fn lock_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
            self.inner.lock_warehouse(id).await
        }
        async fn find_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
            self.inner.find_warehouse(id).await
        }
        async fn find_warehouse_by_name(&mut self, name: &str) -> StoreResult<Option<Warehouse>> {
            self.inner.find_warehouse_by_name(name).await
        }
        async fn insert_warehouse(&mut self, draft: &WarehouseDraft) -> StoreResult<Warehouse> {
            self.inner.insert_warehouse(draft).await
        }
        async fn save_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()> {
            self.inner.save_warehouse(warehouse).await
        }
        async fn delete_warehouse(&mut self, _id: i64) -> StoreResult<bool> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn list_packages(&mut self) -> StoreResult<Vec<Package>> {
            self.inner.list_packages().await
        }
        async fn list_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<Vec<Package>> {
            self.inner.list_packages_for_warehouse(warehouse_id).await
        }
        async fn list_packages_heavier_than(&mut self, weight: f64) -> StoreResult<Vec<Package>> {
            self.inner.list_packages_heavier_than(weight).await
        }
        async fn find_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
            self.inner.find_package(id).await
        }
        async fn lock_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
            self.inner.lock_package(id).await
        }
        async fn insert_package(&mut self, draft: &PackageDraft) -> StoreResult<Package> {
            self.inner.insert_package(draft).await
        }
        async fn save_package(&mut self, package: &Package) -> StoreResult<()> {
            self.inner.save_package(package).await
        }
        async fn delete_package(&mut self, id: i64) -> StoreResult<bool> {
            self.inner.delete_package(id).await
        }
        async fn delete_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<u64> {
            self.inner.delete_packages_for_warehouse(warehouse_id).await
        }
        async fn commit(&mut self) -> StoreResult<()> {
            self.inner.commit().await
        }
    }

    fn engine() -> LogisticsEngine {
        LogisticsEngine::new(Arc::new(InMemoryStore::new()))
    }

    fn central_hub() -> NewWarehouse {
        NewWarehouse {
            name: "Central Hub".to_string(),
            city: "New York".to_string(),
            handling_fee: 5.0,
        }
    }

    fn laptop(warehouse_id: i64) -> NewPackage {
        NewPackage {
            description: "Gaming Laptop".to_string(),
            weight: 2.0,
            warehouse_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_package_populates_derived_fields() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();

        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        assert_eq!(package.warehouse_name, "Central Hub");
        assert_eq!(package.handling_fee, 5.0);
        assert_eq!(package.shipping_cost, 105.0);
    }

    #[tokio::test]
    async fn test_create_package_for_unknown_warehouse_persists_nothing() {
        let engine = engine();

        let err = engine.create_package(laptop(99)).await.unwrap_err();

        assert!(matches!(err, CoreError::NotFoundError { entity: "Warehouse", id: 99 }));
        assert!(engine.list_packages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_package_rejects_non_positive_weight() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();

        let mut new = laptop(warehouse.id);
        new.weight = 0.0;
        let err = engine.create_package(new).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
        assert!(engine.list_packages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fee_update_resyncs_packages() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = WarehouseUpdate {
            handling_fee: Some(10.0),
            ..Default::default()
        };
        engine.update_warehouse(warehouse.id, update).await.unwrap();

        let package = engine.get_package(package.id).await.unwrap();
        assert_eq!(package.handling_fee, 10.0);
        assert_eq!(package.shipping_cost, 110.0);
    }

    #[tokio::test]
    async fn test_rename_resyncs_packages() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        engine.create_package(laptop(warehouse.id)).await.unwrap();
        engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = WarehouseUpdate {
            name: Some("Harbor Point".to_string()),
            ..Default::default()
        };
        engine.update_warehouse(warehouse.id, update).await.unwrap();

        let packages = engine.list_warehouse_packages(warehouse.id).await.unwrap();
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.warehouse_name == "Harbor Point"));
    }

    #[tokio::test]
    async fn test_invalid_fee_update_changes_nothing() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = WarehouseUpdate {
            name: Some("Renamed".to_string()),
            handling_fee: Some(25.0),
            ..Default::default()
        };
        let err = engine.update_warehouse(warehouse.id, update).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(engine.get_warehouse(warehouse.id).await.unwrap(), warehouse);
        assert_eq!(engine.get_package(package.id).await.unwrap(), package);
    }

    #[tokio::test]
    async fn test_duplicate_names_conflict() {
        let engine = engine();
        engine.create_warehouse(central_hub()).await.unwrap();
        let other = engine
            .create_warehouse(NewWarehouse {
                name: "West Yard".to_string(),
                city: "Denver".to_string(),
                handling_fee: 1.0,
            })
            .await
            .unwrap();

        let err = engine.create_warehouse(central_hub()).await.unwrap_err();
        assert!(matches!(err, CoreError::ConflictError(_)));

        let rename = WarehouseUpdate {
            name: Some("Central Hub".to_string()),
            ..Default::default()
        };
        let err = engine.update_warehouse(other.id, rename).await.unwrap_err();
        assert!(matches!(err, CoreError::ConflictError(_)));
    }

    #[tokio::test]
    async fn test_rename_to_own_name_is_not_a_conflict() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();

        let update = WarehouseUpdate {
            name: Some("Central Hub".to_string()),
            city: Some("Newark".to_string()),
            ..Default::default()
        };
        let updated = engine.update_warehouse(warehouse.id, update).await.unwrap();
        assert_eq!(updated.city, "Newark");
    }

    #[tokio::test]
    async fn test_delete_warehouse_cascades() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let keeper = engine
            .create_warehouse(NewWarehouse {
                name: "West Yard".to_string(),
                city: "Denver".to_string(),
                handling_fee: 0.0,
            })
            .await
            .unwrap();
        for _ in 0..3 {
            engine.create_package(laptop(warehouse.id)).await.unwrap();
        }
        let survivor = engine.create_package(laptop(keeper.id)).await.unwrap();

        let removal = engine.delete_warehouse(warehouse.id).await.unwrap();

        assert_eq!(removal.packages_deleted, 3);
        assert!(matches!(
            engine.get_warehouse(warehouse.id).await,
            Err(CoreError::NotFoundError { .. })
        ));
        assert_eq!(engine.list_packages().await.unwrap(), vec![survivor]);
    }

    #[tokio::test]
    async fn test_failed_warehouse_delete_keeps_warehouse_and_packages() {
        let inner = InMemoryStore::new();
        let engine = LogisticsEngine::new(Arc::new(FailingDeleteStore { inner: inner.clone() }));
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        for _ in 0..2 {
            engine.create_package(laptop(warehouse.id)).await.unwrap();
        }
        let before = engine.list_packages().await.unwrap();

        let err = engine.delete_warehouse(warehouse.id).await.unwrap_err();

        assert!(matches!(err, CoreError::StoreError(StoreError::Backend(_))));
        // The packages were removed inside the failed transaction and must be back.
        let plain = LogisticsEngine::new(Arc::new(inner));
        assert_eq!(plain.get_warehouse(warehouse.id).await.unwrap(), warehouse);
        assert_eq!(plain.list_packages().await.unwrap(), before);
        assert_eq!(before.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_warehouse_is_not_found() {
        let engine = engine();
        let err = engine.delete_warehouse(5).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFoundError { entity: "Warehouse", id: 5 }));
    }

    #[tokio::test]
    async fn test_weight_update_recomputes_cost() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = PackageUpdate {
            weight: Some(4.0),
            ..Default::default()
        };
        let updated = engine.update_package(package.id, update).await.unwrap();

        assert_eq!(updated.shipping_cost, 210.0);
        assert_eq!(updated.handling_fee, 5.0);
    }

    #[tokio::test]
    async fn test_package_update_rederives_copies_from_current_warehouse() {
        let store = InMemoryStore::new();
        let engine = LogisticsEngine::new(Arc::new(store.clone()));
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        // Leave the package holding copies from before a fee change.
        let mut tx = store.begin().await.unwrap();
        let mut current = tx.find_warehouse(warehouse.id).await.unwrap().unwrap();
        current.handling_fee = 10.0;
        tx.save_warehouse(&current).await.unwrap();
        tx.commit().await.unwrap();

        let update = PackageUpdate {
            description: Some("Refurbished Laptop".to_string()),
            ..Default::default()
        };
        let updated = engine.update_package(package.id, update).await.unwrap();

        assert_eq!(updated.handling_fee, 10.0);
        assert_eq!(updated.shipping_cost, shipping_cost(2.0, 10.0));
        assert_eq!(engine.get_package(package.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_package_update_rejects_unpriceable_weight() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = PackageUpdate {
            weight: Some(1e307),
            ..Default::default()
        };
        let err = engine.update_package(package.id, update).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(engine.get_package(package.id).await.unwrap(), package);
    }

    #[tokio::test]
    async fn test_create_package_rejects_derived_fields() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();

        let mut new = laptop(warehouse.id);
        new.shipping_cost = Some(serde_json::json!(1.0));
        let err = engine.create_package(new).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(msg) if msg.contains("shipping_cost")));
        assert!(engine.list_packages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_package_update_rejects_denormalized_fields() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        let update = PackageUpdate {
            description: Some("Tampered".to_string()),
            handling_fee: Some(serde_json::json!(0.0)),
            ..Default::default()
        };
        let err = engine.update_package(package.id, update).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(msg) if msg.contains("handling_fee")));
        assert_eq!(engine.get_package(package.id).await.unwrap(), package);
    }

    #[tokio::test]
    async fn test_heavy_packages_are_strictly_heavier() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        for weight in [5.0, 20.0, 20.5, 42.0] {
            engine
                .create_package(NewPackage {
                    description: format!("{} kg crate", weight),
                    weight,
                    warehouse_id: warehouse.id,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let heavy = engine.list_heavy_packages(20.0).await.unwrap();
        let weights: Vec<f64> = heavy.iter().map(|p| p.weight).collect();
        assert_eq!(weights, vec![20.5, 42.0]);
    }

    #[tokio::test]
    async fn test_delete_package() {
        let engine = engine();
        let warehouse = engine.create_warehouse(central_hub()).await.unwrap();
        let package = engine.create_package(laptop(warehouse.id)).await.unwrap();

        engine.delete_package(package.id).await.unwrap();

        assert!(engine.list_packages().await.unwrap().is_empty());
        assert_eq!(engine.list_warehouses().await.unwrap().len(), 1);
        assert!(matches!(
            engine.delete_package(package.id).await,
            Err(CoreError::NotFoundError { entity: "Package", .. })
        ));
    }
}
