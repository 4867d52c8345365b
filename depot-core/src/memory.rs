use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{Package, PackageDraft, Warehouse, WarehouseDraft};
use crate::repository::{LogisticsStore, StoreError, StoreResult, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    warehouses: BTreeMap<i64, Warehouse>,
    packages: BTreeMap<i64, Package>,
    next_warehouse_id: i64,
    next_package_id: i64,
}

impl Tables {
    fn name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.warehouses
            .values()
            .any(|w| w.name == name && Some(w.id) != except)
    }
}

/// In-memory store used for local runs and tests.
///
/// Transactions are serialized through a single lock and work on a private
/// copy of the tables that replaces the shared copy on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogisticsStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<Tables>>,
    working: Tables,
}

impl InMemoryTransaction {
    fn tables(&mut self) -> StoreResult<&mut Tables> {
        if self.guard.is_none() {
            return Err(StoreError::Backend("transaction already committed".to_string()));
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>> {
        Ok(self.tables()?.warehouses.values().cloned().collect())
    }

    async fn lock_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
        // The whole store is already held by this transaction.
        self.find_warehouse(id).await
    }

    async fn find_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
        Ok(self.tables()?.warehouses.get(&id).cloned())
    }

    async fn find_warehouse_by_name(&mut self, name: &str) -> StoreResult<Option<Warehouse>> {
        Ok(self
            .tables()?
            .warehouses
            .values()
            .find(|w| w.name == name)
            .cloned())
    }

    async fn insert_warehouse(&mut self, draft: &WarehouseDraft) -> StoreResult<Warehouse> {
        let tables = self.tables()?;
        if tables.name_taken(&draft.name, None) {
            return Err(StoreError::UniqueViolation(format!("warehouses.name = {}", draft.name)));
        }

        tables.next_warehouse_id += 1;
        let warehouse = Warehouse {
            id: tables.next_warehouse_id,
            name: draft.name.clone(),
            city: draft.city.clone(),
            handling_fee: draft.handling_fee,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        tables.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(warehouse)
    }

    async fn save_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()> {
        let tables = self.tables()?;
        if tables.name_taken(&warehouse.name, Some(warehouse.id)) {
            return Err(StoreError::UniqueViolation(format!(
                "warehouses.name = {}",
                warehouse.name
            )));
        }
        match tables.warehouses.get_mut(&warehouse.id) {
            Some(existing) => {
                *existing = warehouse.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("warehouse {} does not exist", warehouse.id))),
        }
    }

    async fn delete_warehouse(&mut self, id: i64) -> StoreResult<bool> {
        let tables = self.tables()?;
        let removed = tables.warehouses.remove(&id).is_some();
        if removed {
            tables.packages.retain(|_, p| p.warehouse_id != id);
        }
        Ok(removed)
    }

    async fn list_packages(&mut self) -> StoreResult<Vec<Package>> {
        Ok(self.tables()?.packages.values().cloned().collect())
    }

    async fn list_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<Vec<Package>> {
        Ok(self
            .tables()?
            .packages
            .values()
            .filter(|p| p.warehouse_id == warehouse_id)
            .cloned()
            .collect())
    }

    async fn list_packages_heavier_than(&mut self, weight: f64) -> StoreResult<Vec<Package>> {
        Ok(self
            .tables()?
            .packages
            .values()
            .filter(|p| p.weight > weight)
            .cloned()
            .collect())
    }

    async fn find_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
        Ok(self.tables()?.packages.get(&id).cloned())
    }

    async fn lock_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
        self.find_package(id).await
    }

    async fn insert_package(&mut self, draft: &PackageDraft) -> StoreResult<Package> {
        let tables = self.tables()?;
        if !tables.warehouses.contains_key(&draft.warehouse_id) {
            return Err(StoreError::Backend(format!(
                "foreign key violation: warehouse {} does not exist",
                draft.warehouse_id
            )));
        }

        tables.next_package_id += 1;
        let package = Package {
            id: tables.next_package_id,
            description: draft.description.clone(),
            weight: draft.weight,
            shipping_cost: draft.shipping_cost,
            warehouse_id: draft.warehouse_id,
            warehouse_name: draft.warehouse_name.clone(),
            handling_fee: draft.handling_fee,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        tables.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn save_package(&mut self, package: &Package) -> StoreResult<()> {
        match self.tables()?.packages.get_mut(&package.id) {
            Some(existing) => {
                *existing = package.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("package {} does not exist", package.id))),
        }
    }

    async fn delete_package(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.tables()?.packages.remove(&id).is_some())
    }

    async fn delete_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<u64> {
        let tables = self.tables()?;
        let before = tables.packages.len();
        tables.packages.retain(|_, p| p.warehouse_id != warehouse_id);
        Ok((before - tables.packages.len()) as u64)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already committed".to_string()))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
