use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::error;

use depot_core::models::{Package, PackageDraft, Warehouse, WarehouseDraft};
use depot_core::repository::{LogisticsStore, StoreError, StoreResult, StoreTransaction};

const WAREHOUSE_COLUMNS: &str = "id, name, city, handling_fee, created_at, updated_at";

const PACKAGE_COLUMNS: &str = "id, description, weight, shipping_cost, warehouse_id, \
     warehouse_name, handling_fee, created_at, updated_at";

pub struct PgLogisticsStore {
    pool: PgPool,
}

impl PgLogisticsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogisticsStore for PgLogisticsStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgStoreTransaction { tx: Some(tx) }))
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct WarehouseRow {
    id: i64,
    name: String,
    city: String,
    handling_fee: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            name: row.name,
            city: row.city,
            handling_fee: row.handling_fee,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: i64,
    description: String,
    weight: f64,
    shipping_cost: f64,
    warehouse_id: i64,
    warehouse_name: String,
    handling_fee: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PackageRow> for Package {
    fn from(row: PackageRow) -> Self {
        Package {
            id: row.id,
            description: row.description,
            weight: row.weight,
            shipping_cost: row.shipping_cost,
            warehouse_id: row.warehouse_id,
            warehouse_name: row.warehouse_name,
            handling_fee: row.handling_fee,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(db_err.message().to_string());
        }
    }
    error!("Database error: {}", err);
    StoreError::Backend(err.to_string())
}

pub struct PgStoreTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStoreTransaction {
    fn tx(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Backend("transaction already committed".to_string()))
    }

    async fn fetch_packages(&mut self, filter: &str, bind: PackageFilter) -> StoreResult<Vec<Package>> {
        let sql = format!("SELECT {} FROM packages {} ORDER BY id", PACKAGE_COLUMNS, filter);
        let query = sqlx::query_as::<_, PackageRow>(&sql);
        let query = match bind {
            PackageFilter::All => query,
            PackageFilter::Warehouse(id) => query.bind(id),
            PackageFilter::HeavierThan(weight) => query.bind(weight),
        };

        let rows = query.fetch_all(&mut **self.tx()?).await.map_err(store_error)?;
        Ok(rows.into_iter().map(Package::from).collect())
    }

    async fn fetch_package(&mut self, sql: String, id: i64) -> StoreResult<Option<Package>> {
        let row = sqlx::query_as::<_, PackageRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(row.map(Package::from))
    }

    async fn fetch_warehouse(&mut self, sql: String, id: i64) -> StoreResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(row.map(Warehouse::from))
    }
}

enum PackageFilter {
    All,
    Warehouse(i64),
    HeavierThan(f64),
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>> {
        let sql = format!("SELECT {} FROM warehouses ORDER BY id", WAREHOUSE_COLUMNS);
        let rows = sqlx::query_as::<_, WarehouseRow>(&sql)
            .fetch_all(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    async fn lock_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
        let sql = format!("SELECT {} FROM warehouses WHERE id = $1 FOR UPDATE", WAREHOUSE_COLUMNS);
        self.fetch_warehouse(sql, id).await
    }

    async fn find_warehouse(&mut self, id: i64) -> StoreResult<Option<Warehouse>> {
        let sql = format!("SELECT {} FROM warehouses WHERE id = $1", WAREHOUSE_COLUMNS);
        self.fetch_warehouse(sql, id).await
    }

    async fn find_warehouse_by_name(&mut self, name: &str) -> StoreResult<Option<Warehouse>> {
        let sql = format!("SELECT {} FROM warehouses WHERE name = $1", WAREHOUSE_COLUMNS);
        let row = sqlx::query_as::<_, WarehouseRow>(&sql)
            .bind(name)
            .fetch_optional(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(row.map(Warehouse::from))
    }

    async fn insert_warehouse(&mut self, draft: &WarehouseDraft) -> StoreResult<Warehouse> {
        let sql = format!(
            r#"
            INSERT INTO warehouses (name, city, handling_fee, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {}
            "#,
            WAREHOUSE_COLUMNS
        );
        let row = sqlx::query_as::<_, WarehouseRow>(&sql)
            .bind(&draft.name)
            .bind(&draft.city)
            .bind(draft.handling_fee)
            .bind(draft.created_at)
            .fetch_one(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn save_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE warehouses
            SET name = $1, city = $2, handling_fee = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&warehouse.name)
        .bind(&warehouse.city)
        .bind(warehouse.handling_fee)
        .bind(warehouse.updated_at)
        .bind(warehouse.id)
        .execute(&mut **self.tx()?)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete_warehouse(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(id)
            .execute(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_packages(&mut self) -> StoreResult<Vec<Package>> {
        self.fetch_packages("", PackageFilter::All).await
    }

    async fn list_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<Vec<Package>> {
        self.fetch_packages("WHERE warehouse_id = $1", PackageFilter::Warehouse(warehouse_id))
            .await
    }

    async fn list_packages_heavier_than(&mut self, weight: f64) -> StoreResult<Vec<Package>> {
        self.fetch_packages("WHERE weight > $1", PackageFilter::HeavierThan(weight))
            .await
    }

    async fn find_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
        let sql = format!("SELECT {} FROM packages WHERE id = $1", PACKAGE_COLUMNS);
        self.fetch_package(sql, id).await
    }

    async fn lock_package(&mut self, id: i64) -> StoreResult<Option<Package>> {
        let sql = format!("SELECT {} FROM packages WHERE id = $1 FOR UPDATE", PACKAGE_COLUMNS);
        self.fetch_package(sql, id).await
    }

    async fn insert_package(&mut self, draft: &PackageDraft) -> StoreResult<Package> {
        let sql = format!(
            r#"
            INSERT INTO packages (description, weight, shipping_cost, warehouse_id, warehouse_name, handling_fee, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            PACKAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, PackageRow>(&sql)
            .bind(&draft.description)
            .bind(draft.weight)
            .bind(draft.shipping_cost)
            .bind(draft.warehouse_id)
            .bind(&draft.warehouse_name)
            .bind(draft.handling_fee)
            .bind(draft.created_at)
            .fetch_one(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn save_package(&mut self, package: &Package) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE packages
            SET description = $1, weight = $2, shipping_cost = $3,
                warehouse_name = $4, handling_fee = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&package.description)
        .bind(package.weight)
        .bind(package.shipping_cost)
        .bind(&package.warehouse_name)
        .bind(package.handling_fee)
        .bind(package.updated_at)
        .bind(package.id)
        .execute(&mut **self.tx()?)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete_package(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_packages_for_warehouse(&mut self, warehouse_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM packages WHERE warehouse_id = $1")
            .bind(warehouse_id)
            .execute(&mut **self.tx()?)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already committed".to_string()))?;
        tx.commit().await.map_err(store_error)
    }
}
