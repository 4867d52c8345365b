use chrono::Utc;
use tracing::debug;

use crate::models::{Package, Warehouse};
use crate::repository::{StoreResult, StoreTransaction};

/// Copies the warehouse's denormalized fields onto a package and recomputes
/// its shipping cost.
pub fn apply_warehouse(package: &mut Package, warehouse: &Warehouse) {
    package.warehouse_name = warehouse.name.clone();
    package.handling_fee = warehouse.handling_fee;
    package.recompute_shipping_cost();
}

/// Rewrites every package of `warehouse` so its copies match the warehouse.
///
/// Must run in the same transaction as the warehouse write that triggered it.
pub async fn sync_warehouse_update(
    tx: &mut dyn StoreTransaction,
    warehouse: &Warehouse,
) -> StoreResult<usize> {
    let packages = tx.list_packages_for_warehouse(warehouse.id).await?;
    let now = Utc::now();
    let count = packages.len();

    for mut package in packages {
        apply_warehouse(&mut package, warehouse);
        package.updated_at = now;
        tx.save_package(&package).await?;
    }

    debug!(warehouse_id = warehouse.id, packages = count, "Re-synchronized packages");
    Ok(count)
}
