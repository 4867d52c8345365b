use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing;

/// A storage facility. Parent of zero or more packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub city: String,
    /// Percentage added on top of the base shipping cost, within 0..=20.
    pub handling_fee: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A package stored in a warehouse.
///
/// `warehouse_name` and `handling_fee` are copies of the owning warehouse's
/// current values and `shipping_cost` is derived from `weight` and
/// `handling_fee`. None of the three can be written by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub description: String,
    pub weight: f64,
    pub shipping_cost: f64,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub handling_fee: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn recompute_shipping_cost(&mut self) {
        self.shipping_cost = pricing::shipping_cost(self.weight, self.handling_fee);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    #[serde(default)]
    pub city: String,
    pub handling_fee: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub handling_fee: Option<f64>,
}

impl WarehouseUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.city.is_none() && self.handling_fee.is_none()
    }
}

/// Client input for a new package.
///
/// Cost and the warehouse copies are always derived, so the derived fields
/// are captured only to reject a request that tries to set them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPackage {
    #[serde(default)]
    pub description: String,
    pub weight: f64,
    pub warehouse_id: i64,
    #[serde(default, skip_serializing)]
    pub warehouse_name: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pub handling_fee: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pub shipping_cost: Option<serde_json::Value>,
}

impl NewPackage {
    /// Names of derived fields present in this input.
    pub fn read_only_fields(&self) -> Vec<&'static str> {
        [
            ("warehouse_name", self.warehouse_name.is_some()),
            ("handling_fee", self.handling_fee.is_some()),
            ("shipping_cost", self.shipping_cost.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

/// Client-supplied changes to a package.
///
/// Only `description` and `weight` are writable. The remaining fields are
/// captured so that a request carrying them can be rejected instead of being
/// silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub description: Option<String>,
    pub weight: Option<f64>,
    #[serde(default, skip_serializing)]
    pub warehouse_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pub warehouse_name: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pub handling_fee: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pub shipping_cost: Option<serde_json::Value>,
}

impl PackageUpdate {
    /// Names of read-only fields present in this update.
    pub fn read_only_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.warehouse_id.is_some() {
            fields.push("warehouse_id");
        }
        if self.warehouse_name.is_some() {
            fields.push("warehouse_name");
        }
        if self.handling_fee.is_some() {
            fields.push("handling_fee");
        }
        if self.shipping_cost.is_some() {
            fields.push("shipping_cost");
        }
        fields
    }
}

/// A fully resolved package ready to be inserted by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDraft {
    pub description: String,
    pub weight: f64,
    pub shipping_cost: f64,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub handling_fee: f64,
    pub created_at: DateTime<Utc>,
}

impl PackageDraft {
    pub fn for_warehouse(new: NewPackage, warehouse: &Warehouse, now: DateTime<Utc>) -> Self {
        Self {
            description: new.description,
            weight: new.weight,
            shipping_cost: pricing::shipping_cost(new.weight, warehouse.handling_fee),
            warehouse_id: warehouse.id,
            warehouse_name: warehouse.name.clone(),
            handling_fee: warehouse.handling_fee,
            created_at: now,
        }
    }
}

/// A validated warehouse ready to be inserted by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseDraft {
    pub name: String,
    pub city: String,
    pub handling_fee: f64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a cascading warehouse delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WarehouseRemoval {
    pub warehouse_id: i64,
    pub packages_deleted: u64,
}
