//! MES adapter surface: the input snapshot with the adapter's exact field
//! names, JSON (de)serialization, and the built-in demo dataset. HTTP
//! transport belongs to the adapter process, not to this crate.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{plan_date, timestamp, Bom, Equipment, Inventory, Order, OrderStatus, PlanEntry};

/// Immutable input to one planning cycle, as fetched from the MES. Plan
/// hours are relative to `cycle_start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "plan_date")]
    pub cycle_start: NaiveDateTime,
    pub equipment: Vec<Equipment>,
    pub orders: Vec<Order>,
    pub boms: Vec<Bom>,
    pub inventory: Inventory,
}

impl Snapshot {
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// The demo dataset the MES client falls back to when the live system
    /// is unreachable.
    pub fn demo() -> Self {
        let machine = |id: &str, name: &str, process: &str, rate: f64, qualified: f64| Equipment {
            id: id.to_string(),
            name: name.to_string(),
            process_type: process.to_string(),
            production_rate: rate,
            qualified_rate: qualified,
            unqualified_rate: 1.0 - qualified,
        };
        let order = |id: &str, product: &str, quantity: i64, due: &str, priority: i32| Order {
            id: id.to_string(),
            product_id: product.to_string(),
            quantity,
            delivery_date: timestamp(due),
            priority,
            status: OrderStatus::Pending,
        };
        let bom = |product: &str, components: &[(&str, i64)], sequence: &[&str]| Bom {
            product_id: product.to_string(),
            components: components
                .iter()
                .map(|(material, quantity)| ((*material).to_string(), *quantity))
                .collect(),
            process_sequence: sequence.iter().map(|step| (*step).to_string()).collect(),
        };

        Snapshot {
            cycle_start: timestamp("2025-06-02 08:00:00"),
            equipment: vec![
                machine("EQ001", "CNC machining center A", "machining", 10.5, 0.98),
                machine("EQ002", "CNC machining center B", "machining", 9.8, 0.97),
                machine("EQ003", "Assembly line A", "assembly", 5.2, 0.99),
                machine("EQ004", "Inspection line A", "inspection", 20.0, 0.995),
            ],
            orders: vec![
                order("ORD001", "P001", 100, "2025-06-07 08:00:00", 2),
                order("ORD002", "P002", 50, "2025-06-05 08:00:00", 1),
                order("ORD003", "P001", 200, "2025-06-09 08:00:00", 3),
                order("ORD004", "P003", 80, "2025-06-06 08:00:00", 2),
                order("ORD005", "P002", 120, "2025-06-08 08:00:00", 3),
            ],
            boms: vec![
                bom(
                    "P001",
                    &[("M001", 2), ("M002", 1), ("M003", 3)],
                    &["machining", "assembly", "inspection"],
                ),
                bom(
                    "P002",
                    &[("M002", 2), ("M004", 1), ("M005", 2)],
                    &["machining", "inspection", "assembly"],
                ),
                bom(
                    "P003",
                    &[("M001", 1), ("M003", 2), ("M006", 1)],
                    &["machining", "assembly", "inspection"],
                ),
            ],
            inventory: Inventory {
                raw_materials: BTreeMap::from(
                    [
                        ("M001", 500),
                        ("M002", 300),
                        ("M003", 400),
                        ("M004", 200),
                        ("M005", 250),
                        ("M006", 150),
                    ]
                    .map(|(material, stock)| (material.to_string(), stock)),
                ),
                finished_products: BTreeMap::from(
                    [("P001", 50), ("P002", 30), ("P003", 20)]
                        .map(|(product, stock)| (product.to_string(), stock)),
                ),
            },
        }
    }
}

/// Serializes a finished plan to the MES submission shape.
pub fn plan_to_json(plan: &[PlanEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_snapshot_round_trips_through_json() {
        let snapshot = Snapshot::demo();
        let json = snapshot.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back.equipment, snapshot.equipment);
        assert_eq!(back.orders, snapshot.orders);
        assert_eq!(back.boms, snapshot.boms);
        assert_eq!(back.inventory, snapshot.inventory);
        assert_eq!(back.cycle_start, snapshot.cycle_start);
    }

    #[test]
    fn snapshot_uses_the_adapter_field_names() {
        let json = Snapshot::demo().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let equipment = &value["equipment"][0];
        for key in [
            "id",
            "name",
            "process_type",
            "production_rate",
            "qualified_rate",
            "unqualified_rate",
        ] {
            assert!(equipment.get(key).is_some(), "missing equipment key {key}");
        }
        assert_eq!(value["orders"][0]["delivery_date"], "2025-06-07 08:00:00");
        assert!(value["inventory"].get("raw_materials").is_some());
        assert!(value["inventory"].get("finished_products").is_some());
        assert!(value["boms"][0].get("components").is_some());
        assert!(value["boms"][0].get("process_sequence").is_some());
    }
}
