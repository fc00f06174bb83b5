//! Domain model shared by every scheduling component: machines, orders,
//! BOMs, inventory, and the plan records the schedulers emit.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used by the MES adapter for delivery dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A machine on the shop floor. Each machine performs exactly one process
/// type at a fixed hourly throughput.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    /// The single process type this machine performs.
    pub process_type: String,
    /// Average units produced per hour. Positive.
    pub production_rate: f64,
    /// Share of output that passes inspection. Informational only.
    pub qualified_rate: f64,
    pub unqualified_rate: f64,
}

/// Lifecycle of an order within one planning cycle. Transitions only move
/// forward: pending, then released on admission, then scheduled once the
/// order appears in a plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderStatus {
    #[default]
    Pending,
    Released,
    Scheduled,
}

/// A customer order for a quantity of one product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Absolute due instant, `YYYY-MM-DD HH:MM:SS` on the wire.
    #[serde(with = "plan_date")]
    pub delivery_date: NaiveDateTime,
    /// Smaller value means higher priority.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(skip)]
    pub status: OrderStatus,
}

fn default_priority() -> i32 {
    1
}

/// Bill of materials: per-unit component quantities and the ordered process
/// sequence the product must traverse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bom {
    pub product_id: String,
    /// Material id to quantity required per unit of product.
    pub components: BTreeMap<String, i64>,
    /// Process types in execution order.
    pub process_sequence: Vec<String>,
}

/// On-hand stock: raw materials and finished goods.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub raw_materials: BTreeMap<String, i64>,
    pub finished_products: BTreeMap<String, i64>,
}

impl Inventory {
    /// Whether at least `quantity` units of a raw material are on hand.
    pub fn check_availability(&self, material_id: &str, quantity: i64) -> bool {
        self.raw_materials.get(material_id).copied().unwrap_or(0) >= quantity
    }

    /// Draws down a raw material if the full quantity is on hand.
    pub fn reserve_materials(&mut self, material_id: &str, quantity: i64) -> bool {
        if self.check_availability(material_id, quantity) {
            if let Some(stock) = self.raw_materials.get_mut(material_id) {
                *stock -= quantity;
            }
            true
        } else {
            false
        }
    }
}

/// One process step of one order placed on a machine. Hours are counted
/// from the cycle-local t=0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessAssignment {
    pub process_type: String,
    pub equipment_id: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// The scheduled record for one order: its assignments in BOM sequence
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[serde(with = "plan_date")]
    pub delivery_date: NaiveDateTime,
    pub processes: Vec<ProcessAssignment>,
}

impl PlanEntry {
    /// Hour at which the last assignment of this order finishes.
    pub fn completion_hour(&self) -> i64 {
        self.processes.iter().map(|p| p.end_time).max().unwrap_or(0)
    }
}

/// Hours a machine needs for `quantity` units at `rate` units/hour.
/// Always at least one full hour.
pub fn processing_hours(quantity: i64, rate: f64) -> i64 {
    ((quantity as f64 / rate).ceil() as i64).max(1)
}

/// Looks up the BOM for a product.
pub fn bom_for<'a>(boms: &'a [Bom], product_id: &str) -> Option<&'a Bom> {
    boms.iter().find(|bom| bom.product_id == product_id)
}

/// Maximum completion hour across all assignments in a plan.
pub fn makespan(plan: &[PlanEntry]) -> i64 {
    plan.iter()
        .flat_map(|entry| entry.processes.iter())
        .map(|process| process.end_time)
        .max()
        .unwrap_or(0)
}

/// Counts same-machine assignment pairs whose `[start, end)` intervals
/// overlap. Exact plans must report zero; heuristic plans may not.
pub fn machine_conflicts(plan: &[PlanEntry]) -> usize {
    use itertools::Itertools;

    let mut by_machine: BTreeMap<&str, Vec<(i64, i64)>> = BTreeMap::new();
    for entry in plan {
        for process in &entry.processes {
            by_machine
                .entry(process.equipment_id.as_str())
                .or_default()
                .push((process.start_time, process.end_time));
        }
    }
    by_machine
        .values_mut()
        .map(|intervals| {
            intervals.sort_unstable();
            intervals
                .iter()
                .tuple_windows()
                .filter(|((_, end), (next_start, _))| next_start < end)
                .count()
        })
        .sum()
}

/// Parses a `YYYY-MM-DD HH:MM:SS` timestamp literal.
pub fn timestamp(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .unwrap_or_else(|e| panic!("bad timestamp {value:?}: {e}"))
}

/// Serde adapter for the MES timestamp format.
pub mod plan_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(
        date: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&value, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
