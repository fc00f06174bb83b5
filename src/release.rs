//! Dynamic order release: decides which orders enter the current planning
//! cycle based on projected material stock and projected machine load.

use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use crate::config::PlannerConfig;
use crate::model::{Bom, Equipment, Order, PlanEntry};

/// Why admission refused an order.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RejectReason {
    #[error("order {order_id} lacks material {material}: needs {needed}, has {available}")]
    MaterialShortage {
        order_id: String,
        material: String,
        needed: i64,
        available: i64,
    },
    #[error(
        "order {order_id} would overload machine {machine}: utilization {utilization:.2}"
    )]
    MachineOverloaded {
        order_id: String,
        machine: String,
        utilization: f64,
    },
}

/// Admission gate for one planning cycle. Owns a projection of the raw
/// material inventory and of per-machine load; the input snapshots are
/// never touched.
pub struct DynamicRelease<'a> {
    equipment: &'a [Equipment],
    projected_inventory: HashMap<String, i64>,
    projected_load: HashMap<String, i64>,
    bottleneck_threshold: f64,
    horizon_hours: i64,
    strict_materials: bool,
}

impl<'a> DynamicRelease<'a> {
    pub fn new(
        equipment: &'a [Equipment],
        raw_materials: HashMap<String, i64>,
        config: &PlannerConfig,
    ) -> Self {
        let projected_load = equipment.iter().map(|eq| (eq.id.clone(), 0)).collect();
        Self {
            equipment,
            projected_inventory: raw_materials,
            projected_load,
            bottleneck_threshold: config.bottleneck_threshold,
            horizon_hours: i64::from(config.horizon_hours),
            strict_materials: config.strict_materials,
        }
    }

    /// Checks whether an order may be released now: every component must be
    /// coverable by the projected inventory, and no machine qualified for a
    /// process in the order's sequence may sit above the bottleneck
    /// threshold.
    pub fn check_release(&self, order: &Order, bom: &Bom) -> Result<(), RejectReason> {
        for (material, per_unit) in &bom.components {
            let needed = per_unit * order.quantity;
            let available = self.projected_inventory.get(material).copied().unwrap_or(0);
            if available < needed {
                return Err(RejectReason::MaterialShortage {
                    order_id: order.id.clone(),
                    material: material.clone(),
                    needed,
                    available,
                });
            }
        }

        for eq in self.equipment {
            if !bom.process_sequence.contains(&eq.process_type) {
                continue;
            }
            let utilization = self.utilization(&eq.id);
            if utilization > self.bottleneck_threshold {
                return Err(RejectReason::MachineOverloaded {
                    order_id: order.id.clone(),
                    machine: eq.id.clone(),
                    utilization,
                });
            }
        }
        Ok(())
    }

    pub fn can_release(&self, order: &Order, bom: &Bom) -> bool {
        self.check_release(order, bom).is_ok()
    }

    /// Consumes the order's materials from the projection. The projection
    /// may go negative when earlier admissions were optimistic; by default
    /// that is logged and the subtraction still happens. In strict mode the
    /// commit is refused and nothing is subtracted.
    pub fn commit(&mut self, order: &Order, bom: &Bom) -> Result<(), RejectReason> {
        if self.strict_materials {
            for (material, per_unit) in &bom.components {
                let needed = per_unit * order.quantity;
                let available = self.projected_inventory.get(material).copied().unwrap_or(0);
                if available < needed {
                    return Err(RejectReason::MaterialShortage {
                        order_id: order.id.clone(),
                        material: material.clone(),
                        needed,
                        available,
                    });
                }
            }
        }
        for (material, per_unit) in &bom.components {
            let needed = per_unit * order.quantity;
            let balance = self.projected_inventory.entry(material.clone()).or_insert(0);
            *balance -= needed;
            if *balance < 0 {
                warn!(
                    "material {material} over-committed for order {}: stock {}, drawn {needed}",
                    order.id,
                    *balance + needed,
                );
            }
        }
        Ok(())
    }

    /// Recomputes the projected machine load from a finished plan by
    /// summing assignment durations per machine. Calling this twice with
    /// the same plan yields the same loads.
    pub fn apply_plan(&mut self, plan: &[PlanEntry]) {
        for load in self.projected_load.values_mut() {
            *load = 0;
        }
        for entry in plan {
            for process in &entry.processes {
                if let Some(load) = self.projected_load.get_mut(&process.equipment_id) {
                    *load += process.end_time - process.start_time;
                }
            }
        }
    }

    pub fn projected_load(&self, equipment_id: &str) -> i64 {
        self.projected_load.get(equipment_id).copied().unwrap_or(0)
    }

    pub fn projected_inventory(&self, material: &str) -> i64 {
        self.projected_inventory.get(material).copied().unwrap_or(0)
    }

    fn utilization(&self, equipment_id: &str) -> f64 {
        self.projected_load(equipment_id) as f64 / self.horizon_hours as f64
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{timestamp, ProcessAssignment};

    fn machine(id: &str, process: &str, rate: f64) -> Equipment {
        Equipment {
            id: id.to_string(),
            name: id.to_string(),
            process_type: process.to_string(),
            production_rate: rate,
            qualified_rate: 0.98,
            unqualified_rate: 0.02,
        }
    }

    fn order(id: &str, product: &str, quantity: i64) -> Order {
        Order {
            id: id.to_string(),
            product_id: product.to_string(),
            quantity,
            delivery_date: timestamp("2025-06-07 08:00:00"),
            priority: 1,
            status: crate::model::OrderStatus::Pending,
        }
    }

    fn bom(product: &str, components: &[(&str, i64)], sequence: &[&str]) -> Bom {
        Bom {
            product_id: product.to_string(),
            components: components
                .iter()
                .map(|(m, q)| ((*m).to_string(), *q))
                .collect(),
            process_sequence: sequence.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn entry(order_id: &str, machine: &str, start: i64, end: i64) -> PlanEntry {
        PlanEntry {
            order_id: order_id.to_string(),
            product_id: "P001".to_string(),
            quantity: 10,
            delivery_date: timestamp("2025-06-07 08:00:00"),
            processes: vec![ProcessAssignment {
                process_type: "machining".to_string(),
                equipment_id: machine.to_string(),
                start_time: start,
                end_time: end,
            }],
        }
    }

    #[test]
    fn rejects_on_material_shortage() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let release = DynamicRelease::new(
            &machines,
            HashMap::from([("M001".to_string(), 50)]),
            &PlannerConfig::default(),
        );
        let bom = bom("P001", &[("M001", 2)], &["machining"]);
        assert!(!release.can_release(&order("ORD001", "P001", 100), &bom));
        let reason = release.check_release(&order("ORD001", "P001", 100), &bom);
        assert_eq!(
            reason,
            Err(RejectReason::MaterialShortage {
                order_id: "ORD001".to_string(),
                material: "M001".to_string(),
                needed: 200,
                available: 50,
            })
        );
    }

    #[test]
    fn rejects_when_bottleneck_is_saturated() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let config = PlannerConfig {
            horizon_hours: 100,
            ..PlannerConfig::default()
        };
        let mut release =
            DynamicRelease::new(&machines, HashMap::from([("M001".to_string(), 1000)]), &config);
        release.apply_plan(&[entry("ORD000", "EQ001", 0, 90)]);

        let bom = bom("P001", &[("M001", 1)], &["machining"]);
        match release.check_release(&order("ORD001", "P001", 10), &bom) {
            Err(RejectReason::MachineOverloaded {
                machine,
                utilization,
                ..
            }) => {
                assert_eq!(machine, "EQ001");
                assert!((utilization - 0.9).abs() < 1e-9);
            }
            other => panic!("expected overload rejection, got {other:?}"),
        }
    }

    #[test]
    fn commit_draws_down_each_component() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let stock = HashMap::from([("M001".to_string(), 500), ("M002".to_string(), 300)]);
        let mut release = DynamicRelease::new(&machines, stock, &PlannerConfig::default());
        let bom = bom("P001", &[("M001", 2), ("M002", 1)], &["machining"]);

        release.commit(&order("ORD001", "P001", 100), &bom).unwrap();
        assert_eq!(release.projected_inventory("M001"), 300);
        assert_eq!(release.projected_inventory("M002"), 200);
    }

    #[test]
    fn lenient_commit_goes_negative_with_warning() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let mut release = DynamicRelease::new(
            &machines,
            HashMap::from([("M001".to_string(), 50)]),
            &PlannerConfig::default(),
        );
        let bom = bom("P001", &[("M001", 2)], &["machining"]);
        release.commit(&order("ORD001", "P001", 100), &bom).unwrap();
        assert_eq!(release.projected_inventory("M001"), -150);
    }

    #[test]
    fn strict_commit_refuses_overdraw() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let config = PlannerConfig {
            strict_materials: true,
            ..PlannerConfig::default()
        };
        let mut release =
            DynamicRelease::new(&machines, HashMap::from([("M001".to_string(), 50)]), &config);
        let bom = bom("P001", &[("M001", 2)], &["machining"]);
        let result = release.commit(&order("ORD001", "P001", 100), &bom);
        assert!(matches!(
            result,
            Err(RejectReason::MaterialShortage { needed: 200, .. })
        ));
        assert_eq!(release.projected_inventory("M001"), 50);
    }

    #[test]
    fn apply_plan_is_idempotent() {
        let machines = [
            machine("EQ001", "machining", 10.0),
            machine("EQ002", "assembly", 5.0),
        ];
        let mut release =
            DynamicRelease::new(&machines, HashMap::new(), &PlannerConfig::default());
        let plan = [entry("ORD001", "EQ001", 0, 10), entry("ORD002", "EQ001", 10, 15)];

        release.apply_plan(&plan);
        let first = (release.projected_load("EQ001"), release.projected_load("EQ002"));
        release.apply_plan(&plan);
        let second = (release.projected_load("EQ001"), release.projected_load("EQ002"));

        assert_eq!(first, (15, 0));
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_machines_in_plan_are_ignored() {
        let machines = [machine("EQ001", "machining", 10.0)];
        let mut release =
            DynamicRelease::new(&machines, HashMap::new(), &PlannerConfig::default());
        release.apply_plan(&[entry("ORD001", "EQ999", 0, 10)]);
        assert_eq!(release.projected_load("EQ999"), 0);
    }
}
