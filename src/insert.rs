//! Incremental insertion: splices one newly arrived order into an existing
//! plan without re-solving. Existing assignments are never moved.

use log::{info, warn};
use thiserror::Error;

use crate::model::{
    bom_for, makespan, processing_hours, Bom, Equipment, Inventory, Order, PlanEntry,
    ProcessAssignment,
};

/// How far past the current plan end the inserter scans for a free hour.
const LOOKAHEAD_HOURS: i64 = 24 * 7;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum InsertError {
    #[error("no BOM for product {product_id}")]
    MissingBom { product_id: String },
    #[error("order {order_id} lacks material {material}: needs {needed}, has {available}")]
    MaterialShortage {
        order_id: String,
        material: String,
        needed: i64,
        available: i64,
    },
}

/// Appends a plan entry for `order` after everything already scheduled.
/// Each process goes to the least-loaded qualified machine (ties broken by
/// machine id) at the earliest free hour found within the lookahead
/// window.
pub fn splice_order(
    plan: &mut Vec<PlanEntry>,
    order: &Order,
    equipment: &[Equipment],
    boms: &[Bom],
    inventory: &Inventory,
) -> Result<(), InsertError> {
    let bom = bom_for(boms, &order.product_id).ok_or_else(|| InsertError::MissingBom {
        product_id: order.product_id.clone(),
    })?;

    for (material, per_unit) in &bom.components {
        let needed = per_unit * order.quantity;
        if !inventory.check_availability(material, needed) {
            return Err(InsertError::MaterialShortage {
                order_id: order.id.clone(),
                material: material.clone(),
                needed,
                available: inventory.raw_materials.get(material).copied().unwrap_or(0),
            });
        }
    }

    // Accumulated busy hours per machine, seeded from the existing plan.
    let mut load = vec![0i64; equipment.len()];
    for entry in plan.iter() {
        for process in &entry.processes {
            if let Some(idx) = equipment.iter().position(|eq| eq.id == process.equipment_id) {
                load[idx] += process.end_time - process.start_time;
            }
        }
    }

    let mut current_time = makespan(plan);
    let mut processes = Vec::with_capacity(bom.process_sequence.len());
    for process in &bom.process_sequence {
        let qualified: Vec<usize> = equipment
            .iter()
            .enumerate()
            .filter(|(_, eq)| eq.process_type == *process)
            .map(|(idx, _)| idx)
            .collect();
        let Some(&best) = qualified
            .iter()
            .min_by_key(|&&idx| (load[idx], equipment[idx].id.as_str()))
        else {
            warn!("no machine available for process {process}; omitted for order {}", order.id);
            continue;
        };

        let start = find_free_hour(plan, &equipment[best].id, current_time);
        let hours = processing_hours(order.quantity, equipment[best].production_rate);
        let end = start + hours;
        processes.push(ProcessAssignment {
            process_type: process.clone(),
            equipment_id: equipment[best].id.clone(),
            start_time: start,
            end_time: end,
        });
        load[best] += hours;
        current_time = end;
    }

    info!(
        "order {} spliced into the plan with {} assignments",
        order.id,
        processes.len()
    );
    plan.push(PlanEntry {
        order_id: order.id.clone(),
        product_id: order.product_id.clone(),
        quantity: order.quantity,
        delivery_date: order.delivery_date,
        processes,
    });
    Ok(())
}

/// First hour at or after `from` where the machine has no assignment,
/// scanned at one-hour granularity over the lookahead window. Falls back
/// to `from` when the window is fully booked.
fn find_free_hour(plan: &[PlanEntry], equipment_id: &str, from: i64) -> i64 {
    (from..from + LOOKAHEAD_HOURS)
        .find(|&hour| {
            plan.iter().flat_map(|entry| entry.processes.iter()).all(|process| {
                process.equipment_id != equipment_id
                    || process.end_time <= hour
                    || process.start_time >= hour + 1
            })
        })
        .unwrap_or(from)
}
