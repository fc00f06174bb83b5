//! One planning cycle: admission in priority order, the exact solve, the
//! heuristic fallback, and the projected-load update for the next cycle.

use log::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::exact;
use crate::genetic::GaScheduler;
use crate::mes::Snapshot;
use crate::model::{bom_for, machine_conflicts, makespan, Order, OrderStatus, PlanEntry};
use crate::release::{DynamicRelease, RejectReason};

/// Which engine produced the cycle's plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
    Exact,
    Heuristic,
    /// Nothing was releasable, so no engine ran.
    None,
}

/// Outcome of one planning cycle. `orders` is the cycle's own copy of the
/// snapshot orders with statuses advanced; the snapshot itself is never
/// mutated.
#[derive(Debug)]
pub struct CycleResult {
    pub plan: Vec<PlanEntry>,
    pub engine: Engine,
    pub orders: Vec<Order>,
    pub rejections: Vec<(String, RejectReason)>,
    pub missing_bom: Vec<String>,
}

/// Runs a full planning cycle over an input snapshot.
pub fn run_cycle(snapshot: &Snapshot, config: &PlannerConfig) -> CycleResult {
    let mut orders = snapshot.orders.clone();
    // Stable, so equal priorities keep their input order.
    orders.sort_by_key(|order| order.priority);

    let raw_materials = snapshot
        .inventory
        .raw_materials
        .iter()
        .map(|(material, stock)| (material.clone(), *stock))
        .collect();
    let mut release = DynamicRelease::new(&snapshot.equipment, raw_materials, config);

    let mut released = Vec::new();
    let mut rejections = Vec::new();
    let mut missing_bom = Vec::new();
    for order in &mut orders {
        let Some(bom) = bom_for(&snapshot.boms, &order.product_id) else {
            warn!(
                "order {} skipped: no BOM for product {}",
                order.id, order.product_id
            );
            missing_bom.push(order.id.clone());
            continue;
        };
        match release
            .check_release(order, bom)
            .and_then(|()| release.commit(order, bom))
        {
            Ok(()) => {
                order.status = OrderStatus::Released;
                released.push(order.clone());
            }
            Err(reason) => {
                warn!("held back: {reason}");
                rejections.push((order.id.clone(), reason));
            }
        }
    }

    if released.is_empty() {
        info!("no orders releasable this cycle");
        return CycleResult {
            plan: Vec::new(),
            engine: Engine::None,
            orders,
            rejections,
            missing_bom,
        };
    }
    info!("released {} of {} orders", released.len(), orders.len());

    let (plan, engine) = match exact::solve(
        &released,
        &snapshot.equipment,
        &snapshot.boms,
        &snapshot.inventory,
        config,
    ) {
        Ok(plan) => (plan, Engine::Exact),
        Err(error) => {
            warn!("exact scheduler failed ({error}); falling back to the genetic scheduler");
            let plan = GaScheduler::new(
                &released,
                &snapshot.equipment,
                &snapshot.boms,
                snapshot.cycle_start,
                config,
            )
            .run();
            (plan, Engine::Heuristic)
        }
    };

    if plan.is_empty() {
        warn!(
            "cycle degraded to an empty plan for {} released orders",
            released.len()
        );
    } else if engine == Engine::Heuristic {
        let conflicts = machine_conflicts(&plan);
        if conflicts > 0 {
            debug!("heuristic plan tolerates {conflicts} machine conflicts");
        }
    }

    release.apply_plan(&plan);
    for entry in &plan {
        if entry.processes.is_empty() {
            continue;
        }
        if let Some(order) = orders.iter_mut().find(|order| order.id == entry.order_id) {
            order.status = OrderStatus::Scheduled;
        }
    }
    info!(
        "cycle complete: {} planned orders via {engine:?}, makespan {}h",
        plan.len(),
        makespan(&plan)
    );

    CycleResult {
        plan,
        engine,
        orders,
        rejections,
        missing_bom,
    }
}
