//! Exact scheduler: a time-indexed binary integer program minimizing total
//! completion time, solved with HiGHS under a wall-clock limit.
//!
//! One binary `x[o,i,e,t]` means "step i of order o starts at hour t on
//! machine e". Start hours are restricted to a candidate window per step:
//! no earlier than the chain of minimum predecessor durations, no later
//! than the effective horizon minus the step's own duration. The effective
//! horizon is capped by the serial worst-machine bound, which always
//! contains a left-shifted optimum.

use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel, Variable};
use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::PlannerConfig;
use crate::model::{
    bom_for, makespan, processing_hours, Bom, Equipment, Inventory, Order, PlanEntry,
    ProcessAssignment,
};

/// Reasons the exact scheduler could not deliver an optimal plan. Every
/// variant sends the caller to the heuristic fallback.
#[derive(Debug, Error)]
pub enum ExactError {
    #[error("no machine can perform process {process}")]
    NoQualifiedMachine { process: String },
    #[error("no start hour within the horizon fits process {process} of order {order_id}")]
    HorizonExhausted { order_id: String, process: String },
    #[error("solver did not reach an optimal plan: {0}")]
    Resolution(#[from] good_lp::ResolutionError),
}

/// Start-hour variables for one step on one candidate machine.
struct SlotVars {
    equipment_idx: usize,
    hours: i64,
    starts: Vec<(i64, Variable)>,
}

/// All candidate placements of one process step.
struct StepVars {
    process: String,
    slots: Vec<SlotVars>,
}

struct OrderVars<'a> {
    order: &'a Order,
    steps: Vec<StepVars>,
}

/// Builds and solves the integer program for the released orders and
/// extracts the plan. Orders whose materials do not cover the full
/// quantity at build time are dropped from the model and logged.
pub fn solve(
    orders: &[Order],
    equipment: &[Equipment],
    boms: &[Bom],
    inventory: &Inventory,
    config: &PlannerConfig,
) -> Result<Vec<PlanEntry>, ExactError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let modeled = material_feasible(orders, boms, inventory);
    if modeled.is_empty() {
        return Ok(Vec::new());
    }

    let qualified = |process: &str| -> Vec<usize> {
        equipment
            .iter()
            .enumerate()
            .filter(|(_, eq)| eq.process_type == process)
            .map(|(idx, _)| idx)
            .collect()
    };

    // Serializing every step on its slowest machine is always feasible, so
    // the horizon never needs to extend past that bound.
    let mut serial_bound = 0;
    for &(order, bom) in &modeled {
        for process in &bom.process_sequence {
            let machines = qualified(process);
            let worst = machines
                .iter()
                .map(|&e| processing_hours(order.quantity, equipment[e].production_rate))
                .max()
                .ok_or_else(|| ExactError::NoQualifiedMachine {
                    process: process.clone(),
                })?;
            serial_bound += worst;
        }
    }
    let horizon = i64::from(config.horizon_hours).min(serial_bound).max(1);

    let mut vars = variables!();
    let mut variable_count = 0usize;
    let mut order_vars = Vec::with_capacity(modeled.len());
    for &(order, bom) in &modeled {
        let mut earliest = 0;
        let mut steps = Vec::with_capacity(bom.process_sequence.len());
        for (step_idx, process) in bom.process_sequence.iter().enumerate() {
            let machines = qualified(process);
            let mut slots = Vec::with_capacity(machines.len());
            for &equipment_idx in &machines {
                let hours = processing_hours(order.quantity, equipment[equipment_idx].production_rate);
                let starts = (earliest..=horizon - hours)
                    .map(|t| {
                        (
                            t,
                            vars.add(variable().binary().name(format!(
                                "x_{}_{}_{}_{}",
                                order.id, step_idx, equipment[equipment_idx].id, t
                            ))),
                        )
                    })
                    .collect::<Vec<_>>();
                variable_count += starts.len();
                if !starts.is_empty() {
                    slots.push(SlotVars {
                        equipment_idx,
                        hours,
                        starts,
                    });
                }
            }
            if slots.is_empty() {
                return Err(ExactError::HorizonExhausted {
                    order_id: order.id.clone(),
                    process: process.clone(),
                });
            }
            earliest += machines
                .iter()
                .map(|&e| processing_hours(order.quantity, equipment[e].production_rate))
                .min()
                .unwrap_or(1);
            steps.push(StepVars {
                process: process.clone(),
                slots,
            });
        }
        order_vars.push(OrderVars { order, steps });
    }
    debug!(
        "exact model: {} orders, {variable_count} binaries, horizon {horizon}h",
        order_vars.len()
    );

    // Completion hour of each placement, summed over all orders.
    let mut objective_terms: Vec<Expression> = Vec::new();
    for order_var in &order_vars {
        for step in &order_var.steps {
            for slot in &step.slots {
                for &(t, var) in &slot.starts {
                    objective_terms.push(var * (t + slot.hours) as f64);
                }
            }
        }
    }
    let objective: Expression = objective_terms.into_iter().sum();

    let mut problem = vars
        .minimise(objective)
        .using(highs)
        .set_time_limit(config.exact_solver_time_limit_s);

    // Each step starts exactly once, on exactly one qualified machine.
    for order_var in &order_vars {
        for step in &order_var.steps {
            let total: Expression = step
                .slots
                .iter()
                .flat_map(|slot| slot.starts.iter().map(|&(_, var)| var))
                .sum();
            problem = problem.with(constraint!(total == 1));
        }
    }

    // A machine runs at most one assignment during any hour of the horizon.
    let mut busy: Vec<Vec<Vec<Variable>>> =
        vec![vec![Vec::new(); horizon as usize]; equipment.len()];
    for order_var in &order_vars {
        for step in &order_var.steps {
            for slot in &step.slots {
                for &(t, var) in &slot.starts {
                    for tau in t..t + slot.hours {
                        busy[slot.equipment_idx][tau as usize].push(var);
                    }
                }
            }
        }
    }
    for machine_hours in &busy {
        for hour_vars in machine_hours {
            if hour_vars.len() > 1 {
                let occupied: Expression = hour_vars.iter().copied().sum();
                problem = problem.with(constraint!(occupied <= 1));
            }
        }
    }

    // Consecutive steps of an order may not run out of order: a successor
    // start excludes every predecessor start that would still be running.
    // Aggregating the predecessors per successor variable keeps the row
    // count linear in the horizon.
    for order_var in &order_vars {
        for (prev, next) in order_var.steps.iter().tuple_windows() {
            for slot in &next.slots {
                for &(t2, next_var) in &slot.starts {
                    let mut conflicting = vec![next_var];
                    for prev_slot in &prev.slots {
                        for &(t1, prev_var) in &prev_slot.starts {
                            if t1 + prev_slot.hours > t2 {
                                conflicting.push(prev_var);
                            }
                        }
                    }
                    if conflicting.len() > 1 {
                        let lhs: Expression = conflicting.into_iter().sum();
                        problem = problem.with(constraint!(lhs <= 1));
                    }
                }
            }
        }
    }

    let solution = problem.solve()?;

    let mut plan = Vec::with_capacity(order_vars.len());
    for order_var in &order_vars {
        let mut processes = Vec::with_capacity(order_var.steps.len());
        for step in &order_var.steps {
            let chosen = step.slots.iter().find_map(|slot| {
                slot.starts
                    .iter()
                    .find(|&&(_, var)| solution.value(var) > 0.5)
                    .map(|&(t, _)| (slot.equipment_idx, slot.hours, t))
            });
            let Some((equipment_idx, hours, start)) = chosen else {
                warn!(
                    "solver returned no start for process {} of order {}",
                    step.process, order_var.order.id
                );
                continue;
            };
            processes.push(ProcessAssignment {
                process_type: step.process.clone(),
                equipment_id: equipment[equipment_idx].id.clone(),
                start_time: start,
                end_time: start + hours,
            });
        }
        plan.push(PlanEntry {
            order_id: order_var.order.id.clone(),
            product_id: order_var.order.product_id.clone(),
            quantity: order_var.order.quantity,
            delivery_date: order_var.order.delivery_date,
            processes,
        });
    }
    info!(
        "exact schedule: {} orders, makespan {}h",
        plan.len(),
        makespan(&plan)
    );
    Ok(plan)
}

/// Splits off the orders whose full quantity is covered by the raw
/// material snapshot. The rest are dropped from the model.
fn material_feasible<'a>(
    orders: &'a [Order],
    boms: &'a [Bom],
    inventory: &Inventory,
) -> Vec<(&'a Order, &'a Bom)> {
    orders
        .iter()
        .filter_map(|order| {
            let Some(bom) = bom_for(boms, &order.product_id) else {
                warn!(
                    "order {} skipped by exact model: no BOM for product {}",
                    order.id, order.product_id
                );
                return None;
            };
            let shortage = bom
                .components
                .iter()
                .find(|&(material, per_unit)| {
                    !inventory.check_availability(material, per_unit * order.quantity)
                });
            if let Some((material, _)) = shortage {
                warn!(
                    "order {} dropped from exact model: material {material} cannot cover quantity {}",
                    order.id, order.quantity
                );
                return None;
            }
            Some((order, bom))
        })
        .collect()
}
