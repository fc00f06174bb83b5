//! End-to-end exercise of full planning cycles: admission, the exact
//! solve, the heuristic fallback, and incremental insertion.

use std::collections::BTreeMap;

use itertools::Itertools;
use production_scheduling::config::PlannerConfig;
use production_scheduling::insert::splice_order;
use production_scheduling::mes::{self, Snapshot};
use production_scheduling::model::{
    bom_for, machine_conflicts, makespan, processing_hours, timestamp, Bom, Equipment, Inventory,
    Order, OrderStatus,
};
use production_scheduling::planner::{run_cycle, Engine};
use production_scheduling::release::RejectReason;

fn quick_exact_config() -> PlannerConfig {
    PlannerConfig {
        exact_solver_time_limit_s: 20.0,
        ..PlannerConfig::default()
    }
}

#[test]
fn demo_cycle_produces_a_lawful_exact_plan() {
    let snapshot = Snapshot::demo();
    let result = run_cycle(&snapshot, &quick_exact_config());

    assert_eq!(result.engine, Engine::Exact);
    // The material projection admits ORD002 (priority 1) and ORD001
    // (priority 2); the other three exhaust M001/M002/M003.
    let planned: Vec<&str> = result
        .plan
        .iter()
        .map(|entry| entry.order_id.as_str())
        .sorted()
        .collect();
    assert_eq!(planned, ["ORD001", "ORD002"]);
    assert_eq!(result.rejections.len(), 3);
    assert!(result
        .rejections
        .iter()
        .all(|(_, reason)| matches!(reason, RejectReason::MaterialShortage { .. })));

    for entry in &result.plan {
        let bom = bom_for(&snapshot.boms, &entry.product_id).unwrap();
        assert_eq!(entry.processes.len(), bom.process_sequence.len());
        for (process, expected) in entry.processes.iter().zip(&bom.process_sequence) {
            assert_eq!(&process.process_type, expected);
        }
        for (prev, next) in entry.processes.iter().tuple_windows() {
            assert!(prev.end_time <= next.start_time);
        }
        for process in &entry.processes {
            let eq = snapshot
                .equipment
                .iter()
                .find(|eq| eq.id == process.equipment_id)
                .unwrap();
            assert_eq!(eq.process_type, process.process_type);
            assert_eq!(
                process.end_time - process.start_time,
                processing_hours(entry.quantity, eq.production_rate)
            );
        }
    }
    assert_eq!(machine_conflicts(&result.plan), 0);

    for entry in &result.plan {
        let order = result
            .orders
            .iter()
            .find(|order| order.id == entry.order_id)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Scheduled);
    }
}

#[test]
fn higher_priority_wins_contested_material() {
    let snapshot = Snapshot {
        cycle_start: timestamp("2025-06-02 08:00:00"),
        equipment: vec![Equipment {
            id: "M1".to_string(),
            name: "M1".to_string(),
            process_type: "A".to_string(),
            production_rate: 10.0,
            qualified_rate: 0.98,
            unqualified_rate: 0.02,
        }],
        orders: vec![
            Order {
                id: "ORD_LOW".to_string(),
                product_id: "P001".to_string(),
                quantity: 100,
                delivery_date: timestamp("2025-06-07 08:00:00"),
                priority: 2,
                status: OrderStatus::Pending,
            },
            Order {
                id: "ORD_HIGH".to_string(),
                product_id: "P001".to_string(),
                quantity: 100,
                delivery_date: timestamp("2025-06-07 08:00:00"),
                priority: 1,
                status: OrderStatus::Pending,
            },
        ],
        boms: vec![Bom {
            product_id: "P001".to_string(),
            components: BTreeMap::from([("M001".to_string(), 2)]),
            process_sequence: vec!["A".to_string()],
        }],
        // Enough M001 for exactly one of the two orders.
        inventory: Inventory {
            raw_materials: BTreeMap::from([("M001".to_string(), 200)]),
            finished_products: BTreeMap::new(),
        },
    };

    let result = run_cycle(&snapshot, &quick_exact_config());

    assert_eq!(result.plan.len(), 1);
    assert_eq!(result.plan[0].order_id, "ORD_HIGH");
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].0, "ORD_LOW");
    assert!(matches!(
        result.rejections[0].1,
        RejectReason::MaterialShortage {
            needed: 200,
            available: 0,
            ..
        }
    ));
}

#[test]
fn exact_failure_falls_back_to_the_seeded_heuristic() {
    let snapshot = Snapshot::demo();
    // A 10-hour horizon cannot fit the released orders' chains, so the
    // exact model has no feasible window and the GA takes over.
    let config = PlannerConfig {
        horizon_hours: 10,
        ga_population: 10,
        ga_generations: 20,
        ga_seed: Some(11),
        ..PlannerConfig::default()
    };

    let first = run_cycle(&snapshot, &config);
    assert_eq!(first.engine, Engine::Heuristic);
    assert!(!first.plan.is_empty());

    let second = run_cycle(&snapshot, &config);
    assert_eq!(first.plan, second.plan);
}

#[test]
fn incremental_insert_extends_a_cycle_plan() {
    let snapshot = Snapshot::demo();
    let mut result = run_cycle(&snapshot, &quick_exact_config());
    let plan_end = makespan(&result.plan);

    let new_order = Order {
        id: "ORD006".to_string(),
        product_id: "P003".to_string(),
        quantity: 40,
        delivery_date: timestamp("2025-06-10 08:00:00"),
        priority: 1,
        status: OrderStatus::Pending,
    };
    splice_order(
        &mut result.plan,
        &new_order,
        &snapshot.equipment,
        &snapshot.boms,
        &snapshot.inventory,
    )
    .unwrap();

    let added = result.plan.last().unwrap();
    assert_eq!(added.order_id, "ORD006");
    assert_eq!(added.processes.len(), 3);
    assert!(added.processes[0].start_time >= plan_end);
    for (prev, next) in added.processes.iter().tuple_windows() {
        assert!(prev.end_time <= next.start_time);
    }
}

#[test]
fn plan_serializes_to_the_mes_submission_shape() {
    let snapshot = Snapshot::demo();
    let result = run_cycle(&snapshot, &quick_exact_config());

    let json = mes::plan_to_json(&result.plan).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let first = &value[0];
    for key in ["order_id", "product_id", "quantity", "delivery_date", "processes"] {
        assert!(first.get(key).is_some(), "missing plan key {key}");
    }
    let process = &first["processes"][0];
    for key in ["process_type", "equipment_id", "start_time", "end_time"] {
        assert!(process.get(key).is_some(), "missing process key {key}");
    }
    assert!(process["start_time"].is_i64());
}
