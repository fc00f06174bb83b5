// Small helper functions to generate random input snapshots.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::{index, IndexedRandom};
use rand::{Rng, SeedableRng};

use crate::mes::Snapshot;
use crate::model::{timestamp, Bom, Equipment, Inventory, Order, OrderStatus};

const PROCESS_POOL: [&str; 5] = [
    "machining",
    "assembly",
    "inspection",
    "polishing",
    "packaging",
];
const MATERIAL_POOL: [&str; 8] = [
    "M001", "M002", "M003", "M004", "M005", "M006", "M007", "M008",
];

/// Generates a randomized input snapshot with `order_count` orders,
/// `machine_count` machines and `product_count` products. Every process
/// used by a product is covered by at least one machine. A fixed seed
/// reproduces the snapshot exactly.
pub fn snapshot(
    order_count: usize,
    machine_count: usize,
    product_count: usize,
    seed: Option<u64>,
) -> Snapshot {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let cycle_start = timestamp("2025-06-02 08:00:00");

    let machine_count = machine_count.max(1);
    let active = &PROCESS_POOL[..machine_count.min(PROCESS_POOL.len())];

    let equipment: Vec<Equipment> = (0..machine_count)
        .map(|index| {
            let process = active[index % active.len()];
            let qualified = rng.random_range(0.9..0.995);
            Equipment {
                id: format!("EQ{:03}", index + 1),
                name: format!("{process} cell {}", index + 1),
                process_type: process.to_string(),
                production_rate: rng.random_range(4.0..20.0),
                qualified_rate: qualified,
                unqualified_rate: 1.0 - qualified,
            }
        })
        .collect();

    let boms: Vec<Bom> = (0..product_count.max(1))
        .map(|product| {
            let component_count = rng.random_range(1..=3);
            let components = index::sample(&mut rng, MATERIAL_POOL.len(), component_count)
                .into_iter()
                .map(|material| (MATERIAL_POOL[material].to_string(), rng.random_range(1..=3)))
                .collect();
            let step_count = rng.random_range(1..=active.len().min(3));
            let process_sequence = index::sample(&mut rng, active.len(), step_count)
                .into_iter()
                .map(|process| active[process].to_string())
                .collect();
            Bom {
                product_id: format!("P{:03}", product + 1),
                components,
                process_sequence,
            }
        })
        .collect();

    let orders: Vec<Order> = (0..order_count)
        .map(|order| {
            let product_id = boms
                .choose(&mut rng)
                .map_or_else(|| "P001".to_string(), |bom| bom.product_id.clone());
            Order {
                id: format!("ORD{:03}", order + 1),
                product_id,
                quantity: rng.random_range(20..=200),
                delivery_date: cycle_start + Duration::hours(rng.random_range(48..=240)),
                priority: rng.random_range(1..=3),
                status: OrderStatus::Pending,
            }
        })
        .collect();

    let inventory = Inventory {
        raw_materials: MATERIAL_POOL
            .iter()
            .map(|material| ((*material).to_string(), rng.random_range(300..=900)))
            .collect(),
        finished_products: boms
            .iter()
            .map(|bom| (bom.product_id.clone(), rng.random_range(0..=50)))
            .collect(),
    };

    Snapshot {
        cycle_start,
        equipment,
        orders,
        boms,
        inventory,
    }
}
