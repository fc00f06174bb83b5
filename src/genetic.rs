//! Heuristic fallback: a genetic algorithm over assignment-and-timing
//! chromosomes. Always returns a plan, possibly a suboptimal one.
//!
//! Chromosomes keep every order's steps chained in BOM order; machine
//! clashes between orders are not repaired, only penalized through the
//! fitness mix of total completion time, lateness, and load balance.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::{index, IndexedRandom};
use rand::{Rng, SeedableRng};

use crate::config::PlannerConfig;
use crate::model::{
    bom_for, processing_hours, Bom, Equipment, Order, PlanEntry, ProcessAssignment,
};

/// One scheduled step inside a chromosome.
#[derive(Clone, Debug)]
struct Gene {
    process: String,
    equipment_idx: usize,
    start: i64,
    end: i64,
}

/// Per-order slice of a chromosome, steps in BOM sequence order.
#[derive(Clone, Debug)]
struct OrderGenes {
    order_idx: usize,
    genes: Vec<Gene>,
}

type Individual = Vec<OrderGenes>;

pub struct GaScheduler<'a> {
    orders: &'a [Order],
    equipment: &'a [Equipment],
    boms: &'a [Bom],
    horizon: i64,
    population_size: usize,
    generations: usize,
    crossover_rate: f64,
    mutation_rate: f64,
    /// Due dates in hours relative to the cycle-local t=0.
    due_hours: Vec<i64>,
    rng: StdRng,
}

impl<'a> GaScheduler<'a> {
    pub fn new(
        orders: &'a [Order],
        equipment: &'a [Equipment],
        boms: &'a [Bom],
        cycle_start: NaiveDateTime,
        config: &PlannerConfig,
    ) -> Self {
        let due_hours = orders
            .iter()
            .map(|order| (order.delivery_date - cycle_start).num_hours())
            .collect();
        let rng = match config.ga_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            orders,
            equipment,
            boms,
            horizon: i64::from(config.horizon_hours),
            population_size: config.ga_population,
            generations: config.ga_generations,
            crossover_rate: config.ga_crossover_rate,
            mutation_rate: config.ga_mutation_rate,
            due_hours,
            rng,
        }
    }

    /// Evolves a population and converts the best individual ever seen
    /// into a plan.
    pub fn run(&mut self) -> Vec<PlanEntry> {
        if self.orders.is_empty() || self.population_size == 0 {
            warn!("genetic scheduler has nothing to evolve; returning an empty plan");
            return Vec::new();
        }
        info!(
            "genetic scheduler: {} orders, population {}, {} generations",
            self.orders.len(),
            self.population_size,
            self.generations
        );

        let mut population: Vec<Individual> = (0..self.population_size)
            .map(|_| self.create_individual())
            .collect();
        let mut best = population[0].clone();
        let mut best_fitness = 0.0;

        for generation in 0..self.generations {
            population = self.evolve(population);
            let current = population
                .iter()
                .map(|individual| (self.fitness(individual), individual))
                .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            if let Some((fitness, individual)) = current {
                if fitness > best_fitness {
                    best_fitness = fitness;
                    best = individual.clone();
                }
            }
            if generation % 10 == 0 {
                debug!("generation {generation}: best fitness {best_fitness:.6}");
            }
        }
        self.to_plan(&best)
    }

    fn qualified(&self, process: &str) -> Vec<usize> {
        self.equipment
            .iter()
            .enumerate()
            .filter(|(_, eq)| eq.process_type == process)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Random chromosome: per step a throughput-weighted machine and a
    /// random start no earlier than the order's running chain time.
    fn create_individual(&mut self) -> Individual {
        let mut individual = Vec::with_capacity(self.orders.len());
        for (order_idx, order) in self.orders.iter().enumerate() {
            let mut genes = Vec::new();
            let Some(bom) = bom_for(self.boms, &order.product_id) else {
                warn!("no BOM for product {}; order {} gets no steps", order.product_id, order.id);
                individual.push(OrderGenes { order_idx, genes });
                continue;
            };
            let mut current_time = 0;
            for process in &bom.process_sequence {
                let machines = self.qualified(process);
                if machines.is_empty() {
                    warn!("no machine available for process {process}; omitted for order {}", order.id);
                    continue;
                }
                let equipment_idx = match machines
                    .choose_weighted(&mut self.rng, |&idx| self.equipment[idx].production_rate)
                {
                    Ok(&idx) => idx,
                    Err(_) => machines[0],
                };
                let hours =
                    processing_hours(order.quantity, self.equipment[equipment_idx].production_rate);
                let upper = (self.horizon - hours).max(0);
                let start = self.rng.random_range(0..=upper).max(current_time);
                let end = start + hours;
                genes.push(Gene {
                    process: process.clone(),
                    equipment_idx,
                    start,
                    end,
                });
                current_time = end;
            }
            individual.push(OrderGenes { order_idx, genes });
        }
        individual
    }

    /// Larger is better. Mixes total completion time, late-order count
    /// against cycle-local due hours, and machine load balance.
    fn fitness(&self, individual: &Individual) -> f64 {
        let mut total_completion = 0;
        let mut late_orders = 0;
        let mut load = vec![0i64; self.equipment.len()];

        for order_genes in individual {
            if order_genes.genes.is_empty() {
                continue;
            }
            let completion = order_genes.genes.iter().map(|g| g.end).max().unwrap_or(0);
            total_completion += completion;
            if completion > self.due_hours[order_genes.order_idx] {
                late_orders += 1;
            }
            for gene in &order_genes.genes {
                load[gene.equipment_idx] += gene.end - gene.start;
            }
        }

        let balance = match (load.iter().max(), load.iter().min()) {
            (Some(&max), Some(&min)) => {
                (1.0 - (max - min) as f64 / (self.horizon as f64 * 0.5)).max(0.0)
            }
            _ => 1.0,
        };
        let fitness = 1.0
            / (1.0 + total_completion as f64 / 1000.0 + f64::from(late_orders) * 500.0
                - balance * 100.0);
        fitness.max(1e-4)
    }

    /// Size-5 tournament without replacement; the two fittest sampled
    /// individuals become parents.
    fn select_parents<'b>(
        &mut self,
        scored: &'b [(f64, Individual)],
    ) -> (&'b Individual, &'b Individual) {
        let size = scored.len().min(5);
        let mut picks: Vec<usize> = index::sample(&mut self.rng, scored.len(), size)
            .into_iter()
            .collect();
        picks.sort_by(|&a, &b| {
            scored[b].0.partial_cmp(&scored[a].0).unwrap_or(Ordering::Equal)
        });
        let first = picks[0];
        let second = picks.get(1).copied().unwrap_or(first);
        (&scored[first].1, &scored[second].1)
    }

    /// Single-point crossover on the order axis, else a clone of the
    /// first parent.
    fn crossover(&mut self, parent1: &Individual, parent2: &Individual) -> Individual {
        if self.rng.random::<f64>() > self.crossover_rate || parent1.len() < 2 {
            return parent1.clone();
        }
        let point = self.rng.random_range(1..parent1.len());
        parent1[..point]
            .iter()
            .chain(parent2[point..].iter())
            .cloned()
            .collect()
    }

    /// Reassigns one random step to another qualified machine and pushes
    /// the downstream steps of the same order behind it, keeping their
    /// durations.
    fn mutate(&mut self, individual: &mut Individual) {
        if self.rng.random::<f64>() > self.mutation_rate || individual.is_empty() {
            return;
        }
        let order_pos = self.rng.random_range(0..individual.len());
        let order = &self.orders[individual[order_pos].order_idx];
        if individual[order_pos].genes.is_empty() {
            return;
        }
        let gene_pos = self.rng.random_range(0..individual[order_pos].genes.len());
        let current = individual[order_pos].genes[gene_pos].equipment_idx;
        let alternatives: Vec<usize> = self
            .qualified(&individual[order_pos].genes[gene_pos].process)
            .into_iter()
            .filter(|&idx| idx != current)
            .collect();
        let Some(&replacement) = alternatives.choose(&mut self.rng) else {
            return;
        };

        let hours = processing_hours(order.quantity, self.equipment[replacement].production_rate);
        let genes = &mut individual[order_pos].genes;
        genes[gene_pos].equipment_idx = replacement;
        genes[gene_pos].end = genes[gene_pos].start + hours;
        for pos in gene_pos + 1..genes.len() {
            let jitter = self.rng.random_range(0..=2);
            let previous_end = genes[pos - 1].end;
            let duration = genes[pos].end - genes[pos].start;
            genes[pos].start = genes[pos].start.max(previous_end + jitter);
            genes[pos].end = genes[pos].start + duration;
        }
    }

    /// One generation: elitism of one, then tournament + crossover +
    /// mutation until the population is full.
    fn evolve(&mut self, population: Vec<Individual>) -> Vec<Individual> {
        let mut scored: Vec<(f64, Individual)> = population
            .into_iter()
            .map(|individual| (self.fitness(&individual), individual))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut next = Vec::with_capacity(self.population_size);
        next.push(scored[0].1.clone());
        while next.len() < self.population_size {
            let (parent1, parent2) = self.select_parents(&scored);
            let mut child = self.crossover(parent1, parent2);
            self.mutate(&mut child);
            next.push(child);

            if next.len() < self.population_size {
                let (parent1, parent2) = self.select_parents(&scored);
                let mut child = self.crossover(parent2, parent1);
                self.mutate(&mut child);
                next.push(child);
            }
        }
        next
    }

    fn to_plan(&self, individual: &Individual) -> Vec<PlanEntry> {
        individual
            .iter()
            .map(|order_genes| {
                let order = &self.orders[order_genes.order_idx];
                PlanEntry {
                    order_id: order.id.clone(),
                    product_id: order.product_id.clone(),
                    quantity: order.quantity,
                    delivery_date: order.delivery_date,
                    processes: order_genes
                        .genes
                        .iter()
                        .map(|gene| ProcessAssignment {
                            process_type: gene.process.clone(),
                            equipment_id: self.equipment[gene.equipment_idx].id.clone(),
                            start_time: gene.start,
                            end_time: gene.end,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}
