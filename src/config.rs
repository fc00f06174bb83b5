//! Tunables for one planning cycle.

/// Planner configuration. Defaults follow the shop's standing values: a
/// 30-day hourly horizon and an 80% bottleneck ceiling.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// Maximum projected utilization a machine may reach before admission
    /// stops releasing orders that need it. In (0, 1].
    pub bottleneck_threshold: f64,
    /// Planning horizon in hours from the cycle-local t=0.
    pub horizon_hours: u32,
    /// Wall-clock budget for the exact solver, in seconds.
    pub exact_solver_time_limit_s: f64,
    pub ga_population: usize,
    pub ga_generations: usize,
    pub ga_crossover_rate: f64,
    pub ga_mutation_rate: f64,
    /// Seed for the genetic scheduler. Fixing it makes heuristic plans
    /// reproducible; `None` seeds from the OS.
    pub ga_seed: Option<u64>,
    /// When true, a commit that would drive the projected inventory
    /// negative is refused instead of logged.
    pub strict_materials: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            bottleneck_threshold: 0.8,
            horizon_hours: 24 * 30,
            exact_solver_time_limit_s: 30.0,
            ga_population: 50,
            ga_generations: 100,
            ga_crossover_rate: 0.8,
            ga_mutation_rate: 0.1,
            ga_seed: None,
            strict_materials: false,
        }
    }
}
