use chrono::Duration;
use clap::{Parser, Subcommand};

use production_scheduling::config::PlannerConfig;
use production_scheduling::mes::{self, Snapshot};
use production_scheduling::planner::{self, CycleResult};
use production_scheduling::{generate, render};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs one planning cycle over a snapshot and prints the plan
    Plan {
        /// Input snapshot JSON file; uses the built-in demo dataset when
        /// omitted
        #[arg(short, long)]
        input: Option<String>,

        /// Bottleneck utilization threshold in (0, 1]
        #[arg(long)]
        threshold: Option<f64>,

        /// Planning horizon in hours
        #[arg(long)]
        horizon: Option<u32>,

        /// Wall-clock budget for the exact solver, in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Seed for the genetic fallback, for reproducible plans
        #[arg(long)]
        seed: Option<u64>,

        /// Write the plan as MES submission JSON to this path
        #[arg(long)]
        json: Option<String>,

        /// Write the plan as flat CSV rows to this path
        #[arg(long)]
        csv: Option<String>,

        /// Render the plan to an SVG Gantt board at this path
        #[arg(long)]
        svg: Option<String>,

        /// Open the rendered SVG if created
        #[arg(long)]
        open: bool,
    },
    /// Generates a random input snapshot file
    Generate {
        /// Number of orders to generate
        #[arg(short, long)]
        n: usize,

        /// Number of machines to generate
        #[arg(short, long)]
        machines: usize,

        /// Number of products to generate
        #[arg(short, long)]
        products: usize,

        /// Seed for reproducible snapshots
        #[arg(long)]
        seed: Option<u64>,

        /// Output snapshot JSON file
        #[arg(short, long)]
        output: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Plan {
            input,
            threshold,
            horizon,
            time_limit,
            seed,
            json,
            csv,
            svg,
            open,
        } => {
            let snapshot = match input {
                Some(path) => {
                    let data =
                        std::fs::read_to_string(path).expect("could not read snapshot file");
                    Snapshot::from_json(&data).expect("could not parse snapshot file")
                }
                None => Snapshot::demo(),
            };

            let mut config = PlannerConfig::default();
            if let Some(threshold) = threshold {
                config.bottleneck_threshold = *threshold;
            }
            if let Some(horizon) = horizon {
                config.horizon_hours = *horizon;
            }
            if let Some(time_limit) = time_limit {
                config.exact_solver_time_limit_s = *time_limit;
            }
            if let Some(seed) = seed {
                config.ga_seed = Some(*seed);
            }

            let result = planner::run_cycle(&snapshot, &config);
            print_plan(&snapshot, &result);

            if let Some(path) = json {
                let data = mes::plan_to_json(&result.plan).expect("could not serialize plan");
                std::fs::write(path, data).expect("could not write plan JSON");
            }
            if let Some(path) = csv {
                render::write_plan_csv(&result.plan, path).expect("could not write plan CSV");
            }
            if let Some(path) = svg {
                let board = render::render_plan(&result.plan, &snapshot.equipment);
                std::fs::write(path, board).expect("could not write SVG");
                if *open {
                    open::that(path).expect("could not open SVG");
                }
            }
        }
        Commands::Generate {
            n,
            machines,
            products,
            seed,
            output,
        } => {
            let snapshot = generate::snapshot(*n, *machines, *products, *seed);
            let data = snapshot.to_json().expect("could not serialize snapshot");
            std::fs::write(output, data).expect("could not write snapshot file");
            println!("wrote {n} orders, {machines} machines, {products} products to {output}");
        }
    }
}

fn print_plan(snapshot: &Snapshot, result: &CycleResult) {
    println!("=== production plan ({:?} engine) ===", result.engine);
    for entry in &result.plan {
        println!(
            "order {} ({} x{}, due {}, completes hour {})",
            entry.order_id,
            entry.product_id,
            entry.quantity,
            entry.delivery_date.format("%Y-%m-%d %H:%M"),
            entry.completion_hour(),
        );
        for process in &entry.processes {
            let machine = snapshot
                .equipment
                .iter()
                .find(|eq| eq.id == process.equipment_id)
                .map_or("unknown machine", |eq| eq.name.as_str());
            let start = snapshot.cycle_start + Duration::hours(process.start_time);
            let end = snapshot.cycle_start + Duration::hours(process.end_time);
            println!(
                "  {} on {} [{} .. {}] ({}h)",
                process.process_type,
                machine,
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M"),
                process.end_time - process.start_time,
            );
        }
    }
    for (order_id, reason) in &result.rejections {
        println!("held back {order_id}: {reason}");
    }
    for order_id in &result.missing_bom {
        println!("skipped {order_id}: no BOM for its product");
    }
}
