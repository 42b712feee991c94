use std::path::PathBuf;

use causalmatch_core::{
    CausalEffectEstimator, EstimationMethod, EstimatorConfig, RefutationMethod,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod load;

#[derive(Parser)]
#[command(name = "causalmatch", version, about = "Causal effect estimation by Mahalanobis matching")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct Columns {
    /// CSV file with a header row; every field must be numeric
    #[arg(long)]
    data: PathBuf,
    #[arg(long)]
    treatment: String,
    #[arg(long)]
    outcome: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify, estimate and refute; print the summary
    Estimate {
        #[command(flatten)]
        columns: Columns,
        /// TOML graph (`edges = [["cause", "effect"], ...]`)
        #[arg(long)]
        graph: Option<PathBuf>,
        /// TOML estimator configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        neighbors: Option<usize>,
        /// Match on observed outcomes instead of a trained outcome model
        #[arg(long)]
        no_outcome_model: bool,
        /// Seed for the refutation covariate
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = "mdm")]
        method: String,
        #[arg(long, default_value = "random_common_cause")]
        refuter: String,
    },
    /// Print the minimal adjustment set
    Identify {
        #[command(flatten)]
        columns: Columns,
        #[arg(long)]
        graph: PathBuf,
    },
    /// Print the edges of a graph file
    Graph {
        #[arg(long)]
        graph: PathBuf,
    },
    /// Print the default configuration as TOML
    Config {},
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "causalmatch_core=info".parse() {
        filter = filter.add_directive(d);
    }
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Estimate {
            columns,
            graph,
            config,
            neighbors,
            no_outcome_model,
            seed,
            json,
            method,
            refuter,
        } => {
            let method: EstimationMethod = method.parse()?;
            let refuter: RefutationMethod = refuter.parse()?;

            let mut settings = load::read_config(config.as_deref())?;
            if let Some(k) = neighbors {
                settings.matcher.n_neighbors = k;
            }
            if no_outcome_model {
                settings.matcher.use_outcome_model = false;
            }
            if seed.is_some() {
                settings.refutation.seed = seed;
            }

            let data = load::read_dataset(&columns.data)?;
            let graph = graph.as_deref().map(load::read_graph).transpose()?;
            info!(
                rows = data.n_rows(),
                columns = data.n_cols(),
                "Loaded {}",
                columns.data.display()
            );

            let mut estimator =
                CausalEffectEstimator::new(data, columns.treatment, columns.outcome, graph)?
                    .with_config(settings)?;
            estimator.estimate_effect(method)?;
            estimator.refute_effect(refuter)?;
            let summary = estimator.summary()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Adjustment set: {{{}}}", summary.estimand.join(", "));
                println!("{}", summary);
            }
        }
        Commands::Identify { columns, graph } => {
            let data = load::read_dataset(&columns.data)?;
            let graph = load::read_graph(&graph)?;
            let mut estimator =
                CausalEffectEstimator::new(data, columns.treatment, columns.outcome, Some(graph))?;
            println!("{}", estimator.identify_effect()?);
        }
        Commands::Graph { graph } => {
            let graph = load::read_graph(&graph)?;
            print!("{}", graph);
        }
        Commands::Config {} => {
            print!("{}", EstimatorConfig::default().to_toml_string()?);
        }
    }
    Ok(())
}
