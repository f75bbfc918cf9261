use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::types::Quantity;
use config::AppConfig;
use exchange_adapter_trait::ExchangeAdapter;
use navigator::{GraphSource, Navigator, Path};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line arguments for the navigator.
#[derive(Parser, Debug)]
#[command(name = "navigator", about = "Find conversion routes across exchanges")]
struct Args {
    /// Path to the navigator configuration YAML
    #[arg(long, default_value = "config/default.yml")]
    config: String,
    /// Rebuild from the exchanges even when a fresh graph cache exists
    #[arg(long)]
    refresh: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the graph and write the cache
    Build,
    /// Best route between two assets
    Path {
        from: String,
        to: String,
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Top routes between two assets, best rate first
    Paths {
        from: String,
        to: String,
        #[arg(long)]
        max_hops: Option<usize>,
        #[arg(long)]
        max_paths: Option<usize>,
    },
    /// Cycles from an asset back to itself that return more than they cost
    Arbitrage {
        start: String,
        #[arg(long)]
        min_profit_pct: Option<f64>,
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Most valuable conversion of a held amount
    Opportunity {
        have: String,
        amount: Decimal,
        /// Candidate assets; defaults to the configured targets
        #[arg(long = "want", value_delimiter = ',')]
        want: Vec<String>,
    },
    /// Graph-wide statistics
    Summary,
    /// Connectivity of one asset
    Asset { symbol: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_path(path: &Path) {
    println!("{path}");
    println!(
        "  hops: {}  rate: {:.8}  fees: {:.6}  profit: {:+.4}%",
        path.num_hops(),
        path.total_rate(),
        path.total_fees(),
        path.profit_pct()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let app_cfg = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    app_cfg.validate()?;
    let nav_cfg = app_cfg.navigator_config()?;
    let adapters: Vec<Arc<dyn ExchangeAdapter>> = app_cfg.build_adapters()?;

    let navigator = Navigator::new(nav_cfg);
    let source = if args.refresh || matches!(args.command, Command::Build) {
        navigator.refresh(&adapters).await?
    } else {
        navigator.open(&adapters).await?
    };
    match &source {
        GraphSource::Built(report) => {
            info!(
                exchanges = report.successful_exchanges(),
                pairs = report.total_pairs(),
                bridges = report.bridge_edges,
                "Graph built from exchanges"
            );
            for (exchange, reason) in &report.failures {
                warn!(%exchange, %reason, "Exchange failed to load");
            }
        }
        GraphSource::Cache { age } => {
            info!(age_secs = age.as_secs(), "Graph loaded from cache");
        }
    }

    let config = navigator.config().clone();
    match args.command {
        Command::Build => {
            let summary = navigator.graph_summary();
            if args.json {
                print_json(&summary)?;
            } else {
                println!(
                    "{} assets, {} edges ({} bridges)",
                    summary.asset_count, summary.edge_count, summary.bridge_edge_count
                );
            }
        }
        Command::Path { from, to, max_hops } => {
            let max_hops = max_hops.unwrap_or(config.default_max_hops);
            let path = navigator.find_path(&from, &to, max_hops)?;
            if args.json {
                print_json(&path)?;
            } else {
                match path {
                    Some(path) => print_path(&path),
                    None => println!("No route from {from} to {to} within {max_hops} hops"),
                }
            }
        }
        Command::Paths {
            from,
            to,
            max_hops,
            max_paths,
        } => {
            let paths = navigator.find_all_paths(
                &from,
                &to,
                max_hops.unwrap_or(config.enumerate_max_hops),
                max_paths.unwrap_or(config.enumerate_max_paths),
            )?;
            if args.json {
                print_json(&paths)?;
            } else if paths.is_empty() {
                println!("No routes from {from} to {to}");
            } else {
                for (rank, path) in paths.iter().enumerate() {
                    print!("{}. ", rank + 1);
                    print_path(path);
                }
            }
        }
        Command::Arbitrage {
            start,
            min_profit_pct,
            max_hops,
        } => {
            let cycles = navigator.find_arbitrage(
                &start,
                min_profit_pct.unwrap_or(config.arbitrage_min_profit_pct),
                max_hops.unwrap_or(config.arbitrage_max_hops),
            )?;
            if args.json {
                print_json(&cycles)?;
            } else if cycles.is_empty() {
                println!("No arbitrage cycles through {start}");
            } else {
                for cycle in &cycles {
                    print_path(cycle);
                }
            }
        }
        Command::Opportunity { have, amount, want } => {
            let want: Vec<&str> = want.iter().map(String::as_str).collect();
            let targets = (!want.is_empty()).then_some(want.as_slice());
            let best = navigator.find_best_opportunity(&have, Quantity(amount), targets)?;
            if args.json {
                print_json(&best)?;
            } else {
                match best {
                    Some(op) => {
                        println!(
                            "{} {} -> {} {} (~${:.2}, confidence {:.2})",
                            op.have_amount,
                            op.have_asset,
                            op.expected_amount,
                            op.want_asset,
                            op.expected_value_usd_f64(),
                            op.confidence
                        );
                        print_path(&op.best_path);
                    }
                    None => println!("No priced target reachable from {have}"),
                }
            }
        }
        Command::Summary => {
            let summary = navigator.graph_summary();
            if args.json {
                print_json(&summary)?;
            } else {
                println!(
                    "{} assets, {} edges ({} bridges)",
                    summary.asset_count, summary.edge_count, summary.bridge_edge_count
                );
                for (exchange, count) in &summary.edges_per_exchange {
                    println!("  {exchange}: {count} edges");
                }
                println!("Most connected:");
                for (asset, degree) in &summary.most_connected {
                    println!("  {asset}: {degree}");
                }
            }
        }
        Command::Asset { symbol } => {
            let info = navigator.asset_connectivity(&symbol)?;
            if args.json {
                print_json(&info)?;
            } else {
                println!(
                    "{}: {} outgoing, {} incoming",
                    info.asset, info.outgoing, info.incoming
                );
                let neighbors: Vec<String> = info.neighbors.iter().map(|a| a.to_string()).collect();
                println!("  neighbors: {}", neighbors.join(", "));
                let exchanges: Vec<String> = info.exchanges.iter().map(|e| e.to_string()).collect();
                println!("  exchanges: {}", exchanges.join(", "));
            }
        }
    }

    Ok(())
}
