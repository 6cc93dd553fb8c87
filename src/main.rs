use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relgraph::{Config, TraceService, TraversalConfig};
use std::path::PathBuf;

/// Bounded relationship traversal over an architecture object repository.
#[derive(Parser, Debug)]
#[command(name = "relgraph", version)]
struct Cli {
    /// Config file (default: $RELGRAPH_CONFIG or ./config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Traverse from a seed object and print the grouped result as JSON.
    Traverse {
        seed_id: String,

        /// Workspace to scope the traversal to (default: repository.workspace).
        #[arg(long)]
        workspace: Option<String>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        max_objects_per_level: Option<usize>,

        /// Bypass the query cache.
        #[arg(long)]
        no_cache: bool,

        /// Replace every object with its full payload.
        #[arg(long)]
        enrich: bool,

        /// Save the run to the run index.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved runs.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

#[derive(Subcommand, Debug)]
enum RunsAction {
    /// List saved runs, newest first.
    List,
    /// Print one saved run as JSON.
    Show { key: String },
    Remove { key: String },
    /// Remove every saved run.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::from_file(path)?
        }
        None => Config::load()?,
    };

    // Logs go to stderr; stdout carries the JSON output
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.log_level.as_str()),
    )
    .init();

    log::debug!("relgraph v{}", env!("CARGO_PKG_VERSION"));
    let service = TraceService::from_config(&config).await?;

    match cli.command {
        Command::Traverse {
            seed_id,
            workspace,
            max_depth,
            max_objects_per_level,
            no_cache,
            enrich,
            save,
        } => {
            let workspace = workspace
                .or_else(|| config.repository.workspace.clone())
                .context("No workspace given: pass --workspace or set repository.workspace")?;
            let defaults = service.defaults();
            let bounds = TraversalConfig {
                max_depth: max_depth.unwrap_or(defaults.max_depth),
                max_objects_per_level: max_objects_per_level
                    .unwrap_or(defaults.max_objects_per_level),
                cache_enabled: defaults.cache_enabled && !no_cache,
                max_concurrency: defaults.max_concurrency,
            };

            let result = service.traverse(&seed_id, &workspace, Some(&bounds)).await?;
            if let Some(stats) = service.cache_stats() {
                log::debug!(
                    "Query cache holds {} entries, lifetime hit rate {:.2}",
                    stats.size,
                    stats.hit_rate
                );
            }
            let output = if enrich {
                let enriched = service.enrich(&result).await;
                let json = serde_json::to_string_pretty(&enriched)?;
                if save {
                    report_saved(service.save_run(enriched).await);
                }
                json
            } else {
                let json = serde_json::to_string_pretty(&result)?;
                if save {
                    report_saved(service.save_run(result).await);
                }
                json
            };
            println!("{}", output);
        }
        Command::Runs { action } => match action {
            RunsAction::List => {
                let runs = service.list_runs().await;
                if runs.is_empty() {
                    println!("No saved runs");
                }
                for run in runs {
                    println!(
                        "{}  {}  {}  workspace={}  objects={}{}",
                        run.saved_at.format("%Y-%m-%d %H:%M:%S"),
                        run.key,
                        run.function_name,
                        run.workspace_filter,
                        run.total_objects_found,
                        if run.enriched { "  (enriched)" } else { "" }
                    );
                }
            }
            RunsAction::Show { key } => match service.load_run(&key).await {
                Some(run) => println!("{}", serde_json::to_string_pretty(&run)?),
                None => anyhow::bail!("No saved run under {}", key),
            },
            RunsAction::Remove { key } => {
                if !service.remove_run(&key).await {
                    anyhow::bail!("Failed to remove {}", key);
                }
                eprintln!("Removed {}", key);
            }
            RunsAction::Clear => {
                if !service.clear_runs().await {
                    anyhow::bail!("Failed to clear saved runs");
                }
                eprintln!("Cleared saved runs");
            }
        },
    }

    Ok(())
}

fn report_saved(key: Option<String>) {
    match key {
        Some(key) => eprintln!("Saved as {}", key),
        None => eprintln!("Run could not be saved; see log for details"),
    }
}
