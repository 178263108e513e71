use clap::{Parser, Subcommand};
use cutscript::compiler::loader;
use cutscript::config::EngineConfig;
use cutscript::nodes::register_builtin;
use cutscript::runtime::engine::{Engine, TriggerOptions};
use cutscript::runtime::redis_storage::RedisSaveStore;
use cutscript::runtime::storage::SaveStore;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph until nothing is running
    Run {
        /// Graph YAML files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Graph to trigger
        #[arg(long)]
        graph: String,
        /// Engine config YAML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Skip everything queued after this many seconds
        #[arg(long)]
        skip_after: Option<f32>,
        /// Pause the graph after this many seconds and save
        #[arg(long)]
        pause_after: Option<f32>,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 300.0)]
        max_seconds: f32,
        /// Redis URL for saving the registry
        #[arg(long)]
        redis: Option<String>,
        /// Save slot name
        #[arg(long, default_value = "quicksave")]
        slot: String,
    },
    /// Load and validate graph files
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn build_engine(files: &[PathBuf], config: EngineConfig) -> Result<Engine> {
    let mut engine = Engine::with_config(config);
    register_builtin(&mut engine);
    for file in files {
        let blueprint = loader::load_blueprint(file)?;
        engine.validate_blueprint(&blueprint)?;
        info!(graph = %blueprint.id, nodes = blueprint.nodes.len(), "Loaded graph from {:?}", file);
        engine.register_blueprint(blueprint);
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { files } => {
            build_engine(&files, EngineConfig::default())?;
            info!("{} graph file(s) are valid", files.len());
        }
        Commands::Run { files, graph, config, skip_after, pause_after, max_seconds, redis, slot } => {
            let config = match config {
                Some(path) => EngineConfig::load(path)?,
                None => EngineConfig::default(),
            };
            let store = redis.as_deref().map(RedisSaveStore::open).transpose()?;
            let mut engine = build_engine(&files, config)?;

            let instance_id = engine.trigger(&graph, TriggerOptions::default())?;
            info!(instance_id = %instance_id, graph = %graph, "Triggered");

            let step = engine.config().tick_interval();
            let mut ticker = tokio::time::interval(step);
            let mut skipped = false;
            let mut paused = false;

            loop {
                ticker.tick().await;
                engine.tick(step);
                let elapsed = engine.clock().real_time() as f32;

                if skip_after.is_some_and(|s| elapsed >= s) && !skipped {
                    info!("Skipping queued lists");
                    engine.skip_all();
                    skipped = true;
                }
                if pause_after.is_some_and(|s| elapsed >= s) && !paused {
                    paused = true;
                    if engine.instance(instance_id).is_some() {
                        engine.pause(instance_id)?;
                    }
                }

                let busy = engine.instances().any(|l| l.is_running());
                if !busy {
                    break;
                }
                if elapsed >= max_seconds {
                    warn!(seconds = max_seconds, "Time limit reached, killing remaining lists");
                    engine.kill_all();
                    break;
                }
            }

            let data = engine.save_data();
            info!(records = engine.registry().len(), "Run finished");
            if let Some(store) = store {
                store.write(&slot, &engine.save_slot()).await?;
                info!(slot = %slot, "Saved");
            } else if !data.is_empty() {
                println!("{}", data);
            }
        }
    }

    Ok(())
}
