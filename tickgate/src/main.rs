//! Tickgate - drive a tick-based simulation from an external agent.
//!
//! `run` is the controller side (demo simulation + decision loop), `agent` is
//! a reference agent answering over the same pipes.

mod sim;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tickgate_core::transport::fifo;
use tickgate_core::{
    AgentEndpoint, BridgeConfig, DecisionLoop, LoopError, PipeTransport, RandomPolicy,
    TickOutcome,
};

#[derive(Parser)]
#[command(name = "tickgate")]
#[command(about = "Change-detecting decision loop between a simulation and an external agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo simulation, asking the agent for decisions
    Run {
        /// Stop after this many ticks (runs until interrupted if omitted)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Delay between ticks in milliseconds
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,

        /// Seed for the demo simulation's deck
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[command(flatten)]
        bridge: BridgeArgs,
    },

    /// Serve random decisions until the controller disconnects
    Agent {
        /// Seed for the random policy
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[command(flatten)]
        bridge: BridgeArgs,
    },

    /// Create or remove the named pipes
    Pipes {
        #[command(subcommand)]
        action: PipesAction,

        #[command(flatten)]
        bridge: BridgeArgs,
    },
}

#[derive(Subcommand)]
enum PipesAction {
    Create,
    Remove,
}

/// Overrides on top of the config file and `TICKGATE_*` environment.
#[derive(Args)]
struct BridgeArgs {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request pipe path
    #[arg(long, global = true)]
    request_pipe: Option<PathBuf>,

    /// Response pipe path
    #[arg(long, global = true)]
    response_pipe: Option<PathBuf>,

    /// Reply timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Give up after this many consecutive execution failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Always ask the agent, even for forced moves
    #[arg(long, global = true)]
    no_auto_skip: bool,
}

impl BridgeArgs {
    fn resolve(self) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::resolve(self.config.as_deref())
            .context("Failed to load bridge configuration")?;
        if let Some(path) = self.request_pipe {
            config.request_pipe = path;
        }
        if let Some(path) = self.response_pipe {
            config.response_pipe = path;
        }
        if let Some(ms) = self.timeout_ms {
            config.response_timeout_ms = ms;
        }
        if self.max_retries.is_some() {
            config.max_retries = self.max_retries;
        }
        if self.no_auto_skip {
            config.auto_skip = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Load .env first so it can set RUST_LOG and TICKGATE_* as well
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            ticks,
            tick_ms,
            seed,
            bridge,
        } => run(bridge.resolve()?, ticks, Duration::from_millis(tick_ms), seed),

        Commands::Agent { seed, bridge } => serve(bridge.resolve()?, seed),

        Commands::Pipes { action, bridge } => {
            let config = bridge.resolve()?;
            let paths = [config.request_pipe.as_path(), config.response_pipe.as_path()];
            match action {
                PipesAction::Create => {
                    fifo::create_pipes(&paths).context("Failed to create pipes")?;
                    for path in paths {
                        println!("Created {}", path.display());
                    }
                }
                PipesAction::Remove => {
                    fifo::remove_pipes(&paths).context("Failed to remove pipes")?;
                    for path in paths {
                        println!("Removed {}", path.display());
                    }
                }
            }
            Ok(())
        }
    }
}

/// Tally of tick outcomes for the end-of-run summary.
#[derive(Default)]
struct RunSummary {
    executed: u64,
    auto_skipped: u64,
    failed: u64,
    discarded: u64,
    no_decision: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Executed(_) => self.executed += 1,
            TickOutcome::AutoSkipped(_) => self.auto_skipped += 1,
            TickOutcome::ExecutionFailed { .. } | TickOutcome::AutoSkipFailed(_) => {
                self.failed += 1
            }
            TickOutcome::Discarded(_) => self.discarded += 1,
            TickOutcome::NoDecision(_) => self.no_decision += 1,
            TickOutcome::Disabled
            | TickOutcome::NoLegalActions
            | TickOutcome::Unchanged
            | TickOutcome::Handshake => {}
        }
    }
}

fn run(config: BridgeConfig, ticks: Option<u64>, tick_delay: Duration, seed: u64) -> Result<()> {
    log::info!(
        "Controller on {} -> {} (timeout {:?})",
        config.request_pipe.display(),
        config.response_pipe.display(),
        config.response_timeout()
    );

    let mut sim = sim::DemoSim::new(seed);
    let mut decisions = DecisionLoop::new(PipeTransport::from_config(&config), &config);
    let mut summary = RunSummary::default();

    while ticks.map_or(true, |limit| decisions.ticks() < limit) {
        sim.advance();
        match decisions.tick(&mut sim) {
            Ok(outcome) => {
                log::debug!("Tick {}: {:?}", decisions.ticks(), outcome);
                summary.record(outcome);
            }
            Err(LoopError::RetryLimit { action, retries }) => {
                log::error!("Agent keeps choosing {} ({} failures)", action, retries);
                summary.failed += 1;
            }
            Err(e) => return Err(e).context("Decision loop stopped"),
        }
        thread::sleep(tick_delay);
    }

    log::info!(
        "Finished after {} ticks: {} executed, {} auto-skipped, {} failed, {} discarded, {} without decision",
        decisions.ticks(),
        summary.executed,
        summary.auto_skipped,
        summary.failed,
        summary.discarded,
        summary.no_decision
    );
    log::info!(
        "Demo simulation: {} stage(s) cleared, {} run(s) lost, now in state {}",
        sim.rounds_won(),
        sim.runs_lost(),
        sim.state()
    );
    Ok(())
}

fn serve(config: BridgeConfig, seed: u64) -> Result<()> {
    let mut endpoint = AgentEndpoint::listen(&config.request_pipe, &config.response_pipe)
        .context("Failed to open agent pipes")?;
    let mut policy = RandomPolicy::new(seed);
    let served = endpoint.serve(&mut policy)?;
    log::info!("Agent done, answered {} request(s)", served);
    Ok(())
}
