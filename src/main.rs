use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;

use hs_ring_election::abstractions::logging::init_tracing;
use hs_ring_election::config::{Jitter, SimulationConfig};
use hs_ring_election::coordinator::Coordinator;
use hs_ring_election::error::{ConfigurationError, ElectionError};
use hs_ring_election::identifiers;

#[derive(Parser, Debug)]
#[command(name = "hs-ring-election")]
#[command(about = "Simulate Hirschberg–Sinclair leader election on a ring of processes")]
struct Args {
    /// Number of processes; identifiers are drawn at random from 1..=9999
    #[arg(short = 'n', long, required_unless_present = "ids", conflicts_with = "ids")]
    processes: Option<usize>,

    /// Explicit identifiers in clockwise ring order, e.g. 3,7,1,9,2
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    ids: Option<Vec<i64>>,

    /// Disable all random delays
    #[arg(long)]
    no_jitter: bool,

    /// Longest a process waits on its mailbox before re-checking for shutdown
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Random delay before a process starts, as MIN..MAX milliseconds
    #[arg(long, default_value = "100..500", value_parser = parse_millis_range)]
    startup_jitter_ms: Jitter,

    /// Random delay after each handled message, as MIN..MAX milliseconds
    #[arg(long, default_value = "50..200", value_parser = parse_millis_range)]
    think_time_ms: Jitter,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let (startup_jitter, think_time) = if self.no_jitter {
            (Jitter::Disabled, Jitter::Disabled)
        } else {
            (self.startup_jitter_ms, self.think_time_ms)
        };

        SimulationConfig {
            startup_jitter,
            think_time,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..SimulationConfig::default()
        }
    }

    fn identifiers(&self) -> Result<Vec<u32>, ConfigurationError> {
        match (&self.ids, self.processes) {
            (Some(ids), _) => identifiers::validate(ids),
            (None, Some(count)) => identifiers::random(count),
            (None, None) => Err(ConfigurationError::RingTooSmall { size: 0 }),
        }
    }
}

fn parse_millis_range(s: &str) -> Result<Jitter, String> {
    let (min, max) = s
        .split_once("..")
        .ok_or_else(|| format!("expected MIN..MAX, got `{s}`"))?;
    let min = min.trim().parse::<u64>().map_err(|e| e.to_string())?;
    let max = max.trim().parse::<u64>().map_err(|e| e.to_string())?;
    if min > max {
        return Err(format!("range start {min} is after its end {max}"));
    }
    Ok(Jitter::millis(min, max))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("info");
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "election failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ElectionError> {
    let ids = args.identifiers()?;
    println!("\nRing order (clockwise):\n{ids:?}\n");

    let report = Coordinator::new(args.config())
        .run_until(&ids, shutdown_signal())
        .await?;

    match (report.leader, report.leader_phase) {
        (Some(leader), Some(phase)) => println!("\nLeader elected: {leader} (phase {phase})"),
        _ => println!("\nStopped before a leader was elected"),
    }
    println!("Total messages sent: {}", report.total_messages_sent);

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => println!("\nStopping...\n"),
        Err(err) => {
            eprintln!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await
        }
    }
}
