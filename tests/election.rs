use std::time::Duration;

use hs_ring_election::abstractions::communication::ring_topology::RingTopology;
use hs_ring_election::abstractions::process::TerminationSignal;
use hs_ring_election::algorithms::hirschberg_sinclair::{ElectionProcess, ProcessState};
use hs_ring_election::config::{Jitter, SimulationConfig};
use hs_ring_election::coordinator::{Coordinator, ElectionReport};
use hs_ring_election::error::{ConfigurationError, ElectionError};

/// Initialize tracing for tests. `RUST_LOG` overrides the default filter.
fn init_tracing() -> impl Sized {
    use tracing::Dispatch;
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hs_ring_election=debug")),
        )
        .with_test_writer()
        .finish();

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_default(&dispatch)
}

async fn elect(ids: &[u32], config: SimulationConfig) -> ElectionReport<u32> {
    tokio::time::timeout(Duration::from_secs(20), Coordinator::new(config).run(ids))
        .await
        .expect("election timed out")
        .expect("election failed")
}

fn assert_single_leader(report: &ElectionReport<u32>, expected: u32) {
    let leaders: Vec<_> = report
        .processes
        .iter()
        .filter(|p| p.state == ProcessState::Terminated)
        .collect();
    assert_eq!(leaders.len(), 1);
    assert_eq!(leaders[0].id, expected);
    assert_eq!(report.leader, Some(expected));
    assert!(report
        .processes
        .iter()
        .filter(|p| p.id != expected)
        .all(|p| p.state == ProcessState::Stopped));
}

#[tokio::test]
async fn five_process_ring_elects_nine_in_phase_three() {
    let _guard = init_tracing();
    let report = elect(&[3, 7, 1, 9, 2], SimulationConfig::deterministic()).await;

    assert_single_leader(&report, 9);
    assert_eq!(report.leader_phase, Some(3));
    assert!(report.messages_conserved());
    assert_eq!(
        report.processes.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![3, 7, 1, 9, 2]
    );
}

#[tokio::test]
async fn two_process_ring_terminates_at_radius_two() {
    let _guard = init_tracing();
    let report = elect(&[5, 1], SimulationConfig::deterministic()).await;

    assert_single_leader(&report, 5);
    assert_eq!(report.leader_phase, Some(1));
    assert!(report.messages_conserved());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn jittered_runs_still_elect_the_maximum() {
    let _guard = init_tracing();
    let config = SimulationConfig {
        startup_jitter: Jitter::millis(0, 20),
        think_time: Jitter::millis(0, 2),
        poll_interval: Duration::from_millis(20),
        ..SimulationConfig::default()
    };

    for ids in [
        vec![12, 4, 30, 8, 17, 1, 25],
        vec![1, 2, 3, 4, 5, 6, 7, 8],
        vec![9, 8, 7, 6, 5, 4, 3, 2, 1],
    ] {
        let max = *ids.iter().max().unwrap();
        let report = elect(&ids, config.clone()).await;

        assert_single_leader(&report, max);
        assert!(report.messages_conserved());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn large_random_ring() {
    let _guard = init_tracing();
    let ids = hs_ring_election::identifiers::random(64).unwrap();
    let max = *ids.iter().max().unwrap();

    let report = elect(&ids, SimulationConfig::deterministic()).await;

    assert_single_leader(&report, max);
    assert_eq!(report.leader_phase, Some(6));
    assert!(report.messages_conserved());
}

#[tokio::test]
async fn duplicate_identifiers_fail_before_start() {
    let result = Coordinator::new(SimulationConfig::deterministic())
        .run(&[3u32, 7, 3])
        .await;

    match result {
        Err(ElectionError::Configuration(ConfigurationError::DuplicateIdentifier { id })) => {
            assert_eq!(id, "3");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn manual_stepping_elects_the_maximum() {
    let ids = [3u32, 7, 1, 9, 2];
    let signal = TerminationSignal::new();
    let mut processes: Vec<_> = ids
        .iter()
        .map(|&id| ElectionProcess::new(id, ids.len(), signal.clone()))
        .collect();
    RingTopology::connect(&mut processes).unwrap();

    for process in processes.iter_mut() {
        process.start().unwrap();
    }
    while !signal.is_set() {
        let mut progressed = false;
        for process in processes.iter_mut() {
            progressed |= process.step().unwrap();
        }
        assert!(progressed);
    }

    assert_eq!(signal.leader(), Some(9));
    let loser_phases: Vec<_> = processes
        .iter()
        .filter(|p| !p.is_leader())
        .map(|p| p.phase())
        .collect();
    assert!(loser_phases.iter().all(|&phase| phase < 3));
}
