use httpmock::Method::GET;
use httpmock::MockServer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serial_test::serial;
use std::collections::BTreeMap;
use std::time::Duration;

mod common;

use hostload::scheduler::plan_hosts;
use hostload::LoadTest;

const REPORT_FILE: &str = "loadtest-concurrency-report.md";

// Every response is delayed so that requests overlap.
async fn start_slow_server() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .body("foo-ok bar-ok")
                .delay(Duration::from_millis(30));
        })
        .await;
    server
}

/// For every combination, exactly `requests` outcomes are collected and never more
/// than `concurrency` requests are in flight.
#[tokio::test]
#[serial]
async fn outcome_count_and_cap_hold() {
    let server = start_slow_server().await;

    for (requests, concurrency) in [(1, 1), (7, 1), (20, 3), (25, 10), (5, 50)] {
        let requests = requests.to_string();
        let concurrency = concurrency.to_string();
        let configuration = common::build_configuration(
            &server,
            vec![
                "--hosts",
                "foo.local",
                "--hosts",
                "bar.local",
                "--requests",
                &requests,
                "--concurrency",
                &concurrency,
                "--report-file",
                REPORT_FILE,
            ],
        );
        let load_test = LoadTest::initialize_with_config(configuration).unwrap();
        let expected = load_test.config().total_requests;
        let cap = load_test.config().concurrency;
        let report = load_test.execute().await.unwrap();

        assert_eq!(report.outcomes.len(), expected);
        assert_eq!(
            report.summary.success_count + report.summary.failure_count,
            expected
        );
        let percentage = report.summary.failure_percentage();
        assert!((0.0..=100.0).contains(&percentage));
        assert!(
            report.peak_in_flight <= cap,
            "peak {} exceeded cap {}",
            report.peak_in_flight,
            cap
        );
        assert!(report.peak_in_flight >= 1);
    }

    common::cleanup_files(vec![REPORT_FILE]);
}

/// The same seed routes the same number of requests to each host.
#[tokio::test]
#[serial]
async fn seeded_runs_pick_the_same_hosts() {
    let server = start_slow_server().await;

    let mut host_counts = Vec::new();
    for _ in 0..2 {
        let configuration = common::build_configuration(
            &server,
            vec![
                "--hosts",
                "foo.local",
                "--hosts",
                "bar.local",
                "--requests",
                "30",
                "--concurrency",
                "5",
                "--seed",
                "1234",
                "--report-file",
                REPORT_FILE,
            ],
        );
        let report = LoadTest::initialize_with_config(configuration)
            .unwrap()
            .execute()
            .await
            .unwrap();
        host_counts.push(report.summary.host_counts);
    }
    assert_eq!(host_counts[0], host_counts[1]);

    common::cleanup_files(vec![REPORT_FILE]);
}

/// An injected random source overrides `--seed` and decides every host.
#[tokio::test]
#[serial]
async fn injected_rng_picks_the_hosts() {
    let server = start_slow_server().await;
    let hosts = vec!["foo.local".to_string(), "bar.local".to_string()];

    let mut expected: BTreeMap<String, usize> = BTreeMap::new();
    for host in plan_hosts(&hosts, 30, &mut StdRng::seed_from_u64(77)).unwrap() {
        *expected.entry(host).or_insert(0) += 1;
    }

    for seed in ["1", "2"] {
        let configuration = common::build_configuration(
            &server,
            vec![
                "--hosts",
                "foo.local",
                "--hosts",
                "bar.local",
                "--requests",
                "30",
                "--concurrency",
                "5",
                "--seed",
                seed,
                "--report-file",
                REPORT_FILE,
            ],
        );
        let report = LoadTest::initialize_with_config(configuration)
            .unwrap()
            .set_rng(StdRng::seed_from_u64(77))
            .execute()
            .await
            .unwrap();
        assert_eq!(report.summary.host_counts, expected);
    }

    common::cleanup_files(vec![REPORT_FILE]);
}
