//! End-to-end runs of the orchestrator against canned pages
mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{CannedFetcher, config, report_page, url};
use phishtank_stats_lib::application::{Orchestrator, RunError};
use phishtank_stats_lib::domain::{MetricName, MetricValue, RunState, TimeCoordinate};
use phishtank_stats_lib::infrastructure::http_client::{FailureReason, FetchResult, PageFetcher};

fn at(year: u16, month: u8) -> TimeCoordinate {
    TimeCoordinate::new(year, month).unwrap()
}

/// Canned pages for every month of `years`, with a few gaps and oddities
fn archive(years: std::ops::RangeInclusive<u16>) -> CannedFetcher {
    let mut fetcher = CannedFetcher::new().with_jitter();
    for year in years {
        for month in 1..=12u8 {
            let submissions = format!("{},{:03}", year - 2000, u32::from(month) * 37);
            let votes = (u32::from(year) * 3 + u32::from(month)).to_string();
            let page = match month {
                2 => report_page(&[("Total Submissions", Some(&submissions)), ("Valid Phishes", None)]),
                5 => report_page(&[("Phishes Online", Some("12")), ("Total Votes", Some(&votes))]),
                9 => {
                    fetcher = fetcher.failing(url(year, month), FailureReason::Status(500));
                    continue;
                }
                _ => report_page(&[
                    ("Total Submissions", Some(&submissions)),
                    ("Valid Phishes", Some("1,000")),
                    ("Invalid Phishes", Some("250")),
                    ("Total Votes", Some(&votes)),
                    ("Median Time To Verify", Some("3 hours")),
                ]),
            };
            fetcher = fetcher.page(url(year, month), page);
        }
    }
    fetcher
}

#[tokio::test]
async fn total_submissions_heading_lands_at_its_coordinate() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = CannedFetcher::new().page(
        url(2016, 7),
        "<html><body><h3>Total Submissions: <b>1,234</b></h3></body></html>",
    );
    let orchestrator = Orchestrator::new(config(&dir.path().join("out.json"), 2016, 2016), Arc::new(fetcher)).unwrap();
    orchestrator.run().await.unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
    assert_eq!(saved["TotalSubmissions"]["2016"]["07"], "1,234");
}

#[tokio::test]
async fn heading_without_value_is_an_explicit_null() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");
    let fetcher = CannedFetcher::new().page(url(2016, 7), report_page(&[("Valid Phishes", None)]));
    let orchestrator = Orchestrator::new(config(&output, 2016, 2016), Arc::new(fetcher)).unwrap();
    orchestrator.run().await.unwrap();

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let july = &saved["ValidPhishes"]["2016"];
    assert!(july.as_object().unwrap().contains_key("07"));
    assert!(july["07"].is_null());
    // Other metrics have no key at all for the coordinate
    assert!(saved["InvalidPhishes"].get("2016").is_none());

    let aggregate = orchestrator.store().snapshot();
    assert_eq!(aggregate.get(MetricName::ValidPhishes, at(2016, 7)), Some(&MetricValue::Absent));
    assert_eq!(aggregate.get(MetricName::InvalidPhishes, at(2016, 7)), None);
}

#[tokio::test]
async fn failed_fetch_leaves_no_entry_and_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut fetcher = CannedFetcher::new();
    for month in 1..=12u8 {
        if month == 3 {
            fetcher = fetcher.failing(url(2012, 3), FailureReason::Status(500));
        } else {
            fetcher = fetcher.page(url(2012, month), report_page(&[("Total Votes", Some("7"))]));
        }
    }
    let orchestrator = Orchestrator::new(config(&dir.path().join("out.json"), 2012, 2012), Arc::new(fetcher)).unwrap();
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.state, RunState::CompletedWithFailures);
    assert_eq!(summary.succeeded, 11);
    assert_eq!(summary.failed_urls(), vec![url(2012, 3).as_str()]);
    assert_eq!(summary.failed[0].reason, "HTTP status 500");

    let aggregate = orchestrator.store().snapshot();
    assert!(!aggregate.contains_coordinate(at(2012, 3)));
    for month in (1..=12u8).filter(|m| *m != 3) {
        assert_eq!(aggregate.get(MetricName::TotalVotes, at(2012, month)), Some(&MetricValue::present("7")));
    }
    assert!(summary.detailed().to_string().contains(&url(2012, 3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn output_is_identical_for_any_concurrency_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut outputs = Vec::new();
    for k in [1, 8] {
        let output = dir.path().join(format!("k{k}.json"));
        let mut config = config(&output, 2014, 2016);
        config.workers.max_concurrent = k;
        let orchestrator = Orchestrator::new(config, Arc::new(archive(2014..=2016))).unwrap();
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.total, 36);
        assert_eq!(summary.failed.len(), 3);
        outputs.push(std::fs::read(&output).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn transient_failures_are_retried_and_permanent_ones_are_not() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir.path().join("out.json"), 2010, 2010);
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;

    let flaky = url(2010, 4);
    let fetcher = Arc::new(
        CannedFetcher::new()
            .sequence(
                flaky.clone(),
                vec![
                    FetchResult::failure(flaky.clone(), FailureReason::Timeout),
                    FetchResult::success(flaky.clone(), report_page(&[("Total Votes", Some("40"))])),
                ],
            )
            .failing(url(2010, 5), FailureReason::Status(503))
            .failing(url(2010, 6), FailureReason::Status(404)),
    );
    let orchestrator = Orchestrator::new(config, fetcher.clone()).unwrap();
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(fetcher.calls(&flaky), 2);
    assert_eq!(fetcher.calls(&url(2010, 5)), 3);
    assert_eq!(fetcher.calls(&url(2010, 6)), 1);
    assert_eq!(summary.succeeded, 1);

    let may = summary.failed.iter().find(|page| page.coordinate == at(2010, 5)).unwrap();
    assert_eq!(may.attempts, 3);
    assert_eq!(
        orchestrator.store().snapshot().get(MetricName::TotalVotes, at(2010, 4)),
        Some(&MetricValue::present("40"))
    );
}

#[tokio::test]
async fn repeated_heading_on_a_page_keeps_the_later_value() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = CannedFetcher::new().page(
        url(2011, 1),
        report_page(&[("Total Votes", Some("1")), ("Total Votes", Some("2"))]),
    );
    let orchestrator = Orchestrator::new(config(&dir.path().join("out.json"), 2011, 2011), Arc::new(fetcher)).unwrap();
    orchestrator.run().await.unwrap();
    assert_eq!(
        orchestrator.store().snapshot().get(MetricName::TotalVotes, at(2011, 1)),
        Some(&MetricValue::present("2"))
    );
}

#[tokio::test]
async fn resumed_run_only_fetches_missing_months() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");

    // First run: September fails
    let first = Orchestrator::new(config(&output, 2013, 2013), Arc::new(archive(2013..=2013))).unwrap();
    let summary = first.run().await.unwrap();
    assert_eq!(summary.failed_urls(), vec![url(2013, 9).as_str()]);

    // Second run: the archive now serves September
    let mut config = config(&output, 2013, 2013);
    config.output.resume = true;
    let fetcher = Arc::new(
        CannedFetcher::new().page(url(2013, 9), report_page(&[("Total Submissions", Some("13,333"))])),
    );
    let second = Orchestrator::new(config, fetcher.clone()).unwrap();
    let summary = second.run().await.unwrap();

    assert_eq!(summary.resumed, 11);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(fetcher.total_calls(), 1);

    let aggregate = second.store().snapshot();
    assert_eq!(aggregate.coordinates().len(), 12);
    assert_eq!(
        aggregate.get(MetricName::TotalSubmissions, at(2013, 9)),
        Some(&MetricValue::present("13,333"))
    );
    assert_eq!(second.persister().load().await.unwrap(), aggregate);
}

#[tokio::test]
async fn checkpoints_leave_a_loadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("out.json");
    let mut config = config(&output, 2015, 2015);
    config.output.checkpoint_every = 2;
    config.workers.max_concurrent = 1;

    let orchestrator = Orchestrator::new(config, Arc::new(archive(2015..=2015))).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.succeeded, 11);
    assert_eq!(orchestrator.persister().load().await.unwrap(), orchestrator.store().snapshot());
}

/// Cancels the run from inside the first fetch
struct CancellingFetcher {
    inner: CannedFetcher,
    token: CancellationToken,
}

#[async_trait]
impl PageFetcher for CancellingFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.token.cancel();
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn cancellation_drains_in_flight_pages_and_persists_them() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");
    let mut config = config(&output, 2016, 2016);
    config.workers.max_concurrent = 1;

    let token = CancellationToken::new();
    let fetcher = CancellingFetcher {
        inner: archive(2016..=2016),
        token: token.clone(),
    };
    let orchestrator = Orchestrator::new(config, Arc::new(fetcher))
        .unwrap()
        .with_cancellation_token(token);
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.succeeded + summary.failed.len(), 1);
    assert_eq!(summary.cancelled, 11);
    assert_eq!(orchestrator.persister().load().await.unwrap(), orchestrator.store().snapshot());
}

/// Records how many fetches overlap
#[derive(Default)]
struct InFlightFetcher {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl PageFetcher for InFlightFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        FetchResult::success(url, report_page(&[("Total Votes", Some("1"))]))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn in_flight_fetches_never_exceed_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    for k in [1, 3, 8] {
        let mut config = config(&dir.path().join(format!("k{k}.json")), 2012, 2016);
        config.workers.max_concurrent = k;
        let fetcher = Arc::new(InFlightFetcher::default());
        let orchestrator = Orchestrator::new(config, fetcher.clone()).unwrap();

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.succeeded, 60);

        let peak = fetcher.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= k, "k={k} peak={peak}");
        if k == 1 {
            assert_eq!(peak, 1);
        }
        assert_eq!(fetcher.current.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn persistence_failure_keeps_the_aggregate_for_a_later_save() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    // Output parent is a regular file, so the final save fails
    let output = blocker.join("out.json");
    let fetcher = CannedFetcher::new().page(url(2016, 7), report_page(&[("Total Votes", Some("3"))]));
    let orchestrator = Orchestrator::new(config(&output, 2016, 2016), Arc::new(fetcher)).unwrap();

    let Err(RunError::Persist { summary, .. }) = orchestrator.run().await else {
        panic!("expected a persistence failure");
    };
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.entries, 1);
    assert_eq!(orchestrator.store().len(), 1);

    std::fs::remove_file(&blocker).unwrap();
    orchestrator.save().await.unwrap();
    assert_eq!(orchestrator.persister().load().await.unwrap(), orchestrator.store().snapshot());
    assert_eq!(
        orchestrator.store().snapshot().get(MetricName::TotalVotes, at(2016, 7)),
        Some(&MetricValue::present("3"))
    );
}
