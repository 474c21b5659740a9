mod common;

use anyhow::Result;
use applybot_common::BotError;
use applybot_config::ApplybotConfig;
use applybot_core::runner::{ApplicationStep, ApplyOutcome, DiscoveryOnly, JobCandidate, RunState, Runner};
use applybot_core::store::{AppliedJobRecord, SessionStore};
use applybot_drivers::browser::session::BrowserSession;
use async_trait::async_trait;
use common::{FakeElement, FakeSession, Lost, cards};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Applies to everything and remembers the answers it was handed.
#[derive(Default, Clone)]
struct AlwaysApply {
    answers_seen: Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

#[async_trait]
impl ApplicationStep for AlwaysApply {
    async fn apply<S: BrowserSession>(
        &self,
        _session: &S,
        _candidate: &JobCandidate,
        answers: &BTreeMap<String, String>,
    ) -> Result<ApplyOutcome> {
        self.answers_seen.lock().unwrap().push(answers.clone());
        Ok(ApplyOutcome::Applied)
    }
}

/// Fails for one id, either softly or by losing the browser.
struct FailsOn {
    job_id: &'static str,
    lose_session: bool,
}

#[async_trait]
impl ApplicationStep for FailsOn {
    async fn apply<S: BrowserSession>(
        &self,
        _session: &S,
        candidate: &JobCandidate,
        _answers: &BTreeMap<String, String>,
    ) -> Result<ApplyOutcome> {
        if candidate.job_id == self.job_id {
            if self.lose_session {
                return Err(anyhow::Error::new(Lost));
            }
            return Err(anyhow::anyhow!("apply button missing"));
        }
        Ok(ApplyOutcome::Applied)
    }
}

fn config(keywords: &[&str], locations: &[&str]) -> ApplybotConfig {
    let mut cfg = ApplybotConfig::default();
    cfg.run.keywords = keywords.iter().map(|s| s.to_string()).collect();
    cfg.run.locations = locations.iter().map(|s| s.to_string()).collect();
    cfg.site.settle_delay_secs = 0;
    cfg.auth.window_secs = 0;
    cfg.listing.selectors = vec![".card".into()];
    cfg
}

fn state(tmp: &TempDir, ceiling: usize) -> RunState {
    RunState::restore(SessionStore::new(tmp.path().join("applied.csv")), ceiling)
}

fn logged_in(session: FakeSession) -> FakeSession {
    session.with_selector(".user-name", vec![FakeElement::card("Asha")])
}

#[tokio::test]
async fn applies_and_records_every_new_listing() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 3)));
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), AlwaysApply::default());

    let (state, report) = runner.run(&session, state(&tmp, 100)).await.unwrap();

    assert!(report.authenticated);
    assert_eq!(report.pairs_searched, 1);
    assert_eq!(report.applied, 3);
    assert_eq!(state.applications(), 3);
    assert!(state.recorder().already_applied("job-0"));

    let stored = SessionStore::new(tmp.path().join("applied.csv")).load();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn previously_applied_jobs_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let store = SessionStore::new(tmp.path().join("applied.csv"));
    store.append(&AppliedJobRecord::new("job-1", "Old", "Co")).unwrap();

    let step = AlwaysApply::default();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 3)));
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), step);

    let (_, report) = runner.run(&session, state(&tmp, 100)).await.unwrap();

    assert_eq!(report.candidates_seen, 3);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.applied, 2);
    assert_eq!(store.records().unwrap().len(), 3);
}

#[tokio::test]
async fn the_same_listing_on_two_searches_is_applied_once() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 2)));
    let step = AlwaysApply::default();
    let runner = Runner::from_config(&config(&["crm", "sales"], &["Pune"]), step);

    let (_, report) = runner.run(&session, state(&tmp, 100)).await.unwrap();

    assert_eq!(report.pairs_searched, 2);
    assert_eq!(report.applied, 2);
    assert_eq!(report.duplicates_skipped, 2);
}

#[tokio::test]
async fn ceiling_stops_the_run() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 5)));
    let runner = Runner::from_config(&config(&["crm", "sales"], &["Pune", "Chennai"]), AlwaysApply::default());

    let (state, report) = runner.run(&session, state(&tmp, 2)).await.unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(state.applications(), 2);
    assert_eq!(report.pairs_searched, 1);
}

#[tokio::test]
async fn pairs_without_listings_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new());
    let runner = Runner::from_config(&config(&["crm", "sales"], &["Pune"]), AlwaysApply::default());

    let (_, report) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    assert_eq!(report.pairs_searched, 2);
    assert_eq!(report.pairs_without_listings, 2);
    assert_eq!(report.applied, 0);
}

#[tokio::test]
async fn a_failed_application_does_not_end_the_run() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 3)));
    let step = FailsOn { job_id: "job-1", lose_session: false };
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), step);

    let (state, report) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    assert_eq!(report.application_failures, 1);
    assert_eq!(report.applied, 2);
    assert!(!state.recorder().already_applied("job-1"));
}

#[tokio::test]
async fn losing_the_browser_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 3)));
    let step = FailsOn { job_id: "job-1", lose_session: true };
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), step);

    let result = runner.run(&session, state(&tmp, 10)).await;
    assert!(matches!(result, Err(BotError::SessionLost(_))));

    // the job applied before the crash is still on disk
    let stored = SessionStore::new(tmp.path().join("applied.csv")).load();
    assert!(stored.contains("job-0"));
    assert!(!stored.contains("job-1"));
}

#[tokio::test]
async fn persistence_failure_is_counted_and_job_stays_eligible() {
    let tmp = TempDir::new().unwrap();
    let blocked = tmp.path().join("blocked");
    std::fs::create_dir(&blocked).unwrap();

    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 2)));
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), AlwaysApply::default());

    let (state, report) = runner
        .run(&session, RunState::restore(SessionStore::new(&blocked), 10))
        .await
        .unwrap();

    assert_eq!(report.persistence_failures, 2);
    assert_eq!(report.applied, 0);
    assert_eq!(state.applications(), 0);
    assert!(!state.recorder().already_applied("job-0"));
}

#[tokio::test]
async fn discovery_only_records_nothing() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 2)));
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), DiscoveryOnly);

    let (state, report) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    assert_eq!(report.candidates_seen, 2);
    assert_eq!(report.applied, 0);
    assert!(state.recorder().index().is_empty());
    assert!(!tmp.path().join("applied.csv").exists());
}

#[tokio::test]
async fn unauthenticated_runs_still_search() {
    let tmp = TempDir::new().unwrap();
    let session = FakeSession::new().with_selector(".card", cards("job", 1));
    let runner = Runner::from_config(&config(&["crm"], &["Pune"]), AlwaysApply::default());

    let (_, report) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    assert!(!report.authenticated);
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn listings_without_ids_are_keyed_by_text() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(
        ".card",
        vec![FakeElement::card("Buyer\nInitech\n2 years experience")],
    ));
    let step = AlwaysApply::default();
    let runner = Runner::from_config(&config(&["purchase"], &["Pune"]), step);

    let (state, _) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    let records = state.recorder().store().records().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].job_id.starts_with("text-"));
    assert_eq!(records[0].job_title, "Buyer");
    assert_eq!(records[0].company, "Initech");
}

#[tokio::test]
async fn default_answers_reach_the_step() {
    let tmp = TempDir::new().unwrap();
    let session = logged_in(FakeSession::new().with_selector(".card", cards("job", 1)));
    let mut cfg = config(&["crm"], &["Pune"]);
    cfg.run.default_answers.insert("notice_period".into(), "30 days".into());
    let step = AlwaysApply::default();
    let runner = Runner::from_config(&cfg, step.clone());

    runner.run(&session, state(&tmp, 10)).await.unwrap();

    let seen = step.answers_seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get("notice_period").map(String::as_str), Some("30 days"));
}

#[tokio::test]
async fn a_card_nested_in_a_wrapper_is_applied_once() {
    let tmp = TempDir::new().unwrap();
    let card = "Sales Lead\nAcme\n2 years experience";
    let session = logged_in(FakeSession::new().with_tag(
        "div",
        vec![
            FakeElement::card(&format!("{card}\nFooter: apply for jobs")),
            FakeElement::card(card),
        ],
    ));
    let runner = Runner::from_config(&config(&["sales"], &["Pune"]), AlwaysApply::default());

    let (state, report) = runner.run(&session, state(&tmp, 10)).await.unwrap();

    assert_eq!(report.candidates_seen, 1);
    assert_eq!(report.applied, 1);
    let records = state.recorder().store().records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].job_title, "Sales Lead");
    assert_eq!(records[0].company, "Acme");
}
