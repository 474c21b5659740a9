//! Drives a whole run: authenticate, search every (keyword, location) pair,
//! hand fresh candidates to the application step, record what was applied.
use crate::auth::AuthGate;
use crate::locator::{ListingLocator, classify};
use crate::recorder::{ApplicationRecorder, Recorded};
use crate::store::{SessionStore, StoreError};
use applybot_common::BotError;
use applybot_config::ApplybotConfig;
use applybot_drivers::browser::session::{BrowserSession, PageElement};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

const TEXT_ID_PREFIX: &str = "text-";
const TEXT_ID_LEN: usize = 16;

/// One listing, reduced to what the recorder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCandidate {
    pub job_id: String,
    pub title: String,
    pub company: String,
}

impl JobCandidate {
    /// Build from an optional site id and the listing's rendered text.
    ///
    /// Without a site id the job is keyed by a digest of its text, so the same
    /// card seen on a later run maps to the same id.
    pub fn from_text(site_id: Option<String>, text: &str) -> Self {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let title = lines.next().unwrap_or_default().to_string();
        let company = lines.next().unwrap_or_default().to_string();
        let job_id = match site_id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                let hash = blake3::hash(text.trim().as_bytes());
                format!("{TEXT_ID_PREFIX}{}", &hash.to_hex().as_str()[..TEXT_ID_LEN])
            }
        };
        Self {
            job_id,
            title,
            company,
        }
    }
}

/// Reads candidates off listing elements.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    id_attributes: Vec<String>,
}

impl CandidateExtractor {
    pub fn new(id_attributes: Vec<String>) -> Self {
        Self { id_attributes }
    }

    pub async fn extract<E: PageElement>(&self, element: &E) -> anyhow::Result<JobCandidate> {
        let mut site_id = None;
        for attribute in &self.id_attributes {
            match element.attribute(attribute).await {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    site_id = Some(value);
                    break;
                }
                Ok(_) => {}
                Err(err) => debug!(target: "runner.extract", %attribute, error = %err, "attribute unreadable"),
            }
        }
        let text = element.text().await?;
        Ok(JobCandidate::from_text(site_id, &text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Skipped(String),
}

/// Whatever turns a candidate into a submitted application.
#[async_trait]
pub trait ApplicationStep: Send + Sync {
    async fn apply<S: BrowserSession>(
        &self,
        session: &S,
        candidate: &JobCandidate,
        answers: &BTreeMap<String, String>,
    ) -> anyhow::Result<ApplyOutcome>;
}

/// Reports candidates without submitting anything.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOnly;

#[async_trait]
impl ApplicationStep for DiscoveryOnly {
    async fn apply<S: BrowserSession>(
        &self,
        _session: &S,
        candidate: &JobCandidate,
        _answers: &BTreeMap<String, String>,
    ) -> anyhow::Result<ApplyOutcome> {
        info!(
            target: "runner.discover",
            job_id = %candidate.job_id,
            title = %candidate.title,
            company = %candidate.company,
            "candidate discovered"
        );
        Ok(ApplyOutcome::Skipped("discovery only".to_string()))
    }
}

/// Everything a run carries between pairs; rebuilt from the store on restart.
#[derive(Debug)]
pub struct RunState {
    recorder: ApplicationRecorder,
    applications: usize,
    ceiling: usize,
}

impl RunState {
    pub fn restore(store: SessionStore, ceiling: usize) -> Self {
        Self {
            recorder: ApplicationRecorder::open(store),
            applications: 0,
            ceiling,
        }
    }

    pub fn recorder(&self) -> &ApplicationRecorder {
        &self.recorder
    }

    /// Applications made by this run (not the stored history).
    pub fn applications(&self) -> usize {
        self.applications
    }

    pub fn ceiling_reached(&self) -> bool {
        self.applications >= self.ceiling
    }

    fn record(&mut self, candidate: &JobCandidate) -> Result<Recorded, StoreError> {
        let recorded = self.recorder.record_application(
            &candidate.job_id,
            &candidate.title,
            &candidate.company,
        )?;
        if matches!(recorded, Recorded::Appended(_)) {
            self.applications += 1;
        }
        Ok(recorded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub authenticated: bool,
    pub pairs_searched: usize,
    pub pairs_without_listings: usize,
    pub candidates_seen: usize,
    pub duplicates_skipped: usize,
    pub applied: usize,
    pub application_failures: usize,
    pub persistence_failures: usize,
}

pub struct Runner<A> {
    gate: AuthGate,
    locator: ListingLocator,
    extractor: CandidateExtractor,
    step: A,
    keywords: Vec<String>,
    locations: Vec<String>,
    answers: BTreeMap<String, String>,
}

impl<A: ApplicationStep> Runner<A> {
    pub fn new(gate: AuthGate, locator: ListingLocator, extractor: CandidateExtractor, step: A) -> Self {
        Self {
            gate,
            locator,
            extractor,
            step,
            keywords: Vec::new(),
            locations: Vec::new(),
            answers: BTreeMap::new(),
        }
    }

    pub fn from_config(cfg: &ApplybotConfig, step: A) -> Self {
        Self::new(
            AuthGate::from_settings(&cfg.site, &cfg.auth),
            ListingLocator::from_settings(&cfg.site, &cfg.listing),
            CandidateExtractor::new(cfg.listing.job_id_attributes.clone()),
            step,
        )
        .with_targets(cfg.run.keywords.clone(), cfg.run.locations.clone())
        .with_answers(cfg.run.default_answers.clone())
    }

    pub fn with_targets(mut self, keywords: Vec<String>, locations: Vec<String>) -> Self {
        self.keywords = keywords;
        self.locations = locations;
        self
    }

    pub fn with_answers(mut self, answers: BTreeMap<String, String>) -> Self {
        self.answers = answers;
        self
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn locator(&self) -> &ListingLocator {
        &self.locator
    }

    /// Search every pair in order until the ceiling is reached.
    ///
    /// Every failure short of a lost browser session is counted in the report
    /// and the run moves on.
    pub async fn run<S: BrowserSession>(
        &self,
        session: &S,
        mut state: RunState,
    ) -> Result<(RunState, RunReport), BotError> {
        let mut report = RunReport::default();
        info!(
            target: "runner.run",
            keywords = self.keywords.len(),
            locations = self.locations.len(),
            ceiling = state.ceiling,
            "run starting"
        );

        report.authenticated = self
            .gate
            .await_manual_authentication(session, self.gate.window())
            .await;
        if !report.authenticated {
            warn!(target: "runner.run", "continuing without a verified login");
        }

        'pairs: for keyword in &self.keywords {
            for location in &self.locations {
                if state.ceiling_reached() {
                    info!(target: "runner.run", applied = state.applications, "application ceiling reached");
                    break 'pairs;
                }
                report.pairs_searched += 1;
                let listings = self.locator.locate(session, &self.gate, keyword, location).await?;
                if !listings.is_found() {
                    report.pairs_without_listings += 1;
                    continue;
                }
                for element in listings.into_elements() {
                    if state.ceiling_reached() {
                        break;
                    }
                    self.process(session, &element, &mut state, &mut report).await?;
                }
            }
        }

        info!(target: "runner.run", report = ?report, "run finished");
        Ok((state, report))
    }

    async fn process<S: BrowserSession>(
        &self,
        session: &S,
        element: &S::Element,
        state: &mut RunState,
        report: &mut RunReport,
    ) -> Result<(), BotError> {
        let candidate = match self.extractor.extract(element).await {
            Ok(candidate) => candidate,
            Err(err) => return fatal_or(session, err, || {
                debug!(target: "runner.extract", "listing unreadable; skipping");
            }),
        };
        report.candidates_seen += 1;

        if state.recorder.already_applied(&candidate.job_id) {
            debug!(target: "runner.process", job_id = %candidate.job_id, "already applied");
            report.duplicates_skipped += 1;
            return Ok(());
        }

        match self.step.apply(session, &candidate, &self.answers).await {
            Ok(ApplyOutcome::Applied) => match state.record(&candidate) {
                Ok(Recorded::Appended(_)) => report.applied += 1,
                Ok(Recorded::AlreadyPresent) => report.duplicates_skipped += 1,
                Err(err) => {
                    error!(target: "runner.process", job_id = %candidate.job_id, error = %err, "could not persist application");
                    report.persistence_failures += 1;
                }
            },
            Ok(ApplyOutcome::Skipped(reason)) => {
                debug!(target: "runner.process", job_id = %candidate.job_id, %reason, "candidate skipped");
            }
            Err(err) => {
                return fatal_or(session, err, || {
                    report.application_failures += 1;
                });
            }
        }
        Ok(())
    }
}

fn fatal_or<S: BrowserSession>(
    session: &S,
    err: anyhow::Error,
    otherwise: impl FnOnce(),
) -> Result<(), BotError> {
    let err = classify(session, err);
    if err.is_fatal() {
        return Err(err);
    }
    warn!(target: "runner.process", error = %err, "step failed; continuing");
    otherwise();
    Ok(())
}
