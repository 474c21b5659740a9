//! Detection and bookkeeping core for the job-application bot.
//!
//! - [`auth`]: decides whether the browser session is logged in
//! - [`locator`]: finds job listings through a cascade of detection strategies
//! - [`store`]: append-only CSV history of applied jobs
//! - [`recorder`]: keeps the store and the in-memory dedup index in step
//! - [`runner`]: walks every (keyword, location) pair and ties the rest together
//!
//! Nothing here talks to a browser directly; all page access goes through
//! [`applybot_drivers::browser::session::BrowserSession`].
pub mod auth;
pub mod locator;
pub mod recorder;
pub mod runner;
pub mod store;

pub use auth::{AuthGate, AuthSignal, SignalOutcome};
pub use locator::{ContentHeuristic, Detection, DetectionStrategy, ListingLocator, ListingSet};
pub use recorder::{ApplicationRecorder, DedupIndex, Recorded};
pub use runner::{
    ApplicationStep, ApplyOutcome, CandidateExtractor, DiscoveryOnly, JobCandidate, RunReport,
    RunState, Runner,
};
pub use store::{AppliedJobRecord, SessionStore, StoreError};
