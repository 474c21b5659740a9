use crate::store::{AppliedJobRecord, SessionStore, StoreError};
use std::collections::HashSet;
use tracing::{debug, info};

/// In-memory mirror of the persisted job ids.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    ids: HashSet<String>,
}

impl DedupIndex {
    pub fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }

    pub fn insert(&mut self, job_id: impl Into<String>) -> bool {
        self.ids.insert(job_id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<HashSet<String>> for DedupIndex {
    fn from(ids: HashSet<String>) -> Self {
        Self { ids }
    }
}

/// What [`ApplicationRecorder::record_application`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Appended(AppliedJobRecord),
    /// The id was already known; nothing was written.
    AlreadyPresent,
}

/// Couples the store and the index so they never disagree within a process.
///
/// The store is written first; the index is only updated once the write has
/// succeeded, so a failed write leaves the job eligible for a later attempt.
#[derive(Debug)]
pub struct ApplicationRecorder {
    store: SessionStore,
    index: DedupIndex,
}

impl ApplicationRecorder {
    /// Load the store's history into a fresh index.
    pub fn open(store: SessionStore) -> Self {
        let index = DedupIndex::from(store.load());
        info!(
            target: "recorder.open",
            path = %store.path().display(),
            known = index.len(),
            "dedup index ready"
        );
        Self { store, index }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }

    pub fn already_applied(&self, job_id: &str) -> bool {
        self.index.contains(job_id)
    }

    pub fn record_application(
        &mut self,
        job_id: &str,
        job_title: &str,
        company: &str,
    ) -> Result<Recorded, StoreError> {
        if self.already_applied(job_id) {
            debug!(target: "recorder.record", %job_id, "already recorded");
            return Ok(Recorded::AlreadyPresent);
        }
        let record = AppliedJobRecord::new(job_id, job_title, company);
        self.store.append(&record)?;
        self.index.insert(job_id);
        info!(target: "recorder.record", %job_id, title = %job_title, %company, "application recorded");
        Ok(Recorded::Appended(record))
    }
}
