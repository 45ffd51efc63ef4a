use std::collections::HashSet;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CollectorError;
use crate::record::{FailureRecord, ProjectRecord};
use crate::seeds::SeedEntry;

pub const CHECKPOINT_VERSION: u32 = 1;

/// What processing one seed produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectOutcome {
    Collected(Box<ProjectRecord>),
    Failed(FailureRecord),
}

/// Progress of a run: everything completed so far, in seed order, plus the
/// position of the next pending seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub version: u32,
    pub records: Vec<ProjectRecord>,
    pub failures: Vec<FailureRecord>,
    pub next_index: usize,
    pub next_id: Option<String>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            records: Vec::new(),
            failures: Vec::new(),
            next_index: 0,
            next_id: None,
        }
    }
}

impl CheckpointState {
    pub fn processed_count(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn processed_keys(&self) -> HashSet<String> {
        self.records
            .iter()
            .map(|record| record.project_id.to_string())
            .chain(self.failures.iter().map(|failure| match &failure.project_id {
                Some(id) => id.to_string(),
                None => failure.url.clone(),
            }))
            .collect()
    }

    /// Resume is only sound if the seed file still starts with exactly the
    /// seeds this checkpoint covers, in the same order.
    pub fn verify_against(&self, seeds: &[SeedEntry]) -> Result<(), CollectorError> {
        if self.next_index > seeds.len() {
            return Err(CollectorError::CheckpointMismatch(format!(
                "checkpoint covers {} seeds but the seed file has {}",
                self.next_index,
                seeds.len()
            )));
        }
        let processed = self.processed_keys();
        if let Some(missing) = seeds[..self.next_index]
            .iter()
            .find(|seed| !processed.contains(seed.key()))
        {
            return Err(CollectorError::CheckpointMismatch(format!(
                "seed {} is before the resume point but was never processed",
                missing.url
            )));
        }
        let expected = seeds.get(self.next_index).map(|seed| seed.key());
        if let Some(next_id) = &self.next_id {
            if expected != Some(next_id.as_str()) {
                return Err(CollectorError::CheckpointMismatch(format!(
                    "expected {next_id} at position {}, found {}",
                    self.next_index + 1,
                    expected.unwrap_or("end of file")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: Utf8PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// `Ok(None)` when no checkpoint exists. Anything unreadable is an error,
    /// never a silent fresh start.
    pub fn load(&self) -> Result<Option<CheckpointState>, CollectorError> {
        if !self.path.as_std_path().exists() {
            return Ok(None);
        }
        let corrupt = |reason: String| CollectorError::CheckpointCorrupt {
            path: self.path.clone(),
            reason,
        };
        let content =
            fs::read_to_string(self.path.as_std_path()).map_err(|err| corrupt(err.to_string()))?;
        let state: CheckpointState =
            serde_json::from_str(&content).map_err(|err| corrupt(err.to_string()))?;
        if state.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!(
                "unsupported checkpoint version {}",
                state.version
            )));
        }
        Ok(Some(state))
    }

    pub fn save(&self, state: &CheckpointState) -> Result<(), CollectorError> {
        let content = serde_json::to_vec_pretty(state)
            .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
        write_atomic(&self.path, &content)
    }

    pub fn remove(&self) -> Result<(), CollectorError> {
        if self.path.as_std_path().exists() {
            fs::remove_file(self.path.as_std_path())
                .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

/// Sole mutator of [`CheckpointState`]; flushes it every `every` projects.
#[derive(Debug)]
pub struct CheckpointWriter {
    store: CheckpointStore,
    every: usize,
}

impl CheckpointWriter {
    pub fn new(store: CheckpointStore, every: usize) -> Self {
        Self {
            store,
            every: every.max(1),
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Appends `outcome`, advances the resume point to `next`, and flushes
    /// when the processed count reaches a multiple of the interval. Returns
    /// whether a flush happened.
    pub fn commit(
        &mut self,
        state: &mut CheckpointState,
        outcome: ProjectOutcome,
        next_index: usize,
        next: Option<&SeedEntry>,
    ) -> Result<bool, CollectorError> {
        match outcome {
            ProjectOutcome::Collected(record) => state.records.push(*record),
            ProjectOutcome::Failed(failure) => state.failures.push(failure),
        }
        state.next_index = next_index;
        state.next_id = next.map(|seed| seed.key().to_string());

        if state.processed_count() % self.every == 0 {
            self.flush(state)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn flush(&mut self, state: &CheckpointState) -> Result<(), CollectorError> {
        self.store.save(state)?;
        info!(
            path = %self.store.path(),
            processed = state.processed_count(),
            "checkpoint saved"
        );
        Ok(())
    }
}

/// Writes to a temp file beside `path` and renames it over `path`, so a
/// crash never leaves a half-written file behind.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CollectorError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".osh-collector")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    Ok(())
}
