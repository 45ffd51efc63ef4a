use std::time::Instant;

use tracing::{info, warn};

use crate::checkpoint::{CheckpointState, CheckpointStore, CheckpointWriter, ProjectOutcome};
use crate::config::ResolvedConfig;
use crate::error::CollectorError;
use crate::fetcher::MetadataFetcher;
use crate::osf::OsfApi;
use crate::output::{RunSummary, write_dataset, write_failures};
use crate::record::{FailureKind, FailureRecord, Metrics, ProjectRecord};
use crate::resolver::resolve_endpoint;
use crate::seeds::{SeedEntry, load_seeds};
use crate::walker::FileTreeWalker;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResult {
    pub records: Vec<ProjectRecord>,
    pub failures: Vec<FailureRecord>,
    /// Seeds taken from the checkpoint instead of being fetched.
    pub resumed: usize,
    /// Seeds processed in this run.
    pub processed: usize,
}

/// Sequential pipeline over one OSF API: resolve, fetch facets, walk the
/// file tree, checkpoint.
pub struct Collector<A: OsfApi> {
    api: A,
    base_url: String,
    max_depth: usize,
}

impl<A: OsfApi> Collector<A> {
    pub fn new(api: A, base_url: impl Into<String>, max_depth: usize) -> Self {
        Self {
            api,
            base_url: base_url.into(),
            max_depth,
        }
    }

    pub fn from_config(api: A, config: &ResolvedConfig) -> Self {
        Self::new(api, config.base_url.clone(), config.max_depth)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Processes one seed. Every per-project error ends up in the outcome;
    /// nothing here aborts the run.
    pub fn collect_project(&self, seed: &SeedEntry) -> ProjectOutcome {
        let id = match &seed.project_id {
            Ok(id) => id,
            Err(reason) => {
                warn!(url = %seed.url, "unrecognized project url");
                return ProjectOutcome::Failed(FailureRecord {
                    url: seed.url.clone(),
                    project_id: None,
                    kind: FailureKind::InvalidUrl,
                    reason: reason.clone(),
                    failed_at: timestamp(),
                });
            }
        };

        let start = Instant::now();
        let resolution = match resolve_endpoint(&self.api, &self.base_url, id) {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!(project = %id, error = %err, "project unresolved");
                return ProjectOutcome::Failed(FailureRecord {
                    url: seed.url.clone(),
                    project_id: Some(id.clone()),
                    kind: FailureKind::Unresolved,
                    reason: err.to_string(),
                    failed_at: timestamp(),
                });
            }
        };

        let fetcher = MetadataFetcher::new(&self.api, &self.base_url);
        let mut record = fetcher.fetch(&seed.url, id, &resolution, timestamp());

        let walker = FileTreeWalker::new(&self.api, &self.base_url, self.max_depth);
        record.file_structure = walker.walk(id, resolution.endpoint_type);
        record.metrics = Metrics::compute(
            &record.file_structure,
            &record.contributors,
            record.metrics.activity_logs,
        );

        info!(
            project = %id,
            endpoint = %record.endpoint_type,
            files = record.metrics.file_count,
            downloads = record.metrics.total_downloads,
            partial = record.metrics.partial,
            latency_ms = start.elapsed().as_millis() as u64,
            "project collected"
        );
        ProjectOutcome::Collected(Box::new(record))
    }

    /// Runs every seed not already covered by the writer's checkpoint, in
    /// seed order, and flushes a final checkpoint before returning.
    pub fn run(
        &self,
        seeds: &[SeedEntry],
        writer: &mut CheckpointWriter,
    ) -> Result<CollectionResult, CollectorError> {
        let mut state = match writer.store().load()? {
            Some(state) => {
                state.verify_against(seeds)?;
                info!(
                    path = %writer.store().path(),
                    completed = state.processed_count(),
                    next = state.next_index,
                    "resuming from checkpoint"
                );
                state
            }
            None => CheckpointState::default(),
        };
        let resumed = state.processed_count();
        let processed_keys = state.processed_keys();
        let total = seeds.len();

        let mut processed = 0usize;
        for index in state.next_index..total {
            let seed = &seeds[index];
            if processed_keys.contains(seed.key()) {
                continue;
            }
            info!(position = index + 1, total, url = %seed.url, "processing");
            let outcome = self.collect_project(seed);
            writer.commit(&mut state, outcome, index + 1, seeds.get(index + 1))?;
            processed += 1;
        }
        writer.flush(&state)?;

        Ok(CollectionResult {
            records: state.records,
            failures: state.failures,
            resumed,
            processed,
        })
    }
}

/// Seed file in, dataset and failure log out. The checkpoint is removed once
/// the dataset is written unless the config asks to keep it.
pub fn collect_to_disk<A: OsfApi>(
    api: A,
    config: &ResolvedConfig,
) -> Result<RunSummary, CollectorError> {
    let seeds = load_seeds(&config.input)?;
    info!(path = %config.input, seeds = seeds.len(), "loaded seeds");

    let collector = Collector::from_config(api, config);
    let mut writer = CheckpointWriter::new(
        CheckpointStore::new(config.checkpoint.clone()),
        config.checkpoint_every,
    );
    let result = collector.run(&seeds, &mut writer)?;

    write_dataset(&config.output, &result.records)?;
    write_failures(&config.failures, &result.failures)?;
    info!(path = %config.output, records = result.records.len(), "dataset written");

    if !config.keep_checkpoint {
        writer.store().remove()?;
    }
    Ok(RunSummary::from_result(&result, seeds.len()))
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
