// Stores the assembler reads from: processed scans and recorded failures,
// both keyed by (service id, commit hash).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::{ProcessedScan, ScanFailure, ScanProcessor};
use crate::config;
use crate::models::{RawScan, ScanErrorType};

/// Read access to the scan artifacts backing a build.
pub trait ScanStore: Send + Sync {
    /// The processed scan for a pinned revision, if one exists.
    fn processed(&self, service_id: &str, commit_hash: &str) -> Option<ProcessedScan>;

    /// The recorded scan failure for a pinned revision, if one exists.
    fn failure(&self, service_id: &str, commit_hash: &str) -> Option<ScanFailure>;
}

/// In-memory store, populated explicitly. The primary store for tests and
/// for embedding the engine behind another persistence layer.
#[derive(Debug, Default)]
pub struct InMemoryScanStore {
    scans: HashMap<(String, String), ProcessedScan>,
    failures: HashMap<(String, String), ScanFailure>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        InMemoryScanStore::default()
    }

    pub fn insert_processed(&mut self, commit_hash: impl Into<String>, scan: ProcessedScan) {
        self.scans
            .insert((scan.service_id.clone(), commit_hash.into()), scan);
    }

    /// Run a processor configured from the process-wide options on a raw
    /// artifact and store the result. Returns the processor warnings.
    pub fn insert_raw(
        &mut self,
        commit_hash: impl Into<String>,
        raw: &RawScan,
    ) -> Result<Vec<String>> {
        let processor = ScanProcessor::from_config(&config::global().queue_config());
        self.insert_raw_with(&processor, commit_hash, raw)
    }

    /// Same as `insert_raw` with an explicit processor.
    pub fn insert_raw_with(
        &mut self,
        processor: &ScanProcessor,
        commit_hash: impl Into<String>,
        raw: &RawScan,
    ) -> Result<Vec<String>> {
        let output = processor.process(raw)?;
        self.insert_processed(commit_hash, output.scan);
        Ok(output.warnings)
    }

    pub fn insert_failure(&mut self, failure: ScanFailure) {
        self.failures.insert(
            (failure.service_id.clone(), failure.git_commit_hash.clone()),
            failure,
        );
    }
}

impl ScanStore for InMemoryScanStore {
    fn processed(&self, service_id: &str, commit_hash: &str) -> Option<ProcessedScan> {
        self.scans
            .get(&(service_id.to_string(), commit_hash.to_string()))
            .cloned()
    }

    fn failure(&self, service_id: &str, commit_hash: &str) -> Option<ScanFailure> {
        self.failures
            .get(&(service_id.to_string(), commit_hash.to_string()))
            .cloned()
    }
}

/// Store backed by a directory of artifacts, loaded eagerly at construction:
///
/// - `{service}@{commit}.json` — a raw scan, run through the processor;
/// - `{service}@{commit}.failed.json` — a recorded scan failure.
///
/// A raw scan that fails to parse or process is demoted to a failure record
/// (`PARSE_ERROR` / `PROCESSING_ERROR`) instead of aborting the load, so a
/// single bad artifact degrades the build instead of blocking it.
#[derive(Debug, Default)]
pub struct DirScanStore {
    inner: InMemoryScanStore,
}

impl DirScanStore {
    /// Load with a processor configured from the process-wide options.
    pub fn load(dir: &Path) -> Result<Self> {
        let processor = ScanProcessor::from_config(&config::global().queue_config());
        Self::load_with(dir, &processor)
    }

    /// Load with an explicit processor.
    pub fn load_with(dir: &Path, processor: &ScanProcessor) -> Result<Self> {
        let mut inner = InMemoryScanStore::new();

        let mut entries: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("reading scan directory {}", dir.display()))?
            .collect::<std::io::Result<_>>()
            .with_context(|| format!("listing scan directory {}", dir.display()))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(stem) = file_name.strip_suffix(".failed.json") {
                let Some((service_id, commit_hash)) = split_artifact_name(stem, &path) else {
                    continue;
                };
                let failure = Self::read_failure(&path, &service_id, &commit_hash)?;
                inner.insert_failure(failure);
            } else if let Some(stem) = file_name.strip_suffix(".json") {
                let Some((service_id, commit_hash)) = split_artifact_name(stem, &path) else {
                    continue;
                };
                Self::load_raw_scan(&mut inner, processor, &path, service_id, commit_hash);
            } else {
                warn!(
                    artifact = %path.display(),
                    "unrecognized file in scan directory; expected {{service}}@{{commit}}.json or .failed.json"
                );
            }
        }

        Ok(DirScanStore { inner })
    }

    fn read_failure(path: &Path, service_id: &str, commit_hash: &str) -> Result<ScanFailure> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading failure record {}", path.display()))?;
        let mut failure: ScanFailure = serde_json::from_str(&content)
            .with_context(|| format!("parsing failure record {}", path.display()))?;
        // The file name is authoritative for the key; the record body may
        // omit or disagree with it.
        if failure.service_id != service_id || failure.git_commit_hash != commit_hash {
            failure.service_id = service_id.to_string();
            failure.git_commit_hash = commit_hash.to_string();
        }
        Ok(failure)
    }

    fn load_raw_scan(
        inner: &mut InMemoryScanStore,
        processor: &ScanProcessor,
        path: &Path,
        service_id: String,
        commit_hash: String,
    ) {
        let raw: RawScan = match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(artifact = %path.display(), %err, "unparsable scan artifact");
                inner.insert_failure(ScanFailure {
                    service_id,
                    git_commit_hash: commit_hash,
                    error_type: ScanErrorType::ParseError,
                    error_message: err.to_string(),
                });
                return;
            }
        };

        if raw.artifact_id != service_id {
            warn!(
                artifact = %path.display(),
                file_service = %service_id,
                scanned_service = %raw.artifact_id,
                "artifact file name disagrees with its artifactId; using the artifactId"
            );
        }

        match processor.process(&raw) {
            Ok(output) => {
                for warning in &output.warnings {
                    warn!(service = %output.scan.service_id, "{warning}");
                }
                debug!(service = %output.scan.service_id, commit = %commit_hash, "loaded scan artifact");
                inner.insert_processed(commit_hash, output.scan);
            }
            Err(err) => {
                inner.insert_failure(ScanFailure {
                    service_id: raw.artifact_id,
                    git_commit_hash: commit_hash,
                    error_type: ScanErrorType::ProcessingError,
                    error_message: err.to_string(),
                });
            }
        }
    }
}

impl ScanStore for DirScanStore {
    fn processed(&self, service_id: &str, commit_hash: &str) -> Option<ProcessedScan> {
        self.inner.processed(service_id, commit_hash)
    }

    fn failure(&self, service_id: &str, commit_hash: &str) -> Option<ScanFailure> {
        self.inner.failure(service_id, commit_hash)
    }
}

/// Split `{service}@{commit}` on the last `@`. Files that do not follow the
/// naming scheme are skipped with a warning.
fn split_artifact_name(stem: &str, path: &Path) -> Option<(String, String)> {
    match stem.rsplit_once('@') {
        Some((service, commit)) if !service.is_empty() && !commit.is_empty() => {
            Some((service.to_string(), commit.to_string()))
        }
        _ => {
            warn!(artifact = %path.display(), "artifact file name is not {{service}}@{{commit}}; skipped");
            None
        }
    }
}
