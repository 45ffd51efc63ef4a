use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use tracing::debug;

use crate::domain::ProjectId;
use crate::error::CollectorError;

/// One usable line of the seed file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub url: String,
    pub project_id: Result<ProjectId, String>,
}

impl SeedEntry {
    pub fn parse(line: &str) -> Self {
        let url = line.trim().to_string();
        let project_id = url
            .parse::<ProjectId>()
            .map_err(|err| err.to_string());
        Self { url, project_id }
    }

    /// Key under which the entry is tracked in the checkpoint.
    pub fn key(&self) -> &str {
        match &self.project_id {
            Ok(id) => id.as_str(),
            Err(_) => &self.url,
        }
    }
}

pub fn load_seeds(path: &Utf8Path) -> Result<Vec<SeedEntry>, CollectorError> {
    let content =
        fs::read_to_string(path.as_std_path()).map_err(|err| CollectorError::SeedRead {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(parse_seeds(&content))
}

/// Blank lines and `#` comments are skipped; a repeated project id keeps
/// only its first occurrence so input order stays stable for resume.
pub fn parse_seeds(content: &str) -> Vec<SeedEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let entry = SeedEntry::parse(trimmed);
        if !seen.insert(entry.key().to_string()) {
            debug!(url = %entry.url, "skipping duplicate seed");
            continue;
        }
        entries.push(entry);
    }
    entries
}
