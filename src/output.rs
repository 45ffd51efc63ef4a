use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::checkpoint::write_atomic;
use crate::collector::CollectionResult;
use crate::error::CollectorError;
use crate::record::{FailureKind, FailureRecord, ProjectRecord};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub resumed: usize,
    pub partial: usize,
    pub success_rate: f64,
    pub failures: Vec<FailureLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureLine {
    pub url: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl RunSummary {
    pub fn from_result(result: &CollectionResult, attempted: usize) -> Self {
        let succeeded = result.records.len();
        let success_rate = if attempted == 0 {
            0.0
        } else {
            succeeded as f64 / attempted as f64 * 100.0
        };
        Self {
            attempted,
            succeeded,
            failed: result.failures.len(),
            resumed: result.resumed,
            partial: result
                .records
                .iter()
                .filter(|record| record.metrics.partial)
                .count(),
            success_rate,
            failures: result
                .failures
                .iter()
                .map(|failure| FailureLine {
                    url: failure.url.clone(),
                    kind: failure.kind,
                    reason: failure.reason.clone(),
                })
                .collect(),
        }
    }
}

pub fn write_dataset(path: &Utf8Path, records: &[ProjectRecord]) -> Result<(), CollectorError> {
    write_json(path, records)
}

pub fn write_failures(path: &Utf8Path, failures: &[FailureRecord]) -> Result<(), CollectorError> {
    write_json(path, failures)
}

fn write_json<T: Serialize + ?Sized>(path: &Utf8Path, value: &T) -> Result<(), CollectorError> {
    let mut content = serde_json::to_vec_pretty(value)
        .map_err(|err| CollectorError::Filesystem(err.to_string()))?;
    content.push(b'\n');
    write_atomic(path, &content)
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let json = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_summary(summary: &RunSummary) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}=== OSF collection summary ==={reset}");
        println!("Total projects: {}", summary.attempted);
        println!("{green}Successful: {}{reset}", summary.succeeded);
        let failed_color = if summary.failed == 0 { green } else { red };
        println!("{failed_color}Failed: {}{reset}", summary.failed);
        if summary.resumed > 0 {
            println!("{cyan}Resumed from checkpoint: {}{reset}", summary.resumed);
        }
        if summary.partial > 0 {
            println!(
                "{yellow}Partial file trees (metrics are lower bounds): {}{reset}",
                summary.partial
            );
        }
        println!("Success rate: {:.1}%", summary.success_rate);

        for failure in &summary.failures {
            println!("{red}  - {}: {}{reset}", failure.url, failure.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_empty_run_has_zero_rate() {
        let result = CollectionResult {
            records: Vec::new(),
            failures: Vec::new(),
            resumed: 0,
            processed: 0,
        };
        let summary = RunSummary::from_result(&result, 0);
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.success_rate, 0.0);
    }
}
