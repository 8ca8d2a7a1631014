//! Report output.
//!
//! # Output Files
//!
//! - `report.json` - The complete report
//! - `responses.jsonl` - One per-agent response per line
//! - `summary.txt` - Human-readable bars for every question

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use poll_events::{AgentResponse, Report};

use crate::render::render_summary;

pub const REPORT_FILE: &str = "report.json";
pub const RESPONSES_FILE: &str = "responses.jsonl";
pub const SUMMARY_FILE: &str = "summary.txt";

/// Errors that can occur during output operations.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes reports into an output directory.
#[derive(Debug)]
pub struct ReportWriter {
    output_dir: PathBuf,
    reports_written: u64,
}

impl ReportWriter {
    /// Creates a writer for the given directory, creating it if needed.
    pub fn new(output_dir: &Path) -> Result<Self, OutputError> {
        fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            reports_written: 0,
        })
    }

    /// Writes all output files for a report, replacing earlier ones.
    pub fn write(&mut self, report: &Report) -> Result<(), OutputError> {
        let file = File::create(self.output_dir.join(REPORT_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;

        let file = File::create(self.output_dir.join(RESPONSES_FILE))?;
        let mut writer = BufWriter::new(file);
        for response in &report.individual_responses {
            let line = serde_json::to_string(response)?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        fs::write(self.output_dir.join(SUMMARY_FILE), render_summary(&report.summary))?;

        self.reports_written += 1;
        tracing::info!(
            run_id = %report.run_id,
            dir = %self.output_dir.display(),
            "wrote report"
        );
        Ok(())
    }

    pub fn reports_written(&self) -> u64 {
        self.reports_written
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Reads reports back from an output directory.
#[derive(Debug)]
pub struct ReportReader {
    output_dir: PathBuf,
}

impl ReportReader {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Reads `report.json`.
    pub fn read_report(&self) -> Result<Report, OutputError> {
        let content = fs::read_to_string(self.output_dir.join(REPORT_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reads every line of `responses.jsonl`.
    pub fn read_responses(&self) -> Result<Vec<AgentResponse>, OutputError> {
        let content = fs::read_to_string(self.output_dir.join(RESPONSES_FILE))?;
        let mut responses = Vec::new();

        for line in content.lines() {
            if !line.trim().is_empty() {
                responses.push(serde_json::from_str(line)?);
            }
        }

        Ok(responses)
    }
}
