// file: src/pipeline/log_sink.rs
// description: per-stage append-only log files for captured process output
// reference: stage output retention for later inspection

use crate::config::StagesConfig;
use crate::models::StageId;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// Destination for the full output of a stage execution.
pub trait LogSink: Send + Sync {
    fn append(&self, stage: StageId, stdout: &str, stderr: &str) -> io::Result<()>;
}

pub struct FileLogSink {
    paths: [PathBuf; 3],
}

impl FileLogSink {
    pub fn new(paths: [PathBuf; 3]) -> Self {
        Self { paths }
    }

    pub fn from_config(config: &StagesConfig) -> Self {
        Self::new(StageId::ALL.map(|stage| config.log_path(stage)))
    }

    pub fn path(&self, stage: StageId) -> &PathBuf {
        &self.paths[stage.index()]
    }
}

impl LogSink for FileLogSink {
    fn append(&self, stage: StageId, stdout: &str, stderr: &str) -> io::Result<()> {
        let path = self.path(stage);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(
            file,
            "===== {} {} =====",
            stage,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        if !stdout.is_empty() {
            writeln!(file, "--- stdout ---")?;
            file.write_all(stdout.as_bytes())?;
            if !stdout.ends_with('\n') {
                writeln!(file)?;
            }
        }
        if !stderr.is_empty() {
            writeln!(file, "--- stderr ---")?;
            file.write_all(stderr.as_bytes())?;
            if !stderr.ends_with('\n') {
                writeln!(file)?;
            }
        }
        file.flush()
    }
}
