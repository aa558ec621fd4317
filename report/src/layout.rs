//! File layout of one sweep's run directory

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Paths of every artifact a sweep produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Create `benchmark_logs_<YYYYmmdd_HHMMSS>` under `output_root`
    pub fn create(output_root: &Path, started: DateTime<Local>) -> io::Result<Self> {
        let root = output_root.join(format!(
            "benchmark_logs_{}",
            started.format("%Y%m%d_%H%M%S")
        ));
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Use an existing directory as the run directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The run directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn system_info(&self) -> PathBuf {
        self.root.join("system_info.txt")
    }

    /// Raw tee'd output of scenario `index` (1-based)
    pub fn scenario_log(&self, index: usize) -> PathBuf {
        self.root.join(format!("scenario_{index:02}.log"))
    }

    pub fn scenario_report(&self, index: usize) -> PathBuf {
        self.root.join(format!("scenario_{index:02}_report.md"))
    }

    pub fn scenario_email(&self, index: usize) -> PathBuf {
        self.root.join(format!("scenario_{index:02}_email.txt"))
    }

    /// Cumulative report
    pub fn summary_report(&self) -> PathBuf {
        self.root.join("benchmark_summary.md")
    }

    pub fn final_email(&self) -> PathBuf {
        self.root.join("final_email.txt")
    }

    pub fn summary_color_log(&self) -> PathBuf {
        self.root.join("summary_color.log")
    }

    pub fn summary_plain_log(&self) -> PathBuf {
        self.root.join("summary.log")
    }

    pub fn scenarios_csv(&self) -> PathBuf {
        self.root.join("scenarios.csv")
    }

    pub fn summary_json(&self) -> PathBuf {
        self.root.join("summary.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_timestamped_dir() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let layout = RunLayout::create(dir.path(), started).unwrap();

        assert!(layout.root().is_dir());
        assert!(layout.root().ends_with("benchmark_logs_20240506_070809"));
        assert!(layout.scenario_log(3).ends_with("scenario_03.log"));
        assert!(layout.scenario_report(12).ends_with("scenario_12_report.md"));
    }
}
