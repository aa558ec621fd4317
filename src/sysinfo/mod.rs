//! Host inventory recorded with every sweep
//!
//! Each probe is independent; anything that cannot be read is reported as
//! [`UNAVAILABLE`] and never fails the sweep.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Placeholder for values that could not be collected
pub const UNAVAILABLE: &str = "unavailable";

const GPU_QUERY: &str = "--query-gpu=index,name,memory.total,driver_version";

/// One row of `nvidia-smi` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub index: String,
    pub name: String,
    pub memory_total: String,
    pub driver_version: String,
}

/// Snapshot of the machine the sweep ran on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInventory {
    pub collected_at: DateTime<Local>,
    pub hostname: String,
    pub os: String,
    pub cpu_model: String,
    pub logical_cores: String,
    pub total_memory: String,
    /// Empty when no GPU could be queried
    pub gpus: Vec<GpuInfo>,
}

impl SystemInventory {
    /// Probe the local machine
    pub async fn collect() -> Self {
        let gpus = query_gpus().await;
        Self {
            collected_at: Local::now(),
            hostname: hostname().await,
            os: os_description(),
            cpu_model: read_to_string("/proc/cpuinfo")
                .and_then(|text| cpu_model(&text))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            logical_cores: std::thread::available_parallelism()
                .map(|n| n.get().to_string())
                .unwrap_or_else(|_| UNAVAILABLE.to_string()),
            total_memory: read_to_string("/proc/meminfo")
                .and_then(|text| total_memory(&text))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            gpus,
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Date", self.collected_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ("Hostname", self.hostname.clone()),
            ("OS", self.os.clone()),
            ("CPU", self.cpu_model.clone()),
            ("Logical cores", self.logical_cores.clone()),
            ("Total memory", self.total_memory.clone()),
        ]
    }

    /// Plain text for `system_info.txt`
    pub fn render_text(&self) -> String {
        let mut out = String::from("System information\n==================\n");
        for (label, value) in self.rows() {
            let _ = writeln!(out, "{label:<14} {value}");
        }
        out.push_str("\nGPUs\n----\n");
        if self.gpus.is_empty() {
            let _ = writeln!(out, "{UNAVAILABLE}");
        }
        for gpu in &self.gpus {
            let _ = writeln!(
                out,
                "GPU {}: {} ({}, driver {})",
                gpu.index, gpu.name, gpu.memory_total, gpu.driver_version
            );
        }
        out
    }

    /// Markdown block for the cumulative report header
    pub fn render_markdown(&self) -> String {
        let mut out = String::from("| Item | Value |\n|---|---|\n");
        for (label, value) in self.rows() {
            let _ = writeln!(out, "| {label} | {value} |");
        }
        if self.gpus.is_empty() {
            let _ = writeln!(out, "| GPU | {UNAVAILABLE} |");
        }
        for gpu in &self.gpus {
            let _ = writeln!(
                out,
                "| GPU {} | {} ({}, driver {}) |",
                gpu.index, gpu.name, gpu.memory_total, gpu.driver_version
            );
        }
        out
    }
}

fn read_to_string(path: impl AsRef<Path>) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

async fn hostname() -> String {
    if let Some(name) = read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        return name;
    }
    match Command::new("hostname").output().await {
        Ok(out) if out.status.success() => {
            let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if name.is_empty() {
                UNAVAILABLE.to_string()
            } else {
                name
            }
        }
        _ => UNAVAILABLE.to_string(),
    }
}

fn os_description() -> String {
    let pretty = read_to_string("/etc/os-release").and_then(|text| {
        text.lines()
            .find_map(|line| line.strip_prefix("PRETTY_NAME="))
            .map(|v| v.trim_matches('"').to_string())
    });
    let arch = std::env::consts::ARCH;
    match pretty {
        Some(name) => format!("{name} ({arch})"),
        None => format!("{} ({arch})", std::env::consts::OS),
    }
}

fn cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
        .filter(|model| !model.is_empty())
}

fn total_memory(meminfo: &str) -> Option<String> {
    let kib: f64 = meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(format!("{:.2} GB", kib / (1024.0 * 1024.0)))
}

fn parse_gpu_rows(csv: &str) -> Vec<GpuInfo> {
    csv.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match fields.as_slice() {
                [index, name, memory_total, driver_version] => Some(GpuInfo {
                    index: index.to_string(),
                    name: name.to_string(),
                    memory_total: memory_total.to_string(),
                    driver_version: driver_version.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

async fn query_gpus() -> Vec<GpuInfo> {
    match Command::new("nvidia-smi")
        .args([GPU_QUERY, "--format=csv,noheader"])
        .output()
        .await
    {
        Ok(out) if out.status.success() => parse_gpu_rows(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            tracing::debug!(status = %out.status, "nvidia-smi exited unsuccessfully");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "nvidia-smi not available");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_model() {
        let text = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) Gold 6330\n";
        assert_eq!(cpu_model(text).as_deref(), Some("Intel(R) Xeon(R) Gold 6330"));
        assert_eq!(cpu_model("processor: 0\n"), None);
    }

    #[test]
    fn test_total_memory() {
        let text = "MemTotal:       16777216 kB\nMemFree:         1024 kB\n";
        assert_eq!(total_memory(text).as_deref(), Some("16.00 GB"));
        assert_eq!(total_memory("garbage"), None);
    }

    #[test]
    fn test_parse_gpu_rows() {
        let csv = "0, NVIDIA A100-SXM4-80GB, 81920 MiB, 535.104.05\n1, NVIDIA A100-SXM4-80GB, 81920 MiB, 535.104.05\nbad line\n";
        let gpus = parse_gpu_rows(csv);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[1].index, "1");
        assert_eq!(gpus[0].memory_total, "81920 MiB");
    }

    #[tokio::test]
    async fn test_collect_never_fails() {
        let inventory = SystemInventory::collect().await;
        assert!(!inventory.hostname.is_empty());
        assert!(!inventory.logical_cores.is_empty());
        let text = inventory.render_text();
        assert!(text.contains("Hostname"));
        assert!(inventory.render_markdown().starts_with("| Item | Value |"));
    }
}
