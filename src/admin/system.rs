//! Host resource summary for the diagnostic report.

use std::path::Path;

use serde::Serialize;
use sysinfo::{Disks, System};

const MB: u64 = 1024 * 1024;

/// Memory, uptime, load and root-disk figures of the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub mem_total_mb: u64,
    pub mem_free_mb: u64,
    pub mem_used_mb: u64,
    pub uptime: String,
    pub load_average: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<String>,
}

/// Collect host figures. Platforms without a figure report zeros.
pub fn collect() -> SystemInfo {
    let mut sys = System::new();
    sys.refresh_memory();

    let load = System::load_average();
    SystemInfo {
        mem_total_mb: sys.total_memory() / MB,
        mem_free_mb: sys.free_memory() / MB,
        mem_used_mb: sys.used_memory() / MB,
        uptime: format_uptime(System::uptime()),
        load_average: format_load([load.one, load.five, load.fifteen]),
        disk_usage: disk_usage(Path::new("/")),
    }
}

fn disk_usage(mount_point: &Path) -> Option<String> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks.list().iter().find(|d| d.mount_point() == mount_point)?;

    let total = disk.total_space();
    let available = disk.available_space();
    Some(format_disk(mount_point, total, available))
}

fn format_disk(mount_point: &Path, total: u64, available: u64) -> String {
    let used = total.saturating_sub(available);
    let percent_used = if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    };
    format!(
        "Path: {} Total: {} MB Used: {} MB ({:.2}%) Available: {} MB",
        mount_point.display(),
        total / MB,
        used / MB,
        percent_used,
        available / MB
    )
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{days}d {hours:02}h {minutes:02}m {seconds:02}s")
}

fn format_load([l1, l5, l15]: [f64; 3]) -> String {
    format!("1-min: {l1:.2}, 5-min: {l5:.2}, 15-min: {l15:.2}")
}
