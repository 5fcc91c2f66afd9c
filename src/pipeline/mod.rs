pub mod air_quality;
pub mod hazard_metrics;
pub mod snap_points;
pub mod stormwater;

/// Runtime as HH:MM:SS for the end-of-job summary line.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let total_seconds = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}
