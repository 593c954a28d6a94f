/// Format a unix timestamp for display, "unknown" if out of range.
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Format a runtime in whole seconds, "-" when none was recorded.
pub fn format_runtime(runtime: Option<i64>) -> String {
    match runtime {
        Some(secs) => format!("{secs}s"),
        None => "-".to_string(),
    }
}

/// Format an optional count, "-" when absent.
pub fn format_count(count: Option<i64>) -> String {
    match count {
        Some(n) => n.to_string(),
        None => "-".to_string(),
    }
}
