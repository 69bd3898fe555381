//! Human-readable formatting for byte counts and durations in log lines

use std::time::Duration;

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// `1536` -> `1.50KB`
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < BYTE_UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }

    match (unit, size) {
        (0, _) => format!("{bytes}B"),
        (_, s) if s >= 10.0 => format!("{s:.1}{}", BYTE_UNITS[unit]),
        (_, s) => format!("{s:.2}{}", BYTE_UNITS[unit]),
    }
}

/// Compact duration for log lines: `250µs`, `42ms`, `1.50s`, `1m30s`, `2h5m`
pub fn format_duration_precise(duration: Duration) -> String {
    if duration < Duration::from_millis(1) {
        return format!("{}µs", duration.as_micros());
    }
    if duration < Duration::from_secs(1) {
        return format!("{}ms", duration.as_millis());
    }

    let seconds = duration.as_secs_f64();
    if seconds < 10.0 {
        return format!("{seconds:.2}s");
    }
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }

    let whole = duration.as_secs();
    let (hours, minutes, secs) = (whole / 3600, (whole % 3600) / 60, whole % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.50KB");
        assert_eq!(format_bytes(10_485_760), "10.0MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00GB");
    }

    #[test]
    fn test_format_duration_precise() {
        assert_eq!(format_duration_precise(Duration::from_micros(250)), "250µs");
        assert_eq!(format_duration_precise(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration_precise(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration_precise(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration_precise(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration_precise(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration_precise(Duration::from_secs(7500)), "2h5m");
    }
}
