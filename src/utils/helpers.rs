/// Helper utilities shared by the engine and the CLI

use anyhow::{Context, Result};
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Format duration to human-readable string
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Mask sensitive data (show only first and last N characters)
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        "*".repeat(chars.len())
    } else {
        let start: String = chars[..visible_chars].iter().collect();
        let end: String = chars[chars.len() - visible_chars..].iter().collect();
        format!("{}...{}", start, end)
    }
}

/// Total size in bytes of all regular files below `path`.
///
/// Unreadable entries are skipped; a missing path counts as zero.
pub fn dir_size<P: AsRef<Path>>(path: P) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Validate a single cron field: `*` or a number within `min..=max`
pub fn is_valid_cron_field(value: &str, min: u32, max: u32) -> bool {
    if value == "*" {
        return true;
    }
    value
        .parse::<u32>()
        .map(|n| n >= min && n <= max)
        .unwrap_or(false)
}

/// Check if a directory exists and is writable
pub fn is_dir_writable<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(metadata) = std::fs::metadata(&path) {
        metadata.is_dir() && !metadata.permissions().readonly()
    } else {
        false
    }
}

/// Ask the operator a yes/no question on the terminal.
///
/// Returns false when stdin is not interactive.
pub fn confirm(prompt: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
        assert_eq!(format_duration(86400), "1d 0h");
    }

    #[test]
    fn test_mask_sensitive() {
        assert_eq!(mask_sensitive("5e7f294e4c92a9aa661fae8d347d832d", 4), "5e7f...832d");
        assert_eq!(mask_sensitive("short", 4), "*****");
    }

    #[test]
    fn test_dir_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b"), vec![0u8; 23]).unwrap();

        assert_eq!(dir_size(dir.path()), 123);
        assert_eq!(dir_size(dir.path().join("missing")), 0);
    }

    #[test]
    fn test_cron_fields() {
        assert!(is_valid_cron_field("*", 0, 59));
        assert!(is_valid_cron_field("0", 0, 59));
        assert!(is_valid_cron_field("23", 0, 23));
        assert!(!is_valid_cron_field("24", 0, 23));
        assert!(!is_valid_cron_field("0", 1, 31));
        assert!(!is_valid_cron_field("*/5", 0, 59));
        assert!(!is_valid_cron_field("", 0, 59));
    }
}
