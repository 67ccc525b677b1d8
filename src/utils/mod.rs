//! Utility functions and helpers

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Entry names become file names under the template directory: `/`-separated
/// segments that never start with a dot.
static ENTRY_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*(/[A-Za-z0-9_-][A-Za-z0-9_.-]*)*$").unwrap()
});

/// Check that an entry name is usable as a relative file name
pub fn is_filesystem_safe(name: &str) -> bool {
    ENTRY_NAME_REGEX.is_match(name)
}

/// Check if a path is within a directory
pub fn is_subpath(path: &Path, base: &Path) -> bool {
    path.canonicalize()
        .ok()
        .and_then(|p| {
            base.canonicalize()
                .ok()
                .map(|b| p.starts_with(&b))
        })
        .unwrap_or(false)
}

/// Get relative path from base to target, for display
pub fn relative_path(from: &Path, to: &Path) -> String {
    pathdiff::diff_paths(to, from)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| to.display().to_string())
}

/// Render a path with `/` separators, as the engine expects module paths
pub fn slash_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_safe_entry_names() {
        assert!(is_filesystem_safe("main"));
        assert!(is_filesystem_safe("pages/home"));
        assert!(is_filesystem_safe("vendor.v2"));
        assert!(!is_filesystem_safe(""));
        assert!(!is_filesystem_safe("../escape"));
        assert!(!is_filesystem_safe("pages/../x"));
        assert!(!is_filesystem_safe("/abs"));
        assert!(!is_filesystem_safe("a b"));
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(slash_path(Path::new("a\\b/c")), "a/b/c");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/work"), Path::new("/work/dist/main.js")),
            "dist/main.js"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
