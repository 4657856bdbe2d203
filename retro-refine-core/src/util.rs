/// Format a byte count with fractional KB/MB/GB (e.g., "1.5 KB", "2.3 GB").
pub fn format_bytes_approx(bytes: u64) -> String {
    const GIB: u64 = 1024 * 1024 * 1024;
    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Replace characters that are not allowed in file names on common
/// filesystems (`<>:"/\|?*` and control characters) with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_approx() {
        assert_eq!(format_bytes_approx(0), "0 B");
        assert_eq!(format_bytes_approx(512), "512 B");
        assert_eq!(format_bytes_approx(1536), "1.5 KB");
        assert_eq!(format_bytes_approx(1048576), "1.0 MB");
        assert_eq!(format_bytes_approx(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Game (USA).zip"), "Game (USA).zip");
        assert_eq!(sanitize_filename("What?: Part 1/2.zip"), "What__ Part 1_2.zip");
        assert_eq!(sanitize_filename("a\tb"), "a_b");
        assert_eq!(sanitize_filename(".."), "_");
    }
}
