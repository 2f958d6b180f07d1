//! Byte count formatting

/// Format a byte count with binary prefixes, e.g. `4.0MiB`
pub fn format_bytes(num: usize) -> String {
    let mut value = num as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if value.abs() < 1024.0 {
            return format!("{:3.1}{}B", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}YiB", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.0B");
        assert_eq!(format_bytes(1023), "1023.0B");
        assert_eq!(format_bytes(1024), "1.0KiB");
        assert_eq!(format_bytes(4 * 1024 * 1024), "4.0MiB");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5GiB");
    }
}
