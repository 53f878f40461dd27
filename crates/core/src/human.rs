pub fn human_bytes(b: impl Into<u128>) -> String {
    let mut n: f64 = b.into() as f64;
    let units = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut u = 0;
    while n >= 1024.0 && u < units.len() - 1 {
        n /= 1024.0;
        u += 1;
    }
    format!("{:.2} {}", n, units[u])
}

/// Fixed MiB rendering used by the plan reports.
pub fn mib(bytes: u64) -> String {
    format!("{:.2} MiB", bytes as f64 / 1024.0 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(human_bytes(512u64), "512.00 B");
        assert_eq!(human_bytes(2048u64), "2.00 KB");
        assert_eq!(mib(1024 * 1024), "1.00 MiB");
        assert_eq!(mib(1536 * 1024), "1.50 MiB");
    }
}
