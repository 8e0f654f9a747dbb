//! hosts-file loading into a `NameTable`

use crate::error::TableError;
use crate::table::NameTable;
use anyhow::Result;
use sha2::{Digest, Sha512};
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: usize,
    pub invalid_name: usize,
    pub invalid_addr: usize,
    pub duplicates: usize,
}

/// Reads `<ip> <name>` lines. Lines starting with a space or `#`, and empty
/// lines, are skipped. Only the first name on a line is loaded.
pub fn parse(content: &str, table: &mut NameTable) -> LoadReport {
    let mut report = LoadReport::default();

    for (lineno, line) in content.lines().enumerate() {
        if line.is_empty() || line.starts_with(' ') || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(ip), Some(name)) = (fields.next(), fields.next()) else {
            tracing::debug!("hosts line {}: expected '<ip> <name>', skipping", lineno + 1);
            report.invalid_name += 1;
            continue;
        };

        let addr = match ip.parse::<Ipv4Addr>() {
            Ok(addr) => addr,
            Err(_) => {
                tracing::debug!("hosts line {}: '{}' is not an IPv4 address, skipping", lineno + 1, ip);
                report.invalid_addr += 1;
                continue;
            }
        };

        match table.insert(name, addr) {
            Ok(()) => report.accepted += 1,
            Err(TableError::InvalidName(n)) => {
                tracing::warn!("hosts line {}: invalid name {:?}, skipping", lineno + 1, n);
                report.invalid_name += 1;
            }
            Err(TableError::Duplicate(n)) => {
                tracing::warn!("hosts line {}: {} already mapped, keeping the first entry", lineno + 1, n);
                report.duplicates += 1;
            }
        }
    }

    report
}

/// A table together with the SHA-512 of the exact bytes it was built from.
pub struct Snapshot {
    pub table: NameTable,
    pub report: LoadReport,
    pub digest: String,
}

pub fn digest(content: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read hosts file '{}': {}", path.display(), e))
}

pub fn load(path: impl AsRef<Path>) -> Result<Snapshot> {
    let path = path.as_ref();
    let content = read(path)?;
    Ok(build(&content, path))
}

/// Builds a table from content already read from `source`.
pub fn build(content: &str, source: &Path) -> Snapshot {
    let mut table = NameTable::new();
    let report = parse(content, &mut table);
    tracing::info!(
        "Loaded {} names from {} ({} invalid names, {} invalid addresses, {} duplicates, longest chain {})",
        report.accepted,
        source.display(),
        report.invalid_name,
        report.invalid_addr,
        report.duplicates,
        table.longest_chain()
    );
    Snapshot { table, report, digest: digest(content) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
# static hosts
127.0.0.1\tlocalhost
::1 localhost ip6-localhost
 10.0.0.9 indented.lan

192.168.1.10 nas.lan nas
192.168.1.11 nas.lan
192.168.1.12 bad_name.lan
999.1.1.1 broken.lan
192.168.1.13
";

    #[test]
    fn parse_applies_hosts_rules() {
        let mut table = NameTable::new();
        let report = parse(SAMPLE, &mut table);

        assert_eq!(
            report,
            LoadReport { accepted: 2, invalid_name: 2, invalid_addr: 2, duplicates: 1 }
        );
        assert_eq!(table.lookup("localhost"), Some(Ipv4Addr::LOCALHOST));
        assert_eq!(table.lookup("nas.lan"), Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(table.lookup("nas"), None);
        assert_eq!(table.lookup("indented.lan"), None);
        assert_eq!(table.lookup("broken.lan"), None);
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"10.1.2.3 build.lan\n").unwrap();
        file.flush().unwrap();

        let snap = load(file.path()).unwrap();
        assert_eq!(snap.report.accepted, 1);
        assert_eq!(snap.table.lookup("build.lan"), Some(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(snap.digest, digest("10.1.2.3 build.lan\n"));
        assert_eq!(snap.digest.len(), 128);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(load("/nonexistent/hosts").is_err());
    }
}
