//! Address bootstrap file.
//!
//! The server writes its RPC transport address as a single UTF-8 line so
//! that clients can discover it without a separate registry lookup.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write `addr` as the single line of the bootstrap file at `path`, with no
/// trailing newline beyond the terminator.
pub fn write_addr_file(path: &Path, addr: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create address-file directory")?;
        }
    }
    fs::write(path, format!("{addr}\n")).context(format!("failed to write address file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_single_line() {
        let dir = std::env::temp_dir().join(format!("icc-addrfile-test-{}", std::process::id()));
        let path = dir.join("icc.addr");
        write_addr_file(&path, "http://127.0.0.1:8080").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "http://127.0.0.1:8080\n");
        fs::remove_dir_all(&dir).unwrap();
    }
}
