/*
 * SHA-256 digests of produced archives and dumps. The digest is logged after
 * each archiving step so operators can compare package side-cars between hosts.
 */
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub bytes: u64,
}

pub fn digest_file(file_path: &Path) -> io::Result<FileDigest> {
    if !file_path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{file_path:?} is not a file"),
        ));
    }

    let mut reader = BufReader::new(File::open(file_path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut bytes = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        bytes += n as u64;
    }

    Ok(FileDigest {
        sha256: format!("{:x}", hasher.finalize()),
        bytes,
    })
}

/// Logs the digest of a freshly written side-car file; failures only warn.
pub fn log_digest(label: &str, file_path: &Path) {
    match digest_file(file_path) {
        Ok(digest) => log::info!(
            "{label}: {} ({} bytes, sha256 {})",
            file_path.display(),
            digest.bytes,
            digest.sha256
        ),
        Err(e) => log::warn!("{label}: Could not digest {file_path:?}: {e}"),
    }
}
