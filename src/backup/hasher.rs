// r2backup/src/backup/hasher.rs
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::Result;

const CHUNK_SIZE: usize = 8192;

/// Hex fingerprint of a byte slice. Pure and deterministic; the only
/// requirement is that a single-bit change yields a different fingerprint.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Streaming fingerprint of a file, chunked so multi-gigabyte dumps never
/// land in memory at once.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
