//! Subresource-integrity style content hashes.

use std::fs::File;
use std::io;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256-";

/// `"sha256-" + base64(SHA-256(bytes))`
pub fn integrity(bytes: &[u8]) -> String {
    format_digest(&Sha256::digest(bytes))
}

/// Integrity of the file's current on-disk bytes, streamed.
pub fn file_integrity(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format_digest(&hasher.finalize()))
}

fn format_digest(digest: &[u8]) -> String {
    format!("{PREFIX}{}", STANDARD.encode(digest))
}
