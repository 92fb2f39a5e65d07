//! Snapshot materialization: primary file plus compressed siblings.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::CrawlError;
use crate::core::Route;
use crate::debug;
use crate::utils::atomic_write;

/// Which compressed siblings to produce next to each snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Variants {
    pub gzip: bool,
    pub brotli: bool,
}

/// Brotli parameters: buffer size, quality, window (lgwin).
const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

/// Write `body` as the snapshot of `route` at `root/relative`.
///
/// The snapshot and each enabled variant replace any previous file in full.
/// Variants that are disabled but still on disk from an earlier build are
/// removed, since they would no longer match the snapshot.
pub(super) fn write_snapshot(
    root: &Path,
    relative: &Path,
    route: &Route,
    body: &[u8],
    variants: Variants,
) -> Result<PathBuf, CrawlError> {
    check_on_disk(root, relative, route)?;

    let path = root.join(relative);
    atomic_write(&path, body).map_err(|err| CrawlError::Io(path.clone(), err))?;

    write_variant(&path, "gz", variants.gzip, || gzip_bytes(body))?;
    write_variant(&path, "br", variants.brotli, || brotli_bytes(body))?;

    Ok(path)
}

fn write_variant(
    path: &Path,
    extension: &str,
    enabled: bool,
    compress: impl FnOnce() -> io::Result<Vec<u8>>,
) -> Result<(), CrawlError> {
    let variant = sibling(path, extension);

    if !enabled {
        if variant.is_file() {
            debug!("crawl"; "removing stale {}", variant.display());
            fs::remove_file(&variant).map_err(|err| CrawlError::Io(variant, err))?;
        }
        return Ok(());
    }

    let bytes = compress().map_err(|err| CrawlError::Io(variant.clone(), err))?;
    atomic_write(&variant, &bytes).map_err(|err| CrawlError::Io(variant, err))
}

/// `index.html` -> `index.html.gz`
fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Refuse to write through existing entries of the wrong kind.
///
/// Every ancestor below `root` must be a directory (or absent), and the
/// snapshot path itself must not be a directory.
fn check_on_disk(root: &Path, relative: &Path, route: &Route) -> Result<(), CrawlError> {
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();

    while let Some(component) = components.next() {
        current.push(component);
        let is_last = components.peek().is_none();

        let Ok(meta) = fs::metadata(&current) else {
            // Nothing below an absent entry can exist either
            return Ok(());
        };
        let blocked = if is_last { meta.is_dir() } else { !meta.is_dir() };
        if blocked {
            return Err(CrawlError::OnDisk {
                route: route.clone(),
                path: current,
            });
        }
    }
    Ok(())
}

/// Gzip at maximum compression. The header carries no mtime, so output is
/// stable for identical input.
fn gzip_bytes(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn brotli_bytes(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() / 2);
    {
        let mut writer =
            brotli::CompressorWriter::new(&mut out, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    Ok(out)
}
