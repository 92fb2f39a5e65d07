//! Route to output path mapping with structural conflict detection.
//!
//! Every visited route reserves its snapshot path before it is fetched.
//! Reservations keep the mapping injective and make sure no route needs a
//! directory where another route put its snapshot file:
//!
//! ```text
//! /            -> index.html
//! /a%41        -> aA/index.html      (collides with /aA)
//! /index.html/x -> index.html/x/index.html (directory through / 's file)
//! /About       -> About/index.html  (collides with /about)
//! ```
//!
//! Paths are compared case-folded so that a snapshot tree written on a
//! case-sensitive filesystem stays valid when copied to a case-insensitive
//! one.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::CrawlError;
use crate::core::Route;

/// Reserved snapshot files and the directories they require.
///
/// Both maps are keyed by the case-folded relative path.
#[derive(Debug, Default)]
pub(super) struct OutputMap {
    /// Snapshot file -> owning route
    files: FxHashMap<String, Route>,
    /// Required directory -> first route that needed it
    dirs: FxHashMap<String, Route>,
}

impl OutputMap {
    /// Reserve the snapshot path for `route`, returning it relative to the
    /// output root.
    pub fn reserve(&mut self, route: &Route) -> Result<PathBuf, CrawlError> {
        let relative = route
            .output_relative()
            .ok_or_else(|| CrawlError::Unmappable(route.clone()))?;

        let key = fold_case(&relative);
        if let Some(owner) = self.files.get(&key) {
            return Err(CrawlError::PathCollision {
                route: route.clone(),
                other: owner.clone(),
                path: relative,
            });
        }
        if let Some(owner) = self.dirs.get(&key) {
            return Err(CrawlError::DirectoryConflict {
                route: owner.clone(),
                other: route.clone(),
                path: relative,
            });
        }

        let dirs = ancestors(&relative);
        for dir in &dirs {
            if let Some(owner) = self.files.get(&fold_case(dir)) {
                return Err(CrawlError::DirectoryConflict {
                    route: route.clone(),
                    other: owner.clone(),
                    path: dir.clone(),
                });
            }
        }

        for dir in &dirs {
            self.dirs
                .entry(fold_case(dir))
                .or_insert_with(|| route.clone());
        }
        self.files.insert(key, route.clone());
        Ok(relative)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

fn fold_case(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Proper ancestors of a relative path, outermost first (`a`, `a/b` for `a/b/c`).
fn ancestors(relative: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = relative
        .ancestors()
        .skip(1)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    dirs.reverse();
    dirs
}
