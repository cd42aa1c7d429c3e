//! Optimized-image cache for incremental builds.
//!
//! Re-encoding every image on every build is the slowest part of the
//! pipeline, and `clean` wipes the output tree before each build. This
//! module keeps optimized results in a separate cache directory so the image
//! task can restore them instead of re-running the optimizer.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: an entry is keyed by
//! `"{source_hash}:{params_hash}"`, not by file path. Renaming or moving an
//! image does not invalidate it; changing its bytes or the optimization
//! settings does.
//!
//! - **`source_hash`**: SHA-256 of the source file contents. Content-based
//!   rather than mtime-based so it survives `git checkout`.
//! - **`params_hash`**: SHA-256 of [`OptimizeParams`].
//!
//! A hit requires an entry for the key **and** its blob still on disk.
//!
//! ## Storage
//!
//! ```text
//! .assetpipe-cache/
//! ├── .cache-manifest.json
//! └── <source_hash>-<params_hash>.<ext>    # optimized bytes
//! ```
//!
//! ## Bypassing the cache
//!
//! `--no-cache` loads an empty manifest, so every image is optimized again
//! and the blobs are rewritten. `clear-cache` deletes the directory.

use crate::images::OptimizeParams;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the cache directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A stored optimization result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Blob file name inside the cache directory.
    pub blob: String,
    /// Source path (project-relative) the blob was last produced for.
    pub source: String,
    pub original_bytes: u64,
    pub optimized_bytes: u64,
}

/// On-disk cache manifest mapping content keys to stored blobs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or a first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the cache directory. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(cache_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(cache_dir), json)
    }

    /// Look up the blob for a content key.
    ///
    /// Returns the blob path only if the entry exists **and** the blob is
    /// still on disk.
    pub fn find_cached(&self, key: &str, cache_dir: &Path) -> Option<(PathBuf, &CacheEntry)> {
        let entry = self.entries.get(key)?;
        let blob = cache_dir.join(&entry.blob);
        blob.is_file().then_some((blob, entry))
    }

    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }
}

/// Content key for a source/params pair.
pub fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

/// Blob file name for a source/params pair, keeping the source extension.
pub fn blob_name(source_hash: &str, params_hash: &str, extension: &str) -> String {
    format!("{source_hash}-{params_hash}.{}", extension.to_ascii_lowercase())
}

/// SHA-256 of a byte slice, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of the optimization parameters. Any change re-optimizes.
pub fn hash_params(params: &OptimizeParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"optimize\0");
    hasher.update([params.level]);
    hasher.update([params.progressive as u8, params.interlaced as u8]);
    hasher.update([params.jpeg_quality]);
    format!("{:x}", hasher.finalize())
}

/// Remove the cache directory. Returns whether anything was removed.
pub fn clear(cache_dir: &Path) -> io::Result<bool> {
    crate::files::clean(cache_dir)
}

/// Summary of cache performance for a task run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} optimized ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} optimized", self.misses)
        }
    }
}

/// Resolve the cache manifest path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(blob: &str) -> CacheEntry {
        CacheEntry {
            blob: blob.into(),
            source: "src/assets/img/a.png".into(),
            original_bytes: 100,
            optimized_bytes: 60,
        }
    }

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = CacheManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.entries.is_empty());
    }

    #[test]
    fn find_cached_hit() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("s:p".into(), entry("s-p.png"));
        fs::write(tmp.path().join("s-p.png"), "data").unwrap();

        let (blob, found) = m.find_cached("s:p", tmp.path()).unwrap();
        assert_eq!(blob, tmp.path().join("s-p.png"));
        assert_eq!(found.optimized_bytes, 60);
    }

    #[test]
    fn find_cached_miss_blob_deleted() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("s:p".into(), entry("s-p.png"));
        assert!(m.find_cached("s:p", tmp.path()).is_none());
    }

    #[test]
    fn find_cached_miss_no_entry() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::empty().find_cached("s:p", tmp.path()).is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        let mut m = CacheManifest::empty();
        m.insert("a:b".into(), entry("a-b.png"));
        m.save(&dir).unwrap();

        let loaded = CacheManifest::load(&dir);
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries["a:b"], entry("a-b.png"));
    }

    #[test]
    fn load_missing_or_corrupt_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());

        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a:b": {{"blob":"x","source":"y","original_bytes":1,"optimized_bytes":1}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(manifest_path(tmp.path()), json).unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn hash_bytes_changes_with_content() {
        let h1 = hash_bytes(b"version 1");
        let h2 = hash_bytes(b"version 2");
        assert_ne!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn hash_params_varies_with_each_field() {
        let base = OptimizeParams::default();
        let h = hash_params(&base);
        assert_eq!(h, hash_params(&base));
        assert_ne!(h, hash_params(&OptimizeParams { level: 5, ..base }));
        assert_ne!(h, hash_params(&OptimizeParams { progressive: false, ..base }));
        assert_ne!(h, hash_params(&OptimizeParams { interlaced: false, ..base }));
        assert_ne!(h, hash_params(&OptimizeParams { jpeg_quality: 60, ..base }));
    }

    #[test]
    fn blob_name_lowercases_extension() {
        assert_eq!(blob_name("s", "p", "PNG"), "s-p.png");
    }

    #[test]
    fn clear_removes_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        CacheManifest::empty().save(&dir).unwrap();
        assert!(clear(&dir).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn cache_stats_display() {
        let mut s = CacheStats::default();
        s.misses = 3;
        assert_eq!(s.to_string(), "3 optimized");
        s.hits = 5;
        assert_eq!(s.to_string(), "5 cached, 3 optimized (8 total)");
    }
}
