//! Image optimization (CLI task `img`).
//!
//! Every `gif`, `jpg`, `jpeg`, `png` and `svg` under `assets/img/` is
//! optimized and written to the same relative path under the output tree.
//! Results are cached by content (see [`crate::cache`]); a cache hit copies
//! the stored blob and never calls the optimizer.
//!
//! The module is split into:
//! - **Backend**: [`ImageOptimizer`] trait, [`OptimizeParams`]
//! - **RustOptimizer**: oxipng, jpeg-encoder and gif based implementation
//! - **Task**: [`optimize_images`], parallel over files with rayon

pub mod backend;
pub mod rust_backend;

pub use backend::{ImageFormat, ImageOptimizer, OptimizeError, OptimizeParams};
pub use rust_backend::RustOptimizer;

use crate::cache::{self, CacheEntry, CacheManifest, CacheStats};
use crate::context::BuildContext;
use crate::files;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "png", "svg", "jpeg"];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Optimizing {path} failed: {source}")]
    Optimize {
        path: String,
        source: OptimizeError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Cached,
    Optimized { original: u64, optimized: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Path relative to `assets/img/`.
    pub relative: PathBuf,
    pub status: ImageStatus,
    /// Size of the file written to the output tree.
    pub bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ImageReport {
    pub images: Vec<ProcessedImage>,
    pub cache: CacheStats,
}

/// Optimize all images into the output tree, consulting and updating
/// `manifest`. The manifest is saved to the cache directory on success.
pub fn optimize_images(
    ctx: &BuildContext,
    optimizer: &dyn ImageOptimizer,
    manifest: &mut CacheManifest,
) -> Result<ImageReport, ImageError> {
    let layout = &ctx.layout;
    let src_dir = layout.images_dir();
    let out_dir = layout.images_out();
    let cache_dir = layout.cache_dir();
    let params = OptimizeParams::from(&ctx.config.images);
    let params_hash = cache::hash_params(&params);

    let sources = files::walk_files(&src_dir, |p| files::has_extension(p, IMAGE_EXTENSIONS))?;
    fs::create_dir_all(&out_dir)?;
    fs::create_dir_all(cache_dir)?;

    let job = Job {
        ctx,
        src_dir: &src_dir,
        out_dir: &out_dir,
        cache_dir,
        optimizer,
        params: &params,
        params_hash: &params_hash,
    };
    let shared: &CacheManifest = manifest;
    let results = sources
        .par_iter()
        .map(|source| job.process(source, shared))
        .collect::<Result<Vec<_>, ImageError>>()?;

    let mut report = ImageReport::default();
    for (image, new_entry) in results {
        match image.status {
            ImageStatus::Cached => report.cache.hit(),
            ImageStatus::Optimized { .. } => report.cache.miss(),
        }
        if let Some((key, entry)) = new_entry {
            manifest.insert(key, entry);
        }
        report.images.push(image);
    }
    manifest.save(cache_dir)?;
    Ok(report)
}

/// Inputs shared by every file of one run.
struct Job<'a> {
    ctx: &'a BuildContext,
    src_dir: &'a Path,
    out_dir: &'a Path,
    cache_dir: &'a Path,
    optimizer: &'a dyn ImageOptimizer,
    params: &'a OptimizeParams,
    params_hash: &'a str,
}

impl Job<'_> {
    fn process(
        &self,
        source: &Path,
        manifest: &CacheManifest,
    ) -> Result<(ProcessedImage, Option<(String, CacheEntry)>), ImageError> {
        let relative = source
            .strip_prefix(self.src_dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .to_path_buf();
        let target = self.out_dir.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = fs::read(source)?;
        let source_hash = cache::hash_bytes(&data);
        let key = cache::content_key(&source_hash, self.params_hash);

        if let Some((blob, _)) = manifest.find_cached(&key, self.cache_dir) {
            let bytes = fs::copy(&blob, &target)?;
            return Ok((
                ProcessedImage {
                    relative,
                    status: ImageStatus::Cached,
                    bytes,
                },
                None,
            ));
        }

        let display = self.ctx.layout.display(source);
        let format = ImageFormat::from_path(source).ok_or_else(|| {
            std::io::Error::other(format!("unrecognized image extension: {display}"))
        })?;
        let optimized = self
            .optimizer
            .optimize(&data, format, self.params)
            .map_err(|source| ImageError::Optimize {
                path: display.clone(),
                source,
            })?;
        let kept = if optimized.len() < data.len() {
            optimized
        } else {
            data
        };

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let blob = cache::blob_name(&source_hash, self.params_hash, extension);
        fs::write(self.cache_dir.join(&blob), &kept)?;
        fs::write(&target, &kept)?;

        let original = fs::metadata(source)?.len();
        let optimized = kept.len() as u64;
        let entry = CacheEntry {
            blob,
            source: display,
            original_bytes: original,
            optimized_bytes: optimized,
        };
        Ok((
            ProcessedImage {
                relative,
                status: ImageStatus::Optimized {
                    original,
                    optimized,
                },
                bytes: optimized,
            },
            Some((key, entry)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::backend::tests::MockOptimizer;
    use super::*;
    use crate::mode::Mode;
    use crate::test_helpers::{project_context, write_file};
    use tempfile::TempDir;

    fn project() -> (TempDir, BuildContext) {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/assets/img/logo.png", "PNGDATA!");
        write_file(tmp.path(), "src/assets/img/icons/arrow.svg", "<svg></svg>");
        write_file(tmp.path(), "src/assets/img/notes.txt", "ignored");
        let ctx = project_context(tmp.path(), Mode::Production);
        (tmp, ctx)
    }

    #[test]
    fn optimizes_and_mirrors_subpaths() {
        let (tmp, ctx) = project();
        let optimizer = MockOptimizer::new();
        let mut manifest = CacheManifest::empty();

        let report = optimize_images(&ctx, &optimizer, &mut manifest).unwrap();

        assert_eq!(report.images.len(), 2);
        assert_eq!(optimizer.call_count(), 2);
        assert_eq!(report.cache, CacheStats { hits: 0, misses: 2 });
        let out = tmp.path().join("build/assets/img");
        assert_eq!(fs::read(out.join("logo.png")).unwrap(), b"PNGD");
        assert_eq!(fs::read(out.join("icons/arrow.svg")).unwrap(), b"<svg>");
        assert!(!out.join("notes.txt").exists());
    }

    #[test]
    fn warm_cache_skips_optimizer() {
        let (tmp, ctx) = project();
        let mut manifest = CacheManifest::empty();
        optimize_images(&ctx, &MockOptimizer::new(), &mut manifest).unwrap();

        // Output is wiped between builds; the cache survives.
        files::clean(&tmp.path().join("build")).unwrap();
        let mut manifest = CacheManifest::load(ctx.layout.cache_dir());
        let optimizer = MockOptimizer::new();
        let report = optimize_images(&ctx, &optimizer, &mut manifest).unwrap();

        assert_eq!(optimizer.call_count(), 0);
        assert_eq!(report.cache, CacheStats { hits: 2, misses: 0 });
        assert!(report.images.iter().all(|i| i.status == ImageStatus::Cached));
        let logo = tmp.path().join("build/assets/img/logo.png");
        assert_eq!(fs::read(logo).unwrap(), b"PNGD");
    }

    #[test]
    fn changed_source_is_reoptimized() {
        let (tmp, ctx) = project();
        let mut manifest = CacheManifest::empty();
        optimize_images(&ctx, &MockOptimizer::new(), &mut manifest).unwrap();

        write_file(tmp.path(), "src/assets/img/logo.png", "NEWPIXELS!");
        let optimizer = MockOptimizer::new();
        let report = optimize_images(&ctx, &optimizer, &mut manifest).unwrap();

        assert_eq!(optimizer.call_count(), 1);
        assert_eq!(report.cache, CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn changed_params_miss_the_cache() {
        let (_tmp, ctx) = project();
        let mut manifest = CacheManifest::empty();
        optimize_images(&ctx, &MockOptimizer::new(), &mut manifest).unwrap();

        let mut ctx = ctx;
        ctx.config.images.jpeg_quality = 50;
        let optimizer = MockOptimizer::new();
        optimize_images(&ctx, &optimizer, &mut manifest).unwrap();
        assert_eq!(optimizer.call_count(), 2);
    }

    #[test]
    fn larger_result_keeps_original() {
        struct Inflating;
        impl ImageOptimizer for Inflating {
            fn optimize(
                &self,
                data: &[u8],
                _format: ImageFormat,
                _params: &OptimizeParams,
            ) -> Result<Vec<u8>, OptimizeError> {
                Ok([data, data].concat())
            }
        }

        let (tmp, ctx) = project();
        let report = optimize_images(&ctx, &Inflating, &mut CacheManifest::empty()).unwrap();

        let logo = report
            .images
            .iter()
            .find(|i| i.relative == Path::new("logo.png"))
            .unwrap();
        assert_eq!(
            logo.status,
            ImageStatus::Optimized {
                original: 8,
                optimized: 8
            }
        );
        assert_eq!(
            fs::read(tmp.path().join("build/assets/img/logo.png")).unwrap(),
            b"PNGDATA!"
        );
    }

    #[test]
    fn optimizer_failure_is_fatal() {
        let (_tmp, ctx) = project();
        let optimizer = MockOptimizer::failing_on(ImageFormat::Png);
        let err = optimize_images(&ctx, &optimizer, &mut CacheManifest::empty()).unwrap_err();
        match err {
            ImageError::Optimize { path, .. } => assert_eq!(path, "src/assets/img/logo.png"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn manifest_is_saved() {
        let (_tmp, ctx) = project();
        optimize_images(&ctx, &MockOptimizer::new(), &mut CacheManifest::empty()).unwrap();
        let saved = CacheManifest::load(ctx.layout.cache_dir());
        assert_eq!(saved.entries.len(), 2);
    }
}
