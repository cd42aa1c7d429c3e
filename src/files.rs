//! File-set helpers shared by the content tasks, plus `clean` and the
//! verbatim tree copy used by the font task.
//!
//! All collectors return paths sorted so that task output (and the report
//! printed for it) is deterministic across runs. A missing source directory
//! is an error, not an empty set.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}

/// Regular files directly inside `dir` with one of `extensions`.
pub fn top_level_files(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Regular files anywhere under `dir` accepted by `filter`.
pub fn walk_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && filter(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Remove the output tree. Returns whether anything was removed.
pub fn clean(dir: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Path of `to` as seen from the directory `from`, with `/` separators.
///
/// Both paths must be rooted the same way (both absolute or both joined
/// onto the same project root); `.` components are ignored.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let parts = |p: &Path| -> Vec<String> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    };
    let from = parts(from);
    let to = parts(to);
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut segments = vec![".."; from.len() - common];
    segments.extend(to[common..].iter().map(String::as_str));
    segments.join("/")
}

/// A file copied by [`copy_tree`], relative to the source/destination roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    pub relative: PathBuf,
    pub bytes: u64,
}

/// Copy every file under `src` that has an extension into `dst`, preserving
/// relative paths.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<Vec<CopiedFile>> {
    let files = walk_files(src, |p| p.extension().is_some())?;
    let mut copied = Vec::with_capacity(files.len());
    for path in files {
        let relative = path
            .strip_prefix(src)
            .map_err(|e| io::Error::other(e.to_string()))?
            .to_path_buf();
        let target = dst.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::copy(&path, &target)?;
        copied.push(CopiedFile { relative, bytes });
    }
    Ok(copied)
}
