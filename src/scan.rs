use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions treated as template image assets.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "avif",
];

/// Files larger than this are assumed real and never hashed.
const HASH_SIZE_LIMIT: u64 = 4 * 1024 * 1024;

/// A digest shared by this many image files marks a copied stub.
const PLACEHOLDER_MIN_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("local directory '{}' does not exist", .0.display())]
    RootMissing(PathBuf),
    #[error("'{}' is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Zero-length file.
    Empty,
    /// Non-empty, but its digest is shared with enough siblings to be a stub.
    Placeholder,
    Populated,
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the template root, used to derive the remote URL.
    pub relative: PathBuf,
    pub len: u64,
    pub state: FileState,
}

impl ScannedFile {
    pub fn needs_fetch(&self) -> bool {
        !matches!(self.state, FileState::Populated)
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    /// Non-image files encountered and left alone.
    pub skipped: usize,
}

/// Walk the template root and classify every image file in it.
///
/// Unreadable entries are logged and skipped; only a missing or non-directory
/// root is fatal. The returned files follow the walk order, which walkdir
/// keeps deterministic via per-directory name sorting.
pub fn scan_template_root(root: &Path) -> Result<ScanOutcome, ScanError> {
    if !root.exists() {
        return Err(ScanError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::RootNotDirectory(root.to_path_buf()));
    }

    log::info!("Scanning template root {}", root.display());

    let mut candidates: Vec<(PathBuf, PathBuf, u64, Option<String>)> = Vec::new();
    let mut digest_counts: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_image_extension(entry.path()) {
            skipped += 1;
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                log::warn!("Entry {} escapes the root, skipping", entry.path().display());
                continue;
            }
        };
        let len = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                log::warn!("Cannot stat {}: {}", entry.path().display(), err);
                continue;
            }
        };

        let digest = if len > 0 && len <= HASH_SIZE_LIMIT {
            match file_digest(entry.path()) {
                Ok(digest) => Some(digest),
                Err(err) => {
                    log::warn!("Cannot hash {}: {}", entry.path().display(), err);
                    None
                }
            }
        } else {
            None
        };
        if let Some(digest) = &digest {
            *digest_counts.entry(digest.clone()).or_insert(0) += 1;
        }

        candidates.push((entry.path().to_path_buf(), relative, len, digest));
    }

    let files = candidates
        .into_iter()
        .map(|(path, relative, len, digest)| {
            let repeated = digest
                .as_deref()
                .and_then(|digest| digest_counts.get(digest))
                .map(|count| *count >= PLACEHOLDER_MIN_COUNT)
                .unwrap_or(false);
            let state = if len == 0 {
                FileState::Empty
            } else if repeated {
                FileState::Placeholder
            } else {
                FileState::Populated
            };
            ScannedFile {
                path,
                relative,
                len,
                state,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "Scan found {} image file(s), skipped {} other file(s)",
        files.len(),
        skipped
    );

    Ok(ScanOutcome { files, skipped })
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

fn file_digest(path: &Path) -> io::Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
