use jwalk::WalkDir;
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{PrepError, Result};
use crate::types::IMG_FORMATS;

/// In-memory map from image basename (e.g. `a01-000u-00-00.png`) to its path.
///
/// Built from a single walk of the image root and never persisted.
#[derive(Debug, Default, Clone)]
pub struct ImageIndex {
    entries: HashMap<String, PathBuf>,
    shadowed: usize,
}

impl ImageIndex {
    pub fn get(&self, basename: &str) -> Option<&Path> {
        self.entries.get(basename).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of files dropped because another file had the same basename.
    pub fn shadowed(&self) -> usize {
        self.shadowed
    }

    /// Insert `path` under `basename`, resolving collisions deterministically.
    pub fn insert(&mut self, basename: String, path: PathBuf) {
        match self.entries.get_mut(&basename) {
            Some(current) => {
                self.shadowed += 1;
                if tie_break(&path, current) == Ordering::Less {
                    debug!(
                        "Duplicate basename {}: {} replaces {}",
                        basename,
                        path.display(),
                        current.display()
                    );
                    *current = path;
                } else {
                    debug!(
                        "Duplicate basename {}: keeping {}, ignoring {}",
                        basename,
                        current.display(),
                        path.display()
                    );
                }
            }
            None => {
                self.entries.insert(basename, path);
            }
        }
    }
}

// Shallower paths win; equal depth falls back to byte-wise path order
fn tie_break(candidate: &Path, current: &Path) -> Ordering {
    candidate
        .components()
        .count()
        .cmp(&current.components().count())
        .then_with(|| candidate.cmp(current))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMG_FORMATS.contains(&ext))
}

/// Recursively index every image file below `image_root` by basename.
pub fn build_index(image_root: &Path) -> Result<ImageIndex> {
    if !image_root.is_dir() {
        return Err(PrepError::Configuration {
            path: image_root.to_path_buf(),
            reason: "image root does not exist or is not a directory".to_string(),
        });
    }

    let mut index = ImageIndex::default();
    for entry in WalkDir::new(image_root).skip_hidden(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", image_root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_image_extension(&path) {
            continue;
        }
        let Some(basename) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 file name: {}", path.display());
            continue;
        };
        index.insert(basename, path);
    }

    info!(
        "Indexed {} images under {}",
        index.len(),
        image_root.display()
    );
    if index.shadowed() > 0 {
        warn!(
            "{} files share a basename with another image and were shadowed",
            index.shadowed()
        );
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_build_index_finds_nested_images() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub/dir/a01-000u-00-00.png");
        touch(&nested);
        touch(&dir.path().join("a01-000u-00-01.png"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("upper.PNG"));

        let index = build_index(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a01-000u-00-00.png"), Some(nested.as_path()));
        assert!(index.get("notes.txt").is_none());
        assert!(index.get("upper.PNG").is_none());
    }

    #[test]
    fn test_duplicate_basenames_prefer_shallow_then_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("z/deeper/a01-000u-00-00.png");
        let shallow_b = dir.path().join("b/a01-000u-00-00.png");
        let shallow_a = dir.path().join("a/a01-000u-00-00.png");
        touch(&deep);
        touch(&shallow_b);
        touch(&shallow_a);

        let index = build_index(dir.path()).unwrap();
        assert_eq!(index.get("a01-000u-00-00.png"), Some(shallow_a.as_path()));
        assert_eq!(index.shadowed(), 2);
    }

    #[test]
    fn test_insert_order_does_not_matter() {
        let a = PathBuf::from("img/a/x.png");
        let b = PathBuf::from("img/b/x.png");

        let mut forward = ImageIndex::default();
        forward.insert("x.png".to_string(), a.clone());
        forward.insert("x.png".to_string(), b.clone());

        let mut backward = ImageIndex::default();
        backward.insert("x.png".to_string(), b);
        backward.insert("x.png".to_string(), a.clone());

        assert_eq!(forward.get("x.png"), Some(a.as_path()));
        assert_eq!(backward.get("x.png"), Some(a.as_path()));
    }

    #[test]
    fn test_build_index_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_index(&dir.path().join("img")).unwrap_err();
        assert!(matches!(err, PrepError::Configuration { .. }));
    }
}
