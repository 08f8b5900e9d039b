use log::info;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::SplitPaths;
use crate::errors::{PrepError, Result};
use crate::types::Partition;

/// Load one split file: one folder id per line, blank lines ignored.
pub fn load_folder_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.is_file() {
        return Err(PrepError::missing_path(path));
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Folder id sets for all three partitions, read-only after loading.
#[derive(Debug, Clone, Default)]
pub struct SplitSets {
    pub train: HashSet<String>,
    pub validation: HashSet<String>,
    pub test: HashSet<String>,
}

impl SplitSets {
    pub fn load(paths: &SplitPaths) -> Result<Self> {
        let load = |partition: Partition| -> Result<HashSet<String>> {
            let path = paths.get(partition);
            let ids = load_folder_ids(path)?;
            info!("{} folders: {} ({})", partition, ids.len(), path.display());
            Ok(ids)
        };
        Ok(SplitSets {
            train: load(Partition::Train)?,
            validation: load(Partition::Validation)?,
            test: load(Partition::Test)?,
        })
    }

    pub fn folder_ids(&self, partition: Partition) -> &HashSet<String> {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }

    /// Partitions whose set contains `folder_id`, in train/validation/test order.
    pub fn partitions_for<'a>(
        &'a self,
        folder_id: &'a str,
    ) -> impl Iterator<Item = Partition> + 'a {
        Partition::ALL
            .into_iter()
            .filter(move |partition| self.folder_ids(*partition).contains(folder_id))
    }

    /// Fail if any folder id appears in more than one partition.
    ///
    /// The reported id is the lexicographically smallest shared one so the
    /// message is stable across runs.
    pub fn check_disjoint(&self) -> Result<()> {
        let pairs = [
            (Partition::Train, Partition::Validation),
            (Partition::Train, Partition::Test),
            (Partition::Validation, Partition::Test),
        ];
        for (first, second) in pairs {
            let shared = self
                .folder_ids(first)
                .intersection(self.folder_ids(second))
                .min();
            if let Some(folder_id) = shared {
                return Err(PrepError::OverlappingSplits {
                    first,
                    second,
                    folder_id: folder_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_load_folder_ids_trims_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.txt");
        fs::write(&path, "a01-000u\n  a01-000x \n\n\na01-000u\n").unwrap();

        let ids = load_folder_ids(&path).unwrap();
        assert_eq!(ids, set(&["a01-000u", "a01-000x"]));
    }

    #[test]
    fn test_load_folder_ids_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_folder_ids(&dir.path().join("nope.txt")).unwrap_err();
        match err {
            PrepError::Configuration { path, .. } => assert!(path.ends_with("nope.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_reads_each_partition_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SplitPaths {
            train: dir.path().join("train.txt"),
            validation: dir.path().join("validation.txt"),
            test: dir.path().join("test.txt"),
        };
        fs::write(&paths.train, "a01-000u\na01-000x\n").unwrap();
        fs::write(&paths.validation, "b01-049\n").unwrap();
        fs::write(&paths.test, "").unwrap();

        let sets = SplitSets::load(&paths).unwrap();
        assert_eq!(sets.train, set(&["a01-000u", "a01-000x"]));
        assert_eq!(sets.validation, set(&["b01-049"]));
        assert!(sets.test.is_empty());

        fs::remove_file(&paths.validation).unwrap();
        let err = SplitSets::load(&paths).unwrap_err();
        assert!(matches!(err, PrepError::Configuration { .. }));
    }

    #[test]
    fn test_partitions_for() {
        let sets = SplitSets {
            train: set(&["a01-000u", "a02-000"]),
            validation: set(&["a02-000"]),
            test: set(&["b01-001"]),
        };
        let hits: Vec<_> = sets.partitions_for("a02-000").collect();
        assert_eq!(hits, vec![Partition::Train, Partition::Validation]);
        assert_eq!(sets.partitions_for("zzz").count(), 0);
    }

    #[test]
    fn test_check_disjoint() {
        let disjoint = SplitSets {
            train: set(&["a01-000u"]),
            validation: set(&["a01-000x"]),
            test: set(&["a01-003"]),
        };
        assert!(disjoint.check_disjoint().is_ok());

        let overlapping = SplitSets {
            train: set(&["a01-000u"]),
            validation: set(&["a01-003", "a01-000x"]),
            test: set(&["a01-003", "a01-002"]),
        };
        match overlapping.check_disjoint().unwrap_err() {
            PrepError::OverlappingSplits {
                first,
                second,
                folder_id,
            } => {
                assert_eq!(first, Partition::Validation);
                assert_eq!(second, Partition::Test);
                assert_eq!(folder_id, "a01-003");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
