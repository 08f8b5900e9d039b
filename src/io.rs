use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::types::{ExtractionStats, Partition, StoreStats};

// Per-partition entry of the extraction report
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub path: PathBuf,
    pub folders: usize,
    pub entries: usize,
}

/// JSON summary of one `extract_splits` run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub annotation_path: PathBuf,
    pub partitions: BTreeMap<Partition, PartitionReport>,
    pub total: usize,
    #[serde(flatten)]
    pub stats: ExtractionStats,
}

/// JSON summary of one `build_image_store` run.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub annotation_path: PathBuf,
    pub image_root: PathBuf,
    pub store_path: PathBuf,
    pub capacity_bytes: usize,
    pub indexed_images: usize,
    pub shadowed_images: usize,
    #[serde(flatten)]
    pub stats: StoreStats,
}

/// Write `report` as pretty-printed JSON
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    log::info!("Wrote run report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_store_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = StoreReport {
            annotation_path: PathBuf::from("words.txt"),
            image_root: PathBuf::from("img"),
            store_path: PathBuf::from("lmdb"),
            capacity_bytes: 1024,
            indexed_images: 3,
            shadowed_images: 0,
            stats: StoreStats {
                added: 2,
                missing: 1,
                malformed: 0,
            },
        };
        write_report(&path, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["added"], 2);
        assert_eq!(value["missing"], 1);
        assert_eq!(value["store_path"], "lmdb");
    }

    #[test]
    fn test_partition_keys_are_names() {
        let mut partitions = BTreeMap::new();
        partitions.insert(
            Partition::Validation,
            PartitionReport {
                path: PathBuf::from("validation_annotations.txt"),
                folders: 1,
                entries: 4,
            },
        );
        let report = ExtractionReport {
            annotation_path: PathBuf::from("words.txt"),
            partitions,
            total: 4,
            stats: ExtractionStats::default(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["partitions"]["validation"]["entries"], 4);
        assert_eq!(value["malformed"], 0);
    }
}
