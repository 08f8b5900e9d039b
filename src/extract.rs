use log::info;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::annotation::{scan_annotations, ParsedLine};
use crate::errors::Result;
use crate::splits::SplitSets;
use crate::types::{Partition, PartitionedAnnotations, HEADER_RULE_WIDTH};
use crate::utils::create_progress_bar;

/// Collect the lines whose folder id is in `folder_ids`, in file order.
pub fn extract_annotations(
    annotation_file: &Path,
    folder_ids: &HashSet<String>,
) -> Result<Vec<String>> {
    let mut annotations = Vec::new();
    scan_annotations(annotation_file, |parsed| {
        if let ParsedLine::Record(record) = parsed {
            if folder_ids.contains(record.folder_id()) {
                annotations.push(record.line.to_string());
            }
        }
        Ok(())
    })?;
    Ok(annotations)
}

/// Bucket every record into each partition whose split lists its folder id,
/// reading the annotation file once.
pub fn extract_partitions(
    annotation_file: &Path,
    splits: &SplitSets,
) -> Result<PartitionedAnnotations> {
    let mut partitioned = PartitionedAnnotations::default();
    scan_annotations(annotation_file, |parsed| {
        match parsed {
            ParsedLine::Skip => {}
            ParsedLine::Malformed => partitioned.stats.malformed += 1,
            ParsedLine::Record(record) => {
                partitioned.stats.records += 1;
                let mut assigned = false;
                for partition in splits.partitions_for(record.folder_id()) {
                    partitioned
                        .lines_mut(partition)
                        .push(record.line.to_string());
                    assigned = true;
                }
                if !assigned {
                    partitioned.stats.unassigned += 1;
                }
            }
        }
        Ok(())
    })?;
    Ok(partitioned)
}

/// Header block written above the retained lines of a partition file.
pub fn partition_header(partition: Partition, count: usize) -> String {
    format!(
        "# {} SET ANNOTATIONS\n# Total: {} entries\n#{}\n\n",
        partition.name().to_uppercase(),
        count,
        "=".repeat(HEADER_RULE_WIDTH - 1)
    )
}

pub fn save_annotations(
    lines: &[String],
    output_path: &Path,
    partition: Partition,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    writer.write_all(partition_header(partition, lines.len()).as_bytes())?;
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    info!(
        "Created {} with {} entries",
        output_path.display(),
        lines.len()
    );
    Ok(())
}

/// Write all three partition files into `output_dir` and return their paths.
pub fn save_partitions(
    partitioned: &PartitionedAnnotations,
    output_dir: &Path,
) -> Result<Vec<(Partition, PathBuf)>> {
    let pb = create_progress_bar(Partition::ALL.len() as u64, "Write");
    let mut written = Vec::with_capacity(Partition::ALL.len());
    for partition in Partition::ALL {
        let path = output_dir.join(partition.output_file_name());
        if let Err(e) = save_annotations(partitioned.lines(partition), &path, partition) {
            pb.abandon();
            return Err(e);
        }
        written.push((partition, path));
        pb.inc(1);
    }
    pb.finish();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_partition_header_layout() {
        let header = partition_header(Partition::Validation, 3);
        let lines: Vec<&str> = header.split('\n').collect();
        assert_eq!(lines[0], "# VALIDATION SET ANNOTATIONS");
        assert_eq!(lines[1], "# Total: 3 entries");
        assert_eq!(lines[2].len(), 80);
        assert!(lines[2].starts_with("#="));
        assert!(lines[2][1..].chars().all(|c| c == '='));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_save_annotations_empty_partition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_annotations.txt");
        save_annotations(&[], &path, Partition::Test).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, partition_header(Partition::Test, 0));
    }

    #[test]
    fn test_save_partitions_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut partitioned = PartitionedAnnotations::default();
        partitioned
            .lines_mut(Partition::Train)
            .push("a01-000u-00-00 ok 154 408 768 27 51 AT A".to_string());

        let written = save_partitions(&partitioned, dir.path()).unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|(_, path)| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "train_annotations.txt",
                "validation_annotations.txt",
                "test_annotations.txt"
            ]
        );
        let train = fs::read_to_string(&written[0].1).unwrap();
        assert!(train.starts_with(&partition_header(Partition::Train, 1)));
        assert!(train.ends_with("AT A\n"));
    }
}
