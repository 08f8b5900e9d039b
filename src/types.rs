use serde::Serialize;
use std::fmt;

// Image extensions picked up by the index walk
pub const IMG_FORMATS: &[&str] = &["png"];

// Extension appended to a record id to form the store key
pub const IMAGE_KEY_SUFFIX: &str = ".png";

// Records with fewer whitespace-separated fields are malformed
pub const MIN_RECORD_FIELDS: usize = 9;

// Width of the `#====...` separator written under partition headers
pub const HEADER_RULE_WIDTH: usize = 80;

// 2 GiB is enough for the IAM word set
pub const DEFAULT_STORE_CAPACITY: usize = 2 * 1024 * 1024 * 1024;

/// One of the three dataset partitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Validation, Partition::Test];

    pub fn name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Validation => "validation",
            Partition::Test => "test",
        }
    }

    /// File name of the extracted annotations, e.g. `train_annotations.txt`.
    pub fn output_file_name(self) -> String {
        format!("{}_annotations.txt", self.name())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Lines retained for each partition, in annotation-file order
#[derive(Debug, Default, Clone)]
pub struct PartitionedAnnotations {
    pub train: Vec<String>,
    pub validation: Vec<String>,
    pub test: Vec<String>,
    pub stats: ExtractionStats,
}

impl PartitionedAnnotations {
    pub fn lines(&self, partition: Partition) -> &[String] {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }

    pub(crate) fn lines_mut(&mut self, partition: Partition) -> &mut Vec<String> {
        match partition {
            Partition::Train => &mut self.train,
            Partition::Validation => &mut self.validation,
            Partition::Test => &mut self.test,
        }
    }

    /// Sum of the three partition sizes.
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

// Counters gathered during one extraction pass
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub records: usize,
    pub malformed: usize,
    pub unassigned: usize,
}

impl ExtractionStats {
    pub fn print_summary(&self, partitioned: &PartitionedAnnotations) {
        log::info!("{}", "=".repeat(HEADER_RULE_WIDTH));
        log::info!("SUMMARY");
        log::info!("{}", "=".repeat(HEADER_RULE_WIDTH));
        for partition in Partition::ALL {
            log::info!(
                "{} annotations: {}",
                capitalize(partition.name()),
                partitioned.lines(partition).len()
            );
        }
        log::info!("Total: {}", partitioned.total());

        if self.unassigned > 0 {
            log::info!(
                "Records outside every split: {} of {}",
                self.unassigned,
                self.records
            );
        }
        if self.malformed > 0 {
            log::warn!(
                "Skipped malformed lines (fewer than {} fields): {}",
                MIN_RECORD_FIELDS,
                self.malformed
            );
        }
    }
}

// Counters gathered while filling the image store
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub added: usize,
    pub missing: usize,
    pub malformed: usize,
}

impl StoreStats {
    pub fn increment_added(&mut self) {
        self.added += 1;
    }

    pub fn increment_missing(&mut self) {
        self.missing += 1;
    }

    pub fn increment_malformed(&mut self) {
        self.malformed += 1;
    }

    pub fn print_summary(&self) {
        log::info!("Added {} images to the store", self.added);
        if self.missing > 0 {
            log::warn!(
                "Skipped {} entries (image file not found or unreadable)",
                self.missing
            );
        }
        if self.malformed > 0 {
            log::warn!(
                "Skipped {} malformed lines (fewer than {} fields)",
                self.malformed,
                MIN_RECORD_FIELDS
            );
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
