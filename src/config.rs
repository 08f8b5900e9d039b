use clap::Parser;
use std::path::{Path, PathBuf};

use crate::types::{Partition, DEFAULT_STORE_CAPACITY};

const MIB: usize = 1024 * 1024;

/// Split the master annotation file into train/validation/test annotation files by page folder.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SplitArgs {
    /// Dataset directory holding words.txt and the split lists
    #[arg(short = 'd', long = "data_dir", default_value = ".")]
    pub data_dir: PathBuf,

    /// Master annotation file [default: <data_dir>/words.txt]
    #[arg(long = "annotations")]
    pub annotations: Option<PathBuf>,

    /// Folder ids of the training split [default: <data_dir>/train.txt]
    #[arg(long = "train_split")]
    pub train_split: Option<PathBuf>,

    /// Folder ids of the validation split [default: <data_dir>/validation.txt]
    #[arg(long = "validation_split")]
    pub validation_split: Option<PathBuf>,

    /// Folder ids of the test split [default: <data_dir>/test.txt]
    #[arg(long = "test_split")]
    pub test_split: Option<PathBuf>,

    /// Directory receiving <split>_annotations.txt [default: <data_dir>]
    #[arg(long = "output_dir")]
    pub output_dir: Option<PathBuf>,

    /// Fail when a folder id is listed in more than one split
    #[arg(long = "strict_disjoint")]
    pub strict_disjoint: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

/// Pack the word images referenced by the annotation file into an LMDB store.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct StoreArgs {
    /// Dataset directory holding words.txt and img/
    #[arg(short = 'd', long = "data_dir", default_value = ".")]
    pub data_dir: PathBuf,

    /// Master annotation file [default: <data_dir>/words.txt]
    #[arg(long = "annotations")]
    pub annotations: Option<PathBuf>,

    /// Root of the image tree [default: <data_dir>/img]
    #[arg(long = "image_root")]
    pub image_root: Option<PathBuf>,

    /// Store directory to create; must not exist [default: <data_dir>/lmdb]
    #[arg(long = "store_path")]
    pub store_path: Option<PathBuf>,

    /// Maximum store size in MiB
    #[arg(long = "capacity_mb", default_value_t = DEFAULT_STORE_CAPACITY / MIB, value_parser = validate_capacity_mb)]
    pub capacity_mb: usize,

    /// Number of decoding threads (defaults to the number of CPUs)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Write a JSON summary of the run to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

/// Paths of the three split lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPaths {
    pub train: PathBuf,
    pub validation: PathBuf,
    pub test: PathBuf,
}

impl SplitPaths {
    pub fn get(&self, partition: Partition) -> &PathBuf {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }
}

/// Resolved inputs and outputs of the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub annotation_path: PathBuf,
    pub split_paths: SplitPaths,
    pub output_dir: PathBuf,
    pub strict_disjoint: bool,
    pub report_path: Option<PathBuf>,
}

/// Resolved inputs and outputs of the store build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub annotation_path: PathBuf,
    pub image_root: PathBuf,
    pub store_path: PathBuf,
    pub capacity_bytes: usize,
    pub report_path: Option<PathBuf>,
}

impl SplitArgs {
    pub fn to_config(&self) -> SplitConfig {
        let dir = &self.data_dir;
        SplitConfig {
            annotation_path: or_default(&self.annotations, dir, "words.txt"),
            split_paths: SplitPaths {
                train: or_default(&self.train_split, dir, "train.txt"),
                validation: or_default(&self.validation_split, dir, "validation.txt"),
                test: or_default(&self.test_split, dir, "test.txt"),
            },
            output_dir: self.output_dir.clone().unwrap_or_else(|| dir.clone()),
            strict_disjoint: self.strict_disjoint,
            report_path: self.report.clone(),
        }
    }
}

impl StoreArgs {
    pub fn to_config(&self) -> StoreConfig {
        let dir = &self.data_dir;
        StoreConfig {
            annotation_path: or_default(&self.annotations, dir, "words.txt"),
            image_root: or_default(&self.image_root, dir, "img"),
            store_path: or_default(&self.store_path, dir, "lmdb"),
            capacity_bytes: self.capacity_mb.saturating_mul(MIB),
            report_path: self.report.clone(),
        }
    }
}

fn or_default(explicit: &Option<PathBuf>, data_dir: &Path, file_name: &str) -> PathBuf {
    explicit
        .clone()
        .unwrap_or_else(|| data_dir.join(file_name))
}

// Capacity must be a positive number of MiB
fn validate_capacity_mb(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("CAPACITY must be a positive number of MiB".to_string()),
    }
}
