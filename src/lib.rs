//! Handwriting-recognition corpus preparation
//!
//! This library splits an IAM-style `words.txt` annotation file into
//! train/validation/test files by page folder, and packs the referenced word
//! images into an LMDB store keyed by image basename.

pub mod annotation;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod extract;
pub mod index;
pub mod io;
pub mod splits;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use annotation::{folder_id, parse_line, ParsedLine, Record};
pub use config::{SplitArgs, SplitConfig, SplitPaths, StoreArgs, StoreConfig};
pub use dataset::{build_store, run_extraction, run_store_build};
pub use errors::PrepError;
pub use extract::{extract_annotations, extract_partitions, save_annotations};
pub use index::{build_index, ImageIndex};
pub use splits::{load_folder_ids, SplitSets};
pub use store::{GrayRaster, ImageStore};
pub use types::{Partition, PartitionedAnnotations, StoreStats};
