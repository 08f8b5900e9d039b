use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::annotation::{scan_annotations, ParsedLine};
use crate::config::{SplitConfig, StoreConfig};
use crate::errors::{PrepError, Result};
use crate::extract::{extract_partitions, save_partitions};
use crate::index::{build_index, ImageIndex};
use crate::io::{write_report, ExtractionReport, PartitionReport, StoreReport};
use crate::splits::SplitSets;
use crate::store::{decode_grayscale, GrayRaster, ImageStore, StoreWriter};
use crate::types::{PartitionedAnnotations, StoreStats, IMAGE_KEY_SUFFIX};
use crate::utils::{create_output_directory, create_spinner};

// Records decoded in parallel before being written in file order
const DECODE_BATCH_SIZE: usize = 256;

/// Partition the annotation file into the three split files.
pub fn run_extraction(config: &SplitConfig) -> Result<PartitionedAnnotations> {
    info!("Loading folder IDs from split files...");
    let splits = SplitSets::load(&config.split_paths)?;
    if config.strict_disjoint {
        splits.check_disjoint()?;
    }

    info!(
        "Extracting annotations from {}...",
        config.annotation_path.display()
    );
    let partitioned = extract_partitions(&config.annotation_path, &splits)?;

    create_output_directory(&config.output_dir)?;
    let written = save_partitions(&partitioned, &config.output_dir)?;
    partitioned.stats.print_summary(&partitioned);

    if let Some(report_path) = &config.report_path {
        let partitions = written
            .into_iter()
            .map(|(partition, path)| {
                let report = PartitionReport {
                    path,
                    folders: splits.folder_ids(partition).len(),
                    entries: partitioned.lines(partition).len(),
                };
                (partition, report)
            })
            .collect::<BTreeMap<_, _>>();
        let report = ExtractionReport {
            annotation_path: config.annotation_path.clone(),
            partitions,
            total: partitioned.total(),
            stats: partitioned.stats.clone(),
        };
        write_report(report_path, &report)?;
    }

    Ok(partitioned)
}

/// Index the image tree and pack every referenced image into a new store.
pub fn run_store_build(config: &StoreConfig) -> Result<StoreStats> {
    if !config.annotation_path.is_file() {
        return Err(PrepError::missing_path(&config.annotation_path));
    }
    // Checked again on creation; failing here avoids walking the image tree first
    if config.store_path.exists() {
        return Err(PrepError::Configuration {
            path: config.store_path.clone(),
            reason: "store path already exists; remove it before building a new store"
                .to_string(),
        });
    }

    info!("Indexing images under {}...", config.image_root.display());
    let index = build_index(&config.image_root)?;

    info!("Building image store at {}...", config.store_path.display());
    let stats = build_store(
        &config.annotation_path,
        &index,
        &config.store_path,
        config.capacity_bytes,
    )?;
    stats.print_summary();

    if let Some(report_path) = &config.report_path {
        let report = StoreReport {
            annotation_path: config.annotation_path.clone(),
            image_root: config.image_root.clone(),
            store_path: config.store_path.clone(),
            capacity_bytes: config.capacity_bytes,
            indexed_images: index.len(),
            shadowed_images: index.shadowed(),
            stats: stats.clone(),
        };
        write_report(report_path, &report)?;
    }

    Ok(stats)
}

/// Create the store at `store_path` and fill it with the images referenced
/// by `annotation_file`.
///
/// Missing or undecodable images are counted, never fatal. The store is
/// closed before returning, on success and on error.
pub fn build_store(
    annotation_file: &Path,
    index: &ImageIndex,
    store_path: &Path,
    capacity_bytes: usize,
) -> Result<StoreStats> {
    if !annotation_file.is_file() {
        return Err(PrepError::missing_path(annotation_file));
    }

    let store = ImageStore::create(store_path, capacity_bytes)?;
    info!(
        "Opened image store at {} ({} byte map)",
        store.path().display(),
        store.capacity()
    );
    let result = fill_store(&store, annotation_file, index);
    store.close();
    result
}

fn fill_store(
    store: &ImageStore,
    annotation_file: &Path,
    index: &ImageIndex,
) -> Result<StoreStats> {
    let pb = create_spinner("Store");
    match write_records(store, annotation_file, index, &pb) {
        Ok(stats) => {
            pb.finish_with_message(format!(
                "done ({} added, {} missing)",
                stats.added, stats.missing
            ));
            Ok(stats)
        }
        Err(e) => {
            pb.abandon_with_message("aborted");
            Err(e)
        }
    }
}

// Stream the annotation file through one write transaction, committed at the end
fn write_records(
    store: &ImageStore,
    annotation_file: &Path,
    index: &ImageIndex,
    pb: &ProgressBar,
) -> Result<StoreStats> {
    let mut stats = StoreStats::default();
    let mut writer = store.writer()?;
    let mut batch: Vec<String> = Vec::with_capacity(DECODE_BATCH_SIZE);

    scan_annotations(annotation_file, |parsed| {
        match parsed {
            ParsedLine::Skip => {}
            ParsedLine::Malformed => stats.increment_malformed(),
            ParsedLine::Record(record) => {
                batch.push(format!("{}{}", record.record_id, IMAGE_KEY_SUFFIX));
                if batch.len() == DECODE_BATCH_SIZE {
                    pb.inc(batch.len() as u64);
                    write_batch(&mut writer, index, &mut batch, &mut stats)?;
                }
            }
        }
        Ok(())
    })?;
    pb.inc(batch.len() as u64);
    write_batch(&mut writer, index, &mut batch, &mut stats)?;

    writer.commit()?;
    Ok(stats)
}

// Decode a batch in parallel, then write it in input order
fn write_batch(
    writer: &mut StoreWriter<'_>,
    index: &ImageIndex,
    batch: &mut Vec<String>,
    stats: &mut StoreStats,
) -> Result<()> {
    let decoded: Vec<Option<GrayRaster>> = batch
        .par_iter()
        .map(|basename| load_raster(index, basename))
        .collect();

    for (basename, raster) in batch.drain(..).zip(decoded) {
        match raster {
            Some(raster) => {
                writer.put(&basename, &raster)?;
                stats.increment_added();
            }
            None => stats.increment_missing(),
        }
    }
    Ok(())
}

fn load_raster(index: &ImageIndex, basename: &str) -> Option<GrayRaster> {
    if !basename.is_ascii() {
        warn!("Skipping {}: store keys must be ASCII", basename);
        return None;
    }
    let Some(path) = index.get(basename) else {
        debug!("No image found for {}", basename);
        return None;
    };
    match decode_grayscale(path) {
        Ok(raster) => Some(raster),
        Err(e) => {
            warn!("Failed to decode {}: {}", path.display(), e);
            None
        }
    }
}
