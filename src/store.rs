//! LMDB-backed image store.
//!
//! Keys are image basenames (`a01-000u-00-00.png`), values are
//! [`GrayRaster`]s encoded with `bitcode`. A store is created once, filled in a
//! single write transaction and then only read by training code.

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, MdbError, RwTxn};
use image::{GrayImage, ImageReader};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PrepError, Result};

// LMDB map sizes must be a multiple of the OS page size
const MAP_SIZE_ALIGNMENT: usize = 64 * 1024;

/// Single-channel 8-bit raster, row-major.
#[derive(Debug, Clone, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
pub struct GrayRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl GrayRaster {
    pub fn from_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        GrayRaster {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    /// Decode a stored value, rejecting buffers whose pixel count does not
    /// match the recorded dimensions.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raster: GrayRaster = bitcode::decode(bytes).ok()?;
        let expected = raster.width as usize * raster.height as usize;
        (raster.pixels.len() == expected).then_some(raster)
    }
}

/// Read an image file and convert it to 8-bit grayscale.
///
/// The format is sniffed from the file contents, not the extension.
pub fn decode_grayscale(path: &Path) -> std::result::Result<GrayRaster, image::ImageError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(GrayRaster::from_image(image.into_luma8()))
}

fn aligned_map_size(capacity: usize) -> usize {
    capacity.max(1).div_ceil(MAP_SIZE_ALIGNMENT) * MAP_SIZE_ALIGNMENT
}

pub struct ImageStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
    capacity: usize,
}

impl ImageStore {
    /// Create a new store directory at `path` holding at most `capacity` bytes.
    ///
    /// Refuses to touch an existing path: a leftover store from an aborted run
    /// must be removed by the operator first.
    pub fn create(path: &Path, capacity: usize) -> Result<Self> {
        if path.exists() {
            return Err(PrepError::Configuration {
                path: path.to_path_buf(),
                reason: "store path already exists; remove it before building a new store"
                    .to_string(),
            });
        }
        fs::create_dir_all(path)?;

        let capacity = aligned_map_size(capacity);
        match Self::open_env(path, capacity) {
            Ok((env, db)) => {
                debug!(
                    "Created image store at {} with map size {} bytes",
                    path.display(),
                    capacity
                );
                Ok(ImageStore {
                    env,
                    db,
                    path: path.to_path_buf(),
                    capacity,
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(path) {
                    warn!(
                        "Failed to remove store directory {}: {}",
                        path.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Open an existing store for reading.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(PrepError::missing_path(path));
        }
        // SAFETY: the store directory is only written by `ImageStore::create`
        // and nothing truncates or rewrites its files while it is mapped.
        let env = unsafe { EnvOpenOptions::new().max_dbs(1).open(path)? };
        let rtxn = env.read_txn()?;
        let db = env
            .open_database::<Bytes, Bytes>(&rtxn, None)?
            .ok_or_else(|| PrepError::Configuration {
                path: path.to_path_buf(),
                reason: "not an image store".to_string(),
            })?;
        rtxn.commit()?;
        let capacity = env.info().map_size;
        Ok(ImageStore {
            env,
            db,
            path: path.to_path_buf(),
            capacity,
        })
    }

    fn open_env(path: &Path, capacity: usize) -> Result<(Env, Database<Bytes, Bytes>)> {
        // SAFETY: the directory was created just above and is owned by this
        // handle for the whole build; no other process maps it.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(capacity)
                .max_dbs(1)
                .open(path)?
        };
        let mut wtxn = env.write_txn()?;
        let db = env.create_database::<Bytes, Bytes>(&mut wtxn, None)?;
        wtxn.commit()?;
        Ok((env, db))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum size of the store in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start the write transaction that fills the store.
    pub fn writer(&self) -> Result<StoreWriter<'_>> {
        Ok(StoreWriter {
            txn: self.env.write_txn()?,
            store: self,
        })
    }

    pub fn get(&self, basename: &str) -> Result<Option<GrayRaster>> {
        let rtxn = self.env.read_txn()?;
        let value = self.db.get(&rtxn, basename.as_bytes())?;
        Ok(value.and_then(GrayRaster::from_bytes))
    }

    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Stored keys in LMDB order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let rtxn = self.env.read_txn()?;
        let mut keys = Vec::new();
        for entry in self.db.iter(&rtxn)? {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(key).into_owned());
        }
        Ok(keys)
    }

    /// Close the environment and wait until LMDB has released it.
    pub fn close(self) {
        let path = self.path;
        let closing = self.env.prepare_for_closing();
        closing.wait();
        debug!("Closed image store at {}", path.display());
    }

    fn map_store_err(&self, err: heed::Error) -> PrepError {
        match err {
            heed::Error::Mdb(MdbError::MapFull) => PrepError::StoreFull {
                path: self.path.clone(),
                capacity: self.capacity,
            },
            other => PrepError::Store(other),
        }
    }
}

/// Write transaction over an [`ImageStore`]. Dropping it without
/// [`StoreWriter::commit`] discards every put.
pub struct StoreWriter<'s> {
    store: &'s ImageStore,
    txn: RwTxn<'s>,
}

impl StoreWriter<'_> {
    pub fn put(&mut self, basename: &str, raster: &GrayRaster) -> Result<()> {
        self.store
            .db
            .put(&mut self.txn, basename.as_bytes(), &raster.to_bytes())
            .map_err(|e| self.store.map_store_err(e))
    }

    pub fn commit(self) -> Result<()> {
        let store = self.store;
        self.txn.commit().map_err(|e| store.map_store_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CAPACITY: usize = 4 * 1024 * 1024;

    fn raster(width: u32, height: u32) -> GrayRaster {
        GrayRaster {
            width,
            height,
            pixels: (0..width * height).map(|v| (v % 251) as u8).collect(),
        }
    }

    #[test]
    fn test_aligned_map_size() {
        assert_eq!(aligned_map_size(0), MAP_SIZE_ALIGNMENT);
        assert_eq!(aligned_map_size(MAP_SIZE_ALIGNMENT), MAP_SIZE_ALIGNMENT);
        assert_eq!(aligned_map_size(MAP_SIZE_ALIGNMENT + 1), 2 * MAP_SIZE_ALIGNMENT);
        assert_eq!(
            aligned_map_size(crate::types::DEFAULT_STORE_CAPACITY),
            crate::types::DEFAULT_STORE_CAPACITY
        );
    }

    #[test]
    fn test_raster_rejects_inconsistent_buffers() {
        let bad = GrayRaster {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        };
        assert!(GrayRaster::from_bytes(&bad.to_bytes()).is_none());
        assert!(GrayRaster::from_bytes(b"garbage").is_none());
    }

    #[test]
    fn test_create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageStore::create(dir.path(), TEST_CAPACITY).err().unwrap();
        assert!(matches!(err, PrepError::Configuration { .. }));
    }

    #[test]
    fn test_commit_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lmdb");

        let store = ImageStore::create(&path, TEST_CAPACITY).unwrap();
        let mut writer = store.writer().unwrap();
        writer.put("b.png", &raster(3, 2)).unwrap();
        writer.put("a.png", &raster(1, 1)).unwrap();
        writer.commit().unwrap();
        store.close();

        let store = ImageStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.keys().unwrap(), vec!["a.png", "b.png"]);
        assert_eq!(store.get("b.png").unwrap(), Some(raster(3, 2)));
        assert_eq!(store.get("c.png").unwrap(), None);
        store.close();
    }

    #[test]
    fn test_dropped_writer_discards_puts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lmdb");

        let store = ImageStore::create(&path, TEST_CAPACITY).unwrap();
        {
            let mut writer = store.writer().unwrap();
            writer.put("a.png", &raster(2, 2)).unwrap();
        }
        assert!(store.is_empty().unwrap());
        store.close();
    }

    #[test]
    fn test_capacity_exhaustion_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lmdb");

        let store = ImageStore::create(&path, MAP_SIZE_ALIGNMENT).unwrap();
        let big = raster(512, 512);
        let mut writer = store.writer().unwrap();
        let result = (0..8)
            .map(|i| writer.put(&format!("{i}.png"), &big))
            .find(|r| r.is_err())
            .unwrap_or(Ok(()));
        match result {
            Err(PrepError::StoreFull { capacity, .. }) => {
                assert_eq!(capacity, MAP_SIZE_ALIGNMENT)
            }
            other => panic!("expected StoreFull, got {:?}", other.err()),
        }
        drop(writer);
        store.close();
    }
}
