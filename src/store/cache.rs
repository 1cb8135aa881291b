//! Result cache: id → record memo, persisted as gzip-compressed JSON.
//!
//! Reads are served from an in-memory image. Writes go through a single writer lock and flush the
//! whole image (temp + rename) before returning, so two workers putting at once never lose each
//! other's entries.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use crate::error::{HarvestError, HarvestResult};
use crate::types::{EntityId, ExtractedRecord};
use crate::utils::tempfiles::write_atomic;

type Image = BTreeMap<String, ExtractedRecord>;

pub struct ResultCache {
    path: PathBuf,
    /// None until first access or refresh.
    image: RwLock<Option<Image>>,
    writer: Mutex<()>,
}

fn read_image(path: &Path) -> Image {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Image::new(),
        Err(e) => {
            warn!("open cache {}: {}; starting empty", path.display(), e);
            return Image::new();
        }
    };
    match serde_json::from_reader(BufReader::new(GzDecoder::new(file))) {
        Ok(image) => image,
        Err(e) => {
            warn!("unreadable cache {}: {}; starting empty", path.display(), e);
            Image::new()
        }
    }
}

fn encode_image(image: &Image) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, image)?;
    encoder.flush()?;
    encoder.finish()
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(id: &EntityId) -> String {
        id.to_string()
    }

    fn ensure_loaded(&self) {
        let loaded = self
            .image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if !loaded {
            let mut guard = self.image.write().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() {
                *guard = Some(read_image(&self.path));
            }
        }
    }

    /// Reload the image from disk, picking up entries written since the last load.
    pub fn refresh(&self) {
        let image = read_image(&self.path);
        debug!("Cache refreshed: {} entries", image.len());
        *self.image.write().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }

    pub fn get(&self, id: &EntityId) -> Option<ExtractedRecord> {
        self.ensure_loaded();
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|image| image.get(&Self::key(id)).cloned())
    }

    pub fn len(&self) -> usize {
        self.ensure_loaded();
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `record` under `id` and flush. Equal content already present is a no-op (`Ok(false)`).
    /// A failed flush leaves the entry in memory and returns `CacheWriteFailed`.
    pub fn put(&self, id: &EntityId, record: &ExtractedRecord) -> HarvestResult<bool> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_loaded();
        let bytes = {
            let mut guard = self.image.write().unwrap_or_else(PoisonError::into_inner);
            let image = guard.get_or_insert_with(Image::new);
            let key = Self::key(id);
            if image.get(&key) == Some(record) {
                return Ok(false);
            }
            image.insert(key, record.clone());
            encode_image(image)
        };
        bytes
            .and_then(|b| write_atomic(&self.path, &b))
            .map_err(|e| HarvestError::CacheWriteFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }
}
