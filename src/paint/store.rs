//! Where raster layers live between operations.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{ImageFormat, RgbaImage};
use log::debug;

use crate::error::{GenesisError, Result};

use super::{Canvas, LayerKey};

/// Storage backend for raster layers.
pub trait RasterStore: Send + Sync {
    /// The stored image, or `None` when the layer was never saved.
    fn load(&self, key: &LayerKey) -> Result<Option<RgbaImage>>;

    fn save(&self, canvas: &Canvas) -> Result<()>;

    /// Deleting a missing layer is not an error.
    fn delete(&self, key: &LayerKey) -> Result<()>;

    fn exists(&self, key: &LayerKey) -> Result<bool>;

    /// The stored layer, or a blank one of the given size.
    fn canvas(&self, key: &LayerKey, width: u32, height: u32) -> Result<Canvas> {
        Ok(match self.load(key)? {
            Some(image) => Canvas::from_image(key.clone(), image),
            None => Canvas::new(key.clone(), width, height),
        })
    }

    /// Store `from` again under `to`. A missing source copies as blank.
    fn copy(&self, from: &LayerKey, to: &LayerKey, width: u32, height: u32) -> Result<()> {
        let source = self.canvas(from, width, height)?;
        self.save(&source.renamed(to.clone()))
    }
}

/// PNG files in one directory.
#[derive(Clone, Debug)]
pub struct FsRasterStore {
    root: PathBuf,
}

impl FsRasterStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self, key: &LayerKey) -> PathBuf {
        self.root.join(format!("{}.png", key.file_stem()))
    }
}

impl RasterStore for FsRasterStore {
    fn load(&self, key: &LayerKey) -> Result<Option<RgbaImage>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(image::open(&path)?.to_rgba8()))
    }

    fn save(&self, canvas: &Canvas) -> Result<()> {
        let path = self.path(canvas.key());
        let tmp = self.root.join(format!(".{}.png.tmp", canvas.key().file_stem()));
        canvas.image().save_with_format(&tmp, ImageFormat::Png)?;
        fs::rename(&tmp, &path)?;
        debug!("saved layer {}", path.display());
        Ok(())
    }

    fn delete(&self, key: &LayerKey) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &LayerKey) -> Result<bool> {
        Ok(self.path(key).exists())
    }
}

/// Layers held in memory, for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryRasterStore {
    layers: Mutex<HashMap<String, RgbaImage>>,
}

impl MemoryRasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, RgbaImage>>> {
        self.layers
            .lock()
            .map_err(|_| GenesisError::Io(std::io::Error::other("raster store lock poisoned")))
    }
}

impl RasterStore for MemoryRasterStore {
    fn load(&self, key: &LayerKey) -> Result<Option<RgbaImage>> {
        Ok(self.lock()?.get(&key.file_stem()).cloned())
    }

    fn save(&self, canvas: &Canvas) -> Result<()> {
        self.lock()?
            .insert(canvas.key().file_stem(), canvas.image().clone());
        Ok(())
    }

    fn delete(&self, key: &LayerKey) -> Result<()> {
        self.lock()?.remove(&key.file_stem());
        Ok(())
    }

    fn exists(&self, key: &LayerKey) -> Result<bool> {
        Ok(self.lock()?.contains_key(&key.file_stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::grey;

    fn exercise(store: &dyn RasterStore) {
        let key = LayerKey::new("w", 0, "mountains");
        assert!(!store.exists(&key).unwrap());

        let blank = store.canvas(&key, 8, 6).unwrap();
        assert_eq!((blank.width(), blank.height()), (8, 6));
        assert_eq!(blank.r(3, 3), 0);

        let mut canvas = blank;
        canvas.set(3, 3, grey(120, 1.0));
        store.save(&canvas).unwrap();
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.canvas(&key, 8, 6).unwrap().r(3, 3), 120);

        let next = key.at_epoch(1);
        store.copy(&key, &next, 8, 6).unwrap();
        assert_eq!(store.load(&next).unwrap().unwrap(), *canvas.image());

        store.delete(&key).unwrap();
        assert!(!store.exists(&key).unwrap());
        store.delete(&key).unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryRasterStore::new());
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRasterStore::new(dir.path()).unwrap();
        exercise(&store);
        assert!(store.path(&LayerKey::new("w", 1, "mountains")).exists());
    }
}
