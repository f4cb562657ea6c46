//! Texture loading and caching
//!
//! Scene graphics reference PNG files on disk. The store decodes each file
//! once and hands out shared buffers; an unreadable file is the host's
//! "bad texture" placeholder and surfaces as the no-texture condition
//! upstream.

use image::RgbaImage;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Error type for texture lookups
#[derive(Debug, Error)]
pub enum TextureError {
    /// The texture file does not exist
    #[error("texture not found: {0}")]
    NotFound(PathBuf),
    /// The texture file exists but could not be decoded
    #[error("unreadable texture {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Path-keyed cache of decoded RGBA textures.
///
/// Relative paths resolve against the store root (normally the scene file's
/// directory). Single-threaded by design, so buffers are shared via `Rc`.
pub struct TextureStore {
    root: PathBuf,
    cache: RefCell<HashMap<PathBuf, Rc<RgbaImage>>>,
}

impl TextureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Load (or fetch from cache) the texture at `path`.
    pub fn get(&self, path: &Path) -> Result<Rc<RgbaImage>, TextureError> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        if let Some(hit) = self.cache.borrow().get(&full) {
            return Ok(Rc::clone(hit));
        }

        if !full.is_file() {
            return Err(TextureError::NotFound(full));
        }
        let decoded = image::open(&full)
            .map_err(|source| TextureError::Unreadable {
                path: full.clone(),
                source,
            })?
            .to_rgba8();

        let shared = Rc::new(decoded);
        self.cache
            .borrow_mut()
            .insert(full, Rc::clone(&shared));
        Ok(shared)
    }
}
