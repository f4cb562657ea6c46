//! Portrait composition and caching
//!
//! A portrait is an ordered stack of layers (body, head, apparel, ...)
//! composed into a requested target size at a given zoom. Composed portraits
//! are cached per (entity, size, facing, zoom) the way the host engine's
//! portrait cache works, so the adaptive-zoom loop never re-composes a size
//! it has already produced.

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::CaptureError;
use crate::scene::Facing;
use crate::target::TargetSize;
use crate::texture::TextureStore;

fn default_scale() -> f32 {
    1.0
}

/// One layer of a composed portrait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortraitLayer {
    pub texture: PathBuf,
    /// Scale relative to the body layer (1.0)
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Offset from center as a fraction of the target size
    #[serde(default)]
    pub offset: [f32; 2],
}

impl PortraitLayer {
    /// A bare full-size layer, used when a capability provider supplies a
    /// single texture instead of a layer stack.
    pub fn full(texture: PathBuf) -> Self {
        Self {
            texture,
            scale: 1.0,
            offset: [0.0, 0.0],
        }
    }
}

/// Portrait description carried by pawn and corpse entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortraitSpec {
    /// Body mesh bounding size in world units
    pub mesh: [f32; 2],
    pub layers: Vec<PortraitLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PortraitKey {
    entity_id: u32,
    width: u32,
    height: u32,
    facing: Facing,
    zoom_q: u32,
    mirror_west: bool,
}

/// Quantize zoom for cache keying so float drift between retries cannot
/// split entries.
fn quantize(zoom: f32) -> u32 {
    (zoom * 10_000.0).round() as u32
}

/// Cache of composed portraits.
#[derive(Default)]
pub struct PortraitCache {
    cache: HashMap<PortraitKey, Rc<RgbaImage>>,
}

impl PortraitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or compose and cache) the portrait for an entity at the given
    /// size, facing, and zoom.
    ///
    /// `mirror_west` is false when the layers already carry facing-specific
    /// art (capability providers resolve their texture per facing), so a
    /// west texture is not flipped a second time.
    pub fn get(
        &mut self,
        entity_id: u32,
        layers: &[PortraitLayer],
        size: TargetSize,
        facing: Facing,
        zoom: f32,
        mirror_west: bool,
        store: &TextureStore,
    ) -> Result<Rc<RgbaImage>, CaptureError> {
        let key = PortraitKey {
            entity_id,
            width: size.width,
            height: size.height,
            facing,
            zoom_q: quantize(zoom),
            mirror_west,
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Rc::clone(hit));
        }
        let composed = Rc::new(compose(layers, size, facing, zoom, mirror_west, store)?);
        self.cache.insert(key, Rc::clone(&composed));
        Ok(composed)
    }
}

/// Compose portrait layers into a transparent canvas of exactly `size`.
///
/// Each layer is fitted to the target (largest dimension matches), then
/// scaled by zoom and its own relative scale, centered, and shifted by its
/// offset. West-facing portraits are mirrored unless the layers are
/// facing-resolved already.
fn compose(
    layers: &[PortraitLayer],
    size: TargetSize,
    facing: Facing,
    zoom: f32,
    mirror_west: bool,
    store: &TextureStore,
) -> Result<RgbaImage, CaptureError> {
    let mut canvas = RgbaImage::new(size.width, size.height);
    for layer in layers {
        let texture = store.get(&layer.texture)?;
        let fit = (size.width as f32 / texture.width() as f32)
            .min(size.height as f32 / texture.height() as f32);
        let scale = fit * zoom * layer.scale;
        let width = ((texture.width() as f32 * scale).round() as u32).max(1);
        let height = ((texture.height() as f32 * scale).round() as u32).max(1);
        let scaled = imageops::resize(&*texture, width, height, imageops::FilterType::Nearest);

        let left = (size.width as i64 - width as i64) / 2
            + (layer.offset[0] * size.width as f32 * zoom).round() as i64;
        let top = (size.height as i64 - height as i64) / 2
            + (layer.offset[1] * size.height as f32 * zoom).round() as i64;
        alpha_over(&mut canvas, &scaled, left, top);
    }
    if mirror_west && facing == Facing::West {
        canvas = imageops::flip_horizontal(&canvas);
    }
    Ok(canvas)
}

/// Source-over composite of `src` onto `canvas` at a signed position.
/// Pixels falling outside the canvas are dropped.
pub(crate) fn alpha_over(canvas: &mut RgbaImage, src: &RgbaImage, left: i64, top: i64) {
    let (canvas_w, canvas_h) = canvas.dimensions();
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let dx = left + sx as i64;
        let dy = top + sy as i64;
        if dx < 0 || dy < 0 || dx >= canvas_w as i64 || dy >= canvas_h as i64 {
            continue;
        }
        let src_a = pixel[3] as u32;
        if src_a == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(dx as u32, dy as u32);
        let dst_a = dst[3] as u32;
        let inv = 255 - src_a;
        let out_a = src_a + dst_a * inv / 255;
        if out_a == 0 {
            continue;
        }
        for c in 0..3 {
            let s = pixel[c] as u32;
            let d = dst[c] as u32;
            dst[c] = ((s * src_a + d * dst_a * inv / 255) / out_a) as u8;
        }
        dst[3] = out_a as u8;
    }
}
