//! Bounds-fit rendering
//!
//! Composites a subject into an off-screen target and answers the one
//! question the adaptive-zoom loop cares about: does the rendered content
//! reach the target border?

use image::{imageops, RgbaImage};

use crate::error::CaptureError;
use crate::graphic::{GraphicSpec, Material};
use crate::portrait::{alpha_over, PortraitCache, PortraitLayer};
use crate::scene::{Facing, StackState};
use crate::target::{TargetPool, TargetSize};
use crate::texture::TextureStore;

/// What gets drawn for one capture: a composed portrait or a flat sprite.
#[derive(Debug)]
pub enum RenderSubject<'e> {
    /// Multi-layer likeness, rendered through the portrait cache
    Portrait {
        entity_id: u32,
        label: &'e str,
        layers: Vec<PortraitLayer>,
        facing: Facing,
        /// False when the layers are already facing-resolved art, as with
        /// capability-provided sources that carry a dedicated west texture.
        mirror_west: bool,
    },
    /// Flat textured quad drawn through its own material
    Sprite {
        label: &'e str,
        spec: &'e GraphicSpec,
        facing: Facing,
        stack: Option<&'e StackState>,
        variant_seed: u32,
    },
}

impl RenderSubject<'_> {
    pub fn is_portrait(&self) -> bool {
        matches!(self, RenderSubject::Portrait { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            RenderSubject::Portrait { label, .. } => label,
            RenderSubject::Sprite { label, .. } => label,
        }
    }
}

/// Off-screen renderer: owns the target pool, texture store, and portrait
/// cache for one capture session.
pub struct Renderer {
    pool: TargetPool,
    store: TextureStore,
    portraits: PortraitCache,
}

impl Renderer {
    pub fn new(store: TextureStore) -> Self {
        Self {
            pool: TargetPool::new(),
            store,
            portraits: PortraitCache::new(),
        }
    }

    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }

    pub fn store(&self) -> &TextureStore {
        &self.store
    }

    /// Render the subject into a fresh target of exactly `size` and read it
    /// back.
    ///
    /// Portraits come out of the cache already composited for the requested
    /// zoom and are copied unmodified. Sprites resolve their texture for the
    /// facing and stack state, get their material applied, and are stretched
    /// to fill the target. Zoom only affects portraits.
    ///
    /// The acquired target is released (and the previously active target
    /// restored) on every path out of this function, error paths included.
    pub fn render(
        &mut self,
        subject: &RenderSubject<'_>,
        size: TargetSize,
        zoom: f32,
    ) -> Result<RgbaImage, CaptureError> {
        let mut target = self.pool.acquire(size);
        match subject {
            RenderSubject::Portrait {
                entity_id,
                label: _,
                layers,
                facing,
                mirror_west,
            } => {
                let portrait = self.portraits.get(
                    *entity_id,
                    layers,
                    size,
                    *facing,
                    zoom,
                    *mirror_west,
                    &self.store,
                )?;
                alpha_over(target.pixels_mut(), &portrait, 0, 0);
            }
            RenderSubject::Sprite {
                label,
                spec,
                facing,
                stack,
                variant_seed,
            } => {
                let path = spec
                    .texture_for(*facing, *stack, *variant_seed)
                    .ok_or_else(|| CaptureError::NoTexture((*label).to_string()))?;
                let texture = self.store.get(path).map_err(|e| {
                    log::warn!("texture lookup failed: {e}");
                    CaptureError::NoTexture((*label).to_string())
                })?;
                let material = Material::resolve(spec, &self.store)?;
                let shaded = material.apply(&texture);
                let stretched =
                    imageops::resize(&shaded, size.width, size.height, imageops::FilterType::Nearest);
                alpha_over(target.pixels_mut(), &stretched, 0, 0);
            }
        }
        log::trace!(
            "rendered {} at {}x{} zoom {:.3}",
            subject.label(),
            size.width,
            size.height,
            zoom
        );
        Ok(target.resolve())
    }
}

/// Border-touch test: true when any pixel on the outermost rows or columns
/// has non-zero alpha, meaning the rendered content was clipped.
///
/// Edge-only scan, O(width + height). Correct because subjects are always
/// centered on a canvas notionally larger than their content, so clipping
/// must show at the border first.
pub fn is_too_big(buffer: &RgbaImage) -> bool {
    let (width, height) = buffer.dimensions();
    if width == 0 || height == 0 {
        return false;
    }
    for x in 0..width {
        if buffer.get_pixel(x, 0)[3] > 0 {
            return true;
        }
    }
    for x in 0..width {
        if buffer.get_pixel(x, height - 1)[3] > 0 {
            return true;
        }
    }
    for y in 1..height.saturating_sub(1) {
        if buffer.get_pixel(0, y)[3] > 0 {
            return true;
        }
    }
    for y in 1..height.saturating_sub(1) {
        if buffer.get_pixel(width - 1, y)[3] > 0 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphic::GraphicClass;
    use image::Rgba;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    #[test]
    fn test_is_too_big_transparent_border_is_fine() {
        let mut buffer = RgbaImage::new(5, 5);
        // interior content only
        buffer.put_pixel(2, 2, Rgba([255, 255, 255, 255]));
        buffer.put_pixel(1, 3, Rgba([0, 0, 0, 1]));
        assert!(!is_too_big(&buffer));
    }

    #[test]
    fn test_is_too_big_each_border_line() {
        let cases = [
            (2, 0), // top row
            (2, 4), // bottom row
            (0, 2), // left column
            (4, 2), // right column
        ];
        for (x, y) in cases {
            let mut buffer = RgbaImage::new(5, 5);
            buffer.put_pixel(x, y, Rgba([0, 0, 0, 1]));
            assert!(is_too_big(&buffer), "border pixel at ({x}, {y})");
        }
    }

    #[test]
    fn test_is_too_big_corners() {
        for (x, y) in [(0, 0), (4, 0), (0, 4), (4, 4)] {
            let mut buffer = RgbaImage::new(5, 5);
            buffer.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            assert!(is_too_big(&buffer), "corner pixel at ({x}, {y})");
        }
    }

    #[test]
    fn test_is_too_big_fully_transparent() {
        assert!(!is_too_big(&RgbaImage::new(4, 4)));
        assert!(!is_too_big(&RgbaImage::new(1, 1)));
    }

    fn write_texture(dir: &TempDir, name: &str, pixel: Rgba<u8>) {
        let image = RgbaImage::from_pixel(4, 4, pixel);
        image.save(dir.path().join(name)).unwrap();
    }

    fn sprite_spec(texture: &str) -> GraphicSpec {
        GraphicSpec {
            mesh: [0.125, 0.125],
            class: GraphicClass::Single {
                texture: PathBuf::from(texture),
            },
            tint: None,
            mask: None,
        }
    }

    #[test]
    fn test_sprite_render_is_idempotent() {
        let dir = tempdir().unwrap();
        write_texture(&dir, "rock.png", Rgba([120, 110, 100, 255]));
        let mut renderer = Renderer::new(TextureStore::new(dir.path()));

        let spec = sprite_spec("rock.png");
        let subject = RenderSubject::Sprite {
            label: "rock",
            spec: &spec,
            facing: Facing::South,
            stack: None,
            variant_seed: 0,
        };
        let size = TargetSize::new(32, 32).unwrap();

        let first = renderer.render(&subject, size, 1.0).unwrap();
        let second = renderer.render(&subject, size, 1.0).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
        assert_eq!(first.dimensions(), (32, 32));
    }

    #[test]
    fn test_sprite_render_fills_target() {
        let dir = tempdir().unwrap();
        write_texture(&dir, "slab.png", Rgba([10, 20, 30, 255]));
        let mut renderer = Renderer::new(TextureStore::new(dir.path()));

        let spec = sprite_spec("slab.png");
        let subject = RenderSubject::Sprite {
            label: "slab",
            spec: &spec,
            facing: Facing::South,
            stack: None,
            variant_seed: 0,
        };
        let buffer = renderer
            .render(&subject, TargetSize::new(8, 16).unwrap(), 1.0)
            .unwrap();

        // Stretched to fill, so every pixel carries the texture color
        assert!(buffer.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_missing_texture_restores_target_slot() {
        let dir = tempdir().unwrap();
        let mut renderer = Renderer::new(TextureStore::new(dir.path()));

        let spec = sprite_spec("ghost.png");
        let subject = RenderSubject::Sprite {
            label: "ghost",
            spec: &spec,
            facing: Facing::South,
            stack: None,
            variant_seed: 0,
        };
        let err = renderer
            .render(&subject, TargetSize::new(8, 8).unwrap(), 1.0)
            .unwrap_err();

        assert!(matches!(err, CaptureError::NoTexture(label) if label == "ghost"));
        // The early error exit still released the target and restored the slot
        assert_eq!(renderer.pool().outstanding(), 0);
        assert_eq!(renderer.pool().active(), None);
    }

    #[test]
    fn test_portrait_render_copies_cache_output() {
        let dir = tempdir().unwrap();
        // 8x8 texture, opaque 4x4 center
        let mut image = RgbaImage::new(8, 8);
        for y in 2..6 {
            for x in 2..6 {
                image.put_pixel(x, y, Rgba([50, 60, 70, 255]));
            }
        }
        image.save(dir.path().join("body.png")).unwrap();
        let mut renderer = Renderer::new(TextureStore::new(dir.path()));

        let subject = RenderSubject::Portrait {
            entity_id: 9,
            label: "pawn",
            layers: vec![PortraitLayer::full(PathBuf::from("body.png"))],
            facing: Facing::South,
            mirror_west: true,
        };
        let buffer = renderer
            .render(&subject, TargetSize::new(32, 32).unwrap(), 1.0)
            .unwrap();

        assert!(!is_too_big(&buffer));
        assert_eq!(*buffer.get_pixel(16, 16), Rgba([50, 60, 70, 255]));
        assert_eq!(buffer.get_pixel(0, 0)[3], 0);
    }
}
