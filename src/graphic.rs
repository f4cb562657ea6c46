//! Sprite graphics: texture selection and material application
//!
//! Mirrors the host engine's graphic classes. A graphic resolves to one
//! texture per capture depending on its class:
//!
//! - `single` - one texture for every facing
//! - `multi` - one texture per cardinal facing
//! - `random` - a variant picked by `seed % variant_count`
//! - `stack` - a sub-graphic picked by stack count (single / partial / full)
//!
//! The resolved texture is always drawn through the graphic's material so
//! color tints and two-color masks survive the capture.

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::color::parse_color;
use crate::error::CaptureError;
use crate::scene::{Entity, Facing, StackState};
use crate::texture::TextureStore;

/// One texture path per cardinal facing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacingTextures {
    pub north: PathBuf,
    pub east: PathBuf,
    pub south: PathBuf,
    pub west: PathBuf,
}

impl FacingTextures {
    pub fn for_facing(&self, facing: Facing) -> &Path {
        match facing {
            Facing::North => &self.north,
            Facing::East => &self.east,
            Facing::South => &self.south,
            Facing::West => &self.west,
        }
    }
}

/// Two-color mask: where the mask is dark, the secondary color replaces the
/// primary tint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSpec {
    pub texture: PathBuf,
    pub color_two: String,
}

/// Graphic class, tagged the way scene files spell it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum GraphicClass {
    Single {
        texture: PathBuf,
    },
    Multi {
        textures: FacingTextures,
    },
    Random {
        variants: Vec<PathBuf>,
    },
    Stack {
        single: PathBuf,
        partial: PathBuf,
        full: PathBuf,
    },
}

/// A flat sprite graphic: mesh footprint, texture class, and material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicSpec {
    /// Mesh bounding size in world units; scaled by 256 px/unit for capture
    pub mesh: [f32; 2],
    #[serde(flatten)]
    pub class: GraphicClass,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mask: Option<MaskSpec>,
}

impl GraphicSpec {
    /// Resolve the texture to draw for the given facing and stack state.
    ///
    /// Stack boundaries follow the engine: count == 1 draws the single-item
    /// sub-graphic, count == limit the full stack, anything between the
    /// partial stack. Returns `None` when no texture can be resolved
    /// (e.g. a random graphic with no variants).
    pub fn texture_for(
        &self,
        facing: Facing,
        stack: Option<&StackState>,
        variant_seed: u32,
    ) -> Option<&Path> {
        match &self.class {
            GraphicClass::Single { texture } => Some(texture),
            GraphicClass::Multi { textures } => Some(textures.for_facing(facing)),
            GraphicClass::Random { variants } => {
                if variants.is_empty() {
                    return None;
                }
                let index = variant_seed as usize % variants.len();
                Some(&variants[index])
            }
            GraphicClass::Stack {
                single,
                partial,
                full,
            } => match stack {
                // count == 1 wins even when limit == 1
                Some(stack) if stack.count == 1 => Some(single),
                Some(stack) if stack.count == stack.limit => Some(full),
                Some(stack) if stack.count > 1 => Some(partial),
                _ => Some(single),
            },
        }
    }

    /// True when this graphic draws a different texture per facing, which
    /// makes the facing part of the derived filename.
    pub fn is_multi_facing(&self) -> bool {
        matches!(self.class, GraphicClass::Multi { .. })
    }
}

/// A graphic's material, ready to apply to a texture.
pub struct Material {
    tint: Rgba<u8>,
    mask: Option<(RgbaImage, Rgba<u8>)>,
}

impl Material {
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// Build the material for a graphic, loading the mask texture if any.
    pub fn resolve(spec: &GraphicSpec, store: &TextureStore) -> Result<Material, CaptureError> {
        let tint = match &spec.tint {
            Some(hex) => parse_color(hex)?,
            None => Self::WHITE,
        };
        let mask = match &spec.mask {
            Some(mask) => {
                let texture = store.get(&mask.texture)?;
                let color_two = parse_color(&mask.color_two)?;
                Some(((*texture).clone(), color_two))
            }
            None => None,
        };
        Ok(Material { tint, mask })
    }

    /// Apply tint and mask to a texture, producing the shaded pixels that
    /// get composited into the render target.
    ///
    /// The mask's red channel interpolates between the primary tint (255)
    /// and the secondary color (0), matching the engine's two-color shader.
    pub fn apply(&self, texture: &RgbaImage) -> RgbaImage {
        if self.tint == Self::WHITE && self.mask.is_none() {
            return texture.clone();
        }

        let (width, height) = texture.dimensions();
        let mask = self.mask.as_ref().map(|(mask, color_two)| {
            // Mask is sampled at texture resolution
            if mask.dimensions() == (width, height) {
                (mask.clone(), *color_two)
            } else {
                (
                    imageops::resize(mask, width, height, imageops::FilterType::Nearest),
                    *color_two,
                )
            }
        });

        let mut shaded = RgbaImage::new(width, height);
        for (x, y, pixel) in texture.enumerate_pixels() {
            let color = match &mask {
                Some((mask, color_two)) => {
                    let m = mask.get_pixel(x, y)[0] as u32;
                    let mut mixed = [0u8; 4];
                    for c in 0..4 {
                        let a = self.tint[c] as u32;
                        let b = color_two[c] as u32;
                        mixed[c] = ((a * m + b * (255 - m)) / 255) as u8;
                    }
                    Rgba(mixed)
                }
                None => self.tint,
            };
            let mut out = [0u8; 4];
            for c in 0..4 {
                out[c] = ((pixel[c] as u32 * color[c] as u32) / 255) as u8;
            }
            shaded.put_pixel(x, y, Rgba(out));
        }
        shaded
    }
}

/// Externally-defined subtype data for vehicle-like entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub mesh: [f32; 2],
    pub textures: FacingTextures,
}

///// A capability-provided graphic source: custom mesh footprint and texture
/// for subjects the base data model does not describe.
pub trait GraphicSource {
    fn mesh(&self, facing: Facing) -> [f32; 2];
    fn texture(&self, facing: Facing) -> &Path;
}

struct VehicleSource<'e>(&'e VehicleSpec);

impl GraphicSource for VehicleSource<'_> {
    fn mesh(&self, _facing: Facing) -> [f32; 2] {
        self.0.mesh
    }

    fn texture(&self, facing: Facing) -> &Path {
        self.0.textures.for_facing(facing)
    }
}

/// A probe inspecting an entity and optionally yielding a custom source.
pub type SourceProbe = for<'e> fn(&'e Entity) -> Option<Box<dyn GraphicSource + 'e>>;

fn vehicle_probe<'e>(entity: &'e Entity) -> Option<Box<dyn GraphicSource + 'e>> {
    entity
        .vehicle
        .as_ref()
        .map(|spec| Box::new(VehicleSource(spec)) as Box<dyn GraphicSource + 'e>)
}

/// Registry of capability probes for optional, externally-defined subject
/// subtypes. Probes run in registration order; the first hit wins.
pub struct ProviderRegistry {
    probes: Vec<SourceProbe>,
}

impl ProviderRegistry {
    /// Registry with the built-in vehicle probe installed.
    pub fn with_builtin() -> Self {
        Self {
            probes: vec![vehicle_probe],
        }
    }

    pub fn register(&mut self, probe: SourceProbe) {
        self.probes.push(probe);
    }

    /// Ask each probe whether it can supply a custom graphic source for
    /// this entity.
    pub fn resolve<'e>(&self, entity: &'e Entity) -> Option<Box<dyn GraphicSource + 'e>> {
        self.probes.iter().find_map(|probe| probe(entity))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
