//! PNG export and filename derivation
//!
//! The derived name encodes what the capture shows: a pawn's facing, an
//! item's stack state or variant index, and so on. Derivation is pure -
//! same entity state, same name - and a repeat capture silently overwrites
//! the previous file.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;
use crate::graphic::GraphicClass;
use crate::scene::{Entity, EntityKind};

/// The final artifact of one capture: where it goes and the encoded bytes.
/// Created once, written once.
pub struct ExportRecord {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl ExportRecord {
    pub fn new(path: PathBuf, bytes: Vec<u8>) -> Self {
        Self { path, bytes }
    }

    /// Write the PNG to disk.
    ///
    /// Goes through a sibling temp file and an atomic rename so an
    /// interrupted write cannot leave a truncated PNG behind posing as a
    /// successful capture.
    pub fn write(&self) -> Result<(), CaptureError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("png.tmp");
        fs::write(&tmp, &self.bytes)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Encode a raster buffer as PNG bytes.
pub fn encode_png(buffer: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        buffer.as_raw(),
        buffer.width(),
        buffer.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Reduce a display label to an ASCII-safe filename stem.
pub fn sanitize_label(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "entity".to_string()
    } else {
        stem
    }
}

/// Derive the output filename for an entity.
///
/// Pawns and corpses always carry their facing. Items start from the bare
/// label; a multi-facing graphic appends the facing, stack state replaces
/// that with a stack suffix, and a random-variant graphic replaces both
/// with the variant index - last trait wins, matching the engine's
/// dispatch order.
pub fn derive_filename(entity: &Entity) -> String {
    let label = sanitize_label(&entity.label);
    match entity.kind {
        EntityKind::Pawn | EntityKind::Corpse => {
            format!("{}_{}.png", label, entity.facing.label())
        }
        EntityKind::Item => {
            let mut name = format!("{label}.png");
            if let Some(spec) = &entity.graphic {
                if spec.is_multi_facing() {
                    name = format!("{}_{}.png", label, entity.facing.label());
                }
                if let Some(stack) = &entity.stack {
                    if stack.limit > 1 {
                        name = if stack.count == 1 {
                            format!("{label}.png")
                        } else if stack.count == stack.limit {
                            format!("{label}_full_stack.png")
                        } else {
                            format!("{label}_stack.png")
                        };
                    }
                }
                if let GraphicClass::Random { variants } = &spec.class {
                    if !variants.is_empty() {
                        let index =
                            entity.override_graphic_index.unwrap_or(entity.id) % variants.len() as u32;
                        name = format!("{label}_{index}.png");
                    }
                }
            }
            name
        }
    }
}

/// Resolve the output directory for this invocation: the explicit flag if
/// given, else the user's desktop, else the save-data fallback. Resolved
/// once and threaded through the capture calls.
pub fn resolve_output_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        let desktop = Path::new(&home).join("Desktop");
        if desktop.is_dir() {
            return desktop;
        }
    }
    PathBuf::from("captures")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphic::{FacingTextures, GraphicSpec};
    use crate::scene::{Facing, StackState};
    use image::Rgba;
    use tempfile::tempdir;

    fn entity(kind: EntityKind, label: &str) -> Entity {
        Entity {
            id: 11,
            label: label.to_string(),
            kind,
            cell: [0, 0],
            facing: Facing::North,
            stack: None,
            graphic: None,
            portrait: None,
            vehicle: None,
            override_graphic_index: None,
        }
    }

    fn single_graphic() -> GraphicSpec {
        GraphicSpec {
            mesh: [1.0, 1.0],
            class: GraphicClass::Single {
                texture: PathBuf::from("t.png"),
            },
            tint: None,
            mask: None,
        }
    }

    #[test]
    fn test_pawn_filename_carries_facing() {
        let mut e = entity(EntityKind::Pawn, "Dusty");
        assert_eq!(derive_filename(&e), "Dusty_north.png");
        e.facing = Facing::West;
        assert_eq!(derive_filename(&e), "Dusty_west.png");
        e.kind = EntityKind::Corpse;
        assert_eq!(derive_filename(&e), "Dusty_west.png");
    }

    #[test]
    fn test_item_filename_plain() {
        let mut e = entity(EntityKind::Item, "Chunk");
        e.graphic = Some(single_graphic());
        assert_eq!(derive_filename(&e), "Chunk.png");
    }

    #[test]
    fn test_item_stack_suffixes() {
        // Stack limit 75, the engine's common stackable size
        let mut e = entity(EntityKind::Item, "Steel");
        e.graphic = Some(single_graphic());

        e.stack = Some(StackState {
            count: 75,
            limit: 75,
        });
        assert_eq!(derive_filename(&e), "Steel_full_stack.png");

        e.stack = Some(StackState {
            count: 40,
            limit: 75,
        });
        assert_eq!(derive_filename(&e), "Steel_stack.png");

        e.stack = Some(StackState {
            count: 1,
            limit: 75,
        });
        assert_eq!(derive_filename(&e), "Steel.png");
    }

    #[test]
    fn test_item_unstackable_limit_one_has_no_suffix() {
        let mut e = entity(EntityKind::Item, "Bed");
        e.graphic = Some(single_graphic());
        e.stack = Some(StackState { count: 1, limit: 1 });
        assert_eq!(derive_filename(&e), "Bed.png");
    }

    #[test]
    fn test_item_multi_facing_filename() {
        let mut e = entity(EntityKind::Item, "Door");
        e.graphic = Some(GraphicSpec {
            mesh: [1.0, 1.0],
            class: GraphicClass::Multi {
                textures: FacingTextures {
                    north: PathBuf::from("n.png"),
                    east: PathBuf::from("e.png"),
                    south: PathBuf::from("s.png"),
                    west: PathBuf::from("w.png"),
                },
            },
            tint: None,
            mask: None,
        });
        e.facing = Facing::East;
        assert_eq!(derive_filename(&e), "Door_east.png");
    }

    #[test]
    fn test_item_random_variant_filename() {
        let mut e = entity(EntityKind::Item, "Rock");
        e.graphic = Some(GraphicSpec {
            mesh: [1.0, 1.0],
            class: GraphicClass::Random {
                variants: vec![
                    PathBuf::from("a.png"),
                    PathBuf::from("b.png"),
                    PathBuf::from("c.png"),
                ],
            },
            tint: None,
            mask: None,
        });
        // id 11 % 3 variants
        assert_eq!(derive_filename(&e), "Rock_2.png");
        e.override_graphic_index = Some(4);
        assert_eq!(derive_filename(&e), "Rock_1.png");
    }

    #[test]
    fn test_random_variant_wins_over_stack_suffix() {
        let mut e = entity(EntityKind::Item, "Gravel");
        e.graphic = Some(GraphicSpec {
            mesh: [1.0, 1.0],
            class: GraphicClass::Random {
                variants: vec![PathBuf::from("a.png"), PathBuf::from("b.png")],
            },
            tint: None,
            mask: None,
        });
        e.stack = Some(StackState {
            count: 30,
            limit: 75,
        });
        assert_eq!(derive_filename(&e), "Gravel_1.png");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Steel"), "Steel");
        assert_eq!(sanitize_label("wood log"), "wood_log");
        assert_eq!(sanitize_label("Mü/ller"), "M__ller");
        assert_eq!(sanitize_label(""), "entity");
    }

    #[test]
    fn test_encode_png_round_trips() {
        let mut buffer = RgbaImage::new(2, 2);
        buffer.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        buffer.put_pixel(1, 1, Rgba([0, 0, 255, 128]));

        let bytes = encode_png(&buffer).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_export_record_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        let record = ExportRecord::new(path.clone(), encode_png(&RgbaImage::new(1, 1)).unwrap());

        record.write().unwrap();
        assert!(path.is_file());
        assert!(!dir.path().join("out.png.tmp").exists());

        // Overwrite silently on a second write
        record.write().unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_export_record_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.png");
        let record = ExportRecord::new(path.clone(), encode_png(&RgbaImage::new(1, 1)).unwrap());
        record.write().unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_resolve_output_dir_explicit_wins() {
        let dir = resolve_output_dir(Some(Path::new("/tmp/shots")));
        assert_eq!(dir, PathBuf::from("/tmp/shots"));
    }
}
