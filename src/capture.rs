//! Capture orchestration and the adaptive-zoom fit loop
//!
//! A capture session walks the entities on a cell, renders each one
//! off-screen, and hands back encoded exports. Portrait subjects go through
//! the fit loop; sprite subjects render once, unconditionally.

use image::RgbaImage;
use std::path::Path;

use crate::error::CaptureError;
use crate::export::{derive_filename, encode_png, ExportRecord};
use crate::graphic::ProviderRegistry;
use crate::portrait::PortraitLayer;
use crate::render::{is_too_big, RenderSubject, Renderer};
use crate::scene::{Entity, EntityKind, Scene};
use crate::target::TargetSize;
use crate::texture::TextureStore;

/// Zoom multiplier applied on every oversized retry.
pub const ZOOM_DECAY: f32 = 0.95;

/// Upper bound on fit retries. Zoom has decayed below 0.04 by then, so a
/// subject that still clips is treated as unfittable.
pub const MAX_FIT_ATTEMPTS: u32 = 64;

/// Destination for user-facing capture feedback (the in-game message line).
pub trait MessageSink {
    fn success(&mut self, text: String);
    fn warning(&mut self, text: String);
}

/// Sink printing to stdout/stderr, used by the CLI.
pub struct ConsoleMessages;

impl MessageSink for ConsoleMessages {
    fn success(&mut self, text: String) {
        println!("{text}");
    }

    fn warning(&mut self, text: String) {
        eprintln!("Warning: {text}");
    }
}

/// Sink collecting messages for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectedMessages {
    pub successes: Vec<String>,
    pub warnings: Vec<String>,
}

impl MessageSink for CollectedMessages {
    fn success(&mut self, text: String) {
        self.successes.push(text);
    }

    fn warning(&mut self, text: String) {
        self.warnings.push(text);
    }
}

/// Render a portrait subject, shrinking the zoom geometrically until the
/// content no longer touches the target border.
///
/// Sprite subjects pass through with a single unconditional render.
pub fn capture_with_fit(
    renderer: &mut Renderer,
    subject: &RenderSubject<'_>,
    size: TargetSize,
) -> Result<RgbaImage, CaptureError> {
    if !subject.is_portrait() {
        return renderer.render(subject, size, 1.0);
    }

    let mut zoom = 1.0f32;
    for _ in 0..MAX_FIT_ATTEMPTS {
        let buffer = renderer.render(subject, size, zoom)?;
        if !is_too_big(&buffer) {
            return Ok(buffer);
        }
        log::info!(
            "render too big for {} at zoom {:.3}, recreating",
            subject.label(),
            zoom
        );
        zoom *= ZOOM_DECAY;
    }
    Err(CaptureError::FitNotReached {
        label: subject.label().to_string(),
        attempts: MAX_FIT_ATTEMPTS,
    })
}

/// One interactive capture invocation: renderer state plus the capability
/// registry for externally-defined subject subtypes.
pub struct CaptureSession {
    renderer: Renderer,
    registry: ProviderRegistry,
}

impl CaptureSession {
    pub fn new(store: TextureStore) -> Self {
        Self {
            renderer: Renderer::new(store),
            registry: ProviderRegistry::with_builtin(),
        }
    }

    pub fn with_registry(store: TextureStore, registry: ProviderRegistry) -> Self {
        Self {
            renderer: Renderer::new(store),
            registry,
        }
    }

    /// Acquired-but-unreleased off-screen targets; zero between captures.
    pub fn outstanding_targets(&self) -> usize {
        self.renderer.pool().outstanding()
    }

    /// Capture every entity on `cell`, writing exports under `out_dir`.
    ///
    /// Failures are isolated per entity: a failed capture or write warns
    /// through the sink and the rest of the batch continues. Returns the
    /// number of files written.
    pub fn capture_cell(
        &mut self,
        scene: &Scene,
        cell: [i32; 2],
        out_dir: &Path,
        sink: &mut dyn MessageSink,
    ) -> usize {
        let mut saved = 0;
        for entity in scene.entities_at(cell) {
            match self.capture_entity(entity, out_dir) {
                Ok(record) => match record.write() {
                    Ok(()) => {
                        saved += 1;
                        sink.success(format!(
                            "{} saved to {}",
                            entity.label,
                            record.path.display()
                        ));
                    }
                    Err(e) => sink.warning(format!("failed to save {}: {e}", entity.label)),
                },
                Err(e) => sink.warning(e.to_string()),
            }
        }
        saved
    }

    /// Capture one entity: derive its subject and target size, render with
    /// fit, and encode the PNG. Nothing is written yet.
    pub fn capture_entity(
        &mut self,
        entity: &Entity,
        out_dir: &Path,
    ) -> Result<ExportRecord, CaptureError> {
        let (subject, size) = self.subject_for(entity)?;
        let buffer = capture_with_fit(&mut self.renderer, &subject, size)?;
        let path = out_dir.join(derive_filename(entity));
        Ok(ExportRecord::new(path, encode_png(&buffer)?))
    }

    /// Pick the rendering path and target size for an entity.
    ///
    /// Pawns and corpses are portrait subjects; a capability probe may
    /// supply a custom mesh and texture instead of the portrait spec.
    /// Items are sprite subjects, with the no-texture condition detected
    /// before any rendering is attempted.
    fn subject_for<'e>(
        &self,
        entity: &'e Entity,
    ) -> Result<(RenderSubject<'e>, TargetSize), CaptureError> {
        match entity.kind {
            EntityKind::Pawn | EntityKind::Corpse => {
                // A provider's texture is already resolved per facing, so it
                // must not be mirrored again for west.
                let (mesh, layers, mirror_west) =
                    if let Some(source) = self.registry.resolve(entity) {
                        let layers =
                            vec![PortraitLayer::full(source.texture(entity.facing).to_path_buf())];
                        (source.mesh(entity.facing), layers, false)
                    } else if let Some(spec) = &entity.portrait {
                        (spec.mesh, spec.layers.clone(), true)
                    } else {
                        return Err(CaptureError::NoTexture(entity.label.clone()));
                    };
                let subject = RenderSubject::Portrait {
                    entity_id: entity.id,
                    label: &entity.label,
                    layers,
                    facing: entity.facing,
                    mirror_west,
                };
                Ok((subject, TargetSize::from_mesh(mesh)?))
            }
            EntityKind::Item => {
                let spec = entity
                    .graphic
                    .as_ref()
                    .ok_or_else(|| CaptureError::NoTexture(entity.label.clone()))?;
                let seed = entity.override_graphic_index.unwrap_or(entity.id);
                let path = spec
                    .texture_for(entity.facing, entity.stack.as_ref(), seed)
                    .ok_or_else(|| CaptureError::NoTexture(entity.label.clone()))?;
                if self.renderer.store().get(path).is_err() {
                    return Err(CaptureError::NoTexture(entity.label.clone()));
                }
                let subject = RenderSubject::Sprite {
                    label: &entity.label,
                    spec,
                    facing: entity.facing,
                    stack: entity.stack.as_ref(),
                    variant_seed: seed,
                };
                Ok((subject, TargetSize::from_mesh(spec.mesh)?))
            }
        }
    }
}
