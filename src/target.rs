//! Off-screen render targets
//!
//! Models the engine's temporary render-target pool: one attempt acquires a
//! transparent target, becomes the active target, and must restore whatever
//! was active before it - on every exit path, including early failures.
//! `TempTarget` is a scoped guard whose `Drop` performs the restore and
//! release, and the pool counts outstanding targets so leak checks stay
//! cheap.

use image::RgbaImage;
use std::cell::Cell;
use std::rc::Rc;

use crate::error::CaptureError;

/// Fixed pixel-per-world-unit factor for capture targets.
pub const PIXELS_PER_UNIT: f32 = 256.0;

/// Pixel dimensions of a render target. Both dimensions are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidSize {
                width: width as i64,
                height: height as i64,
            });
        }
        Ok(Self { width, height })
    }

    /// Derive a target size from a mesh bounding box in world units.
    pub fn from_mesh(mesh: [f32; 2]) -> Result<Self, CaptureError> {
        let width = (mesh[0] * PIXELS_PER_UNIT) as i64;
        let height = (mesh[1] * PIXELS_PER_UNIT) as i64;
        if width <= 0 || height <= 0 {
            return Err(CaptureError::InvalidSize { width, height });
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}

pub type TargetId = u64;

#[derive(Default)]
struct PoolState {
    outstanding: Cell<usize>,
    next_id: Cell<TargetId>,
    active: Cell<Option<TargetId>>,
}

/// Pool of temporary off-screen targets with a single active-target slot.
#[derive(Default, Clone)]
pub struct TargetPool {
    state: Rc<PoolState>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a transparent-cleared target of the given size and make it
    /// the active target, saving the previous one for restore.
    pub fn acquire(&self, size: TargetSize) -> TempTarget {
        let id = self.state.next_id.get() + 1;
        self.state.next_id.set(id);
        self.state.outstanding.set(self.state.outstanding.get() + 1);
        let previous = self.state.active.replace(Some(id));
        TempTarget {
            pixels: RgbaImage::new(size.width, size.height),
            previous,
            state: Rc::clone(&self.state),
        }
    }

    /// Number of acquired-but-unreleased targets.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.get()
    }

    /// Currently active target, if any.
    pub fn active(&self) -> Option<TargetId> {
        self.state.active.get()
    }
}

/// A temporary render target, released on drop.
pub struct TempTarget {
    pixels: RgbaImage,
    previous: Option<TargetId>,
    state: Rc<PoolState>,
}

impl TempTarget {
    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Read the target back into a CPU buffer and release it.
    pub fn resolve(mut self) -> RgbaImage {
        std::mem::take(&mut self.pixels)
        // Drop restores the previous active target
    }
}

impl Drop for TempTarget {
    fn drop(&mut self) {
        self.state.active.set(self.previous);
        self.state.outstanding.set(self.state.outstanding.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: u32, h: u32) -> TargetSize {
        TargetSize::new(w, h).unwrap()
    }

    #[test]
    fn test_target_size_rejects_zero_area() {
        assert!(TargetSize::new(0, 4).is_err());
        assert!(TargetSize::new(4, 0).is_err());
        assert!(TargetSize::new(1, 1).is_ok());
    }

    #[test]
    fn test_target_size_from_mesh() {
        let s = TargetSize::from_mesh([1.0, 0.5]).unwrap();
        assert_eq!((s.width, s.height), (256, 128));

        assert!(TargetSize::from_mesh([0.0, 1.0]).is_err());
        assert!(TargetSize::from_mesh([-1.0, 1.0]).is_err());
        assert!(TargetSize::from_mesh([f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_acquire_clears_transparent() {
        let pool = TargetPool::new();
        let mut target = pool.acquire(size(3, 3));
        assert!(target
            .pixels_mut()
            .pixels()
            .all(|p| *p == image::Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_resolve_releases_and_restores() {
        let pool = TargetPool::new();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.active(), None);

        let target = pool.acquire(size(2, 2));
        assert_eq!(pool.outstanding(), 1);
        assert!(pool.active().is_some());

        let buffer = target.resolve();
        assert_eq!(buffer.dimensions(), (2, 2));
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.active(), None);
    }

    #[test]
    fn test_drop_without_resolve_restores() {
        // The early-failure path: target dropped before readback
        let pool = TargetPool::new();
        {
            let _target = pool.acquire(size(2, 2));
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.active(), None);
    }

    #[test]
    fn test_nested_targets_restore_lifo() {
        let pool = TargetPool::new();
        let outer = pool.acquire(size(2, 2));
        let outer_id = pool.active().unwrap();

        {
            let _inner = pool.acquire(size(2, 2));
            assert_ne!(pool.active(), Some(outer_id));
            assert_eq!(pool.outstanding(), 2);
        }
        assert_eq!(pool.active(), Some(outer_id));
        assert_eq!(pool.outstanding(), 1);

        drop(outer);
        assert_eq!(pool.active(), None);
        assert_eq!(pool.outstanding(), 0);
    }
}
