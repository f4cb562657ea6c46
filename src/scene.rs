//! Scene data model
//!
//! A scene file is the capture tool's stand-in for the live game map: a JSON
//! document listing every entity, its grid cell, facing, and visual state.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::graphic::{GraphicSpec, VehicleSpec};
use crate::portrait::PortraitSpec;

/// One of the four cardinal facings an entity can draw in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    East,
    #[default]
    South,
    West,
}

impl Facing {
    /// Human-readable label used in derived filenames.
    pub fn label(self) -> &'static str {
        match self {
            Facing::North => "north",
            Facing::East => "east",
            Facing::South => "south",
            Facing::West => "west",
        }
    }
}

/// Entity category, which selects the rendering path and filename shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A living character or creature - captured via its composed portrait
    Pawn,
    /// Character remains - captured via the inner pawn's portrait
    Corpse,
    /// A generic object - captured as a flat sprite, single pass
    Item,
}

/// Stack state for stackable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackState {
    pub count: u32,
    pub limit: u32,
}

/// An in-world entity eligible for capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub label: String,
    pub kind: EntityKind,
    pub cell: [i32; 2],
    #[serde(default)]
    pub facing: Facing,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<StackState>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub graphic: Option<GraphicSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub portrait: Option<PortraitSpec>,
    /// Externally-defined subtype data (e.g. a vehicle mod), picked up by
    /// capability probes rather than type-name matching.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vehicle: Option<VehicleSpec>,
    /// Overrides the variant seed for random-variant graphics.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub override_graphic_index: Option<u32>,
}

/// Error loading a scene file
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("cannot read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid scene file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A loaded scene: the set of entities the tool can capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub entities: Vec<Entity>,
}

impl Scene {
    /// Load a scene from a JSON file.
    pub fn load(path: &Path) -> Result<Scene, SceneError> {
        let file = File::open(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All entities occupying the given cell, in scene order.
    pub fn entities_at(&self, cell: [i32; 2]) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.cell == cell)
    }
}
