//! thingshot - debug capture tool for simulation-game entities
//!
//! Given a scene cell, this library:
//! - renders each entity on the cell into an off-screen RGBA target sized
//!   from its mesh bounds (256 px per world unit)
//! - for portrait subjects, retries at a geometrically shrinking zoom until
//!   the content no longer touches the target border
//! - encodes the result as PNG under a filename derived from the entity's
//!   category, orientation, and stack state

pub mod capture;
pub mod cli;
pub mod color;
pub mod error;
pub mod export;
pub mod graphic;
pub mod portrait;
pub mod render;
pub mod scene;
pub mod target;
pub mod texture;
