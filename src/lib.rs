//! World generation library
//!
//! Builds worlds on a weighted planar graph: features are routed over the
//! graph, drawn onto raster layers, composited into heightmaps and then
//! given seas, currents and rain.

pub mod climate;
pub mod dice;
pub mod editor;
pub mod epoch;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod heightmap;
pub mod paint;
pub mod pathgraph;
pub mod planar;
pub mod seeds;
pub mod settings;
pub mod store;
pub mod subdivision;
pub mod terrain;
pub mod tilemap;
pub mod world;

pub use editor::Editor;
pub use error::{GenesisError, Result};
pub use settings::Settings;
pub use world::{Landmass, PathSpec, World};
