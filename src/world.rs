//! World and landmass records, path requests and layer names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Point, Rect};
use crate::paint::LayerKey;

/// Raster layer and weight channel names.
pub mod layers {
    pub const MOUNTAINS: &str = "mountains";
    pub const VOLCANOES: &str = "volcanoes";
    pub const RAVINES: &str = "ravines";
    pub const RIVERS: &str = "rivers";
    pub const SEA: &str = "sea";
    pub const LAND: &str = "land";
    pub const RAIN: &str = "rain";
    pub const LANDMASS: &str = "landmass";
    /// Smooth noise
    pub const NOISE_PERLIN: &str = "noise-perlin";
    /// Rough fractal cell noise
    pub const NOISE_VORONOI: &str = "noise-voronoi";
    pub const SEA_CURRENT: &str = "sea-current";

    /// Weight channels of the world graph, fixed when tectonics are created.
    pub const GRAPH_CHANNELS: [&str; 7] =
        [MOUNTAINS, RAVINES, RIVERS, VOLCANOES, LAND, SEA, SEA_CURRENT];

    /// Layers carried into the next epoch untouched.
    pub const EPOCH_CARRY: [&str; 6] = [MOUNTAINS, RAVINES, RIVERS, VOLCANOES, SEA, RAIN];
}

/// A generated world. Layers and graphs hang off `(id, epoch)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub id: String,
    pub name: String,
    pub epoch: u32,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
}

impl World {
    /// Deterministic id for a world name.
    pub fn id_for_name(name: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Key of a raster layer in the current epoch.
    pub fn layer(&self, name: &str) -> LayerKey {
        LayerKey::new(&self.id, self.epoch, name)
    }

    /// Default maximum path length when a request gives none.
    pub fn default_max_dist(&self) -> f64 {
        (self.width + self.height) as f64 / 2.0 / 3.0
    }
}

/// One connected area of land found by the sea pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmass {
    pub world_id: String,
    pub id: String,
    pub epoch: u32,
    /// Pixel count
    pub size: u64,
    /// Colour in the landmass layer: `(r, g)` split from a 16 bit counter
    pub color: (u8, u8),
    /// First pixel reached in a row-major scan
    pub first: Point,
}

/// Rough outline for a path: where it starts, where it ends and how far it
/// may run. Missing ends are picked at random.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSpec {
    pub from: Option<Point>,
    pub to: Option<Point>,
    pub max_dist: Option<f64>,
}

impl PathSpec {
    pub fn between(from: Point, to: Point, max_dist: f64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            max_dist: Some(max_dist),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_id_is_stable() {
        let a = World::id_for_name("pangaea");
        assert_eq!(a, World::id_for_name("pangaea"));
        assert_ne!(a, World::id_for_name("gondwana"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_default_max_dist() {
        let world = World {
            id: World::id_for_name("w"),
            name: "w".into(),
            epoch: 0,
            seed: 1,
            width: 900,
            height: 600,
        };
        assert_eq!(world.default_max_dist(), 250.0);
        assert_eq!(world.bounds(), Rect::new(0, 0, 900, 600));
    }
}
