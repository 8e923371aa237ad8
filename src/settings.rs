//! Tunables for every generation step.
//!
//! The defaults suit worlds of roughly 1000x1000 pixels. Much larger or much
//! smaller worlds will probably need the dice and widths scaled to match.
//! Settings load from TOML; any key left out keeps its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::error::Result;
use crate::geometry::Heading;

/// How strongly each raster layer contributes to the composited heightmap.
///
/// Values multiply the layer's 8-bit red channel; ravine and river weights
/// are usually negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightmapWeights {
    pub mountains: f64,
    pub ravines: f64,
    pub rivers: f64,
    pub noise_perlin: f64,
    pub noise_voronoi: f64,
    /// Smoothing radius applied after the merge
    pub smoothing: u32,
}

impl Default for HeightmapWeights {
    fn default() -> Self {
        Self {
            mountains: 0.6,
            ravines: -0.1,
            rivers: 0.0,
            noise_perlin: 0.5,
            noise_voronoi: 0.5,
            smoothing: 3,
        }
    }
}

/// Path graph weights. Higher weights push later paths away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphWeights {
    /// Initial weight of every vertex on every channel
    pub default: i64,
    /// Added to vertices near the world border
    pub edge: i64,
    pub mountain: i64,
    pub ravine: i64,
    pub river: i64,
    pub land: i64,
    pub sea: i64,
    /// Minimum spacing between subdivision sites
    pub site_spacing: i32,
}

impl Default for GraphWeights {
    fn default() -> Self {
        Self {
            default: 200,
            edge: 200,
            mountain: 500,
            ravine: 30,
            river: 30,
            land: 1000,
            sea: 1000,
            site_spacing: 25,
        }
    }
}

/// Fractal cell noise mixed with perlin noise so maps get both sharp and
/// round edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalNoise {
    /// Fraction of cells raised
    pub segments: f64,
    /// Neighbour rings grown around each raised cell
    pub iterations: usize,
    /// Smoothing radius for the finished noise layer
    pub smoothing: u32,
}

impl Default for FractalNoise {
    fn default() -> Self {
        Self {
            segments: 0.25,
            iterations: 3,
            smoothing: 6,
        }
    }
}

/// Sea temperatures, stored in the sea layer's blue channel.
///
/// Zero is reserved for land so `very_cold` must stay above it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OceanSettings {
    pub very_cold: u8,
    pub cold: u8,
    pub warm: u8,
    pub very_warm: u8,
    /// Cell size of the spatial grid used to build the current graph
    pub current_grid_size: i32,
    /// Cross-cell edges kept per pair of neighbouring cells
    pub current_links: usize,
    /// Weight added to a current's vertices once it is accepted
    pub current_reuse_weight: i64,
    pub current_width: u32,
    /// Chance that a current carries cold water rather than warm
    pub cold_current_prob: f64,
}

impl Default for OceanSettings {
    fn default() -> Self {
        Self {
            very_cold: 100,
            cold: 105,
            warm: 125,
            very_warm: 135,
            current_grid_size: 100,
            current_links: 2,
            current_reuse_weight: 10,
            current_width: 30,
            cold_current_prob: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountainSettings {
    /// Ellipse radius
    pub size: Dice,
    pub per_step: Dice,
    /// Pixels skipped between steps along a segment
    pub step: Dice,
    pub range_width: i32,
}

impl Default for MountainSettings {
    fn default() -> Self {
        Self {
            size: Dice::new(5, &[6, 6]),
            per_step: Dice::new(5, &[10]),
            step: Dice::new(4, &[15]),
            range_width: 40,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolcanoSettings {
    pub cone: Dice,
    pub caldera: Dice,
    pub step: Dice,
    pub range_width: i32,
}

impl Default for VolcanoSettings {
    fn default() -> Self {
        Self {
            cone: Dice::new(8, &[6, 6]),
            caldera: Dice::new(3, &[5]),
            step: Dice::new(24, &[20]),
            range_width: 45,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainSettings {
    /// Prevailing winds from the north pole to the south pole, one per band
    pub prevailing_winds: Vec<Heading>,
    pub storm_init_moisture: Dice,
    pub gain_very_warm_sea: Dice,
    pub gain_warm_sea: Dice,
    pub gain_cold_sea: Dice,
    pub gain_very_cold_sea: Dice,
    pub loss_over_land: Dice,
    pub loss_over_mountains: Dice,
    /// Worker threads used to walk storms
    pub workers: usize,
}

impl Default for RainSettings {
    fn default() -> Self {
        Self {
            prevailing_winds: vec![
                Heading::East,      // polar
                Heading::West,      // temperate
                Heading::NorthEast, // tropical
                Heading::SouthWest, // tropical
                Heading::West,      // temperate
                Heading::East,      // polar
            ],
            storm_init_moisture: Dice::fixed(0),
            gain_very_warm_sea: Dice::new(10, &[10, 5]),
            gain_warm_sea: Dice::new(5, &[5, 5]),
            gain_cold_sea: Dice::new(2, &[2, 2]),
            gain_very_cold_sea: Dice::new(-10, &[5]),
            loss_over_land: Dice::new(6, &[3, 3, 10]),
            loss_over_mountains: Dice::new(1, &[2, 2]),
            workers: 10,
        }
    }
}

/// Every tunable of the generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub heightmap: HeightmapWeights,
    pub graph: GraphWeights,
    pub fractal_noise: FractalNoise,
    pub ocean: OceanSettings,
    pub mountains: MountainSettings,
    pub volcanoes: VolcanoSettings,
    pub ravine_width: Dice,
    pub river_width: Dice,
    pub rain: RainSettings,
    /// Worlds are never created smaller than this on either axis
    pub min_world_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heightmap: HeightmapWeights::default(),
            graph: GraphWeights::default(),
            fractal_noise: FractalNoise::default(),
            ocean: OceanSettings::default(),
            mountains: MountainSettings::default(),
            volcanoes: VolcanoSettings::default(),
            ravine_width: Dice::new(2, &[10, 10]),
            river_width: Dice::new(1, &[4, 4]),
            rain: RainSettings::default(),
            min_world_size: 500,
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            min_world_size = 64

            [ocean]
            very_cold = 90

            [mountains.size]
            add = 2
            rolls = [3]

            [rain]
            prevailing_winds = ["north", "southwest"]
        "#;
        let settings = Settings::from_toml_str(text).unwrap();
        assert_eq!(settings.min_world_size, 64);
        assert_eq!(settings.ocean.very_cold, 90);
        assert_eq!(settings.ocean.warm, 125);
        assert_eq!(settings.mountains.size, Dice::new(2, &[3]));
        assert_eq!(settings.mountains.range_width, 40);
        assert_eq!(
            settings.rain.prevailing_winds,
            vec![Heading::North, Heading::SouthWest]
        );
    }

    #[test]
    fn test_bad_toml_is_serialization_error() {
        let err = Settings::from_toml_str("min_world_size = \"big\"").unwrap_err();
        assert!(matches!(err, crate::error::GenesisError::Serialization(_)));
    }

    #[test]
    fn test_default_temperatures_leave_zero_for_land() {
        let ocean = OceanSettings::default();
        assert!(ocean.very_cold > 0);
        assert!(ocean.very_cold < ocean.cold && ocean.cold < ocean.warm && ocean.warm < ocean.very_warm);
    }
}
