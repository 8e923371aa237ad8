//! Heightmaps composited from the terrain layers.
//!
//! A heightmap is the weighted sum of the red channel of each terrain and
//! noise layer, clamped to 0..=255 and then smoothed.

use std::collections::HashMap;

use image::GrayImage;
use log::debug;
use rayon::prelude::*;

use crate::error::{fan_in, Result};
use crate::geometry::Rect;
use crate::paint::{merge, smooth_gray, Canvas, RasterStore};
use crate::settings::HeightmapWeights;
use crate::world::{layers, World};

/// Layers and their weights, in merge order.
fn weighted_layers(weights: &HeightmapWeights) -> [(&'static str, f64); 5] {
    [
        (layers::MOUNTAINS, weights.mountains),
        (layers::RAVINES, weights.ravines),
        (layers::RIVERS, weights.rivers),
        (layers::NOISE_PERLIN, weights.noise_perlin),
        (layers::NOISE_VORONOI, weights.noise_voronoi),
    ]
}

/// Heightmap of `area` in the world's current epoch. Layers never saved
/// count as flat.
pub fn composite(
    world: &World,
    rasters: &dyn RasterStore,
    weights: &HeightmapWeights,
    area: Rect,
) -> Result<GrayImage> {
    let wanted: Vec<(&str, f64)> = weighted_layers(weights)
        .into_iter()
        .filter(|(_, w)| *w != 0.0)
        .collect();

    let loaded: Vec<Result<(Canvas, f64)>> = wanted
        .par_iter()
        .map(|(name, w)| {
            let canvas = rasters.canvas(&world.layer(name), world.width, world.height)?;
            Ok((canvas, *w))
        })
        .collect();
    let loaded = fan_in(loaded)?;

    let refs: Vec<(&Canvas, f64)> = loaded.iter().map(|(c, w)| (c, *w)).collect();
    let merged = merge(area, &refs);
    debug!(
        "heightmap of world {} epoch {} over {:?} from {} layers",
        world.name,
        world.epoch,
        area,
        refs.len()
    );
    Ok(smooth_gray(&merged, weights.smoothing))
}

/// Heightmaps already composited this session, keyed by world, epoch and
/// area.
#[derive(Debug, Default)]
pub struct HeightmapCache {
    entries: HashMap<(String, u32, Rect), GrayImage>,
}

impl HeightmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached heightmap of `area`, compositing it on a miss.
    pub fn get_or_composite(
        &mut self,
        world: &World,
        rasters: &dyn RasterStore,
        weights: &HeightmapWeights,
        area: Rect,
    ) -> Result<GrayImage> {
        let key = (world.id.clone(), world.epoch, area);
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }
        let image = composite(world, rasters, weights, area)?;
        self.entries.insert(key, image.clone());
        Ok(image)
    }

    /// Forget every heightmap of `world_id`.
    pub fn invalidate(&mut self, world_id: &str) {
        self.entries.retain(|(id, _, _), _| id != world_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
