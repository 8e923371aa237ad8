//! Raster layers: drawing, compositing and storage.
//!
//! Every layer is an RGBA image addressed by world, epoch and layer name.
//! Height-like layers carry their value in the red channel; the sea layer
//! keeps water temperature in blue and the rain layer keeps rainfall in blue.

mod canvas;
mod store;

use std::fmt;

use image::{Rgba, RgbaImage};
use noise::{NoiseFn, Perlin, Seedable};
use serde::{Deserialize, Serialize};

pub use canvas::{grey, merge, smooth_gray, Canvas, Mode};
pub use store::{FsRasterStore, MemoryRasterStore, RasterStore};

/// Address of a raster layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerKey {
    pub world_id: String,
    pub epoch: u32,
    pub name: String,
}

impl LayerKey {
    pub fn new(world_id: &str, epoch: u32, name: &str) -> Self {
        Self {
            world_id: world_id.to_string(),
            epoch,
            name: name.to_string(),
        }
    }

    /// Same layer name in another epoch.
    pub fn at_epoch(&self, epoch: u32) -> Self {
        Self {
            epoch,
            ..self.clone()
        }
    }

    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.world_id, self.epoch, self.name)
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// Fractal Brownian motion, normalised to roughly -1..1.
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

/// Pixels per noise period at a scale of 1.
const PERLIN_TILE: f64 = 500.0;

/// Greyscale perlin noise. Larger `scale` gives busier noise.
pub fn perlin_canvas(key: LayerKey, width: u32, height: u32, scale: f64, seed: u64) -> Canvas {
    let noise = Perlin::new(1).set_seed(seed as u32);
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let image = RgbaImage::from_fn(width, height, |x, y| {
        let nx = x as f64 / PERLIN_TILE * scale * 4.0;
        let ny = y as f64 / PERLIN_TILE * scale * 4.0;
        let v = (fbm(&noise, nx, ny, 4, 0.5, 2.0) + 1.0) / 2.0;
        let v = (v * 255.0).clamp(0.0, 255.0) as u8;
        Rgba([v, v, v, 255])
    });

    Canvas::from_image(key, image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_key_stem() {
        let key = LayerKey::new("abc", 3, "mountains");
        assert_eq!(key.file_stem(), "abc-3-mountains");
        assert_eq!(key.at_epoch(4).to_string(), "abc-4-mountains");
    }

    #[test]
    fn test_perlin_canvas_is_seeded() {
        let a = perlin_canvas(LayerKey::new("w", 0, "n"), 64, 48, 1.0, 7);
        let b = perlin_canvas(LayerKey::new("w", 0, "n"), 64, 48, 1.0, 7);
        let c = perlin_canvas(LayerKey::new("w", 0, "n"), 64, 48, 1.0, 8);
        assert_eq!(a.image(), b.image());
        assert_ne!(a.image(), c.image());
        assert_eq!((a.width(), a.height()), (64, 48));
    }
}
