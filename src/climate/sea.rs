//! Sea and land partition, landmass labelling and sea temperatures.

use std::collections::VecDeque;

use image::{GrayImage, Rgba};
use rand::Rng;

use crate::geometry::{Point, Rect};
use crate::paint::Canvas;
use crate::settings::OceanSettings;
use crate::tilemap::Tilemap;
use crate::world::{Landmass, World};

/// Largest landmass number before numbering starts again from 1.
const MAX_LANDMASS_NUMBER: u32 = 65535;

/// Mark as sea every pixel at or below `sea_level` that connects to the map
/// border through other such pixels. Low ground enclosed by higher ground
/// stays land.
pub fn classify_sea(height: &GrayImage, sea_level: u8) -> Tilemap<bool> {
    let (w, h) = (height.width() as usize, height.height() as usize);
    let mut sea = Tilemap::new_with(w, h, false);
    let mut queue = VecDeque::new();
    let low = |x: usize, y: usize| height.get_pixel(x as u32, y as u32)[0] <= sea_level;

    let seed = |x: usize, y: usize, sea: &mut Tilemap<bool>, queue: &mut VecDeque<(usize, usize)>| {
        if !*sea.get(x, y) && low(x, y) {
            sea.set(x, y, true);
            queue.push_back((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut sea, &mut queue);
        seed(x, h.saturating_sub(1), &mut sea, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut sea, &mut queue);
        seed(w.saturating_sub(1), y, &mut sea, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in sea.neighbors_8(x, y) {
            if !*sea.get(nx, ny) && low(nx, ny) {
                sea.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }

    sea
}

/// Greyscale rendering of a sea mask: 0 for sea, 255 for land. Classifying
/// it again at any level below 255 gives back the same mask.
pub fn mask_image(sea: &Tilemap<bool>) -> GrayImage {
    GrayImage::from_fn(sea.width as u32, sea.height as u32, |x, y| {
        image::Luma([if *sea.get(x as usize, y as usize) { 0 } else { 255 }])
    })
}

/// Number `n` (1-based) of a landmass, wrapped into 16 bits and split into
/// red and green.
fn landmass_colour(n: usize) -> (u8, u8) {
    let mut num = n as u32;
    while num > MAX_LANDMASS_NUMBER {
        num -= MAX_LANDMASS_NUMBER;
    }
    ((num >> 8) as u8, (num & 0xff) as u8)
}

/// Find every 8-connected area of land, in row-major order of first pixel,
/// and paint each into `layer` in its landmass colour.
pub fn label_landmasses<R: Rng>(
    world: &World,
    sea: &Tilemap<bool>,
    layer: &mut Canvas,
    rng: &mut R,
) -> Vec<Landmass> {
    let (w, h) = (sea.width, sea.height);
    let mut seen = Tilemap::new_with(w, h, false);
    let mut found = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if *sea.get(x, y) || *seen.get(x, y) {
                continue;
            }

            let color = landmass_colour(found.len() + 1);
            let paint = Rgba([color.0, color.1, 0, 255]);
            let mut size = 0u64;
            let mut queue = VecDeque::from([(x, y)]);
            seen.set(x, y, true);

            while let Some((cx, cy)) = queue.pop_front() {
                size += 1;
                layer.set(cx as i32, cy as i32, paint);
                for (nx, ny) in sea.neighbors_8(cx, cy) {
                    if !*sea.get(nx, ny) && !*seen.get(nx, ny) {
                        seen.set(nx, ny, true);
                        queue.push_back((nx, ny));
                    }
                }
            }

            found.push(Landmass {
                world_id: world.id.clone(),
                id: uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string(),
                epoch: world.epoch,
                size,
                color,
                first: Point::new(x as i32, y as i32),
            });
        }
    }

    found
}

/// Latitude bands of the sea layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bands {
    pub arctic: i32,
    pub equator_top: i32,
    pub equator_bottom: i32,
}

impl Bands {
    pub fn new(height: i32, equator_width: i32, arctic_width: i32) -> Self {
        Self {
            arctic: arctic_width,
            equator_top: height / 2 - equator_width / 2,
            equator_bottom: height / 2 + equator_width / 2,
        }
    }
}

/// Temperatures of sea water, kept in the blue channel.
struct Water {
    very_cold: Rgba<u8>,
    cold: Rgba<u8>,
    warm: Rgba<u8>,
    very_warm: Rgba<u8>,
}

impl Water {
    fn new(set: &OceanSettings) -> Self {
        let blue = |v: u8| Rgba([0, 0, v, 255]);
        Self {
            very_cold: blue(set.very_cold),
            cold: blue(set.cold),
            warm: blue(set.warm),
            very_warm: blue(set.very_warm),
        }
    }
}

/// Paint sea temperatures onto `layer`, which must already be masked to the
/// sea. Hemispheres warm towards the equator, currents carry warm or cold
/// water polewards, and the equator and poles are painted over last.
pub fn paint_sea<R: Rng>(
    layer: &mut Canvas,
    set: &OceanSettings,
    bands: Bands,
    currents: &[Vec<Point>],
    rng: &mut R,
) {
    let (w, h) = (layer.width() as i32, layer.height() as i32);
    let water = Water::new(set);

    layer.rectangle_vertical(
        Rect::new(0, bands.arctic, w, bands.equator_top),
        &[water.cold, water.warm, water.warm],
    );
    layer.rectangle_vertical(
        Rect::new(0, bands.equator_bottom, w, h - bands.arctic),
        &[water.warm, water.warm, water.cold],
    );

    for current in currents {
        if rng.gen::<f64>() <= set.cold_current_prob {
            layer.line(
                current,
                set.current_width,
                &[water.very_warm, water.warm, water.cold, water.cold, water.cold, water.very_cold],
            );
        } else {
            layer.line(
                current,
                set.current_width,
                &[water.very_warm, water.warm, water.warm, water.warm, water.cold, water.very_cold],
            );
        }
    }

    layer.rectangle_vertical(
        Rect::new(0, bands.equator_top, w, bands.equator_bottom),
        &[water.warm, water.very_warm, water.warm],
    );
    layer.rectangle_vertical(Rect::new(0, 0, w, bands.arctic), &[water.very_cold, water.cold]);
    layer.rectangle_vertical(
        Rect::new(0, h - bands.arctic, w, h),
        &[water.cold, water.very_cold],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::LayerKey;
    use image::Luma;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world(size: u32) -> World {
        World {
            id: World::id_for_name("sea"),
            name: "sea".into(),
            epoch: 2,
            seed: 1,
            width: size,
            height: size,
        }
    }

    fn raise(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, v: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([v]));
            }
        }
    }

    #[test]
    fn test_enclosed_low_ground_is_land() {
        let mut height = GrayImage::from_pixel(30, 30, Luma([10]));
        // a ring of hills around a basin
        raise(&mut height, 10, 10, 10, 10, 200);
        raise(&mut height, 13, 13, 4, 4, 5);

        let sea = classify_sea(&height, 150);
        assert!(*sea.get(0, 0));
        assert!(*sea.get(29, 29));
        assert!(!*sea.get(11, 11));
        assert!(!*sea.get(14, 14));
        assert_eq!(sea.count_true(), 900 - 100);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let mut height = GrayImage::from_pixel(40, 40, Luma([90]));
        raise(&mut height, 5, 5, 12, 20, 180);
        raise(&mut height, 25, 10, 10, 10, 160);
        raise(&mut height, 28, 13, 3, 3, 40);

        let first = classify_sea(&height, 150);
        let again = classify_sea(&mask_image(&first), 150);
        assert_eq!(first, again);
    }

    #[test]
    fn test_landmasses_partition_land() {
        let w = world(50);
        let mut height = GrayImage::from_pixel(50, 50, Luma([0]));
        raise(&mut height, 5, 5, 10, 10, 255);
        raise(&mut height, 30, 30, 6, 3, 255);
        // touches the first only at a corner
        raise(&mut height, 15, 15, 2, 2, 255);

        let sea = classify_sea(&height, 150);
        let mut layer = Canvas::new(LayerKey::new(&w.id, 2, "landmass"), 50, 50);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let found = label_landmasses(&w, &sea, &mut layer, &mut rng);

        assert_eq!(found.len(), 2);
        let land = 2500 - sea.count_true() as u64;
        assert_eq!(found.iter().map(|l| l.size).sum::<u64>(), land);
        assert_eq!(found[0].size, 104);
        assert_eq!(found[0].first, Point::new(5, 5));
        assert_eq!(found[0].color, (0, 1));
        assert_eq!(found[1].color, (0, 2));
        assert_eq!(found[1].epoch, 2);
        assert_ne!(found[0].id, found[1].id);
        assert_eq!(layer.g(31, 31), 2);
        assert_eq!(layer.g(0, 0), 0);
    }

    #[test]
    fn test_two_islands_scenario() {
        let w = world(1000);
        let mut height = GrayImage::from_pixel(1000, 1000, Luma([100]));
        // 4000 pixels first reached at (10, 10)
        raise(&mut height, 10, 10, 80, 50, 220);
        // 120 pixels first reached at (990, 990): one row of 10, nine rows
        // of 12 reaching further west, and two more on the bottom row
        raise(&mut height, 990, 990, 10, 1, 220);
        raise(&mut height, 988, 991, 12, 9, 220);
        raise(&mut height, 986, 999, 2, 1, 220);

        let sea = classify_sea(&height, 150);
        let mut layer = Canvas::new(LayerKey::new(&w.id, 2, "landmass"), 1000, 1000);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut found = label_landmasses(&w, &sea, &mut layer, &mut rng);
        found.sort_by(|a, b| b.size.cmp(&a.size));

        let summary: Vec<(u64, Point)> = found.iter().map(|l| (l.size, l.first)).collect();
        assert_eq!(
            summary,
            vec![(4000, Point::new(10, 10)), (120, Point::new(990, 990))]
        );
    }

    #[test]
    fn test_colour_wraps_after_16_bits() {
        assert_eq!(landmass_colour(1), (0, 1));
        assert_eq!(landmass_colour(256), (1, 0));
        assert_eq!(landmass_colour(65535), (255, 255));
        assert_eq!(landmass_colour(65536), (0, 1));
    }

    #[test]
    fn test_paint_sea_bands() {
        let set = OceanSettings::default();
        let mut layer = Canvas::new(LayerKey::new("w", 0, "sea"), 20, 200);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        paint_sea(&mut layer, &set, Bands::new(200, 40, 20), &[], &mut rng);

        assert_eq!(layer.b(5, 0), set.very_cold);
        assert_eq!(layer.b(5, 180), set.cold);
        assert_eq!(layer.b(5, 199), set.very_cold);
        assert_eq!(layer.b(5, 80), set.warm);
        assert!(layer.b(5, 100) > set.warm);
        assert!(layer.b(5, 40) >= set.cold && layer.b(5, 40) <= set.warm);
    }
}
