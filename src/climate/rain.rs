//! Rainfall carried by storms blowing along the prevailing winds.
//!
//! The world is cut into one horizontal band per prevailing wind. Storms
//! start on the upwind edge of their band and walk downwind a pixel at a
//! time. They soak up moisture over the sea, more over warmer water, and
//! drop it over land, most heavily where the ground climbs.

use image::Rgba;
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::{GenesisError, Result};
use crate::geometry::{Heading, Point, Rect};
use crate::paint::Canvas;
use crate::seeds::WorldSeeds;
use crate::settings::{OceanSettings, RainSettings};

/// One storm waiting to be walked.
#[derive(Clone, Debug, PartialEq)]
pub struct Storm {
    pub start: Point,
    pub area: Rect,
    pub heading: Heading,
    pub moisture: f64,
}

/// Pixels along the edge of `area` facing `side`. Diagonal sides take both
/// edges they touch.
pub fn edge_points(area: Rect, side: Heading) -> Vec<Point> {
    if area.is_empty() {
        return Vec::new();
    }
    let top = || (area.min.x..area.max.x).map(|x| Point::new(x, area.min.y));
    let bottom = || (area.min.x..area.max.x).map(|x| Point::new(x, area.max.y - 1));
    let left = || (area.min.y..area.max.y).map(|y| Point::new(area.min.x, y));
    let right = || (area.min.y..area.max.y).map(|y| Point::new(area.max.x - 1, y));

    let mut points: Vec<Point> = match side {
        Heading::North => top().collect(),
        Heading::South => bottom().collect(),
        Heading::West => left().collect(),
        Heading::East => right().collect(),
        Heading::NorthEast => top().chain(right()).collect(),
        Heading::SouthEast => bottom().chain(right()).collect(),
        Heading::SouthWest => bottom().chain(left()).collect(),
        Heading::NorthWest => top().chain(left()).collect(),
    };
    points.sort();
    points.dedup();
    points
}

/// Storms for every band, starting upwind.
pub fn storms(
    width: i32,
    height: i32,
    winds: &[Heading],
    set: &RainSettings,
    rng: &mut ChaCha8Rng,
) -> Vec<Storm> {
    if winds.is_empty() {
        return Vec::new();
    }
    // the last height % winds.len() rows belong to no band and get no storms
    let band = height / winds.len() as i32;
    let mut out = Vec::new();
    for (i, heading) in winds.iter().enumerate() {
        let i = i as i32;
        let area = Rect::new(0, i * band, width, (i + 1) * band);
        for start in edge_points(area, heading.opposite()) {
            out.push(Storm {
                start,
                area,
                heading: *heading,
                moisture: set.storm_init_moisture.roll(rng) as f64,
            });
        }
    }
    out
}

/// What a storm reads at each pixel.
pub struct RainInputs<'a> {
    /// Sea temperature in blue, 0 over land
    pub sea: &'a Canvas,
    /// Elevation in red
    pub mountains: &'a Canvas,
}

/// Walk one storm across its band and return the rain it drops.
fn walk(
    storm: &Storm,
    inputs: &RainInputs,
    rain: &RainSettings,
    ocean: &OceanSettings,
    mult: f64,
    rng: &mut ChaCha8Rng,
) -> Vec<(Point, u8)> {
    let (dx, dy) = storm.heading.rise_run();
    let mut at = storm.start;
    let mut moisture = storm.moisture;
    let mut last_height = 0u8;
    let mut deposits = Vec::new();

    while storm.area.contains(at) {
        let temperature = inputs.sea.b(at.x, at.y);
        let height = inputs.mountains.r(at.x, at.y);

        if temperature > 0 {
            let gain = if temperature >= ocean.very_warm {
                Some(&rain.gain_very_warm_sea)
            } else if temperature >= ocean.warm {
                Some(&rain.gain_warm_sea)
            } else if temperature >= ocean.cold {
                Some(&rain.gain_cold_sea)
            } else if temperature >= ocean.very_cold {
                Some(&rain.gain_very_cold_sea)
            } else {
                None
            };
            if let Some(dice) = gain {
                moisture += dice.roll(rng) as f64 * mult;
            }
        } else if moisture > 0.0 {
            let mut delta = if height > last_height {
                rain.loss_over_mountains.roll(rng) as f64 * mult * (height - last_height) as f64
            } else {
                rain.loss_over_land.roll(rng) as f64 * mult
            };
            delta = delta.min(moisture);
            moisture -= delta;
            let drop = delta.round().clamp(0.0, 255.0) as u8;
            if drop > 0 {
                deposits.push((at, drop));
            }
        }

        last_height = height;
        at = Point::new(at.x + dx, at.y + dy);
    }

    deposits
}

/// Run every storm on a pool of `set.workers` threads and add their rain
/// to `layer`'s blue channel, saturating at 255.
///
/// Storms only read shared layers; deposits are collected per storm and
/// applied once every worker has finished.
pub fn rainfall(
    layer: &mut Canvas,
    inputs: &RainInputs,
    winds: &[Heading],
    rain: &RainSettings,
    ocean: &OceanSettings,
    mult: f64,
    seed: u64,
) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let storms = storms(
        layer.width() as i32,
        layer.height() as i32,
        winds,
        rain,
        &mut rng,
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(rain.workers.max(1))
        .build()
        .map_err(|e| GenesisError::Io(std::io::Error::other(e.to_string())))?;

    let deposits: Vec<Vec<(Point, u8)>> = pool.install(|| {
        storms
            .par_iter()
            .enumerate()
            .map(|(i, storm)| {
                let mut rng = ChaCha8Rng::seed_from_u64(WorldSeeds::nth(seed, i as u64));
                walk(storm, inputs, rain, ocean, mult, &mut rng)
            })
            .collect()
    });

    let mut total = 0u64;
    for (p, amount) in deposits.into_iter().flatten() {
        let current = layer.b(p.x, p.y);
        layer.set(p.x, p.y, Rgba([0, 0, current.saturating_add(amount), 255]));
        total += amount as u64;
    }
    debug!("{} storms dropped {} rain", storms.len(), total);
    Ok(())
}
