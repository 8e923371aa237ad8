//! Mountain ranges, volcanoes, ravines and rivers.

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dice::Dice;
use crate::error::{fan_in, Result};
use crate::geometry::{line_points, point_near, Point, Rect};
use crate::paint::Mode;
use crate::planar::WorldGraph;
use crate::seeds::WorldSeeds;
use crate::world::{layers, PathSpec};

use super::{Route, Terrain};

/// Result of placing a feature: the route it followed and the points where
/// individual peaks or cones were drawn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placement {
    pub path: Vec<Point>,
    pub points: Vec<Point>,
}

impl Terrain<'_> {
    /// Raise a mountain range along the cheapest mountain route.
    ///
    /// Weights along the range push ravines and rivers away and draw
    /// volcanoes in; weights beside it let rivers and ravines cut passes.
    /// `scale` multiplies peak height.
    pub fn add_mountains(
        &self,
        graph: &mut WorldGraph,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        scale: f64,
        seed: u64,
    ) -> Result<Placement> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let route = Route::resolve(self.world, &graph.paths, spec, &mut rng)?;
        let path = route.find(&graph.paths, layers::MOUNTAINS)?;
        let mut canvas = self.canvas(layers::MOUNTAINS)?;

        let w = self.settings.graph.mountain;
        let paths = &mut graph.paths;
        let mut draw_rng = ChaCha8Rng::seed_from_u64(WorldSeeds::nth(seed, 1));

        let (weighted, drawn) = rayon::join(
            || -> Result<()> {
                paths.incr_weights(
                    &path,
                    &[
                        (layers::MOUNTAINS, w),
                        (layers::RAVINES, w),
                        (layers::RIVERS, w),
                        (layers::VOLCANOES, -w),
                    ],
                )?;
                let nearby = paths.neighbours(&path)?;
                paths.incr_weights(
                    &nearby,
                    &[
                        (layers::MOUNTAINS, w),
                        (layers::RAVINES, -w),
                        (layers::RIVERS, -w),
                    ],
                )?;
                if let Some(tag) = tag {
                    paths.tag(tag, &path);
                }
                Ok(())
            },
            || -> Result<Vec<Point>> {
                let set = &self.settings.mountains;
                let width = set.range_width.max(1);
                let mut placed = Vec::new();

                for segment in path.windows(2) {
                    let along = line_points(segment[0], segment[1]);
                    let range_height = 3.0 * draw_rng.gen::<f64>() / 4.0;
                    let mut p = 0;
                    while p < along.len() {
                        let centre = along[p];
                        for _ in 0..set.per_step.roll(&mut draw_rng) {
                            let peak = Point::new(
                                centre.x - width / 2 + draw_rng.gen_range(0..width),
                                centre.y - width / 2 + draw_rng.gen_range(0..width),
                            );
                            canvas.ellipse(
                                peak,
                                set.size.roll(&mut draw_rng),
                                set.size.roll(&mut draw_rng),
                                draw_rng.gen_range(0..90),
                                (draw_rng.gen::<f64>() / 4.0 + range_height) * scale,
                                Mode::Convex,
                            );
                            placed.push(peak);
                        }
                        p += 1 + set.step.roll(&mut draw_rng).max(0) as usize;
                    }
                }

                self.rasters.save(&canvas)?;
                Ok(placed)
            },
        );

        let mut results = fan_in(vec![weighted.map(|_| Vec::new()), drawn])?;
        let points = results.pop().unwrap_or_default();
        info!(
            "mountain range of {} vertices with {} peaks in world {}",
            path.len(),
            points.len(),
            self.world.name
        );
        Ok(Placement { path, points })
    }

    /// Scatter up to `count` volcanoes beside the cheapest volcano route.
    ///
    /// Each volcano is a cone with a caldera sunk into its top, drawn onto
    /// the mountains layer. Weights are left alone.
    pub fn add_volcanoes(
        &self,
        graph: &mut WorldGraph,
        tag: Option<&str>,
        count: usize,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Placement> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let route = Route::resolve(self.world, &graph.paths, spec, &mut rng)?;
        let mut canvas = self.canvas(layers::MOUNTAINS)?;
        let path = route.find(&graph.paths, layers::VOLCANOES)?;

        let set = &self.settings.volcanoes;
        let mut candidates = Vec::new();
        for segment in path.windows(2) {
            let along = line_points(segment[0], segment[1]);
            let mut p = rng.gen_range(0..5);
            while p < along.len() {
                candidates.push(point_near(
                    along[p],
                    set.range_width / 2,
                    set.range_width,
                    &mut rng,
                ));
                p += 1 + set.step.roll(&mut rng).max(0) as usize;
            }
        }

        if candidates.len() > count {
            candidates.shuffle(&mut rng);
            candidates.truncate(count);
        }

        for p in &candidates {
            canvas.ellipse(
                *p,
                set.cone.roll(&mut rng),
                set.cone.roll(&mut rng),
                rng.gen_range(0..90),
                0.75 + rng.gen::<f64>() / 4.0,
                Mode::Convex,
            );
            canvas.ellipse(
                *p,
                set.caldera.roll(&mut rng),
                set.caldera.roll(&mut rng),
                rng.gen_range(0..90),
                0.75 + rng.gen::<f64>() / 4.0,
                Mode::Concave,
            );
        }

        if let Some(tag) = tag {
            graph.paths.tag(tag, &path);
        }
        self.rasters.save(&canvas)?;
        info!(
            "{} volcanoes along {} vertices in world {}",
            candidates.len(),
            path.len(),
            self.world.name
        );
        Ok(Placement {
            path,
            points: candidates,
        })
    }

    /// Cut a ravine along the cheapest ravine route.
    pub fn add_ravine(
        &self,
        graph: &mut WorldGraph,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Vec<Point>> {
        let w = self.settings.graph.ravine;
        let path = self.cut_channel(
            graph,
            layers::RAVINES,
            &[
                (layers::RAVINES, w),
                (layers::MOUNTAINS, w),
                (layers::RIVERS, -w),
                (layers::VOLCANOES, w),
            ],
            &self.settings.ravine_width,
            tag,
            spec,
            seed,
        )?;
        info!("ravine of {} vertices in world {}", path.len(), self.world.name);
        Ok(path)
    }

    /// Run a river along the cheapest river route.
    pub fn add_river(
        &self,
        graph: &mut WorldGraph,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Vec<Point>> {
        let w = self.settings.graph.river;
        let path = self.cut_channel(
            graph,
            layers::RIVERS,
            &[
                (layers::RIVERS, w),
                (layers::MOUNTAINS, w),
                (layers::RAVINES, -w),
            ],
            &self.settings.river_width,
            tag,
            spec,
            seed,
        )?;
        info!("river of {} vertices in world {}", path.len(), self.world.name);
        Ok(path)
    }

    /// Shared by ravines and rivers: route on `channel`, weight the route
    /// and draw a stroke onto the layer of the same name. The layer holds
    /// depth, so the stroke is brightest along its middle.
    fn cut_channel(
        &self,
        graph: &mut WorldGraph,
        channel: &str,
        deltas: &[(&str, i64)],
        width: &Dice,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Vec<Point>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let route = Route::resolve(self.world, &graph.paths, spec, &mut rng)?;
        let path = route.find(&graph.paths, channel)?;
        let mut canvas = self.canvas(channel)?;

        graph.paths.incr_weights(&path, deltas)?;
        if let Some(tag) = tag {
            graph.paths.tag(tag, &path);
        }

        let stroke = width.roll(&mut rng);
        canvas.channel(&path, stroke, rng.gen::<f64>() / 5.0 + 0.8, Mode::Convex);
        debug!("{} stroke {} pixels wide", channel, stroke);
        self.rasters.save(&canvas)?;
        Ok(path)
    }

    /// Blur the mountains layer.
    pub fn smooth(&self, radius: u32) -> Result<()> {
        let mut canvas = self.canvas(layers::MOUNTAINS)?;
        canvas.smooth(radius);
        self.rasters.save(&canvas)
    }

    /// Fade mountains and both noise layers to black outside `area`.
    pub fn flatten_outside(&self, area: Rect) -> Result<()> {
        let flatten = |name: &str| -> Result<()> {
            let mut canvas = self.canvas(name)?;
            canvas.flatten_outside(area);
            self.rasters.save(&canvas)
        };

        let (mountains, (perlin, voronoi)) = rayon::join(
            || flatten(layers::MOUNTAINS),
            || {
                rayon::join(
                    || flatten(layers::NOISE_PERLIN),
                    || flatten(layers::NOISE_VORONOI),
                )
            },
        );
        fan_in(vec![mountains, perlin, voronoi])?;
        Ok(())
    }
}
