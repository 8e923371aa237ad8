//! Terrain generation: tectonic graph and noise, then features routed over
//! the graph and drawn onto raster layers.
//!
//! Features follow the cheapest route on their own weight channel. Placing
//! one adjusts the weights of the others along its route, so later features
//! gather around or avoid earlier ones.

mod features;
mod tectonics;

use rand::Rng;

use crate::error::{GenesisError, Result};
use crate::geometry::{trim_path, Point};
use crate::paint::{Canvas, LayerKey, RasterStore};
use crate::pathgraph::PathGraph;
use crate::settings::Settings;
use crate::world::{PathSpec, World};

pub use features::Placement;
pub use tectonics::create_tectonics;

/// What terrain operations need to read and write a world's layers.
#[derive(Clone, Copy)]
pub struct Terrain<'a> {
    pub world: &'a World,
    pub settings: &'a Settings,
    pub rasters: &'a dyn RasterStore,
}

impl<'a> Terrain<'a> {
    pub fn new(world: &'a World, settings: &'a Settings, rasters: &'a dyn RasterStore) -> Self {
        Self {
            world,
            settings,
            rasters,
        }
    }

    pub fn layer(&self, name: &str) -> LayerKey {
        self.world.layer(name)
    }

    /// The stored layer, or a blank one the size of the world.
    pub fn canvas(&self, name: &str) -> Result<Canvas> {
        self.rasters
            .canvas(&self.layer(name), self.world.width, self.world.height)
    }
}

/// Ends and length limit of one placement, snapped to graph vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Route {
    pub from: Point,
    pub to: Point,
    pub max_dist: f64,
}

impl Route {
    /// Snap the given ends to their nearest vertices and pick random vertices
    /// for missing ones. Without a spec both ends are random and the length
    /// limit is the world's default.
    pub fn resolve<R: Rng>(
        world: &World,
        graph: &PathGraph,
        spec: Option<&PathSpec>,
        rng: &mut R,
    ) -> Result<Self> {
        let spec = spec.cloned().unwrap_or_default();
        let from = match spec.from {
            Some(p) => graph.closest_point(p)?,
            None => graph.random_point(rng)?,
        };
        let to = match spec.to {
            Some(p) => graph.closest_point(p)?,
            None => graph.random_point(rng)?,
        };
        Ok(Self {
            from,
            to,
            max_dist: spec.max_dist.unwrap_or_else(|| world.default_max_dist()),
        })
    }

    /// Cheapest path on `channel`, cut to `max_dist`.
    pub fn find(&self, graph: &PathGraph, channel: &str) -> Result<Vec<Point>> {
        let path = graph.shortest(channel, self.from, self.to)?;
        let path = trim_path(&path, self.max_dist);
        if path.len() < 2 {
            return Err(GenesisError::NoPath(format!(
                "path on '{}' from {:?} is shorter than two points within {}",
                channel, self.from, self.max_dist
            )));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::path_length;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world() -> World {
        World {
            id: World::id_for_name("route"),
            name: "route".into(),
            epoch: 0,
            seed: 1,
            width: 100,
            height: 100,
        }
    }

    fn line_graph() -> PathGraph {
        let vertices: Vec<Point> = (0..10).map(|i| Point::new(i * 10, 50)).collect();
        let edges: Vec<(usize, usize)> = (0..9).map(|i| (i, i + 1)).collect();
        PathGraph::new(1, &["mountains"], vertices, &edges).unwrap()
    }

    #[test]
    fn test_resolve_snaps_and_defaults() {
        let graph = line_graph();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let spec = PathSpec {
            from: Some(Point::new(1, 48)),
            to: None,
            max_dist: None,
        };
        let route = Route::resolve(&world(), &graph, Some(&spec), &mut rng).unwrap();
        assert_eq!(route.from, Point::new(0, 50));
        assert!(graph.vertices().contains(&route.to));
        assert!((route.max_dist - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_trims_long_paths() {
        let graph = line_graph();
        let route = Route {
            from: Point::new(0, 50),
            to: Point::new(90, 50),
            max_dist: 35.0,
        };
        let path = route.find(&graph, "mountains").unwrap();
        assert_eq!(path.len(), 4);
        assert!(path_length(&path) <= 35.0);
    }

    #[test]
    fn test_find_fails_when_trimmed_to_one_point() {
        let graph = line_graph();
        let route = Route {
            from: Point::new(0, 50),
            to: Point::new(90, 50),
            max_dist: 5.0,
        };
        assert!(matches!(
            route.find(&graph, "mountains"),
            Err(GenesisError::NoPath(_))
        ));
    }
}
