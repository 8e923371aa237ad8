//! World graph creation and the two noise layers that seed its weights.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{fan_in, GenesisError, Result};
use crate::paint::{grey, perlin_canvas, Canvas};
use crate::planar::{PlanarGraph, WorldGraph};
use crate::seeds::WorldSeeds;
use crate::subdivision::SubdivisionBuilder;
use crate::world::layers;

use super::Terrain;

/// Pixels from the border within which vertices are treated as edge vertices.
const EDGE_MARGIN: i32 = 5;

/// Build the world graph over about `points` sites and bias its weights with
/// noise.
///
/// Fractal cell noise and smooth perlin noise are generated side by side and
/// saved as layers. Where the mixed noise is high, mountains and volcanoes
/// become cheap and ravines and rivers expensive. Vertices on the world edge
/// are made expensive on every channel.
pub fn create_tectonics(
    terrain: &Terrain,
    builder: &dyn SubdivisionBuilder,
    noise_scale: f64,
    points: usize,
    seed: u64,
) -> Result<WorldGraph> {
    let world = terrain.world;
    let set = terrain.settings;
    let mut graph = WorldGraph::create(
        world,
        builder,
        seed,
        points,
        set.graph.site_spacing,
        set.graph.default,
    )?;
    info!(
        "world {} graph: {} sites, {} vertices, {} edges",
        world.name,
        graph.planar.sites().len(),
        graph.paths.vertices().len(),
        graph.paths.edges().len()
    );

    let (voronoi, perlin) = rayon::join(
        || fractal_noise(terrain, &graph.planar, WorldSeeds::nth(seed, 1)),
        || -> Result<Canvas> {
            let canvas = perlin_canvas(
                terrain.layer(layers::NOISE_PERLIN),
                world.width,
                world.height,
                noise_scale,
                WorldSeeds::nth(seed, 2),
            );
            terrain.rasters.save(&canvas)?;
            Ok(canvas)
        },
    );
    let noise = fan_in(vec![voronoi, perlin])?;
    let [voronoi, perlin] = noise.as_slice() else {
        return Err(GenesisError::NotFound("tectonic noise layers".to_string()));
    };

    let wp = set.heightmap.noise_perlin;
    let wv = set.heightmap.noise_voronoi;
    let vertices = graph.paths.vertices().to_vec();
    for p in vertices {
        let v = ((perlin.r(p.x, p.y) as f64 * wp + voronoi.r(p.x, p.y) as f64 * wv) / 2.0) as i64;
        graph.paths.incr_weights(
            &[p],
            &[
                (layers::MOUNTAINS, -v),
                (layers::VOLCANOES, -v / 2),
                (layers::RAVINES, v),
                (layers::RIVERS, v * 2),
            ],
        )?;
    }

    let on_edge: Vec<(&str, i64)> = layers::GRAPH_CHANNELS
        .iter()
        .map(|c| (*c, set.graph.edge))
        .collect();
    let inner = world.bounds().inset(EDGE_MARGIN);
    graph.paths.incr_weights_outside(inner, &on_edge)?;

    Ok(graph)
}

/// Raise random cells and the rings of cells around them, giving rough
/// plateaus with sharp edges.
fn fractal_noise(terrain: &Terrain, planar: &PlanarGraph, seed: u64) -> Result<Canvas> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let set = &terrain.settings.fractal_noise;
    let subdivision = planar.subdivision();

    let picks = (subdivision.cells().len() as f64 * set.segments) as usize;
    let mut middles = BTreeSet::new();
    for _ in 0..picks {
        if let Some(id) = subdivision.random_cell(&mut rng) {
            middles.insert(id);
        }
    }

    let mut raised: BTreeMap<usize, i32> = BTreeMap::new();
    for middle in middles {
        let mut next = vec![middle];
        for _ in 0..set.iterations {
            let ring = subdivision.neighbouring_cells(&next);
            let delta = rng.gen_range(5..15);
            for id in next.iter().chain(ring.iter()) {
                *raised.entry(*id).or_default() += delta;
            }
            next.extend(ring);
        }
    }
    debug!("fractal noise raised {} cells", raised.len());

    let world = terrain.world;
    let mut canvas = Canvas::new(terrain.layer(layers::NOISE_VORONOI), world.width, world.height);
    for (id, delta) in raised {
        if let Some(cell) = subdivision.cell(id) {
            canvas.polygon(&cell.edges(), grey(delta.clamp(0, 255) as u8, 1.0));
        }
    }
    canvas.smooth(set.smoothing);
    terrain.rasters.save(&canvas)?;
    Ok(canvas)
}
