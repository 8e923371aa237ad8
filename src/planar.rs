//! Planar graph extracted from a subdivision, and the per-world graph that
//! pairs it with weight channels.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::pathgraph::PathGraph;
use crate::subdivision::{Subdivision, SubdivisionBuilder};
use crate::world::{layers, World};

/// Cell corners and borders of a subdivision with shared corners and
/// borders merged.
#[derive(Clone, Debug)]
pub struct PlanarGraph {
    subdivision: Subdivision,
    vertices: Vec<Point>,
    edges: Vec<(usize, usize)>,
}

impl PlanarGraph {
    /// Subdivide `bounds` around up to `target` sites and extract the graph.
    pub fn build(
        builder: &dyn SubdivisionBuilder,
        bounds: Rect,
        seed: u64,
        min_spacing: i32,
        target: usize,
    ) -> Result<Self> {
        let subdivision = builder.build(bounds, seed, target, min_spacing)?;
        Ok(Self::from_subdivision(subdivision))
    }

    pub fn from_subdivision(subdivision: Subdivision) -> Self {
        let mut lookup: HashMap<Point, usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();

        let mut index_of = |p: Point, vertices: &mut Vec<Point>| -> usize {
            *lookup.entry(p).or_insert_with(|| {
                vertices.push(p);
                vertices.len() - 1
            })
        };

        for cell in subdivision.cells() {
            for (a, b) in cell.edges() {
                let ia = index_of(a, &mut vertices);
                let ib = index_of(b, &mut vertices);
                // a border is the same border whichever way round it is walked
                let key = (ia.min(ib), ia.max(ib));
                if ia != ib && seen.insert(key) {
                    edges.push(key);
                }
            }
        }

        Self {
            subdivision,
            vertices,
            edges,
        }
    }

    /// Reattach saved topology to a rebuilt subdivision. The saved vertices
    /// are kept since rebuilding may round corners differently.
    pub fn restore(subdivision: Subdivision, vertices: Vec<Point>, edges: Vec<(usize, usize)>) -> Self {
        Self {
            subdivision,
            vertices,
            edges,
        }
    }

    pub fn subdivision(&self) -> &Subdivision {
        &self.subdivision
    }

    pub fn sites(&self) -> Vec<Point> {
        self.subdivision.sites()
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn neighbouring_cells(&self, ids: &[usize]) -> Vec<usize> {
        self.subdivision.neighbouring_cells(ids)
    }
}

/// Planar graph of a world together with its weight channels and tags.
#[derive(Clone, Debug)]
pub struct WorldGraph {
    pub world_id: String,
    pub bounds: Rect,
    pub seed: u64,
    pub planar: PlanarGraph,
    pub paths: PathGraph,
}

#[derive(Serialize, Deserialize)]
struct WorldGraphRecord {
    world_id: String,
    width: i32,
    height: i32,
    seed: u64,
    sites: Vec<Point>,
    paths: PathGraph,
}

impl WorldGraph {
    /// Fresh graph for `world` with every channel at `default_weight`.
    pub fn create(
        world: &World,
        builder: &dyn SubdivisionBuilder,
        seed: u64,
        target: usize,
        min_spacing: i32,
        default_weight: i64,
    ) -> Result<Self> {
        let planar = PlanarGraph::build(builder, world.bounds(), seed, min_spacing, target)?;
        let paths = PathGraph::new(
            default_weight,
            &layers::GRAPH_CHANNELS,
            planar.vertices().to_vec(),
            planar.edges(),
        )?;
        Ok(Self {
            world_id: world.id.clone(),
            bounds: world.bounds(),
            seed,
            planar,
            paths,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let record = WorldGraphRecord {
            world_id: self.world_id.clone(),
            width: self.bounds.width(),
            height: self.bounds.height(),
            seed: self.seed,
            sites: self.planar.sites(),
            paths: self.paths.clone(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    pub fn from_bytes(builder: &dyn SubdivisionBuilder, bytes: &[u8]) -> Result<Self> {
        let record: WorldGraphRecord = serde_json::from_slice(bytes)?;
        let bounds = Rect::new(0, 0, record.width, record.height);
        let subdivision = builder.rebuild(bounds, &record.sites)?;
        let planar = PlanarGraph::restore(
            subdivision,
            record.paths.vertices().to_vec(),
            record.paths.edges().to_vec(),
        );
        Ok(Self {
            world_id: record.world_id,
            bounds,
            seed: record.seed,
            planar,
            paths: record.paths,
        })
    }
}
