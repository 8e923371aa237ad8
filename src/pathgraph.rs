//! Multi-channel weighted graph for feature placement.
//!
//! One topology is shared by every weight channel. Each channel holds a
//! weight per vertex, and the cost of the arc `u -> v` is always the current
//! weight of `v`. Changing a vertex weight rewrites every arc that ends at it,
//! so the two arcs of an undirected edge can cost different amounts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenesisError, Result};
use crate::geometry::{Point, Rect};

#[derive(Clone, Debug)]
struct Channel {
    /// Vertex index -> weight, never negative
    weights: Vec<i64>,
    /// Edge index -> cost of traversing that arc
    arc_costs: Vec<i64>,
}

/// Weighted graph over a fixed set of vertices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "PathGraphRecord", try_from = "PathGraphRecord")]
pub struct PathGraph {
    default_weight: i64,
    vertices: Vec<Point>,
    lookup: HashMap<Point, usize>,
    /// Undirected edges as vertex index pairs, smaller index first
    edges: Vec<(usize, usize)>,
    /// Two arcs per edge
    topology: DiGraph<Point, ()>,
    channels: BTreeMap<String, Channel>,
    tags: BTreeMap<String, Vec<Point>>,
}

impl PathGraph {
    /// Build a graph whose channels all start at `default_weight`.
    ///
    /// Channels cannot be added later. Duplicate edges and self loops are
    /// dropped; an edge naming a missing vertex is an error.
    pub fn new(
        default_weight: i64,
        channels: &[&str],
        vertices: Vec<Point>,
        edges: &[(usize, usize)],
    ) -> Result<Self> {
        let default_weight = default_weight.max(0);

        let mut lookup = HashMap::with_capacity(vertices.len());
        let mut topology = DiGraph::with_capacity(vertices.len(), edges.len() * 2);
        for (i, p) in vertices.iter().enumerate() {
            lookup.entry(*p).or_insert(i);
            topology.add_node(*p);
        }

        let mut seen = BTreeSet::new();
        let mut canonical = Vec::with_capacity(edges.len());
        for &(a, b) in edges {
            if a >= vertices.len() || b >= vertices.len() {
                return Err(GenesisError::NotFound(format!(
                    "edge ({}, {}) references a vertex outside 0..{}",
                    a,
                    b,
                    vertices.len()
                )));
            }
            if a == b {
                continue;
            }
            let key = (a.min(b), a.max(b));
            if seen.insert(key) {
                canonical.push(key);
                topology.add_edge(NodeIndex::new(key.0), NodeIndex::new(key.1), ());
                topology.add_edge(NodeIndex::new(key.1), NodeIndex::new(key.0), ());
            }
        }

        let channels = channels
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    Channel {
                        weights: vec![default_weight; vertices.len()],
                        arc_costs: vec![default_weight; topology.edge_count()],
                    },
                )
            })
            .collect();

        Ok(Self {
            default_weight,
            vertices,
            lookup,
            edges: canonical,
            topology,
            channels,
            tags: BTreeMap::new(),
        })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Current weight of the vertex nearest `p`.
    pub fn weight(&self, channel: &str, p: Point) -> Result<i64> {
        let chan = self
            .channels
            .get(channel)
            .ok_or_else(|| GenesisError::InvalidChannel(channel.to_string()))?;
        Ok(chan.weights[self.closest_index(p)?])
    }

    /// Cost of the arc `from -> to`, if the two vertices are joined.
    pub fn arc_cost(&self, channel: &str, from: Point, to: Point) -> Result<Option<i64>> {
        let chan = self
            .channels
            .get(channel)
            .ok_or_else(|| GenesisError::InvalidChannel(channel.to_string()))?;
        let a = NodeIndex::new(self.closest_index(from)?);
        let b = NodeIndex::new(self.closest_index(to)?);
        Ok(self
            .topology
            .find_edge(a, b)
            .map(|e| chan.arc_costs[e.index()]))
    }

    fn closest_index(&self, p: Point) -> Result<usize> {
        if let Some(i) = self.lookup.get(&p) {
            return Ok(*i);
        }
        self.vertices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.distance_sq(&p))
            .map(|(i, _)| i)
            .ok_or_else(|| GenesisError::NotFound("graph has no vertices".to_string()))
    }

    /// The vertex nearest `p`. This is a linear scan unless `p` is a vertex.
    pub fn closest_point(&self, p: Point) -> Result<Point> {
        Ok(self.vertices[self.closest_index(p)?])
    }

    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Result<Point> {
        if self.vertices.is_empty() {
            return Err(GenesisError::NotFound("graph has no vertices".to_string()));
        }
        Ok(self.vertices[rng.gen_range(0..self.vertices.len())])
    }

    /// Cheapest route on `channel` between the vertices nearest `a` and `b`.
    ///
    /// The route starts and ends on those vertices. Asking for a route from a
    /// vertex to itself returns that single vertex.
    pub fn shortest(&self, channel: &str, a: Point, b: Point) -> Result<Vec<Point>> {
        let chan = self.channels.get(channel).ok_or_else(|| {
            GenesisError::NoPath(format!("no channel named '{}'", channel))
        })?;
        let start = NodeIndex::new(self.closest_index(a)?);
        let goal = NodeIndex::new(self.closest_index(b)?);

        let found = astar(
            &self.topology,
            start,
            |n| n == goal,
            |e| chan.arc_costs[e.id().index()],
            |_| 0,
        );

        match found {
            Some((_, route)) => Ok(route.into_iter().map(|n| self.vertices[n.index()]).collect()),
            None => Err(GenesisError::NoPath(format!(
                "{:?} is not connected to {:?} on '{}'",
                self.vertices[start.index()],
                self.vertices[goal.index()],
                channel
            ))),
        }
    }

    /// Add each delta to the vertices nearest `points`, flooring at zero.
    ///
    /// Every channel is checked before anything changes, so an unknown
    /// channel leaves the graph untouched.
    pub fn incr_weights(&mut self, points: &[Point], deltas: &[(&str, i64)]) -> Result<()> {
        self.check_channels(deltas)?;
        let mut indices = Vec::with_capacity(points.len());
        for p in points {
            indices.push(self.closest_index(*p)?);
        }
        for i in indices {
            self.apply(i, deltas);
        }
        Ok(())
    }

    /// As [`PathGraph::incr_weights`], for every vertex strictly outside `area`.
    pub fn incr_weights_outside(&mut self, area: Rect, deltas: &[(&str, i64)]) -> Result<()> {
        self.check_channels(deltas)?;
        let outside: Vec<usize> = self
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| area.strictly_outside(**v))
            .map(|(i, _)| i)
            .collect();
        for i in outside {
            self.apply(i, deltas);
        }
        Ok(())
    }

    /// Overwrite the weights of one channel, e.g. when loading a saved graph.
    pub fn set_weights(&mut self, channel: &str, weights: &[i64]) -> Result<()> {
        if !self.channels.contains_key(channel) {
            return Err(GenesisError::InvalidChannel(channel.to_string()));
        }
        if weights.len() != self.vertices.len() {
            return Err(GenesisError::Validation(format!(
                "channel '{}' has {} weights for {} vertices",
                channel,
                weights.len(),
                self.vertices.len()
            )));
        }
        for (i, w) in weights.iter().enumerate() {
            self.assign(channel, i, *w);
        }
        Ok(())
    }

    fn check_channels(&self, deltas: &[(&str, i64)]) -> Result<()> {
        match deltas.iter().find(|(name, _)| !self.channels.contains_key(*name)) {
            Some((name, _)) => Err(GenesisError::InvalidChannel(name.to_string())),
            None => Ok(()),
        }
    }

    fn apply(&mut self, vertex: usize, deltas: &[(&str, i64)]) {
        for (name, delta) in deltas {
            let current = match self.channels.get(*name) {
                Some(chan) => chan.weights[vertex],
                None => continue,
            };
            self.assign(name, vertex, current + delta);
        }
    }

    /// Set a vertex weight and copy it onto every arc that ends there.
    fn assign(&mut self, channel: &str, vertex: usize, weight: i64) {
        let weight = weight.max(0);
        let incoming: Vec<usize> = self
            .topology
            .edges_directed(NodeIndex::new(vertex), Direction::Incoming)
            .map(|e| e.id().index())
            .collect();
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.weights[vertex] = weight;
            for e in incoming {
                chan.arc_costs[e] = weight;
            }
        }
    }

    /// Vertices joined to any vertex of `points` that are not themselves in it.
    pub fn neighbours(&self, points: &[Point]) -> Result<Vec<Point>> {
        let mut given = BTreeSet::new();
        for p in points {
            given.insert(self.closest_index(*p)?);
        }
        let found: BTreeSet<usize> = given
            .iter()
            .flat_map(|i| self.topology.neighbors(NodeIndex::new(*i)))
            .map(|n| n.index())
            .filter(|i| !given.contains(i))
            .collect();
        Ok(found.into_iter().map(|i| self.vertices[i]).collect())
    }

    /// Remember `points` under `name`, replacing any earlier set.
    pub fn tag(&mut self, name: &str, points: &[Point]) {
        self.tags.insert(name.to_string(), points.to_vec());
    }

    pub fn from_tag(&self, name: &str) -> Result<&[Point]> {
        self.tags
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| GenesisError::NotFound(format!("tag '{}'", name)))
    }
}

/// Saved form of a [`PathGraph`]: topology, weights and tags.
///
/// Arc costs are not stored; they are rebuilt from the weights on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathGraphRecord {
    pub default_weight: i64,
    pub vertices: Vec<Point>,
    pub edges: Vec<(usize, usize)>,
    pub weights: BTreeMap<String, Vec<i64>>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<Point>>,
}

impl From<PathGraph> for PathGraphRecord {
    fn from(graph: PathGraph) -> Self {
        Self {
            default_weight: graph.default_weight,
            vertices: graph.vertices,
            edges: graph.edges,
            weights: graph
                .channels
                .into_iter()
                .map(|(name, chan)| (name, chan.weights))
                .collect(),
            tags: graph.tags,
        }
    }
}

impl TryFrom<PathGraphRecord> for PathGraph {
    type Error = GenesisError;

    fn try_from(record: PathGraphRecord) -> Result<Self> {
        let names: Vec<&str> = record.weights.keys().map(String::as_str).collect();
        let mut graph = PathGraph::new(
            record.default_weight,
            &names,
            record.vertices.clone(),
            &record.edges,
        )?;
        for (name, weights) in &record.weights {
            graph.set_weights(name, weights)?;
        }
        graph.tags = record.tags;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 3x3 lattice, 10 pixels apart, joined horizontally and vertically.
    fn lattice(channels: &[&str]) -> PathGraph {
        let mut vertices = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                vertices.push(Point::new(x * 10, y * 10));
            }
        }
        let mut edges = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                let i = y * 3 + x;
                if x < 2 {
                    edges.push((i, i + 1));
                }
                if y < 2 {
                    edges.push((i, i + 3));
                }
            }
        }
        PathGraph::new(5, channels, vertices, &edges).unwrap()
    }

    #[test]
    fn test_incr_then_revert_restores_weight() {
        let mut graph = lattice(&["mountains", "rivers"]);
        let v = Point::new(10, 10);
        graph.incr_weights(&[v], &[("mountains", 40)]).unwrap();
        assert_eq!(graph.weight("mountains", v).unwrap(), 45);
        graph.incr_weights(&[v], &[("mountains", -40)]).unwrap();
        assert_eq!(graph.weight("mountains", v).unwrap(), 5);
        assert_eq!(graph.weight("rivers", v).unwrap(), 5);
    }

    #[test]
    fn test_weights_floor_at_zero() {
        let mut graph = lattice(&["mountains"]);
        let v = Point::new(0, 0);
        graph.incr_weights(&[v], &[("mountains", -100)]).unwrap();
        assert_eq!(graph.weight("mountains", v).unwrap(), 0);
        graph.incr_weights(&[v], &[("mountains", 3)]).unwrap();
        assert_eq!(graph.weight("mountains", v).unwrap(), 3);
    }

    #[test]
    fn test_arc_cost_is_destination_weight() {
        let mut graph = lattice(&["mountains"]);
        let a = Point::new(0, 0);
        let b = Point::new(10, 0);
        graph.incr_weights(&[b], &[("mountains", 20)]).unwrap();
        assert_eq!(graph.arc_cost("mountains", a, b).unwrap(), Some(25));
        assert_eq!(graph.arc_cost("mountains", b, a).unwrap(), Some(5));
        assert_eq!(graph.arc_cost("mountains", a, Point::new(20, 20)).unwrap(), None);
    }

    #[test]
    fn test_shortest_snaps_endpoints() {
        let graph = lattice(&["mountains"]);
        let path = graph
            .shortest("mountains", Point::new(1, 2), Point::new(19, 21))
            .unwrap();
        assert_eq!(path.first(), Some(&Point::new(0, 0)));
        assert_eq!(path.last(), Some(&Point::new(20, 20)));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_shortest_avoids_heavy_vertices() {
        let mut graph = lattice(&["mountains"]);
        // block the centre and the top middle
        graph
            .incr_weights(
                &[Point::new(10, 10), Point::new(10, 0)],
                &[("mountains", 1000)],
            )
            .unwrap();
        let path = graph
            .shortest("mountains", Point::new(0, 0), Point::new(20, 0))
            .unwrap();
        assert!(!path.contains(&Point::new(10, 10)));
        assert!(!path.contains(&Point::new(10, 0)));
        assert_eq!(path.last(), Some(&Point::new(20, 0)));
    }

    #[test]
    fn test_shortest_same_vertex() {
        let graph = lattice(&["mountains"]);
        let path = graph
            .shortest("mountains", Point::new(10, 10), Point::new(11, 11))
            .unwrap();
        assert_eq!(path, vec![Point::new(10, 10)]);
    }

    #[test]
    fn test_shortest_errors() {
        let vertices = vec![Point::new(0, 0), Point::new(10, 0), Point::new(50, 50)];
        let graph = PathGraph::new(1, &["sea-current"], vertices, &[(0, 1)]).unwrap();

        match graph.shortest("sea-current", Point::new(0, 0), Point::new(50, 50)) {
            Err(GenesisError::NoPath(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        match graph.shortest("lava", Point::new(0, 0), Point::new(10, 0)) {
            Err(GenesisError::NoPath(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_channel_changes_nothing() {
        let mut graph = lattice(&["mountains"]);
        let v = Point::new(0, 0);
        let err = graph
            .incr_weights(&[v], &[("mountains", 10), ("lava", 1)])
            .unwrap_err();
        assert!(matches!(err, GenesisError::InvalidChannel(name) if name == "lava"));
        assert_eq!(graph.weight("mountains", v).unwrap(), 5);
    }

    #[test]
    fn test_incr_weights_outside_is_strict() {
        let mut graph = lattice(&["mountains"]);
        graph
            .incr_weights_outside(Rect::new(0, 0, 10, 10), &[("mountains", 1)])
            .unwrap();
        // boundary vertices are not outside
        assert_eq!(graph.weight("mountains", Point::new(0, 0)).unwrap(), 5);
        assert_eq!(graph.weight("mountains", Point::new(10, 10)).unwrap(), 5);
        assert_eq!(graph.weight("mountains", Point::new(20, 0)).unwrap(), 6);
        assert_eq!(graph.weight("mountains", Point::new(0, 20)).unwrap(), 6);
    }

    #[test]
    fn test_neighbours_exclude_members() {
        let graph = lattice(&["mountains"]);
        let found = graph
            .neighbours(&[Point::new(0, 0), Point::new(10, 0)])
            .unwrap();
        // vertex order
        assert_eq!(
            found,
            vec![Point::new(20, 0), Point::new(0, 10), Point::new(10, 10)]
        );
    }

    #[test]
    fn test_tags() {
        let mut graph = lattice(&["mountains"]);
        assert!(matches!(graph.from_tag("spine"), Err(GenesisError::NotFound(_))));
        graph.tag("spine", &[Point::new(0, 0), Point::new(10, 0)]);
        assert_eq!(graph.from_tag("spine").unwrap().len(), 2);
    }

    #[test]
    fn test_random_and_closest_point() {
        let graph = lattice(&["mountains"]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..20 {
            let p = graph.random_point(&mut rng).unwrap();
            assert!(graph.vertices().contains(&p));
        }
        assert_eq!(graph.closest_point(Point::new(18, 3)).unwrap(), Point::new(20, 0));

        let empty = PathGraph::new(0, &["mountains"], Vec::new(), &[]).unwrap();
        assert!(empty.random_point(&mut rng).is_err());
        assert!(empty.closest_point(Point::new(0, 0)).is_err());
    }

    #[test]
    fn test_json_restores_weights_and_tags() {
        let mut graph = lattice(&["mountains", "ravines"]);
        graph
            .incr_weights(&[Point::new(10, 0)], &[("ravines", 7)])
            .unwrap();
        graph.tag("gorge", &[Point::new(10, 0)]);

        let text = serde_json::to_string(&graph).unwrap();
        let loaded: PathGraph = serde_json::from_str(&text).unwrap();

        assert_eq!(loaded.weight("ravines", Point::new(10, 0)).unwrap(), 12);
        assert_eq!(
            loaded.arc_cost("ravines", Point::new(0, 0), Point::new(10, 0)).unwrap(),
            Some(12)
        );
        assert_eq!(loaded.from_tag("gorge").unwrap(), &[Point::new(10, 0)]);
        assert_eq!(loaded.edges().len(), graph.edges().len());
    }

    #[test]
    fn test_bad_edge_is_rejected() {
        let err = PathGraph::new(0, &["a"], vec![Point::new(0, 0)], &[(0, 3)]).unwrap_err();
        assert!(matches!(err, GenesisError::NotFound(_)));
    }
}
