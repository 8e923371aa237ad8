//! Planar subdivision of the world into cells around random sites.
//!
//! The default backend triangulates the sites (Bowyer-Watson) and takes the
//! circumcentres of the triangles around each site as the corners of that
//! site's cell. Two cells are neighbours when their sites share a triangle
//! edge.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{GenesisError, Result};
use crate::geometry::{Point, Rect};

/// Builds a [`Subdivision`]. Chosen when an editor is constructed.
pub trait SubdivisionBuilder: Send + Sync {
    /// Place up to `target` random sites at least `min_spacing` apart and
    /// subdivide `bounds` around them.
    fn build(&self, bounds: Rect, seed: u64, target: usize, min_spacing: i32) -> Result<Subdivision>;

    /// Subdivide `bounds` around known sites, e.g. when loading a saved graph.
    fn rebuild(&self, bounds: Rect, sites: &[Point]) -> Result<Subdivision>;
}

/// One cell of the subdivision.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub id: usize,
    pub site: Point,
    /// Corners in angular order around the site
    pub polygon: Vec<Point>,
    /// Ids of cells sharing a border with this one
    pub neighbours: Vec<usize>,
}

impl Cell {
    /// Border segments, closing back to the first corner.
    pub fn edges(&self) -> Vec<(Point, Point)> {
        let n = self.polygon.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n)
            .map(|i| (self.polygon[i], self.polygon[(i + 1) % n]))
            .filter(|(a, b)| a != b)
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Subdivision {
    pub bounds: Rect,
    cells: Vec<Cell>,
}

impl Subdivision {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: usize) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn sites(&self) -> Vec<Point> {
        self.cells.iter().map(|c| c.site).collect()
    }

    pub fn random_cell<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        if self.cells.is_empty() {
            None
        } else {
            Some(rng.gen_range(0..self.cells.len()))
        }
    }

    /// Id of the cell whose site is closest to `p`.
    pub fn nearest_site(&self, p: Point) -> Option<usize> {
        self.cells
            .iter()
            .min_by_key(|c| c.site.distance_sq(&p))
            .map(|c| c.id)
    }

    /// Cells bordering any of `ids` that are not in `ids` themselves.
    pub fn neighbouring_cells(&self, ids: &[usize]) -> Vec<usize> {
        let given: BTreeSet<usize> = ids.iter().copied().collect();
        let found: BTreeSet<usize> = given
            .iter()
            .filter_map(|id| self.cells.get(*id))
            .flat_map(|c| c.neighbours.iter().copied())
            .filter(|id| !given.contains(id))
            .collect();
        found.into_iter().collect()
    }
}

/// Delaunay triangulation with Voronoi cells derived from it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DelaunayVoronoi;

impl SubdivisionBuilder for DelaunayVoronoi {
    fn build(&self, bounds: Rect, seed: u64, target: usize, min_spacing: i32) -> Result<Subdivision> {
        let sites = place_sites(bounds, seed, target, min_spacing);
        self.rebuild(bounds, &sites)
    }

    fn rebuild(&self, bounds: Rect, sites: &[Point]) -> Result<Subdivision> {
        if bounds.is_empty() {
            return Err(GenesisError::Validation(format!("empty bounds {:?}", bounds)));
        }
        if sites.len() < 3 {
            return Err(GenesisError::Validation(format!(
                "need at least 3 sites to subdivide, got {}",
                sites.len()
            )));
        }

        let triangles = triangulate(sites);
        let n = sites.len();

        let mut around: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut neighbours: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                let a = tri.v[k];
                let b = tri.v[(k + 1) % 3];
                if a < n {
                    around[a].push(t);
                }
                if a < n && b < n {
                    neighbours[a].insert(b);
                    neighbours[b].insert(a);
                }
            }
        }

        let cells = sites
            .iter()
            .enumerate()
            .map(|(id, site)| {
                let mut corners: Vec<(f64, f64)> =
                    around[id].iter().map(|t| triangles[*t].centre).collect();
                corners.sort_by(|a, b| {
                    let ta = (a.1 - site.y as f64).atan2(a.0 - site.x as f64);
                    let tb = (b.1 - site.y as f64).atan2(b.0 - site.x as f64);
                    ta.total_cmp(&tb)
                });

                let mut polygon: Vec<Point> = Vec::with_capacity(corners.len());
                for (x, y) in corners {
                    let p = clamp_to(bounds, x, y);
                    if polygon.last() != Some(&p) {
                        polygon.push(p);
                    }
                }
                while polygon.len() > 1 && polygon.first() == polygon.last() {
                    polygon.pop();
                }

                Cell {
                    id,
                    site: *site,
                    polygon,
                    neighbours: neighbours[id].iter().copied().collect(),
                }
            })
            .collect();

        Ok(Subdivision { bounds, cells })
    }
}

/// Random sites, rejecting any closer than `min_spacing` to one already
/// placed. Gives up after `2 * target` attempts.
fn place_sites(bounds: Rect, seed: u64, target: usize, min_spacing: i32) -> Vec<Point> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let min_sq = (min_spacing as i64) * (min_spacing as i64);
    let mut sites: Vec<Point> = Vec::with_capacity(target);

    if bounds.is_empty() {
        return sites;
    }

    for _ in 0..target * 2 {
        if sites.len() >= target {
            break;
        }
        let p = Point::new(
            rng.gen_range(bounds.min.x..bounds.max.x),
            rng.gen_range(bounds.min.y..bounds.max.y),
        );
        if sites.iter().all(|s| s.distance_sq(&p) >= min_sq) {
            sites.push(p);
        }
    }

    sites
}

fn clamp_to(bounds: Rect, x: f64, y: f64) -> Point {
    let x = x.round().clamp(bounds.min.x as f64, (bounds.max.x - 1) as f64);
    let y = y.round().clamp(bounds.min.y as f64, (bounds.max.y - 1) as f64);
    Point::new(x as i32, y as i32)
}

#[derive(Clone, Debug)]
struct Triangle {
    v: [usize; 3],
    centre: (f64, f64),
    radius_sq: f64,
}

impl Triangle {
    fn new(v: [usize; 3], pts: &[(f64, f64)]) -> Self {
        let (ax, ay) = pts[v[0]];
        let (bx, by) = pts[v[1]];
        let (cx, cy) = pts[v[2]];
        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < 1e-12 {
            // collinear; any later point evicts it
            return Self {
                v,
                centre: ((ax + bx + cx) / 3.0, (ay + by + cy) / 3.0),
                radius_sq: f64::INFINITY,
            };
        }
        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
        let radius_sq = (ax - ux) * (ax - ux) + (ay - uy) * (ay - uy);
        Self {
            v,
            centre: (ux, uy),
            radius_sq,
        }
    }

    fn encloses(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.centre.0;
        let dy = p.1 - self.centre.1;
        dx * dx + dy * dy < self.radius_sq
    }
}

/// Bowyer-Watson. Vertex ids `>= sites.len()` belong to the super triangle.
fn triangulate(sites: &[Point]) -> Vec<Triangle> {
    let mut pts: Vec<(f64, f64)> = sites.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let n = pts.len();

    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for (x, y) in &pts {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0) * 10.0;
    let (mid_x, mid_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    pts.push((mid_x - 20.0 * span, mid_y - span));
    pts.push((mid_x, mid_y + 20.0 * span));
    pts.push((mid_x + 20.0 * span, mid_y - span));

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &pts)];

    for i in 0..n {
        let p = pts[i];
        let (bad, keep): (Vec<Triangle>, Vec<Triangle>) =
            triangles.into_iter().partition(|t| t.encloses(p));
        triangles = keep;

        // edges of the cavity are those owned by exactly one evicted triangle
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for t in &bad {
            for k in 0..3 {
                let e = (t.v[k], t.v[(k + 1) % 3]);
                let shared = bad.iter().any(|o| {
                    !std::ptr::eq(o, t)
                        && (0..3).any(|j| {
                            let f = (o.v[j], o.v[(j + 1) % 3]);
                            (f.0 == e.0 && f.1 == e.1) || (f.0 == e.1 && f.1 == e.0)
                        })
                });
                if !shared {
                    boundary.push(e);
                }
            }
        }

        for (a, b) in boundary {
            triangles.push(Triangle::new([a, b, i], &pts));
        }
    }

    triangles
}
