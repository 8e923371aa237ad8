//! Spatial bucketing of points into fixed-size square cells.
//!
//! Used to build sparse graphs over many points: points in one cell may all
//! be joined, while only a few links are allowed between neighbouring cells.

use std::collections::BTreeSet;
use std::sync::mpsc;

use log::debug;

use crate::geometry::Point;

/// Points bucketed by cell, optionally wrapping at the world edges.
#[derive(Clone, Debug)]
pub struct GridIndex {
    size: i32,
    wrap: bool,
    cols: i32,
    rows: i32,
    buckets: Vec<Vec<usize>>,
}

/// A candidate link between two points and its weight (lower is better).
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    a: usize,
    b: usize,
    weight: f64,
}

impl GridIndex {
    pub fn new(width: i32, height: i32, size: i32, wrap: bool) -> Self {
        let size = size.max(1);
        let cols = ((width + size - 1) / size).max(1);
        let rows = ((height + size - 1) / size).max(1);
        Self {
            size,
            wrap,
            cols,
            rows,
            buckets: vec![Vec::new(); (cols * rows) as usize],
        }
    }

    pub fn cell_count(&self) -> usize {
        self.buckets.len()
    }

    /// Points off the grid land in the nearest edge cell.
    fn cell_of(&self, p: Point) -> usize {
        let cx = (p.x / self.size).clamp(0, self.cols - 1);
        let cy = (p.y / self.size).clamp(0, self.rows - 1);
        (cy * self.cols + cx) as usize
    }

    /// Up to 8 cells around `cell`, never `cell` itself.
    fn adjacent_cells(&self, cell: usize) -> Vec<usize> {
        let cx = cell as i32 % self.cols;
        let cy = cell as i32 / self.cols;
        let mut found = BTreeSet::new();

        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (mut nx, mut ny) = (cx + dx, cy + dy);
                if self.wrap {
                    nx = nx.rem_euclid(self.cols);
                    ny = ny.rem_euclid(self.rows);
                } else if nx < 0 || ny < 0 || nx >= self.cols || ny >= self.rows {
                    continue;
                }
                let n = (ny * self.cols + nx) as usize;
                if n != cell {
                    found.insert(n);
                }
            }
        }

        found.into_iter().collect()
    }

    pub fn add_point(&mut self, id: usize, p: Point) {
        let cell = self.cell_of(p);
        self.buckets[cell].push(id);
    }

    /// Ids in the same cell as `p`. Points in a neighbouring cell may be
    /// closer.
    pub fn neighbouring_points(&self, p: Point) -> &[usize] {
        &self.buckets[self.cell_of(p)]
    }

    /// Ids in the cells around the one holding `p`, excluding that cell.
    pub fn neighbouring_grids(&self, p: Point) -> Vec<usize> {
        self.adjacent_cells(self.cell_of(p))
            .into_iter()
            .flat_map(|c| self.buckets[c].iter().copied())
            .collect()
    }

    /// Offer point pairs to weighting functions and collect accepted links.
    ///
    /// Every pair inside a cell goes to `internal`. Every pair split across
    /// two neighbouring cells goes to `external`, and for each such cell pair
    /// only the `max_external` lightest links are kept. A negative weight
    /// rejects the pair. One worker runs per cell; the result is sorted.
    pub fn build_edges<I, E>(&self, internal: I, external: E, max_external: usize) -> Vec<(usize, usize)>
    where
        I: Fn(usize, usize) -> f64 + Sync,
        E: Fn(usize, usize) -> f64 + Sync,
    {
        let (tx, rx) = mpsc::channel::<(usize, usize)>();
        let internal = &internal;
        let external = &external;

        rayon::scope(|s| {
            for cell in 0..self.buckets.len() {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let here = &self.buckets[cell];

                    for (i, a) in here.iter().enumerate() {
                        for b in &here[i + 1..] {
                            if internal(*a, *b) >= 0.0 {
                                let _ = tx.send((*a, *b));
                            }
                        }
                    }

                    // each cell pair is handled by the lower numbered cell
                    for other in self.adjacent_cells(cell).into_iter().filter(|o| *o > cell) {
                        let mut candidates: Vec<Candidate> = Vec::new();
                        for a in here {
                            for b in &self.buckets[other] {
                                let weight = external(*a, *b);
                                if weight >= 0.0 {
                                    candidates.push(Candidate { a: *a, b: *b, weight });
                                }
                            }
                        }
                        candidates.sort_by(|x, y| {
                            x.weight
                                .total_cmp(&y.weight)
                                .then(x.a.cmp(&y.a))
                                .then(x.b.cmp(&y.b))
                        });
                        for c in candidates.into_iter().take(max_external) {
                            let _ = tx.send((c.a, c.b));
                        }
                    }
                });
            }
        });
        // every worker has finished; closing the last sender ends the stream
        drop(tx);

        let mut edges: Vec<(usize, usize)> = rx.into_iter().collect();
        edges.sort_unstable();
        debug!("grid of {} cells produced {} edges", self.buckets.len(), edges.len());
        edges
    }
}
