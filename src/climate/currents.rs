//! Ocean currents: routes through open water from the equator to the poles.

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::geometry::{line_points, Point};
use crate::grid::GridIndex;
use crate::pathgraph::PathGraph;
use crate::settings::OceanSettings;
use crate::tilemap::Tilemap;
use crate::world::layers;

use super::sea::Bands;

/// Find up to `wanted` currents between sea vertices in the equator band and
/// sea vertices in either polar band.
///
/// Links between vertices must cross open water only. Each accepted current
/// makes its vertices dearer so later currents spread out.
pub fn find_currents<R: Rng>(
    sea: &Tilemap<bool>,
    vertices: &[Point],
    set: &OceanSettings,
    bands: Bands,
    wanted: usize,
    rng: &mut R,
) -> Result<Vec<Vec<Point>>> {
    if wanted == 0 {
        return Ok(Vec::new());
    }
    let is_sea = |p: Point| sea.in_bounds(p.x, p.y) && *sea.get(p.x as usize, p.y as usize);
    let height = sea.height as i32;

    let mut points = Vec::new();
    let mut grid = GridIndex::new(sea.width as i32, height, set.current_grid_size, false);
    let (mut north, mut south, mut equator) = (Vec::new(), Vec::new(), Vec::new());

    for v in vertices.iter().copied().filter(|v| is_sea(*v)) {
        let i = points.len();
        points.push(v);
        grid.add_point(i, v);
        if v.y <= bands.arctic {
            north.push(i);
        } else if v.y >= height - bands.arctic {
            south.push(i);
        } else if v.y >= bands.equator_top && v.y <= bands.equator_bottom {
            equator.push(i);
        }
    }

    let open_water = |a: usize, b: usize| line_points(points[a], points[b]).into_iter().all(is_sea);
    let edges = grid.build_edges(
        |a, b| if open_water(a, b) { 0.0 } else { -1.0 },
        |a, b| {
            if open_water(a, b) {
                points[a].distance(&points[b])
            } else {
                -1.0
            }
        },
        set.current_links,
    );
    debug!(
        "current graph: {} sea vertices, {} links, {} equatorial, {} polar",
        points.len(),
        edges.len(),
        equator.len(),
        north.len() + south.len()
    );

    let mut graph = PathGraph::new(0, &[layers::SEA_CURRENT], points.clone(), &edges)?;
    let reuse = [(layers::SEA_CURRENT, set.current_reuse_weight)];
    let mut currents = Vec::new();

    for from in &equator {
        for to in north.iter().chain(south.iter()) {
            // disconnected pairs are expected where land splits the sea
            let Ok(path) = graph.shortest(layers::SEA_CURRENT, points[*from], points[*to]) else {
                continue;
            };
            if path.len() < 2 {
                continue;
            }
            graph.incr_weights(&path, &reuse)?;
            currents.push(path);
        }
    }

    if currents.is_empty() {
        warn!("no ocean currents link the equator to either pole");
    }
    if currents.len() > wanted {
        currents.shuffle(rng);
        currents.truncate(wanted);
    }
    Ok(currents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn lattice(size: i32, step: i32) -> Vec<Point> {
        let mut out = Vec::new();
        for y in (0..size).step_by(step as usize) {
            for x in (0..size).step_by(step as usize) {
                out.push(Point::new(x + step / 2, y + step / 2));
            }
        }
        out
    }

    fn settings() -> OceanSettings {
        OceanSettings {
            current_grid_size: 50,
            ..OceanSettings::default()
        }
    }

    #[test]
    fn test_currents_run_equator_to_pole() {
        let sea = Tilemap::new_with(200, 200, true);
        let bands = Bands::new(200, 40, 30);
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        let currents = find_currents(&sea, &lattice(200, 20), &settings(), bands, 3, &mut rng).unwrap();
        assert_eq!(currents.len(), 3);
        for current in &currents {
            let start = current[0];
            let end = current[current.len() - 1];
            assert!(start.y >= bands.equator_top && start.y <= bands.equator_bottom);
            assert!(end.y <= bands.arctic || end.y >= 200 - bands.arctic);
        }
    }

    #[test]
    fn test_land_blocks_currents() {
        let mut sea = Tilemap::new_with(200, 200, true);
        // a continent spanning the world between the equator and the north
        for y in 45..60 {
            for x in 0..200 {
                sea.set(x, y, false);
            }
        }
        let bands = Bands::new(200, 40, 30);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let currents = find_currents(&sea, &lattice(200, 20), &settings(), bands, 100, &mut rng).unwrap();
        assert!(!currents.is_empty());
        for current in &currents {
            assert!(current[current.len() - 1].y >= 200 - bands.arctic);
            assert!(current.iter().all(|p| p.y < 45 || p.y >= 60));
        }
    }

    #[test]
    fn test_no_currents_wanted() {
        let sea = Tilemap::new_with(50, 50, true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let currents =
            find_currents(&sea, &lattice(50, 10), &settings(), Bands::new(50, 10, 10), 0, &mut rng)
                .unwrap();
        assert!(currents.is_empty());
    }
}
