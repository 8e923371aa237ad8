//! Pixel-space geometry: points, rectangles, compass headings and paths.

use bresenham::Bresenham;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A pixel coordinate. `y` grows downward, as in image space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_sq(&self, other: &Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

/// Half-open rectangle: `min` is inside, `max` is not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// True when `p` lies strictly outside; points on the boundary are not outside.
    pub fn strictly_outside(&self, p: Point) -> bool {
        p.x < self.min.x || p.x > self.max.x || p.y < self.min.y || p.y > self.max.y
    }

    /// Shrink by `n` pixels on every side.
    pub fn inset(&self, n: i32) -> Rect {
        Rect::new(self.min.x + n, self.min.y + n, self.max.x - n, self.max.y - n)
    }

    /// Intersection with another rectangle (may be empty).
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        )
    }
}

/// One of the eight compass directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Heading {
    /// All headings in clockwise order starting from north.
    pub const ALL: [Heading; 8] = [
        Heading::North,
        Heading::NorthEast,
        Heading::East,
        Heading::SouthEast,
        Heading::South,
        Heading::SouthWest,
        Heading::West,
        Heading::NorthWest,
    ];

    fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|h| h == self).unwrap_or(0)
    }

    pub fn opposite(&self) -> Heading {
        Self::ALL[(self.ordinal() + 4) % 8]
    }

    /// One pixel step `(dx, dy)` in this direction.
    pub fn rise_run(&self) -> (i32, i32) {
        match self {
            Heading::North => (0, -1),
            Heading::NorthEast => (1, -1),
            Heading::East => (1, 0),
            Heading::SouthEast => (1, 1),
            Heading::South => (0, 1),
            Heading::SouthWest => (-1, 1),
            Heading::West => (-1, 0),
            Heading::NorthWest => (-1, -1),
        }
    }
}

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Heading::North => "north",
            Heading::NorthEast => "northeast",
            Heading::East => "east",
            Heading::SouthEast => "southeast",
            Heading::South => "south",
            Heading::SouthWest => "southwest",
            Heading::West => "west",
            Heading::NorthWest => "northwest",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Heading {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Heading::North),
            "ne" | "northeast" => Ok(Heading::NorthEast),
            "e" | "east" => Ok(Heading::East),
            "se" | "southeast" => Ok(Heading::SouthEast),
            "s" | "south" => Ok(Heading::South),
            "sw" | "southwest" => Ok(Heading::SouthWest),
            "w" | "west" => Ok(Heading::West),
            "nw" | "northwest" => Ok(Heading::NorthWest),
            other => Err(format!("unknown heading '{}'", other)),
        }
    }
}

/// Every pixel on the straight line from `a` to `b`, both ends included.
pub fn line_points(a: Point, b: Point) -> Vec<Point> {
    let mut points: Vec<Point> = Bresenham::new(
        (a.x as isize, a.y as isize),
        (b.x as isize, b.y as isize),
    )
    .map(|(x, y)| Point::new(x as i32, y as i32))
    .collect();
    points.push(b);
    points
}

/// Sum of segment lengths along a path.
pub fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Longest prefix of `path` whose cumulative length does not exceed `max_dist`.
///
/// The first point is always kept, so the result is never empty for a
/// non-empty path.
pub fn trim_path(path: &[Point], max_dist: f64) -> Vec<Point> {
    let mut total = 0.0;
    for i in 1..path.len() {
        total += path[i - 1].distance(&path[i]);
        if total > max_dist {
            return path[..i].to_vec();
        }
    }
    path.to_vec()
}

/// A point between `min` and `max` pixels away from `p` on each axis, in a
/// random quadrant.
pub fn point_near<R: Rng>(p: Point, min: i32, max: i32, rng: &mut R) -> Point {
    let span = (max - min).max(1);
    let mut dx = rng.gen_range(0..span) + min;
    let mut dy = rng.gen_range(0..span) + min;
    if rng.gen_bool(0.5) {
        dx = -dx;
    }
    if rng.gen_bool(0.5) {
        dy = -dy;
    }
    Point::new(p.x + dx, p.y + dy)
}
