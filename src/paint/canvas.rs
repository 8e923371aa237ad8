//! RGBA raster layer with the drawing primitives used by terrain and climate.

use std::collections::HashMap;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::{Point, Rect};
use crate::tilemap::Tilemap;

use super::LayerKey;

/// Depth profile of a gradient draw.
///
/// `Convex` is brightest at the centre and keeps the brighter of old and new
/// values; `Concave` is darkest at the centre and keeps the darker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Convex,
    Concave,
}

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Opaque grey of `v * weight`.
pub fn grey(v: u8, weight: f64) -> Rgba<u8> {
    if weight < 0.0 {
        return BLACK;
    }
    let v = (weight * v as f64) as u8;
    Rgba([v, v, v, 255])
}

/// Colour stops spread evenly: stop `i` of `n` sits at `i / n`.
fn even_stops(colours: &[Rgba<u8>]) -> Vec<(f64, Rgba<u8>)> {
    let delta = 1.0 / colours.len() as f64;
    colours
        .iter()
        .enumerate()
        .map(|(i, c)| (delta * i as f64, *c))
        .collect()
}

/// Stops for a gradient across the width of a stroke.
fn linear_stops(depth: f64, mode: Mode) -> Vec<(f64, Rgba<u8>)> {
    let depth = depth.clamp(0.0, 1.0);
    match mode {
        Mode::Convex => vec![
            (0.0, grey(255, depth)),
            (0.5, grey(128, depth)),
            (1.0, grey(0, 0.0)),
        ],
        Mode::Concave => vec![
            (0.0, grey(0, 0.0)),
            (0.5, grey(128, depth)),
            (1.0, grey(255, depth)),
        ],
    }
}

/// Stops for a gradient running out from a centre point.
fn radial_stops(depth: f64, mode: Mode) -> Vec<(f64, Rgba<u8>)> {
    let depth = depth.clamp(0.0, 1.0);
    match mode {
        Mode::Convex => vec![
            (0.0, grey(255, depth)),
            (0.3, grey(128, depth)),
            (0.5, grey(80, depth)),
            (0.75, grey(50, depth)),
            (0.95, grey(25, depth)),
            (1.0, grey(0, 0.0)),
        ],
        Mode::Concave => vec![
            (0.0, grey(0, 0.0)),
            (0.1, grey(5, depth)),
            (0.25, grey(20, depth)),
            (0.5, grey(50, depth)),
            (0.75, grey(100, depth)),
            (1.0, grey(255, depth)),
        ],
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 * (1.0 - t) + b as f64 * t).round().clamp(0.0, 255.0) as u8
}

/// Colour at `pos` along a gradient. Before the first stop the first colour
/// is used, after the last stop the last colour.
fn colour_at(pos: f64, stops: &[(f64, Rgba<u8>)]) -> Rgba<u8> {
    let Some(first) = stops.first() else {
        return BLACK;
    };
    if pos <= first.0 || stops.len() == 1 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if pos < p1 {
            let t = if p1 > p0 { (pos - p0) / (p1 - p0) } else { 1.0 };
            return Rgba([
                lerp(c0[0], c1[0], t),
                lerp(c0[1], c1[1], t),
                lerp(c0[2], c1[2], t),
                lerp(c0[3], c1[3], t),
            ]);
        }
    }
    stops[stops.len() - 1].1
}

/// Distance from `p` to the segment `a`-`b`, and how far along it (0..=1)
/// the nearest point lies.
fn segment_distance(p: (f64, f64), a: Point, b: Point) -> (f64, f64) {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - ax) * dx + (p.1 - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (nx, ny) = (ax + t * dx, ay + t * dy);
    (((p.0 - nx).powi(2) + (p.1 - ny).powi(2)).sqrt(), t)
}

/// A named RGBA layer. Writes are dropped where the mask is unset.
#[derive(Clone, Debug)]
pub struct Canvas {
    key: LayerKey,
    image: RgbaImage,
    mask: Option<Tilemap<bool>>,
}

impl Canvas {
    /// Opaque black canvas.
    pub fn new(key: LayerKey, width: u32, height: u32) -> Self {
        Self::from_image(key, RgbaImage::from_pixel(width, height, BLACK))
    }

    pub fn from_image(key: LayerKey, image: RgbaImage) -> Self {
        Self {
            key,
            image,
            mask: None,
        }
    }

    pub fn key(&self) -> &LayerKey {
        &self.key
    }

    /// Same pixels under another key, without the mask.
    pub fn renamed(&self, key: LayerKey) -> Self {
        Self::from_image(key, self.image.clone())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height()
    }

    fn writable(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y)
            && self
                .mask
                .as_ref()
                .map_or(true, |m| !m.in_bounds(x, y) || *m.get(x as usize, y as usize))
    }

    /// Pixel at `(x, y)`, or `None` off the canvas.
    pub fn get(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if self.in_bounds(x, y) {
            Some(*self.image.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Red channel; zero off the canvas.
    pub fn r(&self, x: i32, y: i32) -> u8 {
        self.get(x, y).map_or(0, |c| c[0])
    }

    pub fn g(&self, x: i32, y: i32) -> u8 {
        self.get(x, y).map_or(0, |c| c[1])
    }

    pub fn b(&self, x: i32, y: i32) -> u8 {
        self.get(x, y).map_or(0, |c| c[2])
    }

    pub fn set(&mut self, x: i32, y: i32, colour: Rgba<u8>) {
        if self.writable(x, y) {
            self.image.put_pixel(x as u32, y as u32, colour);
        }
    }

    fn blend(&mut self, x: i32, y: i32, colour: Rgba<u8>, mode: Mode) {
        if !self.writable(x, y) {
            return;
        }
        let old = self.image.get_pixel(x as u32, y as u32);
        let mut out = [0u8; 4];
        for c in 0..3 {
            out[c] = match mode {
                Mode::Convex => old[c].max(colour[c]),
                Mode::Concave => old[c].min(colour[c]),
            };
        }
        out[3] = 255;
        self.image.put_pixel(x as u32, y as u32, Rgba(out));
    }

    /// Restrict later writes to pixels where `mask` is set. `None` lifts
    /// the restriction.
    pub fn set_mask(&mut self, mask: Option<Tilemap<bool>>) {
        self.mask = mask;
    }

    /// Filled ellipse with radii `rx`, `ry` rotated by `rotation` degrees.
    ///
    /// The gradient is radial around `centre` and reaches its last stop at
    /// twice the major radius, so the rim stays part way down the profile.
    pub fn ellipse(&mut self, centre: Point, rx: i32, ry: i32, rotation: i32, depth: f64, mode: Mode) {
        let rx = rx.max(1) as f64;
        let ry = ry.max(1) as f64;
        let major = rx.max(ry);
        let outer = major * 2.0;
        let inner = 2.0f64.min(outer / 2.0);
        let stops = radial_stops(depth, mode);
        let (sin, cos) = (rotation as f64).to_radians().sin_cos();

        let reach = major.ceil() as i32;
        for y in centre.y - reach..=centre.y + reach {
            for x in centre.x - reach..=centre.x + reach {
                let dx = (x - centre.x) as f64;
                let dy = (y - centre.y) as f64;
                let u = dx * cos + dy * sin;
                let v = -dx * sin + dy * cos;
                if (u / rx).powi(2) + (v / ry).powi(2) > 1.0 {
                    continue;
                }
                let dist = (dx * dx + dy * dy).sqrt();
                let t = ((dist - inner) / (outer - inner)).clamp(0.0, 1.0);
                self.blend(x, y, colour_at(t, &stops), mode);
            }
        }
    }

    /// Pixels within `width / 2` of the polyline, with the distance to the
    /// nearest segment and the index and position along it.
    fn stroke_pixels(path: &[Point], width: f64) -> HashMap<Point, (f64, usize, f64)> {
        let half = width / 2.0;
        let reach = half.ceil() as i32;
        let mut hits: HashMap<Point, (f64, usize, f64)> = HashMap::new();

        for (seg, pair) in path.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            for y in a.y.min(b.y) - reach..=a.y.max(b.y) + reach {
                for x in a.x.min(b.x) - reach..=a.x.max(b.x) + reach {
                    let (d, t) = segment_distance((x as f64, y as f64), a, b);
                    if d > half {
                        continue;
                    }
                    let entry = hits.entry(Point::new(x, y)).or_insert((d, seg, t));
                    if d < entry.0 {
                        *entry = (d, seg, t);
                    }
                }
            }
        }

        hits
    }

    /// Stroke whose gradient runs across its width: the profile's first stop
    /// sits on the path, the last on the stroke's edge.
    pub fn channel(&mut self, path: &[Point], width: i32, depth: f64, mode: Mode) {
        if path.len() < 2 || width <= 0 {
            return;
        }
        let full = width as f64;
        let stops = linear_stops(depth, mode);
        for (p, (d, _, _)) in Self::stroke_pixels(path, full) {
            let pos = (2.0 * d / full).clamp(0.0, 1.0);
            self.blend(p.x, p.y, colour_at(pos, &stops), mode);
        }
    }

    /// Stroke whose gradient runs from the first point of the path to the
    /// last. Overwrites.
    pub fn line(&mut self, path: &[Point], width: u32, colours: &[Rgba<u8>]) {
        if path.len() < 2 || colours.is_empty() || width == 0 {
            return;
        }
        let stops = even_stops(colours);
        let (a, b) = (path[0], path[path.len() - 1]);
        let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
        let len_sq = dx * dx + dy * dy;

        for (p, _) in Self::stroke_pixels(path, width as f64) {
            let t = if len_sq == 0.0 {
                0.0
            } else {
                ((((p.x - a.x) as f64) * dx + ((p.y - a.y) as f64) * dy) / len_sq).clamp(0.0, 1.0)
            };
            self.set(p.x, p.y, colour_at(t, &stops));
        }
    }

    /// Solid fill of a convex polygon given as border segments in any order.
    pub fn polygon(&mut self, edges: &[(Point, Point)], colour: Rgba<u8>) {
        let mut corners: Vec<Point> = edges.iter().flat_map(|(a, b)| [*a, *b]).collect();
        corners.sort();
        corners.dedup();
        if corners.len() < 3 {
            return;
        }

        let n = corners.len() as f64;
        let cx = corners.iter().map(|p| p.x as f64).sum::<f64>() / n;
        let cy = corners.iter().map(|p| p.y as f64).sum::<f64>() / n;
        corners.sort_by(|a, b| {
            let ta = (a.y as f64 - cy).atan2(a.x as f64 - cx);
            let tb = (b.y as f64 - cy).atan2(b.x as f64 - cx);
            ta.total_cmp(&tb)
        });

        let min_x = corners.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = corners.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = corners.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = corners.iter().map(|p| p.y).max().unwrap_or(0);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let mut sign = 0i64;
                let mut inside = true;
                for i in 0..corners.len() {
                    let a = corners[i];
                    let b = corners[(i + 1) % corners.len()];
                    let cross = (b.x - a.x) as i64 * (y - a.y) as i64
                        - (b.y - a.y) as i64 * (x - a.x) as i64;
                    if cross != 0 {
                        if sign != 0 && cross.signum() != sign {
                            inside = false;
                            break;
                        }
                        sign = cross.signum();
                    }
                }
                if inside {
                    self.set(x, y, colour);
                }
            }
        }
    }

    /// Fill `area` with a gradient running from its top to its bottom.
    pub fn rectangle_vertical(&mut self, area: Rect, colours: &[Rgba<u8>]) {
        let area = area.intersect(&self.bounds());
        if colours.is_empty() || area.is_empty() {
            return;
        }
        let stops = even_stops(colours);
        let span = area.height() as f64;
        for y in area.min.y..area.max.y {
            let colour = colour_at((y - area.min.y) as f64 / span, &stops);
            for x in area.min.x..area.max.x {
                self.set(x, y, colour);
            }
        }
    }

    /// Blacken everything outside `area` and blur the seam. Pixels more than
    /// 5 inside the border of `area` keep their original value.
    pub fn flatten_outside(&mut self, area: Rect) {
        let original = self.image.clone();
        let mut flat = RgbaImage::from_pixel(self.width(), self.height(), BLACK);
        let keep = area.intersect(&self.bounds());
        for y in keep.min.y..keep.max.y {
            for x in keep.min.x..keep.max.x {
                flat.put_pixel(x as u32, y as u32, *original.get_pixel(x as u32, y as u32));
            }
        }

        let mut smoothed = smooth_rgba(&flat, 10);
        let inset = keep.inset(5);
        for y in inset.min.y..inset.max.y {
            for x in inset.min.x..inset.max.x {
                smoothed.put_pixel(x as u32, y as u32, *original.get_pixel(x as u32, y as u32));
            }
        }
        self.image = smoothed;
    }

    /// Radially weighted blur. A radius of zero leaves the canvas as it is.
    pub fn smooth(&mut self, radius: u32) {
        self.image = smooth_rgba(&self.image, radius);
    }
}

/// Kernel offsets and weights for a disc of `radius`, nearer pixels
/// weighing more.
fn kernel(radius: u32) -> Vec<(i32, i32, f32)> {
    let r = radius as i32;
    let mut taps = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            if dist <= radius as f32 {
                taps.push((dx, dy, 1.0 - dist / (radius as f32 + 1.0)));
            }
        }
    }
    taps
}

/// Blur an interleaved 8-bit buffer, clamping at the edges.
fn smooth_buffer(data: &[u8], width: usize, height: usize, channels: usize, radius: u32) -> Vec<u8> {
    if radius == 0 || width == 0 || height == 0 {
        return data.to_vec();
    }
    let taps = kernel(radius);
    let row_len = width * channels;
    let mut out = vec![0u8; data.len()];

    out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let mut sums = [0.0f32; 4];
            let mut total = 0.0f32;
            for (dx, dy, w) in &taps {
                let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
                let ny = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
                let base = ny * row_len + nx * channels;
                for c in 0..channels {
                    sums[c] += data[base + c] as f32 * w;
                }
                total += w;
            }
            for c in 0..channels {
                row[x * channels + c] = (sums[c] / total).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    out
}

fn smooth_rgba(image: &RgbaImage, radius: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let data = smooth_buffer(image.as_raw(), w as usize, h as usize, 4, radius);
    RgbaImage::from_raw(w, h, data).unwrap_or_else(|| image.clone())
}

/// Blur a greyscale image.
pub fn smooth_gray(image: &GrayImage, radius: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    let data = smooth_buffer(image.as_raw(), w as usize, h as usize, 1, radius);
    GrayImage::from_raw(w, h, data).unwrap_or_else(|| image.clone())
}

/// Weighted sum of the red channels of `layers` over `area`, clamped to
/// 0..=255. The result covers `area` only, so its `(0, 0)` is `area.min`.
pub fn merge(area: Rect, layers: &[(&Canvas, f64)]) -> GrayImage {
    let width = area.width().max(0) as u32;
    let height = area.height().max(0) as u32;
    let active: Vec<(&Canvas, f64)> = layers.iter().copied().filter(|(_, w)| *w != 0.0).collect();

    GrayImage::from_fn(width, height, |x, y| {
        let (px, py) = (area.min.x + x as i32, area.min.y + y as i32);
        let v: f64 = active
            .iter()
            .map(|(canvas, w)| w * canvas.r(px, py) as f64)
            .sum();
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}
