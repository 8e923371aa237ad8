/// A 2D tilemap grid over a bounded, non-wrapping rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// True when `(x, y)` lies on the map.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// 8-connected neighbours; cells off the map are skipped.
    pub fn neighbors_8(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(8);

        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if self.in_bounds(nx, ny) {
                    result.push((nx as usize, ny as usize));
                }
            }
        }

        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % self.width;
            let y = idx / self.width;
            (x, y, val)
        })
    }
}

impl Tilemap<bool> {
    /// Number of cells set to `true`.
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_do_not_wrap() {
        let map: Tilemap<u8> = Tilemap::new(4, 3);
        assert_eq!(map.neighbors_8(0, 0).len(), 3);
        assert_eq!(map.neighbors_8(3, 2).len(), 3);
        assert_eq!(map.neighbors_8(1, 1).len(), 8);
        assert_eq!(map.neighbors_8(0, 1).len(), 5);
        assert!(!map.neighbors_8(0, 0).contains(&(3, 0)));
    }

    #[test]
    fn test_set_get_iter() {
        let mut map = Tilemap::new_with(3, 2, false);
        map.set(2, 1, true);
        assert!(*map.get(2, 1));
        assert_eq!(map.count_true(), 1);
        let hits: Vec<_> = map.iter().filter(|(_, _, v)| **v).map(|(x, y, _)| (x, y)).collect();
        assert_eq!(hits, vec![(2, 1)]);
        assert!(map.in_bounds(2, 1));
        assert!(!map.in_bounds(3, 1));
        assert!(!map.in_bounds(-1, 0));
    }
}
