use std::sync::Arc;

use terra_geom::Color;

/// Row-major grid of height samples; `(x, y)` lives at `y * width + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl HeightMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    /// Wraps existing samples; `values` is truncated or zero-padded to `width * height`.
    pub fn from_values(width: usize, height: usize, mut values: Vec<f32>) -> Self {
        values.resize(width * height, 0.0);
        Self {
            width,
            height,
            values,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.values[i] = v;
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Output of one chunk-data build.
///
/// `heights` is padded by one cell on every side (`chunk_size + 2` square) so the
/// mesher can derive edge normals; `colors` covers the `chunk_size` square whose
/// cell `(x, y)` is height cell `(x, y)`, stored at `y * chunk_size + x`.
///
/// Grids are behind `Arc`, so cloning is cheap and the value can be forwarded
/// to a mesh request while the caller keeps it.
#[derive(Clone, Debug)]
pub struct MapData {
    chunk_size: usize,
    heights: Arc<HeightMap>,
    colors: Arc<[Color]>,
}

impl MapData {
    pub(crate) fn new(chunk_size: usize, heights: HeightMap, colors: Vec<Color>) -> Self {
        debug_assert_eq!(heights.width(), chunk_size + 2);
        debug_assert_eq!(heights.height(), chunk_size + 2);
        debug_assert_eq!(colors.len(), chunk_size * chunk_size);
        Self {
            chunk_size,
            heights: Arc::new(heights),
            colors: colors.into(),
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn height_map(&self) -> &HeightMap {
        &self.heights
    }

    /// Shared handle to the height field, for handing to a mesh build.
    #[inline]
    pub fn height_map_arc(&self) -> Arc<HeightMap> {
        Arc::clone(&self.heights)
    }

    #[inline]
    pub fn color_map(&self) -> &[Color] {
        &self.colors
    }

    #[inline]
    pub fn color_at(&self, x: usize, y: usize) -> Color {
        self.colors[y * self.chunk_size + x]
    }

    /// True when both grids have the dimensions `chunk_size` implies.
    pub fn is_consistent(&self) -> bool {
        let padded = self.chunk_size + 2;
        self.heights.width() == padded
            && self.heights.height() == padded
            && self.colors.len() == self.chunk_size * self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_is_row_major() {
        let mut hm = HeightMap::new(3, 2);
        hm.set(2, 1, 0.75);
        assert_eq!(hm.values()[5], 0.75);
        assert_eq!(hm.get(2, 1), 0.75);
    }

    #[test]
    fn from_values_pads_short_input() {
        let hm = HeightMap::from_values(2, 2, vec![1.0]);
        assert_eq!(hm.values(), &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn map_data_clone_shares_grids() {
        let md = MapData::new(2, HeightMap::new(4, 4), vec![Color::CLEAR; 4]);
        let copy = md.clone();
        assert!(Arc::ptr_eq(&md.height_map_arc(), &copy.height_map_arc()));
        assert!(copy.is_consistent());
    }
}
