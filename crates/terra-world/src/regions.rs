//! Height → color classification against an ordered region table.

use std::sync::Arc;

use terra_geom::Color;

#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub name: String,
    /// Lowest height (inclusive) at which this region applies.
    pub height: f32,
    pub color: Color,
}

impl Region {
    pub fn new(name: impl Into<String>, height: f32, color: Color) -> Self {
        Self {
            name: name.into(),
            height,
            color,
        }
    }
}

/// Region table in authored order. Order is never changed after construction.
#[derive(Clone, Debug, Default)]
pub struct RegionTable {
    regions: Arc<[Region]>,
}

impl RegionTable {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions: regions.into(),
        }
    }

    #[inline]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Non-strict ascending thresholds. Only then does `classify` return the
    /// highest band not exceeding the height.
    pub fn is_ascending(&self) -> bool {
        self.regions.windows(2).all(|w| w[0].height <= w[1].height)
    }

    /// Index of the selected region, or `None` when `h` is below the first threshold.
    ///
    /// Scans from the start, keeps the latest entry whose threshold is `<= h`
    /// and stops at the first entry above `h`. Entries after that stop are never
    /// consulted, even if they would qualify.
    pub fn classify_index(&self, h: f32) -> Option<usize> {
        let mut selected = None;
        for (i, region) in self.regions.iter().enumerate() {
            if h >= region.height {
                selected = Some(i);
            } else {
                break;
            }
        }
        selected
    }

    /// Color for `h`, or [`Color::CLEAR`] if no region qualifies.
    #[inline]
    pub fn classify(&self, h: f32) -> Color {
        self.classify_index(h)
            .map(|i| self.regions[i].color)
            .unwrap_or(Color::CLEAR)
    }
}
