use std::sync::Arc;

/// Piecewise-linear remap applied to heights before they are scaled into mesh space.
///
/// Keys are `(t, value)` pairs sorted by `t`. Inputs outside the key range clamp
/// to the first/last value.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightCurve {
    keys: Arc<[(f32, f32)]>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl HeightCurve {
    pub fn linear() -> Self {
        Self {
            keys: Arc::from(vec![(0.0, 0.0), (1.0, 1.0)]),
        }
    }

    /// Builds a curve from keys in any order; non-finite keys are dropped.
    /// An empty key list yields the identity curve.
    pub fn from_keys(keys: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut keys: Vec<(f32, f32)> = keys
            .into_iter()
            .filter(|(t, v)| t.is_finite() && v.is_finite())
            .collect();
        if keys.is_empty() {
            return Self::linear();
        }
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys: keys.into() }
    }

    #[inline]
    pub fn keys(&self) -> &[(f32, f32)] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let keys = &self.keys;
        let (first, last) = (keys[0], keys[keys.len() - 1]);
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        // first key with k.0 > t; guaranteed 1..len by the bounds above
        let hi = keys.partition_point(|k| k.0 <= t);
        let (t0, v0) = keys[hi - 1];
        let (t1, v1) = keys[hi];
        let span = t1 - t0;
        if span <= f32::EPSILON {
            return v1;
        }
        v0 + (v1 - v0) * ((t - t0) / span)
    }
}
