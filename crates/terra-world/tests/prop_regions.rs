use proptest::prelude::*;
use terra_geom::Color;
use terra_world::{Region, RegionTable, falloff_mask};

fn color_for(i: usize) -> Color {
    Color::rgb(i as u8, 255 - i as u8, 7)
}

fn table_from(thresholds: &[f32]) -> RegionTable {
    RegionTable::new(
        thresholds
            .iter()
            .enumerate()
            .map(|(i, h)| Region::new(format!("r{i}"), *h, color_for(i)))
            .collect(),
    )
}

fn thresholds() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(0.0f32..=1.0, 0..8)
}

proptest! {
    // Ascending tables: the greatest threshold <= h wins (last one on ties), else CLEAR
    #[test]
    fn ascending_table_selects_highest_qualifying(mut ts in thresholds(), h in 0.0f32..=1.0) {
        ts.sort_by(|a, b| a.total_cmp(b));
        let table = table_from(&ts);
        let expect = ts.iter().rposition(|t| *t <= h).map(color_for).unwrap_or(Color::CLEAR);
        prop_assert_eq!(table.classify(h), expect);
    }

    // Any order: result is the last entry of the maximal qualifying prefix
    #[test]
    fn arbitrary_table_uses_qualifying_prefix(ts in thresholds(), h in 0.0f32..=1.0) {
        let table = table_from(&ts);
        let prefix = ts.iter().take_while(|t| **t <= h).count();
        let expect = if prefix == 0 { Color::CLEAR } else { color_for(prefix - 1) };
        prop_assert_eq!(table.classify(h), expect);
    }

    // Falloff application always lands in [0, 1] and equals clamp01(raw - mask)
    #[test]
    fn falloff_application_is_clamped(
        size in 1usize..24,
        raw in -0.5f32..1.5,
        x in 0usize..24,
        y in 0usize..24
    ) {
        let mask = falloff_mask(size);
        let (x, y) = (x % size, y % size);
        let applied = mask.apply(x, y, raw);
        prop_assert!((0.0..=1.0).contains(&applied));
        prop_assert_eq!(applied, (raw - mask.get(x, y)).clamp(0.0, 1.0));
    }
}
