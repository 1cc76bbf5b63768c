//! Legend entries: one swatch per bin, preceded by "No Data".

use rgb::RGB8;
use crate::scale::Bins;

/// Label of the entry for missing observations.
pub const NO_DATA: &str = "No Data";

/// A legend swatch and the range of values it stands for.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry<C = RGB8> {
    pub color: C,
    pub label: String,
    /// `None` for the "No Data" entry.
    pub lower: Option<f64>,
    /// `None` for the "No Data" entry and the last bin.
    pub upper: Option<f64>,
}

/// Return the legend of a scale: the "No Data" entry followed by
/// one entry per bin, `colors[i]` labelled after bin `i`.
///
/// With `truncated`, labels are ranges `"{lower}-{upper}"` and the
/// last one reads `"{lower}+"`.  Otherwise each label shows the lower
/// bound only.
///
/// # Panics
///
/// If there is not exactly one color per bin.
pub fn build_legend<C, F>(colors: &[C], bins: &Bins, no_data: C,
                          truncated: bool, fmt: F) -> Vec<LegendEntry<C>>
where C: Clone,
      F: Fn(f64) -> String {
    assert_eq!(colors.len(), bins.steps(), "one color per bin is required");
    let mut entries = Vec::with_capacity(colors.len() + 1);
    entries.push(LegendEntry { color: no_data, label: NO_DATA.to_string(),
                               lower: None, upper: None });
    for (i, color) in colors.iter().enumerate() {
        let lower = bins.lower_bound(i);
        let upper = bins.upper_bound(i);
        let label = match (truncated, upper) {
            (true, Some(up)) => format!("{}-{}", fmt(lower), fmt(up)),
            (true, None) => format!("{}+", fmt(lower)),
            (false, _) => fmt(lower),
        };
        entries.push(LegendEntry { color: color.clone(), label,
                                   lower: Some(lower), upper });
    }
    entries
}

/// A legend together with the bins it describes.
#[derive(Clone, Debug)]
pub struct Legend<C = RGB8> {
    bins: Bins,
    entries: Vec<LegendEntry<C>>,
}

impl<C: Clone> Legend<C> {
    pub fn new<F>(colors: &[C], bins: Bins, no_data: C, truncated: bool,
                  fmt: F) -> Self
    where F: Fn(f64) -> String {
        let entries = build_legend(colors, &bins, no_data, truncated, fmt);
        Legend { bins, entries }
    }
}

impl<C> Legend<C> {
    pub fn entries(&self) -> &[LegendEntry<C>] { &self.entries }

    /// The entry whose swatch paints the observation `v`.
    pub fn entry_for(&self, v: Option<f64>) -> &LegendEntry<C> {
        match v.and_then(|v| self.bins.index(v)) {
            Some(i) => &self.entries[i + 1],
            None => &self.entries[0],
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{Classifier, Scheme};
    use crate::Interpolation;

    fn dollars(x: f64) -> String { format!("${x}") }

    #[test]
    fn truncated_labels() {
        let bins = Bins::new(75., 125., 11);
        assert_eq!(bins.increment(), 5.);
        let colors: Vec<u8> = (0 .. 11).collect();
        let legend = build_legend(&colors, &bins, 99, true, dollars);
        assert_eq!(legend.len(), 12);
        assert_eq!(legend[0], LegendEntry { color: 99, label: "No Data".into(),
                                            lower: None, upper: None });
        assert_eq!(legend[1].label, "$75-$80");
        assert_eq!(legend[10].label, "$120-$125");
        assert_eq!(legend[11].label, "$125+");
        assert_eq!(legend[11].upper, None);
        for k in 0 .. 11 {
            assert_eq!(legend[k + 1].color, colors[k]);
        }
    }

    #[test]
    fn single_sided_labels() {
        let bins = Bins::new(80., 125., 10);
        let colors = vec!['x'; 10];
        let legend = build_legend(&colors, &bins, '-', false, dollars);
        let labels: Vec<_> = legend.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["No Data", "$80", "$85", "$90", "$95", "$100",
                            "$105", "$110", "$115", "$120", "$125"]);
        // Bounds do not depend on the labelling.
        assert_eq!(legend[1].upper, Some(85.));
        assert_eq!(legend[10].upper, None);
    }

    #[test]
    fn idempotent() {
        let bins = Bins::new(0., 1., 6);
        let colors = Scheme::Sequential { low: RGB8::new(255, 255, 255),
                                          high: RGB8::new(0, 0, 0) }
            .colors(6, Interpolation::Hsl);
        let a = build_legend(&colors, &bins, RGB8::new(221, 221, 221), true,
                             |x| format!("{x:.1}"));
        let b = build_legend(&colors, &bins, RGB8::new(221, 221, 221), true,
                             |x| format!("{x:.1}"));
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "one color per bin")]
    fn length_mismatch() {
        build_legend(&[1, 2], &Bins::new(0., 1., 3), 0, true, dollars);
    }

    #[test]
    fn painted_color_is_a_swatch() {
        let bins = Bins::new(80., 125., 10);
        let colors = Scheme::Divergent { low: RGB8::new(215, 48, 39),
                                         mid: RGB8::new(255, 255, 191),
                                         high: RGB8::new(69, 117, 180) }
            .colors(10, Interpolation::Hsl);
        let no_data = RGB8::new(221, 221, 221);
        let legend = Legend::new(&colors, bins, no_data, true, dollars);
        let classifier = Classifier::new(bins, colors, no_data);
        let mut values: Vec<Option<f64>> = (0 ..= 600)
            .map(|k| Some(70. + k as f64 * 0.1))
            .collect();
        values.extend([None, Some(f64::NAN), Some(80.), Some(130.)]);
        for v in values {
            let entry = legend.entry_for(v);
            assert_eq!(*classifier.color(v), entry.color, "{v:?}");
            if let (Some(v), Some(lo)) = (v, entry.lower) {
                if v >= 80. { assert!(lo <= v, "{v} labelled {}", entry.label) }
            }
        }
        assert_eq!(legend.entry_for(Some(130.)).label, "$125+");
        assert_eq!(legend.entry_for(Some(80.)).label, "$80-$85");
        assert_eq!(legend.entry_for(None).label, "No Data");
    }
}
