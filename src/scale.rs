//! Discrete color scales.
//!
//! A [`Scheme`] names two or three anchor colors.  They are blended
//! into `steps` swatches by [`build_colors`] and observations are
//! assigned to a swatch by the uniform quantizer [`Bins`].

use rgb::RGB8;
use serde::{Deserialize, Serialize};
use crate::{Gradient, Interpolation, Ramp, RGBColor};

/// An anchor color at a position of the index domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop<C = RGB8> {
    pub color: C,
    pub position: f64,
}

/// Anchor colors of a scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Scheme {
    /// From `low` to `high`.
    Sequential {
        #[serde(with = "crate::hex_color")]
        low: RGB8,
        #[serde(with = "crate::hex_color")]
        high: RGB8,
    },
    /// From `low` to `high` through `mid`, reached at the middle step.
    Divergent {
        #[serde(with = "crate::hex_color")]
        low: RGB8,
        #[serde(with = "crate::hex_color")]
        mid: RGB8,
        #[serde(with = "crate::hex_color")]
        high: RGB8,
    },
}

impl Scheme {
    /// The anchors placed on the index domain `[0, steps - 1]`.
    pub fn stops(&self, steps: usize) -> Vec<ColorStop> {
        let last = steps.saturating_sub(1) as f64;
        match *self {
            Scheme::Sequential { low, high } => vec![
                ColorStop { color: low, position: 0. },
                ColorStop { color: high, position: last },
            ],
            Scheme::Divergent { low, mid, high } => vec![
                ColorStop { color: low, position: 0. },
                ColorStop { color: mid, position: last / 2. },
                ColorStop { color: high, position: last },
            ],
        }
    }

    /// The `steps` swatches of this scheme.
    ///
    /// ```
    /// use rgb::RGB8;
    /// use choropleth::{Interpolation, Scheme};
    /// let low = RGB8::new(215, 48, 39);
    /// let mid = RGB8::new(255, 255, 191);
    /// let high = RGB8::new(69, 117, 180);
    /// let colors = Scheme::Divergent { low, mid, high }
    ///     .colors(11, Interpolation::Hsl);
    /// assert_eq!(colors.len(), 11);
    /// assert_eq!((colors[0], colors[5], colors[10]), (low, mid, high));
    /// ```
    pub fn colors(&self, steps: usize, space: Interpolation) -> Vec<RGB8> {
        build_colors(&self.stops(steps), steps, space)
    }
}

/// Piecewise gradient through several stops, each segment blended
/// on its own.
struct Polylinear<C> {
    positions: Vec<f64>, // normalized to [0, 1], nondecreasing
    gradients: Vec<Gradient<C>>, // len = positions.len() - 1
}

impl<C: RGBColor> Polylinear<C> {
    fn new(stops: &[ColorStop<C>], space: Interpolation) -> Self {
        let p0 = stops[0].position;
        let span = stops[stops.len() - 1].position - p0;
        let positions = stops.iter()
            .map(|s| if span > 0. { (s.position - p0) / span } else { 0. })
            .collect();
        let gradients = stops.windows(2)
            .map(|w| w[0].color.gradient(&w[1].color, space))
            .collect();
        Polylinear { positions, gradients }
    }
}

impl<C: RGBColor> Ramp<C> for Polylinear<C> {
    fn color(&self, t: f64) -> C {
        let t = t.clamp(0., 1.);
        let k = self.gradients.len();
        // Last segment whose start is ≤ t.
        let i = self.positions[1 .. k].partition_point(|&p| p <= t);
        let (a, b) = (self.positions[i], self.positions[i + 1]);
        let local = if b > a { (t - a) / (b - a) } else { 0. };
        self.gradients[i].color(local)
    }
}

/// Return `steps` colors sampled evenly from the piecewise gradient
/// through `stops`.  The first color is the first stop and the last
/// one the last stop.
///
/// # Panics
///
/// If there are less than two stops, if they are not ordered by
/// position or if `steps == 0`.
pub fn build_colors<C>(stops: &[ColorStop<C>], steps: usize,
                       space: Interpolation) -> Vec<C>
where C: RGBColor {
    assert!(stops.len() >= 2, "a color scale needs at least two stops");
    assert!(stops.windows(2).all(|w| w[0].position <= w[1].position),
            "color stops must be ordered by position");
    assert!(steps >= 1, "a color scale needs at least one step");
    Polylinear::new(stops, space)
        .sample(0., (steps - 1) as f64, steps)
        .map(|(_, c)| c)
        .collect()
}

/// Uniform quantization of `[min, max]` into `steps` bins.
///
/// Bin `i` covers `[lower_bound(i), lower_bound(i + 1))`; the first
/// bin also takes everything below `min` and the last one everything
/// from its lower bound on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bins {
    min: f64,
    max: f64,
    steps: usize,
    increment: f64,
}

impl Bins {
    /// # Panics
    ///
    /// If `steps == 0` or `min < max` does not hold for finite bounds.
    pub fn new(min: f64, max: f64, steps: usize) -> Self {
        assert!(steps >= 1, "at least one bin is required");
        assert!(min.is_finite() && max.is_finite() && min < max,
                "invalid bin range [{min}, {max}]");
        let increment = if steps == 1 { max - min }
                        else { (max - min) / (steps - 1) as f64 };
        Bins { min, max, steps, increment }
    }

    pub fn min(&self) -> f64 { self.min }
    pub fn max(&self) -> f64 { self.max }
    pub fn steps(&self) -> usize { self.steps }

    /// Width of a bin, `(max - min) / (steps - 1)`.
    pub fn increment(&self) -> f64 { self.increment }

    /// Smallest value falling in bin `i`.  The last bin starts
    /// exactly at `max`.
    pub fn lower_bound(&self, i: usize) -> f64 {
        if self.steps > 1 && i == self.steps - 1 { self.max }
        else { self.min + self.increment * i as f64 }
    }

    /// Value where bin `i` ends, `None` for the open-ended last bin.
    pub fn upper_bound(&self, i: usize) -> Option<f64> {
        if i + 1 < self.steps { Some(self.lower_bound(i + 1)) } else { None }
    }

    /// Return the bin of `v` (clamped to the first and last bins) or
    /// `None` if `v` is NaN.
    ///
    /// ```
    /// use choropleth::Bins;
    /// let bins = Bins::new(80., 125., 10);
    /// assert_eq!(bins.index(80.), Some(0));
    /// assert_eq!(bins.index(84.9), Some(0));
    /// assert_eq!(bins.index(85.), Some(1));
    /// assert_eq!(bins.index(130.), Some(9));
    /// assert_eq!(bins.index(f64::NAN), None);
    /// ```
    pub fn index(&self, v: f64) -> Option<usize> {
        if v.is_nan() { return None }
        let last = self.steps - 1;
        let q = ((v - self.min) / self.increment).floor();
        let mut i = if q <= 0. { 0 } else if q >= last as f64 { last }
                    else { q as usize };
        // The division may be off by one ulp near a boundary: agree
        // with `lower_bound`, which is what legends display.
        while i > 0 && v < self.lower_bound(i) { i -= 1 }
        while i < last && v >= self.lower_bound(i + 1) { i += 1 }
        Some(i)
    }
}

/// Maps observations to the swatch of their bin.
#[derive(Clone, Debug)]
pub struct Classifier<C = RGB8> {
    bins: Bins,
    colors: Vec<C>,
    no_data: C,
}

impl<C> Classifier<C> {
    /// # Panics
    ///
    /// If there is not exactly one color per bin.
    pub fn new(bins: Bins, colors: Vec<C>, no_data: C) -> Self {
        assert_eq!(colors.len(), bins.steps(),
                   "one color per bin is required");
        Classifier { bins, colors, no_data }
    }

    pub fn bins(&self) -> &Bins { &self.bins }

    pub fn colors(&self) -> &[C] { &self.colors }

    /// The bin of an observation, `None` when it is missing.
    pub fn index(&self, v: Option<f64>) -> Option<usize> {
        v.and_then(|v| self.bins.index(v))
    }

    /// The color painted for an observation.
    pub fn color(&self, v: Option<f64>) -> &C {
        match self.index(v) {
            Some(i) => &self.colors[i],
            None => &self.no_data,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const LOW: RGB8 = RGB8 { r: 215, g: 48, b: 39 };
    const MID: RGB8 = RGB8 { r: 255, g: 255, b: 191 };
    const HIGH: RGB8 = RGB8 { r: 69, g: 117, b: 180 };

    #[test]
    fn colors_keep_anchors() {
        let schemes = [Scheme::Sequential { low: LOW, high: HIGH },
                       Scheme::Divergent { low: LOW, mid: MID, high: HIGH }];
        for scheme in schemes {
            for space in [Interpolation::Hsl, Interpolation::Hcl] {
                for steps in 2 ..= 20 {
                    let c = scheme.colors(steps, space);
                    assert_eq!(c.len(), steps);
                    assert_eq!(c[0], LOW, "{scheme:?} {space:?} {steps}");
                    assert_eq!(c[steps - 1], HIGH, "{scheme:?} {space:?} {steps}");
                }
            }
        }
    }

    #[test]
    fn divergent_midpoint() {
        let scheme = Scheme::Divergent { low: LOW, mid: MID, high: HIGH };
        for steps in [3, 5, 11, 21] {
            assert_eq!(scheme.colors(steps, Interpolation::Hsl)[steps / 2], MID);
        }
    }

    #[test]
    fn single_step() {
        let scheme = Scheme::Sequential { low: LOW, high: HIGH };
        assert_eq!(scheme.colors(1, Interpolation::Hsl), vec![LOW]);
    }

    #[test]
    fn idempotent() {
        let stops = Scheme::Divergent { low: LOW, mid: MID, high: HIGH }.stops(11);
        assert_eq!(build_colors(&stops, 11, Interpolation::Hcl),
                   build_colors(&stops, 11, Interpolation::Hcl));
    }

    #[test]
    fn explicit_stops() {
        let stops = [ColorStop { color: LOW, position: 0. },
                     ColorStop { color: MID, position: 0.2 },
                     ColorStop { color: HIGH, position: 1. }];
        let c = build_colors(&stops, 6, Interpolation::Hsl);
        assert_eq!((c[0], c[1], c[5]), (LOW, MID, HIGH));
    }

    #[test]
    #[should_panic(expected = "at least two stops")]
    fn one_stop() {
        build_colors(&[ColorStop { color: LOW, position: 0. }], 3,
                     Interpolation::Hsl);
    }

    #[test]
    #[should_panic(expected = "ordered by position")]
    fn unordered_stops() {
        let stops = [ColorStop { color: LOW, position: 1. },
                     ColorStop { color: HIGH, position: 0. }];
        build_colors(&stops, 3, Interpolation::Hsl);
    }

    #[test]
    fn bins_agree_with_bounds() {
        for (min, max, steps) in [(75., 125., 11), (80., 125., 10),
                                  (0., 1., 7), (-0.3, 0.4, 8), (0., 0.1, 4)] {
            let bins = Bins::new(min, max, steps);
            let n = 1000;
            for k in 0 .. n {
                let v = min + (max - min) * k as f64 / n as f64;
                let i = bins.index(v).unwrap();
                assert!(bins.lower_bound(i) <= v, "{v} in bin {i} of {bins:?}");
                if let Some(up) = bins.upper_bound(i) {
                    assert!(v < up, "{v} in bin {i} of {bins:?}");
                }
            }
            // Exactly on each boundary.
            for i in 0 .. steps {
                assert_eq!(bins.index(bins.lower_bound(i)), Some(i));
            }
            assert_eq!(bins.index(max), Some(steps - 1));
            assert_eq!(bins.index(max + 1e6), Some(steps - 1));
            assert_eq!(bins.index(min - 1.), Some(0));
            assert_eq!(bins.index(f64::NEG_INFINITY), Some(0));
            assert_eq!(bins.index(f64::INFINITY), Some(steps - 1));
        }
    }

    #[test]
    fn single_bin() {
        let bins = Bins::new(0., 10., 1);
        assert_eq!(bins.increment(), 10.);
        assert_eq!(bins.lower_bound(0), 0.);
        assert_eq!(bins.upper_bound(0), None);
        assert_eq!(bins.index(-5.), Some(0));
        assert_eq!(bins.index(50.), Some(0));
    }

    #[test]
    #[should_panic(expected = "invalid bin range")]
    fn empty_range() {
        Bins::new(1., 1., 3);
    }

    #[test]
    fn classify() {
        let bins = Bins::new(80., 125., 10);
        let colors: Vec<u8> = (0 .. 10).collect();
        let c = Classifier::new(bins, colors, 255);
        assert_eq!(*c.color(Some(130.)), 9);
        assert_eq!(*c.color(Some(80.)), 0);
        assert_eq!(*c.color(None), 255);
        assert_eq!(*c.color(Some(f64::NAN)), 255);
        assert_eq!(c.index(Some(97.)), Some(3));
    }

    #[test]
    #[should_panic(expected = "one color per bin")]
    fn classifier_length_mismatch() {
        Classifier::new(Bins::new(0., 1., 3), vec![0u8; 2], 9);
    }
}
