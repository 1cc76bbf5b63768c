//! County choropleth maps: quantized color scales, legends and an
//! SVG renderer.
//!
//! - [`scale`]: anchor colors ([`Scheme`]) interpolated into a fixed
//!   number of swatches, and the [`Bins`] quantizer mapping
//!   observations to them.
//! - [`legend`]: the legend entries (one per swatch plus "No Data").
//! - [`format`]: d3-style number formats used for labels.
//! - [`render`]: the whole pipeline, from [`MapConfig`] to an SVG
//!   [`Scene`].
//!
//! The color machinery ([`RGBColor`], [`Ramp`], [`Gradient`]) works
//! for any pixel type of the [`rgb`] crate.
//!
//! ```
//! use rgb::RGB8;
//! use choropleth::{Bins, Interpolation, Scheme, build_legend};
//! let scheme = Scheme::Sequential { low: RGB8::new(255, 255, 255),
//!                                   high: RGB8::new(0, 0, 128) };
//! let colors = scheme.colors(5, Interpolation::Hsl);
//! let bins = Bins::new(0., 100., 5);
//! let legend = build_legend(&colors, &bins, RGB8::new(221, 221, 221),
//!                           true, |x| format!("{x}"));
//! assert_eq!(legend.len(), 6);
//! assert_eq!(legend[5].label, "100+");
//! ```

use std::marker::PhantomData;
use rgb::{RGBA, RGB8, RGBA8};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod data;
pub mod error;
pub mod format;
pub mod legend;
pub mod projection;
pub mod render;
pub mod scale;
pub mod topo;

pub use config::MapConfig;
pub use data::Observation;
pub use error::{Error, Result};
pub use format::NumberFormat;
pub use legend::{build_legend, Legend, LegendEntry, NO_DATA};
pub use render::{Choropleth, Scene, Tooltips};
pub use scale::{build_colors, Bins, Classifier, ColorStop, Scheme};

/// A “continuous” range of colors parametrized by reals in \[0, 1\].
pub trait Ramp<Color> {
    /// Returns the color corresponding to `t` ∈ \[0., 1.\].
    fn color(&self, t: f64) -> Color;

    /// Return an iterator over `n` evenly spaced positions from `a`
    /// to `b` (both included) together with their colors.  The first
    /// color is always `self.color(0.)` and the last `self.color(1.)`.
    fn sample(self, a: f64, b: f64, n: usize) -> Samples<Self, Color>
    where Self: Sized {
        Samples { ramp: self, color: PhantomData, a, b, n, i: 0 }
    }
}

/// Positions in a range together with colors.
///
/// Created by [`Ramp::sample`].
pub struct Samples<R, Color> {
    ramp: R,
    color: PhantomData<Color>,
    a: f64,
    b: f64,
    n: usize,
    i: usize, // next position
}

impl<R, Color> Iterator for Samples<R, Color>
where R: Ramp<Color> {
    type Item = (f64, Color);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i >= self.n { return None }
        let k = self.i;
        self.i += 1;
        let last = self.n - 1;
        Some(if k == 0 {
            (self.a, self.ramp.color(0.))
        } else if k == last {
            (self.b, self.ramp.color(1.))
        } else {
            let t = k as f64 / last as f64;
            ((1. - t) * self.a + t * self.b, self.ramp.color(t))
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.n - self.i;
        (len, Some(len))
    }
}

impl<R, Color> ExactSizeIterator for Samples<R, Color>
where R: Ramp<Color> {}

/// Color space in which anchor colors are blended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Hue, saturation, lightness.
    #[default]
    Hsl,
    /// Hue, chroma, lightness: CIE L\*C\*h with a D65 white point.
    Hcl,
}

/// Specifies the methods a RGB color encoding must provide.
pub trait RGBColor: Sized {
    /// Return the red, green, blue and alpha components of the color
    /// (in \[0, 255\]).
    fn to_rgba(&self) -> RGBA<f64>;

    /// Create a color from its RGBA components (in \[0, 255\]).
    /// Components are rounded to the nearest representable value.
    fn from_rgba(rgba: RGBA<f64>) -> Self;

    /// Return a gradient from color `self` to color `c1`, blended in
    /// the color space `space`.
    ///
    /// # Example
    ///
    /// ```
    /// use rgb::RGB8;
    /// use choropleth::{RGBColor, Ramp, Interpolation};
    /// let red = RGB8::new(215, 48, 39);
    /// let blue = RGB8::new(69, 117, 180);
    /// let grad = red.gradient(&blue, Interpolation::Hsl);
    /// assert_eq!(grad.color(0.), red);
    /// assert_eq!(grad.color(1.), blue);
    /// ```
    fn gradient(&self, c1: &Self, space: Interpolation) -> Gradient<Self> {
        let to_polar = match space {
            Interpolation::Hsl => Polar::hsl_of_rgb,
            Interpolation::Hcl => Polar::hcl_of_rgb,
        };
        let p1 = to_polar(c1.to_rgba());
        let (c0, dc) = to_polar(self.to_rgba()).towards(&p1);
        Gradient { space, c0, dc, color: PhantomData }
    }

    /// Convert the color to grayscale.
    fn to_gray(&self) -> Self {
        let RGBA{ r, g, b, a } = Self::to_rgba(self);
        let x = 0.299 * r + 0.587 * g + 0.114 * b;
        Self::from_rgba(RGBA{ r: x, g: x, b: x, a })
    }

    /// CSS notation `#rrggbb` (alpha is dropped).
    fn to_hex(&self) -> String {
        let RGBA{ r, g, b, .. } = Self::to_rgba(self);
        format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
    }
}

#[inline]
fn channel(x: f64) -> u8 { x.round().clamp(0., 255.) as u8 }

impl RGBColor for RGBA<f64> {
    #[inline]
    fn to_rgba(&self) -> RGBA<f64> { *self }

    #[inline]
    fn from_rgba(c: RGBA<f64>) -> Self { c }
}

impl RGBColor for RGB8 {
    #[inline]
    fn to_rgba(&self) -> RGBA<f64> {
        RGBA{ r: self.r as f64, g: self.g as f64, b: self.b as f64, a: 255. }
    }

    #[inline]
    fn from_rgba(c: RGBA<f64>) -> Self {
        RGB8 { r: channel(c.r),  g: channel(c.g),  b: channel(c.b) }
    }
}

impl RGBColor for RGBA8 {
    #[inline]
    fn to_rgba(&self) -> RGBA<f64> {
        RGBA{ r: self.r as f64, g: self.g as f64, b: self.b as f64,
              a: self.a as f64 }
    }

    #[inline]
    fn from_rgba(c: RGBA<f64>) -> Self {
        RGBA8 { r: channel(c.r),  g: channel(c.g),  b: channel(c.b),
                a: channel(c.a) }
    }
}

/// Parse a CSS hex color, `#rgb` or `#rrggbb` (the `#` is optional).
///
/// ```
/// use rgb::RGB8;
/// assert_eq!(choropleth::parse_hex("#ddd").unwrap(), RGB8::new(221, 221, 221));
/// assert_eq!(choropleth::parse_hex("4575b4").unwrap(), RGB8::new(69, 117, 180));
/// ```
pub fn parse_hex(s: &str) -> Result<RGB8> {
    let hex = s.trim().trim_start_matches('#');
    let invalid = || Error::InvalidColor(s.to_string());
    if !hex.is_ascii() { return Err(invalid()) }
    let digit = |i: usize, len: usize| {
        u8::from_str_radix(&hex[i .. i + len], 16).map_err(|_| invalid())
    };
    match hex.len() {
        3 => Ok(RGB8 { r: 17 * digit(0, 1)?, g: 17 * digit(1, 1)?,
                       b: 17 * digit(2, 1)? }),
        6 => Ok(RGB8 { r: digit(0, 2)?, g: digit(2, 2)?, b: digit(4, 2)? }),
        _ => Err(invalid()),
    }
}

/// Serde adapter storing an [`RGB8`] as a `#rrggbb` string.
pub mod hex_color {
    use rgb::RGB8;
    use serde::{Deserialize, Deserializer, Serializer};
    use crate::RGBColor;

    pub fn serialize<S: Serializer>(c: &RGB8, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&c.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RGB8, D::Error> {
        let s = String::deserialize(d)?;
        crate::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A color in a cylindrical space: hue in degrees (NaN when the
/// color is achromatic), chroma or saturation, lightness, alpha.
#[derive(Clone, Copy, Debug)]
struct Polar {
    h: f64,
    c: f64,
    l: f64,
    a: f64,
}

// D65 reference white.
const XN: f64 = 0.950470;
const YN: f64 = 1.;
const ZN: f64 = 1.088830;
const T0: f64 = 4. / 29.;
const T1: f64 = 6. / 29.;
const T2: f64 = 3. * T1 * T1;
const T3: f64 = T1 * T1 * T1;

impl Polar {
    fn hsl_of_rgb(c: RGBA<f64>) -> Polar {
        let (r, g, b) = (c.r / 255., c.g / 255., c.b / 255.);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let d = max - min;
        let l = (max + min) / 2.;
        if d == 0. {
            // White and black have no saturation either.
            let s = if l > 0. && l < 1. { 0. } else { f64::NAN };
            return Polar { h: f64::NAN, c: s, l, a: c.a }
        }
        let s = if l < 0.5 { d / (max + min) } else { d / (2. - max - min) };
        let h = if r == max { (g - b) / d + if g < b { 6. } else { 0. } }
                else if g == max { (b - r) / d + 2. }
                else { (r - g) / d + 4. };
        Polar { h: 60. * h, c: s, l, a: c.a }
    }

    fn hsl_to_rgb(&self) -> RGBA<f64> {
        let h = if self.h.is_nan() { 0. } else { self.h.rem_euclid(360.) };
        let s = if self.c.is_nan() { 0. } else { self.c.clamp(0., 1.) };
        let l = self.l.clamp(0., 1.);
        let m2 = if l <= 0.5 { l * (1. + s) } else { l + s - l * s };
        let m1 = 2. * l - m2;
        let v = |h: f64| {
            let h = if h > 360. { h - 360. } else if h < 0. { h + 360. } else { h };
            255. * if h < 60. { m1 + (m2 - m1) * h / 60. }
                   else if h < 180. { m2 }
                   else if h < 240. { m1 + (m2 - m1) * (240. - h) / 60. }
                   else { m1 }
        };
        RGBA { r: v(h + 120.), g: v(h), b: v(h - 120.), a: self.a }
    }

    fn hcl_of_rgb(c: RGBA<f64>) -> Polar {
        fn linear(x: f64) -> f64 {
            let x = x / 255.;
            if x <= 0.04045 { x / 12.92 } else { ((x + 0.055) / 1.055).powf(2.4) }
        }
        fn lab(t: f64) -> f64 {
            if t > T3 { t.cbrt() } else { t / T2 + T0 }
        }
        let (r, g, b) = (linear(c.r), linear(c.g), linear(c.b));
        let x = lab((0.4124564 * r + 0.3575761 * g + 0.1804375 * b) / XN);
        let y = lab((0.2126729 * r + 0.7151522 * g + 0.0721750 * b) / YN);
        let z = lab((0.0193339 * r + 0.1191920 * g + 0.9503041 * b) / ZN);
        let (l, a, b) = (116. * y - 16., 500. * (x - y), 200. * (y - z));
        let chroma = a.hypot(b);
        let h = if chroma < 1e-6 { f64::NAN }
                else { b.atan2(a).to_degrees().rem_euclid(360.) };
        Polar { h, c: chroma, l, a: c.a }
    }

    fn hcl_to_rgb(&self) -> RGBA<f64> {
        fn xyz(t: f64) -> f64 {
            if t > T1 { t * t * t } else { T2 * (t - T0) }
        }
        fn gamma(x: f64) -> f64 {
            255. * if x <= 0.0031308 { 12.92 * x }
                   else { 1.055 * x.powf(1. / 2.4) - 0.055 }
        }
        let h = if self.h.is_nan() { 0. } else { self.h.to_radians() };
        let c = if self.c.is_nan() { 0. } else { self.c };
        let (a, b) = (c * h.cos(), c * h.sin());
        let fy = (self.l + 16.) / 116.;
        let x = XN * xyz(fy + a / 500.);
        let y = YN * xyz(fy);
        let z = ZN * xyz(fy - b / 200.);
        RGBA { r: gamma(3.2404542 * x - 1.5371385 * y - 0.4985314 * z),
               g: gamma(-0.9692660 * x + 1.8760108 * y + 0.0415560 * z),
               b: gamma(0.0556434 * x - 0.2040259 * y + 1.0572252 * z),
               a: self.a }
    }

    /// Return the starting point and the difference towards `p1`.
    /// Hue follows the shortest arc; an undefined hue or saturation
    /// borrows the other end's.
    fn towards(&self, p1: &Polar) -> (Polar, Polar) {
        let mut c0 = *self;
        if c0.c.is_nan() { c0.c = p1.c }
        let dsat = if p1.c.is_nan() { 0. } else { p1.c - c0.c };
        let dh = if p1.h.is_nan() {
            0.
        } else if c0.h.is_nan() {
            c0.h = p1.h;
            0.
        } else {
            let dh = p1.h - c0.h;
            if dh > 180. { dh - 360. } else if dh < -180. { dh + 360. } else { dh }
        };
        let dc = Polar { h: dh, c: dsat, l: p1.l - c0.l, a: p1.a - c0.a };
        (c0, dc)
    }
}

/// Gradient between two colors.
///
/// Created by [`RGBColor::gradient`].  See the [`Ramp`] trait
/// for methods.
pub struct Gradient<Color> {
    space: Interpolation,
    c0: Polar, // first color
    dc: Polar, // last - first color
    color: PhantomData<Color>,
}

impl<Color> Gradient<Color>
where Color: RGBColor {
    /// Returns the color corresponding to `t` ∈ \[0., 1.\] but does
    /// not check the later condition.
    #[inline]
    fn color_unchecked(&self, t: f64) -> Color {
        let p = Polar { h: self.c0.h + t * self.dc.h,
                        c: self.c0.c + t * self.dc.c,
                        l: self.c0.l + t * self.dc.l,
                        a: self.c0.a + t * self.dc.a };
        let rgba = match self.space {
            Interpolation::Hsl => p.hsl_to_rgb(),
            Interpolation::Hcl => p.hcl_to_rgb(),
        };
        Color::from_rgba(rgba)
    }
}

impl<Color> Ramp<Color> for Gradient<Color>
where Color: RGBColor {
    /// Returns the color corresponding to `t` ∈ \[0., 1.\], where
    /// `t == 0.` returns the first color provided in the gradient and
    /// `t == 1.` the second.
    fn color(&self, t: f64) -> Color { self.color_unchecked(t.clamp(0., 1.)) }
}
