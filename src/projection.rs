//! Map projections from longitude/latitude (degrees) to SVG
//! coordinates (y pointing down).

use std::f64::consts::PI;
use geo::{coord, Coord, LineString};

pub trait Projection {
    /// Screen position of a point, `None` if this projection does not
    /// show it.
    fn project(&self, p: Coord<f64>) -> Option<Coord<f64>>;

    /// Project a whole ring or line; `None` if any point is not shown.
    fn project_ring(&self, ring: &LineString<f64>) -> Option<LineString<f64>> {
        ring.coords().map(|&p| self.project(p)).collect::<Option<_>>()
            .map(LineString::new)
    }
}

/// Albers conic equal-area projection.
#[derive(Clone, Copy, Debug)]
pub struct ConicEqualArea {
    rotate: f64, // λ shift, radians
    n: f64,
    c: f64,
    rho0: f64,
    scale: f64,
    dx: f64,
    dy: f64,
}

impl ConicEqualArea {
    /// A projection with standard parallels `parallels`, turned by
    /// `rotate` degrees of longitude and such that `center` (given in
    /// rotated coordinates) lands on `translate`.
    pub fn new(parallels: [f64; 2], rotate: f64, center: Coord<f64>, scale: f64,
               translate: Coord<f64>) -> Self {
        let (phi0, phi1) = (parallels[0].to_radians(), parallels[1].to_radians());
        let sin0 = phi0.sin();
        let n = (sin0 + phi1.sin()) / 2.;
        let c = 1. + sin0 * (2. * n - sin0);
        let mut p = ConicEqualArea { rotate: rotate.to_radians(), n, c,
                                     rho0: c.sqrt() / n, scale, dx: 0., dy: 0. };
        let c = p.raw(center.x.to_radians(), center.y.to_radians());
        p.dx = translate.x - c.x * scale;
        p.dy = translate.y + c.y * scale;
        p
    }

    fn raw(&self, lambda: f64, phi: f64) -> Coord<f64> {
        let rho = (self.c - 2. * self.n * phi.sin()).max(0.).sqrt() / self.n;
        let l = lambda * self.n;
        Coord { x: rho * l.sin(), y: self.rho0 - rho * l.cos() }
    }
}

impl Projection for ConicEqualArea {
    fn project(&self, Coord { x: lon, y: lat }: Coord<f64>) -> Option<Coord<f64>> {
        let mut lambda = lon.to_radians() + self.rotate;
        if lambda > PI { lambda -= 2. * PI } else if lambda < -PI { lambda += 2. * PI }
        let p = self.raw(lambda, lat.to_radians());
        Some(Coord { x: p.x * self.scale + self.dx, y: self.dy - p.y * self.scale })
    }
}

/// A projection restricted to a rectangle of the screen.
#[derive(Clone, Copy, Debug)]
struct Inset {
    projection: ConicEqualArea,
    min: Coord<f64>,
    max: Coord<f64>,
}

impl Inset {
    fn project(&self, p: Coord<f64>) -> Option<Coord<f64>> {
        self.projection.project(p).filter(|q| {
            self.min.x <= q.x && q.x <= self.max.x && self.min.y <= q.y && q.y <= self.max.y
        })
    }
}

/// The United States: the lower 48 states with Alaska and Hawaii
/// moved below them.
///
/// ```
/// use geo::coord;
/// use choropleth::projection::{AlbersUsa, Projection};
/// let p = AlbersUsa::new(1070., coord! { x: 480., y: 250. });
/// let c = p.project(coord! { x: -96.6, y: 38.7 }).unwrap();
/// assert!((c.x - 480.).abs() < 1e-9 && (c.y - 250.).abs() < 1e-9);
/// assert!(p.project(coord! { x: 2.35, y: 48.85 }).is_none()); // Paris
/// ```
#[derive(Clone, Copy, Debug)]
pub struct AlbersUsa {
    insets: [Inset; 3],
}

impl AlbersUsa {
    pub fn new(k: f64, Coord { x, y }: Coord<f64>) -> Self {
        const EPS: f64 = 1e-6;
        let lower48 = Inset {
            projection: ConicEqualArea::new([29.5, 45.5], 96., coord! { x: -0.6, y: 38.7 },
                                            k, coord! { x: x, y: y }),
            min: coord! { x: x - 0.455 * k, y: y - 0.238 * k },
            max: coord! { x: x + 0.455 * k, y: y + 0.238 * k },
        };
        let alaska = Inset {
            projection: ConicEqualArea::new([55., 65.], 154., coord! { x: -2., y: 58.5 },
                                            0.35 * k,
                                            coord! { x: x - 0.307 * k, y: y + 0.201 * k }),
            min: coord! { x: x - 0.425 * k + EPS, y: y + 0.120 * k + EPS },
            max: coord! { x: x - 0.214 * k - EPS, y: y + 0.234 * k - EPS },
        };
        let hawaii = Inset {
            projection: ConicEqualArea::new([8., 18.], 157., coord! { x: -3., y: 19.9 }, k,
                                            coord! { x: x - 0.205 * k, y: y + 0.212 * k }),
            min: coord! { x: x - 0.214 * k + EPS, y: y + 0.166 * k + EPS },
            max: coord! { x: x - 0.115 * k - EPS, y: y + 0.234 * k - EPS },
        };
        AlbersUsa { insets: [lower48, alaska, hawaii] }
    }

    /// The projection used for county maps of a `width`×`height`
    /// canvas.
    pub fn for_canvas(width: f64, height: f64) -> Self {
        Self::new(width * 1.2, coord! { x: width / 2., y: height - height * 0.6 })
    }
}

impl Projection for AlbersUsa {
    fn project(&self, p: Coord<f64>) -> Option<Coord<f64>> {
        self.insets.iter().find_map(|inset| inset.project(p))
    }

    /// The whole ring goes through the inset showing its first point,
    /// so that shapes are never split between insets.
    fn project_ring(&self, ring: &LineString<f64>) -> Option<LineString<f64>> {
        let first = *ring.0.first()?;
        let inset = self.insets.iter().find(|i| i.project(first).is_some())?;
        inset.projection.project_ring(ring)
    }
}
