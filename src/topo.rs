//! TopoJSON decoding: county polygons and shared borders.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use crate::data::parse_id;
use crate::{Error, Result};

#[derive(Deserialize)]
struct RawTopology {
    #[serde(default)]
    transform: Option<Transform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: HashMap<String, RawGeometry>,
}

#[derive(Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    geometries: Vec<RawGeometry>,
}

/// Geometry of a topology object; arcs are referenced by index, a
/// negative index `!i` meaning arc `i` reversed.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Polygon(Vec<Vec<i64>>),
    MultiPolygon(Vec<Vec<Vec<i64>>>),
    LineString(Vec<i64>),
    MultiLineString(Vec<Vec<i64>>),
    Collection(Vec<Geometry>),
    /// Points and null geometries.
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Identifier coerced to an integer, if any.
    pub id: Option<u32>,
    pub shape: Shape,
}

/// A polygonal feature with absolute coordinates (longitude,
/// latitude, or planar if the topology is already projected).
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: Option<u32>,
    pub geometry: MultiPolygon<f64>,
}

/// A decoded topology: absolute arc coordinates and named objects.
#[derive(Clone, Debug)]
pub struct Topology {
    arcs: Vec<LineString<f64>>,
    objects: HashMap<String, Geometry>,
}

fn coerce_id(id: &Value) -> Option<u32> {
    match id {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok())
            .or_else(|| n.as_f64().filter(|x| x.fract() == 0. && *x >= 0.
                                               && *x <= u32::MAX as f64)
                     .map(|x| x as u32)),
        Value::String(s) => parse_id(s),
        _ => None,
    }
}

impl Geometry {
    fn decode(raw: RawGeometry, n_arcs: usize) -> Result<Self> {
        fn arcs<T: serde::de::DeserializeOwned>(raw: Option<Value>, kind: &str)
                                                  -> Result<T> {
            let v = raw.ok_or_else(|| Error::InvalidTopology(
                format!("{kind} without arcs")))?;
            serde_json::from_value(v).map_err(|e| Error::InvalidTopology(
                format!("{kind} arcs: {e}")))
        }
        let kind = raw.kind.as_deref().unwrap_or("null");
        let shape = match kind {
            "Polygon" => Shape::Polygon(arcs(raw.arcs, kind)?),
            "MultiPolygon" => Shape::MultiPolygon(arcs(raw.arcs, kind)?),
            "LineString" => Shape::LineString(arcs(raw.arcs, kind)?),
            "MultiLineString" => Shape::MultiLineString(arcs(raw.arcs, kind)?),
            "GeometryCollection" => Shape::Collection(
                raw.geometries.into_iter()
                    .map(|g| Geometry::decode(g, n_arcs))
                    .collect::<Result<_>>()?),
            _ => Shape::Other,
        };
        let geometry = Geometry { id: raw.id.as_ref().and_then(coerce_id), shape };
        if let Some(i) = geometry.arc_refs().find(|&i| i >= n_arcs) {
            return Err(Error::InvalidTopology(format!(
                "reference to arc {i}, only {n_arcs} arcs")))
        }
        Ok(geometry)
    }

    /// Indices (always non-negative) of the arcs this geometry uses
    /// directly, not counting the members of a collection.
    fn arc_refs(&self) -> impl Iterator<Item = usize> + '_ {
        let refs: Box<dyn Iterator<Item = &i64> + '_> = match &self.shape {
            Shape::Polygon(rings) | Shape::MultiLineString(rings) =>
                Box::new(rings.iter().flatten()),
            Shape::MultiPolygon(polygons) =>
                Box::new(polygons.iter().flatten().flatten()),
            Shape::LineString(arcs) => Box::new(arcs.iter()),
            Shape::Collection(_) | Shape::Other => Box::new(std::iter::empty()),
        };
        refs.map(|&i| if i < 0 { !i as usize } else { i as usize })
    }
}

impl Topology {
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let raw: RawTopology = serde_json::from_reader(rdr)?;
        let mut arcs = Vec::with_capacity(raw.arcs.len());
        for (i, arc) in raw.arcs.into_iter().enumerate() {
            let mut coords = Vec::with_capacity(arc.len());
            let (mut x, mut y) = (0., 0.);
            for p in arc {
                let (dx, dy) = match p[..] {
                    [dx, dy, ..] => (dx, dy),
                    _ => return Err(Error::InvalidTopology(format!(
                        "arc {i} has a position with less than two coordinates"))),
                };
                coords.push(match &raw.transform {
                    Some(t) => {
                        x += dx;
                        y += dy;
                        Coord { x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1] }
                    }
                    None => Coord { x: dx, y: dy },
                });
            }
            arcs.push(LineString::new(coords));
        }
        let n_arcs = arcs.len();
        let objects = raw.objects.into_iter()
            .map(|(name, g)| Ok((name, Geometry::decode(g, n_arcs)?)))
            .collect::<Result<_>>()?;
        Ok(Topology { arcs, objects })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let fh = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(BufReader::new(fh))
    }

    pub fn object(&self, name: &str) -> Result<&Geometry> {
        self.objects.get(name).ok_or_else(|| Error::UnknownObject(name.to_string()))
    }

    /// Coordinates of a sequence of arcs, each arc starting where the
    /// previous one ends.
    fn line(&self, arcs: &[i64]) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for &i in arcs {
            coords.pop();
            if i < 0 {
                coords.extend(self.arcs[!i as usize].0.iter().rev());
            } else {
                coords.extend(self.arcs[i as usize].0.iter());
            }
        }
        LineString::new(coords)
    }

    /// The first ring is the exterior, the others are holes.
    fn polygon(&self, rings: &[Vec<i64>]) -> Polygon<f64> {
        let mut rings = rings.iter().map(|r| self.line(r));
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Polygon::new(exterior, rings.collect())
    }

    fn collect_features(&self, g: &Geometry, out: &mut Vec<Feature>) {
        let polygons = match &g.shape {
            Shape::Polygon(rings) => vec![self.polygon(rings)],
            Shape::MultiPolygon(ps) => ps.iter().map(|p| self.polygon(p)).collect(),
            Shape::Collection(members) => {
                for m in members { self.collect_features(m, out) }
                return
            }
            _ => return,
        };
        out.push(Feature { id: g.id, geometry: MultiPolygon::new(polygons) });
    }

    /// The polygonal features of the object `name`; collections are
    /// flattened and non-polygonal members dropped.
    pub fn features(&self, name: &str) -> Result<Vec<Feature>> {
        let mut out = Vec::new();
        self.collect_features(self.object(name)?, &mut out);
        Ok(out)
    }

    /// Arcs of object `name` kept by `filter`, which receives the
    /// first and last geometries (numbered in document order) using
    /// each arc.  An arc used by one geometry only gets it twice.
    pub fn mesh<F>(&self, name: &str, filter: F) -> Result<MultiLineString<f64>>
    where F: Fn(usize, usize) -> bool {
        fn walk(g: &Geometry, next: &mut usize, by_arc: &mut [Vec<usize>]) {
            if let Shape::Collection(members) = &g.shape {
                for m in members { walk(m, next, by_arc) }
                return
            }
            let id = *next;
            *next += 1;
            for i in g.arc_refs() { by_arc[i].push(id) }
        }
        let mut by_arc = vec![Vec::new(); self.arcs.len()];
        walk(self.object(name)?, &mut 0, &mut by_arc);
        Ok(MultiLineString::new(
            by_arc.iter().enumerate()
                .filter_map(|(i, geoms)| match (geoms.first(), geoms.last()) {
                    (Some(&a), Some(&b)) if filter(a, b) => Some(self.arcs[i].clone()),
                    _ => None,
                })
                .collect()))
    }

    /// Borders between two different geometries of object `name`.
    pub fn interior_mesh(&self, name: &str) -> Result<MultiLineString<f64>> {
        self.mesh(name, |a, b| a != b)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    /// Two unit squares side by side (in quantized coordinates 2×2)
    /// sharing arc 0, and a null geometry.
    const TWO_SQUARES: &str = r#"{
      "type": "Topology",
      "transform": { "scale": [0.5, 0.5], "translate": [10, 20] },
      "objects": {
        "counties": { "type": "GeometryCollection", "geometries": [
          { "type": "Polygon", "id": 1001, "arcs": [[0, 1]] },
          { "type": "Polygon", "id": "01003", "arcs": [[-1, 2]] },
          { "type": null }
        ]},
        "states": { "type": "GeometryCollection", "geometries": [
          { "type": "Polygon", "id": 1, "arcs": [[0, 1]] },
          { "type": "Polygon", "id": 2, "arcs": [[-1, 2]] }
        ]}
      },
      "arcs": [
        [[2, 0], [0, 2]],
        [[2, 2], [-2, 0], [0, -2], [2, 0]],
        [[2, 0], [2, 0], [0, 2], [-2, 0]]
      ]
    }"#;

    fn topology() -> Topology {
        Topology::from_reader(TWO_SQUARES.as_bytes()).unwrap()
    }

    fn square(ring: Vec<(f64, f64)>) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(LineString::from(ring), vec![])])
    }

    #[test]
    fn features() {
        let f = topology().features("counties").unwrap();
        assert_eq!(f, vec![
            Feature { id: Some(1001), geometry: square(vec![
                (11., 20.), (11., 21.), (10., 21.), (10., 20.), (11., 20.)]) },
            Feature { id: Some(1003), geometry: square(vec![
                (11., 21.), (11., 20.), (12., 20.), (12., 21.), (11., 21.)]) },
        ]);
    }

    #[test]
    fn meshes() {
        let t = topology();
        assert_eq!(t.interior_mesh("states").unwrap(),
                   MultiLineString::new(vec![LineString::from(vec![(11., 20.),
                                                                   (11., 21.)])]));
        assert_eq!(t.mesh("states", |_, _| true).unwrap().0.len(), 3);
    }

    #[test]
    fn unquantized() {
        let t = Topology::from_reader(r#"{
            "type": "Topology",
            "objects": { "c": { "type": "MultiPolygon", "id": 7.0,
                                "arcs": [[[0]], [[1]]] } },
            "arcs": [[[0, 0], [1, 0], [0, 1], [0, 0]],
                     [[5, 5], [6, 5], [5, 6], [5, 5]]]
        }"#.as_bytes()).unwrap();
        let f = t.features("c").unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].id, Some(7));
        assert_eq!(f[0].geometry.0.len(), 2);
        assert_eq!(f[0].geometry.0[1].exterior().0[1], Coord { x: 6., y: 5. });
    }

    #[test]
    fn holes() {
        let t = Topology::from_reader(r#"{
            "type": "Topology",
            "objects": { "c": { "type": "Polygon", "id": 9, "arcs": [[0], [1]] } },
            "arcs": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]],
                     [[1, 1], [1, 2], [2, 2], [1, 1]]]
        }"#.as_bytes()).unwrap();
        let f = t.features("c").unwrap();
        let polygon = &f[0].geometry.0[0];
        assert_eq!(polygon.exterior().0.len(), 5);
        assert_eq!(polygon.interiors().len(), 1);
        assert_eq!(polygon.interiors()[0].0[0], Coord { x: 1., y: 1. });
    }

    #[test]
    fn errors() {
        assert!(matches!(topology().features("nation"),
                         Err(Error::UnknownObject(_))));
        let bad_ref = r#"{ "type": "Topology", "arcs": [[[0, 0], [1, 1]]],
            "objects": { "c": { "type": "LineString", "arcs": [3] } } }"#;
        assert!(matches!(Topology::from_reader(bad_ref.as_bytes()),
                         Err(Error::InvalidTopology(_))));
        let bad_arcs = r#"{ "type": "Topology", "arcs": [],
            "objects": { "c": { "type": "Polygon", "arcs": [0] } } }"#;
        assert!(matches!(Topology::from_reader(bad_arcs.as_bytes()),
                         Err(Error::InvalidTopology(_))));
        assert!(matches!(Topology::from_reader("[]".as_bytes()),
                         Err(Error::Json(_))));
    }
}
