//! From a [`MapConfig`] and its input files to an SVG map.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use geo::LineString;
use rgb::RGB8;
use crate::data::{load_observations, Fields};
use crate::projection::{AlbersUsa, Projection};
use crate::topo::Topology;
use crate::{Bins, Classifier, Legend, MapConfig, NumberFormat, Observation,
            Result, RGBColor, NO_DATA};

/// Name of the topology object holding the counties.
pub const COUNTIES: &str = "counties";
/// Name of the topology object whose inner borders are drawn.
pub const STATES: &str = "states";

const BAND_PADDING: f64 = 0.2;
const SWATCH_HEIGHT: f64 = 30.;

/// A configured map: scale, legend and label formats, built once.
pub struct Choropleth {
    config: MapConfig,
    classifier: Classifier,
    legend: Legend,
    tooltip_format: NumberFormat,
}

/// A county ready to be drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct County {
    pub id: Option<u32>,
    /// SVG path data.
    pub path: String,
    pub fill: RGB8,
    /// Shown on hover; `None` for counties without a record.
    pub tooltip: Option<String>,
}

/// A legend swatch positioned on the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Swatch {
    pub x: f64,
    pub width: f64,
    pub color: RGB8,
    pub label: String,
}

/// Everything drawn on the canvas.
#[derive(Clone, Debug)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub counties: Vec<County>,
    /// SVG path data of the state borders.
    pub borders: String,
    pub border_color: RGB8,
    /// Vertical position of the bottom of the swatches.
    pub legend_y: f64,
    pub legend: Vec<Swatch>,
    /// Observations whose identifier is no county of the topology.
    pub unmatched: usize,
    /// Observations of counties the projection does not show.
    pub off_map: usize,
}

/// Left position of each of `n` bands dividing `[0, width]`, and the
/// band width, rounded to whole pixels.  `padding` is the fraction of
/// each step left empty between bands, and half of it on both ends.
fn round_bands(n: usize, width: f64, padding: f64) -> (Vec<f64>, f64) {
    let n = n as f64;
    let step = (width / (n - padding + 2. * padding)).floor();
    let error = width - (n - padding) * step;
    let start = (error / 2.).round();
    let xs = (0 .. n as usize).map(|i| start + step * i as f64).collect();
    (xs, (step * (1. - padding)).round())
}

fn path_data<'a, P: Projection>(projection: &P,
                                lines: impl IntoIterator<Item = &'a LineString<f64>>,
                                close: bool, out: &mut String) {
    for line in lines {
        let Some(projected) = projection.project_ring(line) else { continue };
        for (i, c) in projected.coords().enumerate() {
            let _ = write!(out, "{}{:.2},{:.2}", if i == 0 { 'M' } else { 'L' }, c.x, c.y);
        }
        if close && !projected.0.is_empty() { out.push('Z') }
    }
}

impl Choropleth {
    /// Build the scale and the legend described by `config`.
    pub fn new(config: MapConfig) -> Result<Self> {
        config.validate()?;
        let legend_format = NumberFormat::lookup(&config.legend_format)?;
        let tooltip_format = NumberFormat::lookup(&config.tooltip_format)?;
        let colors = config.scheme.colors(config.steps, config.interpolation);
        let bins = Bins::new(config.min, config.max, config.steps);
        let legend = Legend::new(&colors, bins, config.no_data_color,
                                 config.range_truncated,
                                 |x| legend_format.format(x));
        log::debug!("swatches: {}", colors.iter().map(|c| c.to_hex())
                    .collect::<Vec<_>>().join(" "));
        let classifier = Classifier::new(bins, colors, config.no_data_color);
        Ok(Choropleth { config, classifier, legend, tooltip_format })
    }

    pub fn config(&self) -> &MapConfig { &self.config }

    pub fn classifier(&self) -> &Classifier { &self.classifier }

    pub fn legend(&self) -> &Legend { &self.legend }

    /// `"{name}: {value}"`, the identifier standing in for a missing
    /// name and "No Data" for a missing value.
    pub fn tooltip_text(&self, o: &Observation) -> String {
        let value = match o.value {
            Some(v) => self.tooltip_format.format(v),
            None => NO_DATA.to_string(),
        };
        match &o.name {
            Some(name) => format!("{name}: {value}"),
            None => format!("{}: {value}", o.id),
        }
    }

    /// Read the geometry and the observations named in the
    /// configuration, both at the same time.  Fails if either fails.
    pub fn load(&self) -> Result<(Topology, Vec<Observation>)> {
        let fields = Fields::from(&self.config);
        std::thread::scope(|s| -> Result<_> {
            let topology = s.spawn(|| Topology::from_path(&self.config.geometry_path));
            let observations = load_observations(&self.config.data_path, fields);
            let topology = topology.join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e))?;
            Ok((topology, observations?))
        })
    }

    fn swatches(&self) -> Vec<Swatch> {
        let entries = self.legend.entries();
        let (xs, width) = round_bands(entries.len(), self.config.width, BAND_PADDING);
        xs.into_iter().zip(entries)
            .map(|(x, e)| Swatch { x, width, color: e.color, label: e.label.clone() })
            .collect()
    }

    /// A scene made of the legend alone.
    pub fn legend_scene(&self) -> Scene {
        Scene { width: self.config.width, height: self.config.height,
                counties: Vec::new(), borders: String::new(),
                border_color: self.config.border_color,
                legend_y: self.config.height * 0.9,
                legend: self.swatches(), unmatched: 0, off_map: 0 }
    }

    /// Color the counties of `topology` after `observations`.
    pub fn scene(&self, topology: &Topology, observations: &[Observation])
                 -> Result<Scene> {
        let projection = AlbersUsa::for_canvas(self.config.width, self.config.height);
        // On duplicate identifiers, the last row wins.
        let by_id: HashMap<u32, &Observation> =
            observations.iter().map(|o| (o.id, o)).collect();
        let features = topology.features(COUNTIES)?;
        let mut counties = Vec::with_capacity(features.len());
        let (mut matched, mut off_map) = (0, 0);
        for feature in features {
            let record = feature.id.and_then(|id| by_id.get(&id));
            if record.is_some() { matched += 1 }
            let mut path = String::new();
            for polygon in &feature.geometry.0 {
                let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
                path_data(&projection, rings, true, &mut path);
            }
            if path.is_empty() {
                log::debug!("county {:?} is outside the map", feature.id);
                if record.is_some() { off_map += 1 }
                continue
            }
            counties.push(County {
                id: feature.id,
                path,
                fill: *self.classifier.color(record.and_then(|o| o.value)),
                tooltip: record.map(|o| self.tooltip_text(o)),
            });
        }
        let unmatched = by_id.len().saturating_sub(matched);
        if unmatched > 0 {
            log::warn!("{unmatched} observations match no county");
        }
        if off_map > 0 {
            log::warn!("{off_map} observations belong to counties outside the map");
        }
        let mut borders = String::new();
        match topology.interior_mesh(STATES) {
            Ok(lines) => path_data(&projection, &lines.0, false, &mut borders),
            Err(e) => log::warn!("no state borders: {e}"),
        }
        log::info!("{} counties drawn, {} with a record", counties.len(),
                   matched - off_map);
        Ok(Scene { counties, borders, unmatched, off_map, ..self.legend_scene() })
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl Scene {
    pub fn write_svg(&self, fh: &mut impl Write) -> io::Result<()> {
        writeln!(fh, "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100%\" \
                      viewBox=\"0 0 {} {}\">", self.width, self.height)?;
        if !self.counties.is_empty() || !self.borders.is_empty() {
            writeln!(fh, "<g class=\"counties\">")?;
            for c in &self.counties {
                let id = c.id.map(|id| format!(" id=\"county{id}\""))
                    .unwrap_or_default();
                match &c.tooltip {
                    Some(t) => writeln!(fh, "  <path{id} d=\"{}\" fill=\"{}\">\
                                             <title>{}</title></path>",
                                        c.path, c.fill.to_hex(), escape(t))?,
                    None => writeln!(fh, "  <path{id} d=\"{}\" fill=\"{}\"/>",
                                     c.path, c.fill.to_hex())?,
                }
            }
            if !self.borders.is_empty() {
                writeln!(fh, "  <path class=\"borders\" d=\"{}\" fill=\"none\" \
                              stroke=\"{}\" stroke-width=\"1.5\"/>",
                         self.borders, self.border_color.to_hex())?;
            }
            writeln!(fh, "</g>")?;
        }
        writeln!(fh, "<g class=\"legend\" transform=\"translate(0,{})\">",
                 self.legend_y)?;
        for s in &self.legend {
            writeln!(fh, "  <rect class=\"legend-item\" x=\"{}\" y=\"{}\" \
                          width=\"{}\" height=\"{SWATCH_HEIGHT}\" fill=\"{}\"/>",
                     s.x, -SWATCH_HEIGHT, s.width, s.color.to_hex())?;
        }
        for s in &self.legend {
            writeln!(fh, "  <g class=\"tick\" transform=\"translate({},0)\">\
                          <line y2=\"6\" stroke=\"#000\"/>\
                          <text y=\"9\" dy=\".71em\" text-anchor=\"middle\">{}</text></g>",
                     s.x + s.width / 2., escape(&s.label))?;
        }
        writeln!(fh, "</g>\n</svg>")?;
        Ok(())
    }

    /// Hover state of the counties that have a record.
    pub fn tooltips(&self) -> Tooltips {
        Tooltips {
            texts: self.counties.iter()
                .filter_map(|c| Some((c.id?, c.tooltip.clone()?)))
                .collect(),
            shown: None,
        }
    }
}

/// Tooltip shown while the pointer is over a county.
#[derive(Clone, Debug, Default)]
pub struct Tooltips {
    texts: HashMap<u32, String>,
    shown: Option<u32>,
}

impl Tooltips {
    /// The pointer enters county `id`.  Counties without a record
    /// have no tooltip and leave the current one untouched.
    pub fn on_hover(&mut self, id: u32) -> Option<&str> {
        if !self.texts.contains_key(&id) { return None }
        self.shown = Some(id);
        self.visible()
    }

    /// The pointer leaves a county.
    pub fn on_unhover(&mut self) {
        self.shown = None;
    }

    pub fn visible(&self) -> Option<&str> {
        self.shown.and_then(|id| self.texts.get(&id)).map(String::as_str)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // Three counties of Kansas-ish squares; 20001 and 20003 share an
    // edge and lie in different states.
    const TOPOLOGY: &str = r#"{
      "type": "Topology",
      "objects": {
        "counties": { "type": "GeometryCollection", "geometries": [
          { "type": "Polygon", "id": 20001, "arcs": [[0, 1]] },
          { "type": "Polygon", "id": "20003", "arcs": [[-1, 2]] },
          { "type": "Polygon", "id": 20005, "arcs": [[3]] }
        ]},
        "states": { "type": "GeometryCollection", "geometries": [
          { "type": "Polygon", "id": 20, "arcs": [[0, 1]] },
          { "type": "MultiPolygon", "id": 21, "arcs": [[[-1, 2]], [[3]]] }
        ]}
      },
      "arcs": [
        [[-99, 38], [-99, 39]],
        [[-99, 39], [-100, 39], [-100, 38], [-99, 38]],
        [[-99, 38], [-98, 38], [-98, 39], [-99, 39]],
        [[-98, 38], [-97, 38], [-97, 39], [-98, 39], [-98, 38]]
      ]
    }"#;

    const CSV: &str = "county,name,value\n\
                       20001,Allen & Co,130\n\
                       20003,Anderson,\n\
                       20007,Barber,80\n";

    fn map() -> Choropleth {
        Choropleth::new(MapConfig { min: 80., max: 125., steps: 10,
                                    ..MapConfig::default() }).unwrap()
    }

    fn scene(map: &Choropleth) -> Scene {
        let topology = Topology::from_reader(TOPOLOGY.as_bytes()).unwrap();
        let observations = crate::data::read_observations(
            CSV.as_bytes(), Fields::from(map.config())).unwrap();
        map.scene(&topology, &observations).unwrap()
    }

    #[test]
    fn bands() {
        let (xs, band) = round_bands(12, 580., 0.2);
        assert_eq!(band, 38.);
        assert_eq!(xs[0], 13.);
        assert_eq!(xs[1], 60.);
        assert_eq!(xs[11], 13. + 47. * 11.);
    }

    #[test]
    fn counties_are_colored_by_bin() {
        let map = map();
        let scene = scene(&map);
        let colors = map.classifier().colors();
        let no_data = map.config().no_data_color;
        let fills: Vec<_> = scene.counties.iter().map(|c| (c.id, c.fill)).collect();
        assert_eq!(fills, vec![(Some(20001), colors[9]),
                               (Some(20003), no_data),
                               (Some(20005), no_data)]);
        let tips: Vec<_> = scene.counties.iter().map(|c| c.tooltip.as_deref()).collect();
        assert_eq!(tips, vec![Some("Allen & Co: $130.00"), Some("Anderson: No Data"),
                              None]);
        assert!(scene.counties.iter().all(|c| c.path.starts_with('M')
                                          && c.path.ends_with('Z')));
        // Only the edge between 20001 and 20003 separates two states.
        assert_eq!(scene.borders.matches('M').count(), 1);
    }

    #[test]
    fn records_are_counted_once() {
        let map = map();
        let scene = scene(&map);
        // 20007 has no geometry.
        assert_eq!((scene.unmatched, scene.off_map), (1, 0));
        let topology = Topology::from_reader(r#"{
          "type": "Topology",
          "objects": { "counties": { "type": "GeometryCollection", "geometries": [
            { "type": "Polygon", "id": 20001, "arcs": [[0]] },
            { "type": "Polygon", "id": 20007, "arcs": [[1]] }
          ]}},
          "arcs": [
            [[-100, 38], [-99, 38], [-99, 39], [-100, 38]],
            [[2, 48], [3, 48], [3, 49], [2, 48]]
          ]
        }"#.as_bytes()).unwrap();
        let observations = crate::data::read_observations(
            CSV.as_bytes(), Fields::from(map.config())).unwrap();
        let scene = map.scene(&topology, &observations).unwrap();
        // 20007 lies in Europe: it exists but is not drawn.
        assert_eq!(scene.counties.len(), 1);
        assert_eq!((scene.unmatched, scene.off_map), (1, 1));
        assert!(scene.borders.is_empty());
    }

    #[test]
    fn legend_matches_scale() {
        let map = map();
        let scene = map.legend_scene();
        assert_eq!(scene.legend.len(), 11);
        assert_eq!(scene.legend[0].label, "No Data");
        assert_eq!(scene.legend[1].label, "$80-$85");
        assert_eq!(scene.legend[10].label, "$125+");
        for (s, c) in scene.legend[1 ..].iter().zip(map.classifier().colors()) {
            assert_eq!(s.color, *c);
        }
        let entry = map.legend().entry_for(Some(130.));
        assert_eq!(entry.color, *map.classifier().color(Some(130.)));
        assert_eq!(entry.label, "$125+");
        assert_eq!(map.classifier().index(Some(80.)), Some(0));
        assert_eq!(map.legend().entry_for(None).label, "No Data");
    }

    #[test]
    fn svg_output() {
        let map = map();
        let mut out = Vec::new();
        scene(&map).write_svg(&mut out).unwrap();
        let svg = String::from_utf8(out).unwrap();
        assert!(svg.starts_with("<svg "));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("viewBox=\"0 0 580 450\""));
        assert!(svg.contains("id=\"county20001\""));
        assert!(svg.contains("<title>Allen &amp; Co: $130.00</title>"));
        assert!(svg.contains("<path class=\"borders\""));
        assert!(svg.contains("translate(0,405)"));
        assert_eq!(svg.matches("<rect ").count(), 11);
        assert!(svg.contains(">$80-$85</text>"));
    }

    #[test]
    fn legend_only_svg() {
        let mut out = Vec::new();
        map().legend_scene().write_svg(&mut out).unwrap();
        let svg = String::from_utf8(out).unwrap();
        assert!(!svg.contains("class=\"counties\""));
        assert_eq!(svg.matches("<rect ").count(), 11);
    }

    #[test]
    fn hover() {
        let mut tips = scene(&map()).tooltips();
        assert_eq!(tips.visible(), None);
        assert_eq!(tips.on_hover(20001), Some("Allen & Co: $130.00"));
        assert_eq!(tips.on_hover(20005), None);
        assert_eq!(tips.visible(), Some("Allen & Co: $130.00"));
        assert_eq!(tips.on_hover(20003), Some("Anderson: No Data"));
        tips.on_unhover();
        assert_eq!(tips.visible(), None);
    }

    #[test]
    fn missing_name() {
        let o = Observation { id: 6037, name: None, value: Some(97.456) };
        assert_eq!(map().tooltip_text(&o), "6037: $97.46");
    }

    #[test]
    fn invalid_config() {
        let config = MapConfig { tooltip_format: "%%".into(), ..MapConfig::default() };
        assert!(Choropleth::new(config).is_err());
    }

    #[test]
    fn load_fails_on_missing_file() {
        let map = Choropleth::new(MapConfig {
            data_path: "/nonexistent/data.csv".into(),
            geometry_path: "/nonexistent/us.json".into(),
            ..MapConfig::default() }).unwrap();
        assert!(matches!(map.load(), Err(crate::Error::Io { .. })));
    }
}
