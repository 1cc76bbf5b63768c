//! Observations read from CSV.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::{Error, MapConfig, Result};

/// One CSV row: a county and its (possibly missing) value.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// County identifier, as found in the geometry.
    pub id: u32,
    pub name: Option<String>,
    /// `None` when the cell does not start with a number.
    pub value: Option<f64>,
}

/// Names of the columns to read.
#[derive(Clone, Copy, Debug)]
pub struct Fields<'a> {
    pub id: &'a str,
    /// Optional column; rows get no name when it is absent.
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> From<&'a MapConfig> for Fields<'a> {
    fn from(c: &'a MapConfig) -> Self {
        Fields { id: &c.county_id_field, name: &c.county_name_field,
                 value: &c.observation_field }
    }
}

/// Leading integer of `s` (after optional blanks and `+`), the way
/// identifiers such as `"01001"` or `"1001.0"` are joined to the
/// geometry.
pub fn parse_id(s: &str) -> Option<u32> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[.. end].parse().ok()
}

/// The number at the start of a cell, `None` for "No Data".
///
/// As for identifiers, trailing text is ignored: `"88.2*"` reads as
/// 88.2.  `Infinity` (with an optional sign) is accepted and falls in
/// the first or last bin.
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let b = s.as_bytes();
    let digits = |i: &mut usize| {
        let start = *i;
        while b.get(*i).is_some_and(u8::is_ascii_digit) { *i += 1 }
        *i - start
    };
    let mut i = 0;
    let negative = b.first() == Some(&b'-');
    if matches!(b.first(), Some(b'+' | b'-')) { i += 1 }
    if s[i ..].starts_with("Infinity") {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY })
    }
    let mut n = digits(&mut i);
    if b.get(i) == Some(&b'.') {
        i += 1;
        n += digits(&mut i);
    }
    if n == 0 { return None }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(b.get(j), Some(b'+' | b'-')) { j += 1 }
        if digits(&mut j) > 0 { i = j }
    }
    s[.. i].parse().ok()
}

/// Read observations from CSV data with a header row.  Rows whose
/// identifier is not a number are skipped.
pub fn read_observations<R: Read>(rdr: R, fields: Fields) -> Result<Vec<Observation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let id_col = column(fields.id)
        .ok_or_else(|| Error::MissingColumn(fields.id.to_string()))?;
    let value_col = column(fields.value)
        .ok_or_else(|| Error::MissingColumn(fields.value.to_string()))?;
    let name_col = column(fields.name);
    if name_col.is_none() && !fields.name.is_empty() {
        log::warn!("no {:?} column, tooltips will show identifiers", fields.name);
    }
    let mut observations = Vec::new();
    let mut skipped = 0;
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_id = record.get(id_col).unwrap_or("");
        let Some(id) = parse_id(raw_id) else {
            log::debug!("row {}: identifier {raw_id:?} is not a number", row + 1);
            skipped += 1;
            continue
        };
        let name = name_col.and_then(|c| record.get(c))
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let value = record.get(value_col).and_then(parse_value);
        observations.push(Observation { id, name, value });
    }
    log::info!("{} observations read, {} rows skipped, {} without data",
               observations.len(), skipped,
               observations.iter().filter(|o| o.value.is_none()).count());
    Ok(observations)
}

/// Read the observations of the CSV file at `path`.
pub fn load_observations(path: &Path, fields: Fields) -> Result<Vec<Observation>> {
    let fh = File::open(path).map_err(|e| Error::io(path, e))?;
    read_observations(fh, fields)
}


#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: Fields = Fields { id: "county", name: "name", value: "value" };

    #[test]
    fn ids() {
        assert_eq!(parse_id("01001"), Some(1001));
        assert_eq!(parse_id(" 1001.0"), Some(1001));
        assert_eq!(parse_id("+56045x"), Some(56045));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("-5"), None);
    }

    #[test]
    fn values() {
        assert_eq!(parse_value(" 97.5 "), Some(97.5));
        assert_eq!(parse_value("1e2"), Some(100.));
        assert_eq!(parse_value("88.2*"), Some(88.2));
        assert_eq!(parse_value("97 (est.)"), Some(97.));
        assert_eq!(parse_value("-.5e-1x"), Some(-0.05));
        assert_eq!(parse_value("+3."), Some(3.));
        assert_eq!(parse_value("12e"), Some(12.));
        assert_eq!(parse_value("1.2.3"), Some(1.2));
        assert_eq!(parse_value("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_value("-Infinity%"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value("-"), None);
        assert_eq!(parse_value("n/a"), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
    }

    #[test]
    fn annotated_values_are_binned() {
        let csv = "county,name,value\n\
                   01001,Autauga,88.2*\n\
                   01003,Baldwin,Infinity\n\
                   01005,Barbour,-Infinity\n";
        let obs = read_observations(csv.as_bytes(), FIELDS).unwrap();
        let values: Vec<_> = obs.iter().map(|o| o.value).collect();
        assert_eq!(values, [Some(88.2), Some(f64::INFINITY), Some(f64::NEG_INFINITY)]);
        let bins = crate::Bins::new(80., 125., 10);
        assert_eq!(bins.index(88.2), Some(1));
        assert_eq!(bins.index(f64::INFINITY), Some(9));
        assert_eq!(bins.index(f64::NEG_INFINITY), Some(0));
    }

    #[test]
    fn read() {
        let csv = "county,name,value\n\
                   01001,\"Autauga County, AL\",88.5\n\
                   01003,Baldwin County,\n\
                   total,All counties,100\n\
                   01005,Barbour County,n/a\n";
        let obs = read_observations(csv.as_bytes(), FIELDS).unwrap();
        assert_eq!(obs, vec![
            Observation { id: 1001, name: Some("Autauga County, AL".into()),
                          value: Some(88.5) },
            Observation { id: 1003, name: Some("Baldwin County".into()), value: None },
            Observation { id: 1005, name: Some("Barbour County".into()), value: None },
        ]);
    }

    #[test]
    fn optional_name_column() {
        let csv = "value,county\n130,6037\n";
        let obs = read_observations(csv.as_bytes(), FIELDS).unwrap();
        assert_eq!(obs, vec![Observation { id: 6037, name: None, value: Some(130.) }]);
    }

    #[test]
    fn missing_column() {
        let csv = "id,name,rpp\n1001,Autauga,88\n";
        match read_observations(csv.as_bytes(), FIELDS) {
            Err(Error::MissingColumn(c)) => assert_eq!(c, "county"),
            r => panic!("unexpected {r:?}"),
        }
    }

    #[test]
    fn missing_file() {
        let r = load_observations(Path::new("/nonexistent/data.csv"), FIELDS);
        assert!(matches!(r, Err(Error::Io { .. })));
    }
}
