//! CSV loaders for transect and custom-curve geometry tables.
//!
//! Full input-file parsing for a network is out of scope, but the two
//! geometry inputs that cannot reasonably be hand-typed into JSON — a
//! surveyed channel transect and a caller-defined closed-shape curve — are
//! the kind of tabular input a spreadsheet workflow naturally produces.
//!
//! ## CSV formats
//!
//! Transect: `station,elevation` rows, ascending by station.
//! Custom curve: `depth_frac,width_frac` rows, ascending from `(0, 0)`.

use crate::xsect::{CustomCurve, Transect, TransectPoint};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TransectRecord {
    station: f64,
    elevation: f64,
}

#[derive(Debug, Deserialize)]
struct CurveRecord {
    depth_frac: f64,
    width_frac: f64,
}

/// Load transect points from a `station,elevation` CSV file. Manning's n
/// values, bank stations, and the length factor are not encoded in the
/// geometry table and must be supplied by the caller.
pub fn load_transect_points(path: impl AsRef<Path>) -> Result<Vec<TransectPoint>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut points = Vec::new();
    for result in reader.deserialize() {
        let record: TransectRecord = result?;
        points.push(TransectPoint { station: record.station, elevation: record.elevation });
    }
    Ok(points)
}

/// Build a [`Transect`] from a CSV file plus the roughness/bank parameters
/// that do not belong in the tabular geometry.
pub fn load_transect(
    path: impl AsRef<Path>,
    manning_left: f64,
    manning_channel: f64,
    manning_right: f64,
    left_bank_station: f64,
    right_bank_station: f64,
    length_factor: f64,
) -> Result<Transect, Box<dyn Error>> {
    let points = load_transect_points(path)?;
    Ok(Transect {
        points,
        manning_left,
        manning_channel,
        manning_right,
        left_bank_station,
        right_bank_station,
        length_factor,
    })
}

/// Build a [`CustomCurve`] from a `depth_frac,width_frac` CSV file.
pub fn load_custom_curve(path: impl AsRef<Path>, full_depth: f64, full_width: f64) -> Result<CustomCurve, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut points = Vec::new();
    for result in reader.deserialize() {
        let record: CurveRecord = result?;
        points.push((record.depth_frac, record.width_frac));
    }
    Ok(CustomCurve { points, full_depth, full_width })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_transect_points_from_csv() {
        let path = write_temp("hec22-test-transect.csv", "station,elevation\n0,10\n5,2\n10,10\n");
        let points = load_transect_points(&path).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].station, 5.0);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn loads_custom_curve_from_csv() {
        let path = write_temp("hec22-test-curve.csv", "depth_frac,width_frac\n0,0\n0.5,1\n1,0.8\n");
        let curve = load_custom_curve(&path, 5.0, 4.0).unwrap();
        assert_eq!(curve.points.len(), 3);
        assert_eq!(curve.full_depth, 5.0);
        fs::remove_file(&path).unwrap();
    }
}
