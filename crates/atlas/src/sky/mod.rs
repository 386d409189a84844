//! Celestial coordinates and the sky partitioning grid.
//!
//! - [`Coordinate`]: equatorial position (RA/Dec in degrees)
//! - [`grid`]: the fixed 25,920-cell grid and the position bucketing function
//! - [`division`]: per-query cell flag maps and their cursor

pub mod division;
pub mod grid;

pub use division::{DivisionMap, DivisionMapCursor};
pub use grid::{Cell, CellGrid, CELL_COUNT};

use crate::error::{AtlasError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

/// An equatorial sky position.
///
/// Right ascension is kept in `[0, 360)` degrees, declination in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    ra_deg: f64,
    dec_deg: f64,
}

impl Coordinate {
    /// Creates a coordinate from RA and Dec in degrees.
    ///
    /// RA is wrapped into `[0, 360)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if either value is not finite or Dec is
    /// outside `[-90, 90]`.
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self> {
        if !ra_deg.is_finite() || !dec_deg.is_finite() {
            return Err(AtlasError::InvalidCoordinate(format!(
                "non-finite position ({ra_deg}, {dec_deg})"
            )));
        }
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(AtlasError::InvalidCoordinate(format!(
                "declination {dec_deg} outside [-90, 90]"
            )));
        }
        Ok(Self::from_degrees_unchecked(ra_deg, dec_deg))
    }

    /// Creates a coordinate from RA in hours and Dec in degrees.
    pub fn from_hours(ra_hours: f64, dec_deg: f64) -> Result<Self> {
        Self::new(ra_hours * 15.0, dec_deg)
    }

    /// Builds a coordinate the caller already knows to be in range.
    pub(crate) fn from_degrees_unchecked(ra_deg: f64, dec_deg: f64) -> Self {
        let mut ra_deg = ra_deg.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if ra_deg >= 360.0 {
            ra_deg = 0.0;
        }
        Self {
            ra_deg,
            dec_deg: dec_deg.clamp(-90.0, 90.0),
        }
    }

    /// Parses a sexagesimal position such as `"10:00:00 +20:00:00"`.
    ///
    /// RA is read in hours and Dec in degrees. Each part may carry one to three
    /// colon-separated fields, so `"10.5 -20.25"` is also accepted. Six
    /// whitespace-separated fields (`"10 00 00 +20 00 00"`) work too.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` for minutes or seconds of 60 or more, a
    /// signed or out-of-range RA, or a Dec outside `[-90, 90]`.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let (ra_hours, dec_deg) = match tokens.as_slice() {
            [ra, dec] => (parse_hours(ra)?, parse_degrees(dec)?),
            [h, m, s, d, dm, ds] => (
                parse_hours(&format!("{h}:{m}:{s}"))?,
                parse_degrees(&format!("{d}:{dm}:{ds}"))?,
            ),
            _ => {
                return Err(AtlasError::InvalidCoordinate(format!(
                    "cannot parse position {text:?}"
                )))
            }
        };
        Self::from_hours(ra_hours, dec_deg)
    }

    /// Right ascension in degrees, `[0, 360)`.
    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    /// Right ascension in hours, `[0, 24)`.
    pub fn ra_hours(&self) -> f64 {
        self.ra_deg / 15.0
    }

    /// Declination in degrees, `[-90, 90]`.
    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    /// Great-circle separation to `other`, in degrees.
    pub fn separation(&self, other: &Coordinate) -> f64 {
        angular_separation_deg(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ra_centis = (self.ra_hours() * 360_000.0).round() as i64 % 8_640_000;
        let (ra_h, rest) = (ra_centis / 360_000, ra_centis % 360_000);
        let (ra_m, ra_s) = (rest / 6_000, (rest % 6_000) as f64 / 100.0);

        let sign = if self.dec_deg < 0.0 { '-' } else { '+' };
        let dec_decis = (self.dec_deg.abs() * 36_000.0).round() as i64;
        let (dec_d, rest) = (dec_decis / 36_000, dec_decis % 36_000);
        let (dec_m, dec_s) = (rest / 600, (rest % 600) as f64 / 10.0);

        write!(
            f,
            "{ra_h:02}:{ra_m:02}:{ra_s:05.2} {sign}{dec_d:02}:{dec_m:02}:{dec_s:04.1}"
        )
    }
}

/// Great-circle separation between two positions given in degrees.
///
/// Uses the haversine form, which stays accurate for small angles.
pub fn angular_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (dec1, dec2) = (dec1.to_radians(), dec2.to_radians());
    let half_d_dec = (dec2 - dec1) / 2.0;
    let half_d_ra = (ra2 - ra1).to_radians() / 2.0;
    let a = half_d_dec.sin().powi(2) + dec1.cos() * dec2.cos() * half_d_ra.sin().powi(2);
    (2.0 * a.sqrt().min(1.0).asin()).to_degrees()
}

/// Right ascension: hours, then optional minutes and seconds below 60.
/// A fraction is allowed on any field.
static HMS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\+?
        (\d{1,2}(?:\.\d+)?)                  # hours
        (?:
            :([0-5]?\d(?:\.\d+)?)            # minutes
            (?::([0-5]?\d(?:\.\d+)?))?       # seconds
        )?$
        ",
    )
    .expect("right ascension pattern is valid")
});

/// Declination: optional sign, degrees, then optional minutes and seconds.
static DMS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^([+-])?
        (\d{1,2}(?:\.\d+)?)                  # degrees
        (?:
            :([0-5]?\d(?:\.\d+)?)            # arcminutes
            (?::([0-5]?\d(?:\.\d+)?))?       # arcseconds
        )?$
        ",
    )
    .expect("declination pattern is valid")
});

fn parse_hours(text: &str) -> Result<f64> {
    let caps = HMS_REGEX
        .captures(text)
        .ok_or_else(|| bad_field("right ascension", text))?;
    let hours = sexagesimal_value(&caps, 1, text)?;
    if hours >= 24.0 {
        return Err(AtlasError::InvalidCoordinate(format!(
            "right ascension {text:?} outside [0, 24) hours"
        )));
    }
    Ok(hours)
}

fn parse_degrees(text: &str) -> Result<f64> {
    let caps = DMS_REGEX
        .captures(text)
        .ok_or_else(|| bad_field("declination", text))?;
    let degrees = sexagesimal_value(&caps, 2, text)?;
    let negative = caps.get(1).is_some_and(|sign| sign.as_str() == "-");
    Ok(if negative { -degrees } else { degrees })
}

/// Sums the unit, minute and second groups starting at capture `first`.
fn sexagesimal_value(caps: &Captures<'_>, first: usize, text: &str) -> Result<f64> {
    let mut value = 0.0;
    for (group, scale) in (first..first + 3).zip([1.0, 60.0, 3600.0]) {
        if let Some(field) = caps.get(group) {
            let field: f64 = field
                .as_str()
                .parse()
                .map_err(|_| bad_field("sexagesimal", text))?;
            value += field / scale;
        }
    }
    Ok(value)
}

fn bad_field(what: &str, text: &str) -> AtlasError {
    AtlasError::InvalidCoordinate(format!("bad {what} value {text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separation_same_point() {
        let c = Coordinate::new(150.0, 20.0).unwrap();
        assert!(c.separation(&c).abs() < 1e-12);
    }

    #[test]
    fn test_separation_pole_to_equator() {
        let pole = Coordinate::new(0.0, 90.0).unwrap();
        let eq = Coordinate::new(123.0, 0.0).unwrap();
        assert!((pole.separation(&eq) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_separation_antipodes() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(180.0, 0.0).unwrap();
        assert!((a.separation(&b) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_ra_wraps() {
        let c = Coordinate::new(-15.0, 0.0).unwrap();
        assert!((c.ra_deg() - 345.0).abs() < 1e-12);
        let c = Coordinate::new(720.0, 0.0).unwrap();
        assert_eq!(c.ra_deg(), 0.0);
    }

    #[test]
    fn test_declination_out_of_range() {
        assert!(matches!(
            Coordinate::new(0.0, 91.0),
            Err(AtlasError::InvalidCoordinate(_))
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_parse_sexagesimal() {
        let c = Coordinate::parse("10:30:00 -20:15:00").unwrap();
        assert!((c.ra_hours() - 10.5).abs() < 1e-12);
        assert!((c.dec_deg() + 20.25).abs() < 1e-12);

        let c = Coordinate::parse("10 30 00 +20 15 00").unwrap();
        assert!((c.dec_deg() - 20.25).abs() < 1e-12);

        let c = Coordinate::parse("1.5 -0.5").unwrap();
        assert!((c.ra_deg() - 22.5).abs() < 1e-12);
        assert!((c.dec_deg() + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Coordinate::parse("north").is_err());
        assert!(Coordinate::parse("10:xx:00 +20:00:00").is_err());
        assert!(Coordinate::parse("10:00:00:00 +20").is_err());
        assert!(Coordinate::parse("10 +95").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_fields() {
        for text in [
            "10:75:00 +20:00:00",
            "10:00:60 +20:00:00",
            "10:00:00 +20:60:00",
            "10:00:00 +20:00:61.5",
            "-01:00:00 +20:00:00",
            "24:00:00 +20:00:00",
            "10 75 00 +20 00 00",
        ] {
            assert!(
                matches!(Coordinate::parse(text), Err(AtlasError::InvalidCoordinate(_))),
                "{text} should be rejected"
            );
        }

        let c = Coordinate::parse("23:59:59.99 -89:59:59.9").unwrap();
        assert!(c.ra_hours() < 24.0);
        assert!(c.dec_deg() > -90.0);
    }

    #[test]
    fn test_display() {
        let c = Coordinate::parse("05:34:31.94 +22:00:52.2").unwrap();
        assert_eq!(c.to_string(), "05:34:31.94 +22:00:52.2");
        let c = Coordinate::from_hours(23.0, -0.5).unwrap();
        assert_eq!(c.to_string(), "23:00:00.00 -00:30:00.0");
    }
}
