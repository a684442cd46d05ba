//! Maidenhead grid square (6-character locator).
//!
//! A locator is either valid, in which case it carries the coordinates of
//! its subsquare centre, or invalid, in which case it carries `(0, 0)` and
//! refuses to take part in bearing or distance computation.

use std::{fmt, str::FromStr};

use crate::error::ProtocolError;

/// Mean Earth radius used for great-circle distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Longitude width of one subsquare, in degrees.
const SUBSQUARE_LON: f64 = 2.0 / 24.0;

/// Latitude height of one subsquare, in degrees.
const SUBSQUARE_LAT: f64 = 1.0 / 24.0;

/// Six-character Maidenhead locator.
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    raw: String,
    valid: bool,
    latitude: f64,
    longitude: f64,
}

impl Locator {
    /// Parse leniently. Never fails; check [`Locator::is_valid`].
    ///
    /// Input is trimmed and uppercased. Anything that is not
    /// `[A-R]{2}[0-9]{2}[A-X]{2}` yields an invalid locator that keeps the
    /// normalized text.
    pub fn parse(input: &str) -> Self {
        let raw = input.trim().to_ascii_uppercase();
        match decode(raw.as_bytes()) {
            Some((latitude, longitude)) => Self { raw, valid: true, latitude, longitude },
            None => Self { raw, valid: false, latitude: 0.0, longitude: 0.0 },
        }
    }

    /// The empty (invalid) locator.
    pub fn empty() -> Self {
        Self { raw: String::new(), valid: false, latitude: 0.0, longitude: 0.0 }
    }

    /// Locator of the subsquare containing the given coordinates.
    ///
    /// Coordinates are clamped into the grid. Non-finite input yields the
    /// empty locator.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Self::empty();
        }

        let lon = (longitude + 180.0).clamp(0.0, 360.0);
        let lat = (latitude + 90.0).clamp(0.0, 180.0);

        let lon_field = ((lon / 20.0).floor() as u8).min(17);
        let lat_field = ((lat / 10.0).floor() as u8).min(17);
        let lon_square = (((lon - f64::from(lon_field) * 20.0) / 2.0).floor() as u8).min(9);
        let lat_square = ((lat - f64::from(lat_field) * 10.0).floor() as u8).min(9);
        let lon_rest = lon - f64::from(lon_field) * 20.0 - f64::from(lon_square) * 2.0;
        let lat_rest = lat - f64::from(lat_field) * 10.0 - f64::from(lat_square);
        let lon_sub = ((lon_rest / SUBSQUARE_LON).floor() as u8).min(23);
        let lat_sub = ((lat_rest / SUBSQUARE_LAT).floor() as u8).min(23);

        let raw: String = [
            b'A' + lon_field,
            b'A' + lat_field,
            b'0' + lon_square,
            b'0' + lat_square,
            b'A' + lon_sub,
            b'A' + lat_sub,
        ]
        .iter()
        .map(|b| char::from(*b))
        .collect();

        Self::parse(&raw)
    }

    /// Normalized (uppercase) text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the text is a well-formed 6-character locator.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether no text was given at all.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Latitude of the subsquare centre, `0.0` if invalid.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude of the subsquare centre, `0.0` if invalid.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `(latitude, longitude)` of the subsquare centre, `(0, 0)` if invalid.
    pub fn to_coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Initial great-circle bearing in degrees `[0, 360)`.
    ///
    /// `None` if either side is invalid.
    pub fn bearing_to(&self, other: &Locator) -> Option<f64> {
        if !self.valid || !other.valid {
            return None;
        }

        let (phi1, lambda1) = (self.latitude.to_radians(), self.longitude.to_radians());
        let (phi2, lambda2) = (other.latitude.to_radians(), other.longitude.to_radians());
        let delta = lambda2 - lambda1;

        let y = delta.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta.cos();
        Some((y.atan2(x).to_degrees() + 360.0) % 360.0)
    }

    /// Great-circle distance in kilometres (haversine).
    ///
    /// `None` if either side is invalid.
    pub fn distance_km_to(&self, other: &Locator) -> Option<f64> {
        if !self.valid || !other.valid {
            return None;
        }

        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = phi2 - phi1;
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        Some(2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt()))
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strict parse used for local validation of outbound grid changes.
impl FromStr for Locator {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let locator = Self::parse(s);
        if locator.valid {
            Ok(locator)
        } else {
            Err(ProtocolError::InvalidLocator { raw: s.to_string() })
        }
    }
}

/// Subsquare centre of an uppercase locator, `None` if malformed.
fn decode(raw: &[u8]) -> Option<(f64, f64)> {
    let &[lon_field, lat_field, lon_square, lat_square, lon_sub, lat_sub] = raw else {
        return None;
    };

    let field = |b: u8| (b'A'..=b'R').contains(&b).then(|| f64::from(b - b'A'));
    let square = |b: u8| b.is_ascii_digit().then(|| f64::from(b - b'0'));
    let sub = |b: u8| (b'A'..=b'X').contains(&b).then(|| f64::from(b - b'A'));

    let longitude = field(lon_field)? * 20.0 - 180.0
        + square(lon_square)? * 2.0
        + sub(lon_sub)? * SUBSQUARE_LON
        + SUBSQUARE_LON / 2.0;
    let latitude = field(lat_field)? * 10.0 - 90.0
        + square(lat_square)?
        + sub(lat_sub)? * SUBSQUARE_LAT
        + SUBSQUARE_LAT / 2.0;

    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_case() {
        let loc = Locator::parse("jn79hk");
        assert!(loc.is_valid());
        assert_eq!(loc.raw(), "JN79HK");
    }

    #[test]
    fn subsquare_centre_coordinates() {
        let (lat, lon) = Locator::parse("JO20AA").to_coordinates();
        assert!((lat - (50.0 + 1.0 / 48.0)).abs() < 1e-9);
        assert!((lon - (4.0 + 1.0 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn invalid_locators_carry_origin() {
        for raw in ["", "JN79", "JN79HKX", "SN79HK", "JN79HY", "1N79HK", "JNA9HK"] {
            let loc = Locator::parse(raw);
            assert!(!loc.is_valid(), "{raw} should be invalid");
            assert_eq!(loc.to_coordinates(), (0.0, 0.0));
        }
    }

    #[test]
    fn strict_parse_rejects_malformed() {
        assert!("JN79HK".parse::<Locator>().is_ok());
        assert_eq!(
            "JN7".parse::<Locator>(),
            Err(ProtocolError::InvalidLocator { raw: "JN7".to_string() })
        );
    }

    #[test]
    fn bearing_and_distance_undefined_for_invalid() {
        let good = Locator::parse("JN79HK");
        let bad = Locator::parse("ZZ99ZZ");
        assert_eq!(good.bearing_to(&bad), None);
        assert_eq!(bad.distance_km_to(&good), None);
        assert_eq!(Locator::empty().distance_km_to(&Locator::empty()), None);
    }

    #[test]
    fn distance_between_known_squares() {
        // Brussels area to London area, roughly 320 km apart.
        let brussels = Locator::parse("JO20EU");
        let london = Locator::parse("IO91WM");
        let km = brussels.distance_km_to(&london).unwrap();
        assert!((300.0..340.0).contains(&km), "got {km}");

        let bearing = brussels.bearing_to(&london).unwrap();
        assert!((270.0..300.0).contains(&bearing), "got {bearing}");
    }

    #[test]
    fn from_coordinates_clamps_edges() {
        assert_eq!(Locator::from_coordinates(90.0, 180.0).raw(), "RR99XX");
        assert_eq!(Locator::from_coordinates(-90.0, -180.0).raw(), "AA00AA");
        assert!(!Locator::from_coordinates(f64::NAN, 0.0).is_valid());
    }
}
