//! GPS attestation
//!
//! A photo's GPS reading is attested against the geocoded coordinates of the
//! property under inspection. A missing reading or an un-geocoded property is
//! not an error; the envelope simply records the photo as not location
//! verified.

use serde::{Deserialize, Serialize};

/// Maximum great-circle distance between the photo and the property for the
/// location to count as verified.
pub const LOCATION_THRESHOLD_METRES: f64 = 100.0;

/// Mean Earth radius in metres.
const EARTH_RADIUS_METRES: f64 = 6_371_000.0;

/// One GPS fix taken at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsReading {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported horizontal accuracy in metres, when the platform provides it.
    pub accuracy: Option<f64>,
}

impl GpsReading {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }
}

/// Great-circle distance in metres between two WGS-84 points (haversine).
pub fn haversine_distance_metres(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METRES * c
}

/// Attest a GPS reading against a property's geocoded coordinates.
///
/// Returns `true` iff both sides are present and within
/// [`LOCATION_THRESHOLD_METRES`] of each other. Either side missing yields
/// `false`: the photo is unverified, not invalid.
pub fn attest_location(reading: Option<&GpsReading>, property_coords: Option<(f64, f64)>) -> bool {
    match (reading, property_coords) {
        (Some(gps), Some((lat, lon))) => {
            let distance = haversine_distance_metres(gps.latitude, gps.longitude, lat, lon);
            distance <= LOCATION_THRESHOLD_METRES
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Melbourne CBD fixture; the capture point is roughly 14 m from the
    // property.
    const PROPERTY: (f64, f64) = (-37.8136, 144.9631);
    const NEARBY: (f64, f64) = (-37.8137, 144.9632);

    #[test]
    fn test_nearby_capture_verifies() {
        let reading = GpsReading::new(NEARBY.0, NEARBY.1);
        assert!(attest_location(Some(&reading), Some(PROPERTY)));

        let distance =
            haversine_distance_metres(NEARBY.0, NEARBY.1, PROPERTY.0, PROPERTY.1);
        assert!(distance > 5.0 && distance < 25.0, "expected ~14m, got {distance}");
    }

    #[test]
    fn test_distant_capture_fails() {
        // Sydney Opera House, well outside 100 m of the Melbourne property.
        let reading = GpsReading::new(-33.8568, 151.2153);
        assert!(!attest_location(Some(&reading), Some(PROPERTY)));
    }

    #[test]
    fn test_threshold_boundary() {
        // ~0.0008 degrees of latitude is ~89 m; ~0.001 is ~111 m.
        let inside = GpsReading::new(PROPERTY.0 + 0.0008, PROPERTY.1);
        let outside = GpsReading::new(PROPERTY.0 + 0.0010, PROPERTY.1);
        assert!(attest_location(Some(&inside), Some(PROPERTY)));
        assert!(!attest_location(Some(&outside), Some(PROPERTY)));
    }

    #[test]
    fn test_missing_sides_are_unverified_not_invalid() {
        let reading = GpsReading::new(NEARBY.0, NEARBY.1);
        assert!(!attest_location(None, Some(PROPERTY)));
        assert!(!attest_location(Some(&reading), None));
        assert!(!attest_location(None, None));
    }

    #[test]
    fn test_zero_distance() {
        let d = haversine_distance_metres(PROPERTY.0, PROPERTY.1, PROPERTY.0, PROPERTY.1);
        assert!(d.abs() < 1e-6);
    }
}
