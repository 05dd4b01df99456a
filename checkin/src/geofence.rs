//! Great-circle distance check for location-based check-ins.

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Allowed radius when a session does not set one.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

/// Haversine distance in metres between two (lat, lng) pairs in degrees.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Distance from the target plus whether it falls within the allowed
/// radius. The raw distance is returned so rejections can report it.
pub fn within_range(
    user_lat: f64,
    user_lng: f64,
    target_lat: f64,
    target_lng: f64,
    radius_m: f64,
) -> (bool, f64) {
    let d = distance_m(user_lat, user_lng, target_lat, target_lng);
    (d <= radius_m, d)
}

/// Distances are reported to one decimal place.
pub fn round_distance(d: f64) -> f64 {
    (d * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // A point `metres` due north of the origin along a meridian.
    fn north_of_origin(metres: f64) -> (f64, f64) {
        ((metres / EARTH_RADIUS_M).to_degrees(), 0.0)
    }

    #[test]
    fn zero_distance_at_same_point() {
        assert!(distance_m(12.5, 33.0, 12.5, 33.0) < 1e-9);
    }

    #[test]
    fn meridian_distance_matches_arc_length() {
        let (lat, lng) = north_of_origin(1000.0);
        let d = distance_m(0.0, 0.0, lat, lng);
        assert!((d - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn boundary_around_fifty_metres() {
        let (lat_in, lng_in) = north_of_origin(49.9);
        let (ok, d) = within_range(lat_in, lng_in, 0.0, 0.0, DEFAULT_RADIUS_M);
        assert!(ok);
        assert_eq!(round_distance(d), 49.9);

        let (lat_out, lng_out) = north_of_origin(50.1);
        let (ok, d) = within_range(lat_out, lng_out, 0.0, 0.0, DEFAULT_RADIUS_M);
        assert!(!ok);
        assert_eq!(round_distance(d), 50.1);
    }

    #[test]
    fn known_city_pair_is_plausible() {
        // Pretoria to Johannesburg is roughly 54-55 km center to center.
        let d = distance_m(-25.7479, 28.2293, -26.2041, 28.0473);
        assert!(d > 50_000.0 && d < 60_000.0, "got {d}");
    }
}
