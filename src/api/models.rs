use serde::{Deserialize, Serialize};

use crate::request_log::Coordinates;

/// Body of `POST /api/news`. Fields are optional so a missing coordinate can
/// be reported as a 400 rather than a deserialization rejection.
#[derive(Deserialize)]
pub struct NewsRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Serialize)]
pub struct NewsResponse {
    pub location: String,
    pub coordinates: Coordinates,
    pub summary: String,
    pub articles_count: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Range-check a coordinate pair. NaN fails both checks.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err("Latitude must be between -90 and 90".to_string());
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err("Longitude must be between -180 and 180".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_coordinates() {
        assert!(validate_coordinates(51.5074, -0.1278).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = validate_coordinates(999.0, 0.0).unwrap_err();
        assert_eq!(err, "Latitude must be between -90 and 90");
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        let err = validate_coordinates(0.0, -200.0).unwrap_err();
        assert_eq!(err, "Longitude must be between -180 and 180");
    }

    #[test]
    fn rejects_nan() {
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
    }
}
