use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

const NOMINATIM_BASE: &str = "https://nominatim.openstreetmap.org";
const GOOGLE_GEOCODE_BASE: &str = "https://maps.googleapis.com";
const USER_AGENT: &str = "GlobeScope-AI/1.0 (contact@example.com)";

/// Seam for the reverse-geocoding step so handlers can be tested with a stub.
#[async_trait]
pub trait ResolveLocation: Send + Sync {
    /// Turn coordinates into a human-readable place string. Never fails:
    /// provider errors degrade to a raw-coordinate label.
    async fn resolve(&self, lat: f64, lng: f64) -> String;
}

/// Reverse geocoder backed by Nominatim, with an optional Google Geocoding
/// fallback when a key is configured.
pub struct LocationResolver {
    client: Client,
    google_api_key: Option<String>,
    nominatim_base: String,
    google_base: String,
}

impl LocationResolver {
    pub fn new(google_api_key: Option<String>) -> Self {
        Self::with_endpoints(
            google_api_key,
            NOMINATIM_BASE.to_string(),
            GOOGLE_GEOCODE_BASE.to_string(),
        )
    }

    /// Constructor with overridable provider endpoints, used by tests to
    /// point at unreachable hosts.
    pub fn with_endpoints(
        google_api_key: Option<String>,
        nominatim_base: String,
        google_base: String,
    ) -> Self {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            google_api_key,
            nominatim_base,
            google_base,
        }
    }

    async fn resolve_nominatim(&self, lat: f64, lng: f64) -> Option<String> {
        let url = format!("{}/reverse", self.nominatim_base);
        let result = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("accept-language", "en".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Nominatim request failed");
                return None;
            }
        };

        let data: NominatimResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Nominatim returned malformed payload");
                return None;
            }
        };

        compose_place(&data.address, data.display_name.as_deref())
    }

    async fn resolve_google(&self, lat: f64, lng: f64) -> Option<String> {
        let api_key = self.google_api_key.as_deref()?;

        let url = format!("{}/maps/api/geocode/json", self.google_base);
        let result = self
            .client
            .get(&url)
            .query(&[
                ("latlng", format!("{},{}", lat, lng)),
                ("key", api_key.to_string()),
                ("language", "en".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Google geocoding request failed");
                return None;
            }
        };

        let data: GoogleGeocodeResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Google geocoding returned malformed payload");
                return None;
            }
        };

        if data.status != "OK" {
            debug!(status = %data.status, "Google geocoding returned non-OK status");
            return None;
        }

        let result = data.results.first()?;
        compose_google_place(result)
    }
}

#[async_trait]
impl ResolveLocation for LocationResolver {
    async fn resolve(&self, lat: f64, lng: f64) -> String {
        if let Some(place) = self.resolve_nominatim(lat, lng).await {
            return place;
        }

        if let Some(place) = self.resolve_google(lat, lng).await {
            return place;
        }

        coordinate_label(lat, lng)
    }
}

/// Final fallback label when both providers come up empty.
pub fn coordinate_label(lat: f64, lng: f64) -> String {
    format!("Location at {:.4}, {:.4}", lat, lng)
}

#[derive(Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Deserialize, Default)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    province: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

/// Build "city, state, country" from a Nominatim address, skipping repeated
/// parts, with the first segment of the display name as a last resort.
fn compose_place(address: &NominatimAddress, display_name: Option<&str>) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    let city = address
        .city
        .as_deref()
        .or(address.town.as_deref())
        .or(address.village.as_deref())
        .or(address.hamlet.as_deref())
        .or(address.municipality.as_deref());
    if let Some(city) = city {
        parts.push(city.to_string());
    }

    let state = address
        .state
        .as_deref()
        .or(address.province.as_deref())
        .or(address.region.as_deref());
    if let Some(state) = state {
        if !parts.iter().any(|p| p == state) {
            parts.push(state.to_string());
        }
    }

    if let Some(country) = address.country.as_deref() {
        if !parts.iter().any(|p| p == country) {
            parts.push(country.to_string());
        }
    }

    if !parts.is_empty() {
        return Some(parts.join(", "));
    }

    display_name
        .and_then(|name| name.split(',').next())
        .map(|segment| segment.trim().to_string())
        .filter(|segment| !segment.is_empty())
}

#[derive(Deserialize)]
struct GoogleGeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Deserialize)]
struct GoogleResult {
    #[serde(default)]
    address_components: Vec<GoogleAddressComponent>,
    formatted_address: Option<String>,
}

#[derive(Deserialize)]
struct GoogleAddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

fn compose_google_place(result: &GoogleResult) -> Option<String> {
    let mut city = None;
    let mut state = None;
    let mut country = None;

    for component in &result.address_components {
        let types = &component.types;
        if types.iter().any(|t| t == "locality") || types.iter().any(|t| t == "administrative_area_level_2") {
            city = Some(component.long_name.clone());
        } else if types.iter().any(|t| t == "administrative_area_level_1") {
            state = Some(component.long_name.clone());
        } else if types.iter().any(|t| t == "country") {
            country = Some(component.long_name.clone());
        }
    }

    let parts: Vec<String> = [city, state, country].into_iter().flatten().collect();
    if !parts.is_empty() {
        return Some(parts.join(", "));
    }

    result
        .formatted_address
        .as_deref()
        .and_then(|addr| addr.split(',').next())
        .map(|segment| segment.trim().to_string())
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(
        city: Option<&str>,
        state: Option<&str>,
        country: Option<&str>,
    ) -> NominatimAddress {
        NominatimAddress {
            city: city.map(String::from),
            state: state.map(String::from),
            country: country.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn composes_city_state_country() {
        let addr = address(Some("London"), Some("England"), Some("United Kingdom"));
        assert_eq!(
            compose_place(&addr, None),
            Some("London, England, United Kingdom".to_string())
        );
    }

    #[test]
    fn skips_repeated_parts() {
        // City-states report the same name at several levels
        let addr = address(Some("Singapore"), Some("Singapore"), Some("Singapore"));
        assert_eq!(compose_place(&addr, None), Some("Singapore".to_string()));
    }

    #[test]
    fn falls_back_to_town_and_region() {
        let addr = NominatimAddress {
            town: Some("Ely".to_string()),
            region: Some("East of England".to_string()),
            country: Some("United Kingdom".to_string()),
            ..Default::default()
        };
        assert_eq!(
            compose_place(&addr, None),
            Some("Ely, East of England, United Kingdom".to_string())
        );
    }

    #[test]
    fn uses_display_name_when_address_is_empty() {
        let addr = NominatimAddress::default();
        assert_eq!(
            compose_place(&addr, Some("Big Ben, Westminster, London")),
            Some("Big Ben".to_string())
        );
        assert_eq!(compose_place(&addr, None), None);
    }

    #[test]
    fn google_components_map_to_place() {
        let result = GoogleResult {
            address_components: vec![
                GoogleAddressComponent {
                    long_name: "Paris".to_string(),
                    types: vec!["locality".to_string(), "political".to_string()],
                },
                GoogleAddressComponent {
                    long_name: "Île-de-France".to_string(),
                    types: vec!["administrative_area_level_1".to_string()],
                },
                GoogleAddressComponent {
                    long_name: "France".to_string(),
                    types: vec!["country".to_string()],
                },
            ],
            formatted_address: None,
        };
        assert_eq!(
            compose_google_place(&result),
            Some("Paris, Île-de-France, France".to_string())
        );
    }

    #[test]
    fn coordinate_label_uses_four_decimals() {
        assert_eq!(
            coordinate_label(51.5074, -0.1278),
            "Location at 51.5074, -0.1278"
        );
        assert_eq!(coordinate_label(0.0, 0.0), "Location at 0.0000, 0.0000");
    }

    #[tokio::test]
    async fn resolve_degrades_to_coordinate_label_when_providers_unreachable() {
        let resolver = LocationResolver::with_endpoints(
            Some("test-key".to_string()),
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
        );
        let place = resolver.resolve(51.5074, -0.1278).await;
        assert_eq!(place, "Location at 51.5074, -0.1278");
    }
}
