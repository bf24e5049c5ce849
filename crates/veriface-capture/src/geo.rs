//! Approximate location from the caller's public IP.
//!
//! The lookup is optional enrichment for enrollment: every failure is logged
//! and turns into `None`, never into an error for the caller.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use veriface_core::identity::Coordinates;

pub const DEFAULT_GEOLOCATION_URL: &str = "https://ipapi.co/json/";

#[derive(Debug, Deserialize)]
struct IpLocation {
  latitude:  Option<f64>,
  longitude: Option<f64>,
}

/// IP geolocation over HTTP. Any JSON service reporting `latitude` and
/// `longitude` fields works.
#[derive(Clone)]
pub struct GeoLocator {
  client: Client,
  url:    String,
}

impl GeoLocator {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }

  pub async fn locate(&self) -> Option<Coordinates> {
    match self.fetch().await {
      Ok(Some(coordinates)) => {
        tracing::debug!(lat = ?coordinates.lat, lng = ?coordinates.lng, "located caller");
        Some(coordinates)
      }
      Ok(None) => {
        tracing::warn!(url = %self.url, "geolocation response carried no coordinates");
        None
      }
      Err(e) => {
        tracing::warn!(url = %self.url, error = %e, "geolocation lookup failed");
        None
      }
    }
  }

  async fn fetch(&self) -> Result<Option<Coordinates>, reqwest::Error> {
    let location: IpLocation = self
      .client
      .get(&self.url)
      .header("User-Agent", format!("veriface/{}", env!("CARGO_PKG_VERSION")))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    let coordinates = Coordinates { lat: location.latitude, lng: location.longitude };
    Ok((!coordinates.is_empty()).then_some(coordinates))
  }
}

/// Explicit coordinates win field by field over a looked-up location.
pub fn overlay(explicit: Coordinates, located: Option<Coordinates>) -> Option<Coordinates> {
  let located = located.unwrap_or_default();
  let merged = Coordinates {
    lat: explicit.lat.or(located.lat),
    lng: explicit.lng.or(located.lng),
  };
  (!merged.is_empty()).then_some(merged)
}
