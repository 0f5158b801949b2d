//! Geocoding collaborator
//!
//! The host resolves free-text addresses to coordinates; the core only
//! stores what comes back. A failed or empty lookup leaves the property
//! un-geocoded, which disables GPS verification for its photos but nothing
//! else.

use crate::store::PropertyDetails;
use crate::CoreResult;
use async_trait::async_trait;
use tracing::warn;

/// A geocoded point in WGS-84.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodedPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Host-supplied address resolver.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the address cannot be resolved; the property is
    /// stored un-geocoded.
    async fn geocode(&self, address: &str) -> CoreResult<Option<GeocodedPoint>>;
}

impl PropertyDetails {
    /// Fill in missing coordinates from the host's geocoder.
    ///
    /// Coordinates already present are kept; a lookup failure is logged and
    /// leaves the property un-geocoded.
    pub async fn geocoded(mut self, geocoder: &dyn Geocoder) -> Self {
        if self.latitude.is_some() || self.longitude.is_some() {
            return self;
        }

        match geocoder.geocode(&self.address).await {
            Ok(Some(point)) => {
                self.latitude = Some(point.latitude);
                self.longitude = Some(point.longitude);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(%error, address = %self.address, "geocoding failed; property stored un-geocoded");
            }
        }
        self
    }
}
