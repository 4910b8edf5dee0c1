use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Forward/inverse geographic projection contract.
///
/// Inversion is used for reporting only: projected coordinates feed the
/// bin edges, never the inverse. Implementations must satisfy
/// `invert(forward(lon, lat)) ~= (lon, lat)`.
pub trait Projection {
    /// Identifier recorded in the manifest (e.g. "epsg:3857").
    fn name(&self) -> &str;

    /// (lon, lat) in degrees to projected (x, y).
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Projected (x, y) back to (lon, lat) in degrees.
    fn invert(&self, x: f64, y: f64) -> (f64, f64);
}

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Spherical Web Mercator (EPSG:3857).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn name(&self) -> &str {
        "epsg:3857"
    }

    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = EARTH_RADIUS_M * lon.to_radians();
        let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS_M).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
        (lon, lat)
    }
}

/// Look up a projection by identifier.
pub fn lookup(name: &str) -> Option<Box<dyn Projection>> {
    match name.to_ascii_lowercase().as_str() {
        "epsg:3857" | "web-mercator" | "webmercator" => Some(Box::new(WebMercator)),
        _ => None,
    }
}
