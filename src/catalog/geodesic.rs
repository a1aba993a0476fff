//! Ellipsoidal distances on the WGS-84 ellipsoid.

use crate::types::location::LatLon;
use haversine::{distance, Location as HaversineLocation, Units};
use std::f64::consts::PI;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-12;

/// Vincenty's inverse formula. `None` when the iteration does not converge,
/// which only happens for nearly antipodal points.
pub fn vincenty_km(a: LatLon, b: LatLon) -> Option<f64> {
    let u1 = ((1.0 - WGS84_F) * a.0.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.0.to_radians().tan()).atan();
    let l = (b.1 - a.1).to_radians();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha.powi(2);
        // Equatorial lines have cos²α = 0.
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if lambda.abs() > PI {
            return None;
        }
        if (lambda - previous).abs() < TOLERANCE {
            let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            let meters = WGS84_B * big_a * (sigma - delta_sigma);
            return Some(meters / 1000.0);
        }
    }
    None
}

/// Distance in kilometres between two coordinates.
///
/// Falls back to the haversine great-circle distance when Vincenty does not
/// converge. Returns `None` if either coordinate is unusable.
pub fn geodesic_km(a: LatLon, b: LatLon) -> Option<f64> {
    if !a.is_valid() || !b.is_valid() {
        return None;
    }
    vincenty_km(a, b).or_else(|| {
        Some(distance(
            HaversineLocation {
                latitude: a.0,
                longitude: a.1,
            },
            HaversineLocation {
                latitude: b.0,
                longitude: b.1,
            },
            Units::Kilometers,
        ))
    })
}
