use crate::foundation::core::{BoundingBox, Envelope, LatLon, Radius};
use crate::foundation::error::{RadarError, RadarResult};

/// WGS-84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Bearings used to derive the bounds, in degrees clockwise from north.
pub const CARDINAL_BEARINGS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Produces the destination points a bounding box is built from.
pub trait BoundsCalculator {
    /// Destination points at [`CARDINAL_BEARINGS`] from `center` at `radius`.
    fn cardinal_points(&self, center: LatLon, radius: Radius) -> RadarResult<[LatLon; 4]>;
}

/// Ellipsoidal implementation of [`BoundsCalculator`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GeodesicBounds;

impl BoundsCalculator for GeodesicBounds {
    fn cardinal_points(&self, center: LatLon, radius: Radius) -> RadarResult<[LatLon; 4]> {
        let meters = radius.meters();
        Ok([
            destination(center, meters, CARDINAL_BEARINGS[0])?,
            destination(center, meters, CARDINAL_BEARINGS[1])?,
            destination(center, meters, CARDINAL_BEARINGS[2])?,
            destination(center, meters, CARDINAL_BEARINGS[3])?,
        ])
    }
}

/// Envelope of the four cardinal points: min/max per axis.
///
/// At high latitude the box is not the projection of a circle; only the four points bound it.
pub fn bounds_from_points(points: &[LatLon; 4]) -> RadarResult<(BoundingBox, Envelope)> {
    let bbox = BoundingBox::enclosing(points)?;
    Ok((bbox, Envelope::from_bbox(&bbox)))
}

/// Direct geodesic problem on WGS-84 (Vincenty).
///
/// Returns the point reached from `start` after `distance_m` meters along the initial
/// `bearing_deg`. Longitude is normalized to `[-180, 180)`.
pub fn destination(start: LatLon, distance_m: f64, bearing_deg: f64) -> RadarResult<LatLon> {
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(RadarError::validation(format!(
            "geodesic distance must be finite and >= 0, got {distance_m}"
        )));
    }
    if start.lat.abs() >= 90.0 {
        return Err(RadarError::validation("geodesic start point is a pole"));
    }

    let a = WGS84_A;
    let f = WGS84_F;
    let b = (1.0 - f) * a;

    let phi1 = start.lat.to_radians();
    let alpha1 = bearing_deg.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - f) * phi1.tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let sigma0 = distance_m / (b * big_a);
    let mut sigma = sigma0;
    let mut cos_2sigma_m;
    let mut iterations = 0;
    loop {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        let (sin_sigma, cos_sigma) = sigma.sin_cos();
        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        let next = sigma0 + delta_sigma;
        let done = (next - sigma).abs() < CONVERGENCE;
        sigma = next;
        iterations += 1;
        if done {
            break;
        }
        if iterations >= MAX_ITERATIONS {
            return Err(RadarError::upstream(
                "geodesic destination failed to converge",
            ));
        }
    }

    let (sin_sigma, cos_sigma) = sigma.sin_cos();
    let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let phi2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + x * x).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    let lon2 = (start.lon + l.to_degrees() + 180.0).rem_euclid(360.0) - 180.0;
    LatLon::new(phi2.to_degrees(), lon2)
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/geodesy.rs"]
mod tests;
