//! Robust spherical center — the geometric median on the unit sphere.
//!
//! The median minimizes the sum of great-circle distances to all inputs,
//! so a single far-away place cannot drag the meeting point the way it
//! drags the vector-mean midpoint.

use midway_common::Coordinate;

/// Iteration cap for the Weiszfeld loop.
const MAX_ITER: usize = 500;
/// Convergence tolerance: angular movement between iterates, radians.
const TOL: f64 = 1e-10;
/// Guard for the coincident-point singularity in the 1/θ weight.
const MIN_ANGLE: f64 = 1e-15;
/// Below this norm a vector sum is treated as degenerate (antipodal
/// inputs cancelling out).
const DEGENERATE_NORM: f64 = 1e-12;

/// A solver producing a single representative coordinate for a point
/// set. A seam so tests can substitute a trivial implementation.
pub trait CenterSolver: Send + Sync {
    fn center(&self, points: &[Coordinate]) -> Coordinate;
}

/// Weiszfeld iteration on the unit sphere.
///
/// Seeds with the normalized vector sum (the geographic midpoint), then
/// iteratively reweights by inverse angular distance. Non-convergence
/// after [`MAX_ITER`] returns the last iterate — not an error.
#[derive(Debug, Default)]
pub struct SphericalMedian;

impl CenterSolver for SphericalMedian {
    fn center(&self, points: &[Coordinate]) -> Coordinate {
        let Some(first) = points.first() else {
            // Sentinel for empty input; callers are expected to guard.
            return Coordinate::new(0.0, 0.0);
        };
        if points.len() == 1 {
            return *first;
        }

        let units: Vec<[f64; 3]> = points.iter().map(to_unit).collect();

        // Antipodal inputs can cancel the seed sum to near zero; fall
        // back to the first input point so seeding stays deterministic.
        let sum = units.iter().fold([0.0; 3], |acc, v| add(acc, *v));
        let mut estimate = normalize(sum).unwrap_or(units[0]);

        for _ in 0..MAX_ITER {
            let mut weighted = [0.0f64; 3];
            let mut total_weight = 0.0f64;
            for q in &units {
                let theta = angular_distance(&estimate, q);
                let w = 1.0 / theta.max(MIN_ANGLE);
                weighted = add(weighted, scale(*q, w));
                total_weight += w;
            }

            let Some(next) = normalize(scale(weighted, 1.0 / total_weight)) else {
                break; // weighted sum degenerated, keep current estimate
            };

            let moved = angular_distance(&estimate, &next);
            estimate = next;
            if moved < TOL {
                break;
            }
        }

        to_coordinate(estimate)
    }
}

/// Total great-circle distance (radians) from `point` to every input.
pub fn total_angular_distance(point: &Coordinate, points: &[Coordinate]) -> f64 {
    let p = to_unit(point);
    points
        .iter()
        .map(|q| angular_distance(&p, &to_unit(q)))
        .sum()
}

fn to_unit(c: &Coordinate) -> [f64; 3] {
    let phi = c.lat.to_radians();
    let lambda = c.lng.to_radians();
    [
        phi.cos() * lambda.cos(),
        phi.cos() * lambda.sin(),
        phi.sin(),
    ]
}

fn to_coordinate(v: [f64; 3]) -> Coordinate {
    Coordinate::new(
        v[2].atan2(v[0].hypot(v[1])).to_degrees(),
        v[1].atan2(v[0]).to_degrees(),
    )
}

fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = dot(&v, &v).sqrt();
    if norm < DEGENERATE_NORM {
        return None;
    }
    Some(scale(v, 1.0 / norm))
}

/// Angle between two unit vectors, with the dot product clamped so
/// floating-point overshoot never feeds NaN into `acos`.
fn angular_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    dot(a, b).clamp(-1.0, 1.0).acos()
}
