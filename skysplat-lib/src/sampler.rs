use crate::common::golden_angle;
use crate::config::MAX_SAMPLES;
use crate::error::SkysplatError;
use std::f64::consts::{PI, TAU};

// `ratio` and `theta` are reused by the plane projector to pick the pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskSample {
    pub position: [f64; 3],
    pub ratio: f64,
    pub theta: f64,
}

fn check_sample_count(samples: usize) -> Result<(), SkysplatError> {
    if samples > MAX_SAMPLES {
        return Err(SkysplatError::InvalidParameter(format!(
            "{} samples requested, at most {} are supported",
            samples, MAX_SAMPLES
        )));
    }
    Ok(())
}

fn reserve<T>(capacity: usize) -> Result<Vec<T>, SkysplatError> {
    let mut points = Vec::new();
    points.try_reserve_exact(capacity).map_err(|e| {
        SkysplatError::InvalidParameter(format!("cannot allocate {} points: {}", capacity, e))
    })?;
    Ok(points)
}

pub fn fibonacci_sphere(samples: usize, radius: f64) -> Result<Vec<[f64; 3]>, SkysplatError> {
    if samples == 1 {
        return Err(SkysplatError::InvalidParameter(
            "sphere sampling needs at least 2 points".to_string(),
        ));
    }

    check_sample_count(samples)?;
    let mut points = reserve(samples)?;
    let golden = golden_angle();
    let last = (samples.max(2) - 1) as f64;
    points.extend((0..samples).map(|i| {
        let y = 1.0 - (i as f64 / last) * 2.0;
        let radius_at_y = (1.0 - y * y).max(0.0).sqrt();
        let theta = golden * i as f64;
        let x = theta.cos() * radius_at_y;
        let z = theta.sin() * radius_at_y;
        [x * radius, y * radius, z * radius]
    }));
    Ok(points)
}

#[inline]
pub fn points_in_ring(ratio: f64, rings: usize) -> usize {
    ((ratio * rings as f64 * PI) as usize).max(1)
}

fn ring_ratios(samples: usize) -> impl Iterator<Item = f64> {
    let rings = (samples as f64).sqrt() as usize;
    (0..rings).map(move |r| {
        if rings > 1 {
            r as f64 / (rings - 1) as f64
        } else {
            0.0
        }
    })
}

pub fn disk_point_count(samples: usize) -> usize {
    let rings = (samples as f64).sqrt() as usize;
    ring_ratios(samples)
        .map(|ratio| points_in_ring(ratio, rings))
        .sum()
}

// The emitted count generally differs from `samples`.
pub fn concentric_disk(samples: usize, diameter: f64) -> Result<Vec<DiskSample>, SkysplatError> {
    check_sample_count(samples)?;
    let rings = (samples as f64).sqrt() as usize;
    let mut points = reserve(disk_point_count(samples))?;

    for ratio in ring_ratios(samples) {
        let count = points_in_ring(ratio, rings);
        let radius = ratio * diameter / 2.0;
        for t in 0..count {
            let theta = TAU * t as f64 / count as f64;
            points.push(DiskSample {
                position: [radius * theta.cos(), 0.0, radius * theta.sin()],
                ratio,
                theta,
            });
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_rejects_single_point() {
        assert!(matches!(
            fibonacci_sphere(1, 10.0),
            Err(SkysplatError::InvalidParameter(_))
        ));
        assert!(fibonacci_sphere(0, 10.0).unwrap().is_empty());
    }

    #[test]
    fn sphere_y_is_monotonic_and_spans_radius() {
        for &n in &[2usize, 3, 17, 1000] {
            let radius = 42.0;
            let pts = fibonacci_sphere(n, radius).unwrap();
            assert_eq!(pts.len(), n);
            assert!((pts[0][1] - radius).abs() < 1e-9);
            assert!((pts[n - 1][1] + radius).abs() < 1e-9);
            for w in pts.windows(2) {
                assert!(w[1][1] <= w[0][1] + 1e-9);
            }
            for p in &pts {
                let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
                assert!((len - radius).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn disk_points_stay_inside_diameter() {
        let diameter = 200.0;
        let pts = concentric_disk(40_000, diameter).unwrap();
        assert!(pts.len() <= disk_point_count(40_000));
        for p in &pts {
            let r = (p.position[0].powi(2) + p.position[2].powi(2)).sqrt();
            assert!(r <= diameter / 2.0 + 1e-9);
            assert_eq!(p.position[1], 0.0);
        }
    }

    #[test]
    fn disk_count_differs_from_request() {
        // 3 rings: ratios 0, 0.5, 1 -> 1 + 4 + 9 points.
        let pts = concentric_disk(9, 2.0).unwrap();
        assert_eq!(pts.len(), 14);
        assert_eq!(disk_point_count(9), 14);
        assert_eq!(pts[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn disk_single_ring_is_the_centre() {
        let pts = concentric_disk(3, 10.0).unwrap();
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0].ratio, 0.0);
        assert!(concentric_disk(0, 10.0).unwrap().is_empty());
    }

    #[test]
    fn huge_counts_are_rejected_without_allocating() {
        let huge = 1usize << 62;
        assert!(matches!(
            fibonacci_sphere(huge, 1.0),
            Err(SkysplatError::InvalidParameter(_))
        ));
        assert!(matches!(
            concentric_disk(huge, 1.0),
            Err(SkysplatError::InvalidParameter(_))
        ));
        assert!(matches!(
            fibonacci_sphere(MAX_SAMPLES + 1, 1.0),
            Err(SkysplatError::InvalidParameter(_))
        ));
    }
}
