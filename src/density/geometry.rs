//! Geometric density estimates
//!
//! These estimators only look at the sample positions, no transform is run.
//! - `cell_count`: histogram of samples on a Cartesian grid
//! - `voronoi`: area of each sample's Voronoi cell (2D)

use std::f64::consts::PI;

use delaunator::{triangulate, Point, EMPTY};

use super::utils::normalize_weights;
use crate::error::{NufftError, Result};
use crate::samples::Samples;
use crate::shape::{idx3d, ImageShape};

/// Cell-count density compensation
///
/// Bins the samples on a grid of `osf * shape` cells spanning [-π, π) and
/// weights each sample by the inverse population of its cell.
///
/// # Arguments
/// * `samples` - Sample locations in [-π, π]
/// * `shape` - Image shape defining the grid
/// * `osf` - Oversampling factor of the counting grid
///
/// # Returns
/// Weights summing to one
pub fn cell_count(samples: &Samples, shape: &ImageShape, osf: f64) -> Result<Vec<f64>> {
    if !(osf > 0.0) {
        return Err(NufftError::Configuration(format!("osf must be positive, got {}", osf)));
    }
    if samples.ndim() != shape.ndim() {
        return Err(NufftError::Configuration(format!(
            "samples are {}D but the image shape {} is {}D",
            samples.ndim(),
            shape,
            shape.ndim()
        )));
    }

    let mut bins = [1usize; 3];
    for (d, &n) in shape.dims().iter().enumerate() {
        bins[d] = ((osf * n as f64).floor() as usize).max(1);
    }

    let cell_of = |j: usize| -> usize {
        let p = samples.point(j);
        let mut idx = [0usize; 3];
        for d in 0..samples.ndim() {
            let pos = ((p[d] + PI) / (2.0 * PI) * bins[d] as f64).floor();
            idx[d] = (pos.max(0.0) as usize).min(bins[d] - 1);
        }
        idx3d(idx[0], idx[1], idx[2], bins[0], bins[1])
    };

    let mut counts = vec![0usize; bins.iter().product()];
    for j in 0..samples.len() {
        counts[cell_of(j)] += 1;
    }

    let populations: Vec<f64> = (0..samples.len()).map(|j| counts[cell_of(j)] as f64).collect();
    Ok(normalize_weights(&populations))
}

/// Voronoi density compensation (2D)
///
/// Each sample is weighted by the area of its Voronoi cell, computed from a
/// Delaunay triangulation. Unbounded cells (convex hull samples) and samples
/// dropped by the triangulation (duplicates) get the largest finite area.
///
/// # Returns
/// Weights summing to one
pub fn voronoi(samples: &Samples) -> Result<Vec<f64>> {
    if samples.ndim() != 2 {
        return Err(NufftError::Configuration(format!(
            "voronoi density is only available in 2D, got {}D samples",
            samples.ndim()
        )));
    }
    let n = samples.len();
    let coords: Vec<Point> = (0..n)
        .map(|j| {
            let p = samples.point(j);
            Point { x: p[0], y: p[1] }
        })
        .collect();

    let result = triangulate(&coords);
    if result.triangles.is_empty() {
        return Err(NufftError::Configuration(
            "voronoi density needs at least 3 non-collinear samples".into(),
        ));
    }

    // Circumcenter of every triangle, and the triangles around each sample
    let n_tri = result.triangles.len() / 3;
    let mut centers = Vec::with_capacity(n_tri);
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); n];
    for t in 0..n_tri {
        let v = &result.triangles[3 * t..3 * t + 3];
        centers.push(circumcenter(&coords[v[0]], &coords[v[1]], &coords[v[2]]));
        for &vi in v {
            incident[vi].push(t);
        }
    }

    // Endpoints of edges without a neighbouring triangle have unbounded cells
    let mut bounded = vec![true; n];
    for &h in &result.hull {
        bounded[h] = false;
    }
    for (e, &opposite) in result.halfedges.iter().enumerate() {
        if opposite == EMPTY {
            let next = if e % 3 == 2 { e - 2 } else { e + 1 };
            bounded[result.triangles[e]] = false;
            bounded[result.triangles[next]] = false;
        }
    }

    let mut areas = vec![f64::NAN; n];
    let mut max_area = 0.0f64;
    for j in 0..n {
        if !bounded[j] || incident[j].is_empty() {
            continue;
        }
        let area = cell_area(&coords[j], incident[j].iter().map(|&t| centers[t]));
        if !area.is_finite() {
            continue;
        }
        areas[j] = area;
        max_area = max_area.max(area);
    }
    if max_area == 0.0 {
        // Every cell is unbounded: fall back to uniform weights
        max_area = 1.0;
    }
    for a in areas.iter_mut() {
        if a.is_nan() {
            *a = max_area;
        }
    }

    let total: f64 = areas.iter().sum();
    Ok(areas.iter().map(|&a| a / total).collect())
}

fn circumcenter(a: &Point, b: &Point, c: &Point) -> (f64, f64) {
    let (bx, by) = (b.x - a.x, b.y - a.y);
    let (cx, cy) = (c.x - a.x, c.y - a.y);
    let d = 2.0 * (bx * cy - by * cx);
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    (a.x + (cy * b2 - by * c2) / d, a.y + (bx * c2 - cx * b2) / d)
}

/// Area of the convex polygon formed by `vertices` around `site`
fn cell_area(site: &Point, vertices: impl Iterator<Item = (f64, f64)>) -> f64 {
    let mut poly: Vec<(f64, f64)> = vertices.collect();
    poly.sort_by(|p, q| {
        let ap = (p.1 - site.y).atan2(p.0 - site.x);
        let aq = (q.1 - site.y).atan2(q.0 - site.x);
        ap.total_cmp(&aq)
    });
    // Shoelace formula
    let mut twice_area = 0.0;
    for i in 0..poly.len() {
        let (x0, y0) = poly[i];
        let (x1, y1) = poly[(i + 1) % poly.len()];
        twice_area += x0 * y1 - x1 * y0;
    }
    0.5 * twice_area.abs()
}
