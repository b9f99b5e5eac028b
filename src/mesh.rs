//! Planar triangulation of the augmented landmark set.
//!
//! The mesh is recomputed per sample: corner points and landmark pixel
//! positions differ per image even though the point order is consistent.
//! Triangulation is incremental Bowyer-Watson seeded with a rectangle
//! enclosing the image frame and every site; triangles touching the seed
//! rectangle or leaving the image interior are dropped on extraction.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Shape};

/// Three vertices, rounded to integer pixel coordinates, all strictly inside
/// the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Point; 3],
}

impl Triangle {
    pub fn new(a: Point, b: Point, c: Point) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    pub fn signed_area(&self) -> f32 {
        let [a, b, c] = self.vertices;
        0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    /// Whether `p` lies inside the triangle, edges included.
    pub fn contains(&self, p: Point) -> bool {
        let [a, b, c] = self.vertices;
        let d1 = edge_sign(p, a, b);
        let d2 = edge_sign(p, b, c);
        let d3 = edge_sign(p, c, a);

        let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_neg && has_pos)
    }

    /// Integer bounding box (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let xs = self.vertices.map(|v| v.x);
        let ys = self.vertices.map(|v| v.y);
        (
            xs.iter().fold(f32::MAX, |a, &b| a.min(b)).floor() as i32,
            ys.iter().fold(f32::MAX, |a, &b| a.min(b)).floor() as i32,
            xs.iter().fold(f32::MIN, |a, &b| a.max(b)).ceil() as i32,
            ys.iter().fold(f32::MIN, |a, &b| a.max(b)).ceil() as i32,
        )
    }
}

fn edge_sign(p: Point, a: Point, b: Point) -> f32 {
    (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y)
}

/// Build the Delaunay triangulation of the augmented landmark set over an
/// image of the given pixel dimensions.
///
/// Vertex coordinates are rounded to the nearest pixel and any triangle with
/// a vertex on or outside the image boundary is discarded. Fewer than three
/// usable sites produce an empty list, never an error. Output order follows
/// the triangulation and is not part of the contract.
pub fn triangulate(points: &Shape, width: u32, height: u32) -> Vec<Triangle> {
    // Duplicate sites are inserted once; a landmark coinciding with a box
    // corner is a single vertex of the mesh.
    let mut sites: Vec<(f64, f64)> = Vec::new();
    for p in &points.points {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        let q = (p.x as f64, p.y as f64);
        if sites
            .iter()
            .any(|s| (s.0 - q.0).abs() < 1e-9 && (s.1 - q.1).abs() < 1e-9)
        {
            continue;
        }
        sites.push(q);
    }

    if sites.len() < 3 {
        return Vec::new();
    }

    // Seed rectangle enclosing the image frame and every site.
    let mut min_x = 0.0f64;
    let mut min_y = 0.0f64;
    let mut max_x = width as f64;
    let mut max_y = height as f64;
    for &(x, y) in &sites {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let margin = ((max_x - min_x) + (max_y - min_y)).max(1.0);
    let x0 = min_x - margin;
    let y0 = min_y - margin;
    let x1 = max_x + margin;
    let y1 = max_y + margin;

    let mut vertices: Vec<(f64, f64)> = vec![(x0, y0), (x1, y0), (x0, y1), (x1, y1)];
    let mut triangles: Vec<[usize; 3]> = vec![[0, 1, 2], [1, 3, 2]];
    vertices.extend_from_slice(&sites);

    for site in 4..vertices.len() {
        insert_site(&mut triangles, &vertices, site);
    }

    let w = width as f32;
    let h = height as f32;
    let mut valid = Vec::new();
    for tri in &triangles {
        // Seed-rectangle vertices lie outside the frame by construction.
        if tri.iter().any(|&v| v < 4) {
            continue;
        }
        let rounded = tri.map(|v| {
            Point::new(
                (vertices[v].0 as f32).round(),
                (vertices[v].1 as f32).round(),
            )
        });
        let inside = rounded
            .iter()
            .all(|p| p.x > 0.0 && p.x < w && p.y > 0.0 && p.y < h);
        if inside {
            valid.push(Triangle {
                vertices: rounded,
            });
        }
    }
    valid
}

/// One Bowyer-Watson insertion: remove every triangle whose circumcircle
/// contains the site, then fan the site against the cavity boundary.
fn insert_site(triangles: &mut Vec<[usize; 3]>, vertices: &[(f64, f64)], site: usize) {
    let p = vertices[site];

    let mut bad = Vec::new();
    for (i, tri) in triangles.iter().enumerate() {
        if in_circumcircle(
            vertices[tri[0]],
            vertices[tri[1]],
            vertices[tri[2]],
            p,
        ) {
            bad.push(i);
        }
    }

    // Cavity boundary: edges of removed triangles that appear exactly once.
    let mut edges: Vec<((usize, usize), u32)> = Vec::new();
    for &i in &bad {
        let tri = triangles[i];
        for &(a, b) in &[(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let key = (a.min(b), a.max(b));
            match edges.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) => *count += 1,
                None => edges.push((key, 1)),
            }
        }
    }

    for &i in bad.iter().rev() {
        triangles.swap_remove(i);
    }

    for ((a, b), count) in edges {
        if count == 1 {
            triangles.push([a, b, site]);
        }
    }
}

/// Strict circumcircle containment; points on the circle (cocircular sites)
/// are treated as outside so the existing triangle is kept.
fn in_circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        return false;
    }

    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;

    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;

    let r2 = (a.0 - ux) * (a.0 - ux) + (a.1 - uy) * (a.1 - uy);
    let d2 = (p.0 - ux) * (p.0 - ux) + (p.1 - uy) * (p.1 - uy);

    d2 < r2 * (1.0 - 1e-9)
}
