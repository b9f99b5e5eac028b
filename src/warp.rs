//! Piecewise-affine warp into the canonical frame.
//!
//! Each valid triangle of the per-sample mesh is mapped independently: its
//! vertices are rescaled into the canonical frame, rotated by the sample's
//! Procrustes rotation to obtain the target triangle, and the unique affine
//! transform between the two is inverse-mapped over the filled target region.
//! Delaunay triangles are interior-disjoint, so compositing the patches into
//! one zeroed buffer paints no pixel from two triangles' interiors.

use nalgebra::{Matrix3, Vector3};

use crate::align::AlignmentParams;
use crate::config::FrameConfig;
use crate::error::Result;
use crate::features::{draw_line, sample_bilinear, GrayImage, ImageAccess};
use crate::mesh::Triangle;
use crate::types::Point;

/// Resamples source images into the canonical frame, one triangle at a time.
#[derive(Debug, Clone)]
pub struct Warper {
    config: FrameConfig,
}

impl Warper {
    pub fn new(config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Warp `image` into the canonical frame.
    ///
    /// The output buffer matches the source dimensions, starts black, and
    /// accumulates one patch per triangle. Pixels covered by no triangle stay
    /// black. Degenerate triangles (no unique affine map) are skipped.
    pub fn warp<I: ImageAccess>(
        &self,
        image: &I,
        params: &AlignmentParams,
        triangles: &[Triangle],
    ) -> GrayImage {
        let width = image.width();
        let height = image.height();
        let mut output = GrayImage::zeros(width, height);

        for triangle in triangles {
            let source = triangle.vertices;

            // Vertices in the canonical frame, rotated onto the mean shape.
            // The rotation is rigid-body: it applies uniformly to every point
            // of the shape, not only to labeled landmarks.
            let target = source.map(|v| {
                params.rotate(self.config.to_canonical(v - params.translation, params.norm))
            });

            let Some(affine) = AffineMap::between(&source, &target) else {
                continue;
            };
            let Some(inverse) = affine.inverse() else {
                continue;
            };

            let target_triangle = Triangle::new(target[0], target[1], target[2]);
            let (min_x, min_y, max_x, max_y) = target_triangle.bounds();
            let min_x = min_x.max(0);
            let min_y = min_y.max(0);
            let max_x = max_x.min(width as i32 - 1);
            let max_y = max_y.min(height as i32 - 1);

            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let p = Point::new(x as f32, y as f32);
                    if !target_triangle.contains(p) {
                        continue;
                    }
                    let src = inverse.apply(p);
                    let value = sample_bilinear(image, src.x, src.y);
                    output.add_pixel(x, y, value.round().clamp(0.0, 255.0) as u8);
                }
            }
        }

        output
    }

    /// Companion inspection mode: overlay triangle edges on a copy of the
    /// unmodified source image. No effect on downstream data.
    pub fn draw_edges(&self, image: &GrayImage, triangles: &[Triangle]) -> GrayImage {
        let mut output = image.clone();
        for triangle in triangles {
            let [a, b, c] = triangle.vertices;
            draw_line(&mut output, a, b, 0);
            draw_line(&mut output, b, c, 0);
            draw_line(&mut output, c, a, 0);
        }
        output
    }
}

/// A forward affine map `p -> (a*x + b*y + c, d*x + e*y + f)`.
struct AffineMap {
    coeffs: [f64; 6],
}

impl AffineMap {
    /// The unique affine transform sending three source points to three
    /// target points. Three correspondences determine it exactly; collinear
    /// source points have no unique solution and yield `None`.
    fn between(source: &[Point; 3], target: &[Point; 3]) -> Option<Self> {
        let x = Matrix3::new(
            source[0].x as f64,
            source[0].y as f64,
            1.0,
            source[1].x as f64,
            source[1].y as f64,
            1.0,
            source[2].x as f64,
            source[2].y as f64,
            1.0,
        );
        let x_inv = x.try_inverse()?;

        let cx = x_inv
            * Vector3::new(target[0].x as f64, target[1].x as f64, target[2].x as f64);
        let cy = x_inv
            * Vector3::new(target[0].y as f64, target[1].y as f64, target[2].y as f64);

        Some(Self {
            coeffs: [cx[0], cx[1], cx[2], cy[0], cy[1], cy[2]],
        })
    }

    fn apply(&self, p: Point) -> Point {
        let [a, b, c, d, e, f] = self.coeffs;
        let x = p.x as f64;
        let y = p.y as f64;
        Point::new((a * x + b * y + c) as f32, (d * x + e * y + f) as f32)
    }

    fn inverse(&self) -> Option<Self> {
        let [a, b, c, d, e, f] = self.coeffs;
        let det = a * e - b * d;
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(Self {
            coeffs: [ia, ib, -(ia * c + ib * f), id, ie, -(id * c + ie * f)],
        })
    }
}
