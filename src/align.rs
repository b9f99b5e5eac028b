//! Procrustes shape alignment.
//!
//! Training averages translation- and scale-normalized landmark shapes into a
//! canonical mean shape. Projection computes, per sample, the translation,
//! scale and optimal rotation mapping that sample onto the mean. The rotation
//! comes from the orthogonal Procrustes problem: with P the sample's points in
//! the canonical frame and M the mean shape, the SVD of `P' * M = U * S * V'`
//! gives `R = U * V'`. R is orthogonal but may be a reflection; no determinant
//! correction is applied.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::config::FrameConfig;
use crate::error::{Error, Result};
use crate::types::{select_box, BoundingBox, Point, Shape};

/// Landmark annotations for one sample: the ordered points plus the bounding
/// boxes that came with them. Pixel data is not needed for alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub landmarks: Shape,
    pub boxes: Vec<BoundingBox>,
}

impl Annotation {
    pub fn new(landmarks: Shape, boxes: Vec<BoundingBox>) -> Self {
        Self { landmarks, boxes }
    }

    /// The augmented landmark set: landmarks plus the four corners of the
    /// first bounding box, in the fixed order used everywhere.
    pub fn augmented(&self) -> Result<Shape> {
        let bbox = select_box(&self.boxes)?;
        Ok(self.landmarks.augmented(bbox))
    }
}

/// The canonical mean landmark configuration learned from a training corpus.
///
/// Each contributing shape is centered and scaled to unit norm before
/// averaging, so the mean is itself centered at the origin. This is the only
/// artifact that survives a save/reload cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanShape {
    points: Vec<Point>,
}

impl MeanShape {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Load a mean shape from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mean: Self = bincode::deserialize(&bytes)?;
        Ok(mean)
    }

    /// Save the mean shape to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

/// Per-sample alignment metadata produced by [`ShapeAligner::project`].
///
/// Attaches to a sample without touching its image or raw landmark
/// coordinates; the warper consumes it later, possibly in a separate process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// Row-major 2x2 rotation matrix from the Procrustes solve.
    pub rotation: [[f32; 2]; 2],
    /// The sample's pre-normalization centroid.
    pub translation: Point,
    /// The sample's pre-normalization aggregate L2 norm.
    pub norm: f32,
}

impl AlignmentParams {
    /// Apply the rotation to a point, using the row-vector convention
    /// `target = p * R` of the projection step.
    pub fn rotate(&self, p: Point) -> Point {
        Point::new(
            p.x * self.rotation[0][0] + p.y * self.rotation[1][0],
            p.x * self.rotation[0][1] + p.y * self.rotation[1][1],
        )
    }
}

/// Learns a canonical mean shape and computes per-sample alignments onto it.
#[derive(Debug, Clone)]
pub struct ShapeAligner {
    config: FrameConfig,
}

impl ShapeAligner {
    pub fn new(config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Learn the mean shape from a training corpus.
    ///
    /// Samples with an empty landmark set are skipped. Every remaining sample
    /// must carry a bounding box and the same landmark cardinality as the
    /// first; a mismatch aborts training with nothing published.
    pub fn train(&self, annotations: &[Annotation]) -> Result<MeanShape> {
        let mut sum: Vec<Point> = Vec::new();
        let mut count = 0usize;

        for (index, annotation) in annotations.iter().enumerate() {
            if annotation.landmarks.is_empty() {
                log::debug!("training sample {index} has no landmarks, skipping");
                continue;
            }

            let augmented = annotation
                .augmented()
                .map_err(|e| e.in_stage(&index.to_string(), "align-train"))?;

            if sum.is_empty() {
                sum = vec![Point::zero(); augmented.len()];
            } else if augmented.len() != sum.len() {
                return Err(Error::CorrespondenceMismatch {
                    expected: sum.len(),
                    found: augmented.len(),
                }
                .in_stage(&index.to_string(), "align-train"));
            }

            let centroid = augmented.centroid();
            let centered: Vec<Point> =
                augmented.points.iter().map(|&p| p - centroid).collect();
            let norm = Shape::new(centered.clone()).norm();

            for (acc, p) in sum.iter_mut().zip(&centered) {
                *acc += *p / norm;
            }
            count += 1;
        }

        if count == 0 {
            return Err(Error::EmptyTrainingSet);
        }

        let points = sum
            .into_iter()
            .map(|p| p * (1.0 / count as f32))
            .collect();
        Ok(MeanShape { points })
    }

    /// Compute the alignment of one sample onto the mean shape.
    ///
    /// Deterministic and stateless: the sample's augmented landmark set is
    /// built exactly as in training, rescaled into the canonical frame, and
    /// fitted to the mean with an orthogonal Procrustes solve.
    pub fn project(
        &self,
        annotation: &Annotation,
        mean: &MeanShape,
    ) -> Result<AlignmentParams> {
        let augmented = annotation.augmented()?;

        if augmented.len() != mean.len() {
            return Err(Error::CorrespondenceMismatch {
                expected: mean.len(),
                found: augmented.len(),
            });
        }

        let translation = augmented.centroid();
        let centered: Vec<Point> = augmented
            .points
            .iter()
            .map(|&p| p - translation)
            .collect();
        let norm = Shape::new(centered.clone()).norm();

        // Cross-covariance C = P' * M between the canonical-frame points and
        // the mean shape, accumulated row by row.
        let mut c = Matrix2::<f32>::zeros();
        for (&p, &m) in centered.iter().zip(mean.points.iter()) {
            let canonical = self.config.to_canonical(p, norm);
            c[(0, 0)] += canonical.x * m.x;
            c[(0, 1)] += canonical.x * m.y;
            c[(1, 0)] += canonical.y * m.x;
            c[(1, 1)] += canonical.y * m.y;
        }

        let r = procrustes_rotation(c);

        Ok(AlignmentParams {
            rotation: [[r[(0, 0)], r[(0, 1)]], [r[(1, 0)], r[(1, 1)]]],
            translation,
            norm,
        })
    }
}

/// `R = U * V'` from the SVD of the cross-covariance matrix.
fn procrustes_rotation(c: Matrix2<f32>) -> Matrix2<f32> {
    let svd = c.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => u * v_t,
        // both factors were requested, so this arm is never taken
        _ => Matrix2::identity(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_annotation() -> Annotation {
        Annotation::new(
            Shape::new(vec![
                Point::new(10.0, 10.0),
                Point::new(20.0, 10.0),
                Point::new(10.0, 20.0),
            ]),
            vec![BoundingBox::new(0.0, 0.0, 30.0, 30.0)],
        )
    }

    fn aligner() -> ShapeAligner {
        ShapeAligner::new(FrameConfig::default()).unwrap()
    }

    #[test]
    fn mean_shape_is_centered_unit_norm() {
        let corpus = vec![
            triangle_annotation(),
            triangle_annotation(),
            triangle_annotation(),
        ];

        let mean = aligner().train(&corpus).unwrap();

        // 3 landmarks + 4 box corners
        assert_eq!(mean.len(), 7);

        let shape = Shape::new(mean.points().to_vec());
        let centroid = shape.centroid();
        assert!(centroid.x.abs() < 1e-6);
        assert!(centroid.y.abs() < 1e-6);

        // Identical contributing shapes keep the unit norm of each.
        assert!((shape.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn training_skips_empty_landmark_sets() {
        let empty = Annotation::new(
            Shape::new(vec![]),
            vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)],
        );
        let corpus = vec![empty, triangle_annotation()];

        let mean = aligner().train(&corpus).unwrap();
        assert_eq!(mean.len(), 7);
    }

    #[test]
    fn training_rejects_cardinality_mismatch() {
        let mut other = triangle_annotation();
        other.landmarks.points.push(Point::new(15.0, 15.0));
        let corpus = vec![triangle_annotation(), other];

        let err = aligner().train(&corpus).unwrap_err();
        match err {
            Error::Sample { stage, source, .. } => {
                assert_eq!(stage, "align-train");
                assert!(matches!(
                    *source,
                    Error::CorrespondenceMismatch {
                        expected: 7,
                        found: 8
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn training_requires_usable_samples() {
        let err = aligner().train(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyTrainingSet));
    }

    #[test]
    fn projection_requires_bounding_box() {
        let corpus = vec![triangle_annotation()];
        let mean = aligner().train(&corpus).unwrap();

        let boxless = Annotation::new(triangle_annotation().landmarks, vec![]);
        let err = aligner().project(&boxless, &mean).unwrap_err();
        assert!(matches!(err, Error::MissingBoundingBox));
    }

    #[test]
    fn projection_rejects_wrong_cardinality() {
        let mean = aligner().train(&[triangle_annotation()]).unwrap();

        let mut other = triangle_annotation();
        other.landmarks.points.push(Point::new(5.0, 5.0));
        let err = aligner().project(&other, &mean).unwrap_err();
        assert!(matches!(
            err,
            Error::CorrespondenceMismatch {
                expected: 7,
                found: 8
            }
        ));
    }

    #[test]
    fn self_projection_yields_identity_rotation() {
        let annotation = triangle_annotation();
        let mean = aligner().train(&[annotation.clone()]).unwrap();

        let params = aligner().project(&annotation, &mean).unwrap();
        assert!((params.rotation[0][0] - 1.0).abs() < 1e-3);
        assert!((params.rotation[1][1] - 1.0).abs() < 1e-3);
        assert!(params.rotation[0][1].abs() < 1e-3);
        assert!(params.rotation[1][0].abs() < 1e-3);
    }

    #[test]
    fn rotation_is_orthogonal() {
        let mean = aligner().train(&[triangle_annotation()]).unwrap();

        // Rotate the landmarks and box corners by 30 degrees around (15, 15).
        let angle = 30.0f32.to_radians();
        let (sin, cos) = angle.sin_cos();
        let center = Point::new(15.0, 15.0);
        let rotate = |p: Point| {
            let d = p - center;
            center + Point::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos)
        };

        let source = triangle_annotation();
        let rotated = Annotation::new(
            Shape::new(source.landmarks.points.iter().map(|&p| rotate(p)).collect()),
            source.boxes.clone(),
        );

        let params = aligner().project(&rotated, &mean).unwrap();
        let r = params.rotation;

        // R' * R == I
        let rtr = [
            [
                r[0][0] * r[0][0] + r[1][0] * r[1][0],
                r[0][0] * r[0][1] + r[1][0] * r[1][1],
            ],
            [
                r[0][1] * r[0][0] + r[1][1] * r[1][0],
                r[0][1] * r[0][1] + r[1][1] * r[1][1],
            ],
        ];
        assert!((rtr[0][0] - 1.0).abs() < 1e-4);
        assert!((rtr[1][1] - 1.0).abs() < 1e-4);
        assert!(rtr[0][1].abs() < 1e-4);
        assert!(rtr[1][0].abs() < 1e-4);
    }

    #[test]
    fn projection_leaves_inputs_untouched() {
        let annotation = triangle_annotation();
        let mean = aligner().train(&[annotation.clone()]).unwrap();

        let before = annotation.clone();
        let params = aligner().project(&annotation, &mean).unwrap();
        assert_eq!(annotation, before);

        // Translation is the raw centroid of the augmented set.
        let augmented = annotation.augmented().unwrap();
        let centroid = augmented.centroid();
        assert!((params.translation.x - centroid.x).abs() < 1e-5);
        assert!((params.translation.y - centroid.y).abs() < 1e-5);
        assert!(params.norm > 0.0);
    }

    #[test]
    fn save_and_load_mean_shape() {
        let mean = aligner().train(&[triangle_annotation()]).unwrap();

        let temp_path = std::env::temp_dir().join("shapewarp_mean_test.bin");
        mean.save(&temp_path).unwrap();

        let loaded = MeanShape::load(&temp_path).unwrap();
        assert_eq!(loaded, mean);

        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn rotate_uses_row_vector_convention() {
        let params = AlignmentParams {
            // 90 degree rotation
            rotation: [[0.0, 1.0], [-1.0, 0.0]],
            translation: Point::zero(),
            norm: 1.0,
        };

        let p = params.rotate(Point::new(1.0, 0.0));
        assert!((p.x - 0.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }
}
