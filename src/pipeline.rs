//! Composable processing stages over samples.
//!
//! Every stage consumes a sample plus its metadata and produces the same,
//! so alignment and warping can be chained, split across processes, or run
//! over a worker pool. Per-sample work is independent: the trained mean
//! shape is shared read-only and batch order carries no guarantee.

use rayon::prelude::*;

use crate::align::{AlignmentParams, Annotation, MeanShape, ShapeAligner};
use crate::error::{Error, Result};
use crate::features::{GrayImage, ImageAccess};
use crate::mesh::triangulate;
use crate::warp::Warper;

/// One unit of work: an image, its annotations, and whatever metadata
/// earlier stages attached.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: String,
    pub image: GrayImage,
    pub annotation: Annotation,
    pub alignment: Option<AlignmentParams>,
}

impl Sample {
    pub fn new(id: impl Into<String>, image: GrayImage, annotation: Annotation) -> Self {
        Self {
            id: id.into(),
            image,
            annotation,
            alignment: None,
        }
    }
}

/// A pipeline stage: sample in, sample out.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, sample: Sample) -> Result<Sample>;
}

/// Attaches Procrustes alignment metadata to each sample. The image and raw
/// landmark coordinates pass through untouched.
pub struct AlignStage {
    aligner: ShapeAligner,
    mean: MeanShape,
}

impl AlignStage {
    pub fn new(aligner: ShapeAligner, mean: MeanShape) -> Self {
        Self { aligner, mean }
    }
}

impl Stage for AlignStage {
    fn name(&self) -> &'static str {
        "align"
    }

    fn apply(&self, mut sample: Sample) -> Result<Sample> {
        let params = self.aligner.project(&sample.annotation, &self.mean)?;
        sample.alignment = Some(params);
        Ok(sample)
    }
}

/// Rebuilds the per-sample triangle mesh and warps the image into the
/// canonical frame, or overlays the mesh edges in inspection mode.
pub struct WarpStage {
    warper: Warper,
    draw: bool,
}

impl WarpStage {
    pub fn new(warper: Warper) -> Self {
        Self {
            warper,
            draw: false,
        }
    }

    /// Overlay triangle edges instead of warping.
    pub fn with_draw(mut self, draw: bool) -> Self {
        self.draw = draw;
        self
    }
}

impl Stage for WarpStage {
    fn name(&self) -> &'static str {
        "warp"
    }

    fn apply(&self, mut sample: Sample) -> Result<Sample> {
        let augmented = sample.annotation.augmented()?;
        let triangles = triangulate(
            &augmented,
            sample.image.width(),
            sample.image.height(),
        );

        if self.draw {
            sample.image = self.warper.draw_edges(&sample.image, &triangles);
            return Ok(sample);
        }

        let params = sample.alignment.ok_or(Error::MissingAlignment)?;
        sample.image = self.warper.warp(&sample.image, &params, &triangles);
        Ok(sample)
    }
}

/// A sequence of stages applied per sample.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run all stages on one sample. Errors carry the sample id and the
    /// name of the stage that failed.
    pub fn run(&self, mut sample: Sample) -> Result<Sample> {
        for stage in &self.stages {
            let id = sample.id.clone();
            sample = stage
                .apply(sample)
                .map_err(|e| e.in_stage(&id, stage.name()))?;
        }
        Ok(sample)
    }

    /// Run the pipeline over a batch on a worker pool. Samples are
    /// independent; results come back in input order but are not processed
    /// in any particular order.
    pub fn run_batch(&self, samples: Vec<Sample>) -> Vec<Result<Sample>> {
        samples.into_par_iter().map(|s| self.run(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameConfig;
    use crate::types::{BoundingBox, Point, Shape};

    fn annotation() -> Annotation {
        Annotation::new(
            Shape::new(vec![
                Point::new(30.0, 30.0),
                Point::new(60.0, 30.0),
                Point::new(30.0, 60.0),
            ]),
            vec![BoundingBox::new(20.0, 20.0, 60.0, 60.0)],
        )
    }

    fn sample(id: &str) -> Sample {
        let image = GrayImage::from_fn(100, 100, |x, y| ((x * 2 + y) % 256) as u8);
        Sample::new(id, image, annotation())
    }

    fn pipeline() -> Pipeline {
        let config = FrameConfig::default();
        let aligner = ShapeAligner::new(config).unwrap();
        let mean = aligner.train(&[annotation()]).unwrap();

        Pipeline::new()
            .with_stage(AlignStage::new(aligner, mean))
            .with_stage(WarpStage::new(Warper::new(config).unwrap()))
    }

    #[test]
    fn align_then_warp() {
        let result = pipeline().run(sample("a")).unwrap();

        assert!(result.alignment.is_some());
        assert_eq!(result.image.width(), 100);
        assert_eq!(result.image.height(), 100);
        // The warp wrote something into the canonical frame.
        assert!(result.image.as_raw().iter().any(|&v| v > 0));
    }

    #[test]
    fn warp_without_alignment_fails() {
        let config = FrameConfig::default();
        let pipeline =
            Pipeline::new().with_stage(WarpStage::new(Warper::new(config).unwrap()));

        let err = pipeline.run(sample("lonely")).unwrap_err();
        match err {
            Error::Sample { id, stage, source } => {
                assert_eq!(id, "lonely");
                assert_eq!(stage, "warp");
                assert!(matches!(*source, Error::MissingAlignment));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_box_is_reported_with_context() {
        let image = GrayImage::from_fn(50, 50, |_, _| 10);
        let boxless = Sample::new(
            "boxless",
            image,
            Annotation::new(Shape::new(vec![Point::new(10.0, 10.0)]), vec![]),
        );

        let err = pipeline().run(boxless).unwrap_err();
        match err {
            Error::Sample { id, stage, source } => {
                assert_eq!(id, "boxless");
                assert_eq!(stage, "align");
                assert!(matches!(*source, Error::MissingBoundingBox));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn draw_mode_needs_no_alignment() {
        let config = FrameConfig::default();
        let pipeline = Pipeline::new()
            .with_stage(WarpStage::new(Warper::new(config).unwrap()).with_draw(true));

        let result = pipeline.run(sample("sketch")).unwrap();
        assert!(result.alignment.is_none());
        // Edges were drawn in black over the source copy.
        assert!(result.image.as_raw().iter().any(|&v| v == 0));
        assert!(result.image.as_raw().iter().any(|&v| v > 0));
    }

    #[test]
    fn batch_preserves_input_order() {
        let pipeline = pipeline();
        let results =
            pipeline.run_batch(vec![sample("0"), sample("1"), sample("2")]);

        assert_eq!(results.len(), 3);
        for (i, result) in results.iter().enumerate() {
            let sample = result.as_ref().unwrap();
            assert_eq!(sample.id, i.to_string());
            assert!(sample.alignment.is_some());
        }
    }
}
