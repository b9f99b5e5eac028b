//! # shapewarp
//!
//! Shape normalization and piecewise-affine image warping for annotated 2D
//! landmarks.
//!
//! This crate provides:
//! - **Procrustes alignment**: learn a canonical mean landmark configuration
//!   from a training corpus, then compute per-sample translation, scale and
//!   optimal rotation onto it
//! - **Delaunay meshing**: per-sample triangulation of the landmark set
//!   augmented with bounding-box corners
//! - **Piecewise warp**: per-triangle affine resampling compositing the
//!   sample into one canonical-frame image
//!
//! ## Pipeline Overview
//!
//! 1. Augment each sample's ordered landmarks with the four corners of its
//!    bounding box
//! 2. Training: center and scale-normalize every augmented set, average
//!    point-wise into the mean shape
//! 3. Inference: rescale the sample into the canonical frame and solve the
//!    orthogonal Procrustes problem against the mean (SVD of the
//!    cross-covariance)
//! 4. Triangulate the augmented landmarks, keep triangles fully inside the
//!    image
//! 5. Warp each triangle through its exact affine map and composite the
//!    disjoint patches
//!
//! ## Quick Start
//!
//! ```rust
//! use shapewarp::{
//!     AlignStage, Annotation, BoundingBox, FrameConfig, GrayImage, ImageAccess,
//!     Pipeline, Point, Sample, Shape, ShapeAligner, WarpStage, Warper,
//! };
//!
//! // Annotate a sample: ordered landmarks plus the detector's bounding box.
//! let landmarks = Shape::new(vec![
//!     Point::new(30.0, 30.0),
//!     Point::new(60.0, 30.0),
//!     Point::new(30.0, 60.0),
//! ]);
//! let annotation = Annotation::new(
//!     landmarks,
//!     vec![BoundingBox::new(20.0, 20.0, 60.0, 60.0)],
//! );
//!
//! // Learn the canonical mean shape (a real corpus has many samples).
//! let config = FrameConfig::default();
//! let aligner = ShapeAligner::new(config).unwrap();
//! let mean = aligner.train(&[annotation.clone()]).unwrap();
//!
//! // Align, mesh and warp in one pipeline.
//! let pipeline = Pipeline::new()
//!     .with_stage(AlignStage::new(aligner, mean))
//!     .with_stage(WarpStage::new(Warper::new(config).unwrap()));
//!
//! let image = GrayImage::from_fn(100, 100, |x, y| ((x + y) % 256) as u8);
//! let warped = pipeline.run(Sample::new("demo", image, annotation)).unwrap();
//! assert_eq!(warped.image.width(), 100);
//! ```
//!
//! ## Custom Image Types
//!
//! Implement the [`ImageAccess`] trait for your own image types; the warper
//! samples sources through it and always composites into a [`GrayImage`].

pub mod align;
pub mod classify;
pub mod config;
mod error;
pub mod features;
pub mod mesh;
pub mod pipeline;
pub mod types;
pub mod warp;

pub use align::{AlignmentParams, Annotation, MeanShape, ShapeAligner};
pub use classify::{check_dimensions, Classifier};
pub use config::FrameConfig;
pub use error::{Error, Result};
pub use features::{sample_bilinear, to_feature_vector, GrayImage, ImageAccess};
pub use mesh::{triangulate, Triangle};
pub use pipeline::{AlignStage, Pipeline, Sample, Stage, WarpStage};
pub use types::{select_box, BoundingBox, Point, Shape};
pub use warp::Warper;
