use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Model(#[from] bincode::Error),

    #[error("landmark count mismatch: expected {expected}, found {found}")]
    CorrespondenceMismatch { expected: usize, found: usize },

    #[error("no bounding box present on sample")]
    MissingBoundingBox,

    #[error("alignment metadata missing; run alignment before warping")]
    MissingAlignment,

    #[error("training set contains no usable samples")]
    EmptyTrainingSet,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("feature vector length mismatch: expected {expected}, found {found}")]
    FeatureDimensionMismatch { expected: usize, found: usize },

    #[error("sample {id:?} failed in stage {stage}: {source}")]
    Sample {
        id: String,
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the sample and stage it occurred in.
    pub fn in_stage(self, id: &str, stage: &'static str) -> Self {
        Error::Sample {
            id: id.to_string(),
            stage,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
