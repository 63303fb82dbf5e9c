pub mod containment;
pub mod diagnostics;
pub mod paginator;
pub mod pipeline;
pub mod projector;
pub mod selector;
pub mod transform;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EngineError {
        #[error("invalid configuration: {0}")]
        InvalidConfiguration(String),
        #[error("malformed shape: {0}")]
        MalformedShape(String),
        #[error("malformed intervals at index {index}: {reason}")]
        MalformedIntervals { index: usize, reason: String },
        #[error("borehole {0} not found")]
        BoreholeNotFound(String),
    }
}
