//! Error types for evaluation runs.

use thiserror::Error;

/// Pipeline stage that produced a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Stage {
    /// Loading or generating vectors and ground truth.
    Acquire,
    /// Constructing the index under test.
    Build,
    /// Training the index under test.
    Train,
    /// Inserting the corpus.
    Populate,
    /// Running the timed queries.
    Search,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Acquire => "acquire",
            Stage::Build => "build",
            Stage::Train => "train",
            Stage::Populate => "populate",
            Stage::Search => "search",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while evaluating an index.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A named dataset could not be found or read.
    ///
    /// Recoverable: a configuration with `skip_if_no_data` turns this into a skip.
    #[error("dataset {name} unavailable: {reason}")]
    DatasetUnavailable { name: String, reason: String },

    /// Dataset files exist but are malformed.
    #[error("malformed dataset file {path}: {reason}")]
    MalformedDataset { path: String, reason: String },

    /// Vector buffer length does not match the declared dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The index rejected training because it saw too few vectors.
    #[error("insufficient training data: {0}")]
    InsufficientTrainingData(String),

    /// The index still reports itself untrained after `train`.
    #[error("index not trained after train() call")]
    NotTrained,

    /// The index holds a different element count than was inserted.
    #[error("expected {expected} vectors in index, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Search failed for a specific query.
    #[error("search failed at query {query}: {reason}")]
    QueryFailed { query: usize, reason: String },

    /// Error reported by an index implementation.
    #[error("index error: {0}")]
    Index(String),

    /// A stage of the pipeline failed; wraps the underlying cause.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<EvalError>,
    },

    /// I/O error (dataset files, cache files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    /// Attach the failing pipeline stage.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ EvalError::Stage { .. } => already,
            other => EvalError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EvalError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, with stage wrappers removed.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error should skip a run instead of failing it.
    ///
    /// Insufficient training data only skips when raised by the train stage; from
    /// any other stage it is an ordinary failure.
    pub fn is_skip_condition(&self) -> bool {
        match self.root() {
            EvalError::DatasetUnavailable { .. } => true,
            EvalError::InsufficientTrainingData(_) => self.stage() == Some(Stage::Train),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wraps_once() {
        let err = EvalError::NotTrained.at(Stage::Train).at(Stage::Populate);
        assert_eq!(err.stage(), Some(Stage::Train));
        assert!(matches!(err.root(), EvalError::NotTrained));
        assert_eq!(
            err.to_string(),
            "train stage failed: index not trained after train() call"
        );
    }

    #[test]
    fn skip_conditions() {
        let missing = EvalError::DatasetUnavailable {
            name: "SIFT10K".into(),
            reason: "no such file".into(),
        };
        assert!(missing.at(Stage::Acquire).is_skip_condition());
        let starved = || EvalError::InsufficientTrainingData("10 < 256".into());
        assert!(starved().at(Stage::Train).is_skip_condition());
        assert!(!starved().at(Stage::Build).is_skip_condition());
        assert!(!starved().at(Stage::Populate).is_skip_condition());
        assert!(!starved().is_skip_condition());
        assert!(!EvalError::Index("boom".into()).is_skip_condition());
    }
}
