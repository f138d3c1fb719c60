mod builder;
mod checkpoint;
#[allow(clippy::module_inception)]
mod classifier;
mod config;
mod coverage;
mod embedding;
mod error;
mod features;
mod layers;
mod network;
mod training;
mod utils;
mod vectorizer;

pub use builder::{ClassifierBuilder, ValidationSet};
pub use checkpoint::CheckpointSelector;
pub use classifier::{Classifier, InputEncoder};
pub use config::{Architecture, ClassifierConfig, InputMode, NetworkShape};
pub use coverage::RunContext;
pub use embedding::{TreeEmbeddingExtractor, MIN_VALID, UNK_FORMEME, UNK_T_LEMMA, VOID};
pub use error::ClassifierError;
pub use features::{da_features, tree_features, FeatureMap};
pub use network::{ParamSnapshot, TensorSnapshot};
pub use training::{PassStats, Trainer, TrainingReport};
pub use vectorizer::DictVectorizer;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInfo {
    /// Input representation and network shape
    pub architecture: Architecture,
    /// Shape of one encoded tree
    pub input_shape: Vec<usize>,
    /// Number of output labels
    pub num_outputs: usize,
    /// Size of the t-lemma/formeme id space (embedding input only)
    pub dict_size: Option<usize>,
    /// Output label names, in output-vector order
    pub labels: Vec<String>,
}
