//! A neural classifier that predicts which dialogue act items (DAIs) a syntactic tree
//! expresses, and checks candidate trees against a target dialogue act.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use treeclassif::{Classifier, ClassifierConfig, DialogueAct, Tree};
//!
//! let das: Vec<DialogueAct> = vec![
//!     "inform(food=Chinese)".parse()?,
//!     "inform(area=north)".parse()?,
//! ];
//! let trees: Vec<Tree> = vec![
//!     "serve|v:fin chinese|adj:attr food|n:obj".parse()?,
//!     "be|v:fin north|n:in+X".parse()?,
//! ];
//! let config = ClassifierConfig {
//!     num_hidden_units: 16,
//!     passes: 5,
//!     seed: Some(42),
//!     ..ClassifierConfig::default()
//! };
//!
//! let mut trainer = Classifier::builder()
//!     .with_config(config)?
//!     .with_training_data(das.clone(), trees.clone())
//!     .build()?;
//! let report = trainer.train()?;
//! println!("final cost: {:?}", report.last_pass().map(|p| p.cost));
//!
//! let classifier = trainer.into_classifier();
//! let run = classifier.init_run(&das[0]);
//! let covered = classifier.is_subset_of_cur_da(&run, &trees)?;
//! println!("{:?}", covered);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A trained [`Classifier`] only needs `&self` for queries and can be shared across
//! threads using `Arc`. Batch scoring runs on a per-classifier rayon pool whose size is
//! bounded by the `max_cores` option.

pub mod classifier;
pub mod corpus;
pub mod dialogue_act;
pub mod model_manager;
mod runtime;
pub mod tree;

pub use classifier::{
    Architecture, CheckpointSelector, Classifier, ClassifierBuilder, ClassifierConfig, ClassifierError,
    ClassifierInfo, InputEncoder, InputMode, NetworkShape, PassStats, RunContext, Trainer, TrainingReport,
    ValidationSet,
};
pub use dialogue_act::{DialogueAct, DialogueActItem};
pub use model_manager::{ModelError, ModelManager};
pub use runtime::{create_thread_pool, RuntimeConfig};
pub use tree::{Tree, TreeNode};

/// Initializes `env_logger`; the level comes from `RUST_LOG`.
pub fn init_logger() {
    env_logger::init();
}
