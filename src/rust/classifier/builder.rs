use std::path::{Path, PathBuf};

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::checkpoint::CheckpointStore;
use super::classifier::{Classifier, InputEncoder};
use super::config::{ClassifierConfig, InputMode};
use super::embedding::TreeEmbeddingExtractor;
use super::error::ClassifierError;
use super::features::{da_features, tree_features, FeatureMap};
use super::network::Network;
use super::training::Trainer;
use super::vectorizer::DictVectorizer;
use crate::dialogue_act::DialogueAct;
use crate::tree::Tree;

/// Validation dialogue acts, each with one or more reference trees (paraphrases).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSet {
    das: Vec<DialogueAct>,
    references: Vec<Vec<Tree>>,
}

impl ValidationSet {
    /// Pairs every DA with its list of reference trees.
    ///
    /// # Errors
    /// `Validation` if the two lists differ in length.
    pub fn new(das: Vec<DialogueAct>, references: Vec<Vec<Tree>>) -> Result<Self, ClassifierError> {
        if das.len() != references.len() {
            return Err(ClassifierError::Validation(format!(
                "{} validation DAs but {} reference lists",
                das.len(),
                references.len()
            )));
        }
        Ok(Self { das, references })
    }

    /// One reference tree per DA.
    pub fn single(das: Vec<DialogueAct>, trees: Vec<Tree>) -> Result<Self, ClassifierError> {
        Self::new(das, trees.into_iter().map(|t| vec![t]).collect())
    }

    /// Two reference paraphrases per DA, taken from two parallel tree lists.
    pub fn paired(das: Vec<DialogueAct>, first: Vec<Tree>, second: Vec<Tree>) -> Result<Self, ClassifierError> {
        if first.len() != second.len() {
            return Err(ClassifierError::Validation(format!(
                "Paraphrase lists differ in length ({} vs {})",
                first.len(),
                second.len()
            )));
        }
        Self::new(das, first.into_iter().zip(second).map(|(a, b)| vec![a, b]).collect())
    }

    pub fn das(&self) -> &[DialogueAct] {
        &self.das
    }

    pub fn references(&self) -> &[Vec<Tree>] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.das.len()
    }

    pub fn is_empty(&self) -> bool {
        self.das.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&DialogueAct, &[Tree])> {
        self.das.iter().zip(self.references.iter().map(Vec::as_slice))
    }
}

/// Sets up a training run: configuration, training data and optional validation data.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use treeclassif::{Classifier, ClassifierConfig};
/// use treeclassif::corpus::{read_das, read_trees};
///
/// let mut trainer = Classifier::builder()
///     .with_config(ClassifierConfig::from_file("config.json")?)?
///     .with_training_data(read_das("train-das.txt")?, read_trees("train-trees.txt")?)
///     .with_data_portion(0.5)
///     .build()?;
/// trainer.train()?;
/// trainer.save_to_file("model.json")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClassifierBuilder {
    config: ClassifierConfig,
    das: Vec<DialogueAct>,
    trees: Vec<Tree>,
    data_portion: f64,
    validation: Option<ValidationSet>,
    checkpoint_dir: Option<PathBuf>,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    /// Creates a builder with the default configuration and no data
    pub fn new() -> Self {
        Self {
            config: ClassifierConfig::default(),
            das: Vec::new(),
            trees: Vec::new(),
            data_portion: 1.0,
            validation: None,
            checkpoint_dir: None,
        }
    }

    /// Sets the configuration, rejecting it right away if it is invalid.
    pub fn with_config(mut self, config: ClassifierConfig) -> Result<Self, ClassifierError> {
        config.architecture()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ClassifierError> {
        let config = ClassifierConfig::from_file(path)?;
        self.with_config(config)
    }

    /// Training DAs and their trees, in parallel order.
    pub fn with_training_data(mut self, das: Vec<DialogueAct>, trees: Vec<Tree>) -> Self {
        self.das = das;
        self.trees = trees;
        self
    }

    /// Trains on the leading `portion` of the training data (rounded to whole instances).
    pub fn with_data_portion(mut self, portion: f64) -> Self {
        self.data_portion = portion;
        self
    }

    pub fn with_validation_data(mut self, validation: ValidationSet) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Directory for the temporary checkpoint file; defaults to
    /// [`ModelManager::default_checkpoint_dir`](crate::ModelManager::default_checkpoint_dir).
    pub fn with_checkpoint_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.checkpoint_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Prepares training: subsamples the data, appends the empty instance, fits the input
    /// and output vocabularies and initializes the network.
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid
    /// - `Validation` if DAs and trees differ in number or the data portion is outside `[0, 1]`
    pub fn build(self) -> Result<Trainer, ClassifierError> {
        let architecture = self.config.architecture()?;
        if self.das.len() != self.trees.len() {
            return Err(ClassifierError::Validation(format!(
                "{} training DAs but {} trees",
                self.das.len(),
                self.trees.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.data_portion) {
            return Err(ClassifierError::Validation(format!(
                "Data portion must be between 0 and 1, got {}",
                self.data_portion
            )));
        }

        let train_size = (self.data_portion * self.trees.len() as f64).round() as usize;
        let mut train_trees = self.trees;
        let mut train_das = self.das;
        train_trees.truncate(train_size);
        train_das.truncate(train_size);

        // the all-zero target keeps any output from staying switched on
        train_trees.push(Tree::empty());
        train_das.push(DialogueAct::default());
        info!("Using {} training instances.", train_trees.len());

        let input_encoder = match architecture.input {
            InputMode::Embeddings => {
                let mut extractor = TreeEmbeddingExtractor::new(self.config.max_tree_len);
                let dict_size = extractor.init_dict(&train_trees);
                log::debug!("Embedding dictionary size: {}", dict_size);
                InputEncoder::Embeddings(extractor)
            }
            InputMode::Features => {
                let feats: Vec<FeatureMap> = train_trees.iter().map(tree_features).collect();
                let mut vectorizer = DictVectorizer::new();
                vectorizer.fit(&feats);
                InputEncoder::Features(vectorizer)
            }
        };

        let da_feats: Vec<FeatureMap> = train_das.iter().map(da_features).collect();
        let mut da_vectorizer = DictVectorizer::new();
        da_vectorizer.fit(&da_feats);
        if da_vectorizer.is_empty() {
            log::warn!("Training dialogue acts contain no labels; the classifier will have no outputs");
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dims = Classifier::network_dims(&self.config, &input_encoder, da_vectorizer.len());
        let network = Network::build(architecture.shape, &dims, self.config.alpha, &mut rng);
        info!(
            "Built {:?} network over {:?} input: {} inputs, {} outputs",
            architecture.shape, architecture.input, dims.input_width, dims.num_outputs
        );

        let classifier = Classifier::from_parts(self.config, architecture, input_encoder, da_vectorizer, network)?;
        let validation = self.validation.filter(|v| !v.is_empty());
        Ok(Trainer::new(
            classifier,
            train_trees,
            train_das,
            validation,
            rng,
            CheckpointStore::new(self.checkpoint_dir),
        ))
    }
}
