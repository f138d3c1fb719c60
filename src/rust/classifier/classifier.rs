use std::fs;
use std::path::Path;
use std::sync::Arc;

use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use super::config::{Architecture, ClassifierConfig};
use super::coverage::{self, RunContext};
use super::embedding::TreeEmbeddingExtractor;
use super::error::ClassifierError;
use super::features::{da_features, tree_features, FeatureMap};
use super::network::{Network, NetworkDims};
use super::utils::binarize;
use super::vectorizer::DictVectorizer;
use super::ClassifierInfo;
use crate::dialogue_act::DialogueAct;
use crate::model_manager::{self, ModelRecord, MODEL_FORMAT_VERSION};
use crate::runtime::{self, RuntimeConfig};
use crate::tree::Tree;

/// How trees are turned into network input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEncoder {
    /// Id sequences over a t-lemma/formeme dictionary
    Embeddings(TreeEmbeddingExtractor),
    /// Binary (t-lemma, formeme) presence vectors
    Features(DictVectorizer),
}

impl InputEncoder {
    pub fn encode(&self, trees: &[Tree]) -> Array2<f32> {
        match self {
            InputEncoder::Embeddings(extractor) => {
                let width = extractor.max_tree_len() * 2;
                let mut rows = Array2::zeros((trees.len(), width));
                for (mut row, tree) in rows.rows_mut().into_iter().zip(trees) {
                    for (cell, id) in row.iter_mut().zip(extractor.get_embeddings(tree)) {
                        *cell = id as f32;
                    }
                }
                rows
            }
            InputEncoder::Features(vectorizer) => {
                let feats: Vec<FeatureMap> = trees.iter().map(tree_features).collect();
                vectorizer.transform(&feats)
            }
        }
    }

    /// Shape of one encoded tree.
    pub fn input_shape(&self) -> Vec<usize> {
        match self {
            InputEncoder::Embeddings(extractor) => extractor.get_embeddings_shape(),
            InputEncoder::Features(vectorizer) => vec![vectorizer.len()],
        }
    }

    /// Rows needed in an embedding table indexed by this encoder's ids.
    pub fn dict_size(&self) -> usize {
        match self {
            InputEncoder::Embeddings(extractor) => extractor.dict_size(),
            InputEncoder::Features(_) => 1,
        }
    }
}

/// A trained tree classifier: predicts which dialogue act items a tree expresses, and
/// checks trees against dialogue acts.
///
/// All queries take `&self`; the classifier is `Send + Sync` and can be shared across
/// threads behind an `Arc`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use treeclassif::{Classifier, DialogueAct, Tree};
///
/// let classifier = Classifier::load_from_file("model.json")?;
/// let da: DialogueAct = "inform(food=Chinese)".parse()?;
/// let trees: Vec<Tree> = vec!["serve|v:fin chinese|adj:attr food|n:obj".parse()?];
///
/// let run = classifier.init_run(&da);
/// let ok = classifier.is_subset_of_cur_da(&run, &trees)?;
/// println!("{:?}", ok);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier {
    config: ClassifierConfig,
    architecture: Architecture,
    input_encoder: InputEncoder,
    da_vectorizer: DictVectorizer,
    network: Network,
    pool: Arc<ThreadPool>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for setting up a training run
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ClassifierConfig,
        architecture: Architecture,
        input_encoder: InputEncoder,
        da_vectorizer: DictVectorizer,
        network: Network,
    ) -> Result<Self, ClassifierError> {
        let pool = runtime::create_thread_pool(&RuntimeConfig::with_max_cores(config.max_cores))?;
        Ok(Self {
            config,
            architecture,
            input_encoder,
            da_vectorizer,
            network,
            pool,
        })
    }

    pub(crate) fn network_dims(config: &ClassifierConfig, encoder: &InputEncoder, num_outputs: usize) -> NetworkDims {
        NetworkDims {
            input_width: encoder.input_shape().iter().product(),
            dict_size: encoder.dict_size(),
            num_outputs,
            num_hidden_units: config.num_hidden_units,
            emb_size: config.emb_size,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn input_encoder(&self) -> &InputEncoder {
        &self.input_encoder
    }

    /// Output label names, in output-vector order
    pub fn labels(&self) -> &[String] {
        self.da_vectorizer.feature_names()
    }

    pub fn num_outputs(&self) -> usize {
        self.da_vectorizer.len()
    }

    pub(crate) fn network(&self) -> &Network {
        &self.network
    }

    pub(crate) fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            architecture: self.architecture,
            input_shape: self.input_encoder.input_shape(),
            num_outputs: self.num_outputs(),
            dict_size: match &self.input_encoder {
                InputEncoder::Embeddings(extractor) => Some(extractor.dict_size()),
                InputEncoder::Features(_) => None,
            },
            labels: self.labels().to_vec(),
        }
    }

    pub(crate) fn encode_inputs(&self, trees: &[Tree]) -> Array2<f32> {
        self.input_encoder.encode(trees)
    }

    pub(crate) fn encode_targets(&self, das: &[DialogueAct]) -> Array2<f32> {
        let feats: Vec<FeatureMap> = das.iter().map(da_features).collect();
        self.da_vectorizer.transform(&feats)
    }

    /// Binary label vector of a dialogue act; labels never seen in training are dropped.
    pub fn encode_da(&self, da: &DialogueAct) -> Array1<u8> {
        self.da_vectorizer
            .transform_one(&da_features(da))
            .mapv(|v| u8::from(v != 0.0))
    }

    /// Raw output scores (logits), one row per tree.
    ///
    /// Rows are split into chunks evaluated in parallel on the classifier's thread pool.
    pub fn scores(&self, trees: &[Tree]) -> Array2<f32> {
        let inputs = self.encode_inputs(trees);
        let rows = inputs.nrows();
        let mut out = Array2::zeros((rows, self.num_outputs()));
        if rows == 0 {
            return out;
        }
        let chunk = rows.div_ceil(self.pool.current_num_threads().max(1));
        let starts: Vec<usize> = (0..rows).step_by(chunk).collect();
        let parts: Vec<(usize, Array2<f32>)> = self.pool.install(|| {
            starts
                .par_iter()
                .map(|&start| {
                    let end = (start + chunk).min(rows);
                    (start, self.network.predict(&inputs.slice(s![start..end, ..])))
                })
                .collect()
        });
        for (start, part) in parts {
            out.slice_mut(s![start..start + part.nrows(), ..]).assign(&part);
        }
        out
    }

    /// Which labels each tree expresses, as a 0/1 matrix (score > 0 → 1).
    pub fn classify(&self, trees: &[Tree]) -> Array2<u8> {
        binarize(&self.scores(trees).view())
    }

    /// For each tree, whether every label it expresses is also in `da`.
    pub fn is_subset_of_da(&self, da: &DialogueAct, trees: &[Tree]) -> Vec<bool> {
        let da_bin = self.encode_da(da);
        coverage::is_subset(&self.classify(trees).view(), &da_bin.view())
    }

    /// For each tree, the number of labels on which it disagrees with `da`.
    pub fn dist_to_da(&self, da: &DialogueAct, trees: &[Tree]) -> Vec<usize> {
        let da_bin = self.encode_da(da);
        coverage::distance(&self.classify(trees).view(), &da_bin.view())
    }

    /// Encodes `da` once for a series of `*_cur_da` queries.
    pub fn init_run(&self, da: &DialogueAct) -> RunContext {
        RunContext::new(da.clone(), self.encode_da(da))
    }

    pub fn is_subset_of_cur_da(&self, run: &RunContext, trees: &[Tree]) -> Result<Vec<bool>, ClassifierError> {
        self.check_run(run)?;
        Ok(coverage::is_subset(&self.classify(trees).view(), &run.da_bin()))
    }

    /// For each tree, whether it expresses exactly the labels of the run's DA.
    pub fn corresponds_to_cur_da(&self, run: &RunContext, trees: &[Tree]) -> Result<Vec<bool>, ClassifierError> {
        self.check_run(run)?;
        Ok(coverage::matches_exactly(&self.classify(trees).view(), &run.da_bin()))
    }

    pub fn dist_to_cur_da(&self, run: &RunContext, trees: &[Tree]) -> Result<Vec<usize>, ClassifierError> {
        self.check_run(run)?;
        Ok(coverage::distance(&self.classify(trees).view(), &run.da_bin()))
    }

    fn check_run(&self, run: &RunContext) -> Result<(), ClassifierError> {
        if run.da_bin().len() != self.num_outputs() {
            return Err(ClassifierError::Validation(format!(
                "Run context has {} labels, classifier has {}",
                run.da_bin().len(),
                self.num_outputs()
            )));
        }
        Ok(())
    }

    fn record(&self, params_sha256: String) -> ModelRecord {
        ModelRecord {
            version: MODEL_FORMAT_VERSION,
            config: self.config.clone(),
            da_vectorizer: self.da_vectorizer.clone(),
            input_encoder: self.input_encoder.clone(),
            input_shape: self.input_encoder.input_shape(),
            num_outputs: self.num_outputs(),
            params_sha256,
        }
    }

    /// Saves the model record to `path` and the current parameters next to it
    /// (see [`params_path`](crate::model_manager::params_path)).
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let params = model_manager::params_path(path);
        log::info!("Saving classifier to {:?}", path);
        let hash = model_manager::write_params(&params, &self.network.snapshot())?;
        model_manager::save_record(path, &self.record(hash))?;
        Ok(())
    }

    /// Saves the model record with an existing parameter file copied in place of the
    /// current parameters.
    pub(crate) fn save_with_params_file<P: AsRef<Path>>(&self, path: P, source: &Path) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let params = model_manager::params_path(path);
        log::info!("Saving classifier to {:?} (parameters from {:?})", path, source);
        if let Some(parent) = params.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &params)?;
        let hash = model_manager::file_sha256(&params)?;
        model_manager::save_record(path, &self.record(hash))?;
        Ok(())
    }

    /// Loads a classifier saved by [`save_to_file`](Self::save_to_file).
    ///
    /// The network is rebuilt from the stored configuration before the parameters are
    /// read into it; a parameter file that does not fit the rebuilt network is an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        log::info!("Loading classifier from {:?}", path);
        let record = model_manager::load_record(path)?;
        let architecture = record.config.architecture()?;
        let dims = Self::network_dims(&record.config, &record.input_encoder, record.num_outputs);
        // weights are overwritten right away, the seed does not matter
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = Network::build(architecture.shape, &dims, record.config.alpha, &mut rng);
        let snapshot = model_manager::read_params(model_manager::params_path(path), Some(&record.params_sha256))?;
        network.load_snapshot(&snapshot)?;
        Self::from_parts(record.config, architecture, record.input_encoder, record.da_vectorizer, network)
    }
}
