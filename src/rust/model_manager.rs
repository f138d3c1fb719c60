use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierConfig, DictVectorizer, InputEncoder, InputMode, ParamSnapshot};

/// Format version written into every model record.
pub const MODEL_FORMAT_VERSION: u32 = 1;

static CHECKPOINT_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Model record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Parameter encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Parameter decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
    #[error("Model file not found: {0:?}")]
    MissingFile(PathBuf),
    #[error("Invalid model record: {0}")]
    InvalidRecord(String),
}

/// Everything except the parameter values needed to rebuild a trained classifier.
///
/// Stored as JSON next to the binary parameter file (see [`params_path`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelRecord {
    pub version: u32,
    pub config: ClassifierConfig,
    /// Output label space
    pub da_vectorizer: DictVectorizer,
    pub input_encoder: InputEncoder,
    pub input_shape: Vec<usize>,
    pub num_outputs: usize,
    /// SHA-256 of the parameter file, lowercase hex
    pub params_sha256: String,
}

impl ModelRecord {
    /// Checks that the record's fields agree with each other.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(ModelError::InvalidRecord(format!(
                "unsupported format version {} (expected {})",
                self.version, MODEL_FORMAT_VERSION
            )));
        }
        let architecture = self
            .config
            .architecture()
            .map_err(|e| ModelError::InvalidRecord(e.to_string()))?;
        if self.num_outputs != self.da_vectorizer.len() {
            return Err(ModelError::InvalidRecord(format!(
                "{} outputs recorded but the label vocabulary has {} entries",
                self.num_outputs,
                self.da_vectorizer.len()
            )));
        }
        let expected_shape = match (&self.input_encoder, architecture.input) {
            (InputEncoder::Embeddings(extractor), InputMode::Embeddings) => {
                extractor.get_embeddings_shape()
            }
            (InputEncoder::Features(vectorizer), InputMode::Features) => vec![vectorizer.len()],
            _ => {
                return Err(ModelError::InvalidRecord(
                    "input encoder does not match the configured input mode".into(),
                ))
            }
        };
        if self.input_shape != expected_shape {
            return Err(ModelError::InvalidRecord(format!(
                "input shape {:?} does not match the encoder ({:?})",
                self.input_shape, expected_shape
            )));
        }
        if self.params_sha256.len() != 64 || !self.params_sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ModelError::InvalidRecord("parameter hash is not a SHA-256 hex digest".into()));
        }
        Ok(())
    }
}

/// Path of the parameter file paired with a model record path.
///
/// A trailing `.gz` and then a trailing `.json` are dropped before `.params` is appended,
/// so `model.json`, `model.json.gz` and `model` all map to `model.params`.
pub fn params_path<P: AsRef<Path>>(record_path: P) -> PathBuf {
    let mut name = record_path.as_ref().as_os_str().to_string_lossy().into_owned();
    for suffix in [".gz", ".json"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    PathBuf::from(name + ".params")
}

pub fn file_sha256<P: AsRef<Path>>(path: P) -> Result<String, ModelError> {
    let bytes = fs::read(path)?;
    Ok(bytes_sha256(&bytes))
}

fn bytes_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes the model record as pretty-printed JSON.
pub fn save_record<P: AsRef<Path>>(path: P, record: &ModelRecord) -> Result<(), ModelError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    log::info!("Writing model record to {:?}", path);
    fs::write(path, serde_json::to_vec_pretty(record)?)?;
    Ok(())
}

/// Reads and validates a model record.
pub fn load_record<P: AsRef<Path>>(path: P) -> Result<ModelRecord, ModelError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ModelError::MissingFile(path.to_path_buf()));
    }
    log::info!("Reading model record from {:?}", path);
    let record: ModelRecord = serde_json::from_slice(&fs::read(path)?)?;
    record.validate()?;
    Ok(record)
}

/// Encodes a parameter snapshot to `path`; returns the SHA-256 of the written bytes.
pub fn write_params<P: AsRef<Path>>(path: P, snapshot: &ParamSnapshot) -> Result<String, ModelError> {
    let path = path.as_ref();
    let bytes = bincode::encode_to_vec(snapshot, bincode::config::standard())?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    log::debug!("Writing {} bytes of parameters to {:?}", bytes.len(), path);
    fs::write(path, &bytes)?;
    Ok(bytes_sha256(&bytes))
}

/// Decodes a parameter snapshot, checking the file hash first when one is given.
pub fn read_params<P: AsRef<Path>>(path: P, expected_hash: Option<&str>) -> Result<ParamSnapshot, ModelError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ModelError::MissingFile(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    if let Some(expected) = expected_hash {
        let actual = bytes_sha256(&bytes);
        if actual != expected {
            log::error!("Parameter hash mismatch for {:?}: expected {}, got {}", path, expected, actual);
            return Err(ModelError::HashMismatch {
                file_type: "parameter".to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }
    let (snapshot, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(snapshot)
}

/// Owns the directory where training checkpoints are kept.
#[derive(Debug, Clone)]
pub struct ModelManager {
    checkpoint_dir: PathBuf,
}

impl ModelManager {
    /// Creates a ModelManager over the default checkpoint directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_checkpoint_dir())
    }

    /// Returns the default checkpoint directory path
    pub fn default_checkpoint_dir() -> PathBuf {
        if let Ok(path) = env::var("TREECLASSIF_CHECKPOINT_DIR") {
            return PathBuf::from(path);
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("treeclassif").join("checkpoints");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("treeclassif").join("checkpoints");
        }

        env::temp_dir().join("treeclassif").join("checkpoints")
    }

    pub fn new<P: AsRef<Path>>(checkpoint_dir: P) -> io::Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        fs::create_dir_all(&checkpoint_dir)?;
        Ok(Self { checkpoint_dir })
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// A fresh checkpoint file name, unique within this process.
    pub fn new_checkpoint_path(&self) -> PathBuf {
        let n = CHECKPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.checkpoint_dir
            .join(format!("treeclassif-{}-{}.ckpt", std::process::id(), n))
    }
}
