use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ClassifierError;

/// How trees are presented to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Sparse binary (t-lemma, formeme) presence features
    Features,
    /// Fixed-length sequence of formeme/t-lemma ids
    Embeddings,
}

/// Network family and its shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkShape {
    /// Fully connected layers with `tanh` hidden activations and a linear output layer
    FeedForward { hidden_layers: usize },
    /// LSTM over embedded ids, final state projected to the outputs
    Recurrent,
}

/// The validated architecture selected by a [`ClassifierConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    pub input: InputMode,
    pub shape: NetworkShape,
}

/// Classifier configuration, as read from a JSON file.
///
/// All keys are optional; missing keys take the defaults below. Unknown keys are ignored,
/// so a file shared with other components can be used as is. The configuration is
/// checked once by [`ClassifierConfig::architecture`] before anything is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub language: String,
    /// Tree annotation layer, passed through to tree readers
    pub selector: String,
    /// Network family; a value starting with `emb` switches to id-sequence input
    pub nn: String,
    pub emb_size: usize,
    /// `ff`, `ff0`..`ff4` (number of hidden layers, default 2) or `rnn`
    pub nn_shape: String,
    pub num_hidden_units: usize,
    pub passes: usize,
    pub min_passes: usize,
    /// Learning rate
    pub alpha: f32,
    /// Shuffle training instances before every pass
    pub randomize: bool,
    pub batch_size: usize,
    pub validation_freq: usize,
    pub max_cores: Option<usize>,
    pub max_tree_len: usize,
    /// Seed for weight initialization and shuffling; taken from entropy when unset
    pub seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            selector: String::new(),
            nn: String::new(),
            emb_size: 50,
            nn_shape: "ff".to_string(),
            num_hidden_units: 512,
            passes: 200,
            min_passes: 0,
            alpha: 0.1,
            randomize: true,
            batch_size: 1,
            validation_freq: 10,
            max_cores: None,
            max_tree_len: 25,
            seed: None,
        }
    }
}

impl ClassifierConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a JSON configuration, logging a warning for every key it does not use.
    pub fn from_json(content: &str) -> Result<Self, ClassifierError> {
        let invalid = |e: serde_json::Error| ClassifierError::Config(format!("Invalid configuration file: {}", e));
        let value: Value = serde_json::from_str(content).map_err(invalid)?;
        for key in Self::unknown_keys(&value) {
            warn!("Ignoring unknown configuration key '{}'", key);
        }
        serde_json::from_value(value).map_err(invalid)
    }

    fn unknown_keys(value: &Value) -> Vec<String> {
        let known = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(fields)) => fields,
            _ => return Vec::new(),
        };
        match value {
            Value::Object(fields) => fields.keys().filter(|k| !known.contains_key(*k)).cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Validates the configuration and returns the architecture it selects.
    ///
    /// # Errors
    /// - `Config` if `nn_shape` is not one of `ff`, `ff0`..`ff4`, `rnn`
    /// - `Config` if a recurrent network is requested without embedding input
    /// - `Config` if a size, count or rate is zero (or `alpha` is not a positive number)
    pub fn architecture(&self) -> Result<Architecture, ClassifierError> {
        let input = if self.nn.starts_with("emb") {
            InputMode::Embeddings
        } else {
            InputMode::Features
        };

        let shape = match self.nn_shape.as_str() {
            "ff" => NetworkShape::FeedForward { hidden_layers: 2 },
            "rnn" => NetworkShape::Recurrent,
            other => match other.strip_prefix("ff").and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n <= 4 => NetworkShape::FeedForward { hidden_layers: n },
                _ => {
                    return Err(ClassifierError::Config(format!(
                        "Unsupported network shape '{}' (expected ff, ff0-ff4 or rnn)",
                        other
                    )))
                }
            },
        };

        if shape == NetworkShape::Recurrent && input != InputMode::Embeddings {
            return Err(ClassifierError::Config(
                "Recurrent networks need embedding input (set nn to 'emb')".into(),
            ));
        }

        let positive = [
            ("passes", self.passes),
            ("batch_size", self.batch_size),
            ("validation_freq", self.validation_freq),
            ("max_tree_len", self.max_tree_len),
            ("emb_size", self.emb_size),
            ("num_hidden_units", self.num_hidden_units),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ClassifierError::Config(format!("'{}' must be greater than zero", name)));
        }
        if self.max_cores == Some(0) {
            return Err(ClassifierError::Config("'max_cores' must be greater than zero".into()));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(ClassifierError::Config(format!(
                "'alpha' must be a positive number, got {}",
                self.alpha
            )));
        }

        Ok(Architecture { input, shape })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_shape(nn: &str, nn_shape: &str) -> ClassifierConfig {
        ClassifierConfig {
            nn: nn.to_string(),
            nn_shape: nn_shape.to_string(),
            ..ClassifierConfig::default()
        }
    }

    #[test]
    fn test_default_is_two_layer_feed_forward() {
        let arch = ClassifierConfig::default().architecture().unwrap();
        assert_eq!(arch.input, InputMode::Features);
        assert_eq!(arch.shape, NetworkShape::FeedForward { hidden_layers: 2 });
    }

    #[test]
    fn test_layer_count_suffix() {
        for n in 0..=4 {
            let arch = with_shape("", &format!("ff{}", n)).architecture().unwrap();
            assert_eq!(arch.shape, NetworkShape::FeedForward { hidden_layers: n });
        }
        assert!(with_shape("", "ff5").architecture().is_err());
    }

    #[test]
    fn test_unknown_shapes_rejected() {
        for shape in ["conv", "maxpool", "rnn2", "", "FF"] {
            assert!(
                matches!(with_shape("emb", shape).architecture(), Err(ClassifierError::Config(_))),
                "shape {:?} should be rejected",
                shape
            );
        }
    }

    #[test]
    fn test_recurrent_requires_embeddings() {
        assert!(with_shape("", "rnn").architecture().is_err());
        let arch = with_shape("emb", "rnn").architecture().unwrap();
        assert_eq!(arch, Architecture { input: InputMode::Embeddings, shape: NetworkShape::Recurrent });
    }

    #[test]
    fn test_invalid_numbers() {
        let cfg = ClassifierConfig { batch_size: 0, ..ClassifierConfig::default() };
        assert!(cfg.architecture().is_err());
        let cfg = ClassifierConfig { alpha: f32::NAN, ..ClassifierConfig::default() };
        assert!(cfg.architecture().is_err());
        let cfg = ClassifierConfig { max_cores: Some(0), ..ClassifierConfig::default() };
        assert!(cfg.architecture().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: ClassifierConfig = serde_json::from_str(r#"{"nn": "emb", "passes": 5}"#).unwrap();
        assert_eq!(cfg.passes, 5);
        assert_eq!(cfg.max_tree_len, 25);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let json = r#"{"passes": 5, "pases": 6, "beam_size": 20, "nn": "emb"}"#;
        let value: Value = serde_json::from_str(json).unwrap();
        let mut unknown = ClassifierConfig::unknown_keys(&value);
        unknown.sort();
        assert_eq!(unknown, vec!["beam_size", "pases"]);

        let cfg = ClassifierConfig::from_json(json).unwrap();
        assert_eq!(cfg.passes, 5);
        assert_eq!(cfg.nn, "emb");
        assert_eq!(cfg.num_hidden_units, ClassifierConfig::default().num_hidden_units);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(ClassifierConfig::from_json("{\"passes\": "), Err(ClassifierError::Config(_))));
        assert!(matches!(
            ClassifierConfig::from_json(r#"{"passes": "many"}"#),
            Err(ClassifierError::Config(_))
        ));
    }
}
