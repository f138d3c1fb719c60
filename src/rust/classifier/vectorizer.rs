use std::collections::{BTreeSet, HashMap};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::features::FeatureMap;

/// One-hot encoder over a frozen, sorted feature vocabulary.
///
/// Non-zero values are binarized to 1. Features unknown at transform time are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct DictVectorizer {
    feature_names: Vec<String>,
    index: HashMap<String, usize>,
}

impl From<Vec<String>> for DictVectorizer {
    fn from(feature_names: Vec<String>) -> Self {
        let index = feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { feature_names, index }
    }
}

impl From<DictVectorizer> for Vec<String> {
    fn from(vect: DictVectorizer) -> Self {
        vect.feature_names
    }
}

impl DictVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns the vocabulary, replacing any previous one.
    pub fn fit(&mut self, samples: &[FeatureMap]) {
        let names: BTreeSet<&String> = samples
            .iter()
            .flat_map(|s| s.iter().filter(|(_, v)| **v != 0.0).map(|(k, _)| k))
            .collect();
        *self = Self::from(names.into_iter().cloned().collect::<Vec<_>>());
    }

    pub fn fit_transform(&mut self, samples: &[FeatureMap]) -> Array2<f32> {
        self.fit(samples);
        self.transform(samples)
    }

    pub fn transform(&self, samples: &[FeatureMap]) -> Array2<f32> {
        let mut out = Array2::zeros((samples.len(), self.feature_names.len()));
        for (mut row, sample) in out.rows_mut().into_iter().zip(samples) {
            for (name, value) in sample {
                if *value == 0.0 {
                    continue;
                }
                if let Some(&col) = self.index.get(name) {
                    row[col] = 1.0;
                }
            }
        }
        out
    }

    pub fn transform_one(&self, sample: &FeatureMap) -> Array1<f32> {
        let mut out = Array1::zeros(self.feature_names.len());
        for (name, value) in sample {
            if *value != 0.0 {
                if let Some(&col) = self.index.get(name) {
                    out[col] = 1.0;
                }
            }
        }
        out
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(keys: &[&str]) -> FeatureMap {
        keys.iter().map(|k| (k.to_string(), 1.0)).collect()
    }

    #[test]
    fn test_fit_sorts_and_binarizes() {
        let mut vect = DictVectorizer::new();
        let mut weighted = sample(&["b"]);
        weighted.insert("c".into(), 3.5);
        let x = vect.fit_transform(&[sample(&["d", "a"]), weighted]);
        assert_eq!(vect.feature_names(), &["a", "b", "c", "d"]);
        assert_eq!(x.row(0).to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(x.row(1).to_vec(), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_features_are_dropped() {
        let mut vect = DictVectorizer::new();
        vect.fit(&[sample(&["a", "b"])]);
        assert_eq!(vect.transform_one(&sample(&["b", "zzz"])).to_vec(), vec![0.0, 1.0]);
        assert_eq!(vect.transform(&[sample(&["zzz"])]).row(0).sum(), 0.0);
    }

    #[test]
    fn test_serialized_as_name_list() {
        let mut vect = DictVectorizer::new();
        vect.fit(&[sample(&["x", "y"])]);
        let json = serde_json::to_string(&vect).unwrap();
        assert_eq!(json, r#"["x","y"]"#);
        let back: DictVectorizer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vect);
        assert_eq!(back.transform_one(&sample(&["y"])).to_vec(), vec![0.0, 1.0]);
    }
}
