use std::fs;
use std::path::{Path, PathBuf};

use super::error::ClassifierError;
use super::network::ParamSnapshot;
use crate::model_manager::{self, ModelManager};

/// Best-so-far selection over combined validation costs.
///
/// The first cost offered is always accepted; later costs only when strictly lower
/// than the best accepted so far. A NaN cost is never an improvement.
#[derive(Debug, Clone, Default)]
pub struct CheckpointSelector {
    best: Option<f64>,
}

impl CheckpointSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_improvement(&self, cost: f64) -> bool {
        match self.best {
            None => !cost.is_nan(),
            Some(best) => cost < best,
        }
    }

    /// Records `cost` if it improves on the best so far; returns whether it did.
    pub fn offer(&mut self, cost: f64) -> bool {
        let improved = self.is_improvement(cost);
        if improved {
            self.best = Some(cost);
        }
        improved
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// A single on-disk parameter checkpoint, overwritten on every save.
///
/// The file is created lazily on the first save and removed when the store is dropped.
#[derive(Debug)]
pub(crate) struct CheckpointStore {
    dir: Option<PathBuf>,
    path: Option<PathBuf>,
}

impl CheckpointStore {
    /// Checkpoints go to `dir`, or to the model manager's default directory when `None`.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&mut self, snapshot: &ParamSnapshot) -> Result<&Path, ClassifierError> {
        let path = match self.path.take() {
            Some(path) => path,
            None => {
                let manager = match &self.dir {
                    Some(dir) => ModelManager::new(dir)?,
                    None => ModelManager::new_default()?,
                };
                manager.new_checkpoint_path()
            }
        };
        log::info!("Saving checkpoint to {:?}", path);
        let written = model_manager::write_params(&path, snapshot);
        let path = self.path.insert(path);
        written?;
        Ok(path.as_path())
    }

    /// The last saved snapshot, or `None` if nothing was saved yet.
    pub fn load(&self) -> Result<Option<ParamSnapshot>, ClassifierError> {
        match &self.path {
            Some(path) => Ok(Some(model_manager::read_params(path, None)?)),
            None => Ok(None),
        }
    }
}

impl Drop for CheckpointStore {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Could not remove checkpoint {:?}: {}", path, e);
            }
        }
    }
}
