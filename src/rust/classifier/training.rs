use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info};
use ndarray::{Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::builder::ValidationSet;
use super::checkpoint::{CheckpointSelector, CheckpointStore};
use super::classifier::Classifier;
use super::error::ClassifierError;
use super::utils::binarize;
use crate::dialogue_act::DialogueAct;
use crate::tree::Tree;

/// Statistics of one training pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassStats {
    /// 1-based pass number
    pub pass_no: usize,
    pub duration: Duration,
    /// Sum of batch losses over the pass
    pub cost: f64,
    /// Number of wrongly predicted labels over the pass (before each update)
    pub diff: usize,
    /// Combined validation cost, on passes where validation ran
    pub validation_cost: Option<f64>,
    pub checkpoint_saved: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub passes: Vec<PassStats>,
}

impl TrainingReport {
    /// `(pass_no, combined cost)` for every pass where validation ran.
    pub fn validation_costs(&self) -> Vec<(usize, f64)> {
        self.passes
            .iter()
            .filter_map(|p| p.validation_cost.map(|c| (p.pass_no, c)))
            .collect()
    }

    /// Passes after which a checkpoint was written.
    pub fn checkpoint_passes(&self) -> Vec<usize> {
        self.passes
            .iter()
            .filter(|p| p.checkpoint_saved)
            .map(|p| p.pass_no)
            .collect()
    }

    pub fn best_validation_cost(&self) -> Option<f64> {
        self.passes
            .iter()
            .filter(|p| p.checkpoint_saved)
            .filter_map(|p| p.validation_cost)
            .last()
    }

    pub fn last_pass(&self) -> Option<&PassStats> {
        self.passes.last()
    }
}

/// `1000 × validation error + 100 × pass error + pass loss`
pub fn combined_cost(validation_error: usize, pass_diff: usize, pass_cost: f64) -> f64 {
    1000.0 * validation_error as f64 + 100.0 * pass_diff as f64 + pass_cost
}

/// A classifier being trained, with its training data and the best-so-far checkpoint.
///
/// Created by [`ClassifierBuilder::build`](super::ClassifierBuilder::build).
#[derive(Debug)]
pub struct Trainer {
    classifier: Classifier,
    train_trees: Vec<Tree>,
    train_das: Vec<DialogueAct>,
    inputs: Array2<f32>,
    targets: Array2<f32>,
    validation: Option<ValidationSet>,
    rng: StdRng,
    selector: CheckpointSelector,
    checkpoints: CheckpointStore,
}

impl Trainer {
    pub(crate) fn new(
        classifier: Classifier,
        train_trees: Vec<Tree>,
        train_das: Vec<DialogueAct>,
        validation: Option<ValidationSet>,
        rng: StdRng,
        checkpoints: CheckpointStore,
    ) -> Self {
        let inputs = classifier.encode_inputs(&train_trees);
        let targets = classifier.encode_targets(&train_das);
        Self {
            classifier,
            train_trees,
            train_das,
            inputs,
            targets,
            validation,
            rng,
            selector: CheckpointSelector::new(),
            checkpoints,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Hands over the classifier with its current (not necessarily best) parameters.
    pub fn into_classifier(self) -> Classifier {
        self.classifier
    }

    /// Number of training instances, the appended empty instance included.
    pub fn num_instances(&self) -> usize {
        self.train_trees.len()
    }

    pub fn train_trees(&self) -> &[Tree] {
        &self.train_trees
    }

    pub fn train_das(&self) -> &[DialogueAct] {
        &self.train_das
    }

    /// Runs every configured pass, validating and checkpointing along the way.
    ///
    /// Validation runs after pass `n` when `n > min_passes`, `n` is a multiple of
    /// `validation_freq` and validation data was given. Training always runs all passes.
    pub fn train(&mut self) -> Result<TrainingReport, ClassifierError> {
        let config = self.classifier.config().clone();
        info!("Training tree classifier...");
        let mut report = TrainingReport::default();

        for pass_no in 1..=config.passes {
            let mut order: Vec<usize> = (0..self.train_trees.len()).collect();
            if config.randomize {
                order.shuffle(&mut self.rng);
            }
            let mut stats = self.training_pass(pass_no, &order, config.batch_size);

            if pass_no > config.min_passes && pass_no % config.validation_freq == 0 {
                if let Some(valid_diff) = self.validation_error() {
                    let cost = combined_cost(valid_diff, stats.diff, stats.cost);
                    info!("Combined validation cost: {:8.3}", cost);
                    stats.validation_cost = Some(cost);
                    if self.selector.offer(cost) {
                        self.checkpoints.save(&self.classifier.network().snapshot())?;
                        stats.checkpoint_saved = true;
                    }
                }
            }
            report.passes.push(stats);
        }
        Ok(report)
    }

    fn training_pass(&mut self, pass_no: usize, order: &[usize], batch_size: usize) -> PassStats {
        let start = Instant::now();
        debug!("TR {:05}:", pass_no);
        debug!("Train order: {:?}", order);

        let mut cost = 0.0f64;
        let mut diff = 0usize;
        for batch in order.chunks(batch_size) {
            let inputs = self.inputs.select(Axis(0), batch);
            let targets = self.targets.select(Axis(0), batch);
            debug!("TREE-NOS: {:?}", batch);
            for &i in batch {
                debug!("{} -> {}", self.train_trees[i], self.train_das[i]);
            }

            let (logits, loss) = self
                .classifier
                .network_mut()
                .train_step(&inputs.view(), &targets.view());
            let predicted = binarize(&logits.view());
            let mut batch_diff = 0usize;
            Zip::from(&predicted).and(&targets).for_each(|&p, &t| {
                if f32::from(p) != t {
                    batch_diff += 1;
                }
            });
            debug!("COST: {:.6}, DIFF: {}", loss, batch_diff);

            cost += f64::from(loss);
            diff += batch_diff;
        }

        let duration = start.elapsed();
        info!(
            "PASS {:03}: duration {:?}, cost {:.6}, diff {}",
            pass_no, duration, cost, diff
        );
        PassStats {
            pass_no,
            duration,
            cost,
            diff,
            validation_cost: None,
            checkpoint_saved: false,
        }
    }

    /// Total distance between every validation DA and each of its reference trees,
    /// or `None` without validation data.
    pub fn validation_error(&self) -> Option<usize> {
        let validation = self.validation.as_ref()?;
        Some(
            validation
                .iter()
                .map(|(da, refs)| self.classifier.dist_to_da(da, refs).into_iter().sum::<usize>())
                .sum(),
        )
    }

    /// Whether a checkpoint has been written during training.
    pub fn has_checkpoint(&self) -> bool {
        self.checkpoints.path().is_some()
    }

    /// Replaces the live parameters with the best checkpoint.
    ///
    /// Returns `false` (and changes nothing) when no checkpoint was written.
    pub fn restore_checkpoint(&mut self) -> Result<bool, ClassifierError> {
        match self.checkpoints.load()? {
            Some(snapshot) => {
                info!("Restoring best checkpoint (cost {:?})", self.selector.best());
                self.classifier.network_mut().load_snapshot(&snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Saves the classifier, using the best checkpoint's parameters when one exists and
    /// the live parameters otherwise.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClassifierError> {
        match self.checkpoints.path() {
            Some(checkpoint) => self.classifier.save_with_params_file(path, checkpoint),
            None => self.classifier.save_to_file(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_cost_weights() {
        assert_eq!(combined_cost(0, 0, 1.5), 1.5);
        assert_eq!(combined_cost(1, 0, 0.0), 1000.0);
        assert_eq!(combined_cost(2, 3, 0.25), 2300.25);
    }

    #[test]
    fn test_report_summaries() {
        let pass = |pass_no, validation_cost, checkpoint_saved| PassStats {
            pass_no,
            duration: Duration::ZERO,
            cost: 0.0,
            diff: 0,
            validation_cost,
            checkpoint_saved,
        };
        let report = TrainingReport {
            passes: vec![
                pass(1, None, false),
                pass(2, Some(5.0), true),
                pass(3, None, false),
                pass(4, Some(7.0), false),
                pass(5, Some(3.0), true),
            ],
        };
        assert_eq!(report.validation_costs(), vec![(2, 5.0), (4, 7.0), (5, 3.0)]);
        assert_eq!(report.checkpoint_passes(), vec![2, 5]);
        assert_eq!(report.best_validation_cost(), Some(3.0));
        assert_eq!(report.last_pass().map(|p| p.pass_no), Some(5));
    }
}
