use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

use crate::dialogue_act::DialogueAct;

/// A dialogue act fixed for one generation run, together with its binarized label vector.
///
/// Created by [`Classifier::init_run`](super::Classifier::init_run) and passed to the
/// `*_cur_da` queries, so the DA is encoded once per run instead of once per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    da: DialogueAct,
    da_bin: Array1<u8>,
}

impl RunContext {
    pub(crate) fn new(da: DialogueAct, da_bin: Array1<u8>) -> Self {
        Self { da, da_bin }
    }

    pub fn da(&self) -> &DialogueAct {
        &self.da
    }

    /// The DA's label vector, one 0/1 entry per output label
    pub fn da_bin(&self) -> ArrayView1<'_, u8> {
        self.da_bin.view()
    }
}

/// True for every prediction row that switches on no label outside `da_bin`.
///
/// An all-zero row is a subset of any DA. Note that the expression
/// `((c != 0) | da_bin == da_bin).all()` is always true because `==` binds last;
/// this computes the subset test that expression was meant to be.
pub(crate) fn is_subset(predicted: &ArrayView2<u8>, da_bin: &ArrayView1<u8>) -> Vec<bool> {
    predicted
        .rows()
        .into_iter()
        .map(|row| Zip::from(&row).and(da_bin).all(|&c, &d| c == 0 || d != 0))
        .collect()
}

/// True for every prediction row equal to `da_bin` in every coordinate.
pub(crate) fn matches_exactly(predicted: &ArrayView2<u8>, da_bin: &ArrayView1<u8>) -> Vec<bool> {
    predicted.rows().into_iter().map(|row| row == *da_bin).collect()
}

/// Number of coordinates in which each prediction row differs from `da_bin`.
pub(crate) fn distance(predicted: &ArrayView2<u8>, da_bin: &ArrayView1<u8>) -> Vec<usize> {
    predicted
        .rows()
        .into_iter()
        .map(|row| {
            let mut diff = 0;
            Zip::from(&row).and(da_bin).for_each(|&c, &d| {
                if (c != 0) != (d != 0) {
                    diff += 1;
                }
            });
            diff
        })
        .collect()
}
