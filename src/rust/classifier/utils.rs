use ndarray::{Array2, ArrayView2, Zip};

pub(crate) fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Sigmoid cross-entropy computed on logits, summed over labels and averaged over the batch.
///
/// Uses `max(x, 0) - x*t + ln(1 + e^-|x|)`, which stays finite for large |x|
/// where `-t*ln(p) - (1-t)*ln(1-p)` on a sigmoid output does not.
pub(crate) fn sigmoid_cross_entropy(logits: &ArrayView2<f32>, targets: &ArrayView2<f32>) -> f32 {
    let rows = logits.nrows().max(1) as f32;
    let mut total = 0.0f32;
    Zip::from(logits).and(targets).for_each(|&x, &t| {
        total += x.max(0.0) - x * t + (-x.abs()).exp().ln_1p();
    });
    total / rows
}

/// Gradient of [`sigmoid_cross_entropy`] with respect to the logits.
pub(crate) fn sigmoid_cross_entropy_grad(logits: &ArrayView2<f32>, targets: &ArrayView2<f32>) -> Array2<f32> {
    let rows = logits.nrows().max(1) as f32;
    Zip::from(logits)
        .and(targets)
        .map_collect(|&x, &t| (sigmoid(x) - t) / rows)
}

/// Thresholds scores at zero: positive → 1, everything else → 0.
pub(crate) fn binarize(scores: &ArrayView2<f32>) -> Array2<u8> {
    scores.mapv(|s| u8::from(s > 0.0))
}
