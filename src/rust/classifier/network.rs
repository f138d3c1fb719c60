use bincode::{Decode, Encode};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;

use super::config::NetworkShape;
use super::error::ClassifierError;
use super::layers::{Adam, Dense, LstmCell, LstmStep, Parameter};
use super::utils::{sigmoid_cross_entropy, sigmoid_cross_entropy_grad};

/// Sizes the network is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NetworkDims {
    /// Width of one input row (feature count or id-sequence length)
    pub input_width: usize,
    /// Rows of the embedding table (ids must be below this)
    pub dict_size: usize,
    pub num_outputs: usize,
    pub num_hidden_units: usize,
    pub emb_size: usize,
}

/// One stored tensor of a parameter snapshot.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TensorSnapshot {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// All trainable parameters of a network, by name.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ParamSnapshot {
    pub tensors: Vec<TensorSnapshot>,
}

#[derive(Debug, Clone)]
struct FeedForward {
    layers: Vec<Dense>,
}

impl FeedForward {
    fn new(name: &str, hidden_layers: usize, dims: &NetworkDims, rng: &mut StdRng) -> Self {
        let mut widths = vec![dims.input_width];
        widths.extend(std::iter::repeat(dims.num_hidden_units).take(hidden_layers));
        widths.push(dims.num_outputs);
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| Dense::new(&format!("{}{}", name, i), w[0], w[1], rng))
            .collect();
        Self { layers }
    }

    /// Activations of every layer, starting with the input; the last entry is the logits.
    fn forward(&self, inputs: &ArrayView2<f32>) -> Vec<Array2<f32>> {
        let last = self.layers.len() - 1;
        let mut acts = vec![inputs.to_owned()];
        for (i, layer) in self.layers.iter().enumerate() {
            let y = layer.forward(&acts[i].view());
            acts.push(if i < last { y.mapv(f32::tanh) } else { y });
        }
        acts
    }

    fn backward(&mut self, acts: &[Array2<f32>], dlogits: Array2<f32>) {
        let last = self.layers.len() - 1;
        let mut grad = dlogits;
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            if i < last {
                grad = grad * &acts[i + 1].mapv(|a| 1.0 - a * a);
            }
            grad = layer.backward(&acts[i].view(), &grad);
        }
    }

    fn params_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.iter_mut().flat_map(Dense::params_mut).collect()
    }

    fn params(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(Dense::params).collect()
    }
}

#[derive(Debug, Clone)]
struct Recurrent {
    embedding: Parameter,
    cell: LstmCell,
    projection: Dense,
}

impl Recurrent {
    fn new(name: &str, dims: &NetworkDims, rng: &mut StdRng) -> Self {
        Self {
            embedding: Parameter::normal(format!("{}-emb", name), (dims.dict_size, dims.emb_size), 0.1, rng),
            cell: LstmCell::new(&format!("{}-lstm", name), dims.emb_size, dims.emb_size, rng),
            projection: Dense::new(name, 2 * dims.emb_size, dims.num_outputs, rng),
        }
    }

    /// Ids per time step, `steps[t][b]`, clamped to the embedding table.
    fn time_major_ids(&self, inputs: &ArrayView2<f32>) -> Vec<Vec<usize>> {
        let max_id = self.embedding.value.nrows().saturating_sub(1);
        inputs
            .columns()
            .into_iter()
            .map(|col| col.iter().map(|&v| (v.max(0.0) as usize).min(max_id)).collect())
            .collect()
    }

    /// Runs the cell over the whole sequence; returns the final state `[c, h]`.
    fn encode(&self, steps: &[Vec<usize>], batch: usize, mut cache: Option<&mut Vec<LstmStep>>) -> Array2<f32> {
        let u = self.cell.units;
        let mut c = Array2::zeros((batch, u));
        let mut h = Array2::zeros((batch, u));
        for ids in steps {
            let x = self.embedding.value.select(Axis(0), ids);
            let (new_c, new_h, step) = self.cell.step(&x.view(), &c, &h);
            if let Some(cache) = cache.as_deref_mut() {
                cache.push(step);
            }
            c = new_c;
            h = new_h;
        }
        let mut state = Array2::zeros((batch, 2 * u));
        state.slice_mut(ndarray::s![.., ..u]).assign(&c);
        state.slice_mut(ndarray::s![.., u..]).assign(&h);
        state
    }

    fn predict(&self, inputs: &ArrayView2<f32>) -> Array2<f32> {
        let steps = self.time_major_ids(inputs);
        let state = self.encode(&steps, inputs.nrows(), None);
        self.projection.forward(&state.view())
    }

    fn train_step(&mut self, inputs: &ArrayView2<f32>, targets: &ArrayView2<f32>) -> (Array2<f32>, f32) {
        let u = self.cell.units;
        let steps = self.time_major_ids(inputs);
        let mut cache = Vec::with_capacity(steps.len());
        let state = self.encode(&steps, inputs.nrows(), Some(&mut cache));
        let logits = self.projection.forward(&state.view());
        let loss = sigmoid_cross_entropy(&logits.view(), targets);

        let dlogits = sigmoid_cross_entropy_grad(&logits.view(), targets);
        let dstate = self.projection.backward(&state.view(), &dlogits);
        let mut dc = dstate.slice(ndarray::s![.., ..u]).to_owned();
        let mut dh = dstate.slice(ndarray::s![.., u..]).to_owned();
        for (ids, step) in steps.iter().zip(cache.iter()).rev() {
            let (dx, dc_prev, dh_prev) = self.cell.backward(step, &dc, &dh);
            for (row, &id) in dx.rows().into_iter().zip(ids) {
                let mut grad_row = self.embedding.grad.row_mut(id);
                grad_row += &row;
            }
            dc = dc_prev;
            dh = dh_prev;
        }
        (logits, loss)
    }

    fn params_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = vec![&mut self.embedding];
        params.extend(self.cell.params_mut());
        params.extend(self.projection.params_mut());
        params
    }

    fn params(&self) -> Vec<&Parameter> {
        let mut params = vec![&self.embedding];
        params.extend(self.cell.params());
        params.extend(self.projection.params());
        params
    }
}

#[derive(Debug, Clone)]
enum Body {
    FeedForward(FeedForward),
    Recurrent(Recurrent),
}

/// The trainable scoring function: input rows → one logit per DA label.
///
/// The output layer is linear; the sigmoid only appears inside the loss.
#[derive(Debug, Clone)]
pub(crate) struct Network {
    body: Body,
    optimizer: Adam,
}

impl Network {
    pub fn build(shape: NetworkShape, dims: &NetworkDims, alpha: f32, rng: &mut StdRng) -> Self {
        let body = match shape {
            NetworkShape::FeedForward { hidden_layers } => {
                Body::FeedForward(FeedForward::new("ff", hidden_layers, dims, rng))
            }
            NetworkShape::Recurrent => Body::Recurrent(Recurrent::new("rnn", dims, rng)),
        };
        Self {
            body,
            optimizer: Adam::new(alpha),
        }
    }

    /// Forward pass only.
    pub fn predict(&self, inputs: &ArrayView2<f32>) -> Array2<f32> {
        match &self.body {
            Body::FeedForward(ff) => ff.forward(inputs).pop().unwrap_or_default(),
            Body::Recurrent(rnn) => rnn.predict(inputs),
        }
    }

    /// One optimizer step on a batch; returns the logits computed before the update
    /// and the batch loss.
    pub fn train_step(&mut self, inputs: &ArrayView2<f32>, targets: &ArrayView2<f32>) -> (Array2<f32>, f32) {
        let result = match &mut self.body {
            Body::FeedForward(ff) => {
                let mut acts = ff.forward(inputs);
                let logits = acts.pop().unwrap_or_default();
                let loss = sigmoid_cross_entropy(&logits.view(), targets);
                ff.backward(&acts, sigmoid_cross_entropy_grad(&logits.view(), targets));
                (logits, loss)
            }
            Body::Recurrent(rnn) => rnn.train_step(inputs, targets),
        };
        let params = match &mut self.body {
            Body::FeedForward(ff) => ff.params_mut(),
            Body::Recurrent(rnn) => rnn.params_mut(),
        };
        self.optimizer.step(params);
        result
    }

    fn params(&self) -> Vec<&Parameter> {
        match &self.body {
            Body::FeedForward(ff) => ff.params(),
            Body::Recurrent(rnn) => rnn.params(),
        }
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            tensors: self
                .params()
                .into_iter()
                .map(|p| TensorSnapshot {
                    name: p.name.clone(),
                    shape: p.shape(),
                    data: p.value.iter().copied().collect(),
                })
                .collect(),
        }
    }

    /// Overwrites every parameter with the snapshot's values.
    ///
    /// # Errors
    /// - `Validation` if a tensor is missing from the snapshot or the snapshot has extra tensors
    /// - `ShapeMismatch` if a stored tensor's shape differs from the network's
    pub fn load_snapshot(&mut self, snapshot: &ParamSnapshot) -> Result<(), ClassifierError> {
        let params = match &mut self.body {
            Body::FeedForward(ff) => ff.params_mut(),
            Body::Recurrent(rnn) => rnn.params_mut(),
        };
        if params.len() != snapshot.tensors.len() {
            return Err(ClassifierError::Validation(format!(
                "Parameter snapshot has {} tensors, network has {}",
                snapshot.tensors.len(),
                params.len()
            )));
        }
        let mut updates = Vec::with_capacity(params.len());
        for param in params {
            let stored = snapshot
                .tensors
                .iter()
                .find(|t| t.name == param.name)
                .ok_or_else(|| {
                    ClassifierError::Validation(format!("Tensor '{}' missing from parameter snapshot", param.name))
                })?;
            let expected = param.shape();
            if stored.shape != expected || stored.data.len() != param.value.len() {
                return Err(ClassifierError::ShapeMismatch {
                    tensor: param.name.clone(),
                    expected,
                    found: stored.shape.clone(),
                });
            }
            updates.push((param, stored));
        }
        // all shapes checked before anything is overwritten
        for (param, stored) in updates {
            param
                .value
                .iter_mut()
                .zip(&stored.data)
                .for_each(|(w, &s)| *w = s);
        }
        Ok(())
    }
}
