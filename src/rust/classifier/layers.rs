//! Trainable building blocks: parameter tensors, the Adam optimizer, dense layers and
//! an LSTM cell, all on `ndarray` with gradients derived by hand.

use ndarray::{s, Array2, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use super::utils::sigmoid;

/// A named weight matrix with its accumulated gradient and Adam moments.
#[derive(Debug, Clone)]
pub(crate) struct Parameter {
    pub name: String,
    pub value: Array2<f32>,
    pub grad: Array2<f32>,
    m: Array2<f32>,
    v: Array2<f32>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Array2<f32>) -> Self {
        let dim = value.raw_dim();
        Self {
            name: name.into(),
            grad: Array2::zeros(dim.clone()),
            m: Array2::zeros(dim.clone()),
            v: Array2::zeros(dim),
            value,
        }
    }

    pub fn zeros(name: impl Into<String>, shape: (usize, usize)) -> Self {
        Self::new(name, Array2::zeros(shape))
    }

    /// Weights drawn from N(0, stddev²).
    pub fn normal(name: impl Into<String>, shape: (usize, usize), stddev: f32, rng: &mut StdRng) -> Self {
        let value = Array2::from_shape_fn(shape, |_| rng.sample::<f32, _>(StandardNormal) * stddev);
        Self::new(name, value)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value.shape().to_vec()
    }
}

/// Adam with bias-corrected step size; one call to [`Adam::step`] per batch.
#[derive(Debug, Clone)]
pub(crate) struct Adam {
    alpha: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: i32,
}

impl Adam {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
        }
    }

    /// Applies the accumulated gradients and clears them.
    pub fn step(&mut self, params: Vec<&mut Parameter>) {
        self.t = self.t.saturating_add(1);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let lr = self.alpha * (1.0 - b2.powi(self.t)).sqrt() / (1.0 - b1.powi(self.t));

        for p in params {
            Zip::from(&mut p.value)
                .and(&mut p.m)
                .and(&mut p.v)
                .and(&p.grad)
                .for_each(|w, m, v, &g| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    *w -= lr * *m / (v.sqrt() + eps);
                });
            p.grad.fill(0.0);
        }
    }
}

/// Fully connected layer `y = x·W + b`.
#[derive(Debug, Clone)]
pub(crate) struct Dense {
    pub w: Parameter,
    pub b: Parameter,
}

impl Dense {
    pub fn new(name: &str, inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        Self {
            w: Parameter::normal(format!("{}-w", name), (inputs, outputs), 0.1, rng),
            b: Parameter::zeros(format!("{}-b", name), (1, outputs)),
        }
    }

    pub fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.w.value) + &self.b.value
    }

    /// Accumulates parameter gradients for output gradient `dy` and returns the input gradient.
    pub fn backward(&mut self, x: &ArrayView2<f32>, dy: &Array2<f32>) -> Array2<f32> {
        self.w.grad += &x.t().dot(dy);
        self.b.grad += &dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        dy.dot(&self.w.value.t())
    }

    pub fn params_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.w, &mut self.b]
    }

    pub fn params(&self) -> Vec<&Parameter> {
        vec![&self.w, &self.b]
    }
}

const FORGET_BIAS: f32 = 1.0;

/// Values from one LSTM step needed by backpropagation through time.
#[derive(Debug)]
pub(crate) struct LstmStep {
    z: Array2<f32>,
    i: Array2<f32>,
    j: Array2<f32>,
    f: Array2<f32>,
    o: Array2<f32>,
    c_prev: Array2<f32>,
    tanh_c: Array2<f32>,
}

/// Basic LSTM cell: gates `i, j, f, o` from `[x, h]·W + b`, a constant bias of 1 on
/// the forget gate, no peepholes.
#[derive(Debug, Clone)]
pub(crate) struct LstmCell {
    pub units: usize,
    pub input_size: usize,
    pub w: Parameter,
    pub b: Parameter,
}

impl LstmCell {
    pub fn new(name: &str, input_size: usize, units: usize, rng: &mut StdRng) -> Self {
        Self {
            units,
            input_size,
            w: Parameter::normal(format!("{}-w", name), (input_size + units, 4 * units), 0.1, rng),
            b: Parameter::zeros(format!("{}-b", name), (1, 4 * units)),
        }
    }

    /// One step; returns the new `(c, h)` and the values backpropagation needs.
    pub fn step(&self, x: &ArrayView2<f32>, c: &Array2<f32>, h: &Array2<f32>) -> (Array2<f32>, Array2<f32>, LstmStep) {
        let u = self.units;
        let e = self.input_size;
        let mut z = Array2::zeros((x.nrows(), e + u));
        z.slice_mut(s![.., ..e]).assign(x);
        z.slice_mut(s![.., e..]).assign(h);

        let a = z.dot(&self.w.value) + &self.b.value;
        let i = a.slice(s![.., ..u]).mapv(sigmoid);
        let j = a.slice(s![.., u..2 * u]).mapv(f32::tanh);
        let f = a.slice(s![.., 2 * u..3 * u]).mapv(|v| sigmoid(v + FORGET_BIAS));
        let o = a.slice(s![.., 3 * u..]).mapv(sigmoid);

        let new_c = &f * c + &i * &j;
        let tanh_c = new_c.mapv(f32::tanh);
        let new_h = &tanh_c * &o;

        let cache = LstmStep {
            z,
            i,
            j,
            f,
            o,
            c_prev: c.clone(),
            tanh_c,
        };
        (new_c, new_h, cache)
    }

    /// Backpropagates one step. Takes the gradients flowing into the step's outputs
    /// `(dc, dh)` and returns `(dx, dc_prev, dh_prev)`.
    pub fn backward(
        &mut self,
        step: &LstmStep,
        dc: &Array2<f32>,
        dh: &Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>, Array2<f32>) {
        let u = self.units;
        let e = self.input_size;

        let d_o = dh * &step.tanh_c;
        let dc = dc + &(dh * &step.o * &step.tanh_c.mapv(|t| 1.0 - t * t));
        let di = &dc * &step.j;
        let dj = &dc * &step.i;
        let df = &dc * &step.c_prev;
        let dc_prev = &dc * &step.f;

        let mut da = Array2::zeros((dh.nrows(), 4 * u));
        da.slice_mut(s![.., ..u]).assign(&(di * &step.i.mapv(|g| g * (1.0 - g))));
        da.slice_mut(s![.., u..2 * u]).assign(&(dj * &step.j.mapv(|g| 1.0 - g * g)));
        da.slice_mut(s![.., 2 * u..3 * u]).assign(&(df * &step.f.mapv(|g| g * (1.0 - g))));
        da.slice_mut(s![.., 3 * u..]).assign(&(d_o * &step.o.mapv(|g| g * (1.0 - g))));

        self.w.grad += &step.z.t().dot(&da);
        self.b.grad += &da.sum_axis(Axis(0)).insert_axis(Axis(0));

        let dz = da.dot(&self.w.value.t());
        let dx = dz.slice(s![.., ..e]).to_owned();
        let dh_prev = dz.slice(s![.., e..]).to_owned();
        (dx, dc_prev, dh_prev)
    }

    pub fn params_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.w, &mut self.b]
    }

    pub fn params(&self) -> Vec<&Parameter> {
        vec![&self.w, &self.b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_dense_backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Dense::new("t", 3, 2, &mut rng);
        let x = array![[0.5f32, -1.0, 2.0]];
        // loss = sum(y)
        let dy = Array2::ones((1, 2));
        layer.backward(&x.view(), &dy);

        let eps = 1e-3;
        let base: f32 = layer.forward(&x.view()).sum();
        let mut bumped = layer.clone();
        bumped.w.value[[2, 1]] += eps;
        let numeric = (bumped.forward(&x.view()).sum() - base) / eps;
        assert!((numeric - layer.w.grad[[2, 1]]).abs() < 1e-2);
        assert_eq!(layer.b.grad, array![[1.0f32, 1.0]]);
    }

    #[test]
    fn test_lstm_backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cell = LstmCell::new("cell", 2, 3, &mut rng);
        let x = array![[0.3f32, -0.7]];
        let c0 = array![[0.1f32, -0.2, 0.05]];
        let h0 = array![[0.0f32, 0.4, -0.1]];

        // loss = sum(c) + sum(h)
        let loss = |cell: &LstmCell| {
            let (c, h, _) = cell.step(&x.view(), &c0, &h0);
            c.sum() + h.sum()
        };
        let (_, _, cache) = cell.step(&x.view(), &c0, &h0);
        let ones = Array2::ones((1, 3));
        let (dx, _, _) = cell.backward(&cache, &ones, &ones);

        let eps = 1e-3;
        for (r, col) in [(0, 0), (1, 5), (4, 11)] {
            let mut bumped = cell.clone();
            bumped.w.value[[r, col]] += eps;
            let numeric = (loss(&bumped) - loss(&cell)) / eps;
            assert!(
                (numeric - cell.w.grad[[r, col]]).abs() < 1e-2,
                "w[{},{}]: numeric {} analytic {}",
                r,
                col,
                numeric,
                cell.w.grad[[r, col]]
            );
        }
        assert_eq!(dx.shape(), &[1, 2]);
    }

    #[test]
    fn test_adam_moves_against_gradient_and_clears_it() {
        let mut p = Parameter::zeros("p", (1, 2));
        p.grad = array![[1.0f32, -1.0]];
        let mut adam = Adam::new(0.1);
        adam.step(vec![&mut p]);
        assert!(p.value[[0, 0]] < 0.0);
        assert!(p.value[[0, 1]] > 0.0);
        assert!((p.value[[0, 0]] + 0.1).abs() < 1e-4);
        assert_eq!(p.grad.sum(), 0.0);
    }
}
