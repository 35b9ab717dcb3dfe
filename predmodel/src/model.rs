use tch::{kind::Kind, nn, nn::Module, nn::OptimizerConfig, Device, Tensor};

use crate::types::{Record, N_FEATURES};

/// Hyper-parameters for one on-the-fly fit.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub sequence_length: usize,
    pub hidden_size: i64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            sequence_length: 10,
            hidden_size: 50,
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("Not enough data to train the model. Minimum data points required: {required}")]
    NotEnoughData { required: usize },
    #[error("window length mismatch: got {got}, expected {expected}")]
    WindowLength { got: usize, expected: usize },
    #[error("model produced a non-finite prediction")]
    NonFinite,
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

/// Per-feature standardisation fitted on the submitted records.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: [f64; N_FEATURES],
    std: [f64; N_FEATURES],
}

impl Scaler {
    pub fn fit(records: &[Record]) -> Self {
        let n = records.len().max(1) as f64;
        let mut mean = [0.0; N_FEATURES];
        for r in records {
            for (m, x) in mean.iter_mut().zip(r.to_array()) {
                *m += x / n;
            }
        }
        let mut std = [0.0; N_FEATURES];
        for r in records {
            for (j, x) in r.to_array().into_iter().enumerate() {
                std[j] += (x - mean[j]).powi(2) / n;
            }
        }
        for s in std.iter_mut() {
            *s = s.sqrt();
            // constant column: leave it centred but unscaled
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        Self { mean, std }
    }

    pub fn transform(&self, r: &Record) -> [f32; N_FEATURES] {
        let v = r.to_array();
        let mut out = [0.0f32; N_FEATURES];
        for j in 0..N_FEATURES {
            out[j] = ((v[j] - self.mean[j]) / self.std[j]) as f32;
        }
        out
    }

    pub fn inverse(&self, v: [f64; N_FEATURES]) -> Record {
        let mut out = [0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            out[j] = v[j] * self.std[j] + self.mean[j];
        }
        Record::from_array(out)
    }

    pub fn mean(&self) -> [f64; N_FEATURES] {
        self.mean
    }
}

/// Flattened training pairs: every `seq_len` window and the row right after it.
///
/// Returns `(inputs, targets, n_windows)`; inputs are laid out
/// `[n_windows, seq_len, N_FEATURES]`, targets `[n_windows, N_FEATURES]`.
pub fn build_windows(rows: &[[f32; N_FEATURES]], seq_len: usize) -> (Vec<f32>, Vec<f32>, usize) {
    let n_windows = rows.len().saturating_sub(seq_len);
    let mut xs = Vec::with_capacity(n_windows * seq_len * N_FEATURES);
    let mut ys = Vec::with_capacity(n_windows * N_FEATURES);
    for i in 0..n_windows {
        for row in &rows[i..i + seq_len] {
            xs.extend_from_slice(row);
        }
        ys.extend_from_slice(&rows[i + seq_len]);
    }
    (xs, ys, n_windows)
}

/// LSTM layer with ReLU candidate/output activations.
#[derive(Debug)]
struct ReluLstm {
    w_ih: Tensor,
    w_hh: Tensor,
    bias: Tensor,
    hidden: i64,
}

impl ReluLstm {
    fn new(p: nn::Path, in_dim: i64, hidden: i64) -> Self {
        let k = 1.0 / (hidden as f64).sqrt();
        let init = nn::Init::Uniform { lo: -k, up: k };
        let w_ih = p.var("weight_ih", &[4 * hidden, in_dim], init);
        let w_hh = p.var("weight_hh", &[4 * hidden, hidden], init);
        // gate order i, f, g, o; forget gate starts open
        let opts = (Kind::Float, p.device());
        let b0 = Tensor::cat(
            &[
                Tensor::zeros([hidden], opts),
                Tensor::ones([hidden], opts),
                Tensor::zeros([2 * hidden], opts),
            ],
            0,
        );
        let bias = p.var_copy("bias", &b0);
        Self { w_ih, w_hh, bias, hidden }
    }

    /// `xs`: `[batch, steps, in_dim]` -> final hidden state `[batch, hidden]`.
    fn forward(&self, xs: &Tensor) -> Tensor {
        let size = xs.size();
        let (batch, steps) = (size[0], size[1]);
        let mut h = Tensor::zeros([batch, self.hidden], (Kind::Float, xs.device()));
        let mut c = h.zeros_like();
        for t in 0..steps {
            let x_t = xs.select(1, t);
            let gates = x_t.matmul(&self.w_ih.tr()) + h.matmul(&self.w_hh.tr()) + &self.bias;
            let g = gates.chunk(4, 1);
            let input = g[0].sigmoid();
            let forget = g[1].sigmoid();
            let cand = g[2].relu();
            let output = g[3].sigmoid();
            c = forget * &c + input * cand;
            h = output * c.relu();
        }
        h
    }
}

/// Sequence-to-next-step regressor, trained from scratch for one request.
pub struct SequenceModel {
    _vs: nn::VarStore,
    lstm: ReluLstm,
    head: nn::Linear,
    scaler: Scaler,
    seq_len: usize,
    device: Device,
}

impl SequenceModel {
    fn forward(&self, xs: &Tensor) -> Tensor {
        self.head.forward(&self.lstm.forward(xs))
    }

    /// Fit a fresh model on every window of `records` paired with its successor.
    pub fn train(records: &[Record], cfg: &TrainConfig) -> Result<Self, TrainError> {
        let seq_len = cfg.sequence_length;
        if records.len() <= seq_len {
            return Err(TrainError::NotEnoughData { required: seq_len });
        }

        let device = Device::Cpu;
        let scaler = Scaler::fit(records);
        let rows: Vec<[f32; N_FEATURES]> = records.iter().map(|r| scaler.transform(r)).collect();
        let (x_flat, y_flat, n_windows) = build_windows(&rows, seq_len);
        tracing::debug!(
            rows = records.len(),
            windows = n_windows,
            mean = ?scaler.mean(),
            "fitting sequence model"
        );

        let n = n_windows as i64;
        let xs = Tensor::from_slice(&x_flat)
            .reshape([n, seq_len as i64, N_FEATURES as i64])
            .to_device(device);
        let ys = Tensor::from_slice(&y_flat)
            .reshape([n, N_FEATURES as i64])
            .to_device(device);

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let lstm = ReluLstm::new(&root / "lstm", N_FEATURES as i64, cfg.hidden_size);
        let head = nn::linear(&root / "dense", cfg.hidden_size, N_FEATURES as i64, Default::default());
        let mut opt = nn::Adam::default().build(&vs, cfg.learning_rate)?;

        let model = Self {
            _vs: vs,
            lstm,
            head,
            scaler,
            seq_len,
            device,
        };

        let batch = cfg.batch_size.max(1) as i64;
        let mut last_loss = f64::NAN;
        for _epoch in 0..cfg.epochs {
            let perm = Tensor::randperm(n, (Kind::Int64, device));
            let mut start = 0;
            while start < n {
                let len = batch.min(n - start);
                let idx = perm.narrow(0, start, len);
                let xb = xs.index_select(0, &idx);
                let yb = ys.index_select(0, &idx);
                let loss = model.forward(&xb).mse_loss(&yb, tch::Reduction::Mean);
                opt.backward_step(&loss);
                last_loss = loss.double_value(&[]);
                start += len;
            }
        }
        tracing::info!(windows = n_windows, epochs = cfg.epochs, loss = last_loss, "training done");

        Ok(model)
    }

    /// Predict the record following `window` (must be exactly `seq_len` long).
    pub fn predict_next(&self, window: &[Record]) -> Result<Record, TrainError> {
        if window.len() != self.seq_len {
            return Err(TrainError::WindowLength {
                got: window.len(),
                expected: self.seq_len,
            });
        }
        let flat: Vec<f32> = window
            .iter()
            .flat_map(|r| self.scaler.transform(r))
            .collect();
        let input = Tensor::from_slice(&flat)
            .reshape([1, self.seq_len as i64, N_FEATURES as i64])
            .to_device(self.device);

        let out = tch::no_grad(|| self.forward(&input));
        let mut scaled = [0.0; N_FEATURES];
        for (j, v) in scaled.iter_mut().enumerate() {
            *v = out.double_value(&[0, j as i64]);
        }
        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(TrainError::NonFinite);
        }
        Ok(self.scaler.inverse(scaled))
    }
}

/// Train on `records` and forecast the record after the last window.
pub fn forecast_next(records: &[Record], cfg: &TrainConfig) -> Result<Record, TrainError> {
    let model = SequenceModel::train(records, cfg)?;
    let tail = &records[records.len() - cfg.sequence_length..];
    model.predict_next(tail)
}
