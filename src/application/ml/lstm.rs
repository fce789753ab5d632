use super::predictor::{SequenceRegressor, TrainingHistory};
use crate::domain::errors::ModelError;
use crate::domain::ml::model_config::{CellActivation, ModelConfig, OptimizerKind};
use ndarray::{Array, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Dimension, Zip, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

const RMSPROP_RHO: f64 = 0.9;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Weights of one LSTM layer plus its dense output unit. Gate blocks are
/// stacked in the order input, forget, candidate, output.
#[derive(Debug, Clone)]
struct LstmWeights {
    /// Input weights (4H x D)
    w: Array2<f64>,
    /// Recurrent weights (4H x H)
    u: Array2<f64>,
    b: Array1<f64>,
    w_out: Array1<f64>,
    b_out: Array1<f64>,
}

impl LstmWeights {
    fn init(input_size: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / hidden as f64).sqrt();
        let mut uniform = |shape: (usize, usize)| {
            Array2::from_shape_fn(shape, |_| rng.random_range(-limit..limit))
        };
        let w = uniform((4 * hidden, input_size));
        let u = uniform((4 * hidden, hidden));
        let w_out = uniform((1, hidden)).row(0).to_owned();

        let mut b = Array1::zeros(4 * hidden);
        // Forget gate starts open
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);

        Self {
            w,
            u,
            b,
            w_out,
            b_out: Array1::zeros(1),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
            w_out: Array1::zeros(self.w_out.raw_dim()),
            b_out: Array1::zeros(1),
        }
    }

    fn hidden(&self) -> usize {
        self.u.ncols()
    }

    fn input_size(&self) -> usize {
        self.w.ncols()
    }

    fn squared_norm(&self) -> f64 {
        let sq = |a: f64, x: &f64| a + x * x;
        self.w.fold(0.0, sq)
            + self.u.fold(0.0, sq)
            + self.b.fold(0.0, sq)
            + self.w_out.fold(0.0, sq)
            + self.b_out.fold(0.0, sq)
    }

    fn scale(&mut self, k: f64) {
        self.w.mapv_inplace(|x| x * k);
        self.u.mapv_inplace(|x| x * k);
        self.b.mapv_inplace(|x| x * k);
        self.w_out.mapv_inplace(|x| x * k);
        self.b_out.mapv_inplace(|x| x * k);
    }

    fn apply(&mut self, grads: &Self, state: &mut OptimizerState, rule: &UpdateRule) {
        update_tensor(&mut self.w, &grads.w, &mut state.first.w, &mut state.second.w, rule);
        update_tensor(&mut self.u, &grads.u, &mut state.first.u, &mut state.second.u, rule);
        update_tensor(&mut self.b, &grads.b, &mut state.first.b, &mut state.second.b, rule);
        update_tensor(
            &mut self.w_out,
            &grads.w_out,
            &mut state.first.w_out,
            &mut state.second.w_out,
            rule,
        );
        update_tensor(
            &mut self.b_out,
            &grads.b_out,
            &mut state.first.b_out,
            &mut state.second.b_out,
            rule,
        );
    }
}

/// Running moments. RMSprop only uses `second`.
struct OptimizerState {
    first: LstmWeights,
    second: LstmWeights,
    step: i32,
}

struct UpdateRule {
    kind: OptimizerKind,
    learning_rate: f64,
    step: i32,
}

fn update_tensor<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    first: &mut Array<f64, D>,
    second: &mut Array<f64, D>,
    rule: &UpdateRule,
) {
    let lr = rule.learning_rate;
    match rule.kind {
        OptimizerKind::RmsProp => {
            Zip::from(param).and(grad).and(second).for_each(|p, &g, v| {
                *v = RMSPROP_RHO * *v + (1.0 - RMSPROP_RHO) * g * g;
                *p -= lr * g / (v.sqrt() + EPSILON);
            });
        }
        OptimizerKind::Adam => {
            let bias1 = 1.0 - ADAM_BETA1.powi(rule.step);
            let bias2 = 1.0 - ADAM_BETA2.powi(rule.step);
            Zip::from(param)
                .and(grad)
                .and(first)
                .and(second)
                .for_each(|p, &g, m, v| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
                });
        }
    }
}

/// Activations of one time step, kept for backpropagation
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    act_c: Array1<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}

/// Single-layer LSTM regressor with one dense output unit.
///
/// The recurrence runs over axis 1 of the input tensor and axis 2 is the
/// per-step input vector, so `(examples, features, steps)` windows are read
/// as `features` steps of `steps`-wide inputs.
pub struct LstmRegressor {
    config: ModelConfig,
    weights: Option<LstmWeights>,
}

impl LstmRegressor {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            weights: None,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }

    fn forward(
        weights: &LstmWeights,
        activation: CellActivation,
        sequence: ArrayView2<'_, f64>,
        cache: Option<&mut Vec<StepCache>>,
    ) -> Array1<f64> {
        let hidden = weights.hidden();
        let mut h = Array1::<f64>::zeros(hidden);
        let mut c = Array1::<f64>::zeros(hidden);
        let mut cache = cache;

        for x_t in sequence.outer_iter() {
            let z = weights.w.dot(&x_t) + weights.u.dot(&h) + &weights.b;
            let i = z.slice(s![0..hidden]).mapv(sigmoid);
            let f = z.slice(s![hidden..2 * hidden]).mapv(sigmoid);
            let g = z
                .slice(s![2 * hidden..3 * hidden])
                .mapv(|v| activation.apply(v));
            let o = z.slice(s![3 * hidden..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let act_c = c_next.mapv(|v| activation.apply(v));
            let h_next = &o * &act_c;

            if let Some(steps) = cache.as_deref_mut() {
                steps.push(StepCache {
                    x: x_t.to_owned(),
                    h_prev: h,
                    c_prev: c,
                    i,
                    f,
                    g,
                    o,
                    act_c,
                });
            }

            h = h_next;
            c = c_next;
        }

        h
    }

    fn output(weights: &LstmWeights, hidden: ArrayView1<'_, f64>) -> f64 {
        weights.w_out.dot(&hidden) + weights.b_out[0]
    }

    /// Accumulates the gradient of one example into `grads`. `d_out` is the
    /// loss gradient w.r.t. the output, `mask` the (scaled) dropout mask.
    fn backward(
        weights: &LstmWeights,
        activation: CellActivation,
        steps: &[StepCache],
        h_last: &Array1<f64>,
        mask: &Array1<f64>,
        d_out: f64,
        grads: &mut LstmWeights,
    ) {
        let hidden = weights.hidden();
        let dropped = h_last * mask;
        grads.w_out.scaled_add(d_out, &dropped);
        grads.b_out[0] += d_out;

        let mut dh = &weights.w_out * mask * d_out;
        let mut dc_next = Array1::<f64>::zeros(hidden);
        let mut dz = Array1::<f64>::zeros(4 * hidden);

        for step in steps.iter().rev() {
            let d_act_c = step.act_c.mapv(|y| activation.derivative_from_output(y));
            let d_o = &dh * &step.act_c;
            let dc = &dc_next + &(&dh * &step.o * &d_act_c);

            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            dc_next = &dc * &step.f;

            dz.slice_mut(s![0..hidden])
                .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![hidden..2 * hidden])
                .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * hidden..3 * hidden])
                .assign(&(&d_g * &step.g.mapv(|y| activation.derivative_from_output(y))));
            dz.slice_mut(s![3 * hidden..])
                .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.w += &outer(&dz, &step.x);
            grads.u += &outer(&dz, &step.h_prev);
            grads.b += &dz;

            dh = weights.u.t().dot(&dz);
        }
    }

    fn check_input(&self, x: &Array3<f64>, input_size: usize) -> Result<(), ModelError> {
        if x.shape()[2] != input_size {
            return Err(ModelError::ShapeMismatch {
                expected: format!("(_, _, {})", input_size),
                actual: format!("{:?}", x.shape()),
            });
        }
        Ok(())
    }

    fn mean_loss(&self, x: &Array3<f64>, y: &Array1<f64>) -> Result<f64, ModelError> {
        let predictions = self.predict(x)?;
        if predictions.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| self.config.loss.value(p - t))
            .sum();
        Ok(total / predictions.len() as f64)
    }
}

impl SequenceRegressor for LstmRegressor {
    fn fit(
        &mut self,
        x_train: &Array3<f64>,
        y_train: &Array1<f64>,
        validation: Option<(&Array3<f64>, &Array1<f64>)>,
    ) -> Result<TrainingHistory, ModelError> {
        self.config
            .validate()
            .map_err(|reason| ModelError::InvalidConfig { reason })?;

        let n = x_train.shape()[0];
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if y_train.len() != n {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} labels", n),
                actual: y_train.len().to_string(),
            });
        }

        let cfg = self.config.clone();
        let input_size = x_train.shape()[2];
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut weights = LstmWeights::init(input_size, cfg.units, &mut rng);
        let mut state = OptimizerState {
            first: weights.zeros_like(),
            second: weights.zeros_like(),
            step: 0,
        };
        let keep = 1.0 - cfg.dropout;
        let log_every = (cfg.epochs / 10).max(1);

        info!(
            "LstmRegressor: fitting {} examples ({} steps x {} inputs), units={}, epochs={}, batch={}",
            n,
            x_train.shape()[1],
            input_size,
            cfg.units,
            cfg.epochs,
            cfg.batch_size
        );

        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..n).collect();

        for epoch in 0..cfg.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(cfg.batch_size) {
                let mut grads = weights.zeros_like();
                let scale = 1.0 / batch.len() as f64;

                for &idx in batch {
                    let mut steps = Vec::with_capacity(x_train.shape()[1]);
                    let h_last = Self::forward(
                        &weights,
                        cfg.activation,
                        x_train.index_axis(Axis(0), idx),
                        Some(&mut steps),
                    );

                    let mask = Array1::from_shape_fn(h_last.len(), |_| {
                        if cfg.dropout == 0.0 || rng.random::<f64>() < keep {
                            1.0 / keep
                        } else {
                            0.0
                        }
                    });

                    let prediction = Self::output(&weights, (&h_last * &mask).view());
                    let error = prediction - y_train[idx];
                    epoch_loss += cfg.loss.value(error);

                    Self::backward(
                        &weights,
                        cfg.activation,
                        &steps,
                        &h_last,
                        &mask,
                        cfg.loss.gradient(error) * scale,
                        &mut grads,
                    );
                }

                if let Some(clip) = cfg.gradient_clip {
                    let norm = grads.squared_norm().sqrt();
                    if norm > clip {
                        grads.scale(clip / norm);
                    }
                }

                state.step += 1;
                let rule = UpdateRule {
                    kind: cfg.optimizer,
                    learning_rate: cfg.learning_rate,
                    step: state.step,
                };
                weights.apply(&grads, &mut state, &rule);
            }

            history.train_loss.push(epoch_loss / n as f64);
            self.weights = Some(weights.clone());

            if let Some((x_val, y_val)) = validation {
                history.val_loss.push(self.mean_loss(x_val, y_val)?);
            }

            debug!(
                "LstmRegressor: epoch {}/{} loss={:.6} val_loss={:?}",
                epoch + 1,
                cfg.epochs,
                history.train_loss[epoch],
                history.val_loss.last()
            );
            if (epoch + 1) % log_every == 0 || epoch + 1 == cfg.epochs {
                info!(
                    "LstmRegressor: epoch {}/{} loss={:.6}{}",
                    epoch + 1,
                    cfg.epochs,
                    history.train_loss[epoch],
                    history
                        .val_loss
                        .last()
                        .map(|v| format!(" val_loss={:.6}", v))
                        .unwrap_or_default()
                );
            }
        }

        self.weights = Some(weights);
        Ok(history)
    }

    fn predict(&self, x: &Array3<f64>) -> Result<Array1<f64>, ModelError> {
        let weights = self.weights.as_ref().ok_or_else(|| ModelError::NotFitted {
            model: self.name().to_string(),
        })?;
        self.check_input(x, weights.input_size())?;

        let outputs = x
            .outer_iter()
            .map(|sequence| {
                let h = Self::forward(weights, self.config.activation, sequence, None);
                Self::output(weights, h.view())
            })
            .collect::<Vec<_>>();
        Ok(Array1::from(outputs))
    }

    fn name(&self) -> &str {
        "LSTM"
    }
}
