use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> f64 {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    rng.gen_range(-limit..limit)
}

/// Cached per-timestep state from a forward pass, kept for backpropagation
/// through time. `gates` holds the activated input, forget, candidate, and
/// output gates as four consecutive blocks of `hidden_size`.
struct LstmStep {
    z: Vec<f64>,
    gates: Vec<f64>,
    c_prev: Vec<f64>,
    tanh_c: Vec<f64>,
    h: Vec<f64>,
}

/// A single recurrent layer. The four gate weight matrices are stored as one
/// `(4 * hidden) x (input + hidden)` matrix applied to the concatenation of
/// the timestep input and the previous hidden state.
struct LstmLayer {
    input_size: usize,
    hidden_size: usize,
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl LstmLayer {
    fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let cols = input_size + hidden_size;
        let weights = (0..4 * hidden_size)
            .map(|_| (0..cols).map(|_| glorot_uniform(rng, cols, hidden_size)).collect())
            .collect();

        // forget gates open at the start so early training can carry state
        let mut biases = vec![0.0; 4 * hidden_size];
        for u in 0..hidden_size {
            biases[hidden_size + u] = 1.0;
        }

        LstmLayer {
            input_size,
            hidden_size,
            weights,
            biases,
        }
    }

    fn forward(&self, inputs: &[Vec<f64>]) -> Vec<LstmStep> {
        let hidden = self.hidden_size;
        let mut h = vec![0.0; hidden];
        let mut c = vec![0.0; hidden];
        let mut steps = Vec::with_capacity(inputs.len());

        for input in inputs {
            let mut z = Vec::with_capacity(self.input_size + hidden);
            z.extend_from_slice(input);
            z.extend_from_slice(&h);

            let mut pre = self.biases.clone();
            for (row, pre_r) in self.weights.iter().zip(pre.iter_mut()) {
                for (w, zv) in row.iter().zip(z.iter()) {
                    *pre_r += w * zv;
                }
            }

            let mut gates = vec![0.0; 4 * hidden];
            for u in 0..hidden {
                gates[u] = sigmoid(pre[u]);
                gates[hidden + u] = sigmoid(pre[hidden + u]);
                gates[2 * hidden + u] = pre[2 * hidden + u].tanh();
                gates[3 * hidden + u] = sigmoid(pre[3 * hidden + u]);
            }

            let c_prev = c.clone();
            let mut tanh_c = vec![0.0; hidden];
            for u in 0..hidden {
                c[u] = gates[hidden + u] * c_prev[u] + gates[u] * gates[2 * hidden + u];
                tanh_c[u] = c[u].tanh();
                h[u] = gates[3 * hidden + u] * tanh_c[u];
            }

            steps.push(LstmStep {
                z,
                gates,
                c_prev,
                tanh_c,
                h: h.clone(),
            });
        }

        steps
    }

    /// Backpropagation through time. `d_hidden` carries the loss gradient on
    /// each timestep's hidden output; returns the gradient on each timestep's
    /// input while accumulating parameter gradients into `grads`.
    fn backward(
        &self,
        steps: &[LstmStep],
        d_hidden: &[Vec<f64>],
        grads: &mut ParamGrads,
    ) -> Vec<Vec<f64>> {
        let hidden = self.hidden_size;
        let mut d_inputs = vec![vec![0.0; self.input_size]; steps.len()];
        let mut dh_carry = vec![0.0; hidden];
        let mut dc_carry = vec![0.0; hidden];

        for t in (0..steps.len()).rev() {
            let step = &steps[t];
            let mut dpre = vec![0.0; 4 * hidden];

            for u in 0..hidden {
                let dh = d_hidden[t][u] + dh_carry[u];
                let i = step.gates[u];
                let f = step.gates[hidden + u];
                let g = step.gates[2 * hidden + u];
                let o = step.gates[3 * hidden + u];

                let dc = dc_carry[u] + dh * o * (1.0 - step.tanh_c[u] * step.tanh_c[u]);

                dpre[u] = dc * g * i * (1.0 - i);
                dpre[hidden + u] = dc * step.c_prev[u] * f * (1.0 - f);
                dpre[2 * hidden + u] = dc * i * (1.0 - g * g);
                dpre[3 * hidden + u] = dh * step.tanh_c[u] * o * (1.0 - o);

                dc_carry[u] = dc * f;
            }

            let mut dz = vec![0.0; self.input_size + hidden];
            for r in 0..4 * hidden {
                let dp = dpre[r];
                grads.biases[r] += dp;

                let row = &self.weights[r];
                let grad_row = &mut grads.weights[r];
                for col in 0..row.len() {
                    grad_row[col] += dp * step.z[col];
                    dz[col] += dp * row[col];
                }
            }

            d_inputs[t].copy_from_slice(&dz[..self.input_size]);
            dh_carry.copy_from_slice(&dz[self.input_size..]);
        }

        d_inputs
    }
}

struct DenseLayer {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl DenseLayer {
    fn new(input_size: usize, output_size: usize, rng: &mut StdRng) -> Self {
        let weights = (0..output_size)
            .map(|_| {
                (0..input_size)
                    .map(|_| glorot_uniform(rng, input_size, output_size))
                    .collect()
            })
            .collect();

        DenseLayer {
            weights,
            biases: vec![0.0; output_size],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(row, bias)| {
                row.iter().zip(input.iter()).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect()
    }

    fn backward(&self, input: &[f64], d_output: &[f64], grads: &mut ParamGrads) -> Vec<f64> {
        let mut d_input = vec![0.0; input.len()];

        for (r, dy) in d_output.iter().enumerate() {
            grads.biases[r] += dy;

            let row = &self.weights[r];
            let grad_row = &mut grads.weights[r];
            for col in 0..row.len() {
                grad_row[col] += dy * input[col];
                d_input[col] += dy * row[col];
            }
        }

        d_input
    }
}

struct ParamGrads {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl ParamGrads {
    fn zeros(rows: usize, cols: usize) -> Self {
        ParamGrads {
            weights: vec![vec![0.0; cols]; rows],
            biases: vec![0.0; rows],
        }
    }

    fn scale(&mut self, factor: f64) {
        for row in self.weights.iter_mut() {
            for value in row.iter_mut() {
                *value *= factor;
            }
        }
        for value in self.biases.iter_mut() {
            *value *= factor;
        }
    }
}

/// Adam first and second moment estimates for one parameter block
struct AdamState {
    m_weights: Vec<Vec<f64>>,
    v_weights: Vec<Vec<f64>>,
    m_biases: Vec<f64>,
    v_biases: Vec<f64>,
}

impl AdamState {
    fn zeros(rows: usize, cols: usize) -> Self {
        AdamState {
            m_weights: vec![vec![0.0; cols]; rows],
            v_weights: vec![vec![0.0; cols]; rows],
            m_biases: vec![0.0; rows],
            v_biases: vec![0.0; rows],
        }
    }

    fn apply(
        &mut self,
        weights: &mut [Vec<f64>],
        biases: &mut [f64],
        grads: &ParamGrads,
        learning_rate: f64,
        step: i32,
    ) {
        let correction1 = 1.0 - ADAM_BETA1.powi(step);
        let correction2 = 1.0 - ADAM_BETA2.powi(step);

        for r in 0..weights.len() {
            for c in 0..weights[r].len() {
                let g = grads.weights[r][c];
                let m = &mut self.m_weights[r][c];
                let v = &mut self.v_weights[r][c];

                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;

                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                weights[r][c] -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
            }

            let g = grads.biases[r];
            let m = &mut self.m_biases[r];
            let v = &mut self.v_biases[r];

            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;

            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            biases[r] -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        }
    }
}

pub(crate) struct FitSummary {
    pub best_val_mae: f64,
}

/// Two stacked recurrent layers with inverted dropout between them, followed
/// by a dense projection from the final hidden state to the forecast horizon.
pub(crate) struct SequenceNetwork {
    layer1: LstmLayer,
    layer2: LstmLayer,
    dense: DenseLayer,
    dropout: f64,
}

impl SequenceNetwork {
    pub(crate) fn new(
        first_units: usize,
        second_units: usize,
        horizon: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Self {
        SequenceNetwork {
            layer1: LstmLayer::new(1, first_units, rng),
            layer2: LstmLayer::new(first_units, second_units, rng),
            dense: DenseLayer::new(second_units, horizon, rng),
            dropout,
        }
    }

    /// Inference pass over one scaled input window, dropout disabled
    pub(crate) fn forward(&self, window: &[f64]) -> Vec<f64> {
        let inputs: Vec<Vec<f64>> = window.iter().map(|v| vec![*v]).collect();
        let steps1 = self.layer1.forward(&inputs);
        let hidden: Vec<Vec<f64>> = steps1.into_iter().map(|step| step.h).collect();
        let steps2 = self.layer2.forward(&hidden);

        let last_hidden = match steps2.last() {
            Some(step) => step.h.clone(),
            None => vec![0.0; self.layer2.hidden_size],
        };

        self.dense.forward(&last_hidden)
    }

    /// Mini-batch Adam on mean-squared error. The validation set only scores
    /// epochs; weights never update from it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn fit(
        &mut self,
        train_inputs: &[Vec<f64>],
        train_targets: &[Vec<f64>],
        val_inputs: &[Vec<f64>],
        val_targets: &[Vec<f64>],
        epochs: usize,
        batch_size: usize,
        learning_rate: f64,
        rng: &mut StdRng,
    ) -> FitSummary {
        let hidden1 = self.layer1.hidden_size;
        let hidden2 = self.layer2.hidden_size;
        let horizon = self.dense.biases.len();

        let mut adam1 = AdamState::zeros(4 * hidden1, self.layer1.input_size + hidden1);
        let mut adam2 = AdamState::zeros(4 * hidden2, self.layer2.input_size + hidden2);
        let mut adam_dense = AdamState::zeros(horizon, hidden2);

        let mut best_val_mae = self.mean_absolute_error(val_inputs, val_targets);
        let mut step = 0;
        let mut indices: Vec<usize> = (0..train_inputs.len()).collect();

        for epoch in 0..epochs {
            indices.shuffle(rng);

            for batch in indices.chunks(batch_size.max(1)) {
                let mut grads1 = ParamGrads::zeros(4 * hidden1, self.layer1.input_size + hidden1);
                let mut grads2 = ParamGrads::zeros(4 * hidden2, self.layer2.input_size + hidden2);
                let mut grads_dense = ParamGrads::zeros(horizon, hidden2);

                for &idx in batch {
                    self.backprop_example(
                        &train_inputs[idx],
                        &train_targets[idx],
                        &mut grads1,
                        &mut grads2,
                        &mut grads_dense,
                        rng,
                    );
                }

                let scale = 1.0 / batch.len() as f64;
                grads1.scale(scale);
                grads2.scale(scale);
                grads_dense.scale(scale);

                step += 1;
                adam1.apply(
                    &mut self.layer1.weights,
                    &mut self.layer1.biases,
                    &grads1,
                    learning_rate,
                    step,
                );
                adam2.apply(
                    &mut self.layer2.weights,
                    &mut self.layer2.biases,
                    &grads2,
                    learning_rate,
                    step,
                );
                adam_dense.apply(
                    &mut self.dense.weights,
                    &mut self.dense.biases,
                    &grads_dense,
                    learning_rate,
                    step,
                );
            }

            let val_mae = self.mean_absolute_error(val_inputs, val_targets);
            if val_mae < best_val_mae {
                best_val_mae = val_mae;
            }
            debug!("epoch {}/{}: validation mae {:.4}", epoch + 1, epochs, val_mae);
        }

        FitSummary { best_val_mae }
    }

    fn backprop_example(
        &self,
        window: &[f64],
        target: &[f64],
        grads1: &mut ParamGrads,
        grads2: &mut ParamGrads,
        grads_dense: &mut ParamGrads,
        rng: &mut StdRng,
    ) {
        let inputs: Vec<Vec<f64>> = window.iter().map(|v| vec![*v]).collect();
        let steps1 = self.layer1.forward(&inputs);
        if steps1.is_empty() {
            return;
        }

        let keep = 1.0 - self.dropout;
        let masks: Vec<Vec<f64>> = steps1
            .iter()
            .map(|_| {
                (0..self.layer1.hidden_size)
                    .map(|_| {
                        if self.dropout <= 0.0 || rng.gen::<f64>() < keep {
                            1.0 / keep.max(f64::EPSILON)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        let dropped: Vec<Vec<f64>> = steps1
            .iter()
            .zip(masks.iter())
            .map(|(step, mask)| step.h.iter().zip(mask.iter()).map(|(h, m)| h * m).collect())
            .collect();

        let steps2 = self.layer2.forward(&dropped);
        let last_hidden = match steps2.last() {
            Some(step) => step.h.clone(),
            None => return,
        };

        let outputs = self.dense.forward(&last_hidden);
        let d_outputs: Vec<f64> = outputs
            .iter()
            .zip(target.iter())
            .map(|(y, t)| 2.0 * (y - t) / outputs.len() as f64)
            .collect();

        let d_last_hidden = self.dense.backward(&last_hidden, &d_outputs, grads_dense);

        let mut d_hidden2 = vec![vec![0.0; self.layer2.hidden_size]; steps2.len()];
        if let Some(last) = d_hidden2.last_mut() {
            *last = d_last_hidden;
        }

        let d_dropped = self.layer2.backward(&steps2, &d_hidden2, grads2);

        // dropout mask applies to the gradient exactly as it did to the activations
        let d_hidden1: Vec<Vec<f64>> = d_dropped
            .iter()
            .zip(masks.iter())
            .map(|(d, mask)| d.iter().zip(mask.iter()).map(|(d, m)| d * m).collect())
            .collect();

        self.layer1.backward(&steps1, &d_hidden1, grads1);
    }

    /// Mean absolute error of inference-mode predictions, in scaled space
    pub(crate) fn mean_absolute_error(
        &self,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
    ) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;

        for (input, target) in inputs.iter().zip(targets.iter()) {
            let outputs = self.forward(input);
            for (y, t) in outputs.iter().zip(target.iter()) {
                total += (y - t).abs();
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }
}
