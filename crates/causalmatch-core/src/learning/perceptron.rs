//! Multilayer perceptron trained with mini-batch SGD and momentum.
//!
//! Architecture is `[inputs] ++ hidden ++ [1]`: hidden layers use the
//! configured activation, the output layer is linear. Loss is mean squared
//! error with optional L2 weight decay. Initialization is Xavier-uniform from
//! a seeded RNG so that a given configuration always trains to the same
//! weights.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use super::{OutcomeModel, TrainingParams};
use crate::error::{CausalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Linear => z,
            Activation::Relu => z.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            Activation::Tanh => z.tanh(),
        }
    }

    /// Derivative expressed through the pre-activation `z` and output `a`.
    fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Activation::Linear => 1.0,
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => a * (1.0 - a),
            Activation::Tanh => 1.0 - a * a,
        }
    }
}

impl FromStr for Activation {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            other => Err(CausalError::invalid_parameter(
                "activation",
                format!("unknown activation '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptronConfig {
    /// Widths of the hidden layers
    pub hidden_layer_sizes: Vec<usize>,
    /// Hidden-layer activation (output is always linear)
    pub activation: Activation,
    /// L2 penalty added to weight gradients
    pub weight_decay: f64,
    pub add_bias: bool,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for PerceptronConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![10],
            activation: Activation::Linear,
            weight_decay: 0.0,
            add_bias: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Layer {
    /// in x out
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    weight_velocity: DMatrix<f64>,
    bias_velocity: DVector<f64>,
}

/// Forward-pass cache for one batch.
struct Trace {
    /// Layer inputs; `inputs[0]` is the batch itself
    inputs: Vec<DMatrix<f64>>,
    /// Pre-activations per layer
    pre: Vec<DMatrix<f64>>,
    output: DMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct Perceptron {
    layer_sizes: Vec<usize>,
    activation: Activation,
    weight_decay: f64,
    add_bias: bool,
    layers: Vec<Layer>,
    fitted: bool,
}

impl Perceptron {
    pub fn new(input_size: usize, config: &PerceptronConfig) -> Self {
        let mut layer_sizes = Vec::with_capacity(config.hidden_layer_sizes.len() + 2);
        layer_sizes.push(input_size);
        layer_sizes.extend_from_slice(&config.hidden_layer_sizes);
        layer_sizes.push(1);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let layers = layer_sizes
            .windows(2)
            .map(|w| {
                let (fan_in, fan_out) = (w[0], w[1]);
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                Layer {
                    weights: DMatrix::from_fn(fan_in, fan_out, |_, _| {
                        rng.gen_range(-limit..limit)
                    }),
                    bias: DVector::zeros(fan_out),
                    weight_velocity: DMatrix::zeros(fan_in, fan_out),
                    bias_velocity: DVector::zeros(fan_out),
                }
            })
            .collect();

        Self {
            layer_sizes,
            activation: config.activation,
            weight_decay: config.weight_decay,
            add_bias: config.add_bias,
            layers,
            fitted: false,
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    fn forward(&self, batch: &DMatrix<f64>) -> Trace {
        let last = self.layers.len() - 1;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut current = batch.clone();

        for (l, layer) in self.layers.iter().enumerate() {
            let mut z = &current * &layer.weights;
            if self.add_bias {
                for mut row in z.row_iter_mut() {
                    for (c, value) in row.iter_mut().enumerate() {
                        *value += layer.bias[c];
                    }
                }
            }
            let a = if l == last {
                z.clone()
            } else {
                z.map(|v| self.activation.apply(v))
            };
            inputs.push(current);
            pre.push(z);
            current = a;
        }

        Trace {
            inputs,
            pre,
            output: current,
        }
    }

    /// One SGD step on a batch; returns the batch MSE.
    fn step(
        &mut self,
        batch: &DMatrix<f64>,
        targets: &DVector<f64>,
        params: &TrainingParams,
    ) -> f64 {
        let rows = batch.nrows() as f64;
        let trace = self.forward(batch);

        let residual =
            DMatrix::from_fn(batch.nrows(), 1, |r, _| trace.output[(r, 0)] - targets[r]);
        let loss = residual.iter().map(|e| e * e).sum::<f64>() / rows;

        // dL/dZ for the (linear) output layer
        let mut delta = residual * (2.0 / rows);

        for l in (0..self.layers.len()).rev() {
            let grad_w = trace.inputs[l].transpose() * &delta
                + &self.layers[l].weights * self.weight_decay;
            let grad_b = DVector::from_fn(delta.ncols(), |c, _| delta.column(c).sum());

            // Propagate before this layer's weights move
            if l > 0 {
                let back = &delta * self.layers[l].weights.transpose();
                let z_prev = &trace.pre[l - 1];
                let a_prev = &trace.inputs[l];
                delta = DMatrix::from_fn(back.nrows(), back.ncols(), |r, c| {
                    back[(r, c)] * self.activation.derivative(z_prev[(r, c)], a_prev[(r, c)])
                });
            }

            let layer = &mut self.layers[l];
            layer.weight_velocity = &layer.weight_velocity * params.momentum + grad_w;
            layer.weights -= &layer.weight_velocity * params.learning_rate;
            if self.add_bias {
                layer.bias_velocity = &layer.bias_velocity * params.momentum + grad_b;
                layer.bias -= &layer.bias_velocity * params.learning_rate;
            }
        }

        loss
    }
}

impl OutcomeModel for Perceptron {
    fn fit(
        &mut self,
        inputs: &DMatrix<f64>,
        targets: &DVector<f64>,
        params: &TrainingParams,
    ) -> Result<()> {
        if inputs.nrows() != targets.len() {
            return Err(CausalError::shape(
                "perceptron targets",
                inputs.nrows(),
                targets.len(),
            ));
        }
        if inputs.ncols() != self.input_size() {
            return Err(CausalError::shape(
                "perceptron input width",
                self.input_size(),
                inputs.ncols(),
            ));
        }
        if inputs.nrows() == 0 {
            return Err(CausalError::insufficient_data("cannot train on an empty dataset"));
        }
        if params.batch_size == 0 {
            return Err(CausalError::invalid_parameter("batch_size", "must be at least 1"));
        }

        let n = inputs.nrows();
        let report_every = params.epoch_report_interval.max(1);

        for epoch in 0..params.epoch_count {
            let mut weighted_loss = 0.0;
            let mut start = 0;
            while start < n {
                let len = params.batch_size.min(n - start);
                let batch = inputs.rows(start, len).clone_owned();
                let batch_targets = targets.rows(start, len).clone_owned();
                weighted_loss += self.step(&batch, &batch_targets, params) * len as f64;
                start += len;
            }

            let epoch_loss = weighted_loss / n as f64;
            if !epoch_loss.is_finite() {
                return Err(CausalError::outcome_model(format!(
                    "training diverged at epoch {} (loss {})",
                    epoch + 1,
                    epoch_loss
                )));
            }
            if (epoch + 1) % report_every == 0 {
                debug!(epoch = epoch + 1, loss = epoch_loss, "Perceptron training");
            }
        }

        self.fitted = true;
        Ok(())
    }

    fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>> {
        if !self.fitted {
            return Err(CausalError::precondition("perceptron must be fitted before predict"));
        }
        if inputs.ncols() != self.input_size() {
            return Err(CausalError::shape(
                "perceptron input width",
                self.input_size(),
                inputs.ncols(),
            ));
        }
        let trace = self.forward(inputs);
        Ok(DVector::from_fn(inputs.nrows(), |r, _| trace.output[(r, 0)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn linear_data() -> (DMatrix<f64>, DVector<f64>) {
        // y = 2x + 1
        let xs: Vec<f64> = (0..20).map(|i| i as f64 / 10.0).collect();
        let inputs = DMatrix::from_column_slice(xs.len(), 1, &xs);
        let targets = DVector::from_iterator(xs.len(), xs.iter().map(|x| 2.0 * x + 1.0));
        (inputs, targets)
    }

    #[test]
    fn test_layer_sizes() {
        let p = Perceptron::new(3, &PerceptronConfig::default());
        assert_eq!(p.layer_sizes(), &[3, 10, 1]);
        assert!(!p.is_fitted());
    }

    #[test]
    fn test_learns_linear_relation() {
        let (inputs, targets) = linear_data();
        let config = PerceptronConfig {
            hidden_layer_sizes: vec![4],
            ..Default::default()
        };
        let mut model = Perceptron::new(1, &config);
        let params = TrainingParams {
            epoch_count: 2000,
            batch_size: 5,
            learning_rate: 0.01,
            momentum: 0.5,
            epoch_report_interval: 500,
        };
        model.fit(&inputs, &targets, &params).unwrap();

        let probe = DMatrix::from_column_slice(2, 1, &[0.5, 1.5]);
        let out = model.predict(&probe).unwrap();
        assert_abs_diff_eq!(out[0], 2.0, epsilon = 0.1);
        assert_abs_diff_eq!(out[1], 4.0, epsilon = 0.1);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (inputs, targets) = linear_data();
        let params = TrainingParams {
            epoch_count: 50,
            ..Default::default()
        };
        let mut a = Perceptron::new(1, &PerceptronConfig::default());
        let mut b = Perceptron::new(1, &PerceptronConfig::default());
        a.fit(&inputs, &targets, &params).unwrap();
        b.fit(&inputs, &targets, &params).unwrap();
        assert_eq!(a.predict(&inputs).unwrap(), b.predict(&inputs).unwrap());
    }

    #[test]
    fn test_predict_requires_fit_and_width() {
        let model = Perceptron::new(2, &PerceptronConfig::default());
        let probe = DMatrix::zeros(1, 2);
        assert!(matches!(
            model.predict(&probe),
            Err(CausalError::Precondition { .. })
        ));

        let (inputs, targets) = linear_data();
        let mut wrong = Perceptron::new(2, &PerceptronConfig::default());
        assert!(matches!(
            wrong.fit(&inputs, &targets, &TrainingParams::default()),
            Err(CausalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_nonlinear_activations_train() {
        let (inputs, targets) = linear_data();
        for activation in [Activation::Relu, Activation::Sigmoid, Activation::Tanh] {
            let config = PerceptronConfig {
                activation,
                ..Default::default()
            };
            let mut model = Perceptron::new(1, &config);
            let params = TrainingParams {
                epoch_count: 20,
                learning_rate: 0.01,
                ..Default::default()
            };
            model.fit(&inputs, &targets, &params).unwrap();
            assert!(model.predict(&inputs).unwrap().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert!("softmax".parse::<Activation>().is_err());
    }
}
