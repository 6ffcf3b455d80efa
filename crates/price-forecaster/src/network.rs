//! Feed-forward regressor with dropout, trained by backpropagation.

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::optimizer::Adam;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    ReLU,
    Linear,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Linear => x,
        }
    }

    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

/// Fully connected layer, optionally followed by inverted dropout.
///
/// Weights are stored `input x output` so a batch forward is `X * W + b`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: DMatrix<f64>,
    pub biases: DVector<f64>,
    pub activation: Activation,
    pub dropout: f64,
}

/// Intermediate values of one layer kept for the backward pass.
pub struct LayerCache {
    input: DMatrix<f64>,
    pre_activation: DMatrix<f64>,
    mask: Option<DMatrix<f64>>,
}

pub struct LayerGradients {
    pub weights: DMatrix<f64>,
    pub biases: DVector<f64>,
}

/// Adam state for one layer's weights and biases.
#[derive(Debug, Clone)]
pub struct LayerOptimizer {
    weights: Adam,
    biases: Adam,
}

impl LayerOptimizer {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            weights: Adam::new(learning_rate),
            biases: Adam::new(learning_rate),
        }
    }
}

impl DenseLayer {
    /// Glorot-uniform weights, zero biases.
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        dropout: f64,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights = DMatrix::from_fn(input_size, output_size, |_, _| rng.gen_range(-limit..limit));

        Self {
            weights,
            biases: DVector::zeros(output_size),
            activation,
            dropout,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn pre_activation(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = input * &self.weights;
        for mut row in z.row_iter_mut() {
            for (value, bias) in row.iter_mut().zip(self.biases.iter()) {
                *value += bias;
            }
        }
        z
    }

    pub fn forward(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let activation = self.activation;
        self.pre_activation(input).map(|v| activation.apply(v))
    }

    fn forward_train<R: Rng>(&self, input: &DMatrix<f64>, rng: &mut R) -> (DMatrix<f64>, LayerCache) {
        let z = self.pre_activation(input);
        let activation = self.activation;
        let mut output = z.map(|v| activation.apply(v));

        let mask = if self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mask = DMatrix::from_fn(output.nrows(), output.ncols(), |_, _| {
                if rng.gen::<f64>() < self.dropout {
                    0.0
                } else {
                    1.0 / keep
                }
            });
            output.component_mul_assign(&mask);
            Some(mask)
        } else {
            None
        };

        let cache = LayerCache {
            input: input.clone(),
            pre_activation: z,
            mask,
        };
        (output, cache)
    }

    /// Returns this layer's gradients and the gradient w.r.t. its input.
    fn backward(&self, cache: &LayerCache, grad_output: &DMatrix<f64>) -> (LayerGradients, DMatrix<f64>) {
        let mut grad = grad_output.clone();
        if let Some(mask) = &cache.mask {
            grad.component_mul_assign(mask);
        }
        let activation = self.activation;
        let dz = grad.component_mul(&cache.pre_activation.map(|v| activation.derivative(v)));

        let weights = cache.input.transpose() * &dz;
        let biases = DVector::from_fn(dz.ncols(), |c, _| dz.column(c).sum());
        let grad_input = &dz * self.weights.transpose();

        (LayerGradients { weights, biases }, grad_input)
    }

    fn apply_gradients(&mut self, gradients: &LayerGradients, optimizer: &mut LayerOptimizer) {
        optimizer
            .weights
            .apply_gradients(self.weights.as_mut_slice(), gradients.weights.as_slice());
        optimizer
            .biases
            .apply_gradients(self.biases.as_mut_slice(), gradients.biases.as_slice());
    }
}

/// Multi-layer perceptron with ReLU hidden layers and a linear output.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<DenseLayer>,
}

impl Mlp {
    /// `sizes` lists every layer width including input and output, e.g. `[6, 64, 32, 1]`.
    /// Dropout follows each hidden layer.
    pub fn new<R: Rng>(sizes: &[usize], dropout: f64, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(sizes.len().saturating_sub(1));
        for (i, pair) in sizes.windows(2).enumerate() {
            let is_output = i + 2 == sizes.len();
            let (activation, layer_dropout) = if is_output {
                (Activation::Linear, 0.0)
            } else {
                (Activation::ReLU, dropout)
            };
            layers.push(DenseLayer::new(pair[0], pair[1], activation, layer_dropout, rng));
        }
        Self { layers }
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    pub fn optimizers(&self, learning_rate: f64) -> Vec<LayerOptimizer> {
        self.layers.iter().map(|_| LayerOptimizer::new(learning_rate)).collect()
    }

    /// Inference pass; dropout is disabled.
    pub fn predict_batch(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        current
    }

    pub fn forward_train<R: Rng>(&self, input: &DMatrix<f64>, rng: &mut R) -> (DMatrix<f64>, Vec<LayerCache>) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();
        for layer in &self.layers {
            let (output, cache) = layer.forward_train(&current, rng);
            caches.push(cache);
            current = output;
        }
        (current, caches)
    }

    /// Gradients for every layer, in layer order.
    pub fn backward(&self, caches: &[LayerCache], grad_output: &DMatrix<f64>) -> Vec<LayerGradients> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut grad = grad_output.clone();
        for (layer, cache) in self.layers.iter().zip(caches.iter()).rev() {
            let (layer_grads, grad_input) = layer.backward(cache, &grad);
            gradients.push(layer_grads);
            grad = grad_input;
        }
        gradients.reverse();
        gradients
    }

    pub fn apply_gradients(&mut self, gradients: &[LayerGradients], optimizers: &mut [LayerOptimizer]) {
        for ((layer, grads), optimizer) in self
            .layers
            .iter_mut()
            .zip(gradients.iter())
            .zip(optimizers.iter_mut())
        {
            layer.apply_gradients(grads, optimizer);
        }
    }
}

/// Mean squared error between a single-column output and the targets.
pub fn mse(predictions: &DMatrix<f64>, targets: &DMatrix<f64>) -> f64 {
    let n = predictions.nrows().max(1) as f64;
    (predictions - targets).norm_squared() / n
}
