use crate::error::ClassifierError;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Softmax,
    Linear,
}

/// Serialized form of one dense layer; `weights` is `[inputs][outputs]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerWeights {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

/// Serialized network, as stored in model weight files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub layers: Vec<LayerWeights>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        let mut output = input.dot(&self.weights) + &self.bias;
        match self.activation {
            Activation::Relu => output.mapv_inplace(|v| v.max(0.0)),
            Activation::Softmax => softmax_inplace(&mut output),
            Activation::Linear => {}
        }
        output
    }
}

/// Feed-forward network of dense layers evaluated with ndarray
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Build from serialized weights, checking every layer chains into the next
    pub fn from_weights(weights: NetworkWeights) -> Result<Self, ClassifierError> {
        if weights.layers.is_empty() {
            return Err(ClassifierError::InvalidWeights {
                details: "network has no layers".to_string(),
            });
        }

        let mut layers = Vec::with_capacity(weights.layers.len());
        let mut expected_inputs: Option<usize> = None;

        for (position, layer) in weights.layers.into_iter().enumerate() {
            let inputs = layer.weights.len();
            let outputs = layer.weights.first().map(Vec::len).unwrap_or(0);

            if inputs == 0 || outputs == 0 {
                return Err(ClassifierError::InvalidWeights {
                    details: format!("layer {} is empty", position),
                });
            }
            if let Some(expected) = expected_inputs {
                if inputs != expected {
                    return Err(ClassifierError::InvalidWeights {
                        details: format!(
                            "layer {} expects {} inputs but previous layer produces {}",
                            position, inputs, expected
                        ),
                    });
                }
            }
            if layer.bias.len() != outputs {
                return Err(ClassifierError::InvalidWeights {
                    details: format!(
                        "layer {} bias has {} entries, expected {}",
                        position,
                        layer.bias.len(),
                        outputs
                    ),
                });
            }

            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            let matrix = Array2::from_shape_vec((inputs, outputs), flat).map_err(|e| {
                ClassifierError::InvalidWeights {
                    details: format!("layer {} has ragged rows: {}", position, e),
                }
            })?;

            expected_inputs = Some(outputs);
            layers.push(DenseLayer {
                weights: matrix,
                bias: Array1::from_vec(layer.bias),
                activation: layer.activation,
            });
        }

        Ok(Self { layers })
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let weights: NetworkWeights =
            serde_json::from_str(json).map_err(|e| ClassifierError::InvalidWeights {
                details: e.to_string(),
            })?;
        Self::from_weights(weights)
    }

    /// Untrained network with Glorot-uniform weights and zero biases.
    /// Hidden layers use ReLU, the last layer softmax.
    pub fn glorot<R: Rng>(architecture: &[usize], rng: &mut R) -> Result<Self, ClassifierError> {
        if architecture.len() < 2 || architecture.contains(&0) {
            return Err(ClassifierError::InvalidWeights {
                details: format!("invalid architecture {:?}", architecture),
            });
        }

        let last = architecture.len() - 2;
        let layers = architecture
            .windows(2)
            .enumerate()
            .map(|(position, pair)| {
                let (inputs, outputs) = (pair[0], pair[1]);
                let limit = (6.0 / (inputs + outputs) as f32).sqrt();
                DenseLayer {
                    weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit)),
                    bias: Array1::zeros(outputs),
                    activation: if position == last {
                        Activation::Softmax
                    } else {
                        Activation::Relu
                    },
                }
            })
            .collect();

        Ok(Self { layers })
    }

    pub fn input_len(&self) -> usize {
        self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0)
    }

    pub fn output_len(&self) -> usize {
        self.layers.last().map(|l| l.weights.ncols()).unwrap_or(0)
    }

    /// Layer widths from input to output
    pub fn architecture(&self) -> Vec<usize> {
        let mut widths = vec![self.input_len()];
        widths.extend(self.layers.iter().map(|l| l.weights.ncols()));
        widths
    }

    pub fn forward(&self, input: &[f32]) -> Result<Array1<f32>, ClassifierError> {
        if input.len() != self.input_len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.input_len(),
                actual: input.len(),
            });
        }

        let mut activations = Array1::from_vec(input.to_vec());
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations)
    }

    pub fn to_weights(&self) -> NetworkWeights {
        NetworkWeights {
            layers: self
                .layers
                .iter()
                .map(|layer| LayerWeights {
                    weights: layer.weights.rows().into_iter().map(|row| row.to_vec()).collect(),
                    bias: layer.bias.to_vec(),
                    activation: layer.activation,
                })
                .collect(),
        }
    }
}

fn softmax_inplace(values: &mut Array1<f32>) {
    let max = values.fold(f32::NEG_INFINITY, |acc, v| acc.max(*v));
    values.mapv_inplace(|v| (v - max).exp());
    let sum = values.sum();
    if sum > 0.0 {
        values.mapv_inplace(|v| v / sum);
    }
}
