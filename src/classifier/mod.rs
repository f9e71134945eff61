mod network;

pub use network::{Activation, DenseNetwork, LayerWeights, NetworkWeights};

use crate::error::ClassifierError;
use crate::features::FEATURE_LEN;
use crate::frame::Frame;
use serde::Serialize;

/// Hidden widths of the landmark classifier
pub const LANDMARK_HIDDEN: [usize; 2] = [128, 64];

/// Hidden width of the image classifier
pub const IMAGE_HIDDEN: usize = 128;

/// Top class of one classifier run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    /// Raw probability of the top class
    pub confidence: f32,
}

/// Local learned classifier over a flat f32 input
pub trait SignClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn input_len(&self) -> usize;

    /// False for networks constructed with untrained weights
    fn is_pretrained(&self) -> bool;

    fn predict(&self, input: &[f32]) -> Result<Prediction, ClassifierError>;
}

/// [`SignClassifier`] backed by a [`DenseNetwork`] and a label table
#[derive(Debug, Clone)]
pub struct NetworkClassifier {
    name: String,
    network: DenseNetwork,
    labels: Vec<String>,
    pretrained: bool,
}

impl NetworkClassifier {
    pub fn new(
        name: impl Into<String>,
        network: DenseNetwork,
        labels: Vec<String>,
        pretrained: bool,
    ) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }
        if network.output_len() != labels.len() {
            return Err(ClassifierError::InvalidWeights {
                details: format!(
                    "network produces {} classes but {} labels are configured",
                    network.output_len(),
                    labels.len()
                ),
            });
        }

        Ok(Self {
            name: name.into(),
            network,
            labels,
            pretrained,
        })
    }

    pub fn network(&self) -> &DenseNetwork {
        &self.network
    }
}

impl SignClassifier for NetworkClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_len(&self) -> usize {
        self.network.input_len()
    }

    fn is_pretrained(&self) -> bool {
        self.pretrained
    }

    fn predict(&self, input: &[f32]) -> Result<Prediction, ClassifierError> {
        let output = self.network.forward(input)?;

        let (class_index, confidence) = output
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, top)) if top >= p => best,
                _ => Some((i, p)),
            })
            .ok_or(ClassifierError::EmptyOutput)?;

        let label = self
            .labels
            .get(class_index)
            .cloned()
            .ok_or(ClassifierError::EmptyOutput)?;

        Ok(Prediction {
            label,
            class_index,
            confidence,
        })
    }
}

/// Landmark classifier widths: features, hidden layers, classes
pub fn landmark_architecture(classes: usize) -> Vec<usize> {
    let mut widths = vec![FEATURE_LEN];
    widths.extend_from_slice(&LANDMARK_HIDDEN);
    widths.push(classes);
    widths
}

pub fn image_architecture(side: u32, classes: usize) -> Vec<usize> {
    vec![image_input_len(side), IMAGE_HIDDEN, classes]
}

/// Single layer used when no classifier could be loaded
pub fn emergency_architecture(classes: usize) -> Vec<usize> {
    vec![FEATURE_LEN, classes]
}

pub fn image_input_len(side: u32) -> usize {
    (side as usize) * (side as usize) * 3
}

/// Resize to `side`×`side` and flatten to row-major RGB scaled to [0, 1]
pub fn preprocess_image(frame: &Frame, side: u32) -> Vec<f32> {
    frame
        .resized(side, side)
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labels(count: usize) -> Vec<String> {
        (b'A'..).take(count).map(|c| (c as char).to_string()).collect()
    }

    fn identity_network() -> DenseNetwork {
        DenseNetwork::from_weights(NetworkWeights {
            layers: vec![LayerWeights {
                weights: vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
                bias: vec![0.0; 3],
                activation: Activation::Softmax,
            }],
        })
        .unwrap()
    }

    #[test]
    fn test_prediction_picks_top_class() {
        let classifier = NetworkClassifier::new("test", identity_network(), labels(3), true).unwrap();
        let prediction = classifier.predict(&[0.0, 3.0, 1.0]).unwrap();

        assert_eq!(prediction.label, "B");
        assert_eq!(prediction.class_index, 1);
        assert!(prediction.confidence > 0.5 && prediction.confidence < 1.0);
        assert!(classifier.is_pretrained());
    }

    #[test]
    fn test_label_count_must_match_outputs() {
        assert!(NetworkClassifier::new("test", identity_network(), labels(4), true).is_err());
        assert!(matches!(
            NetworkClassifier::new("test", identity_network(), vec![], true),
            Err(ClassifierError::EmptyOutput)
        ));
    }

    #[test]
    fn test_wrong_input_length() {
        let classifier = NetworkClassifier::new("test", identity_network(), labels(3), true).unwrap();
        assert!(classifier.predict(&[1.0; 5]).is_err());
    }

    #[test]
    fn test_architectures() {
        assert_eq!(landmark_architecture(26), vec![68, 128, 64, 26]);
        assert_eq!(image_architecture(32, 26), vec![3072, 128, 26]);
        assert_eq!(emergency_architecture(26), vec![68, 26]);

        let mut rng = StdRng::seed_from_u64(3);
        let network = DenseNetwork::glorot(&image_architecture(32, 26), &mut rng).unwrap();
        let classifier = NetworkClassifier::new("image", network, labels(26), false).unwrap();

        let frame = Frame::solid(1, 64, 48, [255, 0, 128]);
        let input = preprocess_image(&frame, 32);
        assert_eq!(input.len(), classifier.input_len());
        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((input[0] - 1.0).abs() < 1e-2);
        assert!(input[1].abs() < 1e-2);

        let prediction = classifier.predict(&input).unwrap();
        assert!(prediction.class_index < 26);
    }
}
