use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_timer::Delay;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{CATALOGUE, EncodedImage, Identification, IdentifyError, Identifier};

const CONFIDENCE_JITTER: f32 = 0.05;
const MIN_CONFIDENCE: f32 = 0.70;
const MAX_CONFIDENCE: f32 = 0.99;

/// Mock identifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Simulated service latency in milliseconds.
    pub latency_ms: u64,
    /// Share of requests answered with [`IdentifyError::NeedsClearerImage`].
    pub rejection_rate: f64,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1_500,
            rejection_rate: 0.15,
        }
    }
}

impl IdentifyConfig {
    /// Simulated latency as a [`Duration`].
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// An [`Identifier`] that answers from the built-in [`CATALOGUE`].
///
/// The image content is ignored. Each request waits for the configured
/// latency, is rejected with the configured probability, and otherwise names
/// a random catalogue plant with its base confidence jittered by up to 0.05.
pub struct MockIdentifier {
    config: IdentifyConfig,
    rng: Mutex<StdRng>,
}

impl MockIdentifier {
    /// Create an identifier seeded from system entropy.
    #[must_use]
    pub fn new(config: IdentifyConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an identifier with a fixed seed, for reproducible answers.
    #[must_use]
    pub fn with_seed(config: IdentifyConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: IdentifyConfig, rng: StdRng) -> Self {
        Self {
            config: IdentifyConfig {
                rejection_rate: if config.rejection_rate.is_nan() {
                    0.0
                } else {
                    config.rejection_rate.clamp(0.0, 1.0)
                },
                ..config
            },
            rng: Mutex::new(rng),
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    fn roll(&self) -> Result<Identification, IdentifyError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_bool(self.config.rejection_rate) {
            return Err(IdentifyError::NeedsClearerImage);
        }
        let profile = &CATALOGUE[rng.gen_range(0..CATALOGUE.len())];
        let jitter = rng.gen_range(-CONFIDENCE_JITTER..=CONFIDENCE_JITTER);
        let confidence =
            (profile.base_confidence + jitter).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        Ok(profile.identification(confidence))
    }
}

impl Default for MockIdentifier {
    fn default() -> Self {
        Self::new(IdentifyConfig::default())
    }
}

impl fmt::Debug for MockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockIdentifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Identifier for MockIdentifier {
    fn identify(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<Identification, IdentifyError>> + Send {
        let outcome = if image.is_empty() {
            Err(IdentifyError::EmptyImage)
        } else {
            self.roll()
        };
        let latency = self.config.latency();
        debug!("identifying {image:?}");
        async move {
            Delay::new(latency).await;
            match &outcome {
                Ok(found) => info!(
                    "identified {} with confidence {:.2}",
                    found.name, found.confidence
                ),
                Err(err) => debug!("identification rejected: {err}"),
            }
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantcare_camera::FrameCapturer;
    use plantcare_camera::sys::simulated::leaf_frame;

    fn instant(rejection_rate: f64) -> IdentifyConfig {
        IdentifyConfig {
            latency_ms: 0,
            rejection_rate,
        }
    }

    fn leaf() -> EncodedImage {
        FrameCapturer::default().encode(&leaf_frame(8, 8)).unwrap()
    }

    #[tokio::test]
    async fn answers_from_catalogue_within_confidence_bounds() {
        let identifier = MockIdentifier::with_seed(instant(0.0), 7);
        let image = leaf();
        for _ in 0..50 {
            let found = identifier.identify(&image).await.unwrap();
            let profile = CATALOGUE
                .iter()
                .find(|p| p.name == found.name)
                .expect("plant from catalogue");
            assert_eq!(found.species, profile.species);
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&found.confidence));
            let drift = (found.confidence - profile.base_confidence).abs();
            assert!(drift <= CONFIDENCE_JITTER + 1e-6);
            assert_eq!(found.care.tips.len(), profile.tips.len());
        }
    }

    #[tokio::test]
    async fn full_rejection_rate_always_asks_for_another_photo() {
        let identifier = MockIdentifier::with_seed(instant(1.0), 1);
        let err = identifier.identify(&leaf()).await.unwrap_err();
        assert_eq!(err, IdentifyError::NeedsClearerImage);
        assert!(err.to_string().contains("better lighting"));
    }

    #[tokio::test]
    async fn same_seed_gives_same_answers() {
        let config = IdentifyConfig {
            latency_ms: 0,
            ..IdentifyConfig::default()
        };
        let a = MockIdentifier::with_seed(config, 42);
        let b = MockIdentifier::with_seed(config, 42);
        let image = leaf();
        for _ in 0..10 {
            assert_eq!(a.identify(&image).await, b.identify(&image).await);
        }
    }

    #[test]
    fn out_of_range_rejection_rate_is_clamped() {
        let identifier = MockIdentifier::with_seed(instant(3.0), 0);
        assert!((identifier.config().rejection_rate - 1.0).abs() < f64::EPSILON);
    }
}
