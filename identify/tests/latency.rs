use std::time::{Duration, Instant};

use plantcare_camera::FrameCapturer;
use plantcare_camera::sys::simulated::leaf_frame;
use plantcare_identify::{IdentifyConfig, IdentifyError, Identifier, MockIdentifier};

#[tokio::test]
async fn identification_takes_the_configured_latency() {
    let identifier = MockIdentifier::with_seed(
        IdentifyConfig {
            latency_ms: 40,
            rejection_rate: 0.0,
        },
        3,
    );
    let image = FrameCapturer::default().encode(&leaf_frame(8, 8)).unwrap();

    let started = Instant::now();
    identifier.identify(&image).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn rejections_roughly_follow_the_configured_rate() {
    let identifier = MockIdentifier::with_seed(
        IdentifyConfig {
            latency_ms: 0,
            ..IdentifyConfig::default()
        },
        2024,
    );
    let image = FrameCapturer::default().encode(&leaf_frame(8, 8)).unwrap();

    let mut rejected = 0;
    for _ in 0..400 {
        if identifier.identify(&image).await == Err(IdentifyError::NeedsClearerImage) {
            rejected += 1;
        }
    }
    // 15% of 400 is 60.
    assert!((25..=100).contains(&rejected), "rejected {rejected} of 400");
}
