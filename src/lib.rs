//! # PlantCare
//!
//! Building blocks for a plant-care app: photograph a plant, identify it,
//! and keep it in a personal garden.
//!
//! ## Features
//!
//! PlantCare is modular. Enable only the parts you need.
//!
//! - `camera`: camera stream acquisition and still capture.
//! - `storage`: object storage and the image upload relay.
//! - `capture`: the capture session state machine tying the two together.
//! - `identify`: plant identification (mock catalogue).
//! - `garden`: owner-scoped plant records.
//! - `auth`: sign up, sign in and session tracking.
//!
//! Use the `full` feature to enable everything, including [`KitConfig`] and
//! the helpers that span several crates.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! plantcare = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```rust,no_run
//! # #[cfg(feature = "capture")]
//! # async fn snap() -> Result<(), plantcare::capture::SessionError> {
//! use plantcare::camera::sys::simulated::{SimulatedCamera, SimulatedSurface};
//! use plantcare::capture::{CaptureSession, SessionConfig};
//! use plantcare::storage::MemoryStore;
//!
//! let session = CaptureSession::new(
//!     SimulatedCamera::new(),
//!     SimulatedSurface::new(),
//!     MemoryStore::default(),
//!     SessionConfig::default(),
//! );
//! session.start().await?;
//! let upload = session.capture().await?;
//! let status = upload.await;
//! println!("upload settled: {status:?}");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "auth")]
pub use plantcare_auth as auth;

#[cfg(feature = "camera")]
pub use plantcare_camera as camera;

#[cfg(feature = "capture")]
pub use plantcare_capture as capture;

#[cfg(feature = "garden")]
pub use plantcare_garden as garden;

#[cfg(feature = "identify")]
pub use plantcare_identify as identify;

#[cfg(feature = "storage")]
pub use plantcare_storage as storage;

#[cfg(all(feature = "capture", feature = "garden"))]
mod config;
#[cfg(all(feature = "capture", feature = "garden"))]
pub use config::{ConfigError, KitConfig};

#[cfg(all(feature = "capture", feature = "garden"))]
mod flow;
#[cfg(all(feature = "capture", feature = "garden"))]
pub use flow::draft_from_capture;

#[cfg(all(feature = "auth", feature = "garden"))]
mod user_garden;
#[cfg(all(feature = "auth", feature = "garden"))]
pub use user_garden::UserGarden;
