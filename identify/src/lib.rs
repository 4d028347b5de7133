//! Plant identification.
//!
//! An [`Identifier`] turns a captured image into an [`Identification`]: the
//! plant's common and botanical names plus care instructions. The only
//! implementation here is [`MockIdentifier`], which picks from a small
//! built-in catalogue after a simulated network delay.

#![warn(missing_docs)]

mod catalogue;
mod mock;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use catalogue::{CATALOGUE, PlantProfile};
pub use mock::{IdentifyConfig, MockIdentifier};
pub use plantcare_camera::EncodedImage;

macro_rules! care_level {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Lowercase name, as stored in plant records.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCareLevel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownCareLevel(other.to_owned())),
                }
            }
        }
    };
}

care_level! {
    /// How often a plant wants water.
    Watering {
        /// Let the soil dry out.
        Low => "low",
        /// Keep slightly moist.
        Medium => "medium",
        /// Keep consistently moist.
        High => "high",
    }
}

care_level! {
    /// How much light a plant wants.
    Sunlight {
        /// Shade tolerant.
        Low => "low",
        /// Bright, indirect light.
        Partial => "partial",
        /// Direct sun.
        Full => "full",
    }
}

care_level! {
    /// Preferred temperature range.
    Temperature {
        /// Below typical room temperature.
        Cool => "cool",
        /// Typical room temperature.
        Average => "average",
        /// Above typical room temperature.
        Warm => "warm",
    }
}

/// A care level string that is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown care level `{0}`")]
pub struct UnknownCareLevel(pub String);

/// How to look after an identified plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareInstructions {
    /// Watering need.
    pub watering: Watering,
    /// Light need.
    pub sunlight: Sunlight,
    /// Temperature preference.
    pub temperature: Temperature,
    /// Short description of the plant.
    pub description: String,
    /// Practical care tips.
    pub tips: Vec<String>,
}

/// The result of identifying a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Common name.
    pub name: String,
    /// Botanical name.
    pub species: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Care instructions for the plant.
    pub care: CareInstructions,
}

/// Errors that can occur while identifying a plant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifyError {
    /// The image was not good enough; the user should take another one.
    #[error("Could not identify plant clearly. Please take another photo in better lighting.")]
    NeedsClearerImage,
    /// There is no image to identify.
    #[error("no image to identify")]
    EmptyImage,
}

/// A plant identification service.
pub trait Identifier: Send + Sync {
    /// Identify the plant shown in `image`.
    fn identify(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<Identification, IdentifyError>> + Send;
}
