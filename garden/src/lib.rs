//! The user's garden: saved plant records.
//!
//! Every [`PlantStore`] operation is scoped to an owner id; a record is
//! invisible to everyone but the user who saved it. Removing a plant is a
//! two-step affair: [`compost`](PlantStore::compost) moves it to the compost
//! shelf where it stays readable, [`delete`](PlantStore::delete) erases it.
//!
//! [`PlantAssistant`] answers care questions about a saved plant.

#![warn(missing_docs)]

mod assistant;
mod memory;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use assistant::{AssistantConfig, ChatMessage, PlantAssistant, PlantChat, Role, Topic};
pub use memory::MemoryPlantStore;
pub use plantcare_identify::{Identification, Sunlight, Temperature, Watering};

/// Identifier of a plant record.
pub type PlantId = Uuid;

/// Where a plant is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Inside the house.
    #[default]
    Indoor,
    /// Outside.
    Outdoor,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Indoor => "indoor",
            Self::Outdoor => "outdoor",
        })
    }
}

/// Which shelf of the garden to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shelf {
    /// Plants still being cared for.
    Active,
    /// Plants moved to compost.
    Composted,
}

/// A plant about to be saved, as filled in on the add-plant form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantDraft {
    /// Display name.
    pub name: String,
    /// Botanical name.
    pub species: String,
    /// Free-form description.
    pub description: String,
    /// Watering need.
    pub watering: Watering,
    /// Light need.
    pub sunlight: Sunlight,
    /// Temperature preference.
    pub temperature: Temperature,
    /// Care tips.
    pub tips: Vec<String>,
    /// Where the plant is kept.
    pub location: Location,
    /// `data:` URL of the plant photo.
    pub image_data: String,
    /// Public URL of the uploaded photo, if the upload succeeded.
    pub image_path: Option<String>,
}

impl PlantDraft {
    /// Prefill a draft from an identification result and the accepted photo.
    ///
    /// The location defaults to indoor.
    #[must_use]
    pub fn from_identification(
        identification: &Identification,
        image_data: String,
        image_path: Option<String>,
    ) -> Self {
        let care = &identification.care;
        Self {
            name: identification.name.clone(),
            species: identification.species.clone(),
            description: care.description.clone(),
            watering: care.watering,
            sunlight: care.sunlight,
            temperature: care.temperature,
            tips: care.tips.clone(),
            location: Location::default(),
            image_data,
            image_path,
        }
    }

    /// Check the draft can be saved.
    ///
    /// # Errors
    /// Returns [`GardenError::MissingName`] if the name is blank.
    pub fn validate(&self) -> Result<(), GardenError> {
        if self.name.trim().is_empty() {
            return Err(GardenError::MissingName);
        }
        Ok(())
    }
}

/// A saved plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    /// Record id.
    pub id: PlantId,
    /// Id of the user who saved the plant.
    pub owner: String,
    /// Display name.
    pub name: String,
    /// Botanical name.
    pub species: String,
    /// Free-form description.
    pub description: String,
    /// Watering need.
    pub watering: Watering,
    /// Light need.
    pub sunlight: Sunlight,
    /// Temperature preference.
    pub temperature: Temperature,
    /// Care tips.
    pub tips: Vec<String>,
    /// Where the plant is kept.
    pub location: Location,
    /// `data:` URL of the plant photo.
    pub image_data: String,
    /// Public URL of the uploaded photo.
    pub image_path: Option<String>,
    /// When the plant was saved, in milliseconds since the Unix epoch.
    pub date_added: u64,
    /// When the plant was last watered.
    pub last_watered: Option<u64>,
    /// Whether the plant has been moved to compost.
    pub composted: bool,
    /// When the plant was moved to compost.
    pub date_composted: Option<u64>,
}

impl PlantRecord {
    /// Create a record for `owner` from a draft.
    #[must_use]
    pub fn new(id: PlantId, owner: impl Into<String>, draft: PlantDraft, now: u64) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: draft.name.trim().to_owned(),
            species: draft.species,
            description: draft.description,
            watering: draft.watering,
            sunlight: draft.sunlight,
            temperature: draft.temperature,
            tips: draft.tips,
            location: draft.location,
            image_data: draft.image_data,
            image_path: draft.image_path,
            date_added: now,
            last_watered: None,
            composted: false,
            date_composted: None,
        }
    }

    /// The shelf this record is on.
    #[must_use]
    pub const fn shelf(&self) -> Shelf {
        if self.composted {
            Shelf::Composted
        } else {
            Shelf::Active
        }
    }
}

/// Errors returned by a [`PlantStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GardenError {
    /// No such plant for this owner.
    #[error("plant {0} not found")]
    NotFound(PlantId),
    /// The plant needs a name.
    #[error("plant name is required")]
    MissingName,
    /// Composted plants cannot be watered.
    #[error("plant {0} is in the compost")]
    Composted(PlantId),
    /// No user is signed in.
    #[error("sign in to manage your garden")]
    Unauthenticated,
}

/// Storage for plant records.
pub trait PlantStore: Send + Sync {
    /// Save a new plant for `owner`.
    fn insert(
        &self,
        owner: &str,
        draft: PlantDraft,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send;

    /// Fetch one plant.
    fn get(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send;

    /// List the plants on `shelf`, newest first.
    fn list(
        &self,
        owner: &str,
        shelf: Shelf,
    ) -> impl Future<Output = Result<Vec<PlantRecord>, GardenError>> + Send;

    /// Move a plant to compost. Composting twice keeps the first date.
    fn compost(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send;

    /// Bring a plant back from compost.
    fn restore(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send;

    /// Record that a plant was just watered.
    fn mark_watered(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send;

    /// Erase a plant.
    fn delete(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<(), GardenError>> + Send;
}
