use log::debug;

use crate::auth::{Access, AuthProvider, SessionContext};
use crate::garden::{GardenError, PlantDraft, PlantId, PlantRecord, PlantStore, Shelf};

/// The signed-in user's view of a [`PlantStore`].
///
/// Each call resolves the owner from the session context; nothing is read
/// or written unless a user is signed in.
pub struct UserGarden<'a, S, P> {
    store: &'a S,
    auth: &'a SessionContext<P>,
}

impl<S, P> std::fmt::Debug for UserGarden<'_, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserGarden").finish_non_exhaustive()
    }
}

impl<'a, S: PlantStore, P: AuthProvider> UserGarden<'a, S, P> {
    /// Combine a store with the session context guarding it.
    pub const fn new(store: &'a S, auth: &'a SessionContext<P>) -> Self {
        Self { store, auth }
    }

    fn owner(&self) -> Result<String, GardenError> {
        match self.auth.require_user() {
            Access::Granted(user) => Ok(user.id),
            Access::Loading | Access::SignInRequired => {
                debug!("garden access without a signed-in user");
                Err(GardenError::Unauthenticated)
            }
        }
    }

    /// Save a plant.
    ///
    /// # Errors
    /// Returns [`GardenError::Unauthenticated`] when signed out, otherwise
    /// the store's error.
    pub async fn add(&self, draft: PlantDraft) -> Result<PlantRecord, GardenError> {
        let owner = self.owner()?;
        self.store.insert(&owner, draft).await
    }

    /// One plant.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn plant(&self, id: PlantId) -> Result<PlantRecord, GardenError> {
        let owner = self.owner()?;
        self.store.get(&owner, id).await
    }

    /// The plants on `shelf`, newest first.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn plants(&self, shelf: Shelf) -> Result<Vec<PlantRecord>, GardenError> {
        let owner = self.owner()?;
        self.store.list(&owner, shelf).await
    }

    /// Move a plant to compost.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn compost(&self, id: PlantId) -> Result<PlantRecord, GardenError> {
        let owner = self.owner()?;
        self.store.compost(&owner, id).await
    }

    /// Bring a plant back from compost.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn restore(&self, id: PlantId) -> Result<PlantRecord, GardenError> {
        let owner = self.owner()?;
        self.store.restore(&owner, id).await
    }

    /// Record a watering.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn water(&self, id: PlantId) -> Result<PlantRecord, GardenError> {
        let owner = self.owner()?;
        self.store.mark_watered(&owner, id).await
    }

    /// Erase a plant.
    ///
    /// # Errors
    /// See [`add`](Self::add).
    pub async fn delete(&self, id: PlantId) -> Result<(), GardenError> {
        let owner = self.owner()?;
        self.store.delete(&owner, id).await
    }
}
