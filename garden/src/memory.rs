use std::collections::HashMap;
use std::fmt;
use std::future::{self, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use uuid::Uuid;

use crate::{GardenError, PlantDraft, PlantId, PlantRecord, PlantStore, Shelf};

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// An in-memory [`PlantStore`].
///
/// Clones share the same records.
#[derive(Clone)]
pub struct MemoryPlantStore {
    records: Arc<Mutex<HashMap<PlantId, PlantRecord>>>,
    clock: Clock,
}

impl Default for MemoryPlantStore {
    fn default() -> Self {
        Self::with_clock(timestamp_now)
    }
}

impl fmt::Debug for MemoryPlantStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPlantStore")
            .field("records", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryPlantStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store reading time from `clock`, in milliseconds since
    /// the Unix epoch.
    pub fn with_clock(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            records: Arc::default(),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlantId, PlantRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn update(
        &self,
        owner: &str,
        id: PlantId,
        apply: impl FnOnce(&mut PlantRecord, u64) -> Result<(), GardenError>,
    ) -> Result<PlantRecord, GardenError> {
        let now = self.now();
        let mut records = self.lock();
        let record = records
            .get_mut(&id)
            .filter(|record| record.owner == owner)
            .ok_or(GardenError::NotFound(id))?;
        apply(record, now)?;
        Ok(record.clone())
    }

    fn insert_now(&self, owner: &str, draft: PlantDraft) -> Result<PlantRecord, GardenError> {
        draft.validate()?;
        let record = PlantRecord::new(Uuid::new_v4(), owner, draft, self.now());
        self.lock().insert(record.id, record.clone());
        info!("saved {} as {}", record.name, record.id);
        Ok(record)
    }

    fn list_now(&self, owner: &str, shelf: Shelf) -> Vec<PlantRecord> {
        let mut plants: Vec<_> = self
            .lock()
            .values()
            .filter(|record| record.owner == owner && record.shelf() == shelf)
            .cloned()
            .collect();
        plants.sort_by(|a, b| {
            b.date_added
                .cmp(&a.date_added)
                .then_with(|| a.name.cmp(&b.name))
        });
        plants
    }

    fn delete_now(&self, owner: &str, id: PlantId) -> Result<(), GardenError> {
        let mut records = self.lock();
        if !records.get(&id).is_some_and(|record| record.owner == owner) {
            return Err(GardenError::NotFound(id));
        }
        records.remove(&id);
        info!("deleted plant {id}");
        Ok(())
    }
}

impl PlantStore for MemoryPlantStore {
    fn insert(
        &self,
        owner: &str,
        draft: PlantDraft,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send {
        future::ready(self.insert_now(owner, draft))
    }

    fn get(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send {
        future::ready(self.update(owner, id, |_, _| Ok(())))
    }

    fn list(
        &self,
        owner: &str,
        shelf: Shelf,
    ) -> impl Future<Output = Result<Vec<PlantRecord>, GardenError>> + Send {
        future::ready(Ok(self.list_now(owner, shelf)))
    }

    fn compost(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send {
        future::ready(self.update(owner, id, |record, now| {
            if !record.composted {
                record.composted = true;
                record.date_composted = Some(now);
                info!("{} moved to compost", record.name);
            }
            Ok(())
        }))
    }

    fn restore(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send {
        future::ready(self.update(owner, id, |record, _| {
            if record.composted {
                record.composted = false;
                record.date_composted = None;
                info!("{} restored from compost", record.name);
            }
            Ok(())
        }))
    }

    fn mark_watered(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<PlantRecord, GardenError>> + Send {
        future::ready(self.update(owner, id, |record, now| {
            if record.composted {
                return Err(GardenError::Composted(id));
            }
            record.last_watered = Some(now);
            debug!("{} watered", record.name);
            Ok(())
        }))
    }

    fn delete(
        &self,
        owner: &str,
        id: PlantId,
    ) -> impl Future<Output = Result<(), GardenError>> + Send {
        future::ready(self.delete_now(owner, id))
    }
}
