use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use ulid::Ulid;

use crate::directory::{InMemoryCatalog, InMemoryDirectory};
use crate::model::*;
use crate::store::InMemoryRemoteStore;

/// Salon data for the in-memory collaborators.
///
/// Bookings stay raw JSON: they go into the store as documents, so the
/// store's strict decoding is what accepts or skips them. A booking's `id`
/// field, if present, becomes its document key.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    #[serde(default)]
    pub salon: SalonSchedule,
    #[serde(default)]
    pub resources: Vec<ResourceSchedule>,
    #[serde(default)]
    pub bookings: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedCounts {
    pub services: usize,
    pub resources: usize,
    pub documents: usize,
}

impl Seed {
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("invalid seed: {e}"))
    }

    pub fn from_path(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read seed {}: {e}", path.display()))?;
        Self::from_json(&text)
    }

    /// Populate the collaborators. The salon schedule replaces the current one.
    pub fn install(
        self,
        directory: &InMemoryDirectory,
        catalog: &InMemoryCatalog,
        store: &InMemoryRemoteStore,
    ) -> SeedCounts {
        let counts = SeedCounts {
            services: self.services.len(),
            resources: self.resources.len(),
            documents: self.bookings.len(),
        };
        directory.set_salon_schedule(self.salon);
        for schedule in self.resources {
            directory.upsert(schedule);
        }
        for service in self.services {
            catalog.upsert(service);
        }
        for mut doc in self.bookings {
            let key = doc
                .as_object_mut()
                .and_then(|o| o.remove("id"))
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_else(|| Ulid::new().to_string());
            store.insert_raw(key, doc);
        }
        tracing::info!(
            "seeded {} services, {} resources, {} booking documents",
            counts.services,
            counts.resources,
            counts.documents
        );
        counts
    }
}
