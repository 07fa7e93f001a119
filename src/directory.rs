use dashmap::DashMap;
use std::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

/// Read-only source of staff schedules and buffer settings.
pub trait ResourceDirectory: Send + Sync {
    fn schedule(&self, resource_id: Ulid) -> Option<ResourceSchedule>;

    fn salon_schedule(&self) -> SalonSchedule;

    fn resource_ids(&self) -> Vec<Ulid>;
}

/// Read-only source of service definitions.
pub trait ServiceCatalog: Send + Sync {
    fn service(&self, id: Ulid) -> Option<ServiceDefinition>;

    fn is_exclusive(&self, id: Ulid) -> bool {
        self.service(id).is_some_and(|s| s.exclusive)
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    schedules: DashMap<Ulid, ResourceSchedule>,
    salon: RwLock<SalonSchedule>,
}

impl InMemoryDirectory {
    pub fn new(salon: SalonSchedule) -> Self {
        Self {
            schedules: DashMap::new(),
            salon: RwLock::new(salon),
        }
    }

    pub fn upsert(&self, schedule: ResourceSchedule) {
        self.schedules.insert(schedule.resource_id, schedule);
    }

    pub fn set_salon_schedule(&self, salon: SalonSchedule) {
        match self.salon.write() {
            Ok(mut guard) => *guard = salon,
            Err(poisoned) => *poisoned.into_inner() = salon,
        }
    }
}

impl ResourceDirectory for InMemoryDirectory {
    fn schedule(&self, resource_id: Ulid) -> Option<ResourceSchedule> {
        self.schedules.get(&resource_id).map(|e| e.value().clone())
    }

    fn salon_schedule(&self) -> SalonSchedule {
        match self.salon.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn resource_ids(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.schedules.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    services: DashMap<Ulid, ServiceDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, service: ServiceDefinition) {
        self.services.insert(service.id, service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceCatalog for InMemoryCatalog {
    fn service(&self, id: Ulid) -> Option<ServiceDefinition> {
        self.services.get(&id).map(|e| e.value().clone())
    }
}
