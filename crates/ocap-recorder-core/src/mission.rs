//! Currently active mission, shared between admission and the lifecycle
//! controller.

use std::sync::{Arc, PoisonError, RwLock};

use crate::model::{Mission, World};

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMission {
    pub mission: Mission,
    pub world: World,
}

/// Process-wide mission slot
#[derive(Debug, Default)]
pub struct MissionContext {
    current: RwLock<Option<Arc<ActiveMission>>>,
}

impl MissionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mission(&self, mission: Mission, world: World) {
        let active = Arc::new(ActiveMission { mission, world });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(active);
    }

    /// Returns the mission that was active, if any.
    pub fn clear_mission(&self) -> Option<Arc<ActiveMission>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<ActiveMission>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stamp for queued rows.
    #[must_use]
    pub fn mission_id(&self) -> Option<u32> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| active.mission.id)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.mission_id().is_some()
    }

    /// Mission display name, or a placeholder when idle.
    #[must_use]
    pub fn mission_name(&self) -> String {
        self.current()
            .map_or_else(|| "No mission loaded".to_string(), |active| {
                active.mission.mission_name.clone()
            })
    }

    /// World name, or a placeholder when idle.
    #[must_use]
    pub fn world_name(&self) -> String {
        self.current()
            .map_or_else(|| "No world loaded".to_string(), |active| {
                active.world.world_name.clone()
            })
    }
}
