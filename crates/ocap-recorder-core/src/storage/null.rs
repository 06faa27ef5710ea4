//! Backend that accepts everything and keeps nothing.

use super::{Backend, Dependencies};
use crate::cache::{CachedSoldier, CachedVehicle, EntityRef};
use crate::config::StorageKind;
use crate::error::Result;
use crate::model::{
    Ace3DeathEvent, Ace3UnconsciousEvent, ChatEvent, FiredEvent, GeneralEvent, HitEvent,
    KillEvent, Marker, MarkerDeletion, MarkerState, Mission, ObjectId, ProjectileEvent,
    RadioEvent, ServerFpsEvent, Soldier, SoldierState, TimeState, Vehicle, VehicleState, World,
};

#[derive(Debug)]
pub struct NullBackend {
    deps: Dependencies,
}

impl NullBackend {
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }
}

impl Backend for NullBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Null
    }

    async fn init(&self) -> Result<()> {
        tracing::info!("null backend ready, nothing will be recorded");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn start_mission(&self, _mission: &mut Mission, _world: &mut World) -> Result<()> {
        Ok(())
    }

    async fn end_mission(&self) -> Result<()> {
        Ok(())
    }

    fn add_soldier(&self, _soldier: Soldier) -> Result<()> {
        Ok(())
    }

    fn add_vehicle(&self, _vehicle: Vehicle) -> Result<()> {
        Ok(())
    }

    fn add_marker(&self, _marker: Marker) -> Result<()> {
        Ok(())
    }

    fn record_soldier_state(&self, _state: SoldierState) -> Result<()> {
        Ok(())
    }

    fn record_vehicle_state(&self, _state: VehicleState) -> Result<()> {
        Ok(())
    }

    fn record_marker_state(&self, _state: MarkerState) -> Result<()> {
        Ok(())
    }

    fn delete_marker(&self, _deletion: MarkerDeletion) -> Result<()> {
        Ok(())
    }

    fn record_fired_event(&self, _event: FiredEvent) -> Result<()> {
        Ok(())
    }

    fn record_projectile_event(&self, _event: ProjectileEvent) -> Result<()> {
        Ok(())
    }

    fn record_general_event(&self, _event: GeneralEvent) -> Result<()> {
        Ok(())
    }

    fn record_hit_event(&self, _event: HitEvent) -> Result<()> {
        Ok(())
    }

    fn record_kill_event(&self, _event: KillEvent) -> Result<()> {
        Ok(())
    }

    fn record_chat_event(&self, _event: ChatEvent) -> Result<()> {
        Ok(())
    }

    fn record_radio_event(&self, _event: RadioEvent) -> Result<()> {
        Ok(())
    }

    fn record_server_fps_event(&self, _event: ServerFpsEvent) -> Result<()> {
        Ok(())
    }

    fn record_ace3_death_event(&self, _event: Ace3DeathEvent) -> Result<()> {
        Ok(())
    }

    fn record_ace3_unconscious_event(&self, _event: Ace3UnconsciousEvent) -> Result<()> {
        Ok(())
    }

    fn record_time_state(&self, _state: TimeState) -> Result<()> {
        Ok(())
    }

    fn get_soldier_by_object_id(&self, object_id: ObjectId) -> Option<CachedSoldier> {
        self.deps.entities.get_soldier(object_id)
    }

    fn get_vehicle_by_object_id(&self, object_id: ObjectId) -> Option<CachedVehicle> {
        self.deps.entities.get_vehicle(object_id)
    }

    fn get_marker_by_name(&self, name: &str) -> Option<EntityRef> {
        self.deps.markers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discards_everything() {
        let backend = NullBackend::new(Dependencies::new());
        backend.init().await.unwrap();
        backend
            .add_soldier(Soldier {
                object_id: 3,
                ..Soldier::default()
            })
            .unwrap();
        assert!(backend.get_soldier_by_object_id(3).is_none());
        assert_eq!(backend.queue_depths().total(), 0);
        backend.close().await.unwrap();
    }
}
