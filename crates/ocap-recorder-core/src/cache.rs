//! Host identity → internal identity caches.
//!
//! Every registered soldier, vehicle and marker owns an [`EntityRef`]: a
//! shared slot that starts pending and receives the store-assigned row id
//! once the registration batch commits. Queued state and event rows hold a
//! clone of the slot, so the writer can resolve their foreign keys even when
//! the registration commits after the event was admitted.
//!
//! Lookups never block on the store. A miss means "not registered in this
//! mission"; caches are reset wholesale at EndMission.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::{ObjectId, Soldier, Vehicle};

const PENDING: i64 = 0;
const DETACHED: i64 = -1;

/// Resolution state of an [`EntityRef`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    /// Registration queued, not yet committed
    Pending,
    /// Registration will never be written (no mission, inserts paused)
    Detached,
    /// Store row id
    Resolved(i64),
}

/// Shared slot holding an entity's store id
#[derive(Clone, Default)]
pub struct EntityRef(Arc<AtomicI64>);

impl EntityRef {
    #[must_use]
    pub fn pending() -> Self {
        Self(Arc::new(AtomicI64::new(PENDING)))
    }

    #[must_use]
    pub fn detached() -> Self {
        Self(Arc::new(AtomicI64::new(DETACHED)))
    }

    #[must_use]
    pub fn resolved(id: i64) -> Self {
        Self(Arc::new(AtomicI64::new(id)))
    }

    #[must_use]
    pub fn state(&self) -> RefState {
        match self.0.load(Ordering::Acquire) {
            PENDING => RefState::Pending,
            id if id < 0 => RefState::Detached,
            id => RefState::Resolved(id),
        }
    }

    /// Store id once resolved.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        match self.state() {
            RefState::Resolved(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn resolve(&self, id: i64) {
        debug_assert!(id > 0, "store ids are positive");
        self.0.store(id, Ordering::Release);
    }

    pub(crate) fn detach(&self) {
        let _ = self
            .0
            .compare_exchange(PENDING, DETACHED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Whether both handles point at the same slot.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_slot(other) || self.state() == other.state()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state() {
            RefState::Pending => f.write_str("EntityRef(pending)"),
            RefState::Detached => f.write_str("EntityRef(detached)"),
            RefState::Resolved(id) => write!(f, "EntityRef({id})"),
        }
    }
}

/// Reference to something that can be either a soldier or a vehicle
#[derive(Debug, Clone, PartialEq)]
pub enum EntityTarget {
    Soldier(EntityRef),
    Vehicle(EntityRef),
}

impl EntityTarget {
    #[must_use]
    pub fn slot(&self) -> &EntityRef {
        match self {
            Self::Soldier(slot) | Self::Vehicle(slot) => slot,
        }
    }

    pub(crate) fn soldier_id(&self) -> Option<i64> {
        match self {
            Self::Soldier(slot) => slot.id(),
            Self::Vehicle(_) => None,
        }
    }

    pub(crate) fn vehicle_id(&self) -> Option<i64> {
        match self {
            Self::Vehicle(slot) => slot.id(),
            Self::Soldier(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSoldier {
    pub soldier: Soldier,
    pub id: EntityRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedVehicle {
    pub vehicle: Vehicle,
    pub id: EntityRef,
}

// =============================================================================
// Entity cache
// =============================================================================

#[derive(Debug)]
struct ObjectMap<T> {
    entries: RwLock<HashMap<ObjectId, T>>,
}

impl<T: Clone> ObjectMap<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, object_id: ObjectId, entry: T) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object_id, entry);
    }

    fn with<R>(&self, object_id: ObjectId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&object_id)
            .map(f)
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Soldiers and vehicles by host object id
#[derive(Debug)]
pub struct EntityCache {
    soldiers: ObjectMap<CachedSoldier>,
    vehicles: ObjectMap<CachedVehicle>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            soldiers: ObjectMap::new(),
            vehicles: ObjectMap::new(),
        }
    }

    /// Insert or overwrite by object id.
    pub fn add_soldier(&self, soldier: Soldier, id: EntityRef) {
        self.soldiers
            .insert(soldier.object_id, CachedSoldier { soldier, id });
    }

    pub fn add_vehicle(&self, vehicle: Vehicle, id: EntityRef) {
        self.vehicles
            .insert(vehicle.object_id, CachedVehicle { vehicle, id });
    }

    #[must_use]
    pub fn get_soldier(&self, object_id: ObjectId) -> Option<CachedSoldier> {
        self.soldiers.with(object_id, Clone::clone)
    }

    #[must_use]
    pub fn get_vehicle(&self, object_id: ObjectId) -> Option<CachedVehicle> {
        self.vehicles.with(object_id, Clone::clone)
    }

    /// Slot only, without cloning the record.
    #[must_use]
    pub fn soldier_ref(&self, object_id: ObjectId) -> Option<EntityRef> {
        self.soldiers.with(object_id, |entry| entry.id.clone())
    }

    #[must_use]
    pub fn vehicle_ref(&self, object_id: ObjectId) -> Option<EntityRef> {
        self.vehicles.with(object_id, |entry| entry.id.clone())
    }

    /// Soldier first, then vehicle.
    #[must_use]
    pub fn target(&self, object_id: ObjectId) -> Option<EntityTarget> {
        self.soldier_ref(object_id)
            .map(EntityTarget::Soldier)
            .or_else(|| self.vehicle_ref(object_id).map(EntityTarget::Vehicle))
    }

    pub fn reset(&self) {
        self.soldiers.clear();
        self.vehicles.clear();
    }

    #[must_use]
    pub fn soldier_count(&self) -> usize {
        self.soldiers.len()
    }

    #[must_use]
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }
}

// =============================================================================
// Marker cache
// =============================================================================

/// Marker name → slot
#[derive(Debug, Default)]
pub struct MarkerCache {
    markers: RwLock<HashMap<String, EntityRef>>,
}

impl MarkerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, id: EntityRef) {
        self.markers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), id);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<EntityRef> {
        self.markers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Store id for a committed marker.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|slot| slot.id())
    }

    pub fn reset(&self) {
        self.markers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
