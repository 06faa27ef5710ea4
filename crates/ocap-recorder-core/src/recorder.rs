//! Lifecycle controller.
//!
//! [`Recorder`] owns the configured backend and the shared state handed to
//! it, brokers mission start/end into the mission context, and makes sure the
//! backend is closed (and its queues drained) exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::metrics::WriterMetrics;
use crate::mission::{ActiveMission, MissionContext};
use crate::model::{Mission, World};
use crate::probe::FailureProbe;
use crate::queue::QueueDepths;
use crate::storage::{Backend, Dependencies, StorageBackend, build_backend};

pub struct Recorder {
    config: Config,
    deps: Dependencies,
    backend: StorageBackend,
    closed: AtomicBool,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("backend", &self.backend)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Validate `config`, route to the configured backend and bring it up.
    pub async fn init(config: Config) -> Result<Self> {
        config.validate()?;
        let deps = Dependencies::new();
        let backend = build_backend(&config, deps.clone())?;
        backend.init().await?;
        tracing::info!(
            backend = %backend.kind(),
            version = crate::VERSION,
            "recorder initialised"
        );
        Ok(Self {
            config,
            deps,
            backend,
            closed: AtomicBool::new(false),
        })
    }

    /// Close the backend. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backend.close().await?;
        tracing::info!("recorder closed");
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Start recording a mission, ending the active one first.
    ///
    /// An empty `mission.tag` is replaced by the configured default tag.
    pub async fn start_mission(
        &self,
        mut mission: Mission,
        mut world: World,
    ) -> Result<Option<Arc<ActiveMission>>> {
        if self.is_closed() {
            return Ok(None);
        }
        if self.deps.mission.is_active() {
            tracing::warn!(
                mission = %self.deps.mission.mission_name(),
                "mission still active at start, ending it first"
            );
            self.end_mission().await?;
        }
        if mission.tag.is_empty() {
            mission.tag.clone_from(&self.config.default_tag);
        }

        self.backend.start_mission(&mut mission, &mut world).await?;
        tracing::info!(
            mission_id = mission.id,
            mission = %mission.mission_name,
            world = %world.world_name,
            tag = %mission.tag,
            "mission started"
        );
        self.deps.mission.set_mission(mission, world);
        Ok(self.deps.mission.current())
    }

    /// Finish the active mission: backend first, then context and caches.
    pub async fn end_mission(&self) -> Result<()> {
        if self.is_closed() || !self.deps.mission.is_active() {
            return Ok(());
        }
        let result = self.backend.end_mission().await;
        if let Some(ended) = self.deps.mission.clear_mission() {
            tracing::info!(
                mission_id = ended.mission.id,
                mission = %ended.mission.mission_name,
                "mission ended"
            );
        }
        self.deps.entities.reset();
        self.deps.markers.reset();
        result
    }

    /// Admission surface.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn mission(&self) -> &MissionContext {
        &self.deps.mission
    }

    #[must_use]
    pub fn probe(&self) -> &FailureProbe {
        &self.deps.probe
    }

    #[must_use]
    pub fn metrics(&self) -> &WriterMetrics {
        &self.deps.metrics
    }

    /// Elapsed time of the writer's last completed drain cycle.
    #[must_use]
    pub fn last_db_write_duration(&self) -> Duration {
        self.deps.metrics.last_write_duration()
    }

    #[must_use]
    pub fn queue_depths(&self) -> QueueDepths {
        self.backend.queue_depths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageKind;
    use crate::model::Soldier;

    fn null_config() -> Config {
        let mut config = Config::default();
        config.storage.kind = StorageKind::Null;
        config
    }

    fn relational_config() -> Config {
        let mut config = Config::default();
        config.storage.kind = StorageKind::Relational;
        config.storage.relational.database = ":memory:".to_string();
        config
    }

    #[tokio::test]
    async fn default_tag_is_stamped() {
        let recorder = Recorder::init(null_config()).await.unwrap();
        let active = recorder
            .start_mission(Mission::default(), World::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.mission.tag, "Op");

        let tagged = Mission {
            tag: "TvT".to_string(),
            ..Mission::default()
        };
        let active = recorder
            .start_mission(tagged, World::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.mission.tag, "TvT");
        recorder.close().await.unwrap();
    }

    #[tokio::test]
    async fn end_mission_resets_context_and_caches() {
        let recorder = Recorder::init(relational_config()).await.unwrap();
        recorder
            .start_mission(Mission::default(), World::default())
            .await
            .unwrap();
        recorder
            .backend()
            .add_soldier(Soldier {
                object_id: 1,
                ..Soldier::default()
            })
            .unwrap();
        assert!(recorder.backend().get_soldier_by_object_id(1).is_some());

        recorder.end_mission().await.unwrap();
        assert!(!recorder.mission().is_active());
        assert!(recorder.backend().get_soldier_by_object_id(1).is_none());
        recorder.close().await.unwrap();
    }

    #[tokio::test]
    async fn relational_missions_get_sequential_ids() {
        let recorder = Recorder::init(relational_config()).await.unwrap();
        let first = recorder
            .start_mission(Mission::default(), World::default())
            .await
            .unwrap()
            .unwrap();
        let second = recorder
            .start_mission(Mission::default(), World::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.mission.id, 1);
        assert_eq!(second.mission.id, 2);
        recorder.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_silences_lifecycle() {
        let recorder = Recorder::init(null_config()).await.unwrap();
        recorder.close().await.unwrap();
        recorder.close().await.unwrap();
        assert!(recorder.is_closed());
        let started = recorder
            .start_mission(Mission::default(), World::default())
            .await
            .unwrap();
        assert!(started.is_none());
    }

    #[tokio::test]
    async fn invalid_config_fails_init() {
        let mut config = relational_config();
        config.storage.relational.drain_interval = Duration::ZERO;
        assert!(Recorder::init(config).await.is_err());
    }
}
