//! Log levels emitted by analysis runs.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use risk_engine::{EngineError, RiskEngine};
use risk_storage::{InMemoryRiskRepository, InMemorySnapshotProvider};
use risk_types::{ScopeFilter, Snapshot};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Clone, Default)]
struct LevelRecorder {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl<S: Subscriber> Layer<S> for LevelRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.levels.lock().unwrap().push(*event.metadata().level());
    }
}

#[tokio::test]
async fn aborted_run_logs_at_error_level() {
    let recorder = LevelRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let snapshots = Arc::new(InMemorySnapshotProvider::new(Snapshot::default()));
    snapshots.set_unavailable(true);
    let engine = RiskEngine::new(snapshots, Arc::new(InMemoryRiskRepository::new()));

    let now = Utc.with_ymd_and_hms(2024, 6, 30, 9, 0, 0).unwrap();
    let err = engine
        .run_analysis_at(&ScopeFilter::all(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Snapshot(_)));

    let levels = recorder.levels.lock().unwrap();
    assert!(levels.contains(&Level::ERROR));
    assert!(!levels.contains(&Level::WARN));
}
