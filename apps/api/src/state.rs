use std::sync::Arc;

use crate::coding::controller::SessionController;
use crate::coding::registry::SessionRegistry;
use crate::coding::snapshots::SnapshotStore;
use crate::config::Config;
use crate::judge::test_runner::TestRunner;
use crate::judge::CodeExecutor;
use crate::llm_client::TextGenerator;
use crate::store::InterviewStore;
use crate::stt::Transcriber;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Everything is built once in `main`; there is no module-level state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn InterviewStore>,
    /// Remote judge. `Judge0Client` in production.
    pub executor: Arc<dyn CodeExecutor>,
    pub runner: TestRunner,
    /// Autosave history, shared with the controller so REST can read it.
    pub snapshots: Arc<SnapshotStore>,
    pub controller: Arc<SessionController>,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    /// Wires the session engine around the given collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn InterviewStore>,
        executor: Arc<dyn CodeExecutor>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let snapshots = Arc::new(SnapshotStore::new());
        let runner = TestRunner::new(executor.clone(), store.clone());
        let controller = Arc::new(SessionController::new(
            registry,
            snapshots.clone(),
            executor.clone(),
            runner.clone(),
            store.clone(),
        ));

        Self {
            config,
            store,
            executor,
            runner,
            snapshots,
            controller,
            transcriber,
            generator,
        }
    }
}
