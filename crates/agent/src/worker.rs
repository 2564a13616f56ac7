//! The worker: state machine and event dispatch.
//!
//! The host delivers events through `Worker::dispatch`. Install and
//! activate complete only when their extended lifetime settles; a fetch
//! returns as soon as the response is ready and settles in the background.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mikra_core::{AgentConfig, CacheStorage, Error, Network, Request};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::classify::Classifier;
use crate::event::{ClientSignal, Event, EventKind, Lifetime};
use crate::lifecycle::{self, ActivateOutcome, InstallOutcome};
use crate::strategy::{ResponseSource, Served, StrategyExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed. A later install may still succeed.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        })
    }
}

/// What handling an event produced.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    Fetched(Served),
}

impl EventOutcome {
    /// Client-control signal the host should act on, if any.
    pub fn signal(&self) -> Option<ClientSignal> {
        match self {
            EventOutcome::Installed(outcome) => Some(outcome.signal),
            EventOutcome::Activated(outcome) => Some(outcome.signal),
            EventOutcome::Fetched(_) => None,
        }
    }

    pub fn into_served(self) -> Option<Served> {
        match self {
            EventOutcome::Fetched(served) => Some(served),
            _ => None,
        }
    }
}

/// Offline caching worker bound to one configuration.
pub struct Worker {
    config: Arc<AgentConfig>,
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    classifier: Classifier,
    executor: StrategyExecutor,
    manifest: Vec<Request>,
    state: RwLock<WorkerState>,
    controlling: AtomicBool,
}

impl Worker {
    /// Build a worker. The manifest is resolved once, here.
    pub fn new(config: AgentConfig, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let manifest = lifecycle::manifest_requests(&config)?;
        let classifier = Classifier::from_config(&config);
        let executor = StrategyExecutor::new(
            store.clone(),
            network.clone(),
            config.version_tag.clone(),
            config.offline_message.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            network,
            classifier,
            executor,
            manifest,
            state: RwLock::new(WorkerState::Parsed),
            controlling: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStorage> {
        &self.store
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// True once clients were claimed by a successful activate.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Run install, then activate right away when install asks to skip waiting.
    pub async fn start(&self) -> Result<WorkerState, Error> {
        let installed = self.dispatch(Event::Install).await?;
        if installed.signal() == Some(ClientSignal::SkipWaiting) {
            self.dispatch(Event::Activate).await?;
        }
        Ok(self.state().await)
    }

    /// Handle one event.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        let kind = event.kind();
        let lifetime = Lifetime::new();

        let outcome = match event {
            Event::Install => self.on_install().await.map(EventOutcome::Installed),
            Event::Activate => self.on_activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.on_fetch(&request, &lifetime).await.map(EventOutcome::Fetched),
        };

        match kind {
            EventKind::Fetch => {
                tokio::spawn(async move {
                    let pending = lifetime.settled().await;
                    tracing::trace!(pending, "fetch event settled");
                });
            }
            EventKind::Install | EventKind::Activate => {
                lifetime.settled().await;
            }
        }

        outcome
    }

    /// Move to `next` and return the state left behind.
    async fn transition(
        &self, allowed: &[WorkerState], next: WorkerState, kind: EventKind,
    ) -> Result<WorkerState, Error> {
        let mut state = self.state.write().await;
        if !allowed.contains(&*state) {
            return Err(Error::InvalidInput(format!("cannot handle {kind} while worker is {}", *state)));
        }
        Ok(std::mem::replace(&mut *state, next))
    }

    async fn on_install(&self) -> Result<InstallOutcome, Error> {
        let previous = self
            .transition(
                &[WorkerState::Parsed, WorkerState::Installed, WorkerState::Activated, WorkerState::Redundant],
                WorkerState::Installing,
                EventKind::Install,
            )
            .await?;

        let result = lifecycle::install(
            &self.config.version_tag,
            &self.manifest,
            self.store.as_ref(),
            self.network.as_ref(),
        )
        .await;

        let mut state = self.state.write().await;
        match &result {
            Ok(_) => *state = WorkerState::Installed,
            // An active worker keeps serving from its existing partition.
            Err(e) if previous == WorkerState::Activated => {
                tracing::error!("reinstall failed, staying active: {}", e);
                *state = WorkerState::Activated;
            }
            Err(e) => {
                tracing::error!("install failed: {}", e);
                *state = WorkerState::Redundant;
                self.controlling.store(false, Ordering::SeqCst);
            }
        }
        result
    }

    async fn on_activate(&self) -> Result<ActivateOutcome, Error> {
        let previous = self
            .transition(&[WorkerState::Installed, WorkerState::Activated], WorkerState::Activating, EventKind::Activate)
            .await?;

        let result = lifecycle::activate(&self.config.version_tag, self.store.as_ref()).await;

        let mut state = self.state.write().await;
        match &result {
            Ok(outcome) => {
                *state = WorkerState::Activated;
                if outcome.signal == ClientSignal::ClaimClients {
                    self.controlling.store(true, Ordering::SeqCst);
                }
            }
            Err(e) => {
                tracing::error!("activate failed: {}", e);
                *state = previous;
            }
        }
        result
    }

    async fn on_fetch(&self, request: &Request, lifetime: &Lifetime) -> Result<Served, Error> {
        if !self.is_controlling() {
            tracing::debug!("worker not controlling, passing {} through", request.url());
            let response = self.network.fetch(request).await?;
            return Ok(Served { response, source: ResponseSource::Network, strategy: None });
        }

        let strategy = self.classifier.classify(request);
        tracing::debug!("{} {} -> {}", request.method(), request.url(), strategy);
        self.executor.execute(strategy, request, lifetime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Strategy;
    use async_trait::async_trait;
    use mikra_core::{CacheDb, Response};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use url::Url;

    /// Online network serving every URL, switchable to offline.
    struct SwitchNetwork {
        offline: AtomicBool,
        calls: AtomicUsize,
        fail_paths: Mutex<Vec<String>>,
    }

    impl SwitchNetwork {
        fn online() -> Self {
            Self { offline: AtomicBool::new(false), calls: AtomicUsize::new(0), fail_paths: Mutex::new(Vec::new()) }
        }

        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for SwitchNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self.fail_paths.lock().unwrap().iter().any(|p| p == request.url().path());
            if self.offline.load(Ordering::SeqCst) || failing {
                return Err(Error::Network("offline".into()));
            }
            Ok(Response::new(200, vec![], format!("online {}", request.url())))
        }
    }

    fn config(manifest: &[&str]) -> AgentConfig {
        AgentConfig { precache_manifest: manifest.iter().map(|m| m.to_string()).collect(), ..Default::default() }
    }

    async fn worker(manifest: &[&str]) -> (Worker, Arc<CacheDb>, Arc<SwitchNetwork>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let net = Arc::new(SwitchNetwork::online());
        let worker = Worker::new(config(manifest), db.clone(), net.clone()).unwrap();
        (worker, db, net)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let (worker, db, _) = worker(&["./", "./index.html"]).await;
        db.open("flex-mikra-v0").await.unwrap();

        assert_eq!(worker.start().await.unwrap(), WorkerState::Activated);
        assert!(worker.is_controlling());
        assert_eq!(db.keys().await.unwrap(), vec!["flex-mikra-v1".to_string()]);
        assert_eq!(db.entry_count("flex-mikra-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant_and_retryable() {
        let (worker, db, net) = worker(&["/", "/index.html"]).await;
        net.fail_paths.lock().unwrap().push("/index.html".into());

        let result = worker.start().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!worker.is_controlling());
        assert!(db.match_in("flex-mikra-v1", &get("http://localhost:8080/")).await.unwrap().is_none());
        assert!(db.keys().await.unwrap().is_empty());

        net.fail_paths.lock().unwrap().clear();
        assert_eq!(worker.start().await.unwrap(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_active_worker_serving() {
        let (worker, _, net) = worker(&["./", "./index.html"]).await;
        worker.start().await.unwrap();
        net.go_offline();

        assert!(matches!(worker.start().await, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state().await, WorkerState::Activated);
        assert!(worker.is_controlling());

        let served = worker
            .dispatch(Event::Fetch(get("http://localhost:8080/index.html")))
            .await
            .unwrap()
            .into_served()
            .unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.text(), "online http://localhost:8080/index.html");
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let (worker, _, _) = worker(&[]).await;
        let result = worker.dispatch(Event::Activate).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_uncontrolled_fetch_passes_through() {
        let (worker, db, _) = worker(&[]).await;

        let served = worker
            .dispatch(Event::Fetch(get("https://tile.openstreetmap.org/1/1/1.png")))
            .await
            .unwrap()
            .into_served()
            .unwrap();

        assert_eq!(served.strategy, None);
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_host() {
        let (worker, _, net) = worker(&[]).await;
        worker.start().await.unwrap();
        net.go_offline();

        let api = worker
            .dispatch(Event::Fetch(get("https://api.mercadolibre.com/items/1")))
            .await
            .unwrap()
            .into_served()
            .unwrap();
        assert_eq!(api.strategy, Some(Strategy::NetworkOnlyWithFallback));
        assert_eq!(api.source, ResponseSource::Fallback);

        let tile = worker
            .dispatch(Event::Fetch(get("https://tile.openstreetmap.org/2/1/1.png")))
            .await;
        assert!(matches!(tile, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_precached_page_served_offline() {
        let (worker, _, net) = worker(&["./", "./index.html"]).await;
        worker.start().await.unwrap();
        net.go_offline();

        let served = worker
            .dispatch(Event::Fetch(get("http://localhost:8080/index.html")))
            .await
            .unwrap()
            .into_served()
            .unwrap();

        assert_eq!(served.strategy, Some(Strategy::StaleWhileRevalidate));
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.text(), "online http://localhost:8080/index.html");
    }

    #[test]
    fn test_outcome_signal() {
        let outcome = EventOutcome::Activated(ActivateOutcome {
            partition: "flex-mikra-v1".into(),
            deleted: vec![],
            signal: ClientSignal::ClaimClients,
        });
        assert_eq!(outcome.signal(), Some(ClientSignal::ClaimClients));
        assert!(outcome.into_served().is_none());
    }
}
