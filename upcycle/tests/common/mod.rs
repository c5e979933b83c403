#![allow(dead_code)]
//! Shared test doubles for the orchestrator's external boundaries

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use upcycle::backup::manager::BackupManager;
use upcycle::build::Builder;
use upcycle::errors::UpdateError;
use upcycle::health::{HealthProbe, ProbeOptions};
use upcycle::models::artifact::{ArtifactRef, ImageId};
use upcycle::models::component::Component;
use upcycle::registry::ArtifactRegistry;
use upcycle::runtime::ComponentRuntime;
use upcycle::source::{SourceSync, SyncResult};
use upcycle::storage::layout::StateLayout;
use upcycle::update::gate::OperatorGate;
use upcycle::update::orchestrator::UpdateOrchestrator;
use upcycle::verify::Verifier;

pub fn component(name: &str, image: &str, deps: &[&str]) -> Component {
    Component {
        name: name.to_string(),
        service: name.to_string(),
        image: image.to_string(),
        health_endpoint: Url::parse(&format!("http://localhost/{}/health", name)).unwrap(),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
    }
}

/// The review-bot stack: a bot that depends on its llm backend
pub fn stack() -> Vec<Component> {
    vec![
        component("llm", "paper-review/llm", &[]),
        component("bot", "paper-review/bot", &["llm"]),
    ]
}

// ------------------------------ registry ------------------------------- //

#[derive(Default)]
pub struct FakeRegistry {
    /// "repo:tag" -> image id
    pub tags: Mutex<HashMap<String, ImageId>>,
    /// References that `tag` refuses to create
    pub fail_tag_to: Mutex<HashSet<String>>,
    pub available: AtomicBool,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(HashMap::new()),
            fail_tag_to: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set(&self, reference: &str, id: &str) {
        self.tags
            .lock()
            .unwrap()
            .insert(reference.to_string(), ImageId(id.to_string()));
    }

    pub fn get(&self, reference: &str) -> Option<ImageId> {
        self.tags.lock().unwrap().get(reference).cloned()
    }

    pub fn remove(&self, reference: &str) {
        self.tags.lock().unwrap().remove(reference);
    }
}

#[async_trait]
impl ArtifactRegistry for FakeRegistry {
    async fn image_id(&self, artifact: &ArtifactRef) -> Result<Option<ImageId>, UpdateError> {
        Ok(self.get(&artifact.reference()))
    }

    async fn tag(&self, from: &ArtifactRef, to: &ArtifactRef) -> Result<(), UpdateError> {
        if self.fail_tag_to.lock().unwrap().contains(&to.reference()) {
            return Err(UpdateError::RegistryError(format!(
                "injected failure tagging {}",
                to
            )));
        }
        let id = self.get(&from.reference()).ok_or_else(|| {
            UpdateError::RegistryError(format!("no such image: {}", from))
        })?;
        self.tags.lock().unwrap().insert(to.reference(), id);
        Ok(())
    }

    async fn remove_tag(&self, artifact: &ArtifactRef) -> Result<(), UpdateError> {
        self.remove(&artifact.reference());
        Ok(())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, UpdateError> {
        let prefix = format!("{}:", repository);
        Ok(self
            .tags
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(|t| t.to_string()))
            .collect())
    }

    async fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

// ------------------------------- runtime ------------------------------- //

#[derive(Default)]
pub struct FakeRuntime {
    /// "start bot" / "stop llm", in call order
    pub log: Mutex<Vec<String>>,
    pub fail_start_for: Mutex<Option<String>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComponentRuntime for FakeRuntime {
    async fn start(&self, component: &Component) -> Result<(), UpdateError> {
        if self.fail_start_for.lock().unwrap().as_deref() == Some(component.name.as_str()) {
            return Err(UpdateError::RuntimeError(format!(
                "injected start failure for '{}'",
                component.name
            )));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("start {}", component.name));
        Ok(())
    }

    async fn stop(&self, component: &Component) -> Result<(), UpdateError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("stop {}", component.name));
        Ok(())
    }

    async fn available(&self) -> bool {
        true
    }
}

// ------------------------------- builder ------------------------------- //

/// Publishes deterministic image ids: `sha256:new-<name>-<n>` where n counts
/// builds of that component
pub struct FakeBuilder {
    registry: Arc<FakeRegistry>,
    counts: Mutex<HashMap<String, u32>>,
    pub fail_for: Mutex<Option<String>>,
}

impl FakeBuilder {
    pub fn new(registry: Arc<FakeRegistry>) -> Self {
        Self {
            registry,
            counts: Mutex::new(HashMap::new()),
            fail_for: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    async fn build(&self, component: &Component) -> Result<ArtifactRef, UpdateError> {
        if self.fail_for.lock().unwrap().as_deref() == Some(component.name.as_str()) {
            return Err(UpdateError::BuildError {
                component: component.name.clone(),
                output: "synthetic compose build failure".to_string(),
            });
        }
        let n = {
            let mut counts = self.counts.lock().unwrap();
            let n = counts.entry(component.name.clone()).or_insert(0);
            *n += 1;
            *n
        };
        let latest = ArtifactRef::latest(&component.image);
        self.registry.set(
            &latest.reference(),
            &format!("sha256:new-{}-{}", component.name, n),
        );
        Ok(latest)
    }
}

// -------------------------------- source ------------------------------- //

#[derive(Default)]
pub struct FakeSource {
    pub dirty: Mutex<Option<String>>,
    pub fail_sync: Mutex<bool>,
    /// Fired during sync, emulating an operator interrupt mid-run
    pub interrupt_tx: Mutex<Option<broadcast::Sender<()>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceSync for FakeSource {
    async fn local_changes(&self) -> Result<Option<String>, UpdateError> {
        Ok(self.dirty.lock().unwrap().clone())
    }

    async fn sync(&self) -> Result<SyncResult, UpdateError> {
        if *self.fail_sync.lock().unwrap() {
            return Err(UpdateError::SyncError("injected merge failure".to_string()));
        }
        if let Some(tx) = self.interrupt_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
        Ok(SyncResult {
            had_local_changes: self.dirty.lock().unwrap().is_some(),
            updated: true,
        })
    }

    async fn available(&self) -> bool {
        true
    }
}

// -------------------------------- probe -------------------------------- //

/// Probe whose verdict follows the fake registry: an endpoint is unhealthy
/// while its repository's `latest` points at an id marked bad, or while its
/// configured warm-up delay has not elapsed
pub struct FakeProbe {
    registry: Arc<FakeRegistry>,
    /// endpoint url -> repository
    endpoints: HashMap<String, String>,
    /// Image ids that never report healthy
    pub unhealthy_ids: Mutex<HashSet<String>>,
    /// endpoint url -> number of unhealthy probes before turning healthy
    pub warmup: Mutex<HashMap<String, u32>>,
    counts: Mutex<HashMap<String, u32>>,
}

impl FakeProbe {
    pub fn new(registry: Arc<FakeRegistry>, components: &[Component]) -> Self {
        let endpoints = components
            .iter()
            .map(|c| (c.health_endpoint.to_string(), c.image.clone()))
            .collect();
        Self {
            registry,
            endpoints,
            unhealthy_ids: Mutex::new(HashSet::new()),
            warmup: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn standalone() -> Self {
        Self::new(Arc::new(FakeRegistry::new()), &[])
    }

    pub fn mark_unhealthy(&self, image_id: &str) {
        self.unhealthy_ids
            .lock()
            .unwrap()
            .insert(image_id.to_string());
    }

    pub fn set_warmup(&self, endpoint: &Url, unhealthy_probes: u32) {
        self.warmup
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), unhealthy_probes);
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self, endpoint: &Url) -> bool {
        let key = endpoint.to_string();
        let count = {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(warmup) = self.warmup.lock().unwrap().get(&key) {
            if count <= *warmup {
                return false;
            }
        }

        if let Some(repository) = self.endpoints.get(&key) {
            let latest = ArtifactRef::latest(repository);
            if let Some(id) = self.registry.get(&latest.reference()) {
                if self.unhealthy_ids.lock().unwrap().contains(id.as_str()) {
                    return false;
                }
            }
        }

        true
    }
}

// --------------------------------- gate -------------------------------- //

pub struct FakeGate {
    pub answer: bool,
    pub asked: AtomicBool,
    /// Fired when the gate is consulted, emulating an interrupt arriving
    /// while the operator is looking at the prompt
    pub interrupt_tx: Mutex<Option<broadcast::Sender<()>>>,
}

impl FakeGate {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicBool::new(false),
            interrupt_tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl OperatorGate for FakeGate {
    async fn confirm(&self, _prompt: &str) -> Result<bool, UpdateError> {
        self.asked.store(true, Ordering::SeqCst);
        if let Some(tx) = self.interrupt_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
        Ok(self.answer)
    }
}

// ------------------------------- verifier ------------------------------ //

pub struct FakeVerifier {
    pub ok: bool,
}

#[async_trait]
impl Verifier for FakeVerifier {
    async fn verify(&self) -> Result<(), UpdateError> {
        if self.ok {
            Ok(())
        } else {
            Err(UpdateError::VerificationError(
                "synthetic test-suite failure".to_string(),
            ))
        }
    }
}

// ------------------------------- fixture ------------------------------- //

/// A complete fake deployment: two components with `latest` already pointing
/// at known ids, wired into an orchestrator with millisecond probe timing
pub struct Fixture {
    pub components: Vec<Component>,
    pub registry: Arc<FakeRegistry>,
    pub runtime: Arc<FakeRuntime>,
    pub builder: Arc<FakeBuilder>,
    pub source: Arc<FakeSource>,
    pub probe: Arc<FakeProbe>,
    pub gate: Arc<FakeGate>,
    pub verifier: Option<Arc<FakeVerifier>>,
    pub shutdown: broadcast::Sender<()>,
    pub state_dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let components = stack();
        let registry = Arc::new(FakeRegistry::new());
        registry.set("paper-review/llm:latest", "sha256:old-llm");
        registry.set("paper-review/bot:latest", "sha256:old-bot");

        let (shutdown, _) = broadcast::channel(4);

        Self {
            builder: Arc::new(FakeBuilder::new(registry.clone())),
            probe: Arc::new(FakeProbe::new(registry.clone(), &components)),
            components,
            registry,
            runtime: Arc::new(FakeRuntime::new()),
            source: Arc::new(FakeSource::new()),
            gate: Arc::new(FakeGate::new(true)),
            verifier: None,
            shutdown,
            state_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout::new(self.state_dir.path())
    }

    pub fn manager(&self) -> BackupManager {
        BackupManager::new(self.registry.clone(), &self.layout())
    }

    pub fn orchestrator(&self) -> UpdateOrchestrator {
        UpdateOrchestrator {
            components: self.components.clone(),
            registry: self.registry.clone(),
            runtime: self.runtime.clone(),
            builder: self.builder.clone(),
            source: self.source.clone(),
            probe: self.probe.clone(),
            verifier: self
                .verifier
                .clone()
                .map(|v| v as Arc<dyn Verifier>),
            gate: self.gate.clone(),
            backups: self.manager(),
            layout: self.layout(),
            probe_options: ProbeOptions {
                interval: std::time::Duration::from_millis(10),
                timeout: std::time::Duration::from_millis(200),
            },
            required_env: vec![],
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn latest(&self, repository: &str) -> Option<String> {
        self.registry
            .get(&format!("{}:latest", repository))
            .map(|id| id.0)
    }
}
