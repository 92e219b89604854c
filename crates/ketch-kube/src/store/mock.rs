//! In-memory object store for reconciler tests

use async_trait::async_trait;
use ketch_core::api::NamespaceRef;
use ketch_core::{ApplicationStatus, Component, Framework};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{APPLICATION_FINALIZER, ObjectStore};
use crate::error::{KubeError, Result};

/// Calls made against the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListComponents,
    GetFramework(String),
    ListFrameworks,
    ReplaceFrameworkStatus(String),
    PatchFrameworkNamespace(String),
    PatchApplicationStatus(String),
    AddFinalizer(String),
    RemoveFinalizer(String),
    ApplyNamespace(String),
}

#[derive(Default)]
struct State {
    components: Vec<Component>,
    frameworks: BTreeMap<String, Framework>,
    statuses: BTreeMap<String, ApplicationStatus>,
    finalizers: BTreeMap<String, Vec<String>>,
    namespaces: Vec<String>,
    pending_conflicts: u32,
    rival_link: Option<String>,
    component_error: Option<String>,
    calls: Vec<StoreCall>,
}

/// Object store keeping resources in memory
#[derive(Clone, Default)]
pub struct MockObjectStore {
    state: Arc<Mutex<State>>,
}

fn api_error(code: u16, reason: &str, message: String) -> KubeError {
    KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

fn resource_version(framework: &Framework) -> u64 {
    framework
        .metadata
        .resource_version
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn bump_version(framework: &mut Framework) {
    let next = resource_version(framework) + 1;
    framework.metadata.resource_version = Some(next.to_string());
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(self, component: Component) -> Self {
        self.lock().components.push(component);
        self
    }

    pub fn with_framework(self, framework: Framework) -> Self {
        self.insert_framework(framework);
        self
    }

    /// Add or overwrite a framework, as another client would
    pub fn insert_framework(&self, mut framework: Framework) {
        let name = framework.metadata.name.clone().unwrap_or_default();
        let mut state = self.lock();
        let previous = state.frameworks.get(&name).map(resource_version).unwrap_or_default();
        framework.metadata.resource_version = Some((previous + 1).to_string());
        state.frameworks.insert(name, framework);
    }

    pub fn framework(&self, name: &str) -> Option<Framework> {
        self.lock().frameworks.get(name).cloned()
    }

    pub fn application_status(&self, name: &str) -> Option<ApplicationStatus> {
        self.lock().statuses.get(name).cloned()
    }

    pub fn finalizers(&self, name: &str) -> Vec<String> {
        self.lock().finalizers.get(name).cloned().unwrap_or_default()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.lock().namespaces.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Reject the next `count` framework status replacements with 409
    ///
    /// Each rejection also bumps the stored resourceVersion, as a concurrent
    /// writer would.
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().pending_conflicts = count;
    }

    /// Have another writer link `app` just before the next framework status replacement
    ///
    /// That replacement then fails with 409 against the newer resourceVersion.
    pub fn link_concurrently(&self, app: &str) {
        self.lock().rival_link = Some(app.to_string());
    }

    /// Make component listing fail with `message`
    pub fn fail_list_components(&self, message: &str) {
        self.lock().component_error = Some(message.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: StoreCall) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn list_components(&self) -> Result<Vec<Component>> {
        let state = self.record(StoreCall::ListComponents);
        match &state.component_error {
            Some(message) => Err(api_error(500, "InternalError", message.clone())),
            None => Ok(state.components.clone()),
        }
    }

    async fn get_framework(&self, name: &str) -> Result<Option<Framework>> {
        let state = self.record(StoreCall::GetFramework(name.to_string()));
        Ok(state.frameworks.get(name).cloned())
    }

    async fn list_frameworks(&self) -> Result<Vec<Framework>> {
        let state = self.record(StoreCall::ListFrameworks);
        Ok(state.frameworks.values().cloned().collect())
    }

    async fn replace_framework_status(&self, framework: &Framework) -> Result<Framework> {
        let name = framework.metadata.name.clone().unwrap_or_default();
        let mut state = self.record(StoreCall::ReplaceFrameworkStatus(name.clone()));

        let conflict = |name: &str| {
            api_error(
                409,
                "Conflict",
                format!(
                    "Operation cannot be fulfilled on frameworks.theketch.io \"{}\": the object has been modified",
                    name
                ),
            )
        };

        if let Some(rival) = state.rival_link.take() {
            if let Some(stored) = state.frameworks.get_mut(&name) {
                stored.link_app(&rival);
                bump_version(stored);
            }
            return Err(conflict(&name));
        }

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            if let Some(stored) = state.frameworks.get_mut(&name) {
                bump_version(stored);
            }
            return Err(conflict(&name));
        }

        let stored = state.frameworks.get_mut(&name).ok_or_else(|| {
            api_error(404, "NotFound", format!("frameworks.theketch.io \"{}\" not found", name))
        })?;
        if resource_version(stored) != resource_version(framework) {
            return Err(conflict(&name));
        }

        stored.status = framework.status.clone();
        bump_version(stored);
        Ok(stored.clone())
    }

    async fn patch_framework_namespace(&self, framework: &str, namespace: &str) -> Result<()> {
        let mut state = self.record(StoreCall::PatchFrameworkNamespace(framework.to_string()));
        let stored = state.frameworks.get_mut(framework).ok_or_else(|| {
            api_error(404, "NotFound", format!("frameworks.theketch.io \"{}\" not found", framework))
        })?;
        stored.status.get_or_insert_with(Default::default).namespace = Some(NamespaceRef {
            name: namespace.to_string(),
        });
        bump_version(stored);
        Ok(())
    }

    async fn patch_application_status(&self, name: &str, status: &ApplicationStatus) -> Result<()> {
        let mut state = self.record(StoreCall::PatchApplicationStatus(name.to_string()));
        state.statuses.insert(name.to_string(), status.clone());
        Ok(())
    }

    async fn add_application_finalizer(&self, name: &str) -> Result<()> {
        let mut state = self.record(StoreCall::AddFinalizer(name.to_string()));
        let finalizers = state.finalizers.entry(name.to_string()).or_default();
        if !finalizers.iter().any(|f| f == APPLICATION_FINALIZER) {
            finalizers.push(APPLICATION_FINALIZER.to_string());
        }
        Ok(())
    }

    async fn remove_application_finalizer(&self, name: &str) -> Result<()> {
        let mut state = self.record(StoreCall::RemoveFinalizer(name.to_string()));
        if let Some(finalizers) = state.finalizers.get_mut(name) {
            finalizers.retain(|f| f != APPLICATION_FINALIZER);
        }
        Ok(())
    }

    async fn apply_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.record(StoreCall::ApplyNamespace(name.to_string()));
        if !state.namespaces.iter().any(|n| n == name) {
            state.namespaces.push(name.to_string());
        }
        Ok(())
    }
}
