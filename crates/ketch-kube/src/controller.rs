//! kube-runtime controllers for Applications and Frameworks

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use ketch_core::api::FIELD_MANAGER;
use ketch_core::{App, Application, ApplicationPhase, ApplicationStatus, Component, Framework};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Client, CustomResourceExt, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::chart_client::KubeChartClientFactory;
use crate::error::{KubeError, Result};
use crate::reconciler::{Context, cleanup_application, reconcile_application};
use crate::storage::StorageConfig;
use crate::store::{APPLICATION_FINALIZER, KubeObjectStore};

/// Requeue delay for applications left `Pending`
pub const PENDING_REQUEUE: Duration = Duration::from_secs(30);

/// Requeue delay after a reconciler error
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Next action for a recorded status
pub fn requeue_for(status: &ApplicationStatus) -> Action {
    match status.phase {
        ApplicationPhase::Pending => Action::requeue(PENDING_REQUEUE),
        ApplicationPhase::Succeeded | ApplicationPhase::Failed => Action::await_change(),
    }
}

fn has_finalizer(application: &Application) -> bool {
    application.finalizers().iter().any(|f| f == APPLICATION_FINALIZER)
}

/// Reconcile an Application
#[instrument(skip(application, ctx), fields(app = %application.name_any()))]
pub async fn reconcile(application: Arc<Application>, ctx: Arc<Context>) -> Result<Action> {
    let name = application.name_any();

    if application.metadata.deletion_timestamp.is_some() {
        if has_finalizer(&application) {
            cleanup_application(&name, &ctx).await?;
            ctx.store.remove_application_finalizer(&name).await?;
            info!("finalizer removed");
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(&application) {
        ctx.store.add_application_finalizer(&name).await?;
    }

    let status = reconcile_application(&application, &ctx).await;
    // An unchanged status is not written, so the pass does not retrigger itself
    if application.status.as_ref() == Some(&status) {
        debug!("status unchanged");
    } else {
        ctx.store.patch_application_status(&name, &status).await?;
    }
    Ok(requeue_for(&status))
}

pub fn error_policy(application: Arc<Application>, error: &KubeError, _ctx: Arc<Context>) -> Action {
    error!(?error, app = %application.name_any(), "application reconciliation failed");
    Action::requeue(ERROR_REQUEUE)
}

/// Bind a Framework to its namespace
#[instrument(skip(framework, ctx), fields(framework = %framework.name_any()))]
pub async fn reconcile_framework(framework: Arc<Framework>, ctx: Arc<Context>) -> Result<Action> {
    if framework.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let namespace = framework.spec.namespace_name.as_str();
    if namespace.is_empty() {
        warn!("framework has no target namespace");
        return Ok(Action::await_change());
    }

    ctx.store.apply_namespace(namespace).await?;
    if framework.bound_namespace() != Some(namespace) {
        ctx.store
            .patch_framework_namespace(&framework.name_any(), namespace)
            .await?;
        info!(%namespace, "framework linked to namespace");
    }
    Ok(Action::await_change())
}

pub fn framework_error_policy(framework: Arc<Framework>, error: &KubeError, _ctx: Arc<Context>) -> Action {
    error!(?error, framework = %framework.name_any(), "framework reconciliation failed");
    Action::requeue(ERROR_REQUEUE)
}

/// CustomResourceDefinitions of every Ketch resource
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![Application::crd(), Component::crd(), Framework::crd(), App::crd()]
}

/// CRDs as a multi-document YAML stream
pub fn crds_yaml() -> Result<String> {
    let mut out = String::new();
    for crd in crds() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}

/// Server-side apply every CRD
pub async fn install_crds(client: &Client) -> Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    for crd in crds() {
        let name = crd.name_any();
        api.patch(&name, &params, &Patch::Apply(&crd)).await?;
        info!(crd = %name, "CRD applied");
    }
    Ok(())
}

/// Run both controllers until a shutdown signal
pub async fn run(client: Client, storage: StorageConfig) -> Result<()> {
    let charts = KubeChartClientFactory::new(client.clone(), storage).await?;
    let ctx = Arc::new(Context::new(
        Arc::new(KubeObjectStore::new(client.clone())),
        Arc::new(charts),
    ));

    let applications: Api<Application> = Api::all(client.clone());
    let frameworks: Api<Framework> = Api::all(client);

    let application_controller = Controller::new(applications, watcher::Config::default());
    let known_applications = application_controller.store();

    info!("starting Application and Framework controllers");

    let application_controller = application_controller
        .watches(frameworks.clone(), watcher::Config::default(), move |framework: Framework| {
            let framework_name = framework.name_any();
            known_applications
                .state()
                .into_iter()
                .filter(|application| application.spec.framework == framework_name)
                .map(|application| ObjectRef::from_obj(application.as_ref()))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(app = %object.name, ?action, "reconciled"),
                Err(e) => warn!(error = %e, "application controller error"),
            }
        });

    let framework_controller = Controller::new(frameworks, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_framework, framework_error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(framework = %object.name, ?action, "reconciled"),
                Err(e) => warn!(error = %e, "framework controller error"),
            }
        });

    tokio::join!(application_controller, framework_controller);
    info!("controllers stopped");
    Ok(())
}
