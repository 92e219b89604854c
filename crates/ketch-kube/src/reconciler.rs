//! Application reconciliation state machine
//!
//! One pass takes an Application and produces the status to record:
//!
//! 1. list registered components
//! 2. resolve the framework and its bound namespace
//! 3. enforce the framework's app quota
//! 4. assemble the chart and install or upgrade it in that namespace
//! 5. link the app into `framework.status.apps`
//! 6. release any framework the app moved away from
//!
//! Validation problems end in `Failed`, problems applying the chart in
//! `Pending`. Nothing here keeps state between passes: install versus
//! upgrade is re-derived from release storage every time.

use ketch_core::{Application, ApplicationStatus, ChartConfig, Framework};
use ketch_engine::{ApplicationChart, registry_from_components};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::chart_client::{ApplyOptions, ChartClientFactory};
use crate::error::{KubeError, Result};
use crate::store::ObjectStore;

/// Attempts for a resourceVersion-guarded framework status update
pub const MAX_CONFLICT_ATTEMPTS: u32 = 5;

/// Dependencies shared by every reconciliation
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub charts: Arc<dyn ChartClientFactory>,
}

impl Context {
    pub fn new(store: Arc<dyn ObjectStore>, charts: Arc<dyn ChartClientFactory>) -> Self {
        Self { store, charts }
    }
}

enum PassError {
    /// Terminal until the application or its framework changes
    Failed(String),
    /// Retried on the next pass
    Pending(String),
}

fn failed(error: impl Into<KubeError>) -> PassError {
    PassError::Failed(error.into().to_string())
}

/// Run one reconciliation pass and return the status to record
#[instrument(skip(application, ctx), fields(app = %application.name_any(), framework = %application.spec.framework))]
pub async fn reconcile_application(application: &Application, ctx: &Context) -> ApplicationStatus {
    let status = match sync_application(application, ctx).await {
        Ok(()) => {
            info!("application reconciled");
            ApplicationStatus::succeeded()
        }
        Err(PassError::Failed(message)) => {
            warn!(%message, "application failed");
            ApplicationStatus::failed(message)
        }
        Err(PassError::Pending(message)) => {
            warn!(%message, "application pending");
            ApplicationStatus::pending(message)
        }
    };
    status.with_generation(application.metadata.generation)
}

async fn sync_application(application: &Application, ctx: &Context) -> std::result::Result<(), PassError> {
    let name = application.name_any();
    let components = ctx.store.list_components().await.map_err(failed)?;

    let framework_name = &application.spec.framework;
    let framework = ctx
        .store
        .get_framework(framework_name)
        .await
        .map_err(failed)?
        .ok_or_else(|| {
            failed(KubeError::FrameworkNotFound {
                name: framework_name.clone(),
            })
        })?;

    let namespace = framework
        .bound_namespace()
        .ok_or_else(|| {
            failed(KubeError::NamespaceNotLinked {
                framework: framework_name.clone(),
            })
        })?
        .to_string();

    if framework.quota_exhausted_for(&name) {
        return Err(failed(KubeError::QuotaExceeded));
    }

    let charts = ctx.charts.for_namespace(&namespace).await.map_err(failed)?;

    let registry = registry_from_components(components);
    let chart = ApplicationChart::new(application, &registry).map_err(failed)?;
    let config = ChartConfig::for_application(application);
    debug!(
        %namespace,
        templates = chart.templates().len(),
        chart_version = %config.chart_version(),
        "chart assembled"
    );

    let release = charts
        .update_application_chart(&chart, &config, &ApplyOptions::default())
        .await
        .map_err(|e| PassError::Pending(format!("failed to update helm chart: {}", e)))?;
    debug!(revision = release.version, "chart applied");

    match link_application(ctx.store.as_ref(), framework, &name).await {
        Ok(()) => release_previous_frameworks(application, &namespace, ctx)
            .await
            .map_err(|e| PassError::Pending(e.to_string())),
        Err(KubeError::QuotaExceeded) => {
            // Another app took the last slot while the chart was being applied
            if let Err(e) = charts.delete_chart(&name).await {
                warn!(error = %e, %namespace, "could not remove the chart of an app over quota");
            }
            Err(failed(KubeError::QuotaExceeded))
        }
        Err(e) => Err(PassError::Pending(e.to_string())),
    }
}

/// Remove the app from every framework it was moved away from
///
/// The chart is deleted in the old namespace unless it is `current_namespace`.
async fn release_previous_frameworks(application: &Application, current_namespace: &str, ctx: &Context) -> Result<()> {
    let name = application.name_any();
    let previous = ctx
        .store
        .list_frameworks()
        .await?
        .into_iter()
        .filter(|fw| fw.name_any() != application.spec.framework && fw.has_app(&name));
    for framework in previous {
        info!(previous = %framework.name_any(), "application moved to another framework");
        remove_from_framework(&name, framework, Some(current_namespace), ctx).await?;
    }
    Ok(())
}

/// Delete the app's chart in the framework namespace, then unlink it
async fn remove_from_framework(
    name: &str,
    framework: Framework,
    keep_namespace: Option<&str>,
    ctx: &Context,
) -> Result<()> {
    let namespace = framework
        .bound_namespace()
        .unwrap_or(&framework.spec.namespace_name)
        .to_string();
    if keep_namespace != Some(namespace.as_str()) {
        let charts = ctx.charts.for_namespace(&namespace).await?;
        charts.delete_chart(name).await?;
    }

    let framework_name = framework.name_any();
    unlink_application(ctx.store.as_ref(), framework, name).await?;
    info!(framework = %framework_name, %namespace, "application removed from framework");
    Ok(())
}

/// Add `app` to the framework's app list
///
/// The quota is checked again against every copy read, so a concurrent link
/// taking the last slot fails with [`KubeError::QuotaExceeded`].
pub async fn link_application(store: &dyn ObjectStore, framework: Framework, app: &str) -> Result<()> {
    update_framework_apps(store, framework, |fw| {
        if fw.quota_exhausted_for(app) {
            return Err(KubeError::QuotaExceeded);
        }
        Ok(fw.link_app(app))
    })
    .await
}

/// Remove `app` from the framework's app list
pub async fn unlink_application(store: &dyn ObjectStore, framework: Framework, app: &str) -> Result<()> {
    update_framework_apps(store, framework, |fw| Ok(fw.unlink_app(app))).await
}

/// Read-modify-write of `status.apps`, retried on conflict
///
/// `change` returns false when there is nothing to write.
async fn update_framework_apps<F>(store: &dyn ObjectStore, mut framework: Framework, change: F) -> Result<()>
where
    F: Fn(&mut Framework) -> Result<bool>,
{
    let name = framework.name_any();
    let mut attempt = 1;
    loop {
        if !change(&mut framework)? {
            return Ok(());
        }

        match store.replace_framework_status(&framework).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_ATTEMPTS => {
                debug!(framework = %name, attempt, "framework changed concurrently, retrying");
                attempt += 1;
                framework = store
                    .get_framework(&name)
                    .await?
                    .ok_or_else(|| KubeError::FrameworkNotFound { name: name.clone() })?;
            }
            Err(e) if e.is_conflict() => {
                return Err(KubeError::ConflictRetriesExhausted {
                    kind: "framework".to_string(),
                    name,
                    attempts: attempt,
                });
            }
            Err(e) => return Err(e),
        }
    }
}

/// Remove a deleted application's chart from every framework listing it
///
/// No such framework is a no-op.
#[instrument(skip(ctx))]
pub async fn cleanup_application(name: &str, ctx: &Context) -> Result<()> {
    let frameworks: Vec<Framework> = ctx
        .store
        .list_frameworks()
        .await?
        .into_iter()
        .filter(|fw| fw.has_app(name))
        .collect();
    if frameworks.is_empty() {
        debug!("no framework lists the application, nothing to clean up");
        return Ok(());
    }

    for framework in frameworks {
        remove_from_framework(name, framework, None, ctx).await?;
    }
    Ok(())
}
