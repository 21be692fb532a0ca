use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use print_policy::config::{PolicyOptions, PolicyOptionsPatch};
use print_policy::workflows::print_job::{
    ClientContext, HostAction, HostScript, JobInputs, JobSnapshot, PipelineOutcome,
    PipelineStage, PolicyEngine, PrinterContext, RecordingHost, StaticUser,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Overrides from `POLICY_OPTIONS_PATH`, applied under per-request options.
    pub(crate) site_options: Arc<PolicyOptionsPatch>,
}

/// Everything the host would hand the policy for one hook call, plus the
/// scripted answers a dry run needs in place of a live client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobEvent {
    pub(crate) job: JobSnapshot,
    pub(crate) printer: PrinterContext,
    #[serde(default)]
    pub(crate) client: ClientContext,
    #[serde(default)]
    pub(crate) user: StaticUser,
    #[serde(default)]
    pub(crate) host: HostScript,
    #[serde(default)]
    pub(crate) options: Option<PolicyOptionsPatch>,
    #[serde(default)]
    pub(crate) evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationReport {
    pub(crate) stopped: bool,
    pub(crate) outcome: PipelineOutcome,
    pub(crate) actions: Vec<HostAction>,
}

pub(crate) fn evaluate_event(
    stage: PipelineStage,
    event: JobEvent,
    site_options: &PolicyOptionsPatch,
) -> EvaluationReport {
    let JobEvent {
        job,
        printer,
        client,
        user,
        host,
        options,
        evaluated_at,
    } = event;

    let layers = std::iter::once(site_options.clone()).chain(options);
    let engine = PolicyEngine::new(PolicyOptions::layered(layers));
    let mut host = RecordingHost::new(host);
    let inputs = JobInputs {
        job: &job,
        printer: &printer,
        client,
        user: &user,
        now: evaluated_at.unwrap_or_else(Utc::now),
    };

    let outcome = engine.run(stage, &inputs, &mut host);
    let actions = host.into_actions();
    info!(
        stage = stage.label(),
        printer = %printer.name,
        user = %job.username,
        stopped = outcome.stopped,
        actions = actions.len(),
        "job event evaluated"
    );

    EvaluationReport {
        stopped: outcome.stopped,
        outcome,
        actions,
    }
}
