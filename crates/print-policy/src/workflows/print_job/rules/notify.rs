use super::{format_cost, PipelineState, Verdict};
use crate::workflows::print_job::domain::JobInputs;
use crate::workflows::print_job::host::HostActions;

pub(crate) fn notify_printed(
    inputs: &JobInputs<'_>,
    state: &PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !inputs.is_client_running() || !inputs.job.is_analysis_complete {
        return Verdict::Continue;
    }

    host.send_message(&format!(
        "The following job is queued for printing on {}: {} (cost: {}).",
        inputs.job.printer_name,
        inputs.job.document_name,
        format_cost(state.cost)
    ));

    Verdict::Continue
}
