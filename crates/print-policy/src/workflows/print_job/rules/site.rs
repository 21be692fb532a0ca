use tracing::debug;

use super::{report_defect, PipelineState, PolicyDefect, Verdict};
use crate::config::SiteRestrictionOptions;
use crate::workflows::print_job::domain::JobInputs;
use crate::workflows::print_job::host::HostActions;

/// Keeps site restricted users on printers of the sites they belong to.
///
/// A printer name that does not match the naming pattern is unrestricted.
pub(crate) fn enforce_site_restriction(
    inputs: &JobInputs<'_>,
    options: &SiteRestrictionOptions,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !inputs.user.is_in_group(&options.restrict_group_name) {
        return Verdict::Continue;
    }

    let pattern = match options.printer_pattern() {
        Ok(pattern) => pattern,
        Err(source) => {
            report_defect(
                inputs,
                host,
                &PolicyDefect::InvalidPrinterPattern {
                    pattern: options.printer_name_regexp.clone(),
                    source,
                },
            );
            return Verdict::Continue;
        }
    };

    let site = pattern
        .captures(&inputs.printer.name)
        .and_then(|captures| captures.get(1))
        .map(|site| site.as_str())
        .filter(|site| !site.is_empty());
    let Some(site) = site else {
        debug!(printer = %inputs.printer.name, "printer name carries no site token");
        return Verdict::Continue;
    };

    let site_group = options.site_group_name(site);
    if inputs.user.is_in_group(&site_group) {
        debug!(
            printer = %inputs.printer.name,
            user = %inputs.job.username,
            group = %site_group,
            "site restricted user allowed at this site"
        );
        return Verdict::Continue;
    }

    let verdict = state.cancel(
        inputs,
        host,
        &format!("Site restricted user is not in group {site_group}"),
    );
    if inputs.is_client_running() {
        host.send_message(&format!(
            "PRINTING DENIED\n\nYou do not have permission to print on \"{}\".",
            inputs.printer.name
        ));
    }
    verdict
}
