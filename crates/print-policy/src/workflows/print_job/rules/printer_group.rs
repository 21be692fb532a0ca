use tracing::debug;

use super::{PipelineState, Verdict};
use crate::workflows::print_job::domain::JobInputs;
use crate::workflows::print_job::host::HostActions;

/// Printer group named by a `[Group] Account name` prefix, if any.
pub(crate) fn account_printer_group(account: &str) -> Option<&str> {
    let rest = account.strip_prefix('[')?;
    let end = rest.find(']')?;
    let group = &rest[..end];
    if group.is_empty() || group.contains('\\') {
        return None;
    }
    Some(group)
}

/// Shared accounts named `[Group] ...` may only be charged on printers in `Group`.
pub(crate) fn check_account_printer_group(
    inputs: &JobInputs<'_>,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    let Some(account) = state.shared_account.clone() else {
        debug!(who = %inputs.who(), "personal account selected");
        return Verdict::Continue;
    };

    let Some(group) = account_printer_group(&account) else {
        debug!(who = %inputs.who(), account = %account, "account not restricted");
        return Verdict::Continue;
    };

    if inputs.printer.is_in_group(group) {
        debug!(who = %inputs.who(), account = %account, "printer is in the account group");
        return Verdict::Continue;
    }

    if inputs.is_client_running() {
        host.prompt_ok(&format!(
            "<html>The shared account <strong>\"{account}\"</strong> cannot be used with this \
             printer. You must resubmit the job and either charge to a different account or \
             charge to your personal account.</html>"
        ));
        state.cancel(
            inputs,
            host,
            &format!("Shared account only for \"{group}\" printers"),
        )
    } else {
        state.cancel(
            inputs,
            host,
            &format!("Shared account only for \"{group}\" printers; client not running"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::account_printer_group;

    #[test]
    fn extracts_bracketed_prefix() {
        assert_eq!(
            account_printer_group("[Department:ICS] Staff Credit"),
            Some("Department:ICS")
        );
        assert_eq!(account_printer_group("Staff Credit"), None);
        assert_eq!(account_printer_group("[] Staff Credit"), None);
        assert_eq!(account_printer_group("[Unclosed Staff Credit"), None);
        assert_eq!(account_printer_group(" [Department:ICS] Staff"), None);
    }
}
