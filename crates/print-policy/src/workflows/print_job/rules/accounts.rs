use tracing::{debug, info};

use super::{PipelineState, Verdict};
use crate::config::{ExternalAccountOptions, NoClientAccount, PersonalAccountOptions};
use crate::workflows::print_job::domain::{
    JobInputs, PersonalAccounts, BANNER_ACCOUNT, DEFAULT_ACCOUNT, EXTERNAL_ACCOUNT,
};
use crate::workflows::print_job::host::HostActions;

/// Gives headless and web submissions a deterministic billing destination.
pub(crate) fn force_no_client_account(
    inputs: &JobInputs<'_>,
    account: &NoClientAccount,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if state.shared_account.is_some() || inputs.is_client_running() {
        return Verdict::Continue;
    }

    match account {
        NoClientAccount::Personal => {
            info!(user = %inputs.job.username, "no client session; charging personal account");
            host.charge_to_personal_account();
        }
        NoClientAccount::Shared(name) => {
            info!(user = %inputs.job.username, account = %name, "no client session; charging shared account");
            host.charge_to_shared_account(name);
            state.shared_account = Some(name.clone());
        }
    }

    Verdict::Continue
}

pub(crate) fn user_may_bill_externally(
    inputs: &JobInputs<'_>,
    external: &ExternalAccountOptions,
) -> bool {
    external
        .enable_user_groups
        .iter()
        .all(|group| inputs.user.is_in_group(group))
}

/// Builds the charge priority list for this run.
///
/// Caller-named accounts come first. With `add_defaults`, the externally
/// billed account follows when both printer and user qualify, then one entry
/// per `Billing:Banner` / `Billing:Default` printer tag. Printers without any
/// billing tag fall back to the declining balance account.
pub(crate) fn build_personal_accounts(
    inputs: &JobInputs<'_>,
    personal: &PersonalAccountOptions,
    external: &ExternalAccountOptions,
) -> PersonalAccounts {
    let mut accounts: PersonalAccounts = personal.names.iter().collect();

    if !personal.add_defaults {
        return accounts;
    }

    let external_printer = inputs.printer.is_in_group(&external.printer_group);
    if external.enabled && external_printer && user_may_bill_externally(inputs, external) {
        accounts.push(EXTERNAL_ACCOUNT);
    }

    let mut tagged = false;
    for tag in inputs.printer.billing_tags() {
        tagged = true;
        for account in [BANNER_ACCOUNT, DEFAULT_ACCOUNT] {
            if tag.eq_ignore_ascii_case(account) {
                accounts.push(account);
            }
        }
    }

    if !tagged && !external_printer {
        accounts.push(DEFAULT_ACCOUNT);
    }

    accounts
}

pub(crate) fn commit_personal_accounts(state: &PipelineState, host: &mut dyn HostActions) {
    if state.personal_accounts.is_empty() {
        return;
    }
    host.change_personal_account_charge_priority(state.personal_accounts.as_slice());
}

/// Cancels jobs that cost money but have nowhere to be charged.
pub(crate) fn check_billing_account_presence(
    inputs: &JobInputs<'_>,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !inputs.job.is_analysis_complete || state.shared_account.is_some() {
        return Verdict::Continue;
    }

    if state.cost <= rust_decimal::Decimal::ZERO || !state.personal_accounts.is_empty() {
        debug!(
            printer = %inputs.printer.name,
            user = %inputs.job.username,
            "billing destination available"
        );
        return Verdict::Continue;
    }

    let verdict = state.cancel(inputs, host, "No personal account available for billing");
    if inputs.is_client_running() {
        host.send_message(&format!(
            "PRINTING DENIED\n\nYou do not have an account that can be charged for printing on \"{}\".",
            inputs.printer.name
        ));
    }
    verdict
}
