mod accounts;
mod balance;
mod discounts;
mod external;
mod notify;
mod printer_group;
mod site;

pub(crate) use accounts::{
    build_personal_accounts, check_billing_account_presence, commit_personal_accounts,
    force_no_client_account,
};
pub(crate) use balance::check_balance_sufficiency;
pub(crate) use discounts::{apply_free_groups, apply_group_discount};
pub(crate) use external::gate_external_account;
pub use external::{CHARGE_EXTERNAL_FIELD, REMEMBER_DAYS_FIELD};
pub(crate) use notify::notify_printed;
pub(crate) use printer_group::check_account_printer_group;
pub(crate) use site::enforce_site_restriction;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::domain::{JobInputs, PersonalAccounts};
use super::host::HostActions;

/// Whether the remaining rules of a pipeline should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop,
}

/// Configuration problems found while evaluating a job. They are logged and
/// the affected rule step is skipped.
#[derive(Debug, thiserror::Error)]
pub enum PolicyDefect {
    #[error("discount rate {field} for group {group} is not a usable number")]
    InvalidRate { group: String, field: &'static str },
    #[error("standard charge on printer {printer} exceeds the representable range")]
    PrinterRateOverflow { printer: String },
    #[error("printer name pattern {pattern:?} does not compile: {source}")]
    InvalidPrinterPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("remembered choice {raw:?} is malformed")]
    MalformedChoice { raw: String },
    #[error("form field {field} returned unexpected value {value:?}")]
    UnexpectedFormValue { field: &'static str, value: String },
}

/// Billing state threaded through every rule of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    /// Current job cost including every change made so far in this run.
    pub cost: Decimal,
    pub shared_account: Option<String>,
    pub personal_accounts: PersonalAccounts,
    pub canceled: bool,
}

impl PipelineState {
    pub(crate) fn for_job(inputs: &JobInputs<'_>) -> Self {
        Self {
            cost: inputs.job.cost,
            shared_account: inputs.job.shared_account().map(str::to_string),
            personal_accounts: PersonalAccounts::new(),
            canceled: false,
        }
    }

    pub(crate) fn set_cost(&mut self, host: &mut dyn HostActions, cost: Decimal) {
        if cost != self.cost {
            host.set_cost(cost);
            self.cost = cost;
        }
    }

    /// Cancels at most once per run and always asks the pipeline to stop.
    pub(crate) fn cancel(
        &mut self,
        inputs: &JobInputs<'_>,
        host: &mut dyn HostActions,
        reason: &str,
    ) -> Verdict {
        if !self.canceled {
            info!(
                printer = %inputs.printer.name,
                user = %inputs.job.username,
                reason,
                "print job canceled"
            );
            host.cancel_and_log(reason);
            self.canceled = true;
        }
        Verdict::Stop
    }
}

pub(crate) fn report_defect(
    inputs: &JobInputs<'_>,
    host: &mut dyn HostActions,
    defect: &PolicyDefect,
) {
    warn!(
        printer = %inputs.printer.name,
        user = %inputs.job.username,
        %defect,
        "policy configuration defect"
    );
    host.log_debug(&format!("{} - {}", inputs.who(), defect));
}

pub(crate) fn format_cost(cost: Decimal) -> String {
    format!("${:.2}", cost)
}
