use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{format_cost, PipelineState, Verdict};
use crate::config::ExternalAccountOptions;
use crate::workflows::print_job::domain::{
    JobInputs, BANNER_ACCOUNT, DEFAULT_ACCOUNT, EXTERNAL_ACCOUNT,
};
use crate::workflows::print_job::host::HostActions;

/// Warns the user when the externally billed account cannot cover the job.
///
/// Advisory only: the job is neither canceled nor re-billed. Declining balance
/// and deferred billing accounts make the check moot, so their presence skips it.
pub(crate) fn check_balance_sufficiency(
    inputs: &JobInputs<'_>,
    options: &ExternalAccountOptions,
    state: &PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    let accounts = &state.personal_accounts;
    let applicable = inputs.is_client_running()
        && inputs.job.is_analysis_complete
        && state.shared_account.is_none()
        && accounts.contains(EXTERNAL_ACCOUNT)
        && !accounts.contains(DEFAULT_ACCOUNT)
        && !accounts.contains(BANNER_ACCOUNT);
    if !applicable {
        return Verdict::Continue;
    }

    let mut total = Decimal::ZERO;
    for account in accounts.iter().filter(|account| *account != EXTERNAL_ACCOUNT) {
        match inputs.user.balance(account) {
            Ok(balance) => total = total.saturating_add(balance),
            Err(error) => {
                warn!(user = %inputs.job.username, account, %error, "balance lookup failed");
                host.log_error(&format!(
                    "{} - balance lookup for {account} failed: {error}",
                    inputs.who()
                ));
            }
        }
    }

    match host.external_balance(&options.balance_provider, &inputs.job.username) {
        Ok(Some(balance)) => total = total.saturating_add(balance),
        Ok(None) => {}
        Err(error) => {
            warn!(
                user = %inputs.job.username,
                provider = %options.balance_provider,
                %error,
                "external balance lookup failed"
            );
            host.log_error(&format!(
                "{} - {} balance lookup failed: {error}",
                inputs.who(),
                options.balance_provider
            ));
        }
    }

    if state.cost <= total {
        debug!(user = %inputs.job.username, cost = %state.cost, %total, "balance covers job");
        return Verdict::Continue;
    }

    let shortfall = state.cost.saturating_sub(total);
    host.prompt_ok(&format!(
        "<html>Your available balance of <strong>{}</strong> is <strong>{}</strong> short \
         of the <strong>{}</strong> cost of this job. Add funds at \
         <a href=\"{url}\">{url}</a>.</html>",
        format_cost(total),
        format_cost(shortfall),
        format_cost(state.cost),
        url = options.top_up_url
    ));

    Verdict::Continue
}
