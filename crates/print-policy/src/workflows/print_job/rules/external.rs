use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::accounts::user_may_bill_externally;
use super::{report_defect, PipelineState, PolicyDefect, Verdict};
use crate::config::ExternalAccountOptions;
use crate::workflows::print_job::choice::ChoiceToken;
use crate::workflows::print_job::domain::{JobInputs, EXTERNAL_ACCOUNT};
use crate::workflows::print_job::host::{
    FormChoice, FormField, FormResponse, FormSpec, HostActions, PromptOutcome,
};

pub const CHARGE_EXTERNAL_FIELD: &str = "chargeExternal";
pub const REMEMBER_DAYS_FIELD: &str = "rememberDays";

/// Lets qualifying users decide whether this job may be billed to the
/// externally billed account, remembering the answer when asked to.
pub(crate) fn gate_external_account(
    inputs: &JobInputs<'_>,
    options: &ExternalAccountOptions,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !options.enabled || !inputs.printer.is_in_group(&options.printer_group) {
        return Verdict::Continue;
    }
    if state.shared_account.is_some() {
        return Verdict::Continue;
    }
    if !user_may_bill_externally(inputs, options) {
        debug!(
            user = %inputs.job.username,
            "user not enabled for external billing"
        );
        return Verdict::Continue;
    }

    let stored = inputs.user.property(&options.choice_property);
    let (remembered, defect) = ChoiceToken::load(stored.as_deref(), inputs.now);
    if let Some(defect) = defect {
        report_defect(inputs, host, &defect);
    }
    let mut choice = remembered.map(|token| token.value);

    let wants_prompt = remembered.is_none() || options.always_prompt;
    if options.prompt_choice && wants_prompt && inputs.is_client_running() {
        let form = choice_form(options, choice.unwrap_or(options.default_enabled));
        match host.prompt_for_form(&choice_prompt_html(inputs), &form) {
            PromptOutcome::Submitted(response) => {
                match read_choice(&response, options, inputs.now) {
                    Ok(answer) => {
                        if let Some(token) = answer.remember {
                            host.set_property_on_completion(
                                &options.choice_property,
                                &token.to_string(),
                                true,
                            );
                        }
                        choice = Some(answer.value);
                    }
                    Err(defect) => report_defect(inputs, host, &defect),
                }
            }
            PromptOutcome::Timeout | PromptOutcome::Cancel => {
                debug!(
                    user = %inputs.job.username,
                    "external account prompt unanswered; keeping remembered choice"
                );
            }
        }
    }

    if !choice.unwrap_or(options.default_enabled) && state.personal_accounts.remove(EXTERNAL_ACCOUNT)
    {
        info!(
            printer = %inputs.printer.name,
            user = %inputs.job.username,
            "external account disabled for this job"
        );
    }

    Verdict::Continue
}

fn choice_prompt_html(inputs: &JobInputs<'_>) -> String {
    format!(
        "<html>Your job <strong>\"{}\"</strong> on <strong>\"{}\"</strong> can be paid now \
         from your external account, or billed later.</html>",
        inputs.job.document_name, inputs.printer.name
    )
}

fn choice_form(options: &ExternalAccountOptions, current: bool) -> FormSpec {
    let remember = options
        .remember_days
        .iter()
        .map(|days| FormChoice {
            value: days.to_string(),
            label: match days {
                0 => "Ask me every time".to_string(),
                1 => "Remember for 1 day".to_string(),
                days => format!("Remember for {days} days"),
            },
        })
        .collect();

    FormSpec {
        title: "Choose how to pay for printing".to_string(),
        fields: vec![
            FormField {
                name: CHARGE_EXTERNAL_FIELD.to_string(),
                label: "Payment".to_string(),
                options: vec![
                    FormChoice {
                        value: "yes".to_string(),
                        label: "Pay now from my external account".to_string(),
                    },
                    FormChoice {
                        value: "no".to_string(),
                        label: "Bill me later".to_string(),
                    },
                ],
                default: Some(if current { "yes" } else { "no" }.to_string()),
            },
            FormField {
                name: REMEMBER_DAYS_FIELD.to_string(),
                label: "Remember this choice".to_string(),
                options: remember,
                default: options.remember_days.first().map(u32::to_string),
            },
        ],
    }
}

struct ChoiceAnswer {
    value: bool,
    /// Token to persist; absent when the answer is for this job only.
    remember: Option<ChoiceToken>,
}

/// Validates a submitted choice form. Day counts must be one of the offered
/// options (only `0` when none are configured) and yield a representable expiry.
fn read_choice(
    response: &FormResponse,
    options: &ExternalAccountOptions,
    now: DateTime<Utc>,
) -> Result<ChoiceAnswer, PolicyDefect> {
    let raw_value = response.get(CHARGE_EXTERNAL_FIELD).unwrap_or_default();
    let value = match raw_value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => true,
        "no" | "false" => false,
        _ => {
            return Err(PolicyDefect::UnexpectedFormValue {
                field: CHARGE_EXTERNAL_FIELD,
                value: raw_value.to_string(),
            })
        }
    };

    let raw_days = response.get(REMEMBER_DAYS_FIELD).unwrap_or("0");
    let unexpected_days = || PolicyDefect::UnexpectedFormValue {
        field: REMEMBER_DAYS_FIELD,
        value: raw_days.to_string(),
    };
    let days = raw_days
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|days| {
            if options.remember_days.is_empty() {
                *days == 0
            } else {
                options.remember_days.contains(days)
            }
        })
        .ok_or_else(unexpected_days)?;

    let remember = if days > 0 || options.always_prompt {
        Some(ChoiceToken::remembered(value, days, now).ok_or_else(unexpected_days)?)
    } else {
        None
    };

    Ok(ChoiceAnswer { value, remember })
}
