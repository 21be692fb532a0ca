use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{format_cost, report_defect, PipelineState, PolicyDefect, Verdict};
use crate::config::{DiscountRate, FreeGroups};
use crate::workflows::print_job::domain::JobInputs;
use crate::workflows::print_job::host::HostActions;

pub const FREE_GROUP_TEMPLATE: &str = "CITES-PaperCut-FreePrint-%department%";

/// Free group names for a job: the configured list, or one group per
/// department tag on the printer.
pub(crate) fn free_group_names(inputs: &JobInputs<'_>, groups: &FreeGroups) -> Vec<String> {
    match groups {
        FreeGroups::Named(names) => names.clone(),
        FreeGroups::Auto => inputs
            .printer
            .departments()
            .map(|department| {
                FREE_GROUP_TEMPLATE.replacen("%department%", &department.to_uppercase(), 1)
            })
            .collect(),
    }
}

/// Zeroes the cost for members of a free printing group.
///
/// Selecting a shared account opts out of free printing for the job, so a cost
/// zeroed at submission is put back to the printer's standard charge.
pub(crate) fn apply_free_groups(
    inputs: &JobInputs<'_>,
    groups: &FreeGroups,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !inputs.job.is_analysis_complete {
        return Verdict::Continue;
    }

    if let Some(account) = state.shared_account.clone() {
        if state.cost.is_zero() {
            let Some(standard) = inputs.printer.standard_cost(inputs.job) else {
                report_defect(
                    inputs,
                    host,
                    &PolicyDefect::PrinterRateOverflow {
                        printer: inputs.printer.name.clone(),
                    },
                );
                return Verdict::Continue;
            };
            if standard > Decimal::ZERO {
                info!(
                    printer = %inputs.printer.name,
                    user = %inputs.job.username,
                    account = %account,
                    cost = %standard,
                    "shared account selected; restoring standard cost"
                );
                state.set_cost(host, standard);
                host.add_comment(&format!(
                    "Free printing not applied to shared account \"{account}\"; standard cost {}",
                    format_cost(standard)
                ));
            }
        }
        return Verdict::Continue;
    }

    if state.cost <= Decimal::ZERO {
        return Verdict::Continue;
    }

    let names = free_group_names(inputs, groups);
    let Some(group) = names.iter().find(|name| inputs.user.is_in_group(name)) else {
        debug!(
            printer = %inputs.printer.name,
            user = %inputs.job.username,
            candidates = names.len(),
            "user is not in a free printing group"
        );
        return Verdict::Continue;
    };

    let original = state.cost;
    info!(
        printer = %inputs.printer.name,
        user = %inputs.job.username,
        group = %group,
        original = %original,
        "free printing group member"
    );
    state.set_cost(host, Decimal::ZERO);
    host.add_comment(&format!(
        "Free printing for {group}; original cost {}",
        format_cost(original)
    ));

    Verdict::Continue
}

/// Applies the single cheapest discount rate among the user's groups.
///
/// Discounts never stack and never raise the cost: the running cost is the
/// upper bound every candidate has to beat.
pub(crate) fn apply_group_discount(
    inputs: &JobInputs<'_>,
    groups: &BTreeMap<String, DiscountRate>,
    state: &mut PipelineState,
    host: &mut dyn HostActions,
) -> Verdict {
    if !inputs.job.is_analysis_complete {
        return Verdict::Continue;
    }

    let mut best = state.cost;
    let mut winner = None;

    for (group, rate) in groups {
        if !inputs.user.is_in_group(group) {
            continue;
        }

        let Some(bw) = rate.bw.amount() else {
            report_defect(
                inputs,
                host,
                &PolicyDefect::InvalidRate {
                    group: group.clone(),
                    field: "bw",
                },
            );
            continue;
        };
        let Some(color) = rate.color.amount() else {
            report_defect(
                inputs,
                host,
                &PolicyDefect::InvalidRate {
                    group: group.clone(),
                    field: "color",
                },
            );
            continue;
        };

        let grayscale_cost = Decimal::from(inputs.job.total_grayscale_pages).checked_mul(bw);
        let Some(grayscale_cost) = grayscale_cost else {
            report_defect(
                inputs,
                host,
                &PolicyDefect::InvalidRate {
                    group: group.clone(),
                    field: "bw",
                },
            );
            continue;
        };
        let candidate = Decimal::from(inputs.job.total_color_pages)
            .checked_mul(color)
            .and_then(|color_cost| grayscale_cost.checked_add(color_cost));
        let Some(candidate) = candidate else {
            report_defect(
                inputs,
                host,
                &PolicyDefect::InvalidRate {
                    group: group.clone(),
                    field: "color",
                },
            );
            continue;
        };

        if candidate >= Decimal::ZERO && candidate < best {
            best = candidate;
            winner = Some(group);
        }
    }

    let Some(group) = winner else {
        return Verdict::Continue;
    };

    let original = state.cost;
    info!(
        printer = %inputs.printer.name,
        user = %inputs.job.username,
        group = %group,
        original = %original,
        discounted = %best,
        "group discount applied"
    );
    state.set_cost(host, best);
    host.add_comment(&format!(
        "Discount for {group}; original cost {}",
        format_cost(original)
    ));

    Verdict::Continue
}
