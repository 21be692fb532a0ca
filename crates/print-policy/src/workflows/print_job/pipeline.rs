use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info_span};

use super::domain::JobInputs;
use super::host::HostActions;
use super::rules::{
    apply_free_groups, apply_group_discount, build_personal_accounts,
    check_account_printer_group, check_balance_sufficiency, check_billing_account_presence,
    commit_personal_accounts, enforce_site_restriction, force_no_client_account,
    gate_external_account, notify_printed, PipelineState, Verdict,
};
use crate::config::{resolve, ExternalGateStage, PolicyOptions, PolicyOptionsPatch};

/// Point in the job lifecycle at which the host calls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Job submission, before a billing account is chosen.
    PreSelection,
    /// After the user or auto-selection picked an account.
    PostSelection,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PreSelection => "pre-selection",
            Self::PostSelection => "post-selection",
        }
    }
}

/// What a pipeline run decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub stage: PipelineStage,
    /// The host should not run any further job hooks.
    pub stopped: bool,
    pub canceled: bool,
    pub cost: Decimal,
    pub shared_account: Option<String>,
    pub personal_accounts: Vec<String>,
}

/// Runs the fixed rule sequence for each stage against resolved options.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    options: PolicyOptions,
}

impl PolicyEngine {
    pub fn new(options: PolicyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PolicyOptions {
        &self.options
    }

    pub fn run(
        &self,
        stage: PipelineStage,
        inputs: &JobInputs<'_>,
        host: &mut dyn HostActions,
    ) -> PipelineOutcome {
        let span = info_span!(
            "print_job_policy",
            stage = stage.label(),
            printer = %inputs.printer.name,
            user = %inputs.job.username,
        );
        let _entered = span.enter();

        let mut state = PipelineState::for_job(inputs);
        let verdict = match stage {
            PipelineStage::PreSelection => self.pre_selection(inputs, &mut state, host),
            PipelineStage::PostSelection => self.post_selection(inputs, &mut state, host),
        };

        debug!(?verdict, cost = %state.cost, canceled = state.canceled, "pipeline finished");

        PipelineOutcome {
            stage,
            stopped: verdict == Verdict::Stop,
            canceled: state.canceled,
            cost: state.cost,
            shared_account: state.shared_account,
            personal_accounts: state.personal_accounts.into_vec(),
        }
    }

    pub fn run_pre_selection(
        &self,
        inputs: &JobInputs<'_>,
        host: &mut dyn HostActions,
    ) -> PipelineOutcome {
        self.run(PipelineStage::PreSelection, inputs, host)
    }

    pub fn run_post_selection(
        &self,
        inputs: &JobInputs<'_>,
        host: &mut dyn HostActions,
    ) -> PipelineOutcome {
        self.run(PipelineStage::PostSelection, inputs, host)
    }

    fn pre_selection(
        &self,
        inputs: &JobInputs<'_>,
        state: &mut PipelineState,
        host: &mut dyn HostActions,
    ) -> Verdict {
        let options = &self.options;

        self.billing_destination(PipelineStage::PreSelection, inputs, state, host);
        self.cost_adjustments(inputs, state, host);

        if let Some(site) = &options.site_restrict_users {
            if enforce_site_restriction(inputs, site, state, host) == Verdict::Stop {
                return Verdict::Stop;
            }
        }

        if options.notify_printed {
            return notify_printed(inputs, state, host);
        }

        Verdict::Continue
    }

    fn post_selection(
        &self,
        inputs: &JobInputs<'_>,
        state: &mut PipelineState,
        host: &mut dyn HostActions,
    ) -> Verdict {
        let options = &self.options;

        self.billing_destination(PipelineStage::PostSelection, inputs, state, host);
        self.cost_adjustments(inputs, state, host);

        if let Some(site) = &options.site_restrict_users {
            if enforce_site_restriction(inputs, site, state, host) == Verdict::Stop {
                return Verdict::Stop;
            }
        }

        if options.check_account_printer_group
            && check_account_printer_group(inputs, state, host) == Verdict::Stop
        {
            return Verdict::Stop;
        }

        if check_billing_account_presence(inputs, state, host) == Verdict::Stop {
            return Verdict::Stop;
        }

        if options.external_account.check_balance {
            check_balance_sufficiency(inputs, &options.external_account, state, host);
        }

        if options.notify_printed {
            return notify_printed(inputs, state, host);
        }

        Verdict::Continue
    }

    /// Forced account, priority list, optional external gate, then commit.
    fn billing_destination(
        &self,
        stage: PipelineStage,
        inputs: &JobInputs<'_>,
        state: &mut PipelineState,
        host: &mut dyn HostActions,
    ) {
        let options = &self.options;

        if let Some(account) = &options.no_client_account {
            force_no_client_account(inputs, account, state, host);
        }

        state.personal_accounts =
            build_personal_accounts(inputs, &options.personal_accounts, &options.external_account);

        let gate_stage = match options.external_account.stage {
            ExternalGateStage::PreSelection => PipelineStage::PreSelection,
            ExternalGateStage::PostSelection => PipelineStage::PostSelection,
        };
        if gate_stage == stage {
            gate_external_account(inputs, &options.external_account, state, host);
        }

        commit_personal_accounts(state, host);
    }

    fn cost_adjustments(
        &self,
        inputs: &JobInputs<'_>,
        state: &mut PipelineState,
        host: &mut dyn HostActions,
    ) {
        if let Some(free) = &self.options.free_groups {
            apply_free_groups(inputs, free, state, host);
        }
        if let Some(groups) = &self.options.discount_groups {
            apply_group_discount(inputs, groups, state, host);
        }
    }
}

/// Submission hook. Returns `true` when the host should stop processing the job.
pub fn evaluate_pre_selection(
    inputs: &JobInputs<'_>,
    host: &mut dyn HostActions,
    options: Option<PolicyOptionsPatch>,
) -> bool {
    PolicyEngine::new(resolve(PolicyOptions::default(), options))
        .run_pre_selection(inputs, host)
        .stopped
}

/// Account-selection hook. Returns `true` when the host should stop processing the job.
pub fn evaluate_post_selection(
    inputs: &JobInputs<'_>,
    host: &mut dyn HostActions,
    options: Option<PolicyOptionsPatch>,
) -> bool {
    PolicyEngine::new(resolve(PolicyOptions::default(), options))
        .run_post_selection(inputs, host)
        .stopped
}
