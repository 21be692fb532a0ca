use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::{resolve, PolicyOptions, PolicyOptionsPatch};
use crate::workflows::print_job::domain::{
    ClientContext, JobInputs, JobSnapshot, PageRates, PrinterContext,
};
use crate::workflows::print_job::pipeline::{PipelineOutcome, PipelineStage, PolicyEngine};
use crate::workflows::print_job::recording::{HostAction, HostScript, RecordingHost, StaticUser};
use crate::workflows::print_job::rules::PipelineState;

pub(super) const PRINTER: &str = "ug-250-color";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn job(cost: Decimal) -> JobSnapshot {
    JobSnapshot {
        cost,
        total_color_pages: 2,
        total_grayscale_pages: 10,
        is_analysis_complete: true,
        is_web_print_job: false,
        selected_shared_account_name: None,
        printer_name: PRINTER.to_string(),
        document_name: "thesis.pdf".to_string(),
        username: "alice".to_string(),
        client_ip: "10.0.0.12".to_string(),
    }
}

pub(super) fn printer(groups: &[&str]) -> PrinterContext {
    PrinterContext {
        name: PRINTER.to_string(),
        groups: groups.iter().map(|group| group.to_string()).collect(),
        rates: PageRates {
            grayscale: dec!(0.10),
            color: dec!(0.50),
        },
    }
}

pub(super) fn options(raw: &str) -> PolicyOptions {
    let patch = PolicyOptionsPatch::from_json_str(raw).expect("valid options document");
    resolve(PolicyOptions::default(), Some(patch))
}

/// One job event plus the host it runs against.
pub(super) struct Scenario {
    pub(super) job: JobSnapshot,
    pub(super) printer: PrinterContext,
    pub(super) client: ClientContext,
    pub(super) user: StaticUser,
    pub(super) script: HostScript,
}

impl Scenario {
    pub(super) fn new(cost: Decimal) -> Self {
        Self {
            job: job(cost),
            printer: printer(&[]),
            client: ClientContext { running: true },
            user: StaticUser::default(),
            script: HostScript::default(),
        }
    }

    pub(super) fn with_groups(mut self, groups: &[&str]) -> Self {
        self.user = StaticUser::in_groups(groups.iter().copied());
        self
    }

    pub(super) fn with_printer_groups(mut self, groups: &[&str]) -> Self {
        self.printer = printer(groups);
        self
    }

    pub(super) fn headless(mut self) -> Self {
        self.client.running = false;
        self
    }

    pub(super) fn with_shared_account(mut self, account: &str) -> Self {
        self.job.selected_shared_account_name = Some(account.to_string());
        self
    }

    pub(super) fn inputs(&self) -> JobInputs<'_> {
        JobInputs {
            job: &self.job,
            printer: &self.printer,
            client: self.client,
            user: &self.user,
            now: now(),
        }
    }

    pub(super) fn state(&self) -> PipelineState {
        PipelineState::for_job(&self.inputs())
    }

    pub(super) fn host(&self) -> RecordingHost {
        RecordingHost::new(self.script.clone())
    }

    pub(super) fn run(
        &self,
        stage: PipelineStage,
        options: PolicyOptions,
    ) -> (PipelineOutcome, RecordingHost) {
        let mut host = self.host();
        let outcome = PolicyEngine::new(options).run(stage, &self.inputs(), &mut host);
        (outcome, host)
    }
}

pub(super) fn messages(host: &RecordingHost) -> Vec<&str> {
    host.actions()
        .iter()
        .filter_map(|action| match action {
            HostAction::SendMessage { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

pub(super) fn prompts(host: &RecordingHost) -> usize {
    host.actions()
        .iter()
        .filter(|action| {
            matches!(
                action,
                HostAction::PromptOk { .. } | HostAction::PromptForForm { .. }
            )
        })
        .count()
}

pub(super) fn stored_properties(host: &RecordingHost) -> Vec<(String, String, bool)> {
    host.actions()
        .iter()
        .filter_map(|action| match action {
            HostAction::SetPropertyOnCompletion {
                key,
                value,
                persist_if_canceled,
            } => Some((key.clone(), value.clone(), *persist_if_canceled)),
            _ => None,
        })
        .collect()
}
