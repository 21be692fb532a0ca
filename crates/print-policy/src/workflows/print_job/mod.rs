//! Policy pipelines run for every print job.
//!
//! The host calls [`evaluate_pre_selection`] when a job is submitted and
//! [`evaluate_post_selection`] once a billing account has been chosen. Both
//! run a fixed sequence of rules that share one [`PipelineState`]; a rule that
//! cancels the job stops the rest of its pipeline.

pub mod choice;
pub mod domain;
pub mod host;
pub mod pipeline;
pub mod recording;
mod rules;

#[cfg(test)]
mod tests;

pub use choice::ChoiceToken;
pub use domain::{
    ClientContext, JobInputs, JobSnapshot, PageRates, PersonalAccounts, PrinterContext,
    BANNER_ACCOUNT, DEFAULT_ACCOUNT, EXTERNAL_ACCOUNT,
};
pub use host::{
    FormChoice, FormField, FormResponse, FormSpec, HostActions, HostError, PromptOutcome,
    UserContext,
};
pub use pipeline::{
    evaluate_post_selection, evaluate_pre_selection, PipelineOutcome, PipelineStage,
    PolicyEngine,
};
pub use recording::{HostAction, HostScript, RecordingHost, StaticUser};
pub use rules::{
    PipelineState, PolicyDefect, Verdict, CHARGE_EXTERNAL_FIELD, REMEMBER_DAYS_FIELD,
};
