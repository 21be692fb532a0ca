use crate::infra::{evaluate_event, JobEvent};
use clap::{Args, ValueEnum};
use print_policy::config::{AppConfig, PolicyOptionsPatch};
use print_policy::error::AppError;
use print_policy::workflows::print_job::PipelineStage;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON job event (job, printer, client, user, scripted host answers)
    #[arg(long)]
    pub(crate) event: PathBuf,
    /// Hook to run
    #[arg(long, value_enum, default_value_t = StageArg::Post)]
    pub(crate) stage: StageArg,
    /// Site options file; defaults to POLICY_OPTIONS_PATH
    #[arg(long)]
    pub(crate) options: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum StageArg {
    Pre,
    Post,
}

impl From<StageArg> for PipelineStage {
    fn from(value: StageArg) -> Self {
        match value {
            StageArg::Pre => PipelineStage::PreSelection,
            StageArg::Post => PipelineStage::PostSelection,
        }
    }
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        event,
        stage,
        options,
    } = args;

    let site_options = match options {
        Some(path) => PolicyOptionsPatch::from_path(&path)?,
        None => AppConfig::load()?.policy.site_options()?,
    };

    let raw = std::fs::read_to_string(&event)?;
    let event: JobEvent = serde_json::from_str(&raw)?;
    let report = evaluate_event(stage.into(), event, &site_options);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
