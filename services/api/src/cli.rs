use crate::evaluate::{run_evaluate, EvaluateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use print_policy::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "print-policy",
    about = "Serve or dry-run the print job billing and access policy",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP dry-run service (default command)
    Serve(ServeArgs),
    /// Run one pipeline against a job event file and print the host actions
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::StageArg;

    #[test]
    fn evaluate_accepts_stage_and_files() {
        let cli = Cli::try_parse_from([
            "print-policy",
            "evaluate",
            "--event",
            "job.json",
            "--stage",
            "pre",
            "--options",
            "site.json",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Evaluate(args)) => {
                assert_eq!(args.stage, StageArg::Pre);
                assert_eq!(args.event.to_str(), Some("job.json"));
                assert_eq!(args.options.as_deref().and_then(|p| p.to_str()), Some("site.json"));
            }
            other => panic!("expected evaluate command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["print-policy"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
