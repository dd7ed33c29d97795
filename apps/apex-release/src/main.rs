use clap::{Parser, Subcommand};

use apex_release::error::CliResult;
use apex_release::{evidence, guardrails, policy};

#[derive(Parser)]
#[command(name = "apex-release", about = "Release evidence and promotion gate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and sign the evidence manifest for the current commit.
    Evidence(evidence::EvidenceArgs),
    /// Sample the preview deployment and record guardrail metrics.
    Guardrails(guardrails::GuardrailsArgs),
    /// Evaluate the promotion policy, locally or via OPA.
    Policy(policy::PolicyArgs),
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Evidence(args) => evidence::run(args),
        Command::Guardrails(args) => guardrails::run(args).await,
        Command::Policy(args) => policy::run(args).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.print();
        std::process::exit(e.exit_code());
    }
}
