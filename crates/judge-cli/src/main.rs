mod logging;
mod provider;
mod review;

use clap::Parser;
use judge_agent::{
    CoordinatorProfile, DEFAULT_MAX_TOKENS, GitRepository, RepositoryConfig, Session,
    SessionConfig, Specialist, SpecialistKind, TracingEventEmitter, build_review_registry,
    judge_prompt,
};
use provider::{ProviderKind, ProviderSelection};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "judge")]
#[command(about = "Multi-agent code review of the changes between two git branches")]
struct Cli {
    /// Branch containing the changes.
    #[arg(short, long)]
    source: String,
    /// Branch to compare against.
    #[arg(short, long)]
    target: String,
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,
    /// Model provider. Detected from the available API keys when omitted.
    #[arg(short, long, value_enum)]
    provider: Option<ProviderKind>,
    #[arg(short, long)]
    model: Option<String>,
    /// Project notes (language, architecture, conventions) given to every reviewer.
    #[arg(long)]
    notes: Option<String>,
    /// Maximum action cycles the coordinator may run per round.
    #[arg(long, default_value_t = 25)]
    max_iterations: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let selection = provider::select_provider(cli.provider, cli.model.clone(), |name| {
        std::env::var(name).ok()
    })?;
    tracing::debug!(provider = %selection.kind, model = %selection.model, "provider selected");

    let repository =
        GitRepository::open(RepositoryConfig::new(&cli.repo)).map_err(|error| error.to_string())?;
    let notes = cli.notes.as_deref();
    let session = start_session(&selection, repository, notes, cli.max_iterations)?;

    println!(
        "Reviewing {} against {} with {} ({})",
        cli.source, cli.target, selection.kind, selection.model
    );
    review::run_interactive(session, &cli.source, &cli.target, notes).await
}

fn start_session(
    selection: &ProviderSelection,
    repository: GitRepository,
    notes: Option<&str>,
    max_iterations: usize,
) -> Result<Session, String> {
    let client = provider::build_client(selection).map_err(|error| error.to_string())?;
    let specialist = |kind| {
        Specialist::new(kind, client.clone(), selection.model.clone())
            .with_provider(selection.kind.as_str())
            .with_max_tokens(DEFAULT_MAX_TOKENS)
            .with_notes(notes)
    };
    let registry = build_review_registry(
        Arc::new(repository),
        Arc::new(specialist(SpecialistKind::Quality)),
        Arc::new(specialist(SpecialistKind::Security)),
    )
    .map_err(|error| error.to_string())?;

    let profile = CoordinatorProfile::new(selection.model.clone(), Arc::new(registry))
        .with_provider(selection.kind.as_str())
        .with_system_prompt(judge_prompt(notes));
    let config = SessionConfig {
        max_action_cycles_per_round: max_iterations,
        ..SessionConfig::default()
    };
    Session::start_with_emitter(profile, client, config, Arc::new(TracingEventEmitter))
        .map_err(|error| error.to_string())
}
