use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use rag_lab_core::config::{
    default_state_dir, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION, DEFAULT_CORPUS_DIR, DEFAULT_EMBED_MODEL,
};
use rag_lab_core::{
    platform_prefers_dark, ActionOutcome, ApiClient, FilePreferenceStore, LabConfig, LabSession,
    RacePolicy, ThemePersistence, DEFAULT_TOP_K,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-lab", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Lab backend base URL
    #[arg(long, global = true, env = "RAG_LAB_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Active collection
    #[arg(long, global = true, env = "RAG_LAB_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Corpus directory, as seen by the backend
    #[arg(long, global = true, env = "RAG_LAB_CORPUS_DIR", default_value = DEFAULT_CORPUS_DIR)]
    corpus_dir: String,

    /// Chunk size used when training
    #[arg(long, global = true, env = "RAG_LAB_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u32,

    /// Overlap between consecutive chunks
    #[arg(long, global = true, env = "RAG_LAB_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: u32,

    /// Embedding model identifier
    #[arg(long, global = true, env = "RAG_LAB_EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    embed_model: String,

    /// Chat model identifier
    #[arg(long, global = true, env = "RAG_LAB_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Number of passages to retrieve.
    #[arg(long, global = true, env = "RAG_LAB_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Append to the collection instead of resetting it when training.
    #[arg(long, global = true, default_value_t = false)]
    keep_existing: bool,

    /// Directory holding persisted preferences.
    #[arg(long, global = true, env = "RAG_LAB_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// How late responses are handled when a newer request exists for the same region.
    #[arg(long, global = true, value_enum, default_value_t = RacePolicyArg::LastResponse)]
    race_policy: RacePolicyArg,

    /// Write the whole page as HTML after the command runs.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RacePolicyArg {
    LastResponse,
    LatestRequest,
}

impl From<RacePolicyArg> for RacePolicy {
    fn from(value: RacePolicyArg) -> Self {
        match value {
            RacePolicyArg::LastResponse => RacePolicy::LastResponseWins,
            RacePolicyArg::LatestRequest => RacePolicy::LatestRequestWins,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show the chunk count of the active collection.
    Status,
    /// Show how many models the backend can reach.
    Models,
    /// List the corpus files.
    Corpus,
    /// Refresh status, models and corpus together.
    Dashboard,
    /// Index the corpus into the active collection.
    Train,
    /// Retrieve ranked passages for a query.
    Search {
        #[arg(long)]
        query: String,
    },
    /// Generate an answer grounded on retrieved passages.
    Ask {
        #[arg(long)]
        query: String,
    },
    /// Show or toggle the persisted display theme.
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    Show,
    Toggle,
}

impl Cli {
    fn lab_config(&self) -> LabConfig {
        LabConfig {
            base_url: self.base_url.clone(),
            collection: self.collection.clone(),
            corpus_dir: self.corpus_dir.clone(),
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            embed_model: self.embed_model.clone(),
            chat_model: self.chat_model.clone(),
            top_k: self.top_k,
            reset: !self.keep_existing,
            state_dir: self.state_dir.clone().unwrap_or_else(default_state_dir),
            race_policy: self.race_policy.into(),
        }
    }
}

fn report(action: &str, outcome: ActionOutcome) {
    match outcome {
        ActionOutcome::Rendered | ActionOutcome::Skipped => {
            info!(action, outcome = ?outcome, "action finished")
        }
        ActionOutcome::Failed | ActionOutcome::Busy | ActionOutcome::Superseded => {
            warn!(action, outcome = ?outcome, "action did not render a result")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.lab_config();

    let mut theme = ThemePersistence::boot(
        FilePreferenceStore::in_dir(&config.state_dir),
        platform_prefers_dark(),
    );
    let client = ApiClient::new(&config.base_url)?;
    info!(
        version = app_version,
        backend = %client.base_url(),
        started_at = %Utc::now().to_rfc3339(),
        "rag-lab boot"
    );

    let session = LabSession::new(client, &config);
    session.apply_theme(theme.current());

    match cli.command {
        Command::Status => {
            report("status", session.refresher().refresh_status().await);
            println!("{}", session.view().status_badge());
        }
        Command::Models => {
            report("models", session.refresher().refresh_models().await);
            println!("{}", session.view().models_badge().text);
        }
        Command::Corpus => {
            report("corpus", session.refresher().refresh_corpus().await);
            println!("{}", session.view().corpus_info());
        }
        Command::Dashboard => {
            let [status, models, corpus] = session.boot().await;
            report("status", status);
            report("models", models);
            report("corpus", corpus);

            let view = session.view();
            println!("{}", view.status_badge());
            println!("{}", view.models_badge().text);
            println!("{}", view.corpus_info());
        }
        Command::Train => {
            report("train", session.train().await);
            let view = session.view();
            println!("{}", view.train_result());
            println!("{}", view.status_badge());
        }
        Command::Search { query } => {
            session.edit_form(|form| form.search_query = query);
            report("search", session.search().await);
            println!("{}", session.view().search_results());
        }
        Command::Ask { query } => {
            session.edit_form(|form| form.ask_query = query);
            report("ask", session.ask().await);

            let view = session.view();
            if view.answer().visible {
                println!("{}", view.answer().content);
                if !view.answer().sources.is_empty() {
                    println!("{}", view.answer().sources);
                }
                println!("{}", view.search_results());
            }
        }
        Command::Theme { action } => {
            if let ThemeAction::Toggle = action {
                theme
                    .toggle()
                    .with_context(|| format!("saving theme to {}", config.state_dir.display()))?;
                session.apply_theme(theme.current());
            }
            println!("{:?}", theme.current());
        }
    }

    if let Some(path) = cli.snapshot {
        let page = session.view().to_html_document();
        std::fs::write(&path, page)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
        println!("snapshot written to {}", path.display());
    }

    Ok(())
}
