use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use chatpipe::agent_core::progress::{FnSink, LogSink, NullSink};
use chatpipe::inference::config::{find_config_path, load_settings};
use chatpipe::{
    ChatTurn, Conversation, Pipeline, PipelineMode, PipelineSettings, RunRequest,
    ToolConfigSource,
};

#[derive(Parser)]
#[command(
    name = "chatpipe",
    version,
    about = "Answer chat messages, calling an MCP tool server when one is needed"
)]
struct Cli {
    /// Settings file (default: search upward for chatpipe.yaml)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Tool servers document, as a path or http(s) URL (overrides settings)
    #[arg(short, long)]
    tools: Option<String>,

    /// Bearer credential for the model endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Skip the decision step and always call the first tool server
    #[arg(long)]
    always_call: bool,

    /// JSON file with prior turns: [{"role": "user", "content": "..."}, ...]
    #[arg(long)]
    history: Option<PathBuf>,

    /// Do not print progress lines to stderr
    #[arg(short, long)]
    quiet: bool,

    /// Message to answer. Starts an interactive session when omitted.
    #[arg(trailing_var_arg = true)]
    message: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    chatpipe::init_tracing();

    let settings = resolve_settings(cli.settings.as_deref())?;
    let mut pipeline = Pipeline::from_settings(settings).context("invalid settings")?;
    if let Some(tools) = cli.tools.as_deref() {
        pipeline = pipeline.with_tool_source(ToolConfigSource::from_location(tools));
    }
    if cli.always_call {
        pipeline = pipeline.with_mode(PipelineMode::AlwaysCall);
    }

    let mut conversation = match cli.history.as_deref() {
        Some(path) => Conversation::from_turns(read_history(path)?),
        None => Conversation::new(),
    };

    let mut progress = FnSink(|line: String| eprintln!("  · {line}"));
    let mut silent = NullSink;
    let log: &mut dyn LogSink = if cli.quiet { &mut silent } else { &mut progress };

    if !cli.message.is_empty() {
        let message = cli.message.join(" ");
        let reply = pipeline
            .run(
                RunRequest {
                    history: conversation.turns(),
                    message: &message,
                    credential: cli.api_key.clone(),
                },
                log,
            )
            .await;
        println!("{reply}");
        return Ok(());
    }

    interactive(&pipeline, &mut conversation, cli.api_key.as_deref(), log).await
}

/// Read-eval loop over stdin. `/reset` clears the history, `/exit` quits.
async fn interactive(
    pipeline: &Pipeline,
    conversation: &mut Conversation,
    api_key: Option<&str>,
    log: &mut dyn LogSink,
) -> Result<()> {
    eprintln!("chatpipe interactive session (/reset to clear history, /exit to quit)");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read stdin")?;
        let message = line.trim();

        match message {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                *conversation = Conversation::new();
                eprintln!("(history cleared)");
                continue;
            }
            _ => {}
        }

        let reply = pipeline
            .run(
                RunRequest {
                    history: conversation.turns(),
                    message,
                    credential: api_key.map(str::to_string),
                },
                log,
            )
            .await;

        println!("{reply}");
        conversation.record_exchange(message, reply);
    }

    Ok(())
}

/// Settings from `--settings`, else the nearest `chatpipe.yaml`, else defaults.
///
/// A relative `tool_config` path is taken relative to the settings file.
fn resolve_settings(explicit: Option<&Path>) -> Result<PipelineSettings> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            find_config_path(&cwd).ok()
        }
    };

    let Some(path) = path else {
        tracing::info!("no chatpipe.yaml found, using default settings");
        return Ok(PipelineSettings::default());
    };

    let mut settings = load_settings(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    tracing::info!(path = %path.display(), model = %settings.model, "loaded settings");

    if let (Some(location), Some(base)) = (settings.tool_config.as_deref(), path.parent()) {
        if is_relative_file(location) {
            settings.tool_config = Some(base.join(location).to_string_lossy().into_owned());
        }
    }
    Ok(settings)
}

fn is_relative_file(location: &str) -> bool {
    let location = location.trim();
    !(location.starts_with("http://")
        || location.starts_with("https://")
        || location.starts_with('~')
        || Path::new(location).is_absolute())
}

fn read_history(path: &Path) -> Result<Vec<ChatTurn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("history file {} is not a list of turns", path.display()))
}
