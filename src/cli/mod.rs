//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, sets up logging and the async
//! runtime, and dispatches to the chat loop or one of the one-shot commands.

pub mod persona_list;
pub mod say;


use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::persona_list::list_personas;
use crate::cli::say::run_say;
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::persona::{PersonaCatalog, PersonaConfig, MAX_THINKING_BUDGET};
use crate::core::providers::ProviderSettings;
use crate::core::session::SessionManager;
use crate::provider::GeminiProvider;
use crate::ui::chat_loop::{run_chat, ChatExit, ChatOptions};
use crate::utils::logging::LoggingState;

#[derive(Parser)]
#[command(name = "personachat", version)]
#[command(about = "Chat with a configurable AI persona in the terminal")]
#[command(
    long_about = "PersonaChat lets you define a persona (name, avatar, description, system \
instruction, model and reasoning budget) and then chat with it. Replies stream in as \
they are generated.\n\n\
Environment Variables:\n\
  API_KEY           Credential for the model endpoint (required)\n\
  GEMINI_API_KEY    Used when API_KEY is not set\n\
  GEMINI_BASE_URL   Custom API base URL (optional)\n\
  RUST_LOG          Diagnostic log filter, written to stderr (default: warn)\n\n\
Commands inside a conversation:\n\
  /help             Show the available commands\n\
  /persona          Show the active persona\n\
  /save <ID>        Store the active persona in the config file\n\
  /back             Return to the persona form\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Persona to start from (see `personachat personas`)
    #[arg(long, global = true, value_name = "ID")]
    pub persona: Option<String>,

    /// Model to use instead of the persona's
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Reasoning token budget; 0 disables extended reasoning
    #[arg(
        long,
        global = true,
        value_name = "TOKENS",
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_THINKING_BUDGET))
    )]
    pub thinking_budget: Option<u32>,

    /// Start chatting with the selected persona without showing the form
    #[arg(long, global = true)]
    pub skip_form: bool,

    /// Append the conversation to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Edit a persona, then chat with it (default)
    Chat,
    /// Send one message and print the streamed reply
    Say {
        /// Message to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the personas available to start from
    Personas,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(args))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Persona chosen by `--persona` (or the configured default) with the
/// command-line overrides applied.
pub fn seed_persona(args: &Args, catalog: &PersonaCatalog) -> Result<PersonaConfig, String> {
    let mut persona = catalog.resolve(args.persona.as_deref())?;
    if let Some(model) = args.model.as_deref().map(str::trim) {
        if !model.is_empty() {
            persona.model = model.to_string();
        }
    }
    if let Some(budget) = args.thinking_budget {
        persona.thinking_budget = budget;
    }
    Ok(persona)
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let catalog = PersonaCatalog::load(&config);
    let command = args.command.clone().unwrap_or(Commands::Chat);

    if command == Commands::Personas {
        list_personas(&catalog);
        return Ok(());
    }

    let seed = seed_persona(&args, &catalog)?;
    let settings = ProviderSettings::from_env(&config);
    debug!(base_url = %settings.base_url, "resolved provider settings");
    let logging = LoggingState::new(args.log.clone())?;
    let mut sessions = SessionManager::new(
        GeminiProvider::new(settings.base_url),
        settings.credential,
    );

    match command {
        Commands::Say { prompt } => run_say(&mut sessions, seed, prompt, logging).await,
        Commands::Chat | Commands::Personas => {
            let mut input = tokio::io::BufReader::new(tokio::io::stdin());
            let mut output = std::io::stdout();
            let options = ChatOptions {
                seed,
                skip_form: args.skip_form,
                logging,
                config_path: Config::get_config_path().ok(),
            };
            match run_chat(&mut sessions, &mut input, &mut output, options).await? {
                ChatExit::Quit => Ok(()),
                ChatExit::StartFailed(err) => std::process::exit(start_failure_exit_code(&err)),
            }
        }
    }
}

pub(crate) fn start_failure_exit_code(err: &ChatError) -> i32 {
    match err {
        ChatError::Configuration(config_err) => config_err.exit_code(),
        _ => 1,
    }
}
