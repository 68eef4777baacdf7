//! Interactive loop: persona form, then conversation, then back to the form
//! on `/back`.

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::AsyncBufRead;
use tracing::{debug, info};

use crate::core::chat_stream::{Conversation, TranscriptObserver, TurnOutcome, TurnRejected};
use crate::core::config::{path_display, Config};
use crate::core::error::ChatError;
use crate::core::persona::PersonaConfig;
use crate::core::session::SessionManager;
use crate::provider::ChatProvider;
use crate::ui::persona_form::PersonaForm;
use crate::ui::read_line;
use crate::ui::transcript::TranscriptPrinter;
use crate::utils::logging::LoggingState;

const HELP_TEXT: &str = "Commands:
  /help      Show this help
  /persona   Show the active persona
  /save <id> Save the active persona to the config file under <id>
  /back      Leave this conversation and edit the persona
  /quit      Exit";

pub struct ChatOptions {
    /// Persona offered as the form's defaults.
    pub seed: PersonaConfig,
    /// Start the first conversation with `seed` without showing the form.
    pub skip_form: bool,
    pub logging: LoggingState,
    /// Where `/save` writes personas. Saving is unavailable when `None`.
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChatExit {
    /// The user quit or input ended.
    Quit,
    /// The session could not be started; the notice was already printed.
    StartFailed(ChatError),
}

enum ConversationEnd {
    Quit,
    Back,
}

pub async fn run_chat<P, R, W>(
    sessions: &mut SessionManager<P>,
    input: &mut R,
    output: &mut W,
    options: ChatOptions,
) -> Result<ChatExit, Box<dyn Error>>
where
    P: ChatProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let ChatOptions {
        mut seed,
        mut skip_form,
        logging,
        config_path,
    } = options;

    loop {
        let persona = if skip_form {
            skip_form = false;
            seed.clone()
        } else {
            match PersonaForm::new(input, output).run(&seed).await? {
                Some(persona) => persona,
                None => return Ok(ChatExit::Quit),
            }
        };

        if let Err(err) = sessions.start(persona.clone()) {
            print_start_failure(output, &err)?;
            return Ok(ChatExit::StartFailed(err));
        }
        info!(persona = %persona.name, "conversation started");
        if logging.is_active() {
            writeln!(output, "📝 Transcript log: {}", logging.get_status_string())?;
        }

        let conversation = Conversation::new(&persona).with_logging(logging.clone());
        let end = run_conversation(
            sessions,
            input,
            output,
            &persona,
            conversation,
            config_path.as_deref(),
        )
        .await;
        sessions.reset();

        match end? {
            ConversationEnd::Quit => return Ok(ChatExit::Quit),
            ConversationEnd::Back => seed = persona,
        }
    }
}

async fn run_conversation<P, R, W>(
    sessions: &mut SessionManager<P>,
    input: &mut R,
    output: &mut W,
    persona: &PersonaConfig,
    mut conversation: Conversation,
    config_path: Option<&Path>,
) -> Result<ConversationEnd, Box<dyn Error>>
where
    P: ChatProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut printer = TranscriptPrinter::new(&mut *output, persona);
    writeln!(
        printer.writer(),
        "💬 Chatting with {}. Type /help for commands.\n",
        persona.display_label()
    )?;
    for message in conversation.messages() {
        printer.message_appended(message);
    }

    loop {
        write!(printer.writer(), "> ")?;
        printer.writer().flush()?;
        let Some(line) = read_line(input).await? else {
            return Ok(ConversationEnd::Quit);
        };

        match line.trim() {
            "/quit" | "/exit" => return Ok(ConversationEnd::Quit),
            "/back" => return Ok(ConversationEnd::Back),
            "/help" => writeln!(printer.writer(), "{HELP_TEXT}\n")?,
            "/persona" => print_persona(printer.writer(), persona)?,
            command if command == "/save" || command.starts_with("/save ") => {
                let id = command["/save".len()..].trim();
                save_persona(printer.writer(), config_path, id, persona)?;
            }
            command if command.starts_with('/') && !command.contains(' ') => {
                writeln!(
                    printer.writer(),
                    "Unknown command: {command}. Type /help for commands.\n"
                )?;
            }
            text => match conversation.send_message(sessions, text, &mut printer).await? {
                TurnOutcome::Completed | TurnOutcome::Failed => {}
                TurnOutcome::Rejected(TurnRejected::EmptyInput) => {}
                TurnOutcome::Rejected(TurnRejected::TurnInFlight) => {
                    debug!("input ignored while a reply is streaming");
                }
            },
        }
    }
}

fn print_persona<W: Write>(output: &mut W, persona: &PersonaConfig) -> std::io::Result<()> {
    writeln!(output, "{}", persona.display_label())?;
    if !persona.description.trim().is_empty() {
        writeln!(output, "  {}", persona.description.trim())?;
    }
    writeln!(output, "  Model: {}", persona.effective_model())?;
    match persona.reasoning_budget() {
        Some(budget) => writeln!(output, "  Thinking budget: {budget} tokens")?,
        None => writeln!(output, "  Thinking budget: off")?,
    }
    writeln!(output)
}

fn save_persona<W: Write>(
    output: &mut W,
    config_path: Option<&Path>,
    id: &str,
    persona: &PersonaConfig,
) -> std::io::Result<()> {
    if id.is_empty() || id.contains(char::is_whitespace) {
        return writeln!(output, "Usage: /save <id>\n");
    }
    let Some(path) = config_path else {
        return writeln!(output, "❌ No configuration directory is available.\n");
    };

    let result = Config::load_from_path(path).and_then(|mut config| {
        // Ids are matched case-insensitively, so replace any spelling of it.
        config.remove_persona(id);
        config.add_persona(id, persona.clone());
        config.save_to_path(path)
    });
    match result {
        Ok(()) => {
            info!(id, path = %path_display(path), "persona saved");
            writeln!(
                output,
                "💾 Saved persona '{id}' to {}. Start it with --persona {id}\n",
                path_display(path)
            )
        }
        Err(err) => writeln!(output, "❌ Could not save persona: {err}\n"),
    }
}

fn print_start_failure<W: Write>(output: &mut W, err: &ChatError) -> std::io::Result<()> {
    writeln!(output, "❌ Cannot start the conversation: {err}")?;
    if let ChatError::Configuration(config_err) = err {
        let fixes = config_err.quick_fixes();
        if !fixes.is_empty() {
            writeln!(output)?;
            writeln!(output, "💡 Quick fixes:")?;
            for fix in fixes {
                writeln!(output, "  • {fix}")?;
            }
        }
    }
    output.flush()
}
