//! Form-less "say" command: one turn, reply streamed to stdout.

use std::error::Error;
use std::io::{self, Write};

use tracing::warn;

use crate::core::chat_stream::{
    Conversation, TranscriptObserver, TurnOutcome, CONNECTION_FAILURE_NOTICE,
};
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::persona::PersonaConfig;
use crate::core::session::SessionManager;
use crate::provider::ChatProvider;
use crate::utils::logging::LoggingState;

use super::start_failure_exit_code;

pub async fn run_say<P: ChatProvider>(
    sessions: &mut SessionManager<P>,
    persona: PersonaConfig,
    prompt: Vec<String>,
    logging: LoggingState,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: personachat say <prompt>");
        std::process::exit(1);
    }

    let mut stdout = io::stdout();
    match say_once(sessions, persona, &prompt, logging, &mut stdout).await {
        Ok(TurnOutcome::Completed) => Ok(()),
        Ok(_) => {
            eprintln!("❌ {CONNECTION_FAILURE_NOTICE}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("❌ {err}");
            if let ChatError::Configuration(config_err) = &err {
                let fixes = config_err.quick_fixes();
                if !fixes.is_empty() {
                    eprintln!();
                    eprintln!("💡 Quick fixes:");
                    for fix in fixes {
                        eprintln!("  • {fix}");
                    }
                }
            }
            std::process::exit(start_failure_exit_code(&err));
        }
    }
}

/// Start a session for `persona`, send `prompt` and stream the reply text
/// into `output`.
pub(crate) async fn say_once<P, W>(
    sessions: &mut SessionManager<P>,
    persona: PersonaConfig,
    prompt: &str,
    logging: LoggingState,
    output: &mut W,
) -> Result<TurnOutcome, ChatError>
where
    P: ChatProvider,
    W: Write,
{
    let mut conversation = Conversation::new(&persona).with_logging(logging);
    sessions.start(persona)?;

    let mut printer = ReplyPrinter { output, printed: 0 };
    let outcome = conversation
        .send_message(sessions, prompt, &mut printer)
        .await;
    sessions.reset();
    outcome
}

/// Prints only the model reply of a single turn.
struct ReplyPrinter<'a, W: Write> {
    output: &'a mut W,
    printed: usize,
}

impl<W: Write> TranscriptObserver for ReplyPrinter<'_, W> {
    fn message_appended(&mut self, _message: &Message) {}

    fn message_updated(&mut self, message: &Message) {
        if !message.is_model() {
            return;
        }
        let delta = message.content.get(self.printed..).unwrap_or_default();
        self.printed = self.printed.max(message.content.len());

        let mut result = self.output.write_all(delta.as_bytes());
        if !message.is_streaming {
            result = result.and_then(|()| writeln!(self.output));
        }
        if let Err(err) = result.and_then(|()| self.output.flush()) {
            warn!(error = %err, "failed to print reply");
        }
    }
}
