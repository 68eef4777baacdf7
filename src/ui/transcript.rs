//! Conversation view: prints transcript mutations to a terminal-like sink.
//!
//! Model messages are streamed in place. The printer remembers how much of
//! the streaming message it has already written and only emits the newly
//! grown suffix on each update.

use std::fmt;
use std::io::Write;

use tracing::warn;

use crate::core::chat_stream::TranscriptObserver;
use crate::core::message::{Message, MessageId, Role};
use crate::core::persona::PersonaConfig;

const USER_LABEL: &str = "You";

struct StreamingCursor {
    id: MessageId,
    printed: usize,
}

pub struct TranscriptPrinter<W: Write> {
    output: W,
    persona_label: String,
    streaming: Option<StreamingCursor>,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(output: W, persona: &PersonaConfig) -> Self {
        Self {
            output,
            persona_label: persona.display_label(),
            streaming: None,
        }
    }

    /// Access the sink for prompts and notices outside the transcript.
    pub fn writer(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        let result = self
            .output
            .write_fmt(args)
            .and_then(|()| self.output.flush());
        if let Err(err) = result {
            warn!(error = %err, "failed to print transcript");
        }
    }

    fn label_for(&self, role: Role) -> &str {
        match role {
            Role::User => USER_LABEL,
            Role::Model => &self.persona_label,
            Role::System => "⚠️ ",
        }
    }
}

impl<W: Write> TranscriptObserver for TranscriptPrinter<W> {
    fn message_appended(&mut self, message: &Message) {
        let label = self.label_for(message.role).to_string();
        if message.is_system() {
            self.emit(format_args!("{label} {}\n\n", message.content));
            return;
        }

        if message.is_streaming {
            self.emit(format_args!("{label}: {}", message.content));
            self.streaming = Some(StreamingCursor {
                id: message.id.clone(),
                printed: message.content.len(),
            });
            return;
        }

        let spacing = if message.is_model() { "\n\n" } else { "\n" };
        self.emit(format_args!("{label}: {}{spacing}", message.content));
    }

    fn message_updated(&mut self, message: &Message) {
        let Some(cursor) = self.streaming.as_mut() else {
            return;
        };
        if cursor.id != message.id {
            return;
        }

        // Content only ever grows while streaming; anything else is skipped.
        let delta = message
            .content
            .get(cursor.printed..)
            .unwrap_or_default()
            .to_string();
        cursor.printed = cursor.printed.max(message.content.len());

        if !delta.is_empty() {
            self.emit(format_args!("{delta}"));
        }
        if !message.is_streaming {
            self.streaming = None;
            self.emit(format_args!("\n\n"));
        }
    }
}
