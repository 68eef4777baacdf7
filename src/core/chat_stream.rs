//! Turns one send into an incrementally updated model message.
//!
//! A turn is an explicit state machine: [`Conversation::begin_turn`] appends
//! the user message and a streaming placeholder, each fragment rewrites the
//! placeholder with the accumulated text, and the turn ends through either
//! [`Conversation::complete_turn`], [`Conversation::fail_turn`] or
//! [`Conversation::abandon_turn`].
//! [`Conversation::send_message`] drives those steps from a provider stream;
//! awaiting the next fragment is its only suspension point. Dropping that
//! future abandons the turn.

use futures_util::StreamExt;
use tracing::{debug, error, warn};

use crate::core::error::ChatError;
use crate::core::message::{Message, MessageId, MessageIdGenerator, Role};
use crate::core::persona::PersonaConfig;
use crate::core::session::SessionManager;
use crate::provider::ChatProvider;
use crate::utils::logging::LoggingState;

/// Notice appended when a turn fails. Provider details only go to the log.
pub const CONNECTION_FAILURE_NOTICE: &str =
    "Sorry, I encountered an error connecting to the character. Please try again.";

/// Receives every transcript mutation, in order.
pub trait TranscriptObserver {
    fn message_appended(&mut self, message: &Message);
    fn message_updated(&mut self, message: &Message);
}

/// Observer for callers that only inspect the transcript afterwards.
pub struct NullObserver;

impl TranscriptObserver for NullObserver {
    fn message_appended(&mut self, _message: &Message) {}
    fn message_updated(&mut self, _message: &Message) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRejected {
    EmptyInput,
    TurnInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The provider failed; a system notice was appended.
    Failed,
    /// Nothing was sent and the transcript is unchanged.
    Rejected(TurnRejected),
}

/// Token for the single turn in flight. Consumed when the turn ends.
#[derive(Debug)]
pub struct PendingTurn {
    user_text: String,
    model_index: usize,
    accumulated: String,
    fragments: usize,
}

impl PendingTurn {
    pub fn user_text(&self) -> &str {
        &self.user_text
    }
}

pub struct Conversation {
    messages: Vec<Message>,
    ids: MessageIdGenerator,
    turn_in_flight: bool,
    logging: LoggingState,
}

impl Conversation {
    /// Open a conversation with the persona's local greeting.
    pub fn new(persona: &PersonaConfig) -> Self {
        Self {
            messages: vec![Message::new(
                MessageId::welcome(),
                Role::Model,
                persona.greeting(),
            )],
            ids: MessageIdGenerator::new(),
            turn_in_flight: false,
            logging: LoggingState::disabled(),
        }
    }

    pub fn with_logging(mut self, logging: LoggingState) -> Self {
        self.logging = logging;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight
    }

    /// Start a turn: append the trimmed user text and an empty streaming
    /// model message. Rejections leave the transcript untouched.
    pub fn begin_turn(
        &mut self,
        text: &str,
        observer: &mut dyn TranscriptObserver,
    ) -> Result<PendingTurn, TurnRejected> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TurnRejected::EmptyInput);
        }
        if self.turn_in_flight {
            return Err(TurnRejected::TurnInFlight);
        }

        self.turn_in_flight = true;
        let submitted_at = chrono::Utc::now();

        let user_id = self.ids.next_id(Role::User, submitted_at);
        let user_message = Message::new(user_id, Role::User, trimmed);
        self.log_line(&format!("You: {trimmed}"));
        self.push_message(user_message, observer);

        let model_id = self.ids.next_id(Role::Model, submitted_at);
        self.push_message(Message::model_placeholder(model_id), observer);

        Ok(PendingTurn {
            user_text: trimmed.to_string(),
            model_index: self.messages.len() - 1,
            accumulated: String::new(),
            fragments: 0,
        })
    }

    /// Fold one fragment into the turn and overwrite the placeholder with the
    /// whole accumulated text.
    pub fn apply_fragment(
        &mut self,
        turn: &mut PendingTurn,
        fragment: &str,
        observer: &mut dyn TranscriptObserver,
    ) {
        if fragment.is_empty() {
            return;
        }
        turn.accumulated.push_str(fragment);
        turn.fragments += 1;

        let message = &mut self.messages[turn.model_index];
        message.content = turn.accumulated.clone();
        observer.message_updated(message);
    }

    /// The provider sequence is exhausted.
    pub fn complete_turn(&mut self, turn: PendingTurn, observer: &mut dyn TranscriptObserver) {
        debug!(fragments = turn.fragments, "chat turn completed");
        self.finish_model_message(&turn, observer);
        if !turn.accumulated.is_empty() {
            self.log_line(&turn.accumulated);
        }
        self.turn_in_flight = false;
    }

    /// End the turn after a failure: freeze whatever was received and append
    /// one generic system notice.
    pub fn fail_turn(
        &mut self,
        turn: PendingTurn,
        err: &ChatError,
        observer: &mut dyn TranscriptObserver,
    ) {
        error!(error = %err, fragments = turn.fragments, "chat turn failed");
        self.finish_model_message(&turn, observer);
        if !turn.accumulated.is_empty() {
            self.log_line(&turn.accumulated);
        }

        let notice_id = self.ids.next_id(Role::System, chrono::Utc::now());
        self.push_message(
            Message::new(notice_id, Role::System, CONNECTION_FAILURE_NOTICE),
            observer,
        );
        self.turn_in_flight = false;
    }

    /// The reader stopped consuming the turn. Whatever arrived is kept as a
    /// finished message and no notice is added.
    pub fn abandon_turn(&mut self, turn: PendingTurn, observer: &mut dyn TranscriptObserver) {
        debug!(fragments = turn.fragments, "chat turn abandoned");
        self.finish_model_message(&turn, observer);
        if !turn.accumulated.is_empty() {
            self.log_line(&turn.accumulated);
        }
        self.turn_in_flight = false;
    }

    /// Run one full turn against `sessions`.
    ///
    /// Provider failures are recovered locally and reported as
    /// [`TurnOutcome::Failed`]. Sending without an active session still ends
    /// the turn cleanly but is returned as an error, since the caller broke
    /// the start-before-send contract.
    pub async fn send_message<P: ChatProvider>(
        &mut self,
        sessions: &mut SessionManager<P>,
        text: &str,
        observer: &mut dyn TranscriptObserver,
    ) -> Result<TurnOutcome, ChatError> {
        let turn = match self.begin_turn(text, observer) {
            Ok(turn) => turn,
            Err(rejected) => return Ok(TurnOutcome::Rejected(rejected)),
        };
        let user_text = turn.user_text.clone();
        let mut guard = TurnGuard {
            conversation: self,
            observer,
            turn: Some(turn),
        };

        let mut stream = match sessions.send(&user_text) {
            Ok(stream) => stream,
            Err(err) => {
                guard.fail(&err);
                return Err(err);
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => guard.apply(&fragment),
                Err(err) => {
                    guard.fail(&ChatError::Provider(err));
                    return Ok(TurnOutcome::Failed);
                }
            }
        }

        guard.complete();
        Ok(TurnOutcome::Completed)
    }

    fn finish_model_message(&mut self, turn: &PendingTurn, observer: &mut dyn TranscriptObserver) {
        let message = &mut self.messages[turn.model_index];
        message.is_streaming = false;
        observer.message_updated(message);
    }

    fn push_message(&mut self, message: Message, observer: &mut dyn TranscriptObserver) {
        self.messages.push(message);
        if let Some(message) = self.messages.last() {
            observer.message_appended(message);
        }
    }

    fn log_line(&self, content: &str) {
        if let Err(err) = self.logging.log_message(content) {
            warn!(error = %err, "failed to write transcript log");
        }
    }
}

/// Owns the pending turn while [`Conversation::send_message`] is suspended,
/// so a dropped future still releases it.
struct TurnGuard<'c, 'o> {
    conversation: &'c mut Conversation,
    observer: &'o mut dyn TranscriptObserver,
    turn: Option<PendingTurn>,
}

impl TurnGuard<'_, '_> {
    fn apply(&mut self, fragment: &str) {
        if let Some(turn) = self.turn.as_mut() {
            self.conversation
                .apply_fragment(turn, fragment, &mut *self.observer);
        }
    }

    fn complete(mut self) {
        if let Some(turn) = self.turn.take() {
            self.conversation.complete_turn(turn, &mut *self.observer);
        }
    }

    fn fail(mut self, err: &ChatError) {
        if let Some(turn) = self.turn.take() {
            self.conversation.fail_turn(turn, err, &mut *self.observer);
        }
    }
}

impl Drop for TurnGuard<'_, '_> {
    fn drop(&mut self) {
        if let Some(turn) = self.turn.take() {
            self.conversation.abandon_turn(turn, &mut *self.observer);
        }
    }
}
