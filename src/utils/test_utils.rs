use crate::core::chat_stream::TranscriptObserver;
use crate::core::error::ProviderError;
use crate::core::message::{Message, MessageId};
use crate::core::persona::PersonaConfig;
use crate::core::providers::Credential;
use crate::core::session::SessionParams;
use crate::provider::{ChatProvider, FragmentStream, ProviderSession};
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn test_credential() -> Credential {
    Credential::new("test-key")
}

pub fn test_persona(name: &str) -> PersonaConfig {
    PersonaConfig {
        name: name.to_string(),
        avatar_emoji: "🤖".to_string(),
        description: String::new(),
        system_instruction: format!("You are {name}."),
        thinking_budget: 0,
        model: "test-model".to_string(),
    }
}

/// Scripted response for one `send_stream` call.
#[derive(Clone, Debug)]
pub struct ScriptedTurn {
    fragments: Vec<String>,
    failure: Option<ProviderError>,
    stalls: bool,
}

impl ScriptedTurn {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
            stalls: false,
        }
    }

    /// Deliver `fragments`, then fail with `error`.
    pub fn failing_after<I, S>(fragments: I, error: ProviderError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failure: Some(error),
            ..Self::fragments(fragments)
        }
    }

    /// Deliver `fragments`, then never yield again.
    pub fn stalling_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stalls: true,
            ..Self::fragments(fragments)
        }
    }

    fn into_stream(self) -> FragmentStream {
        let mut items: Vec<Result<String, ProviderError>> =
            self.fragments.into_iter().map(Ok).collect();
        if let Some(error) = self.failure {
            items.push(Err(error));
        }
        let items = futures_util::stream::iter(items);
        if self.stalls {
            Box::pin(items.chain(futures_util::stream::pending()))
        } else {
            Box::pin(items)
        }
    }
}

type Shared<T> = Arc<Mutex<T>>;

/// In-memory provider that replays scripted turns in order, across sessions.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    turns: Shared<VecDeque<ScriptedTurn>>,
    created: Shared<Vec<SessionParams>>,
    sent: Shared<Vec<String>>,
    refuse_sessions: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turn(self, turn: ScriptedTurn) -> Self {
        self.turns.lock().unwrap().push_back(turn);
        self
    }

    pub fn refusing_sessions(mut self) -> Self {
        self.refuse_sessions = true;
        self
    }

    pub fn created_sessions(&self) -> Shared<Vec<SessionParams>> {
        Arc::clone(&self.created)
    }

    pub fn sent_messages(&self) -> Shared<Vec<String>> {
        Arc::clone(&self.sent)
    }
}

impl ChatProvider for ScriptedProvider {
    fn create_session(
        &self,
        _credential: &Credential,
        params: &SessionParams,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        if self.refuse_sessions {
            return Err(ProviderError::api("sessions refused"));
        }
        self.created.lock().unwrap().push(params.clone());
        Ok(Box::new(ScriptedSession {
            params: params.clone(),
            turns: Arc::clone(&self.turns),
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct ScriptedSession {
    params: SessionParams,
    turns: Shared<VecDeque<ScriptedTurn>>,
    sent: Shared<Vec<String>>,
}

impl ProviderSession for ScriptedSession {
    fn params(&self) -> &SessionParams {
        &self.params
    }

    fn send_stream(&mut self, text: &str) -> FragmentStream {
        self.sent.lock().unwrap().push(text.to_string());
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedTurn::fragments(Vec::<String>::new()));
        turn.into_stream()
    }
}

/// Transcript events captured by [`RecordingObserver`].
#[derive(Clone, Debug)]
pub enum ObservedEvent {
    Appended(Message),
    Updated(Message),
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<ObservedEvent>,
}

impl RecordingObserver {
    /// Contents the given message passed through while it was streaming.
    pub fn streamed_contents(&self, id: &MessageId) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Updated(message) if &message.id == id && message.is_streaming => {
                    Some(message.content.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl TranscriptObserver for RecordingObserver {
    fn message_appended(&mut self, message: &Message) {
        self.events.push(ObservedEvent::Appended(message.clone()));
    }

    fn message_updated(&mut self, message: &Message) {
        self.events.push(ObservedEvent::Updated(message.clone()));
    }
}
