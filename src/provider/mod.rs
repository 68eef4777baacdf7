//! The provider boundary: a capability to open conversational sessions and
//! stream text fragments back for each user turn.

pub mod gemini;
pub mod sse;

use crate::core::error::ProviderError;
use crate::core::providers::Credential;
use crate::core::session::SessionParams;
use futures_util::Stream;
use std::pin::Pin;

pub use gemini::GeminiProvider;

/// Lazy, single-consumer sequence of non-empty text fragments.
///
/// `Some(Ok(_))` delivers the next fragment, `None` means the response is
/// complete and `Some(Err(_))` ends the turn with a failure.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

pub trait ChatProvider {
    fn create_session(
        &self,
        credential: &Credential,
        params: &SessionParams,
    ) -> Result<Box<dyn ProviderSession>, ProviderError>;
}

/// A provider-side conversation. Keeps whatever multi-turn context the
/// provider needs; callers only see fragments.
pub trait ProviderSession: Send {
    fn params(&self) -> &SessionParams;

    fn send_stream(&mut self, text: &str) -> FragmentStream;
}
