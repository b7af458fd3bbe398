use super::message::Transcript;
use super::state::SessionState;

/// Why a send command was dropped without any effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendRejection {
    /// No session handle exists; initialization is pending or failed.
    Unavailable,
    /// Another send is still in flight.
    Busy,
    /// Blank text and no attachment.
    EmptyInput,
}

/// Failure branch of an accepted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendFailure {
    /// The attachment could not be read; the transcript is untouched.
    FileRead,
    /// The provider call failed; the user turn stays, no model turn is added.
    Provider,
}

/// Tagged result of one `send` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored(SendRejection),
    Replied { text: String },
    Failed(SendFailure),
}

impl SendOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

/// Everything the rendering layer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSnapshot {
    pub status: SessionState,
    pub transcript: Transcript,
    pub is_sending: bool,
    pub error_message: Option<String>,
}

impl ChatSnapshot {
    /// True when the input surface may submit.
    pub fn can_send(&self) -> bool {
        self.status.accepts_send()
    }
}
