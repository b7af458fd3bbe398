/// Session controller: the single owner of transcript and provider session.
pub mod controller;
pub mod copy;
/// Command outcomes and render snapshots.
pub mod events;
/// Input normalization and attachment reading.
pub mod input;
/// Domain entities for turns and the transcript.
pub mod message;
pub mod state;

pub use controller::{InitError, SessionController};
pub use events::{ChatSnapshot, SendFailure, SendOutcome, SendRejection};
pub use input::{
    Attachment, DEFAULT_MAX_ATTACHMENT_BYTES, InputError, InputLimits, UserInput, normalize,
    read_image_part,
};
pub use message::{InlineImage, Part, Role, Transcript, Turn};
pub use state::{
    ReadyPhase, SessionState, SessionTransition, TransitionRejection, TransitionResult,
};
