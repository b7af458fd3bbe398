use std::sync::Arc;

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// Inline binary image, already base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Size of the decoded payload, estimated from the base64 length.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|byte| *byte == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }
}

/// Atomic content unit within a turn.
///
/// Variants are public for matching, but a [`Turn`] refuses any part that
/// [`Part::is_empty`] reports, so no empty part ever reaches a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineImage(InlineImage),
}

impl Part {
    /// Returns `None` for empty text.
    pub fn text(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(Self::Text(text))
        }
    }

    pub fn inline_image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineImage(InlineImage {
            mime_type: mime_type.into(),
            data: data.into(),
        })
    }

    /// Empty text, or an image missing its MIME type or data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::InlineImage(image) => image.mime_type.is_empty() || image.data.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::InlineImage(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&InlineImage> {
        match self {
            Self::Text(_) => None,
            Self::InlineImage(image) => Some(image),
        }
    }
}

/// One exchange unit in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    parts: Vec<Part>,
}

impl Turn {
    /// Returns `None` when `parts` is empty or holds an empty part.
    pub fn new(role: Role, parts: Vec<Part>) -> Option<Self> {
        if parts.is_empty() || parts.iter().any(Part::is_empty) {
            None
        } else {
            Some(Self { role, parts })
        }
    }

    pub fn user(parts: Vec<Part>) -> Option<Self> {
        Self::new(Role::User, parts)
    }

    /// Model reply holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Option<Self> {
        Part::text(text).and_then(|part| Self::new(Role::Model, vec![part]))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &InlineImage> {
        self.parts.iter().filter_map(Part::as_image)
    }
}

/// Chronological, append-only history of turns.
///
/// Turns are shared, so cloning a transcript for a render snapshot never copies
/// message content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    turns: Vec<Arc<Turn>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(Arc::new(turn));
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index).map(Arc::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().map(Arc::as_ref)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
