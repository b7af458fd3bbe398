/// Activity of a ready session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyPhase {
    #[default]
    Idle,
    Sending,
}

/// Lifecycle boundary for the session controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Initializing,
    InitFailed {
        message: String,
    },
    Ready(ReadyPhase),
}

/// State transition input for the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    InitSucceeded,
    InitFailed(String),
    BeginSend,
    FinishSend,
}

/// Rejection reason for illegal lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRejection {
    NotInitializing,
    NotReady,
    AlreadySending,
    NotSending,
}

/// Result type for lifecycle transition application.
pub type TransitionResult = Result<SessionState, TransitionRejection>;

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_sending(&self) -> bool {
        matches!(self, Self::Ready(ReadyPhase::Sending))
    }

    /// Returns true only when a new send may start.
    pub fn accepts_send(&self) -> bool {
        matches!(self, Self::Ready(ReadyPhase::Idle))
    }

    pub fn init_error(&self) -> Option<&str> {
        match self {
            Self::InitFailed { message } => Some(message),
            Self::Initializing | Self::Ready(_) => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// Initialization resolves exactly once. Sends alternate strictly between
    /// `BeginSend` and `FinishSend`.
    pub fn apply(&self, transition: SessionTransition) -> TransitionResult {
        match transition {
            SessionTransition::InitSucceeded => self.apply_init(Self::Ready(ReadyPhase::Idle)),
            SessionTransition::InitFailed(message) => {
                self.apply_init(Self::InitFailed { message })
            }
            SessionTransition::BeginSend => self.apply_begin_send(),
            SessionTransition::FinishSend => self.apply_finish_send(),
        }
    }

    fn apply_init(&self, next: Self) -> TransitionResult {
        match self {
            Self::Initializing => Ok(next),
            Self::InitFailed { .. } | Self::Ready(_) => {
                Err(TransitionRejection::NotInitializing)
            }
        }
    }

    fn apply_begin_send(&self) -> TransitionResult {
        match self {
            Self::Ready(ReadyPhase::Idle) => Ok(Self::Ready(ReadyPhase::Sending)),
            Self::Ready(ReadyPhase::Sending) => Err(TransitionRejection::AlreadySending),
            Self::Initializing | Self::InitFailed { .. } => Err(TransitionRejection::NotReady),
        }
    }

    fn apply_finish_send(&self) -> TransitionResult {
        match self {
            Self::Ready(ReadyPhase::Sending) => Ok(Self::Ready(ReadyPhase::Idle)),
            Self::Ready(ReadyPhase::Idle) => Err(TransitionRejection::NotSending),
            Self::Initializing | Self::InitFailed { .. } => Err(TransitionRejection::NotReady),
        }
    }
}
