//! Typed failures for state-changing Bot API calls.
//!
//! The server only reports a free-form `description`; [`DomainError::classify`] maps it
//! onto a closed set of kinds with an ordered substring table. The table is matched
//! verbatim against upstream wording, so treat it as a compatibility surface.

/// A classified API failure. Every variant carries the original description.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("{0}")]
    Generic(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error("insufficient rights: {0}")]
    InsufficientRight(String),
    #[error("cannot restrict administrator: {0}")]
    RestrictAdmin(String),
    #[error("cannot delete message: {0}")]
    DeleteMessage(String),
    #[error("invalid file id: {0}")]
    InvalidFileId(String),
    #[error("file path error: {0}")]
    FilePath(String),
    #[error("join request not found: {0}")]
    JoinRequestNotFound(String),
    #[error("user already participant: {0}")]
    JoinRequestUserAlreadyParticipant(String),
}

/// Discriminant of [`DomainError`], handy for matching without the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DomainErrorKind {
    Generic,
    UserNotFound,
    ChatNotFound,
    MessageNotFound,
    InsufficientRight,
    RestrictAdmin,
    DeleteMessage,
    InvalidFileId,
    FilePath,
    JoinRequestNotFound,
    JoinRequestUserAlreadyParticipant,
}

// Order matters: "not enough rights" is a prefix of the restrict/unrestrict message.
const TABLE: &[(&[&str], DomainErrorKind)] = &[
    (
        &["Bad Request: not enough rights to restrict/unrestrict chat member"],
        DomainErrorKind::InsufficientRight,
    ),
    (&["Bad Request: user not found"], DomainErrorKind::UserNotFound),
    (
        &[
            "Bad Request: user is an administrator",
            "Bad Request: can't remove chat owner",
            "Bad Request: not enough rights",
        ],
        DomainErrorKind::RestrictAdmin,
    ),
    (
        &[
            "Bad Request: message identifier is not specified",
            "Bad Request: message can't be deleted",
            "Bad Request: message to delete not found",
        ],
        DomainErrorKind::DeleteMessage,
    ),
    (
        &["Bad Request: USER_ALREADY_PARTICIPANT"],
        DomainErrorKind::JoinRequestUserAlreadyParticipant,
    ),
    (
        &[
            "Bad Request: USER_ID_INVALID",
            "Bad Request: HIDE_REQUESTER_MISSING",
        ],
        DomainErrorKind::JoinRequestNotFound,
    ),
    (&["Bad Request: chat not found"], DomainErrorKind::ChatNotFound),
];

impl DomainError {
    /// Classify a server description. First matching row wins; no match is `Generic`.
    pub fn classify(description: &str) -> Self {
        let kind = TABLE
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| description.contains(n)))
            .map(|(_, kind)| *kind)
            .unwrap_or(DomainErrorKind::Generic);
        Self::new(kind, description)
    }

    pub fn new(kind: DomainErrorKind, description: impl Into<String>) -> Self {
        let d = description.into();
        match kind {
            DomainErrorKind::Generic => Self::Generic(d),
            DomainErrorKind::UserNotFound => Self::UserNotFound(d),
            DomainErrorKind::ChatNotFound => Self::ChatNotFound(d),
            DomainErrorKind::MessageNotFound => Self::MessageNotFound(d),
            DomainErrorKind::InsufficientRight => Self::InsufficientRight(d),
            DomainErrorKind::RestrictAdmin => Self::RestrictAdmin(d),
            DomainErrorKind::DeleteMessage => Self::DeleteMessage(d),
            DomainErrorKind::InvalidFileId => Self::InvalidFileId(d),
            DomainErrorKind::FilePath => Self::FilePath(d),
            DomainErrorKind::JoinRequestNotFound => Self::JoinRequestNotFound(d),
            DomainErrorKind::JoinRequestUserAlreadyParticipant => {
                Self::JoinRequestUserAlreadyParticipant(d)
            }
        }
    }

    pub fn kind(&self) -> DomainErrorKind {
        match self {
            Self::Generic(_) => DomainErrorKind::Generic,
            Self::UserNotFound(_) => DomainErrorKind::UserNotFound,
            Self::ChatNotFound(_) => DomainErrorKind::ChatNotFound,
            Self::MessageNotFound(_) => DomainErrorKind::MessageNotFound,
            Self::InsufficientRight(_) => DomainErrorKind::InsufficientRight,
            Self::RestrictAdmin(_) => DomainErrorKind::RestrictAdmin,
            Self::DeleteMessage(_) => DomainErrorKind::DeleteMessage,
            Self::InvalidFileId(_) => DomainErrorKind::InvalidFileId,
            Self::FilePath(_) => DomainErrorKind::FilePath,
            Self::JoinRequestNotFound(_) => DomainErrorKind::JoinRequestNotFound,
            Self::JoinRequestUserAlreadyParticipant(_) => {
                DomainErrorKind::JoinRequestUserAlreadyParticipant
            }
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Generic(d)
            | Self::UserNotFound(d)
            | Self::ChatNotFound(d)
            | Self::MessageNotFound(d)
            | Self::InsufficientRight(d)
            | Self::RestrictAdmin(d)
            | Self::DeleteMessage(d)
            | Self::InvalidFileId(d)
            | Self::FilePath(d)
            | Self::JoinRequestNotFound(d)
            | Self::JoinRequestUserAlreadyParticipant(d) => d,
        }
    }
}
