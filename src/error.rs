//! Error types for cutout-bot.
//!
//! Two layers live here. The `thiserror` enums are the internal
//! taxonomy — one enum per subsystem, each variant a distinct failure
//! cause. On top of them sits the classification layer
//! ([`CustomerMessage`], [`ClassifiedError`], [`Fault`]): every failure
//! that reaches the user is collapsed into one of a fixed set of
//! customer-safe messages, with the internal cause retained for logs
//! only and never surfaced.

use reqwest::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: &'static str },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Telegram Bot API errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram {method} returned {status}: {body}")]
    BadStatus {
        method: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Malformed Telegram response for {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },

    #[error("Failed to read outbound attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Photo download/staging errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("File download request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("File host returned {status}: {body}")]
    BadStatus { status: StatusCode, body: String },

    #[error("Failed to write staged file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Transformation-service errors. Each variant is independently
/// classifiable — the customer-message mapping below depends on it.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to open staged image {path}: {source}")]
    OpenInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to assemble multipart upload: {0}")]
    Multipart(#[source] reqwest::Error),

    #[error("Transformation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Transformation service returned {status}: {body}")]
    BadStatus { status: StatusCode, body: String },

    #[error("Failed to decode transformation response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transformation service returned no image")]
    NoImage,

    #[error("Failed to decode image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Failed to write result file {path}: {source}")]
    WriteOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Classification layer ────────────────────────────────────────────

/// The fixed set of customer-safe failure messages.
///
/// This is the only text a user ever sees about a failure. Internal
/// error detail (status codes, response bodies, io errors) stays in
/// the [`ClassifiedError`] cause and goes to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerMessage {
    FileRetrieval,
    InternalService,
    Processing,
    Save,
    UpstreamRequest,
    MultipartPreparation,
    InternalFile,
    ResponseDecode,
    NoImageReturned,
    Unknown,
}

impl CustomerMessage {
    /// The user-facing text. Fixed per variant, never free-form.
    pub fn text(self) -> &'static str {
        match self {
            Self::FileRetrieval => "Could not retrieve your photo, please send it again.",
            Self::InternalService => "Internal server error, please try again.",
            Self::Processing => "Could not process the returned image, please try again.",
            Self::Save => "Could not save the processed image, please try again.",
            Self::UpstreamRequest => {
                "The image service could not handle the request, please try again later."
            }
            Self::MultipartPreparation => {
                "Could not prepare your photo for processing, please try again."
            }
            Self::InternalFile => "Could not read your photo, please send it again.",
            Self::ResponseDecode => {
                "The image service sent an unreadable reply, please try again."
            }
            Self::NoImageReturned => {
                "The image service returned no image, please try another photo."
            }
            Self::Unknown => "Unknown error, please try again.",
        }
    }

    /// Attach an internal cause, producing a new [`ClassifiedError`].
    pub fn wrap<E>(self, cause: E) -> ClassifiedError
    where
        E: Into<BoxError>,
    {
        ClassifiedError {
            message: self,
            cause: Some(cause.into()),
        }
    }
}

/// A failure paired with its customer-safe message.
///
/// The message is always present; the cause may be absent when the
/// upstream error is unknown. Values are immutable — `wrap` builds a
/// new value rather than mutating a shared one.
#[derive(Debug)]
pub struct ClassifiedError {
    message: CustomerMessage,
    cause: Option<BoxError>,
}

impl ClassifiedError {
    pub fn new(message: CustomerMessage) -> Self {
        Self {
            message,
            cause: None,
        }
    }

    pub fn message(&self) -> CustomerMessage {
        self.message
    }

    /// The text safe to show the user.
    pub fn customer_text(&self) -> &'static str {
        self.message.text()
    }

    /// The internal cause, for diagnostics only.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl std::fmt::Display for ClassifiedError {
    // Diagnostic rendering for logs. Not for the user — the notifier
    // sends `customer_text()` instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "internal error: {cause}, customer message: {}",
                self.message.text()
            ),
            None => write!(f, "customer message: {}", self.message.text()),
        }
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// A failure on its way to the notifier: either already classified or
/// still raw.
///
/// Classification is a single match, so the one-level bound is
/// structural: an already-classified value passes through untouched
/// and a raw one is wrapped under [`CustomerMessage::Unknown`] exactly
/// once. There is no re-wrapping path.
#[derive(Debug)]
pub enum Fault {
    Classified(ClassifiedError),
    Raw(BoxError),
}

impl Fault {
    pub fn raw<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Raw(err.into())
    }

    /// Collapse into a [`ClassifiedError`] with a valid customer message.
    pub fn classify(self) -> ClassifiedError {
        match self {
            Self::Classified(err) => err,
            Self::Raw(err) => CustomerMessage::Unknown.wrap(err),
        }
    }
}

impl From<ClassifiedError> for Fault {
    fn from(err: ClassifiedError) -> Self {
        Self::Classified(err)
    }
}

// ── Stage-local classification ──────────────────────────────────────

/// Any staging failure reads the same to the user: the photo could not
/// be retrieved.
impl From<FetchError> for ClassifiedError {
    fn from(err: FetchError) -> Self {
        CustomerMessage::FileRetrieval.wrap(err)
    }
}

impl From<TransformError> for ClassifiedError {
    fn from(err: TransformError) -> Self {
        let message = match &err {
            TransformError::OpenInput { .. } => CustomerMessage::InternalFile,
            TransformError::Multipart(_) => CustomerMessage::MultipartPreparation,
            TransformError::Transport(_) => CustomerMessage::InternalService,
            TransformError::BadStatus { .. } => CustomerMessage::UpstreamRequest,
            TransformError::Decode(_) => CustomerMessage::ResponseDecode,
            TransformError::NoImage => CustomerMessage::NoImageReturned,
            TransformError::Base64(_) => CustomerMessage::Processing,
            TransformError::WriteOutput { .. } => CustomerMessage::Save,
        };
        message.wrap(err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
