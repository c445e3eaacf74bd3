//! Error types for the block store, MST, and repository layers

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias used throughout this crate
pub type Result<T> = std::result::Result<T, RepoError>;

/// A repository-layer error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct RepoError {
    kind: RepoErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories, matching the taxonomy in spec.md §7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Empty key, undefined CID, reserved separator in a name
    InvalidArgument,
    /// Requested CID absent from the block store
    NotFound,
    /// Malformed block, missing field, CID-link type mismatch
    Decode,
    /// Underlying KV, CAR, or cache failure
    Storage,
    /// Context deadline or cancellation
    Cancelled,
    /// Debug-only structural invariant violation
    InvariantViolation,
    /// Cryptographic signing/verification failure
    Crypto,
}

impl RepoError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RepoErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Attach a help message
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach free-form context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The error's kind
    pub fn kind(&self) -> RepoErrorKind {
        self.kind
    }

    /// Invalid-argument error (empty key, undefined CID, reserved byte, ...)
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidArgument, None).with_context(msg.into())
    }

    /// Not-found error for a CID-addressed resource
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::NotFound, None)
            .with_context(format!("{resource} not found: {id}"))
    }

    /// Decode/encode error
    pub fn decode(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Decode, Some(Box::new(source)))
    }

    /// Decode/encode error without an underlying source
    pub fn decode_msg(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::Decode, None).with_context(msg.into())
    }

    /// Storage/IO error
    pub fn storage(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Storage, Some(Box::new(source)))
    }

    /// Cancellation error
    pub fn cancelled() -> Self {
        Self::new(RepoErrorKind::Cancelled, None).with_context("operation cancelled".to_string())
    }

    /// Debug-only invariant violation, tagged with the CID at which it was found
    pub fn invariant(cid: impl fmt::Display, msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvariantViolation, None)
            .with_context(format!("at {cid}: {}", msg.into()))
            .with_help("storage is structurally inconsistent with a referencing node")
    }

    /// Cryptographic error
    pub fn crypto(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Crypto, Some(Box::new(source)))
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

/// MST-specific errors, converted into [`RepoError`] at the API boundary
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum MstError {
    /// Empty key not allowed
    #[error("empty key not allowed")]
    EmptyKey,

    /// Key contains the reserved 0x00 separator byte
    #[error("key contains reserved separator byte")]
    ReservedByte,

    /// Value CID was not provided on Put
    #[error("missing value CID")]
    MissingValue,

    /// Node failed a structural invariant check
    #[error("invalid MST node: {0}")]
    InvalidNode(String),

    /// Serialization failed
    #[error("MST node serialization failed")]
    Serialization(#[source] BoxError),
}

impl From<MstError> for RepoError {
    fn from(e: MstError) -> Self {
        match e {
            MstError::EmptyKey => RepoError::invalid_argument("empty key"),
            MstError::ReservedByte => {
                RepoError::invalid_argument("key contains reserved 0x00 separator")
            }
            MstError::MissingValue => RepoError::invalid_argument("missing value CID"),
            MstError::InvalidNode(msg) => RepoError::new(RepoErrorKind::Decode, Some(msg.into())),
            MstError::Serialization(e) => RepoError::new(RepoErrorKind::Decode, Some(e)),
        }
    }
}

/// CAR I/O-specific errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CarError {
    /// CAR file has no root CID
    #[error("CAR file has no root CID")]
    NoRoot,

    /// Pragma bytes did not match a known CAR version
    #[error("unrecognized CAR pragma")]
    BadPragma,

    /// Underlying iroh-car parse error
    #[error("CAR parse error")]
    Parse(#[source] BoxError),

    /// I/O failure while reading or writing a CAR stream
    #[error("CAR I/O error")]
    Io(#[source] BoxError),
}

impl From<CarError> for RepoError {
    fn from(e: CarError) -> Self {
        match &e {
            CarError::NoRoot => RepoError::new(RepoErrorKind::Decode, Some(Box::new(e))),
            CarError::BadPragma => RepoError::new(RepoErrorKind::Decode, Some(Box::new(e))),
            CarError::Parse(_) => RepoError::new(RepoErrorKind::Decode, Some(Box::new(e))),
            CarError::Io(_) => RepoError::new(RepoErrorKind::Storage, Some(Box::new(e))),
        }
    }
}

/// Inclusion-proof verification errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ProofError {
    /// A node referenced by the proof path was not present in the provided block set
    #[error("proof missing node block: {cid}")]
    MissingBlock {
        /// The missing CID
        cid: String,
    },

    /// The recomputed root hash did not match the claimed root
    #[error("proof hash mismatch at root")]
    HashMismatch,

    /// The key is not covered by the proof path (wrong key/bounds)
    #[error("key not on proof path: {0}")]
    KeyNotOnPath(String),
}

impl From<ProofError> for RepoError {
    fn from(e: ProofError) -> Self {
        RepoError::new(RepoErrorKind::Decode, Some(Box::new(e)))
    }
}
