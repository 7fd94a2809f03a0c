use thiserror::Error;

/// Error taxonomy for the engine.
///
/// Assembly errors (`InvalidAnchorString`, `FileTooLarge`, `CountMismatch`,
/// CAS and decompression failures) reject the whole batch. Per-operation
/// failures (`CommitmentMismatch`, `SignatureInvalid`) drop only the
/// offending operation during replay and never surface from resolve.
#[derive(Debug, Error)]
pub enum SidetreeError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("operation byte size {size} exceeds protocol max operation byte size {max}")]
    OperationTooLarge { size: usize, max: usize },

    #[error("{kind} file size {size} exceeded maximum size {max}")]
    FileTooLarge {
        kind: &'static str,
        size: usize,
        max: usize,
    },

    #[error("number of assembled operations [{assembled}] doesn't match anchor string count [{declared}]")]
    CountMismatch { declared: usize, assembled: usize },

    #[error("reveal value doesn't match commitment")]
    CommitmentMismatch,

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("namespace `{0}` not supported")]
    UnknownNamespace(String),

    #[error("algorithm {0} not supported")]
    UnsupportedHash(u64),

    #[error("compression algorithm `{0}` not supported")]
    UnsupportedCompression(String),

    #[error("invalid anchor string: {0}")]
    InvalidAnchorString(String),

    #[error("CAS unavailable: {0}")]
    CasUnavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("not found")]
    NotFound,

    #[error("ID must start with configured namespace `{0}`")]
    NamespaceMismatch(String),

    #[error("provided DID doesn't match DID created from create request")]
    DidMismatch,

    #[error("initial values is present but empty")]
    InitialValuesEmpty,

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SidetreeError>;
