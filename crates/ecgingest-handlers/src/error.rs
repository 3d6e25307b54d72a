use std::fmt;

/// Why a batch left the happy path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    // Resolution
    UnrecognizedDevice,

    // Validity
    LeadOff,
    ElapsedMismatch,

    // Analytics
    Analytics,

    // Persistence
    Persistence,
}

impl RejectionKind {
    /// Reason string recorded in the fallback log and metrics labels
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnrecognizedDevice => "unrecognized device",
            Self::LeadOff => "lead-off detected",
            Self::ElapsedMismatch => "elapsed time mismatch",
            Self::Analytics => "analytics failure",
            Self::Persistence => "persistence failure",
        }
    }

    /// HTTP status for a batch that was rejected but safely logged.
    ///
    /// Only an unknown device is reported back to the sender as an error;
    /// every other rejection still counts as received.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnrecognizedDevice => 400,
            _ => 200,
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A rejected batch: the kind plus a human-readable detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, detail: impl ToString) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
        }
    }

    pub fn reason(&self) -> &'static str {
        self.kind.reason()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.reason(), self.detail)
    }
}

impl std::error::Error for Rejection {}
