use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Errors surfaced by the assembly core.
///
/// Configuration problems and index inconsistencies are fatal: they indicate
/// either a bad invocation or corrupted input, never a transient condition.
/// An empty overlap list is *not* an error and never reaches this type.
#[derive(Debug)]
pub enum AsmError {
    /// Invalid construction-time parameter (bad k-mer size, negative overlap
    /// threshold, ...)
    Config(String),

    /// The detector was handed a read with no sequence
    EmptyQuery(String),

    /// The k-mer index reported a position beyond the end of a read
    IndexInconsistency {
        read: String,
        position: i32,
        seq_len: i32,
    },

    /// Malformed FASTA input
    Fasta(String),

    /// Underlying I/O failure
    Io(io::Error),
}

impl Error for AsmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl Display for AsmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Self::EmptyQuery(read) => {
                write!(f, "read '{}' has an empty sequence", read)
            }
            Self::IndexInconsistency {
                read,
                position,
                seq_len,
            } => write!(
                f,
                "k-mer index is inconsistent: read '{}' has length {} but the \
                 index reports a k-mer at position {}",
                read, seq_len, position
            ),
            Self::Fasta(msg) => write!(f, "FASTA parse error: {}", msg),
            Self::Io(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for AsmError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
