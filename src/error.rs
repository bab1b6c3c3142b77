use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes a *fatal* condition: a violation of the symbol-database input
/// contract or of a graph invariant. Fatal errors abort the whole reconstruction run with no
/// partial output, because type definitions are globally interdependent. Recoverable
/// degradations (unrepresentable members, removed functions) are never surfaced through this
/// type; they are recorded as miss reasons on the affected node and logged through
/// [`crate::diagnostics::DiagnosticLog`].
///
/// # Error Categories
///
/// ## Input Contract Errors
/// - [`Error::Malformed`] - Self-inconsistent or corrupted symbol records
/// - [`Error::NotSupported`] - Record kind the builder has no construction rule for
/// - [`Error::DuplicateRecord`] - Two records claiming the same id
/// - [`Error::RecordNotFound`] - A record reference with no target
///
/// ## Graph Invariant Errors
/// - [`Error::NodeNotFound`] - A node id with no arena entry after resolution
/// - [`Error::AddressConflict`] - Conflicting re-bind of a node address
/// - [`Error::SectionNotFound`] - Address bound to a section id missing from the section table
/// - [`Error::LayoutMismatch`] - Layout view failed to reproduce the flat member list
/// - [`Error::IterationLimit`] - A fixed-point stage failed to converge within its bound
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O while loading the symbol database
/// - [`Error::JsonError`] - Symbol database decode failure
#[derive(Error, Debug)]
pub enum Error {
    /// A symbol record is damaged or self-inconsistent.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed symbol data: {message} ({file}:{line})")]
    Malformed {
        /// Description of what was malformed
        message: String,
        /// Source file where the error was detected
        file: &'static str,
        /// Line number where the error was detected
        line: u32,
    },

    /// A record kind or construction request the builder does not support.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Two input records carry the same id.
    #[error("Duplicate record id: {0:#x}")]
    DuplicateRecord(u32),

    /// A record reference points at an id that is not present in the symbol database.
    #[error("Record not found: {0:#x}")]
    RecordNotFound(u32),

    /// A node id did not resolve to a concrete graph node.
    #[error("Node not found in graph: {0:#x}")]
    NodeNotFound(u32),

    /// An address was re-bound with a different (section, offset) pair.
    #[error(
        "Conflicting address for node {node:#x}: [{old_section}:{old_offset:#x}] vs [{new_section}:{new_offset:#x}]"
    )]
    AddressConflict {
        /// Node whose address was re-bound
        node: u32,
        /// Previously bound section id
        old_section: u16,
        /// Previously bound section-relative offset
        old_offset: u64,
        /// Conflicting section id
        new_section: u16,
        /// Conflicting section-relative offset
        new_offset: u64,
    },

    /// An address references a section id missing from the section table.
    #[error("Section not found: {0}")]
    SectionNotFound(u16),

    /// Flattening a reconstructed layout view did not reproduce the original member list.
    #[error("Layout mismatch in '{type_name}': {message}")]
    LayoutMismatch {
        /// Display name of the aggregate whose layout failed validation
        type_name: String,
        /// What differed between the view and the flat member list
        message: String,
    },

    /// A fixed-point loop exceeded its iteration bound instead of converging.
    #[error("Iteration limit ({limit}) exceeded in stage '{stage}'")]
    IterationLimit {
        /// Pipeline stage that failed to converge
        stage: &'static str,
        /// The bound that was exceeded
        limit: usize,
    },

    /// Error while accessing the symbol database file.
    #[error("Error accessing file: {0}")]
    FileError(#[from] std::io::Error),

    /// The symbol database document could not be decoded.
    #[error("Error decoding symbol database: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_macro_captures_location() {
        let err: Error = malformed_error!("bad record {}", 42);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad record 42");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn test_display_address_conflict() {
        let err = Error::AddressConflict {
            node: 0x1001,
            old_section: 1,
            old_offset: 0x10,
            new_section: 2,
            new_offset: 0x20,
        };
        let text = err.to_string();
        assert!(text.contains("0x1001"));
        assert!(text.contains("[1:0x10]"));
    }
}
