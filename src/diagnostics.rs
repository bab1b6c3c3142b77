//! Category-grouped diagnostic collection for recoverable degradations.
//!
//! Fatal input-contract violations abort the run through [`crate::Error`]; everything the
//! pipeline can survive — an incomplete type replaced by a placeholder, a member function
//! excluded from emission, a detected union — is recorded here instead. Entries are grouped
//! by [`Category`] so a run can be audited after the fact, and the CLI writes one file per
//! category into its log directory.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cvgraph::diagnostics::{Category, DiagnosticLog};
//!
//! let diags = DiagnosticLog::new();
//! diags.record(Category::IncompleteType, "no implementation record for `Foo`");
//! assert_eq!(diags.count(Category::IncompleteType), 1);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::Result;

/// Diagnostic group a degradation is filed under.
///
/// The `Display` form (snake_case) doubles as the log file name for the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// A forward-declared type had no implementation record; a placeholder was synthesized.
    IncompleteType,
    /// A struct referenced an incomplete base class and was degraded to a placeholder.
    IncompleteParentType,
    /// A truncated member name was restored from the owning type's name.
    RestoredMemberName,
    /// A member function was degraded to a plain procedure.
    MemberFunctionToProcedure,
    /// A member function was marked missing and excluded from emission.
    RemovedMemberFunction,
    /// A static data member was marked missing and excluded from emission.
    RemovedStaticDataMember,
    /// A procedure was marked missing and excluded from emission.
    RemovedProcedure,
    /// All but one base class were dropped from the retained inheritance chain.
    RemovedMultipleInheritance,
    /// A display-name collision was resolved by suffixing.
    NameCollisionResolved,
    /// A name was rewritten to identifier-safe form.
    NormalizeName,
    /// A namespace node was synthesized from qualified name segments.
    CreateNamespace,
    /// An internal-linkage node received a flattened display name.
    FlattenLocalName,
    /// A nested type was flattened to top level to break an emission cycle.
    FlattenNestedType,
    /// Overlapping members were folded into a union view.
    UnionDetected,
}

/// One recorded degradation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Group this entry is filed under.
    pub category: Category,
    /// Human-readable description of what was degraded and why.
    pub message: String,
}

/// Append-only, category-grouped collection of [`Diagnostic`] entries.
///
/// Interior mutability lets every pipeline stage record against a shared log without
/// threading `&mut` through the stage signatures.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records one degradation under `category`.
    pub fn record(&self, category: Category, message: impl Into<String>) {
        let message = message.into();
        log::debug!("[{category}] {message}");
        self.lock().push(Diagnostic { category, message });
    }

    /// Returns a snapshot of all entries in recording order.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of entries recorded under `category`.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.lock().iter().filter(|d| d.category == category).count()
    }

    /// Entries grouped by category, categories and messages in stable order.
    #[must_use]
    pub fn by_category(&self) -> BTreeMap<Category, Vec<String>> {
        let mut map: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for entry in self.lock().iter() {
            map.entry(entry.category).or_default().push(entry.message.clone());
        }
        map
    }

    /// Writes one `<category>.log` per populated category plus a combined `common.log`
    /// into `dir`, creating the directory if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut common = fs::File::create(dir.join("common.log"))?;
        for entry in self.lock().iter() {
            writeln!(common, "[{}] {}", entry.category, entry.message)?;
        }

        for (category, messages) in self.by_category() {
            let mut file = fs::File::create(dir.join(format!("{category}.log")))?;
            for message in messages {
                writeln!(file, "{message}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_is_snake_case() {
        assert_eq!(Category::IncompleteType.to_string(), "incomplete_type");
        assert_eq!(Category::RemovedMemberFunction.to_string(), "removed_member_function");
        assert_eq!(Category::UnionDetected.to_string(), "union_detected");
    }

    #[test]
    fn test_record_and_group() {
        let diags = DiagnosticLog::new();
        diags.record(Category::IncompleteType, "a");
        diags.record(Category::UnionDetected, "b");
        diags.record(Category::IncompleteType, "c");

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(Category::IncompleteType), 2);

        let grouped = diags.by_category();
        assert_eq!(grouped[&Category::IncompleteType], vec!["a", "c"]);
        assert_eq!(grouped[&Category::UnionDetected], vec!["b"]);
    }

    #[test]
    fn test_empty_log() {
        let diags = DiagnosticLog::new();
        assert!(diags.is_empty());
        assert_eq!(diags.count(Category::CreateNamespace), 0);
    }
}
