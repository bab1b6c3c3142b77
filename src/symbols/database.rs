//! Loading and indexed access for the symbol-database document.
//!
//! The database is the read-only input of the whole pipeline. Loading performs the only
//! cross-record validation the input contract demands at this level: ids must be unique and
//! greater than zero, section ids must be unique. Everything else is validated during graph
//! construction, where the referencing context is known.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::symbols::records::{
    DataRecord, NameRecord, ProcRecord, SectionRecord, SymbolDocument, TypePayload, TypeRecord,
};
use crate::Result;

/// Immutable, id-indexed view over one symbol-database document.
#[derive(Debug, Default)]
pub struct SymbolDatabase {
    types: BTreeMap<u32, TypePayload>,
    procs: Vec<ProcRecord>,
    data: Vec<DataRecord>,
    sections: BTreeMap<u16, SectionRecord>,
    names: Vec<NameRecord>,
}

impl SymbolDatabase {
    /// Loads a database from a JSON file on disk.
    ///
    /// The file is memory-mapped and decoded in one pass.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, the JSON is invalid, or
    /// the document violates the id-uniqueness contract.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and dropped before this function returns;
        // the file is not expected to be mutated concurrently.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_slice(&mmap)
    }

    /// Decodes a database from raw JSON bytes.
    ///
    /// # Errors
    /// Returns an error on invalid JSON or duplicate ids.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: SymbolDocument = serde_json::from_slice(bytes)?;
        Self::from_document(doc)
    }

    /// Decodes a database from an already-parsed JSON value.
    ///
    /// # Errors
    /// Returns an error on a malformed document or duplicate ids.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let doc: SymbolDocument = serde_json::from_value(value)?;
        Self::from_document(doc)
    }

    /// Builds the indexed view from a decoded document.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a zero type id and
    /// [`crate::Error::DuplicateRecord`] on a repeated type or section id.
    pub fn from_document(doc: SymbolDocument) -> Result<Self> {
        let mut types = BTreeMap::new();
        for TypeRecord { id, payload } in doc.types {
            if id == 0 {
                return Err(malformed_error!("type record with id 0"));
            }
            if types.insert(id, payload).is_some() {
                return Err(crate::Error::DuplicateRecord(id));
            }
        }

        let mut sections = BTreeMap::new();
        for section in doc.sections {
            let id = section.id;
            if sections.insert(id, section).is_some() {
                return Err(crate::Error::DuplicateRecord(u32::from(id)));
            }
        }

        Ok(Self {
            types,
            procs: doc.procs,
            data: doc.data,
            sections,
            names: doc.names,
        })
    }

    /// Looks up a type record payload, failing on a dangling id.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecordNotFound`] if no record carries `id`.
    pub fn type_record(&self, id: u32) -> Result<&TypePayload> {
        self.types.get(&id).ok_or(crate::Error::RecordNotFound(id))
    }

    /// Looks up a type record payload without failing.
    #[must_use]
    pub fn try_type_record(&self, id: u32) -> Option<&TypePayload> {
        self.types.get(&id)
    }

    /// Type records in ascending id order.
    pub fn types(&self) -> impl Iterator<Item = (u32, &TypePayload)> {
        self.types.iter().map(|(&id, payload)| (id, payload))
    }

    /// Procedure symbols in document order.
    #[must_use]
    pub fn procs(&self) -> &[ProcRecord] {
        &self.procs
    }

    /// Global data symbols in document order.
    #[must_use]
    pub fn data(&self) -> &[DataRecord] {
        &self.data
    }

    /// Section headers in ascending id order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionRecord> {
        self.sections.values()
    }

    /// Demangled public symbols in document order.
    #[must_use]
    pub fn names(&self) -> &[NameRecord] {
        &self.names
    }

    /// Number of type records.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of procedure symbols.
    #[must_use]
    pub fn proc_count(&self) -> usize {
        self.procs.len()
    }

    /// Number of data symbols.
    #[must_use]
    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Number of sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of demangled public symbols.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.names.len()
    }
}
