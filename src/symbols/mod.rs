//! Symbol-database input layer.
//!
//! The upstream symbol-dump utility turns the debug information of a binary into one
//! structured JSON document. This module loads that document and exposes it as the
//! read-only [`SymbolDatabase`] the rest of the pipeline consumes. No graph semantics
//! live here; see [`crate::graph`] for record interpretation.

pub mod database;
pub mod records;

pub use database::SymbolDatabase;
pub use records::{
    AggregateRecord, ArrayRecord, BitfieldRecord, DataRecord, EnumRecord, FieldListRecord,
    FieldRecord, MemberAttrsRecord, MemberFunctionRecord, MethodEntry, MethodListRecord,
    ModifierRecord, NameRecord, PointerModeRecord, PointerRecord, ProcRecord, ProcedureRecord,
    RecordRef, SectionRecord, SymbolDocument, TypePayload, TypeRecord, VtShapeRecord,
};
