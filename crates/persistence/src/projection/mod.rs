//! Entity → index document projection.
//!
//! [`to_document`] flattens an entity into the document stored in its own
//! index kind. References to nomenclature and workplaces become flat name
//! fields paired with `<field>_id`; owners embedded in workplace and phone
//! documents become summaries. The [`EmbeddingTable`] declares every such
//! copy so the sync layer can keep them current.

mod document;
mod embedding;

pub use document::{
    EmployeeDocument, EmployeeSummary, NOMENCLATURE_SUMMARY_FIELDS, NomenclatureDocument,
    PersonFields, PhoneDocument, PhoneSummary, Projectable, StudentDocument, WorkPlaceDocument,
    WorkPlaceSummary, to_document,
};
pub(crate) use document::{select_fields, to_json};
pub use embedding::{Embedding, EmbeddingShape, EmbeddingTable, RemovalPolicy, summary_fields};
