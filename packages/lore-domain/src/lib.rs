pub mod document;
pub mod owner;
pub mod status;

pub use document::DocumentType;
pub use owner::{KnowledgeKind, OwnerKind, storage_key};
pub use status::IngestionStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unknown owner kind: {0}.")]
	UnknownOwnerKind(String),
	#[error("Unknown knowledge kind: {0}.")]
	UnknownKnowledgeKind(String),
	#[error("Unknown ingestion status: {0}.")]
	UnknownStatus(String),
	#[error("Unknown document type: {0}.")]
	UnknownDocumentType(String),
}
