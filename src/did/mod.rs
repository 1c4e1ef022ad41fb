/// DID documents, their version chains and lifecycle
pub mod document;
pub mod identifier;
pub mod lifecycle;
pub mod record;
pub mod registry;
pub mod service;

pub use document::{DidDocument, DocumentPatch, Service, VerificationKeyType, VerificationMethod};
pub use identifier::{validate, validate_owner_address, DidParts};
pub use lifecycle::{Action, Transition};
pub use record::{create_new_version, DidDocumentRecord, DidStatus, RecordMetadata, VersionUpdate};
pub use registry::{DidRegistry, ListFilter, Page, PageParams, Paginated, RegistryStats, SearchQuery};
pub use service::{DidService, NewDidRequest, RejectRequest, UpdateDidRequest};
