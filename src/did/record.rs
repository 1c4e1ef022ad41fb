/// Stored DID document versions and the version chain rules
use crate::{
    did::{
        document::{DidDocument, DocumentPatch},
        identifier::{validate, validate_owner_address},
    },
    error::ValidationError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a single record version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidStatus {
    Pending,
    Active,
    Revoked,
    Expired,
    Deleted,
}

impl DidStatus {
    pub const ALL: [DidStatus; 5] = [
        DidStatus::Pending,
        DidStatus::Active,
        DidStatus::Revoked,
        DidStatus::Expired,
        DidStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DidStatus::Pending => "pending",
            DidStatus::Active => "active",
            DidStatus::Revoked => "revoked",
            DidStatus::Expired => "expired",
            DidStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DidStatus::Pending),
            "active" => Ok(DidStatus::Active),
            "revoked" => Ok(DidStatus::Revoked),
            "expired" => Ok(DidStatus::Expired),
            "deleted" => Ok(DidStatus::Deleted),
            _ => Err(ValidationError::InvalidRequest(format!("Invalid status: {}", s))),
        }
    }

    /// No transition leaves a terminal state on the same record
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DidStatus::Pending)
    }
}

impl fmt::Display for DidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RESERVED_METADATA_KEYS: [&str; 10] = [
    "created_by",
    "updated_by",
    "approved_by",
    "approved_at",
    "revoked_by",
    "revoked_at",
    "revocation_reason",
    "deleted_by",
    "deleted_at",
    "expires_at",
];

/// Audit trail carried by each record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Reserved; nothing sets or enforces it yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form keys supplied by clients
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RecordMetadata {
    /// Metadata for a record created by `actor`
    pub fn created_by(actor: &str) -> Self {
        Self {
            created_by: Some(actor.to_string()),
            ..Default::default()
        }
    }

    /// Merge client-supplied keys, skipping any that name an audit field
    pub fn extend_extra(&mut self, extra: BTreeMap<String, Value>) {
        for (key, value) in extra {
            if !RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                self.extra.insert(key, value);
            }
        }
    }

    /// Audit fields that survive into a new version
    fn carried_forward(&self, actor: &str) -> Self {
        Self {
            created_by: self.created_by.clone(),
            updated_by: Some(actor.to_string()),
            extra: self.extra.clone(),
            ..Default::default()
        }
    }
}

/// One stored version of a DID document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocumentRecord {
    pub id: Uuid,
    pub did: String,
    pub document: DidDocument,
    pub owner_address: String,
    pub status: DidStatus,
    pub version: i64,
    /// Record id of the predecessor; a plain foreign key
    pub previous_version: Option<Uuid>,
    pub signature: String,
    pub public_key_hash: String,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DidDocumentRecord {
    /// First version of a new chain, status pending
    pub fn new(
        did: String,
        document: DidDocument,
        owner_address: String,
        signature: String,
        public_key_hash: String,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            id: Uuid::new_v4(),
            did,
            document,
            owner_address,
            status: DidStatus::Pending,
            version: 1,
            previous_version: None,
            signature,
            public_key_hash,
            metadata: RecordMetadata::created_by(created_by),
            created_at: now,
            updated_at: now,
        };
        record.check()?;
        Ok(record)
    }

    /// Invariants that must hold whenever a record is saved
    pub fn check(&self) -> Result<(), ValidationError> {
        validate(&self.did, &self.document)?;
        validate_owner_address(&self.owner_address)?;

        if self.signature.trim().is_empty() {
            return Err(ValidationError::InvalidRequest("signature is required".to_string()));
        }
        if self.public_key_hash.trim().is_empty() {
            return Err(ValidationError::InvalidRequest(
                "public_key_hash is required".to_string(),
            ));
        }
        if self.version < 1 {
            return Err(ValidationError::InvalidRequest(format!(
                "version must be positive, got {}",
                self.version
            )));
        }
        if (self.version == 1) != self.previous_version.is_none() {
            return Err(ValidationError::InvalidRequest(
                "only version 1 may lack a previous version".to_string(),
            ));
        }

        Ok(())
    }
}

/// Changes an owner may submit for a new version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionUpdate {
    #[serde(default)]
    pub document: Option<DocumentPatch>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub public_key_hash: Option<String>,
}

/// Derive the next version of a chain from its current head.
///
/// `current` is left untouched; the result is pending, links back to
/// `current.id` and carries `current.version + 1`.
pub fn create_new_version(
    current: &DidDocumentRecord,
    update: &VersionUpdate,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<DidDocumentRecord, ValidationError> {
    let document = match &update.document {
        Some(patch) => current.document.merged(patch),
        None => current.document.clone(),
    };

    let record = DidDocumentRecord {
        id: Uuid::new_v4(),
        did: current.did.clone(),
        document,
        owner_address: current.owner_address.clone(),
        status: DidStatus::Pending,
        version: current.version + 1,
        previous_version: Some(current.id),
        signature: update
            .signature
            .clone()
            .unwrap_or_else(|| current.signature.clone()),
        public_key_hash: update
            .public_key_hash
            .clone()
            .unwrap_or_else(|| current.public_key_hash.clone()),
        metadata: current.metadata.carried_forward(actor),
        created_at: now,
        updated_at: now,
    };

    record.check()?;
    Ok(record)
}
