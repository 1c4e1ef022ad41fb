/// DID operations as seen by callers
///
/// Each operation validates input, authorizes the principal, runs the pure
/// version/lifecycle rules and persists through the registry. Notifications
/// are queued after a successful write and never affect the result.
use crate::{
    auth::Principal,
    did::{
        document::{DidDocument, DocumentPatch},
        identifier::{validate_owner_address, DidParts},
        lifecycle::{apply, authorize, Action, Transition},
        record::{create_new_version, DidDocumentRecord, DidStatus, VersionUpdate},
        registry::{DidRegistry, ListFilter, Page, Paginated, RegistryStats, SearchQuery},
    },
    error::{RegistryError, RegistryResult, ValidationError},
    metrics,
    notify::{self, Delivery, Notifier},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDidRequest {
    #[validate(length(min = 1))]
    pub did: String,
    pub document: DidDocument,
    #[validate(length(min = 1))]
    pub owner_address: String,
    #[validate(length(min = 1))]
    pub signature: String,
    #[validate(length(min = 1))]
    pub public_key_hash: String,
    /// Users to notify about the new DID
    #[serde(default)]
    #[validate(custom(function = "validate_recipients"))]
    pub recipients: Vec<String>,
    /// Free-form metadata stored with the record
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Owner update payload; absent fields are carried over
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateDidRequest {
    #[serde(default)]
    pub document: Option<DocumentPatch>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub signature: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub public_key_hash: Option<String>,
}

impl From<UpdateDidRequest> for VersionUpdate {
    fn from(req: UpdateDidRequest) -> Self {
        VersionUpdate {
            document: req.document,
            signature: req.signature,
            public_key_hash: req.public_key_hash,
        }
    }
}

/// Rejection payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RejectRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: String,
}

fn validate_recipients(recipients: &Vec<String>) -> Result<(), validator::ValidationError> {
    if recipients.iter().all(|r| Uuid::parse_str(r).is_ok()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("uuid"))
    }
}

/// Orchestrates DID operations over a registry and a notifier
#[derive(Clone)]
pub struct DidService {
    registry: DidRegistry,
    notifier: Arc<dyn Notifier>,
}

impl DidService {
    pub fn new(registry: DidRegistry, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }

    pub fn registry(&self) -> &DidRegistry {
        &self.registry
    }

    /// Register a new DID as a pending version 1
    pub async fn create_did(
        &self,
        principal: &Principal,
        request: NewDidRequest,
    ) -> RegistryResult<DidDocumentRecord> {
        request.validate().map_err(ValidationError::from)?;

        let NewDidRequest {
            did,
            document,
            owner_address,
            signature,
            public_key_hash,
            recipients,
            metadata,
        } = request;

        let mut record = DidDocumentRecord::new(
            did,
            document,
            owner_address,
            signature,
            public_key_hash,
            &principal.id,
            Utc::now(),
        )?;
        record.metadata.extend_extra(metadata);

        self.registry.create(&record).await?;

        let method = DidParts::parse(&record.did)?.method;
        metrics::record_did_created(method);
        info!("DID created: {} ({}) by {}", record.did, record.id, principal.id);

        self.dispatch(notify::on_created(&record, &recipients, &principal.id));
        Ok(record)
    }

    /// Look up a record version by id
    pub async fn get_by_id(&self, id: Uuid) -> RegistryResult<DidDocumentRecord> {
        self.registry
            .find_by_id(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("DID record {}", id)))
    }

    /// Current record of a DID
    pub async fn get_by_did(&self, did: &str) -> RegistryResult<DidDocumentRecord> {
        DidParts::parse(did)?;
        self.registry
            .find_current(did)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("DID {}", did)))
    }

    pub async fn list(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> RegistryResult<Paginated<DidDocumentRecord>> {
        if let Some(owner) = &filter.owner_address {
            validate_owner_address(owner)?;
        }
        self.registry.list(filter, page).await
    }

    pub async fn list_by_owner(
        &self,
        owner_address: &str,
        status: Option<DidStatus>,
    ) -> RegistryResult<Vec<DidDocumentRecord>> {
        validate_owner_address(owner_address)?;
        self.registry.list_by_owner(owner_address, status).await
    }

    pub async fn search(
        &self,
        query: &SearchQuery,
        page: Page,
    ) -> RegistryResult<Paginated<DidDocumentRecord>> {
        self.registry.search(query, page).await
    }

    pub async fn stats(&self) -> RegistryResult<RegistryStats> {
        self.registry.stats().await
    }

    /// Every version of a DID, oldest first
    pub async fn history(&self, did: &str) -> RegistryResult<Vec<DidDocumentRecord>> {
        DidParts::parse(did)?;
        let versions = self.registry.history(did).await?;
        if versions.is_empty() {
            return Err(RegistryError::NotFound(format!("DID {}", did)));
        }
        Ok(versions)
    }

    /// Approve a pending record
    pub async fn approve(&self, principal: &Principal, id: Uuid) -> RegistryResult<DidDocumentRecord> {
        let transition = Transition::Approve {
            by: principal.id.clone(),
        };
        let record = self.run_transition(principal, id, transition).await?;

        self.dispatch(notify::on_approved(&record));
        Ok(record)
    }

    /// Reject a pending record
    pub async fn reject(
        &self,
        principal: &Principal,
        id: Uuid,
        reason: impl Into<String>,
    ) -> RegistryResult<DidDocumentRecord> {
        let request = RejectRequest {
            reason: reason.into(),
        };
        request.validate().map_err(ValidationError::from)?;

        let transition = Transition::Reject {
            by: principal.id.clone(),
            reason: request.reason.clone(),
        };
        let record = self.run_transition(principal, id, transition).await?;

        self.dispatch(notify::on_rejected(&record, &request.reason));
        Ok(record)
    }

    /// Soft-delete a record
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> RegistryResult<DidDocumentRecord> {
        let transition = Transition::Delete {
            by: principal.id.clone(),
        };
        self.run_transition(principal, id, transition).await
    }

    /// Append a new pending version to the chain `id` belongs to.
    ///
    /// The new version always builds on the chain head, not on `id` itself.
    /// A lost version race is retried once against the fresh head.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        request: UpdateDidRequest,
    ) -> RegistryResult<DidDocumentRecord> {
        request.validate().map_err(ValidationError::from)?;
        let update = VersionUpdate::from(request);

        let record = self.get_by_id(id).await?;
        authorize(principal, &record, Action::Update)?;

        let result = self.append_version(principal, &record.did, &update).await;
        metrics::record_version_created(result.is_ok());
        result
    }

    async fn append_version(
        &self,
        principal: &Principal,
        did: &str,
        update: &VersionUpdate,
    ) -> RegistryResult<DidDocumentRecord> {
        let mut retried = false;
        loop {
            let head = self.get_by_did(did).await?;
            if head.status == DidStatus::Deleted {
                return Err(RegistryError::InvalidTransition(format!(
                    "{} is deleted and cannot be updated",
                    did
                )));
            }

            let next = create_new_version(&head, update, &principal.id, Utc::now())?;
            match self.registry.insert_version(&next).await {
                Ok(()) => {
                    info!("DID updated: {} now at version {}", next.did, next.version);
                    return Ok(next);
                }
                Err(RegistryError::Conflict(msg)) if !retried => {
                    warn!("Version race on {}, retrying: {}", did, msg);
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_transition(
        &self,
        principal: &Principal,
        id: Uuid,
        transition: Transition,
    ) -> RegistryResult<DidDocumentRecord> {
        let result = self.try_transition(principal, id, &transition).await;
        metrics::record_transition(transition.as_str(), result.is_ok());

        match &result {
            Ok(record) => info!(
                "DID {} v{}: {} by {}",
                record.did,
                record.version,
                transition.as_str(),
                principal.id
            ),
            Err(e) => debug!("{} of {} refused: {}", transition.as_str(), id, e),
        }
        result
    }

    async fn try_transition(
        &self,
        principal: &Principal,
        id: Uuid,
        transition: &Transition,
    ) -> RegistryResult<DidDocumentRecord> {
        let record = self.get_by_id(id).await?;
        authorize(principal, &record, transition.action())?;

        let require_current = transition.action() == Action::Moderate;
        if require_current && !self.registry.is_current(&record).await? {
            return Err(RegistryError::InvalidTransition(format!(
                "{} v{} has been superseded",
                record.did, record.version
            )));
        }

        let updated = apply(&record, transition, Utc::now())?;
        if self
            .registry
            .transition(record.status, &updated, require_current)
            .await?
        {
            return Ok(updated);
        }

        // Someone else changed the record between our read and write
        match self.registry.find_by_id(id).await? {
            None => Err(RegistryError::NotFound(format!("DID record {}", id))),
            Some(now) => Err(RegistryError::InvalidTransition(format!(
                "{} v{} changed concurrently and is now {}",
                now.did, now.version, now.status
            ))),
        }
    }

    fn dispatch(&self, deliveries: Vec<Delivery>) {
        if !deliveries.is_empty() {
            notify::dispatch_detached(Arc::clone(&self.notifier), deliveries);
        }
    }
}
