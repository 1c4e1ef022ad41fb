/// DID registry: storage, lookup and query engine
///
/// Uniqueness is enforced by the `(did, version)` unique index, so a lost
/// create or version race surfaces as `Conflict` at insert time even when the
/// pre-check passed. Status changes are conditional updates on the expected
/// status rather than read-modify-write.
use crate::{
    did::{
        document::DidDocument,
        identifier::DidParts,
        record::{DidDocumentRecord, DidStatus, RecordMetadata},
    },
    error::{is_unique_violation, RegistryError, RegistryResult, ValidationError},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default page size for listings
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 100;

const RECORD_COLUMNS: &str = "id, did, document, owner_address, status, version, previous_version, \
     signature, public_key_hash, metadata, created_at, updated_at";

/// Offset pagination request. Only constructible within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageParams")]
pub struct Page {
    page: u32,
    limit: u32,
}

/// Raw pagination parameters as supplied by a caller
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TryFrom<PageParams> for Page {
    type Error = ValidationError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        Page::new(params.page, params.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Build a page, applying defaults and bounds
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, ValidationError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err(ValidationError::InvalidRequest("page must be at least 1".to_string()));
        }
        if limit < 1 || limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paginated<T> {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            return 0;
        }
        let limit = self.limit as i64;
        (self.total + limit - 1) / limit
    }

    pub fn has_next(&self) -> bool {
        (self.page as i64) < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Exact-match listing filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    pub status: Option<DidStatus>,
    pub owner_address: Option<String>,
}

/// Search parameters, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring of the DID or `document.id`
    pub q: Option<String>,
    /// Exact method segment
    pub method: Option<String>,
    /// Exact authority segment (case-insensitive, as host names are)
    pub authority: Option<String>,
}

/// Record counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: i64,
    pub active: i64,
    pub pending: i64,
    pub revoked: i64,
    pub breakdown: BTreeMap<DidStatus, i64>,
}

/// Registry over the document store
#[derive(Clone)]
pub struct DidRegistry {
    db: SqlitePool,
}

impl DidRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Look up a single version by record id
    pub async fn find_by_id(&self, id: Uuid) -> RegistryResult<Option<DidDocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM did_documents WHERE id = ?1",
            RECORD_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// Current record of a DID: highest version, then latest `created_at`
    pub async fn find_current(&self, did: &str) -> RegistryResult<Option<DidDocumentRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM did_documents
            WHERE did = ?1
            ORDER BY version DESC, created_at DESC, rowid DESC
            LIMIT 1
            "#,
            RECORD_COLUMNS
        ))
        .bind(did)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// A specific version of a DID
    pub async fn find_version(
        &self,
        did: &str,
        version: i64,
    ) -> RegistryResult<Option<DidDocumentRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM did_documents
            WHERE did = ?1 AND version = ?2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            RECORD_COLUMNS
        ))
        .bind(did)
        .bind(version)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// All versions of a DID, oldest first
    pub async fn history(&self, did: &str) -> RegistryResult<Vec<DidDocumentRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM did_documents
            WHERE did = ?1
            ORDER BY version ASC, created_at ASC
            "#,
            RECORD_COLUMNS
        ))
        .bind(did)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Walk `previous_version` links from `id` back to version 1, newest first
    pub async fn chain_from(&self, id: Uuid) -> RegistryResult<Vec<DidDocumentRecord>> {
        let mut chain: Vec<DidDocumentRecord> = Vec::new();
        let mut next = Some(id);

        while let Some(id) = next {
            let record = self
                .find_by_id(id)
                .await?
                .ok_or_else(|| RegistryError::NotFound(format!("DID record {}", id)))?;

            // Each link steps back exactly one version, so the walk is bounded by the head
            let head = chain.first().map_or(record.version, |first| first.version);
            if record.version != head - chain.len() as i64 {
                return Err(RegistryError::Internal(format!(
                    "Version chain of {} is broken at version {}",
                    record.did, record.version
                )));
            }

            next = record.previous_version;
            chain.push(record);
        }

        Ok(chain)
    }

    /// Whether `record` is the current version of its DID
    pub async fn is_current(&self, record: &DidDocumentRecord) -> RegistryResult<bool> {
        Ok(self
            .find_current(&record.did)
            .await?
            .map_or(false, |current| current.id == record.id))
    }

    /// Store the first version of a new DID
    pub async fn create(&self, record: &DidDocumentRecord) -> RegistryResult<()> {
        record.check()?;
        if record.version != 1 {
            return Err(RegistryError::Internal(format!(
                "create expects version 1, got {}",
                record.version
            )));
        }

        if self.find_current(&record.did).await?.is_some() {
            return Err(RegistryError::Conflict(format!("DID already exists: {}", record.did)));
        }

        self.insert(record).await.map_err(|e| match e {
            RegistryError::StorageUnavailable(ref db) if is_unique_violation(db) => {
                RegistryError::Conflict(format!("DID already exists: {}", record.did))
            }
            other => other,
        })
    }

    /// Store a later version of an existing DID
    pub async fn insert_version(&self, record: &DidDocumentRecord) -> RegistryResult<()> {
        record.check()?;
        if record.version < 2 {
            return Err(RegistryError::Internal(format!(
                "insert_version expects version >= 2, got {}",
                record.version
            )));
        }

        self.insert(record).await.map_err(|e| match e {
            RegistryError::StorageUnavailable(ref db) if is_unique_violation(db) => {
                RegistryError::Conflict(format!(
                    "{} version {} already exists",
                    record.did, record.version
                ))
            }
            other => other,
        })
    }

    async fn insert(&self, record: &DidDocumentRecord) -> RegistryResult<()> {
        let parts = DidParts::parse(&record.did)?;
        let document = to_json(&record.document)?;
        let metadata = to_json(&record.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO did_documents
            (id, did, method, authority, document, owner_address, status, version,
             previous_version, signature, public_key_hash, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.did)
        .bind(parts.method)
        .bind(parts.authority)
        .bind(document)
        .bind(&record.owner_address)
        .bind(record.status.as_str())
        .bind(record.version)
        .bind(record.previous_version.map(|id| id.to_string()))
        .bind(&record.signature)
        .bind(&record.public_key_hash)
        .bind(metadata)
        .bind(timestamp(&record.created_at))
        .bind(timestamp(&record.updated_at))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Persist a status change only if the stored status still equals
    /// `expected`. With `require_current`, the write also fails when a newer
    /// version of the DID exists. Returns whether the row was updated.
    pub async fn transition(
        &self,
        expected: DidStatus,
        updated: &DidDocumentRecord,
        require_current: bool,
    ) -> RegistryResult<bool> {
        let metadata = to_json(&updated.metadata)?;

        let mut sql = String::from(
            r#"
            UPDATE did_documents
            SET status = ?1, metadata = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        );
        if require_current {
            sql.push_str(
                r#"
              AND NOT EXISTS (
                  SELECT 1 FROM did_documents AS newer
                  WHERE newer.did = did_documents.did
                    AND newer.version > did_documents.version
              )
            "#,
            );
        }

        let result = sqlx::query(&sql)
            .bind(updated.status.as_str())
            .bind(metadata)
            .bind(timestamp(&updated.updated_at))
            .bind(updated.id.to_string())
            .bind(expected.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Filtered, paginated listing, newest first
    pub async fn list(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> RegistryResult<Paginated<DidDocumentRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM did_documents", RECORD_COLUMNS));
        push_list_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query.build().fetch_all(&self.db).await?;
        let items = rows.iter().map(row_to_record).collect::<RegistryResult<Vec<_>>>()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM did_documents");
        push_list_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        Ok(Paginated {
            items,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    /// Every record of an owner, newest first
    pub async fn list_by_owner(
        &self,
        owner_address: &str,
        status: Option<DidStatus>,
    ) -> RegistryResult<Vec<DidDocumentRecord>> {
        let filter = ListFilter {
            status,
            owner_address: Some(owner_address.to_string()),
        };

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM did_documents", RECORD_COLUMNS));
        push_list_filter(&mut query, &filter);
        query.push(" ORDER BY created_at DESC, rowid DESC");

        let rows = query.build().fetch_all(&self.db).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Search by substring, method and authority
    pub async fn search(
        &self,
        search: &SearchQuery,
        page: Page,
    ) -> RegistryResult<Paginated<DidDocumentRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM did_documents", RECORD_COLUMNS));
        push_search_filter(&mut query, search);
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query.build().fetch_all(&self.db).await?;
        let items = rows.iter().map(row_to_record).collect::<RegistryResult<Vec<_>>>()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM did_documents");
        push_search_filter(&mut count, search);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        Ok(Paginated {
            items,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    /// Counts across all stored versions
    pub async fn stats(&self) -> RegistryResult<RegistryStats> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM did_documents GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let mut stats = RegistryStats::default();
        for row in rows {
            let status_str: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let status = DidStatus::from_str(&status_str)?;

            stats.total += count;
            match status {
                DidStatus::Active => stats.active = count,
                DidStatus::Pending => stats.pending = count,
                DidStatus::Revoked => stats.revoked = count,
                _ => {}
            }
            stats.breakdown.insert(status, count);
        }

        Ok(stats)
    }
}

fn push_list_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &ListFilter) {
    let mut clause = " WHERE ";
    if let Some(status) = filter.status {
        query.push(clause).push("status = ").push_bind(status.as_str());
        clause = " AND ";
    }
    if let Some(owner) = &filter.owner_address {
        query
            .push(clause)
            .push("owner_address = ")
            .push_bind(owner.clone())
            .push(" COLLATE NOCASE");
    }
}

fn push_search_filter(query: &mut QueryBuilder<'_, Sqlite>, search: &SearchQuery) {
    let mut clause = " WHERE ";
    if let Some(q) = search.q.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        query
            .push(clause)
            .push("(did LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR json_extract(document, '$.id') LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
        clause = " AND ";
    }
    if let Some(method) = search.method.as_deref().filter(|m| !m.is_empty()) {
        query.push(clause).push("method = ").push_bind(method.to_string());
        clause = " AND ";
    }
    if let Some(authority) = search.authority.as_deref().filter(|a| !a.is_empty()) {
        query
            .push(clause)
            .push("authority = ")
            .push_bind(authority.to_string())
            .push(" COLLATE NOCASE");
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegistryError::Internal(format!("Invalid timestamp: {}", e)))
}

fn parse_uuid(s: &str) -> RegistryResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| RegistryError::Internal(format!("Invalid record id {}: {}", s, e)))
}

fn to_json<T: Serialize>(value: &T) -> RegistryResult<String> {
    serde_json::to_string(value)
        .map_err(|e| RegistryError::Internal(format!("Failed to encode record: {}", e)))
}

/// Parse a database row into a record
fn row_to_record(row: &SqliteRow) -> RegistryResult<DidDocumentRecord> {
    let id: String = row.try_get("id")?;
    let document: String = row.try_get("document")?;
    let status: String = row.try_get("status")?;
    let previous_version: Option<String> = row.try_get("previous_version")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let document: DidDocument = serde_json::from_str(&document)
        .map_err(|e| RegistryError::Internal(format!("Corrupt document for {}: {}", id, e)))?;
    let metadata: RecordMetadata = serde_json::from_str(&metadata)
        .map_err(|e| RegistryError::Internal(format!("Corrupt metadata for {}: {}", id, e)))?;

    Ok(DidDocumentRecord {
        id: parse_uuid(&id)?,
        did: row.try_get("did")?,
        document,
        owner_address: row.try_get("owner_address")?,
        status: DidStatus::from_str(&status)?,
        version: row.try_get("version")?,
        previous_version: previous_version.as_deref().map(parse_uuid).transpose()?,
        signature: row.try_get("signature")?,
        public_key_hash: row.try_get("public_key_hash")?,
        metadata,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use crate::did::record::{
        create_new_version,
        fixtures::{record, record_for, OTHER_OWNER, OWNER},
        VersionUpdate,
    };
    use chrono::Duration;

    const ALICE: &str = "did:web:example.com:alice";

    async fn registry() -> DidRegistry {
        DidRegistry::new(create_memory_pool().await.unwrap())
    }

    /// Insert a chain of `len` versions, returning them oldest first
    async fn chain(registry: &DidRegistry, did: &str, len: usize) -> Vec<DidDocumentRecord> {
        let first = record(did);
        registry.create(&first).await.unwrap();
        let mut out = vec![first];
        for _ in 1..len {
            let next = create_new_version(out.last().unwrap(), &VersionUpdate::default(), "device-1", Utc::now()).unwrap();
            registry.insert_version(&next).await.unwrap();
            out.push(next);
        }
        out
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = registry().await;
        let rec = record(ALICE);
        registry.create(&rec).await.unwrap();

        let found = registry.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(found, rec);

        let current = registry.find_current(ALICE).await.unwrap().unwrap();
        assert_eq!(current.id, rec.id);
        assert!(registry.find_current("did:web:example.com:nobody").await.unwrap().is_none());
        assert!(registry.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let registry = registry().await;
        registry.create(&record(ALICE)).await.unwrap();

        let err = registry.create(&record(ALICE)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_time_conflict_maps_to_conflict() {
        let registry = registry().await;
        let rec = record(ALICE);
        registry.create(&rec).await.unwrap();

        // Raw inserts surface the index violation; the public paths map it to Conflict
        let dup = record(ALICE);
        let err = registry.insert(&dup).await.unwrap_err();
        assert!(matches!(err, RegistryError::StorageUnavailable(ref e) if is_unique_violation(e)));

        let next = create_new_version(&rec, &VersionUpdate::default(), "device-1", Utc::now()).unwrap();
        registry.insert_version(&next).await.unwrap();
        let racing = create_new_version(&rec, &VersionUpdate::default(), "device-1", Utc::now()).unwrap();
        let err = registry.insert_version(&racing).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_current_is_highest_version() {
        let registry = registry().await;
        let versions = chain(&registry, ALICE, 4).await;

        let current = registry.find_current(ALICE).await.unwrap().unwrap();
        assert_eq!(current.version, 4);
        assert_eq!(current.id, versions[3].id);
        assert!(registry.is_current(&versions[3]).await.unwrap());
        assert!(!registry.is_current(&versions[1]).await.unwrap());

        let v2 = registry.find_version(ALICE, 2).await.unwrap().unwrap();
        assert_eq!(v2.id, versions[1].id);

        let history = registry.history(ALICE).await.unwrap();
        let numbers: Vec<i64> = history.iter().map(|r| r.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_corrupted_duplicate_version_picks_latest_created() {
        let pool = create_memory_pool().await.unwrap();
        sqlx::query("DROP INDEX idx_did_documents_did_version")
            .execute(&pool)
            .await
            .unwrap();
        let registry = DidRegistry::new(pool);

        let now = Utc::now();
        let mut older = record(ALICE);
        older.created_at = now - Duration::minutes(5);
        older.updated_at = older.created_at;
        let mut newer = record(ALICE);
        newer.created_at = now;
        newer.updated_at = now;

        // Insert the newer one first so insertion order can't explain the result
        registry.insert(&newer).await.unwrap();
        registry.insert(&older).await.unwrap();

        let current = registry.find_current(ALICE).await.unwrap().unwrap();
        assert_eq!(current.id, newer.id);
    }

    #[tokio::test]
    async fn test_chain_walk() {
        let registry = registry().await;
        let versions = chain(&registry, ALICE, 3).await;

        let walked = registry.chain_from(versions[2].id).await.unwrap();
        let ids: Vec<Uuid> = walked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![versions[2].id, versions[1].id, versions[0].id]);

        assert!(matches!(
            registry.chain_from(Uuid::new_v4()).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_walk_long_chain() {
        let registry = registry().await;
        let versions = chain(&registry, ALICE, 6).await;

        let walked = registry.chain_from(versions[5].id).await.unwrap();
        let walked_versions: Vec<i64> = walked.iter().map(|r| r.version).collect();
        assert_eq!(walked_versions, vec![6, 5, 4, 3, 2, 1]);

        // Starting mid-chain walks only the older part
        let partial = registry.chain_from(versions[3].id).await.unwrap();
        assert_eq!(partial.len(), 4);
        assert_eq!(partial.last().unwrap().id, versions[0].id);
    }

    #[tokio::test]
    async fn test_chain_walk_stops_on_cycle() {
        let registry = registry().await;
        let versions = chain(&registry, ALICE, 3).await;

        sqlx::query("UPDATE did_documents SET previous_version = ? WHERE id = ?")
            .bind(versions[2].id.to_string())
            .bind(versions[0].id.to_string())
            .execute(&registry.db)
            .await
            .unwrap();

        assert!(matches!(
            registry.chain_from(versions[2].id).await,
            Err(RegistryError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_conditional_transition() {
        let registry = registry().await;
        let rec = record(ALICE);
        registry.create(&rec).await.unwrap();

        let mut approved = rec.clone();
        approved.status = DidStatus::Active;
        approved.metadata.approved_by = Some("moderator1".to_string());
        assert!(registry.transition(DidStatus::Pending, &approved, true).await.unwrap());

        // Second writer expecting pending loses and leaves audit fields alone
        let mut rejected = rec.clone();
        rejected.status = DidStatus::Revoked;
        rejected.metadata.revoked_by = Some("moderator2".to_string());
        assert!(!registry.transition(DidStatus::Pending, &rejected, true).await.unwrap());

        let stored = registry.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DidStatus::Active);
        assert_eq!(stored.metadata.approved_by.as_deref(), Some("moderator1"));
        assert!(stored.metadata.revoked_by.is_none());
    }

    #[tokio::test]
    async fn test_transition_requires_current_when_asked() {
        let registry = registry().await;
        let versions = chain(&registry, ALICE, 2).await;

        let mut approved = versions[0].clone();
        approved.status = DidStatus::Active;
        assert!(!registry.transition(DidStatus::Pending, &approved, true).await.unwrap());
        assert!(registry.transition(DidStatus::Pending, &approved, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let registry = registry().await;
        for i in 0..5 {
            let mut rec = record(&format!("did:web:example.com:user{}", i));
            rec.created_at = Utc::now() - Duration::minutes(10 - i);
            registry.create(&rec).await.unwrap();
        }
        for i in 0..2 {
            registry
                .create(&record_for(&format!("did:key:device.local:d{}", i), OTHER_OWNER))
                .await
                .unwrap();
        }

        let page = registry
            .list(&ListFilter::default(), Page::new(Some(1), Some(3)).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_prev());
        for pair in page.items.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }

        let last = registry
            .list(&ListFilter::default(), Page::new(Some(3), Some(3)).unwrap())
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_next());
        assert!(last.has_prev());

        let filter = ListFilter {
            status: None,
            owner_address: Some(OWNER.to_lowercase()),
        };
        let mine = registry.list(&filter, Page::default()).await.unwrap();
        assert_eq!(mine.total, 5);
        assert!(mine.items.iter().all(|r| r.owner_address == OWNER));

        let filter = ListFilter {
            status: Some(DidStatus::Active),
            owner_address: None,
        };
        assert_eq!(registry.list(&filter, Page::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_list_by_owner_with_status() {
        let registry = registry().await;
        let a = record("did:web:example.com:a");
        registry.create(&a).await.unwrap();
        registry.create(&record("did:web:example.com:b")).await.unwrap();
        registry
            .create(&record_for("did:web:example.com:c", OTHER_OWNER))
            .await
            .unwrap();

        let mut active = a.clone();
        active.status = DidStatus::Active;
        registry.transition(DidStatus::Pending, &active, true).await.unwrap();

        assert_eq!(registry.list_by_owner(OWNER, None).await.unwrap().len(), 2);
        let only_active = registry
            .list_by_owner(OWNER, Some(DidStatus::Active))
            .await
            .unwrap();
        assert_eq!(only_active.len(), 1);
        assert_eq!(only_active[0].id, a.id);
    }

    #[tokio::test]
    async fn test_search() {
        let registry = registry().await;
        for did in [
            "did:web:example.com:alice",
            "did:web:other.org:alice2",
            "did:web:example.com:bob",
            "did:key:example.com:carol",
            "did:webvh:example.com:dave",
        ] {
            registry.create(&record(did)).await.unwrap();
        }

        let by_method = registry
            .search(
                &SearchQuery {
                    method: Some("web".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_method.total, 3);
        assert!(by_method.items.iter().all(|r| r.did.starts_with("did:web:")));

        let by_q = registry
            .search(
                &SearchQuery {
                    q: Some("ALICE".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_q.total, 2);

        let combined = registry
            .search(
                &SearchQuery {
                    q: Some("alice".to_string()),
                    method: Some("web".to_string()),
                    authority: Some("Example.COM".to_string()),
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(combined.total, 1);
        assert_eq!(combined.items[0].did, "did:web:example.com:alice");

        let wildcard = registry
            .search(
                &SearchQuery {
                    q: Some("%".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(wildcard.total, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = registry().await;
        let a = record("did:web:example.com:a");
        let b = record("did:web:example.com:b");
        registry.create(&a).await.unwrap();
        registry.create(&b).await.unwrap();
        registry.create(&record("did:web:example.com:c")).await.unwrap();

        let mut active = a.clone();
        active.status = DidStatus::Active;
        registry.transition(DidStatus::Pending, &active, true).await.unwrap();
        let mut revoked = b.clone();
        revoked.status = DidStatus::Revoked;
        registry.transition(DidStatus::Pending, &revoked, true).await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.breakdown.get(&DidStatus::Active), Some(&1));
        assert!(stats.breakdown.get(&DidStatus::Deleted).is_none());
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::new(None, None).unwrap(), Page::default());
        assert_eq!(Page::new(Some(3), Some(10)).unwrap().offset(), 20);
        assert!(Page::new(Some(0), None).is_err());
        assert!(Page::new(None, Some(0)).is_err());
        assert!(Page::new(None, Some(101)).is_err());
    }

    #[test]
    fn test_page_deserialize_enforces_bounds() {
        let page: Page = serde_json::from_value(serde_json::json!({"limit": 5})).unwrap();
        assert_eq!((page.page(), page.limit()), (1, 5));

        assert!(serde_json::from_value::<Page>(serde_json::json!({"page": 0, "limit": 0})).is_err());
        assert!(serde_json::from_value::<Page>(serde_json::json!({"page": 2, "limit": 500})).is_err());
    }

    #[test]
    fn test_total_pages_with_zero_limit() {
        let empty: Paginated<()> = Paginated {
            items: Vec::new(),
            total: 4,
            page: 1,
            limit: 0,
        };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
        assert_eq!(escape_like("alice"), "alice");
    }
}
