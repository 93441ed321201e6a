//! Generic CRUD engine over one table
//!
//! Identity is a caller-chosen field. Mutations locate their row with a fresh
//! full scan, so a concurrent writer that inserts or deletes rows between the
//! scan and the write can make the write land on the wrong row; enable
//! [`RepositoryConfig::verify_before_write`] to detect (not prevent) that.

use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::store::{RangeUpdate, StoreError, TableId, TabularStore};
use crate::{Result, StoreScheduler};
use indexmap::IndexMap;
use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tabula_codec::{CellRange, CodecError, Record, Schema, FIRST_DATA_ROW};
use tracing::{debug, info, warn};

/// Result of [`TabularRepository::update_many`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Cells the store reports as written
    pub updated_cells: u64,
    /// Ids that matched a row and were written
    pub updated: Vec<String>,
    /// Ids with no matching row
    pub missing: Vec<String>,
}

/// A decoded data row and where it currently lives
#[derive(Debug, Clone)]
struct Located {
    row: u32,
    record: Record,
}

/// Schema-driven collection over the data rows of one table
#[derive(Clone)]
pub struct TabularRepository {
    table: String,
    schema: Schema,
    store: Arc<dyn TabularStore>,
    scheduler: StoreScheduler,
    config: RepositoryConfig,
    table_ids: Cache<String, TableId>,
}

impl fmt::Debug for TabularRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularRepository")
            .field("table", &self.table)
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TabularRepository {
    /// Create a repository for `table` with columns `fields`
    ///
    /// # Errors
    /// `SchemaMismatch` if `fields` is empty or repeats a name.
    pub fn new<I, S>(
        table: impl Into<String>,
        fields: I,
        store: Arc<dyn TabularStore>,
        scheduler: StoreScheduler,
        config: RepositoryConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Schema::new(fields)?;
        Ok(Self::with_schema(table, schema, store, scheduler, config))
    }

    /// Create a repository from an already validated schema
    #[must_use]
    pub fn with_schema(
        table: impl Into<String>,
        schema: Schema,
        store: Arc<dyn TabularStore>,
        scheduler: StoreScheduler,
        config: RepositoryConfig,
    ) -> Self {
        let table_ids = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.table_id_ttl())
            .build();
        Self {
            table: table.into(),
            schema,
            store,
            scheduler,
            config,
            table_ids,
        }
    }

    /// Table name
    #[inline]
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column layout
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Every non-blank data row, in store order
    ///
    /// # Errors
    /// `SchemaMismatch` if a row is wider than the schema; store failures.
    pub async fn get_all(&self) -> Result<Vec<Record>> {
        let rows = self.scan().await?;
        debug!(table = %self.table, count = rows.len(), "loaded rows");
        Ok(rows.into_iter().map(|located| located.record).collect())
    }

    /// Rows whose `field` equals `value` exactly
    ///
    /// # Errors
    /// `SchemaMismatch` for a field outside the schema; see [`get_all`](Self::get_all).
    pub async fn find_by(&self, field: &str, value: &str) -> Result<Vec<Record>> {
        self.check_field(field)?;
        let rows = self.get_all().await?;
        Ok(rows
            .into_iter()
            .filter(|record| record.text(field) == value)
            .collect())
    }

    /// First row whose `field` equals `value`
    ///
    /// # Errors
    /// See [`find_by`](Self::find_by).
    pub async fn find_one_by(&self, field: &str, value: &str) -> Result<Option<Record>> {
        self.check_field(field)?;
        Ok(self.locate(field, value).await?.map(|located| located.record))
    }

    /// Append `record` as a new row and return it as stored
    ///
    /// The caller supplies the identity value; uniqueness is not checked.
    ///
    /// # Errors
    /// - `SchemaMismatch` if `record` has a field outside the schema
    /// - `CreateFailed` if the store does not echo the appended row
    pub async fn create(&self, record: Record) -> Result<Record> {
        let values = self.schema.encode(&record)?;
        let store = Arc::clone(&self.store);
        let anchor = CellRange::anchor(self.table.as_str());

        let echoed = self
            .call("append_row", move || {
                let store = Arc::clone(&store);
                let anchor = anchor.clone();
                let values = values.clone();
                async move { store.append_row(&anchor, values).await }
            })
            .await?;

        match echoed {
            Some(row) if !row.is_empty() => {
                let created = self.schema.decode(&row)?;
                info!(table = %self.table, "row appended");
                Ok(created)
            }
            _ => {
                warn!(table = %self.table, "append not confirmed by store");
                Err(RepositoryError::CreateFailed {
                    table: self.table.clone(),
                })
            }
        }
    }

    /// Merge `patch` into the first row whose `id_field` equals `id_value`
    ///
    /// Returns the merged record, or `None` (and writes nothing) when no row
    /// matches. The full row is rewritten; with concurrent writers the last
    /// write wins.
    ///
    /// # Errors
    /// `SchemaMismatch` for fields outside the schema, `ConcurrentModification`
    /// when verification is enabled and the row changed, store failures.
    pub async fn update(
        &self,
        id_field: &str,
        id_value: &str,
        patch: &Record,
    ) -> Result<Option<Record>> {
        self.check_field(id_field)?;
        self.schema.check_fields(patch)?;

        let Some(located) = self.locate(id_field, id_value).await? else {
            debug!(table = %self.table, id = id_value, "update target not found");
            return Ok(None);
        };

        let merged = located.record.merged(patch);
        let values = self.schema.encode(&merged)?;
        self.verify_unchanged(&located).await?;

        let store = Arc::clone(&self.store);
        let range = CellRange::row(self.table.as_str(), &self.schema, located.row);
        self.call("update_range", move || {
            let store = Arc::clone(&store);
            let range = range.clone();
            let values = values.clone();
            async move { store.update_range(&range, values).await }
        })
        .await?;

        info!(table = %self.table, id = id_value, row = located.row, "row updated");
        Ok(Some(merged))
    }

    /// Apply several patches with a single scan and a single batch write
    ///
    /// Ids without a matching row are reported in [`BatchOutcome::missing`].
    /// Row positions come from the one scan; the same race as
    /// [`update`](Self::update) applies to every row in the batch.
    ///
    /// # Errors
    /// `SchemaMismatch` for fields outside the schema, store failures.
    pub async fn update_many(
        &self,
        id_field: &str,
        updates: Vec<(String, Record)>,
    ) -> Result<BatchOutcome> {
        if updates.is_empty() {
            return Ok(BatchOutcome::default());
        }
        self.check_field(id_field)?;
        for (_, patch) in &updates {
            self.schema.check_fields(patch)?;
        }

        let rows = self.scan().await?;
        let mut outcome = BatchOutcome::default();
        let mut pending: IndexMap<u32, Record> = IndexMap::new();

        for (id, patch) in updates {
            let Some(located) = rows.iter().find(|located| located.record.text(id_field) == id)
            else {
                outcome.missing.push(id);
                continue;
            };
            pending
                .entry(located.row)
                .or_insert_with(|| located.record.clone())
                .merge(&patch);
            if !outcome.updated.contains(&id) {
                outcome.updated.push(id);
            }
        }

        if pending.is_empty() {
            debug!(table = %self.table, missing = outcome.missing.len(), "batch matched no rows");
            return Ok(outcome);
        }

        let batch = pending
            .iter()
            .map(|(row, record)| -> Result<RangeUpdate> {
                let values = self.schema.encode(record)?;
                Ok(RangeUpdate::new(
                    CellRange::row(self.table.as_str(), &self.schema, *row),
                    values,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let store = Arc::clone(&self.store);
        let table = self.table.clone();
        outcome.updated_cells = self
            .call("batch_update", move || {
                let store = Arc::clone(&store);
                let table = table.clone();
                let batch = batch.clone();
                async move { store.batch_update(&table, batch).await }
            })
            .await?;

        info!(
            table = %self.table,
            updated = outcome.updated.len(),
            missing = outcome.missing.len(),
            cells = outcome.updated_cells,
            "batch update applied"
        );
        Ok(outcome)
    }

    /// Remove the first row whose `id_field` equals `id_value`
    ///
    /// Returns `false`, without touching the store beyond the scan, when no
    /// row matches.
    ///
    /// # Errors
    /// `ConcurrentModification` when verification is enabled and the row
    /// changed, store failures.
    pub async fn delete(&self, id_field: &str, id_value: &str) -> Result<bool> {
        self.check_field(id_field)?;
        let Some(located) = self.locate(id_field, id_value).await? else {
            debug!(table = %self.table, id = id_value, "delete target not found");
            return Ok(false);
        };
        self.verify_unchanged(&located).await?;

        let table_id = self.table_id().await?;
        let store = Arc::clone(&self.store);
        let table = self.table.clone();
        let row = located.row;
        let deleted = self
            .call("delete_row", move || {
                let store = Arc::clone(&store);
                let table = table.clone();
                async move { store.delete_row(&table, table_id, row).await }
            })
            .await;

        if let Err(err) = &deleted {
            if err.is_not_found() {
                self.table_ids.invalidate(self.table.as_str()).await;
            }
        }
        deleted?;

        info!(table = %self.table, id = id_value, row, "row deleted");
        Ok(true)
    }

    /// Internal table id, resolved once per TTL
    async fn table_id(&self) -> Result<TableId> {
        if let Some(id) = self.table_ids.get(self.table.as_str()).await {
            return Ok(id);
        }

        let store = Arc::clone(&self.store);
        let table = self.table.clone();
        let id = self
            .call("describe_table", move || {
                let store = Arc::clone(&store);
                let table = table.clone();
                async move { store.describe_table(&table).await }
            })
            .await?;

        self.table_ids.insert(self.table.clone(), id).await;
        debug!(table = %self.table, table_id = id, "resolved table id");
        Ok(id)
    }

    async fn scan(&self) -> Result<Vec<Located>> {
        let rows = self
            .read_range(CellRange::data(self.table.as_str(), &self.schema), "get_range")
            .await?;

        let mut located = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let record = self.schema.decode(row)?;
            // Blank rows still occupy a position
            if record.is_blank() {
                continue;
            }
            let offset = u32::try_from(index).unwrap_or(u32::MAX);
            located.push(Located {
                row: FIRST_DATA_ROW.saturating_add(offset),
                record,
            });
        }
        Ok(located)
    }

    async fn locate(&self, field: &str, value: &str) -> Result<Option<Located>> {
        let rows = self.scan().await?;
        Ok(rows
            .into_iter()
            .find(|located| located.record.text(field) == value))
    }

    async fn verify_unchanged(&self, located: &Located) -> Result<()> {
        if !self.config.verify_before_write {
            return Ok(());
        }
        let rows = self
            .read_range(
                CellRange::row(self.table.as_str(), &self.schema, located.row),
                "get_range",
            )
            .await?;
        let current = match rows.first() {
            Some(row) => self.schema.decode(row)?,
            None => self.schema.decode(&[])?,
        };
        if current == located.record {
            return Ok(());
        }
        warn!(table = %self.table, row = located.row, "row changed between scan and write");
        Err(RepositoryError::ConcurrentModification {
            table: self.table.clone(),
            row: located.row,
        })
    }

    async fn read_range(
        &self,
        range: CellRange,
        operation: &'static str,
    ) -> Result<Vec<Vec<String>>> {
        let store = Arc::clone(&self.store);
        self.call(operation, move || {
            let store = Arc::clone(&store);
            let range = range.clone();
            async move { store.get_range(&range).await }
        })
        .await
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, StoreError>> + Send + 'static,
        T: Send + 'static,
    {
        self.scheduler
            .execute(op)
            .await
            .map_err(|err| RepositoryError::from_schedule(&self.table, operation, err))
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.schema.contains(field) {
            Ok(())
        } else {
            Err(CodecError::UnknownField(field.to_string()).into())
        }
    }
}
