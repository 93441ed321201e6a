//! Typed facade over [`TabularRepository`]

use crate::config::RepositoryConfig;
use crate::store::TabularStore;
use crate::table::{BatchOutcome, TabularRepository};
use crate::{Result, StoreScheduler};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tabula_codec::{Record, SheetRecord};
use tracing::warn;

/// Repository of `T`, stored in `T::TABLE` with columns `T::FIELDS`
///
/// Reads skip rows that do not decode into `T` (with a warning) so one bad
/// cell does not hide the rest of the table; [`raw`](Self::raw) exposes the
/// untyped rows when every row matters.
pub struct EntityRepository<T> {
    table: TabularRepository,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for EntityRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRepository").field(&self.table).finish()
    }
}

impl<T: SheetRecord> EntityRepository<T> {
    /// Create the repository
    ///
    /// # Errors
    /// `SchemaMismatch` if `T::FIELDS` is not a valid schema.
    pub fn new(
        store: Arc<dyn TabularStore>,
        scheduler: StoreScheduler,
        config: RepositoryConfig,
    ) -> Result<Self> {
        let table = TabularRepository::new(
            T::TABLE,
            T::FIELDS.iter().copied(),
            store,
            scheduler,
            config,
        )?;
        Ok(Self {
            table,
            _entity: PhantomData,
        })
    }

    /// Untyped repository underneath
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &TabularRepository {
        &self.table
    }

    /// Every decodable row
    ///
    /// # Errors
    /// See [`TabularRepository::get_all`].
    pub async fn get_all(&self) -> Result<Vec<T>> {
        let records = self.table.get_all().await?;
        Ok(self.decode_all(&records))
    }

    /// Rows whose `field` equals `value`
    ///
    /// # Errors
    /// See [`TabularRepository::find_by`].
    pub async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>> {
        let records = self.table.find_by(field, value).await?;
        Ok(self.decode_all(&records))
    }

    /// First row whose `field` equals `value`
    ///
    /// # Errors
    /// See [`TabularRepository::find_one_by`]; `SchemaMismatch` if the matched
    /// row does not decode.
    pub async fn find_one_by(&self, field: &str, value: &str) -> Result<Option<T>> {
        let record = self.table.find_one_by(field, value).await?;
        record.map(|record| Self::decode(&record)).transpose()
    }

    /// Row with identity `id`
    ///
    /// # Errors
    /// See [`find_one_by`](Self::find_one_by).
    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.find_one_by(T::ID_FIELD, id).await
    }

    /// Append `entity`
    ///
    /// # Errors
    /// See [`TabularRepository::create`].
    pub async fn create(&self, entity: &T) -> Result<T> {
        let created = self.table.create(entity.to_record()).await?;
        Self::decode(&created)
    }

    /// Overwrite the stored row of `entity`; `None` when it does not exist
    ///
    /// # Errors
    /// See [`TabularRepository::update`].
    pub async fn replace(&self, entity: &T) -> Result<Option<T>> {
        let updated = self
            .table
            .update(T::ID_FIELD, entity.id(), &entity.to_record())
            .await?;
        updated.map(|record| Self::decode(&record)).transpose()
    }

    /// Merge `patch` into the row with identity `id`
    ///
    /// # Errors
    /// See [`TabularRepository::update`].
    pub async fn patch(&self, id: &str, patch: &Record) -> Result<Option<T>> {
        let updated = self.table.update(T::ID_FIELD, id, patch).await?;
        updated.map(|record| Self::decode(&record)).transpose()
    }

    /// Patch several rows in one batch write
    ///
    /// # Errors
    /// See [`TabularRepository::update_many`].
    pub async fn update_many(&self, updates: Vec<(String, Record)>) -> Result<BatchOutcome> {
        self.table.update_many(T::ID_FIELD, updates).await
    }

    /// Remove the row with identity `id`
    ///
    /// # Errors
    /// See [`TabularRepository::delete`].
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.table.delete(T::ID_FIELD, id).await
    }

    fn decode(record: &Record) -> Result<T> {
        Ok(T::from_record(record)?)
    }

    fn decode_all(&self, records: &[Record]) -> Vec<T> {
        records
            .iter()
            .filter_map(|record| match T::from_record(record) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(
                        table = self.table.table(),
                        id = record.text(T::ID_FIELD),
                        error = %err,
                        "skipping row that does not decode"
                    );
                    None
                }
            })
            .collect()
    }
}
