//! Generic data access over the `user` and `todo` tables.
//!
//! An entity binds itself to the repository through [`Entity`]: its table, the
//! columns that may be assigned or matched, and an optional owner column.
//! Values arrive as loosely typed [`Fields`]; anything the entity does not
//! declare is dropped before a statement is built, so column names in SQL only
//! ever come from the static allow-lists.

use std::marker::PhantomData;

use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

/// A storage-backed type with an integer primary key named `id`.
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    /// Name used in log lines and error messages.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Columns that `create`, `update` and `filter` accept, excluding `id`.
    const FIELDS: &'static [&'static str];
    /// Column holding the owning user's id, if the entity has one.
    const OWNER: Option<&'static str> = None;

    fn id(&self) -> i64;
}

/// Errors returned by every repository operation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(db_err.message().to_owned());
            }
        }
        Self::Storage(err)
    }
}

/// A dynamically typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Named values in insertion order. Setting a name twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Keeps the entries whose name is in `allowed`, swapping each name for
    /// the static column name.
    fn declared(self, allowed: &[&'static str]) -> Vec<(&'static str, Value)> {
        self.0
            .into_iter()
            .filter_map(|(name, value)| {
                allowed
                    .iter()
                    .find(|column| **column == name)
                    .map(|column| (*column, value))
            })
            .collect()
    }
}

/// How `filter` combines its predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    fn separator(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// CRUD access to one entity type over a connection pool.
///
/// Each call checks out a connection for its own duration and runs a single
/// statement, so a failed write leaves nothing behind.
pub struct Repository<'a, E> {
    pool: &'a SqlitePool,
    owner: Option<i64>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Repository<'a, E> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            owner: None,
            _entity: PhantomData,
        }
    }

    /// Restricts every operation to rows whose owner column equals `owner`.
    ///
    /// Creates and updates write `owner` into the owner column regardless of
    /// the supplied fields. Has no effect on entities without an owner column.
    #[must_use]
    pub fn owned_by(mut self, owner: i64) -> Self {
        self.owner = Some(owner);
        self
    }

    pub async fn get(&self, id: i64) -> Result<Option<E>, RepositoryError> {
        let mut query = select::<E>();
        self.push_where(&mut query, vec![("id", Value::Int(id))], Logic::And);
        query.push(" LIMIT 1");

        query
            .build_query_as::<E>()
            .fetch_optional(self.pool)
            .await
            .map_err(|err| failed::<E>("get", err))
    }

    pub async fn create(&self, fields: Fields) -> Result<E, RepositoryError> {
        let values = self.assignments(fields, true);

        let mut query = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {}", quote(E::TABLE)));
        if values.is_empty() {
            query.push(" DEFAULT VALUES");
        } else {
            let columns: Vec<String> = values.iter().map(|(column, _)| quote(column)).collect();
            query.push(format!(" ({}) VALUES (", columns.join(", ")));
            for (i, (_, value)) in values.into_iter().enumerate() {
                if i > 0 {
                    query.push(", ");
                }
                push_value(&mut query, value);
            }
            query.push(")");
        }
        query.push(" RETURNING *");

        let created = query
            .build_query_as::<E>()
            .fetch_one(self.pool)
            .await
            .map_err(|err| failed::<E>("create", err))?;

        tracing::debug!(entity = E::NAME, id = created.id(), "created");
        Ok(created)
    }

    /// Applies the declared fields to the row with `id` and returns it.
    ///
    /// Runs as one `UPDATE ... RETURNING` statement so SQLite can wait on a
    /// concurrent writer instead of failing a read-to-write lock upgrade.
    pub async fn update(&self, id: i64, fields: Fields) -> Result<E, RepositoryError> {
        let values = self.assignments(fields, false);
        if values.is_empty() {
            return self.get(id).await?.ok_or_else(|| not_found::<E>(id));
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", quote(E::TABLE)));
        for (i, (column, value)) in values.into_iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.push(format!("{} = ", quote(column)));
            push_value(&mut query, value);
        }
        self.push_where(&mut query, vec![("id", Value::Int(id))], Logic::And);
        query.push(" RETURNING *");

        let updated = query
            .build_query_as::<E>()
            .fetch_optional(self.pool)
            .await
            .map_err(|err| failed::<E>("update", err))?
            .ok_or_else(|| not_found::<E>(id))?;

        tracing::debug!(entity = E::NAME, id, "updated");
        Ok(updated)
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", quote(E::TABLE)));
        self.push_where(&mut query, vec![("id", Value::Int(id))], Logic::And);

        let rows_affected = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|err| failed::<E>("delete", err))?
            .rows_affected();

        if rows_affected > 0 {
            tracing::debug!(entity = E::NAME, id, "deleted");
        }
        Ok(rows_affected > 0)
    }

    pub async fn list(&self) -> Result<Vec<E>, RepositoryError> {
        self.filter(Fields::new(), Logic::And).await
    }

    /// Rows matching every (`Logic::And`) or any (`Logic::Or`) of the declared
    /// criteria. Criteria the entity does not declare are ignored; with none
    /// left, every row matches.
    pub async fn filter(&self, criteria: Fields, logic: Logic) -> Result<Vec<E>, RepositoryError> {
        let conditions = criteria.declared(&with_id(E::FIELDS));

        let mut query = select::<E>();
        self.push_where(&mut query, conditions, logic);
        query.push(" ORDER BY \"id\"");

        query
            .build_query_as::<E>()
            .fetch_all(self.pool)
            .await
            .map_err(|err| failed::<E>("filter", err))
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", quote(E::TABLE)));
        self.push_where(&mut query, Vec::new(), Logic::And);

        query
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|err| failed::<E>("count", err))
    }

    /// Returns the row whose id is `fields["id"]`, creating it from `fields`
    /// when there is none.
    pub async fn get_or_create(&self, fields: Fields) -> Result<E, RepositoryError> {
        if let Some(id) = fields.get("id").and_then(Value::as_i64) {
            if let Some(existing) = self.get(id).await? {
                return Ok(existing);
            }
        }
        self.create(fields).await
    }

    fn scope(&self) -> Option<(&'static str, i64)> {
        E::OWNER.zip(self.owner)
    }

    fn assignments(&self, fields: Fields, allow_id: bool) -> Vec<(&'static str, Value)> {
        let mut values = if allow_id {
            fields.declared(&with_id(E::FIELDS))
        } else {
            fields.declared(E::FIELDS)
        };
        if let Some((column, owner)) = self.scope() {
            values.retain(|(name, _)| *name != column);
            values.push((column, Value::Int(owner)));
        }
        values
    }

    fn push_where(
        &self,
        query: &mut QueryBuilder<'_, Sqlite>,
        conditions: Vec<(&'static str, Value)>,
        logic: Logic,
    ) {
        let scope = self.scope();
        if conditions.is_empty() && scope.is_none() {
            return;
        }

        query.push(" WHERE ");
        let has_conditions = !conditions.is_empty();
        if has_conditions {
            query.push("(");
            for (i, (column, value)) in conditions.into_iter().enumerate() {
                if i > 0 {
                    query.push(logic.separator());
                }
                push_equals(query, column, value);
            }
            query.push(")");
        }
        if let Some((column, owner)) = scope {
            if has_conditions {
                query.push(" AND ");
            }
            push_equals(query, column, Value::Int(owner));
        }
    }
}

fn select<E: Entity>() -> QueryBuilder<'static, Sqlite> {
    QueryBuilder::new(format!("SELECT * FROM {}", quote(E::TABLE)))
}

fn with_id(fields: &[&'static str]) -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push("id");
    columns.extend_from_slice(fields);
    columns
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn push_equals(query: &mut QueryBuilder<'_, Sqlite>, column: &str, value: Value) {
    query.push(quote(column));
    if value == Value::Null {
        query.push(" IS NULL");
    } else {
        query.push(" = ");
        push_value(query, value);
    }
}

fn push_value(query: &mut QueryBuilder<'_, Sqlite>, value: Value) {
    match value {
        Value::Null => query.push_bind(None::<i64>),
        Value::Bool(v) => query.push_bind(v),
        Value::Int(v) => query.push_bind(v),
        Value::Text(v) => query.push_bind(v),
    };
}

fn not_found<E: Entity>(id: i64) -> RepositoryError {
    tracing::warn!(entity = E::NAME, id, "update target not found");
    RepositoryError::NotFound {
        entity: E::NAME,
        id,
    }
}

fn failed<E: Entity>(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    let err = RepositoryError::from(err);
    match &err {
        RepositoryError::Conflict(reason) => {
            tracing::info!(entity = E::NAME, operation, %reason, "record already exists");
        }
        _ => tracing::error!(entity = E::NAME, operation, error = %err, "repository operation failed"),
    }
    err
}
