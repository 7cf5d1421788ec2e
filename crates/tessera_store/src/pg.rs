//! Networked store backed by PostgreSQL.
//!
//! Each collection maps to a table in a schema named after the configured
//! database:
//!
//! ```sql
//! CREATE TABLE <schema>.<collection> (
//!     seq BIGSERIAL,
//!     id  TEXT PRIMARY KEY,
//!     doc JSONB NOT NULL
//! )
//! ```
//!
//! `id` holds the textual form of `_id`, so a native id and its text are
//! the same key. `seq` records insertion order and breaks sort ties.
//! Documents are stored in the projection described in [`crate::json`].
//!
//! ## Sorting
//!
//! JSONB's own ordering does not match [`crate::Value::cmp_natural`]: it
//! compares strings under the database collation and would compare
//! `$binary` payloads as base64 text. Sorts therefore order by an explicit
//! kind rank and then by a per-kind key: JSONB for booleans and integers,
//! `timestamptz` for `$date`, text under the `"C"` collation (byte order)
//! for strings and ids, decoded `bytea` for `$binary`. Arrays and maps fall
//! back to JSONB ordering within their kind.
//!
//! ## Timeouts
//!
//! The connection runs on its own thread. Every operation waits at most the
//! configured timeout for its answer and fails with [`StoreError::Backend`]
//! otherwise; the server also enforces it as `statement_timeout`.

use crate::collection::{BackendKind, Collection, DocumentStore};
use crate::document::{Document, ID_FIELD};
use crate::error::{describe_postgres, StoreError, StoreResult};
use crate::id::DocumentId;
use crate::json::{document_from_json, document_to_json, value_to_json};
use crate::query::{
    DeleteResult, Filter, FindOptions, InsertOneResult, SortDirection, Update, UpdateResult,
};
use crate::value::Value;
use parking_lot::RwLock;
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MAX_NAME_LEN: usize = 48;
const UNIQUE_SUFFIX: &str = "_uniq";

/// Kind rank of the sort value, matching `Value::cmp_natural`.
const SORT_RANK: &str = "CASE jsonb_typeof(sort_key.v) \
     WHEN 'boolean' THEN 1 WHEN 'number' THEN 2 WHEN 'string' THEN 4 WHEN 'array' THEN 6 \
     WHEN 'object' THEN CASE \
     WHEN jsonb_typeof(sort_key.v -> '$date') = 'string' AND sort_key.v - '$date' = '{}'::jsonb THEN 3 \
     WHEN jsonb_typeof(sort_key.v -> '$binary') = 'string' AND sort_key.v - '$binary' = '{}'::jsonb THEN 5 \
     ELSE 7 END \
     ELSE 0 END";

/// Order-by keys after the rank. Each is null outside its own kind.
const SORT_KEYS: [&str; 6] = [
    "sort_rank.rank",
    "CASE WHEN sort_rank.rank IN (1, 2) THEN sort_key.v END",
    "CASE WHEN sort_rank.rank = 3 THEN (sort_key.v ->> '$date')::timestamptz END",
    "CASE WHEN sort_rank.rank = 4 THEN (sort_key.v #>> '{}') COLLATE \"C\" END",
    "CASE WHEN sort_rank.rank = 5 THEN decode(sort_key.v ->> '$binary', 'base64') END",
    "CASE WHEN sort_rank.rank >= 6 THEN sort_key.v END",
];

/// Checks that `name` can be interpolated into SQL as an identifier.
///
/// Accepted names are ASCII letters, digits and underscores, not starting
/// with a digit, at most 48 bytes.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] otherwise.
pub fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Param {
    Text(String),
    Json(Json),
    Int(i64),
}

impl Param {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Param::Text(s) => s,
            Param::Json(j) => j,
            Param::Int(n) => n,
        }
    }
}

/// A statement and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<Param>,
}

impl Statement {
    fn bind(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_sql).collect()
    }
}

/// Builds SQL for one collection table.
#[derive(Debug, Clone)]
pub(crate) struct TableSql {
    schema: String,
    table: String,
}

impl TableSql {
    pub(crate) fn new(schema: &str, table: &str) -> StoreResult<Self> {
        validate_name(schema)?;
        validate_name(table)?;
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }

    /// Key for the advisory lock serialising checked writes.
    fn lock_key(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub(crate) fn create_schema(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema)
    }

    pub(crate) fn create_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
            self.qualified()
        )
    }

    pub(crate) fn index_name(&self, field: &str, unique: bool) -> String {
        let suffix = if unique { UNIQUE_SUFFIX } else { "_idx" };
        format!("{}_{}{}", self.table, field.trim_start_matches('_'), suffix)
    }

    pub(crate) fn create_index(&self, field: &str, unique: bool) -> StoreResult<String> {
        validate_name(field)?;
        let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
        Ok(format!(
            "CREATE {kind} IF NOT EXISTS \"{}\" ON {} ((doc -> '{field}'))",
            self.index_name(field, unique),
            self.qualified()
        ))
    }

    /// Maps a violated constraint name back to the field it guards.
    pub(crate) fn field_for_constraint(&self, constraint: &str) -> String {
        if constraint.ends_with("_pkey") {
            return ID_FIELD.to_string();
        }
        constraint
            .strip_prefix(&format!("{}_", self.table))
            .and_then(|rest| rest.strip_suffix(UNIQUE_SUFFIX))
            .map_or_else(|| constraint.to_string(), str::to_string)
    }

    fn map_error(&self, err: postgres::Error) -> StoreError {
        if let Some(db) = err.as_db_error() {
            if *db.code() == SqlState::UNIQUE_VIOLATION {
                let field = db
                    .constraint()
                    .map_or_else(|| "unknown".to_string(), |c| self.field_for_constraint(c));
                return StoreError::duplicate_key(&self.table, field);
            }
        }
        StoreError::from(err)
    }

    /// Appends a `WHERE` clause for `filter`, numbering parameters after
    /// those already in `params`.
    fn push_where(
        &self,
        sql: &mut String,
        params: &mut Vec<Param>,
        filter: &Filter,
    ) -> StoreResult<()> {
        if filter.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        for (i, (field, value)) in filter.predicates().iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            if field == ID_FIELD {
                match value.as_text_like() {
                    Some(text) => {
                        params.push(Param::Text(text.into_owned()));
                        let _ = write!(sql, "id = ${}", params.len());
                    }
                    // Non-textual ids are never stored.
                    None => sql.push_str("FALSE"),
                }
            } else {
                validate_name(field)?;
                params.push(Param::Json(value_to_json(value)));
                let _ = write!(sql, "doc -> '{field}' = ${}::jsonb", params.len());
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&self, id: String, doc: &Document) -> Statement {
        Statement {
            sql: format!("INSERT INTO {} (id, doc) VALUES ($1, $2::jsonb)", self.qualified()),
            params: vec![Param::Text(id), Param::Json(document_to_json(doc))],
        }
    }

    pub(crate) fn select(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Statement> {
        let mut sql = format!("SELECT doc FROM {}", self.qualified());
        if let Some((field, _)) = &options.sort {
            validate_name(field)?;
            let _ = write!(
                sql,
                " CROSS JOIN LATERAL (SELECT doc -> '{field}' AS v) AS sort_key \
                 CROSS JOIN LATERAL (SELECT {SORT_RANK} AS rank) AS sort_rank"
            );
        }
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params, filter)?;

        sql.push_str(" ORDER BY ");
        if let Some((_, direction)) = &options.sort {
            let order = match direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            for key in SORT_KEYS {
                let _ = write!(sql, "{key} {order}, ");
            }
        }
        sql.push_str("seq ASC");

        if let Some(limit) = options.effective_limit() {
            params.push(Param::Int(to_i64(limit)));
            let _ = write!(sql, " LIMIT ${}", params.len());
        }
        if options.skip > 0 {
            params.push(Param::Int(to_i64(options.skip)));
            let _ = write!(sql, " OFFSET ${}", params.len());
        }
        Ok(Statement { sql, params })
    }

    fn first_match(&self, filter: &Filter, params: &mut Vec<Param>) -> StoreResult<String> {
        let mut sql = format!("SELECT seq FROM {}", self.qualified());
        self.push_where(&mut sql, params, filter)?;
        sql.push_str(" ORDER BY seq ASC LIMIT 1");
        Ok(sql)
    }

    pub(crate) fn update(&self, filter: &Filter, update: &Update) -> StoreResult<Statement> {
        let mut set = Map::new();
        for (field, value) in update.assignments() {
            if field == ID_FIELD {
                return Err(StoreError::InvalidName(field.clone()));
            }
            validate_name(field)?;
            set.insert(field.clone(), value_to_json(value));
        }

        let mut params = vec![Param::Json(Json::Object(set))];
        let target = self.first_match(filter, &mut params)?;
        let table = self.qualified();
        let sql = format!(
            "WITH target AS ({target} FOR UPDATE), \
             previous AS (SELECT t.seq, t.doc FROM {table} t JOIN target USING (seq)) \
             UPDATE {table} AS t SET doc = t.doc || $1::jsonb \
             FROM previous WHERE t.seq = previous.seq \
             RETURNING previous.doc IS DISTINCT FROM t.doc AS modified"
        );
        Ok(Statement { sql, params })
    }

    pub(crate) fn delete(&self, filter: &Filter) -> StoreResult<Statement> {
        let mut params = Vec::new();
        let target = self.first_match(filter, &mut params)?;
        Ok(Statement {
            sql: format!("DELETE FROM {} WHERE seq IN ({target})", self.qualified()),
            params,
        })
    }

    pub(crate) fn count(&self, filter: &Filter) -> StoreResult<Statement> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.qualified());
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params, filter)?;
        Ok(Statement { sql, params })
    }

    /// Finds any document holding `value` in `field`.
    pub(crate) fn holder(&self, field: &str, value: &Value) -> StoreResult<Statement> {
        validate_name(field)?;
        Ok(Statement {
            sql: format!(
                "SELECT 1 FROM {} WHERE doc -> '{field}' = $1::jsonb LIMIT 1",
                self.qualified()
            ),
            params: vec![Param::Json(value_to_json(value))],
        })
    }

    /// Finds a document other than the first match of `filter` holding
    /// `value` in `field`. Empty when nothing matches `filter`.
    pub(crate) fn other_holder(
        &self,
        filter: &Filter,
        field: &str,
        value: &Value,
    ) -> StoreResult<Statement> {
        validate_name(field)?;
        let mut params = vec![Param::Json(value_to_json(value))];
        let target = self.first_match(filter, &mut params)?;
        Ok(Statement {
            sql: format!(
                "WITH target AS ({target}) SELECT 1 FROM {} AS t, target \
                 WHERE t.doc -> '{field}' = $1::jsonb AND t.seq <> target.seq LIMIT 1",
                self.qualified()
            ),
            params,
        })
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Restores the native id form lost in the JSON projection.
fn restore_id(mut doc: Document) -> Document {
    let native = doc
        .get_text(ID_FIELD)
        .and_then(DocumentId::parse)
        .map(Value::Id);
    if let Some(id) = native {
        doc.set(ID_FIELD, id);
    }
    doc
}

/// Client configuration for `url`, with `timeout` applied to connecting,
/// to statements on the server and to unacknowledged writes.
pub(crate) fn session_config(url: &str, timeout: Duration) -> StoreResult<postgres::Config> {
    let mut config: postgres::Config = url
        .parse()
        .map_err(|e: postgres::Error| StoreError::connection_unavailable(describe_postgres(&e)))?;

    let statement_timeout = format!("-c statement_timeout={}", timeout.as_millis());
    let options = match config.get_options() {
        Some(existing) if !existing.trim().is_empty() => format!("{existing} {statement_timeout}"),
        _ => statement_timeout,
    };
    config
        .connect_timeout(timeout)
        .tcp_user_timeout(timeout)
        .keepalives(true)
        .keepalives_idle(timeout)
        .options(&options);
    Ok(config)
}

fn no_answer(timeout: Duration) -> String {
    format!("no answer from postgres within {} ms", timeout.as_millis())
}

/// Connects on a helper thread so a server that accepts the socket but never
/// answers cannot hold the caller past `timeout`.
fn connect_within(config: postgres::Config, timeout: Duration) -> StoreResult<Client> {
    let (reply, response) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("tessera-pg-connect".into())
        .spawn(move || {
            let _ = reply.send(config.connect(NoTls));
        })
        .map_err(|e| StoreError::connection_unavailable(format!("cannot spawn connector: {e}")))?;

    match response.recv_timeout(timeout) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(err)) => Err(StoreError::connection_unavailable(describe_postgres(&err))),
        Err(_) => Err(StoreError::connection_unavailable(no_answer(timeout))),
    }
}

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

/// A connection owned by a dedicated thread.
///
/// Callers queue work and wait at most `timeout` for its result. Work whose
/// caller has stopped waiting is skipped if it has not started; work that
/// had started may still complete on the server.
pub(crate) struct Session<C> {
    jobs: mpsc::Sender<Job<C>>,
    timeout: Duration,
}

impl<C: Send + 'static> Session<C> {
    pub(crate) fn start(conn: C, timeout: Duration) -> StoreResult<Self> {
        let (jobs, queue) = mpsc::channel::<Job<C>>();
        thread::Builder::new()
            .name("tessera-pg-session".into())
            .spawn(move || {
                let mut conn = conn;
                for job in queue {
                    job(&mut conn);
                }
            })
            .map_err(|e| StoreError::Backend(format!("cannot spawn session thread: {e}")))?;
        Ok(Self { jobs, timeout })
    }

    pub(crate) fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut C) -> StoreResult<T> + Send + 'static,
    {
        let (reply, response) = mpsc::sync_channel(1);
        let abandoned = Arc::new(AtomicBool::new(false));
        let skip = Arc::clone(&abandoned);
        let job: Job<C> = Box::new(move |conn| {
            if skip.load(AtomicOrdering::Acquire) {
                return;
            }
            let _ = reply.send(op(conn));
        });
        self.jobs
            .send(job)
            .map_err(|_| StoreError::Backend("postgres session closed".into()))?;

        match response.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                abandoned.store(true, AtomicOrdering::Release);
                tracing::warn!(timeout_ms = %self.timeout.as_millis(), "postgres operation timed out");
                Err(StoreError::Backend(no_answer(self.timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(StoreError::Backend("postgres session closed".into()))
            }
        }
    }
}

/// A document store backed by a PostgreSQL server.
///
/// All collections share one connection; operations are serialised on it
/// and each is bounded by the connect timeout.
pub struct PostgresStore {
    session: Arc<Session<Client>>,
    schema: String,
    collections: RwLock<HashMap<String, Arc<PostgresCollection>>>,
}

impl PostgresStore {
    /// Connects to `url` and prepares the schema `database_name`.
    ///
    /// `timeout` bounds the connection attempt and every later operation.
    /// The server is pinged before the store is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionUnavailable`] if the server cannot be
    /// reached, does not answer in time or rejects the session, and
    /// [`StoreError::InvalidName`] if `database_name` is not a usable schema
    /// name.
    pub fn connect(url: &str, database_name: &str, timeout: Duration) -> StoreResult<Self> {
        validate_name(database_name)?;

        let client = connect_within(session_config(url, timeout)?, timeout)?;
        let session = Session::start(client, timeout)?;
        session
            .run(|client: &mut Client| {
                client
                    .simple_query("SELECT 1")
                    .map(|_| ())
                    .map_err(StoreError::from)
            })
            .map_err(|err| match err {
                StoreError::Backend(reason) => StoreError::connection_unavailable(reason),
                other => StoreError::connection_unavailable(other.to_string()),
            })?;

        let ddl = format!("CREATE SCHEMA IF NOT EXISTS \"{database_name}\"");
        session.run(move |client: &mut Client| client.batch_execute(&ddl).map_err(StoreError::from))?;

        Ok(Self {
            session: Arc::new(session),
            schema: database_name.to_string(),
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// The schema holding this store's tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl DocumentStore for PostgresStore {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        if let Some(existing) = self.collections.read().get(name) {
            return Ok(Arc::clone(existing) as Arc<dyn Collection>);
        }

        let sql = Arc::new(TableSql::new(&self.schema, name)?);
        let ddl = format!("{}; {}", sql.create_schema(), sql.create_table());
        self.session
            .run(move |client: &mut Client| client.batch_execute(&ddl).map_err(StoreError::from))?;
        tracing::debug!(schema = %self.schema, collection = name, "collection table ready");

        let collection = Arc::new(PostgresCollection {
            name: name.to_string(),
            sql,
            session: Arc::clone(&self.session),
            checked_unique: RwLock::new(Vec::new()),
        });
        let mut collections = self.collections.write();
        let entry = collections
            .entry(name.to_string())
            .or_insert(collection);
        Ok(Arc::clone(entry) as Arc<dyn Collection>)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Postgres
    }
}

/// A collection stored in a PostgreSQL table.
pub struct PostgresCollection {
    name: String,
    sql: Arc<TableSql>,
    session: Arc<Session<Client>>,
    /// Unique fields whose index could not be built over existing
    /// duplicates; enforced by a locked check on every write.
    checked_unique: RwLock<Vec<String>>,
}

impl std::fmt::Debug for PostgresCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresCollection")
            .field("name", &self.name)
            .field("checked_unique", &*self.checked_unique.read())
            .finish_non_exhaustive()
    }
}

impl PostgresCollection {
    fn query(&self, statement: Statement) -> StoreResult<Vec<Row>> {
        let sql = Arc::clone(&self.sql);
        self.session.run(move |client: &mut Client| {
            client
                .query(statement.sql.as_str(), &statement.bind())
                .map_err(|e| sql.map_error(e))
        })
    }

    /// Runs `write` after checking that no other document holds the values
    /// named in `checks`, under a per-table advisory lock.
    fn checked_write(
        &self,
        checks: Vec<(String, Statement)>,
        write: Statement,
    ) -> StoreResult<Vec<Row>> {
        if checks.is_empty() {
            return self.query(write);
        }
        let sql = Arc::clone(&self.sql);
        self.session.run(move |client: &mut Client| {
            let mut tx = client.transaction().map_err(|e| sql.map_error(e))?;
            let key = sql.lock_key();
            tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&key])
                .map_err(|e| sql.map_error(e))?;
            for (field, check) in &checks {
                let hits = tx
                    .query(check.sql.as_str(), &check.bind())
                    .map_err(|e| sql.map_error(e))?;
                if !hits.is_empty() {
                    return Err(StoreError::duplicate_key(&sql.table, field.clone()));
                }
            }
            let rows = tx
                .query(write.sql.as_str(), &write.bind())
                .map_err(|e| sql.map_error(e))?;
            tx.commit().map_err(|e| sql.map_error(e))?;
            Ok(rows)
        })
    }

    fn decode(row: &Row) -> StoreResult<Document> {
        let json: Json = row.try_get(0)?;
        document_from_json(&json).map(restore_id)
    }
}

impl Collection for PostgresCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, mut doc: Document) -> StoreResult<InsertOneResult> {
        let inserted_id = doc.ensure_id();
        let id_text = inserted_id
            .as_text_like()
            .map(|text| text.into_owned())
            .ok_or_else(|| StoreError::Serialization("_id must be an id or text".into()))?;

        let checks = self
            .checked_unique
            .read()
            .iter()
            .filter_map(|field| doc.get(field).map(|value| (field, value)))
            .map(|(field, value)| Ok((field.clone(), self.sql.holder(field, value)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        self.checked_write(checks, self.sql.insert(id_text, &doc))?;
        Ok(InsertOneResult { inserted_id })
    }

    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::default()
        };
        let rows = self.query(self.sql.select(filter, &options)?)?;
        rows.first().map(Self::decode).transpose()
    }

    fn find_with(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let rows = self.query(self.sql.select(filter, options)?)?;
        rows.iter().map(Self::decode).collect()
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult> {
        if update.is_empty() {
            let matched = self.find_one(filter)?.is_some();
            return Ok(UpdateResult {
                matched_count: u64::from(matched),
                modified_count: 0,
            });
        }
        let statement = self.sql.update(filter, update)?;
        let checks = {
            let checked = self.checked_unique.read();
            update
                .assignments()
                .iter()
                .filter(|(field, _)| checked.contains(field))
                .map(|(field, value)| {
                    Ok((field.clone(), self.sql.other_holder(filter, field, value)?))
                })
                .collect::<StoreResult<Vec<_>>>()?
        };

        let rows = self.checked_write(checks, statement)?;
        let modified = rows
            .first()
            .map(|row| row.try_get::<_, bool>(0))
            .transpose()?
            .unwrap_or(false);
        Ok(UpdateResult {
            matched_count: rows.len() as u64,
            modified_count: u64::from(modified),
        })
    }

    fn delete_one(&self, filter: &Filter) -> StoreResult<DeleteResult> {
        let statement = self.sql.delete(filter)?;
        let sql = Arc::clone(&self.sql);
        let deleted_count = self.session.run(move |client: &mut Client| {
            client
                .execute(statement.sql.as_str(), &statement.bind())
                .map_err(|e| sql.map_error(e))
        })?;
        Ok(DeleteResult { deleted_count })
    }

    fn create_index(&self, field: &str, unique: bool) -> StoreResult<()> {
        let ddl = self.sql.create_index(field, unique)?;
        let built = self
            .session
            .run(move |client: &mut Client| Ok(client.batch_execute(&ddl)))?;

        match built {
            Ok(()) => {
                tracing::debug!(collection = %self.name, field, unique, "index ready");
            }
            Err(err) if unique && err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                tracing::warn!(
                    collection = %self.name,
                    field,
                    reason = %describe_postgres(&err),
                    "existing documents share values, checking uniqueness on write instead"
                );
                let mut checked = self.checked_unique.write();
                if !checked.iter().any(|f| f == field) {
                    checked.push(field.to_string());
                }
            }
            Err(err) => return Err(StoreError::from(err)),
        }
        Ok(())
    }

    fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let rows = self.query(self.sql.count(filter)?)?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
