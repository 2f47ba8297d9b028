//! The data source: record lifecycle on top of a backend connection.

use std::fmt;
use std::sync::Arc;

use dbmodel_core::{
    Binding, Connection, Cursor, Dialect, Error, Loading, Record, RecordClass, Result, Row, Value,
};
use dbmodel_query::{Clause, Delete, Insert, Key, KeyDef, Select, Update, Where};

use crate::config::DataSourceConfig;
use crate::identity::{self, IdentityPlan, IdentityStrategy};
use crate::results::Results;
use crate::sql_log::SqlLog;

// ============================================================================
// DataSource
// ============================================================================

/// A connection handle that turns record operations into SQL.
///
/// The data source does not own or track records: callers hold them and
/// pass them in. Statements run synchronously, in call order, on the one
/// wrapped connection.
///
/// ```ignore
/// let mut ds = DataSource::new(SqliteConnection::open_in_memory()?);
/// let mut person = Record::with_values(&person_class, [("firstname", "Diedrich".into())])?;
/// ds.insert(&mut person)?;
/// person.set("height", 187)?;
/// ds.flush_updates([&mut person])?;
/// ds.commit()?;
/// ```
pub struct DataSource {
    connection: Box<dyn Connection>,
    dialect: Dialect,
    config: DataSourceConfig,
    identity: Box<dyn IdentityStrategy>,
    log: SqlLog,
}

impl DataSource {
    /// Wraps `connection` with default settings for its dialect.
    pub fn new(connection: impl Connection + 'static) -> Self {
        let config = DataSourceConfig::new(connection.dialect());
        Self::with_config(connection, config)
    }

    /// Wraps `connection`. The dialect always comes from the connection.
    pub fn with_config(connection: impl Connection + 'static, config: DataSourceConfig) -> Self {
        let dialect = connection.dialect();
        if config.adapter != dialect && config.adapter != Dialect::Generic {
            tracing::warn!(
                configured = %config.adapter,
                connection = %dialect,
                "adapter does not match the connection's dialect; using the connection's"
            );
        }
        Self {
            connection: Box::new(connection),
            dialect,
            identity: identity::default_strategy(dialect),
            log: SqlLog::new(config.log_capacity),
            config,
        }
    }

    /// Replaces the dialect's default identity strategy.
    pub fn with_identity_strategy(mut self, strategy: impl IdentityStrategy + 'static) -> Self {
        self.identity = Box::new(strategy);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// The most recently executed statements.
    pub fn sql_log(&self) -> &SqlLog {
        &self.log
    }

    pub fn sql_log_mut(&mut self) -> &mut SqlLog {
        &mut self.log
    }

    // ========================================================================
    // Raw SQL
    // ========================================================================

    /// Executes one statement and returns its cursor.
    pub fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>> {
        if self.config.debug {
            tracing::info!(sql, "execute");
        } else {
            tracing::debug!(sql, "execute");
        }
        self.log.push(sql);
        self.connection.execute(sql)
    }

    /// Executes a query and returns its first row.
    pub fn query_one(&mut self, sql: &str) -> Result<Option<Row>> {
        self.execute(sql)?.fetch_one()
    }

    fn query_count(&mut self, sql: &str) -> Result<u64> {
        let row = self.query_one(sql)?;
        row.as_ref()
            .and_then(|r| r.get(0))
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::InvalidValue(format!("{sql:?} did not return a count")))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Runs `SELECT <columns of class> FROM <table> <clauses>`.
    ///
    /// Rows are hydrated as the returned [`Results`] is iterated. Calling
    /// `select` again issues a new query.
    #[tracing::instrument(level = "debug", skip(self, class, clauses), fields(table = %class.table()))]
    pub fn select(&mut self, class: &Arc<RecordClass>, clauses: &[Clause]) -> Result<Results> {
        let statement = Select::for_class(class, self.dialect, false).clauses(clauses);
        self.select_statement(class, &statement)
    }

    /// Runs a prepared SELECT whose column list matches the select bindings
    /// of `class`, e.g. a join built by a relationship.
    pub fn select_statement(&mut self, class: &Arc<RecordClass>, statement: &Select) -> Result<Results> {
        let cursor = self.execute(&statement.to_sql())?;
        Ok(Results::new(Arc::clone(class), cursor))
    }

    /// Zero or one record; more than one matching row is an error.
    pub fn select_one(&mut self, class: &Arc<RecordClass>, clauses: &[Clause]) -> Result<Option<Record>> {
        let results = self.select(class, clauses)?;
        single(class, results)
    }

    /// Like [`DataSource::select_one`] for a prepared statement.
    pub fn select_one_statement(
        &mut self,
        class: &Arc<RecordClass>,
        statement: &Select,
    ) -> Result<Option<Record>> {
        let results = self.select_statement(class, statement)?;
        single(class, results)
    }

    /// The record whose primary key has the given values, in key order.
    ///
    /// Fails with [`Error::NotFound`] when no row matches.
    #[tracing::instrument(level = "debug", skip(self, class), fields(table = %class.table()))]
    pub fn select_by_primary_key(&mut self, class: &Arc<RecordClass>, key: &[Value]) -> Result<Record> {
        let filter = KeyDef::primary(class)?.where_for(key, self.dialect, None)?;
        self.select_one(class, &[filter.into()])?
            .ok_or_else(|| Error::NotFound {
                class: class.name().to_string(),
            })
    }

    /// A stored record carrying only its primary key, without a query.
    ///
    /// Assign the columns to change and flush it to issue a blind UPDATE.
    pub fn select_for_update(&self, class: &Arc<RecordClass>, key: &[Value]) -> Result<Record> {
        let def = KeyDef::primary(class)?;
        def.literals_for(key, self.dialect)?;
        let mut record = Record::new(class);
        for (binding, value) in def.bindings().zip(key) {
            binding.set_from_result(&mut record, value.clone())?;
        }
        record.mark_stored();
        Ok(record)
    }

    /// `SELECT COUNT(*)` with the WHERE clauses among `clauses`.
    pub fn count(&mut self, class: &Arc<RecordClass>, clauses: &[Clause]) -> Result<u64> {
        let sql = Select::count(class.table().render(self.dialect))
            .where_clauses(clauses)
            .to_sql();
        self.query_count(&sql)
    }

    /// Runs a prepared `SELECT COUNT(*)`.
    pub fn count_statement(&mut self, statement: &Select) -> Result<u64> {
        self.query_count(&statement.to_sql())
    }

    /// Fetches a delayed attribute of a stored record.
    ///
    /// An assigned value is returned without a query. A fetched value is
    /// kept in the record unless the binding is declared uncached.
    pub fn load_delayed(&mut self, record: &mut Record, attribute: &str) -> Result<Value> {
        let binding = Arc::clone(record.class().binding(attribute)?);
        if let Some(value) = record.slot(binding.index()) {
            return Ok(value.clone());
        }
        if !record.is_stored() {
            return Err(Error::ObjectNotStored {
                class: record.class().name().to_string(),
            });
        }

        let filter = self.stored_row_filter(record)?;
        let sql = Select::new(record.class().table().render(self.dialect))
            .column(self.dialect.identifier(binding.column_name()))
            .filter(filter)
            .to_sql();
        let raw = self
            .query_one(&sql)?
            .and_then(|row| row.into_values().into_iter().next())
            .ok_or_else(|| Error::NotFound {
                class: record.class().name().to_string(),
            })?;

        match binding.loading() {
            Loading::Delayed { cache: false } => {
                binding.sql_type().from_sql(raw).map_err(|rejected| Error::Conversion {
                    class: record.class().name().to_string(),
                    attribute: binding.name().to_string(),
                    expected: binding.sql_type(),
                    found: rejected.type_name(),
                })
            }
            _ => {
                binding.set_from_result(record, raw)?;
                binding.get(record).cloned()
            }
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// INSERTs `record`, then reads back unset server-side defaults.
    ///
    /// Unset identity bindings are handled by the identity strategy before
    /// the INSERT text is built. On success the record is stored and clean.
    #[tracing::instrument(level = "debug", skip(self, record), fields(table = %record.class().table()))]
    pub fn insert(&mut self, record: &mut Record) -> Result<()> {
        self.insert_record(record, true)
    }

    /// INSERTs `record` without the select-after-insert; server-side
    /// defaults stay unset on the record.
    #[tracing::instrument(level = "debug", skip(self, record), fields(table = %record.class().table()))]
    pub fn insert_without_select(&mut self, record: &mut Record) -> Result<()> {
        self.insert_record(record, false)
    }

    fn insert_record(&mut self, record: &mut Record, read_back: bool) -> Result<()> {
        let class = Arc::clone(record.class());
        if record.is_stored() {
            return Err(Error::ObjectAlreadyInserted {
                class: class.name().to_string(),
            });
        }
        let dialect = self.dialect;

        let mut after_insert: Option<(Arc<Binding>, String)> = None;
        for binding in class.identity_bindings() {
            if binding.is_set(record) {
                continue;
            }
            match self.identity.plan(dialect, &class, binding)? {
                IdentityPlan::Assign(value) => binding.set(record, value)?,
                IdentityPlan::Prefetch(sql) => {
                    let value = self
                        .query_one(&sql)?
                        .and_then(|row| row.into_values().into_iter().next())
                        .ok_or_else(|| Error::IdentityUnavailable {
                            class: class.name().to_string(),
                            attribute: binding.name().to_string(),
                        })?;
                    tracing::debug!(attribute = binding.name(), ?value, "pre-fetched identity");
                    binding.set_from_result(record, value)?;
                }
                IdentityPlan::AfterInsert(expression) => {
                    after_insert.get_or_insert_with(|| (Arc::clone(binding), expression));
                }
            }
        }

        let mut insert = Insert::new(class.table().render(dialect));
        for binding in class.bindings() {
            if let Some(value) = record.slot(binding.index()) {
                insert = insert.value(dialect.identifier(binding.column_name()), dialect.literal(value));
            }
        }
        if insert.is_empty() {
            return Err(Error::NoData {
                class: class.name().to_string(),
            });
        }
        self.execute(&insert.to_sql())?;
        record.mark_stored();

        let pending: Vec<Arc<Binding>> = class
            .select_bindings()
            .filter(|b| b.has_server_default() && !b.is_set(record))
            .cloned()
            .collect();
        if !read_back || pending.is_empty() {
            return Ok(());
        }

        let filter = match &after_insert {
            Some((binding, expression)) => {
                Where::eq(dialect.identifier(binding.column_name()), expression)
            }
            None => self.stored_row_filter(record)?,
        };
        let sql = Select::new(class.table().render(dialect))
            .columns(pending.iter().map(|b| dialect.identifier(b.column_name())))
            .filter(filter)
            .to_sql();
        let row = self.query_one(&sql)?.ok_or_else(|| Error::NotFound {
            class: class.name().to_string(),
        })?;
        for (binding, raw) in pending.iter().zip(row.into_values()) {
            binding.set_from_result(record, raw)?;
        }
        record.mark_stored();
        Ok(())
    }

    /// Issues one UPDATE for the dirty columns of a stored record.
    ///
    /// Returns `false` without touching the backend when nothing is dirty.
    #[tracing::instrument(level = "debug", skip(self, record), fields(table = %record.class().table()))]
    pub fn update(&mut self, record: &mut Record) -> Result<bool> {
        if !record.is_stored() {
            return Err(Error::ObjectNotStored {
                class: record.class().name().to_string(),
            });
        }
        if !record.is_dirty() {
            return Ok(false);
        }
        let dialect = self.dialect;
        let filter = self.stored_row_filter(record)?;
        let mut update = Update::new(record.class().table().render(dialect), filter);
        for binding in record.dirty_bindings() {
            update = update.set(
                dialect.identifier(binding.column_name()),
                binding.sql_literal(record, dialect)?,
            );
        }
        self.execute(&update.to_sql())?;
        record.mark_stored();
        Ok(true)
    }

    /// Flushes every stored, dirty record and returns the number of UPDATE
    /// statements issued. Unstored and clean records are skipped.
    ///
    /// An unstored record never produces an UPDATE, so it is passed over
    /// silently rather than reported as [`Error::PrimaryKeyNotKnown`] or
    /// [`Error::ObjectNotStored`]. Insert it first to persist it.
    pub fn flush_updates<'r>(&mut self, records: impl IntoIterator<Item = &'r mut Record>) -> Result<usize> {
        let mut issued = 0;
        for record in records {
            if record.is_stored() && self.update(record)? {
                issued += 1;
            }
        }
        tracing::debug!(issued, "flushed updates");
        Ok(issued)
    }

    /// DELETEs the stored row of `record`; the record becomes unstored.
    #[tracing::instrument(level = "debug", skip(self, record), fields(table = %record.class().table()))]
    pub fn delete(&mut self, record: &mut Record) -> Result<()> {
        if !record.is_stored() {
            return Err(Error::ObjectNotStored {
                class: record.class().name().to_string(),
            });
        }
        let filter = self.stored_row_filter(record)?;
        let sql = Delete::new(record.class().table().render(self.dialect))
            .filter(filter)
            .to_sql();
        self.execute(&sql)?;
        record.mark_unstored();
        Ok(())
    }

    /// DELETEs the row with the given primary key without loading it.
    pub fn delete_by_primary_key(&mut self, class: &Arc<RecordClass>, key: &[Value]) -> Result<()> {
        let filter = KeyDef::primary(class)?.where_for(key, self.dialect, None)?;
        let sql = Delete::new(class.table().render(self.dialect))
            .filter(filter)
            .to_sql();
        self.execute(&sql)?;
        Ok(())
    }

    /// WHERE clause addressing the stored row of `record`: its persisted key
    /// when known, otherwise its current key.
    fn stored_row_filter(&self, record: &Record) -> Result<Where> {
        let def = KeyDef::primary(record.class())?;
        match record.persisted_key() {
            Some(values) => def.where_for(values, self.dialect, None),
            None => Key::primary(record)?
                .where_clause(self.dialect)
                .map_err(|err| match err {
                    Error::KeyNotSet { class, .. } => Error::PrimaryKeyNotKnown { class },
                    other => other,
                }),
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&mut self) -> Result<()> {
        self.connection.commit()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self) -> Result<()> {
        self.connection.rollback()
    }

    /// Closes the connection. Outstanding [`Results`] may stop working.
    pub fn close(mut self) -> Result<()> {
        tracing::debug!(dialect = %self.dialect, "closing data source");
        self.connection.close()
    }
}

fn single(class: &RecordClass, mut results: Results) -> Result<Option<Record>> {
    let Some(first) = results.next().transpose()? else {
        return Ok(None);
    };
    let extra = results.try_fold(0usize, |n, record| record.map(|_| n + 1))?;
    if extra > 0 {
        return Err(Error::MultipleRecords {
            class: class.name().to_string(),
            count: extra + 1,
        });
    }
    Ok(Some(first))
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("dialect", &self.dialect)
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("logged", &self.log.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use dbmodel_core::{PropertyGroup, SqlType};
    use dbmodel_query::OrderBy;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::identity::LocalCounter;
    use crate::mock::MockConnection;

    fn person() -> Arc<RecordClass> {
        RecordClass::builder("person")
            .field(Binding::text("firstname"))
            .field(Binding::text("lastname"))
            .field(Binding::integer("height"))
            .field(Binding::text("bio").delayed())
            .primary_key(&["firstname", "lastname"])
            .build()
            .unwrap()
    }

    fn tag() -> Arc<RecordClass> {
        RecordClass::builder("tag")
            .field(Binding::serial("id"))
            .field(Binding::text("name"))
            .field(Binding::timestamp("created").has_default())
            .build()
            .unwrap()
    }

    fn data_source(dialect: Dialect) -> (DataSource, MockConnection) {
        let mock = MockConnection::new(dialect);
        (DataSource::new(mock.clone()), mock)
    }

    fn diedrich(class: &Arc<RecordClass>) -> Record {
        Record::with_values(
            class,
            [
                ("firstname", "Diedrich".into()),
                ("lastname", "Vorberg".into()),
                ("height", 186.into()),
            ],
        )
        .unwrap()
    }

    // ========================================================================
    // Insert
    // ========================================================================

    #[test]
    fn test_insert_composite_key() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();

        assert_eq!(
            mock.statements(),
            vec!["INSERT INTO person(firstname, lastname, height) VALUES ('Diedrich', 'Vorberg', 186)"]
        );
        assert!(record.is_stored());
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_insert_twice_fails() {
        let (mut ds, _mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        assert!(matches!(
            ds.insert(&mut record),
            Err(Error::ObjectAlreadyInserted { .. })
        ));
    }

    #[test]
    fn test_insert_without_data_fails() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = Record::new(&class);
        assert!(matches!(ds.insert(&mut record), Err(Error::NoData { .. })));
        assert!(mock.statements().is_empty());
        assert!(!record.is_stored());
    }

    #[test]
    fn test_prefetch_identity_is_increasing() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = tag();
        let mut first = Record::with_values(&class, [("name", "red".into())]).unwrap();
        let mut second = Record::with_values(&class, [("name", "green".into())]).unwrap();
        ds.insert_without_select(&mut first).unwrap();
        ds.insert_without_select(&mut second).unwrap();

        let a = first.get("id").unwrap().as_i64().unwrap();
        let b = second.get("id").unwrap().as_i64().unwrap();
        assert!(b > a);
        assert_eq!(
            mock.statements(),
            vec![
                "SELECT nextval('tag_id_seq')",
                "INSERT INTO tag(id, name) VALUES (1, 'red')",
                "SELECT nextval('tag_id_seq')",
                "INSERT INTO tag(id, name) VALUES (2, 'green')",
            ]
        );
        assert!(mock.statements().iter().all(|s| !s.contains("MAX(")));
    }

    #[test]
    fn test_prefetch_then_read_back_defaults_by_key() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = tag();
        mock.push_rows(vec![vec!["2024-05-01 12:00:00".into()]]);
        let mut record = Record::with_values(&class, [("name", "red".into())]).unwrap();
        ds.insert(&mut record).unwrap();

        assert_eq!(
            mock.statements()[2],
            "SELECT created FROM tag WHERE id = 1"
        );
        assert!(matches!(record.get("created").unwrap(), Value::Timestamp(_)));
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_post_insert_identity_reads_row_back() {
        let (mut ds, mock) = data_source(Dialect::MySql);
        let class = tag();
        mock.push_rows(vec![vec![Value::BigInt(41), "2024-05-01 12:00:00".into()]]);
        let mut record = Record::with_values(&class, [("name", "red".into())]).unwrap();
        ds.insert(&mut record).unwrap();

        assert_eq!(
            mock.statements(),
            vec![
                "INSERT INTO tag(name) VALUES ('red')",
                "SELECT id, created FROM tag WHERE id = LAST_INSERT_ID()",
            ]
        );
        assert_eq!(record.get("id").unwrap(), &Value::Int(41));
        assert_eq!(record.persisted_key(), Some(&[Value::Int(41)][..]));
    }

    #[test]
    fn test_generic_dialect_requires_explicit_identity() {
        let (mut ds, mock) = data_source(Dialect::Generic);
        let class = tag();
        let mut record = Record::with_values(&class, [("name", "red".into())]).unwrap();
        assert!(matches!(
            ds.insert(&mut record),
            Err(Error::IdentityUnavailable { .. })
        ));
        assert!(mock.statements().is_empty());

        record.set("id", 5).unwrap();
        ds.insert_without_select(&mut record).unwrap();
        assert_eq!(mock.statements(), vec!["INSERT INTO tag(id, name) VALUES (5, 'red')"]);
    }

    #[test]
    fn test_injected_identity_strategy() {
        let mock = MockConnection::new(Dialect::Generic);
        let mut ds = DataSource::new(mock.clone()).with_identity_strategy(LocalCounter::starting_at(100));
        let class = tag();
        let mut record = Record::with_values(&class, [("name", "red".into())]).unwrap();
        ds.insert_without_select(&mut record).unwrap();
        assert_eq!(record.get("id").unwrap(), &Value::Int(100));
        assert_eq!(mock.statements(), vec!["INSERT INTO tag(id, name) VALUES (100, 'red')"]);
    }

    #[test]
    fn test_failed_insert_leaves_record_unstored() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        mock.fail_on("INSERT");
        let class = person();
        let mut record = diedrich(&class);
        assert!(matches!(ds.insert(&mut record), Err(Error::Backend(_))));
        assert!(!record.is_stored());
        assert!(record.is_dirty());
    }

    // ========================================================================
    // Update / flush
    // ========================================================================

    #[test]
    fn test_flush_composite_key_update() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        record.set("height", 187).unwrap();

        let issued = ds.flush_updates([&mut record]).unwrap();
        assert_eq!(issued, 1);
        assert_eq!(
            mock.statements().last().unwrap(),
            "UPDATE person SET height = 187 WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"
        );
    }

    #[test]
    fn test_second_flush_issues_nothing() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        record.set("height", 187).unwrap();
        assert_eq!(ds.flush_updates([&mut record]).unwrap(), 1);
        let before = mock.statements().len();
        assert_eq!(ds.flush_updates([&mut record]).unwrap(), 0);
        assert_eq!(mock.statements().len(), before);
    }

    #[test]
    fn test_flush_skips_unstored_records() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        assert_eq!(ds.flush_updates([&mut record]).unwrap(), 0);
        assert!(mock.statements().is_empty());
    }

    #[test]
    fn test_property_group_update_writes_one_language() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let city = RecordClass::builder("city")
            .field(Binding::serial("id"))
            .property_group(PropertyGroup::new("name", SqlType::Text, &["de", "en"]).with_default("en"))
            .build()
            .unwrap();
        mock.push_rows(vec![vec![Value::BigInt(2), "München".into(), "Munich".into()]]);

        let mut munich = ds.select_by_primary_key(&city, &[Value::Int(2)]).unwrap();
        let name = city.property_group("name").unwrap();
        assert_eq!(name.get_default(&munich).unwrap(), &Value::Text("Munich".into()));
        name.set(&mut munich, "de", "Landeshauptstadt München").unwrap();

        assert_eq!(ds.flush_updates([&mut munich]).unwrap(), 1);
        assert_eq!(
            mock.statements(),
            vec![
                "SELECT id, name_de, name_en FROM city WHERE id = 2",
                "UPDATE city SET name_de = 'Landeshauptstadt München' WHERE id = 2",
            ]
        );
    }

    #[test]
    fn test_update_targets_persisted_key() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        record.set("lastname", "Meyer").unwrap();
        assert!(ds.update(&mut record).unwrap());
        assert_eq!(
            mock.statements().last().unwrap(),
            "UPDATE person SET lastname = 'Meyer' WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"
        );
        record.set("height", 190).unwrap();
        ds.update(&mut record).unwrap();
        assert_eq!(
            mock.statements().last().unwrap(),
            "UPDATE person SET height = 190 WHERE firstname = 'Diedrich' AND lastname = 'Meyer'"
        );
    }

    #[test]
    fn test_update_unstored_fails() {
        let (mut ds, _mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        assert!(matches!(
            ds.update(&mut record),
            Err(Error::ObjectNotStored { .. })
        ));
    }

    #[test]
    fn test_flush_without_known_key() {
        let (mut ds, _mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = Record::with_values(&class, [("firstname", "Diedrich".into())]).unwrap();
        record.mark_stored();
        record.set("height", 1).unwrap();
        assert!(matches!(
            ds.flush_updates([&mut record]),
            Err(Error::PrimaryKeyNotKnown { .. })
        ));
    }

    #[test]
    fn test_select_for_update_is_blind() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = ds
            .select_for_update(&class, &["Diedrich".into(), "Vorberg".into()])
            .unwrap();
        assert!(record.is_stored());
        record.set("height", 187).unwrap();
        ds.update(&mut record).unwrap();
        assert_eq!(
            mock.statements(),
            vec!["UPDATE person SET height = 187 WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"]
        );
        assert!(matches!(
            ds.select_for_update(&class, &["Diedrich".into()]),
            Err(Error::IllegalPrimaryKey(_))
        ));
    }

    // ========================================================================
    // Select
    // ========================================================================

    #[test]
    fn test_select_hydrates_lazily() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        mock.push_rows(vec![
            vec!["Diedrich".into(), "Vorberg".into(), Value::BigInt(186)],
            vec!["Ada".into(), "Lovelace".into(), Value::Null],
        ]);
        let records = ds
            .select(&class, &[Where::raw("height > 100").into(), OrderBy::asc("lastname").into()])
            .unwrap()
            .all()
            .unwrap();
        assert_eq!(
            mock.statements(),
            vec!["SELECT firstname, lastname, height FROM person WHERE height > 100 ORDER BY lastname"]
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("height").unwrap(), &Value::Int(186));
        assert_eq!(records[1].get("height").unwrap(), &Value::Null);
    }

    #[test]
    fn test_select_one_cases() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        assert!(ds.select_one(&class, &[]).unwrap().is_none());

        mock.push_rows(vec![vec!["Diedrich".into(), "Vorberg".into(), Value::BigInt(186)]]);
        assert!(ds.select_one(&class, &[]).unwrap().is_some());

        mock.push_rows(vec![
            vec!["Diedrich".into(), "Vorberg".into(), Value::BigInt(186)],
            vec!["Ada".into(), "Lovelace".into(), Value::Null],
        ]);
        assert!(matches!(
            ds.select_one(&class, &[]),
            Err(Error::MultipleRecords { count: 2, .. })
        ));
    }

    #[test]
    fn test_select_by_primary_key() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        mock.push_rows(vec![vec!["Diedrich".into(), "Vorberg".into(), Value::BigInt(186)]]);
        let record = ds
            .select_by_primary_key(&class, &["Diedrich".into(), "Vorberg".into()])
            .unwrap();
        assert_eq!(
            mock.statements(),
            vec!["SELECT firstname, lastname, height FROM person WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"]
        );
        assert_eq!(record.get("height").unwrap(), &Value::Int(186));

        assert!(matches!(
            ds.select_by_primary_key(&class, &["Nobody".into(), "Here".into()]),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_count() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        mock.push_count(3);
        let n = ds
            .count(&class, &[Where::raw("height > 180").into(), Clause::Limit(1)])
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(mock.statements(), vec!["SELECT COUNT(*) FROM person WHERE height > 180"]);
    }

    #[test]
    fn test_load_delayed() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        mock.push_rows(vec![vec!["Born in Bremen".into()]]);

        let bio = ds.load_delayed(&mut record, "bio").unwrap();
        assert_eq!(bio, Value::from("Born in Bremen"));
        assert_eq!(
            mock.statements().last().unwrap(),
            "SELECT bio FROM person WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"
        );

        let before = mock.statements().len();
        ds.load_delayed(&mut record, "bio").unwrap();
        assert_eq!(mock.statements().len(), before);
        assert!(!record.is_dirty());
    }

    // ========================================================================
    // Delete / transactions / logging
    // ========================================================================

    #[test]
    fn test_delete() {
        let (mut ds, mock) = data_source(Dialect::Postgres);
        let class = person();
        let mut record = diedrich(&class);
        ds.insert(&mut record).unwrap();
        ds.delete(&mut record).unwrap();
        assert!(!record.is_stored());
        assert_eq!(
            mock.statements().last().unwrap(),
            "DELETE FROM person WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"
        );
        assert!(matches!(ds.delete(&mut record), Err(Error::ObjectNotStored { .. })));

        ds.delete_by_primary_key(&class, &["Ada".into(), "Lovelace".into()])
            .unwrap();
        assert_eq!(
            mock.statements().last().unwrap(),
            "DELETE FROM person WHERE firstname = 'Ada' AND lastname = 'Lovelace'"
        );
    }

    #[test]
    fn test_commit_and_rollback_reach_connection() {
        let (mut ds, mock) = data_source(Dialect::Sqlite);
        ds.commit().unwrap();
        ds.rollback().unwrap();
        assert_eq!(mock.commits(), 1);
        assert_eq!(mock.rollbacks(), 1);
        ds.close().unwrap();
    }

    #[test]
    fn test_sql_log_tracks_statements() {
        let mock = MockConnection::new(Dialect::Postgres);
        let config = DataSourceConfig::new(Dialect::Postgres).log_capacity(2);
        let mut ds = DataSource::with_config(mock, config);
        ds.execute("SELECT 1").unwrap();
        ds.execute("SELECT 2").unwrap();
        ds.execute("SELECT 3").unwrap();
        assert_eq!(ds.sql_log().iter().collect::<Vec<_>>(), vec!["SELECT 2", "SELECT 3"]);
        assert_eq!(ds.sql_log().last(), Some("SELECT 3"));
        ds.sql_log_mut().clear();
        assert!(ds.sql_log().is_empty());
    }

    #[test]
    fn test_dialect_comes_from_connection() {
        let mock = MockConnection::new(Dialect::MySql);
        let ds = DataSource::with_config(mock, DataSourceConfig::new(Dialect::Postgres));
        assert_eq!(ds.dialect(), Dialect::MySql);
    }
}
