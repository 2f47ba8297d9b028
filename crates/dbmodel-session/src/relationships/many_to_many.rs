use std::sync::Arc;

use dbmodel_core::{
    CachedRelation, Cursor, Dialect, Error, LinkTable, Record, RecordClass, RelationshipId,
    Result, TableName, Value,
};
use dbmodel_query::{Clause, Delete, Insert, KeyDef, Select, Where, column_ref, key_where};

use super::many_to_one::as_strs;
use super::{check_class, default_key_names};
use crate::datasource::DataSource;
use crate::results::Results;

/// Rows of the target class paired with the owner through a link table.
///
/// The link table has one column group pointing at the owner's key and one
/// pointing at the target's key. Link rows are written and deleted
/// immediately by [`ManyToManyView::append`], [`ManyToManyView::unlink`] and
/// [`ManyToManyView::set_all`].
///
/// ```ignore
/// let tags = ManyToMany::builder("tags", &person, &tag).build()?;
/// let people = tags.reverse("people");
/// tags.of(&mut diedrich)?.append(&mut ds, &mut rust_tag)?;
/// ```
#[derive(Debug, Clone)]
pub struct ManyToMany {
    id: RelationshipId,
    name: String,
    owner_key: KeyDef,
    target_key: KeyDef,
    link: LinkTable,
}

impl ManyToMany {
    pub fn builder(
        name: impl Into<String>,
        owner: &Arc<RecordClass>,
        target: &Arc<RecordClass>,
    ) -> ManyToManyBuilder {
        ManyToManyBuilder {
            name: name.into(),
            owner: Arc::clone(owner),
            target: Arc::clone(target),
            owner_key: None,
            target_key: None,
            link_table: None,
            parent_columns: None,
            child_columns: None,
        }
    }

    pub fn id(&self) -> RelationshipId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Arc<RecordClass> {
        self.owner_key.class()
    }

    pub fn target(&self) -> &Arc<RecordClass> {
        self.target_key.class()
    }

    pub fn link_table(&self) -> &LinkTable {
        &self.link
    }

    /// The same pairing declared on the target class, over the same link
    /// table.
    pub fn reverse(&self, name: impl Into<String>) -> ManyToMany {
        ManyToMany {
            id: RelationshipId::next(),
            name: name.into(),
            owner_key: self.target_key.clone(),
            target_key: self.owner_key.clone(),
            link: self.link.reversed(),
        }
    }

    /// The targets linked to `parent`.
    pub fn of<'a>(&'a self, parent: &'a mut Record) -> Result<ManyToManyView<'a>> {
        check_class(self.owner(), parent)?;
        Ok(ManyToManyView {
            relationship: self,
            parent,
        })
    }

    fn link_where(
        &self,
        dialect: Dialect,
        qualifier: Option<&TableName>,
        parent_literals: &[String],
        child_literals: Option<&[String]>,
    ) -> Result<Where> {
        let mut parts = Vec::new();
        parts.extend(key_where(dialect, qualifier, self.link.parent_columns(), parent_literals));
        if let Some(child_literals) = child_literals {
            parts.extend(key_where(dialect, qualifier, self.link.child_columns(), child_literals));
        }
        Where::all(parts).ok_or_else(|| {
            Error::IllegalForeignKey(format!("link table {} has no columns", self.link.table()))
        })
    }

    /// `link.child_column = target.key_column` for each column pair.
    fn join(&self, dialect: Dialect) -> Vec<Where> {
        let link = self.link.table();
        let target = self.target().table();
        self.link
            .child_columns()
            .iter()
            .zip(self.target_key.columns())
            .map(|(link_column, target_column)| {
                Where::eq(
                    column_ref(dialect, Some(link), link_column),
                    column_ref(dialect, Some(target), target_column),
                )
            })
            .collect()
    }

    /// Join condition plus the parent match, as one flat AND chain.
    fn joined_filter(&self, dialect: Dialect, parent_literals: &[String]) -> Result<Where> {
        let parent = self.link_where(dialect, Some(self.link.table()), parent_literals, None)?;
        Where::all(self.join(dialect).into_iter().chain([parent])).ok_or_else(|| {
            Error::IllegalForeignKey(format!("link table {} has no columns", self.link.table()))
        })
    }
}

/// Builder for [`ManyToMany`].
#[derive(Debug)]
pub struct ManyToManyBuilder {
    name: String,
    owner: Arc<RecordClass>,
    target: Arc<RecordClass>,
    owner_key: Option<Vec<String>>,
    target_key: Option<Vec<String>>,
    link_table: Option<TableName>,
    parent_columns: Option<Vec<String>>,
    child_columns: Option<Vec<String>>,
}

impl ManyToManyBuilder {
    /// Link table name; defaults to `<owner table>_<target table>`.
    pub fn link_table(mut self, table: impl Into<String>) -> Self {
        self.link_table = Some(TableName::new(table));
        self
    }

    pub fn schema_link_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.link_table = Some(TableName::with_schema(schema, table));
        self
    }

    /// Owner attributes referenced by the link table; defaults to the
    /// owner's primary key.
    pub fn owner_key(mut self, attributes: &[&str]) -> Self {
        self.owner_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    /// Target attributes referenced by the link table; defaults to the
    /// target's primary key.
    pub fn target_key(mut self, attributes: &[&str]) -> Self {
        self.target_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    /// Link columns pointing at the owner, in owner key order.
    ///
    /// Defaults to `<owner table>_<key column>`.
    pub fn parent_columns(mut self, columns: &[&str]) -> Self {
        self.parent_columns = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Link columns pointing at the target, in target key order.
    ///
    /// Defaults to `<target table>_<key column>`.
    pub fn child_columns(mut self, columns: &[&str]) -> Self {
        self.child_columns = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    pub fn build(self) -> Result<ManyToMany> {
        let owner_key = match &self.owner_key {
            Some(names) => KeyDef::new(&self.owner, &as_strs(names))?,
            None => KeyDef::primary(&self.owner)?,
        };
        let target_key = match &self.target_key {
            Some(names) => KeyDef::new(&self.target, &as_strs(names))?,
            None => KeyDef::primary(&self.target)?,
        };
        let owner_table = self.owner.table().name();
        let target_table = self.target.table().name();

        let parent_columns = self
            .parent_columns
            .unwrap_or_else(|| default_key_names(owner_table, owner_key.columns()));
        let child_columns = self
            .child_columns
            .unwrap_or_else(|| default_key_names(target_table, target_key.columns()));
        let table = self
            .link_table
            .unwrap_or_else(|| TableName::new(format!("{owner_table}_{target_table}")));

        for (side, columns, key) in [
            ("owner", &parent_columns, &owner_key),
            ("target", &child_columns, &target_key),
        ] {
            if columns.len() != key.len() {
                return Err(Error::IllegalForeignKey(format!(
                    "link table {table}: {} columns for the {side} key ({}) of {}",
                    columns.len(),
                    key.attribute_names().join(", "),
                    key.class().name()
                )));
            }
        }
        if let Some(shared) = parent_columns.iter().find(|c| child_columns.contains(*c)) {
            return Err(Error::Declaration(format!(
                "link table {table}: column {shared} is used for both sides"
            )));
        }

        Ok(ManyToMany {
            id: RelationshipId::next(),
            name: self.name,
            owner_key,
            target_key,
            link: LinkTable::new(table, parent_columns, child_columns),
        })
    }
}

/// A [`ManyToMany`] bound to one parent record.
#[derive(Debug)]
pub struct ManyToManyView<'a> {
    relationship: &'a ManyToMany,
    parent: &'a mut Record,
}

impl ManyToManyView<'_> {
    fn parent_literals(&self, dialect: Dialect) -> Result<Vec<String>> {
        self.relationship
            .owner_key
            .bind(&*self.parent)?
            .sql_literals(dialect)
    }

    /// Linked targets matching `clauses`, fetched lazily.
    pub fn select(&self, ds: &mut DataSource, clauses: &[Clause]) -> Result<Results> {
        let rel = self.relationship;
        let dialect = ds.dialect();
        let filter = rel.joined_filter(dialect, &self.parent_literals(dialect)?)?;
        let statement = Select::for_class(rel.target(), dialect, true)
            .from(rel.link.table().render(dialect))
            .filter(filter)
            .clauses(clauses);
        ds.select_statement(rel.target(), &statement)
    }

    /// Number of linked targets matching `clauses`. Counts the cache when
    /// the targets have been loaded and no clauses are given.
    pub fn len(&self, ds: &mut DataSource, clauses: &[Clause]) -> Result<u64> {
        if clauses.is_empty() {
            if let Some(cached) = self.cached() {
                return Ok(cached.len() as u64);
            }
        }
        let rel = self.relationship;
        let dialect = ds.dialect();
        let filter = rel.joined_filter(dialect, &self.parent_literals(dialect)?)?;
        let statement = Select::count(rel.target().table().render(dialect))
            .from(rel.link.table().render(dialect))
            .filter(filter)
            .where_clauses(clauses);
        ds.count_statement(&statement)
    }

    /// Fetches all linked targets and caches them on the parent.
    pub fn load(&mut self, ds: &mut DataSource) -> Result<&[Record]> {
        let targets = self.select(ds, &[])?.all()?;
        let id = self.relationship.id;
        self.parent.cache_relation(id, CachedRelation::Many(targets));
        Ok(self.cached().unwrap_or_default())
    }

    /// Every target matching `clauses`, linked or not, together with the
    /// target keys the parent is linked to.
    ///
    /// An unstored parent has no links, so the key list is empty.
    ///
    /// ```ignore
    /// let (tags, linked) = tags.of(&mut diedrich)?.all(&mut ds, &[])?;
    /// for tag in tags {
    ///     let tag = tag?;
    ///     let checked = linked.contains(&Key::primary(&tag)?.values()?);
    /// }
    /// ```
    pub fn all(&self, ds: &mut DataSource, clauses: &[Clause]) -> Result<(Results, Vec<Vec<Value>>)> {
        let rel = self.relationship;
        let dialect = ds.dialect();
        let linked = if self.parent.is_stored() {
            let link = rel.link.table();
            let columns = rel
                .target_key
                .columns()
                .into_iter()
                .map(|c| column_ref(dialect, Some(rel.target().table()), c))
                .collect::<Vec<_>>();
            let filter = rel.joined_filter(dialect, &self.parent_literals(dialect)?)?;
            let statement = Select::new(rel.target().table().render(dialect))
                .columns(columns)
                .from(link.render(dialect))
                .filter(filter)
                .where_clauses(clauses);
            let types = rel.target_key.sql_types();
            ds.execute(&statement.to_sql())?
                .fetch_all()?
                .into_iter()
                .map(|row| {
                    row.into_values()
                        .into_iter()
                        .zip(&types)
                        .map(|(raw, ty)| ty.from_sql(raw).unwrap_or_else(|raw| raw))
                        .collect()
                })
                .collect()
        } else {
            Vec::new()
        };
        let targets = ds.select(rel.target(), clauses)?;
        Ok((targets, linked))
    }

    pub fn cached(&self) -> Option<&[Record]> {
        match self.parent.cached_relation(self.relationship.id) {
            Some(CachedRelation::Many(targets)) => Some(targets),
            _ => None,
        }
    }

    pub fn invalidate(&mut self) {
        self.parent.invalidate_relation(self.relationship.id);
    }

    /// Links `child` to the parent, inserting `child` first if it is not
    /// stored yet.
    ///
    /// Returns `false` and writes nothing when the link row already exists.
    pub fn append(&mut self, ds: &mut DataSource, child: &mut Record) -> Result<bool> {
        let rel = self.relationship;
        check_class(rel.target(), child)?;
        let dialect = ds.dialect();
        let parent_literals = self.parent_literals(dialect)?;
        if !child.is_stored() {
            ds.insert(child)?;
        }
        let child_literals = rel.target_key.bind(child)?.sql_literals(dialect)?;
        let linked = self.link(ds, &parent_literals, &child_literals)?;
        if linked {
            self.invalidate();
        }
        Ok(linked)
    }

    /// Writes one link row unless it exists already.
    fn link(
        &self,
        ds: &mut DataSource,
        parent_literals: &[String],
        child_literals: &[String],
    ) -> Result<bool> {
        let rel = self.relationship;
        let dialect = ds.dialect();
        let link_table = rel.link.table().render(dialect);
        let existing = Select::count(link_table.clone()).filter(rel.link_where(
            dialect,
            None,
            parent_literals,
            Some(child_literals),
        )?);
        if ds.count_statement(&existing)? > 0 {
            tracing::debug!(relationship = %rel.name, "link row exists; append is a no-op");
            return Ok(false);
        }

        let mut insert = Insert::new(link_table);
        let columns = rel.link.parent_columns().iter().chain(rel.link.child_columns());
        for (column, literal) in columns.zip(parent_literals.iter().chain(child_literals)) {
            insert = insert.value(dialect.identifier(column), literal.as_str());
        }
        ds.execute(&insert.to_sql())?;
        Ok(true)
    }

    /// Deletes the link row between the parent and `child`.
    pub fn unlink(&mut self, ds: &mut DataSource, child: &Record) -> Result<()> {
        check_class(self.relationship.target(), child)?;
        let child_literals = self
            .relationship
            .target_key
            .bind(child)?
            .sql_literals(ds.dialect())?;
        self.delete_links(ds, Some(&child_literals))
    }

    /// Deletes the link row to the target with primary key `key`, without
    /// fetching the target.
    pub fn unlink_by_primary_key(&mut self, ds: &mut DataSource, key: &[Value]) -> Result<()> {
        let child_literals = self
            .relationship
            .target_key
            .literals_for(key, ds.dialect())?;
        self.delete_links(ds, Some(&child_literals))
    }

    /// Replaces every link of the parent with links to `children`.
    ///
    /// All elements are checked and unstored children are inserted before
    /// the old links are deleted, so a failing child leaves the link table
    /// untouched.
    pub fn set_all(&mut self, ds: &mut DataSource, children: &mut [Record]) -> Result<()> {
        let rel = self.relationship;
        for child in children.iter() {
            check_class(rel.target(), child)?;
            if child.is_stored() {
                rel.target_key.bind(child)?.values()?;
            }
        }
        let dialect = ds.dialect();
        let parent_literals = self.parent_literals(dialect)?;
        for child in children.iter_mut().filter(|c| !c.is_stored()) {
            ds.insert(child)?;
        }
        let child_literals = children
            .iter()
            .map(|child| rel.target_key.bind(child)?.sql_literals(dialect))
            .collect::<Result<Vec<_>>>()?;

        self.delete_links(ds, None)?;
        for literals in &child_literals {
            self.link(ds, &parent_literals, literals)?;
        }
        Ok(())
    }

    fn delete_links(&mut self, ds: &mut DataSource, child_literals: Option<&[String]>) -> Result<()> {
        let rel = self.relationship;
        let dialect = ds.dialect();
        let filter = rel.link_where(dialect, None, &self.parent_literals(dialect)?, child_literals)?;
        let sql = Delete::new(rel.link.table().render(dialect))
            .filter(filter)
            .to_sql();
        ds.execute(&sql)?;
        self.invalidate();
        Ok(())
    }
}
