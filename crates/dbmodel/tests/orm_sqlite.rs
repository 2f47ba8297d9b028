use std::sync::Arc;

use chrono::NaiveDate;
use dbmodel::prelude::*;
use dbmodel::{Key, LocalCounter};
use dbmodel_sqlite::SqliteConnection;
use pretty_assertions::assert_eq;

// ============================================================================
// Fixtures
// ============================================================================

fn person_class() -> Arc<RecordClass> {
    RecordClass::builder("person")
        .field(Binding::text("firstname").not_null())
        .field(Binding::text("lastname").not_null())
        .field(Binding::integer("height"))
        .field(Binding::date("birthday"))
        .primary_key(&["firstname", "lastname"])
        .build()
        .expect("person class")
}

fn country_class() -> Arc<RecordClass> {
    RecordClass::builder("country")
        .field(Binding::serial("id"))
        .field(Binding::text("name"))
        .build()
        .expect("country class")
}

fn city_class() -> Arc<RecordClass> {
    RecordClass::builder("city")
        .field(Binding::serial("id"))
        .field(Binding::text("name"))
        .field(Binding::integer("country_id"))
        .build()
        .expect("city class")
}

fn author_class() -> Arc<RecordClass> {
    RecordClass::builder("author")
        .field(Binding::serial("id"))
        .field(Binding::text("name"))
        .build()
        .expect("author class")
}

fn tag_class() -> Arc<RecordClass> {
    RecordClass::builder("tag")
        .field(Binding::serial("id"))
        .field(Binding::text("label"))
        .build()
        .expect("tag class")
}

fn region_class() -> Arc<RecordClass> {
    RecordClass::builder("region")
        .field(Binding::serial("id"))
        .property_group(PropertyGroup::new("name", SqlType::Text, &["de", "en"]).with_default("en"))
        .build()
        .expect("region class")
}

const DDL: &[&str] = &[
    "CREATE TABLE person (firstname TEXT NOT NULL, lastname TEXT NOT NULL, height INTEGER, \
     birthday DATE, PRIMARY KEY (firstname, lastname))",
    "CREATE TABLE country (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE city (id INTEGER PRIMARY KEY, name TEXT, country_id INTEGER)",
    "CREATE TABLE author (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE tag (id INTEGER PRIMARY KEY, label TEXT)",
    "CREATE TABLE author_tag (author_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
    "CREATE TABLE region (id INTEGER PRIMARY KEY, name_de TEXT, name_en TEXT)",
];

fn open() -> DataSource {
    let config = DataSourceConfig::parse("adapter=sqlite db=:memory:").expect("config");
    let conn = SqliteConnection::from_config(&config).expect("open sqlite memory db");
    let mut ds = DataSource::with_config(conn, config);
    for ddl in DDL {
        ds.execute(ddl).expect("execute ddl");
    }
    ds.commit().expect("commit ddl");
    ds.sql_log_mut().clear();
    ds
}

fn diedrich(class: &Arc<RecordClass>) -> Record {
    Record::with_values(
        class,
        [
            ("firstname", "Diedrich".into()),
            ("lastname", "Vorberg".into()),
            ("height", 186.into()),
            ("birthday", Value::Date(NaiveDate::from_ymd_opt(1978, 5, 11).expect("date"))),
        ],
    )
    .expect("diedrich")
}

fn named(class: &Arc<RecordClass>, attribute: &str, name: &str) -> Record {
    Record::with_values(class, [(attribute, name.into())]).expect("record")
}

// ============================================================================
// Attribute binding and keys
// ============================================================================

#[test]
fn set_then_get_marks_dirty_once() {
    let class = person_class();
    let mut record = Record::new(&class);
    assert!(matches!(record.get("height"), Err(Error::AttributeUnset { .. })));

    record.set("height", 186).expect("set height");
    record.set("height", 187).expect("set height again");
    assert_eq!(record.get("height").expect("height"), &Value::Int(187));
    assert_eq!(record.dirty_bindings().count(), 1);

    assert!(record.set("height", "tall").is_err());
    assert_eq!(record.get("height").expect("height"), &Value::Int(187));
}

#[test]
fn key_where_follows_declaration_order() {
    let class = person_class();
    let mut record = Record::new(&class);
    record.set("lastname", "Vorberg").expect("lastname");
    let key = Key::primary(&record).expect("key");
    assert!(!key.is_set());

    record.set("firstname", "Diedrich").expect("firstname");
    let key = Key::primary(&record).expect("key");
    assert!(key.is_set());
    assert_eq!(
        key.where_clause(Dialect::Sqlite).expect("where").expression(),
        "firstname = 'Diedrich' AND lastname = 'Vorberg'"
    );
}

#[test]
fn key_equality_compares_table_and_values() {
    let country = country_class();
    let tag = tag_class();
    let a = Record::with_values(&country, [("id", Value::Int(1))]).expect("a");
    let b = Record::with_values(&country, [("id", Value::Int(1))]).expect("b");
    let c = Record::with_values(&tag, [("id", Value::Int(1))]).expect("c");

    let (a, b, c) = (
        Key::primary(&a).expect("key a"),
        Key::primary(&b).expect("key b"),
        Key::primary(&c).expect("key c"),
    );
    assert!(a.equals(&b).expect("equals"));
    assert!(!a.equals(&c).expect("equals"));
    assert!(a.values_equal(&c).expect("values_equal"));
}

// ============================================================================
// Record lifecycle
// ============================================================================

#[test]
fn insert_then_select_by_primary_key_round_trips() {
    let class = person_class();
    let mut ds = open();
    let mut original = diedrich(&class);
    ds.insert(&mut original).expect("insert");

    let loaded = ds
        .select_by_primary_key(&class, &["Diedrich".into(), "Vorberg".into()])
        .expect("select_by_primary_key");
    for binding in class.bindings() {
        assert_eq!(
            loaded.get(binding.name()).expect("loaded value"),
            original.get(binding.name()).expect("original value"),
            "{}",
            binding.name()
        );
    }
    assert!(!loaded.is_dirty());
}

#[test]
fn composite_key_update_touches_only_dirty_columns() {
    let class = person_class();
    let mut ds = open();
    let mut record = diedrich(&class);
    ds.insert(&mut record).expect("insert");
    let before = ds.sql_log().len();

    record.set("height", 187).expect("set height");
    assert_eq!(ds.flush_updates([&mut record]).expect("flush"), 1);
    let issued: Vec<&str> = ds.sql_log().since(before).collect();
    assert_eq!(
        issued,
        vec!["UPDATE person SET height = 187 WHERE firstname = 'Diedrich' AND lastname = 'Vorberg'"]
    );

    let reloaded = ds
        .select_by_primary_key(&class, &["Diedrich".into(), "Vorberg".into()])
        .expect("reload");
    assert_eq!(reloaded.get("height").expect("height"), &Value::Int(187));
}

#[test]
fn second_flush_issues_no_update() {
    let class = person_class();
    let mut ds = open();
    let mut record = diedrich(&class);
    ds.insert(&mut record).expect("insert");
    record.set("height", 190).expect("set height");
    ds.flush_updates([&mut record]).expect("first flush");

    let before = ds.sql_log().len();
    assert_eq!(ds.flush_updates([&mut record]).expect("second flush"), 0);
    assert_eq!(ds.sql_log().len(), before);
}

#[test]
fn assigned_identities_increase_without_max_query() {
    let class = author_class();
    let config = DataSourceConfig::parse("adapter=sqlite").expect("config");
    let conn = SqliteConnection::from_config(&config).expect("open");
    let mut ds =
        DataSource::with_config(conn, config).with_identity_strategy(LocalCounter::starting_at(100));
    ds.execute(DDL[3]).expect("ddl");

    let mut first = named(&class, "name", "first");
    let mut second = named(&class, "name", "second");
    ds.insert(&mut first).expect("insert first");
    ds.insert(&mut second).expect("insert second");

    let first_id = first.get("id").expect("id").as_i64().expect("int id");
    let second_id = second.get("id").expect("id").as_i64().expect("int id");
    assert!(second_id > first_id);
    assert!(ds.sql_log().iter().all(|sql| !sql.contains("MAX(")));
    assert_eq!(ds.count(&class, &[]).expect("count"), 2);
}

// ============================================================================
// Relationships
// ============================================================================

#[test]
fn many_to_one_wrong_class_fails_before_sql() {
    let city = city_class();
    let country = country_class();
    let tag = tag_class();
    let rel = ManyToOne::builder("country", &city, &country).build().expect("relationship");
    let ds = open();

    let mut berlin = named(&city, "name", "Berlin");
    let label = named(&tag, "label", "capital");
    let logged = ds.sql_log().len();
    let err = rel.set(&mut berlin, Some(&label)).expect_err("wrong class");
    assert!(matches!(err, Error::WrongClass { .. }));
    assert_eq!(ds.sql_log().len(), logged);
    assert!(!berlin.is_set("country_id"));
}

#[test]
fn many_to_one_resolves_target() {
    let city = city_class();
    let country = country_class();
    let rel = ManyToOne::builder("country", &city, &country).build().expect("relationship");
    let mut ds = open();

    let mut germany = named(&country, "name", "Germany");
    ds.insert(&mut germany).expect("insert germany");
    let mut berlin = named(&city, "name", "Berlin");
    assert!(rel.get(&mut ds, &mut berlin).expect("unset fk").is_none());

    rel.set(&mut berlin, Some(&germany)).expect("set country");
    ds.insert(&mut berlin).expect("insert berlin");

    let resolved = rel.get(&mut ds, &mut berlin).expect("get").expect("country");
    assert_eq!(resolved.get("name").expect("name"), &Value::Text("Germany".into()));
    let logged = ds.sql_log().len();
    rel.get(&mut ds, &mut berlin).expect("cached get");
    assert_eq!(ds.sql_log().len(), logged);
}

#[test]
fn one_to_many_append_and_count() {
    let city = city_class();
    let country = country_class();
    let rel = OneToMany::builder("cities", &country, &city).build().expect("relationship");
    let mut ds = open();

    let mut germany = named(&country, "name", "Germany");
    ds.insert(&mut germany).expect("insert germany");
    let mut view = rel.of(&mut germany).expect("view");
    assert_eq!(view.len(&mut ds, &[]).expect("len"), 0);

    let mut hamburg = named(&city, "name", "Hamburg");
    view.append(&mut ds, &mut hamburg).expect("append");
    assert!(hamburg.is_stored());
    assert_eq!(view.len(&mut ds, &[]).expect("len"), 1);
    let cities = view.load(&mut ds).expect("load");
    assert_eq!(cities[0].get("name").expect("name"), &Value::Text("Hamburg".into()));
}

#[test]
fn many_to_many_append_unlink_restores_count() {
    let author = author_class();
    let tag = tag_class();
    let tags = ManyToMany::builder("tags", &author, &tag).build().expect("relationship");
    let authors = tags.reverse("authors");
    let mut ds = open();

    let mut diedrich = named(&author, "name", "Diedrich");
    ds.insert(&mut diedrich).expect("insert author");
    let mut rust = named(&tag, "label", "rust");
    let link_rows = |ds: &mut DataSource| {
        ds.query_one("SELECT COUNT(*) FROM author_tag")
            .expect("count links")
            .and_then(|row| row.get(0).and_then(Value::as_i64))
            .expect("count value")
    };
    let before = link_rows(&mut ds);

    let mut view = tags.of(&mut diedrich).expect("view");
    let len_before = view.len(&mut ds, &[]).expect("len");
    assert!(view.append(&mut ds, &mut rust).expect("append"));
    assert_eq!(view.len(&mut ds, &[]).expect("len"), len_before + 1);
    assert!(!view.append(&mut ds, &mut rust).expect("second append"));
    assert_eq!(link_rows(&mut ds), before + 1);

    let mut rust_view_owner = rust.clone();
    assert_eq!(
        authors.of(&mut rust_view_owner).expect("reverse view").len(&mut ds, &[]).expect("len"),
        1
    );

    view.unlink(&mut ds, &rust).expect("unlink");
    assert_eq!(link_rows(&mut ds), before);
    assert_eq!(view.len(&mut ds, &[]).expect("len"), len_before);
}

#[test]
fn schema_looks_up_declared_relationships() {
    let author = author_class();
    let tag = tag_class();
    let tags = ManyToMany::builder("tags", &author, &tag).build().expect("relationship");
    let mut schema = Schema::new();
    schema.add_relationship(tags.reverse("authors")).expect("reverse");
    schema.add_relationship(tags).expect("tags");

    let mut ds = open();
    let mut writer = named(&author, "name", "Writer");
    ds.insert(&mut writer).expect("insert");
    let tags = schema
        .relationship(&author, "tags")
        .expect("lookup")
        .as_many_to_many()
        .expect("many-to-many");
    let mut label = named(&tag, "label", "prose");
    tags.of(&mut writer).expect("view").append(&mut ds, &mut label).expect("append");
    assert_eq!(ds.count(&tag, &[]).expect("count"), 1);
}

#[test]
fn many_to_many_all_reports_linked_keys() {
    let author = author_class();
    let tag = tag_class();
    let tags = ManyToMany::builder("tags", &author, &tag).build().expect("relationship");
    let mut ds = open();

    let mut diedrich = named(&author, "name", "Diedrich");
    ds.insert(&mut diedrich).expect("insert author");
    let mut rust = named(&tag, "label", "rust");
    let mut sql = named(&tag, "label", "sql");
    ds.insert(&mut sql).expect("insert sql");
    tags.of(&mut diedrich).expect("view").append(&mut ds, &mut rust).expect("append");

    let (targets, linked) = tags.of(&mut diedrich).expect("view").all(&mut ds, &[]).expect("all");
    assert_eq!(targets.all().expect("targets").len(), 2);
    assert_eq!(linked, vec![vec![rust.get("id").expect("id").clone()]]);

    let mut replacement = vec![sql.clone(), named(&tag, "label", "prose")];
    tags.of(&mut diedrich)
        .expect("view")
        .set_all(&mut ds, &mut replacement)
        .expect("set_all");
    let (targets, linked) = tags.of(&mut diedrich).expect("view").all(&mut ds, &[]).expect("all");
    assert_eq!(targets.all().expect("targets").len(), 3);
    assert_eq!(linked.len(), 2);
    assert!(!linked.contains(&vec![rust.get("id").expect("id").clone()]));
}

// ============================================================================
// Property groups
// ============================================================================

#[test]
fn property_group_updates_one_language() {
    let region = region_class();
    let mut ds = open();

    let mut bavaria = Record::with_values(
        &region,
        [("name_de", Value::from("Bayern")), ("name_en", "Bavaria".into())],
    )
    .expect("bavaria");
    ds.insert(&mut bavaria).expect("insert");
    let name = region.property_group("name").expect("group");

    name.set(&mut bavaria, "de", "Freistaat Bayern").expect("set de");
    assert_eq!(ds.flush_updates([&mut bavaria]).expect("flush"), 1);
    assert_eq!(
        ds.sql_log().last(),
        Some("UPDATE region SET name_de = 'Freistaat Bayern' WHERE id = 1")
    );

    let loaded = ds.select_by_primary_key(&region, &[Value::Int(1)]).expect("reload");
    assert_eq!(name.get(&loaded, "de").expect("de"), &Value::Text("Freistaat Bayern".into()));
    assert_eq!(name.get_default(&loaded).expect("en"), &Value::Text("Bavaria".into()));
}
