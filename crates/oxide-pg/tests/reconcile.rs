//! Integration tests for table reconciliation against a live catalog.
//!
//! Each test runs `Connection::ensure_table_with` over the in-memory
//! engine from `common`, which applies the generated DDL to its own
//! catalog so repeated runs observe the result of earlier ones.

mod common;

use common::{FakeEngine, connection, pruning_connection};
use oxide_pg::{Error, FieldDescriptor, IndexSpec, SchemaPlan};

fn article_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("id", "String"),
        FieldDescriptor::new("title", "String").required(),
        FieldDescriptor::new("score", "f64").alias("DataDec"),
        FieldDescriptor::new("tags", "Vec<String>"),
        FieldDescriptor::new("note", "Option<String>"),
    ]
}

// =============================================================================
// Create and converge
// =============================================================================

#[tokio::test]
async fn test_create_then_second_run_is_noop() {
    let mut conn = connection(FakeEngine::new());

    let plan = conn
        .ensure_table_with("articles", &["id"], &article_fields())
        .await
        .unwrap();
    assert!(matches!(plan, SchemaPlan::Create(_)));
    assert_eq!(
        conn.inner().column_names("articles"),
        vec!["id", "title", "datadec", "tags", "note"]
    );
    assert!(!conn.inner().column("articles", "title").unwrap().nullable);
    assert!(conn.inner().column("articles", "note").unwrap().nullable);

    let plan = conn
        .ensure_table_with("articles", &["id"], &article_fields())
        .await
        .unwrap();
    assert!(plan.is_unchanged());
    assert_eq!(conn.inner().ddl().len(), 1);
}

#[tokio::test]
async fn test_create_statement_text() {
    let mut conn = connection(FakeEngine::new());
    let fields = vec![
        FieldDescriptor::new("id", "i64"),
        FieldDescriptor::new("active", "bool"),
        FieldDescriptor::new("seen", "Option<DateTime<Utc>>"),
    ];
    conn.ensure_table_with("visits", &["id"], &fields)
        .await
        .unwrap();
    assert_eq!(
        conn.inner().ddl(),
        vec![
            "CREATE TABLE visits (id bigint PRIMARY KEY, active boolean NOT NULL DEFAULT 'F', \
             seen timestamptz)"
        ]
    );
}

#[tokio::test]
async fn test_type_change_is_altered_once() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false), ("age", "integer", true)]);
    let mut conn = connection(engine);
    let fields = vec![FieldDescriptor::new("id", "String"), FieldDescriptor::new("age", "i64")];

    conn.ensure_table_with("people", &["id"], &fields)
        .await
        .unwrap();
    assert_eq!(
        conn.inner().ddl(),
        vec!["ALTER TABLE people ALTER COLUMN age TYPE bigint"]
    );
    assert_eq!(conn.inner().column("people", "age").unwrap().udt, "int8");

    let plan = conn
        .ensure_table_with("people", &["id"], &fields)
        .await
        .unwrap();
    assert!(plan.is_unchanged());
    assert_eq!(conn.inner().ddl().len(), 1);
}

#[tokio::test]
async fn test_new_field_is_added() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false)]);
    let mut conn = connection(engine);
    let fields = vec![
        FieldDescriptor::new("id", "String"),
        FieldDescriptor::new("age", "i64"),
        FieldDescriptor::new("nickname", "Option<String>"),
    ];

    conn.ensure_table_with("people", &["id"], &fields)
        .await
        .unwrap();
    assert_eq!(
        conn.inner().ddl(),
        vec![
            "ALTER TABLE people ADD COLUMN age bigint NOT NULL DEFAULT 0, \
             ADD COLUMN nickname text"
        ]
    );
    assert_eq!(conn.inner().column_names("people"), vec!["id", "age", "nickname"]);
}

#[tokio::test]
async fn test_catalog_comparison_ignores_case() {
    let engine = FakeEngine::new().with_table(
        "Articles",
        &[
            ("ID", "text", false),
            ("Title", "text", false),
            ("DATADEC", "numeric(64,8)", false),
            ("tags", "jsonb", false),
            ("note", "text", true),
        ],
    );
    let mut conn = connection(engine);
    let plan = conn
        .ensure_table_with("articles", &["id"], &article_fields())
        .await
        .unwrap();
    assert!(plan.is_unchanged());
    assert!(conn.inner().executed.is_empty());
}

// =============================================================================
// Orphan columns
// =============================================================================

#[tokio::test]
async fn test_orphan_column_is_kept_by_default() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false), ("legacy", "text", true)]);
    let mut conn = connection(engine);
    let plan = conn
        .ensure_table_with("people", &["id"], &[FieldDescriptor::new("id", "String")])
        .await
        .unwrap();
    assert!(plan.is_unchanged());
    assert_eq!(conn.inner().column_names("people"), vec!["id", "legacy"]);
}

#[tokio::test]
async fn test_orphan_column_is_dropped_when_pruning() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false), ("legacy", "text", true)]);
    let mut conn = pruning_connection(engine);
    conn.ensure_table_with("people", &["id"], &[FieldDescriptor::new("id", "String")])
        .await
        .unwrap();
    assert_eq!(conn.inner().ddl(), vec!["ALTER TABLE people DROP COLUMN legacy"]);
    assert_eq!(conn.inner().column_names("people"), vec!["id"]);
}

#[tokio::test]
async fn test_mixed_case_orphan_is_dropped_by_exact_name() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false), ("DataDec", "numeric", true)]);
    let mut conn = pruning_connection(engine);
    conn.ensure_table_with("people", &["id"], &[FieldDescriptor::new("id", "String")])
        .await
        .unwrap();
    assert_eq!(conn.inner().ddl(), vec!["ALTER TABLE people DROP COLUMN \"DataDec\""]);
    assert_eq!(conn.inner().column_names("people"), vec!["id"]);
}

#[tokio::test]
async fn test_composite_key_then_second_run_is_noop() {
    let mut conn = connection(FakeEngine::new());
    let fields = vec![
        FieldDescriptor::new("tenant", "String"),
        FieldDescriptor::new("id", "i64"),
        FieldDescriptor::new("name", "Option<String>"),
    ];
    conn.ensure_table_with("accounts", &["tenant", "id"], &fields)
        .await
        .unwrap();
    assert_eq!(
        conn.inner().ddl(),
        vec!["CREATE TABLE accounts (tenant text, id bigint, name text, PRIMARY KEY (tenant, id))"]
    );
    assert_eq!(conn.inner().column_names("accounts"), vec!["tenant", "id", "name"]);
    assert!(!conn.inner().column("accounts", "tenant").unwrap().nullable);

    let plan = conn
        .ensure_table_with("accounts", &["tenant", "id"], &fields)
        .await
        .unwrap();
    assert!(plan.is_unchanged());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_unmapped_type_issues_no_ddl() {
    let mut conn = connection(FakeEngine::new());
    let fields = vec![
        FieldDescriptor::new("id", "String"),
        FieldDescriptor::new("owner", "Person"),
    ];
    let err = conn
        .ensure_table_with("pets", &["id"], &fields)
        .await
        .unwrap_err();
    match err {
        Error::StructuralType { field, rust_type } => {
            assert_eq!(field, "owner");
            assert_eq!(rust_type, "Person");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(conn.inner().executed.is_empty());
    assert!(!conn.inner().tables.contains_key("pets"));
}

#[tokio::test]
async fn test_duplicate_column_issues_no_ddl() {
    let mut conn = connection(FakeEngine::new());
    let fields = vec![
        FieldDescriptor::new("id", "String"),
        FieldDescriptor::new("other", "String").alias("ID"),
    ];
    let err = conn
        .ensure_table_with("pets", &["id"], &fields)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateColumn { .. }));
    assert!(conn.inner().executed.is_empty());
}

#[tokio::test]
async fn test_introspection_failure_issues_no_ddl() {
    let mut engine = FakeEngine::new();
    engine.fail_queries = true;
    let mut conn = connection(engine);
    let err = conn
        .ensure_table_with("articles", &["id"], &article_fields())
        .await
        .unwrap_err();
    match &err {
        Error::SchemaIntrospection { table, source } => {
            assert_eq!(table, "articles");
            assert!(matches!(**source, Error::Database(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(conn.inner().executed.is_empty());
}

#[tokio::test]
async fn test_ddl_failure_reports_statement() {
    let mut engine = FakeEngine::new();
    engine.fail_on = Some("CREATE TABLE".to_string());
    let mut conn = connection(engine);
    let err = conn
        .ensure_table_with("articles", &["id"], &article_fields())
        .await
        .unwrap_err();
    let statement = err.statement().unwrap();
    assert!(statement.starts_with("CREATE TABLE articles ("));
    assert!(err.to_string().ends_with(&format!("SQL Command: {statement}")));
    assert!(!conn.inner().tables.contains_key("articles"));
}

// =============================================================================
// Indexes and table management
// =============================================================================

#[tokio::test]
async fn test_ensure_index_drops_then_creates() {
    let mut conn = connection(FakeEngine::new());
    let index = IndexSpec::new("by_score", &["-score", "meta.author.name"]).unique();
    conn.ensure_index("articles", &index).await.unwrap();
    assert_eq!(
        conn.inner().executed,
        vec![
            "DROP INDEX IF EXISTS idx_articles_by_score",
            "CREATE UNIQUE INDEX idx_articles_by_score ON articles \
             (score DESC, (meta->'author'->>'name'))",
        ]
    );
}

#[tokio::test]
async fn test_index_failure_stops_remaining_statements() {
    let mut engine = FakeEngine::new();
    engine.fail_on = Some("DROP INDEX".to_string());
    let mut conn = connection(engine);
    let err = conn
        .ensure_index("articles", &IndexSpec::new("title", &["title"]))
        .await
        .unwrap_err();
    assert_eq!(err.statement(), Some("DROP INDEX IF EXISTS idx_articles_title"));
    assert_eq!(conn.inner().executed.len(), 1);
}

#[tokio::test]
async fn test_index_without_fields_is_rejected() {
    let mut conn = connection(FakeEngine::new());
    let err = conn
        .ensure_index("articles", &IndexSpec::new("empty", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandShape(_)));
    assert!(conn.inner().executed.is_empty());
}

#[tokio::test]
async fn test_has_table_and_drop_table() {
    let engine = FakeEngine::new().with_table("people", &[("id", "text", false)]);
    let mut conn = connection(engine);
    assert!(conn.has_table("people").await.unwrap());
    assert!(conn.has_table("PEOPLE").await.unwrap());
    assert!(!conn.has_table("pets").await.unwrap());

    conn.drop_table("people").await.unwrap();
    assert!(!conn.has_table("people").await.unwrap());

    let plan = conn
        .ensure_table_with("people", &["id"], &[FieldDescriptor::new("id", "String")])
        .await
        .unwrap();
    assert_eq!(
        plan,
        SchemaPlan::Create("CREATE TABLE people (id text PRIMARY KEY)".to_string())
    );
}
