//! Catalog introspection
//!
//! This module reads the metadata of a single table out of the database
//! catalog and turns it into a [`TableSnapshot`].

use async_trait::async_trait;
use sqlx::{FromRow, MySql, Pool, Postgres, Row, Sqlite};
use std::collections::BTreeMap;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{
    ColumnDescriptor, ConstraintDescriptor, Dialect, ForeignKeyDescriptor, IndexDescriptor,
    ReferenceDescriptor, TableRef, TableSnapshot, TriggerDescriptor,
};
use crate::utils::naming::quote_identifier;

/// Source of table metadata
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Describe one table as it currently exists in the database
    async fn introspect(&self, table: &TableRef) -> Result<TableSnapshot>;
}

/// Catalog backed by a live database connection
pub struct SchemaAnalyzer {
    connection: DatabaseConnection,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Rendering path of the underlying database
    pub fn dialect(&self) -> Dialect {
        self.connection.dialect()
    }
}

#[async_trait]
impl Catalog for SchemaAnalyzer {
    async fn introspect(&self, table: &TableRef) -> Result<TableSnapshot> {
        tracing::debug!(table = %table, "Introspecting table");

        let snapshot = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let analyzer = PostgresAnalyzer { pool };
                analyzer.introspect(table).await?
            }
            DatabaseConnection::MySql(pool) => {
                let analyzer = MySqlAnalyzer { pool };
                analyzer.introspect(table).await?
            }
            DatabaseConnection::Sqlite(pool) => {
                let analyzer = SqliteAnalyzer { pool };
                analyzer.introspect(table).await?
            }
        };

        tracing::debug!(table = %table, columns = snapshot.columns.len(), "Introspected table");
        Ok(snapshot)
    }
}

fn missing_relation(table: &TableRef) -> Error {
    Error::IntrospectionError(format!("relation {} has no columns or does not exist", table))
}

// Row types for PostgreSQL queries
#[derive(FromRow)]
struct PgColumnRow {
    name: String,
    db_type: String,
    not_null: bool,
    default_expr: Option<String>,
    identity: String,
    comment: Option<String>,
    primary_key: bool,
}

#[derive(FromRow)]
struct PgIndexRow {
    name: String,
    is_primary: bool,
    is_unique: bool,
    definition: String,
    columns: Vec<String>,
}

#[derive(FromRow)]
struct PgDefinitionRow {
    name: String,
    definition: String,
}

#[derive(FromRow)]
struct PgForeignKeyRow {
    name: String,
    definition: String,
    table_name: String,
    ref_table: String,
    columns: Vec<String>,
    ref_columns: Vec<String>,
}

impl From<PgForeignKeyRow> for ForeignKeyDescriptor {
    fn from(row: PgForeignKeyRow) -> Self {
        ForeignKeyDescriptor {
            name: Some(row.name),
            definition: Some(row.definition),
            columns: row.columns,
            ref_table: row.ref_table,
            ref_columns: Some(row.ref_columns),
        }
    }
}

/// PostgreSQL catalog, queried the way psql's `\d` does
struct PostgresAnalyzer<'a> {
    pool: &'a Pool<Postgres>,
}

impl<'a> PostgresAnalyzer<'a> {
    async fn resolve_oid(&self, table: &TableRef) -> Result<i64> {
        let qualified = match &table.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&table.name)),
            None => quote_identifier(&table.name),
        };

        let oid: Option<i64> =
            sqlx::query_scalar("SELECT pg_catalog.to_regclass($1)::oid::int8")
                .bind(&qualified)
                .fetch_one(self.pool)
                .await?;

        oid.ok_or_else(|| missing_relation(table))
    }

    async fn server_version(&self) -> Result<u32> {
        let version: i32 =
            sqlx::query_scalar("SELECT pg_catalog.current_setting('server_version_num')::int4")
                .fetch_one(self.pool)
                .await?;
        Ok(version.max(0) as u32)
    }

    async fn columns(&self, oid: i64, server_version: u32) -> Result<Vec<PgColumnRow>> {
        // attidentity appeared in PostgreSQL 10
        let identity = if server_version >= 100_000 {
            "a.attidentity::text"
        } else {
            "''::text"
        };

        let sql = format!(
            r#"
            SELECT
                a.attname::text AS name,
                pg_catalog.format_type(a.atttypid, a.atttypmod) AS db_type,
                a.attnotnull AS not_null,
                pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expr,
                {identity} AS identity,
                pg_catalog.col_description(a.attrelid, a.attnum) AS comment,
                COALESCE(i.indisprimary, false) AS primary_key
            FROM pg_catalog.pg_attribute a
            LEFT JOIN pg_catalog.pg_attrdef d
                ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            LEFT JOIN pg_catalog.pg_index i
                ON i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey)
            WHERE a.attrelid = $1::oid AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
            "#,
            identity = identity
        );

        Ok(sqlx::query_as::<_, PgColumnRow>(&sql)
            .bind(oid)
            .fetch_all(self.pool)
            .await?)
    }

    async fn primary_key(&self, oid: i64) -> Result<Vec<String>> {
        let sql = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_index i
            CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
            JOIN pg_catalog.pg_attribute a
                ON a.attrelid = i.indrelid AND a.attnum = k.attnum
            WHERE i.indrelid = $1::oid AND i.indisprimary
            ORDER BY k.ord
        "#;

        Ok(sqlx::query_scalar(sql).bind(oid).fetch_all(self.pool).await?)
    }

    async fn indexes(&self, oid: i64) -> Result<Vec<IndexDescriptor>> {
        let sql = r#"
            SELECT
                c2.relname::text AS name,
                i.indisprimary AS is_primary,
                i.indisunique AS is_unique,
                pg_catalog.pg_get_indexdef(i.indexrelid, 0, true) AS definition,
                ARRAY(
                    SELECT pg_catalog.pg_get_indexdef(i.indexrelid, k, true)
                    FROM generate_series(1, i.indnatts) AS k
                    ORDER BY k
                ) AS columns
            FROM pg_catalog.pg_index i
            JOIN pg_catalog.pg_class c2 ON c2.oid = i.indexrelid
            WHERE i.indrelid = $1::oid AND i.indisvalid
            ORDER BY i.indisprimary DESC, i.indisunique DESC, c2.relname
        "#;

        let rows = sqlx::query_as::<_, PgIndexRow>(sql)
            .bind(oid)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| IndexDescriptor {
                name: row.name,
                columns: row.columns,
                is_unique: row.is_unique,
                is_primary: row.is_primary,
                definition: Some(row.definition),
            })
            .collect())
    }

    async fn check_constraints(&self, oid: i64) -> Result<Vec<ConstraintDescriptor>> {
        let sql = r#"
            SELECT r.conname::text AS name, pg_catalog.pg_get_constraintdef(r.oid, true) AS definition
            FROM pg_catalog.pg_constraint r
            WHERE r.conrelid = $1::oid AND r.contype = 'c'
            ORDER BY 1
        "#;

        let rows = sqlx::query_as::<_, PgDefinitionRow>(sql)
            .bind(oid)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ConstraintDescriptor {
                name: row.name,
                definition: row.definition,
            })
            .collect())
    }

    /// Foreign keys held by the table, or pointing at it when `referencing` is set
    async fn foreign_keys(&self, oid: i64, referencing: bool) -> Result<Vec<PgForeignKeyRow>> {
        let side = if referencing { "confrelid" } else { "conrelid" };
        let sql = format!(
            r#"
            SELECT
                r.conname::text AS name,
                pg_catalog.pg_get_constraintdef(r.oid, true) AS definition,
                r.conrelid::pg_catalog.regclass::text AS table_name,
                r.confrelid::pg_catalog.regclass::text AS ref_table,
                ARRAY(
                    SELECT a.attname::text
                    FROM unnest(r.conkey) WITH ORDINALITY AS k(attnum, ord)
                    JOIN pg_catalog.pg_attribute a
                        ON a.attrelid = r.conrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS columns,
                ARRAY(
                    SELECT a.attname::text
                    FROM unnest(r.confkey) WITH ORDINALITY AS k(attnum, ord)
                    JOIN pg_catalog.pg_attribute a
                        ON a.attrelid = r.confrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS ref_columns
            FROM pg_catalog.pg_constraint r
            WHERE r.{side} = $1::oid AND r.contype = 'f'
            ORDER BY 3, 1
            "#,
            side = side
        );

        Ok(sqlx::query_as::<_, PgForeignKeyRow>(&sql)
            .bind(oid)
            .fetch_all(self.pool)
            .await?)
    }

    async fn triggers(&self, oid: i64) -> Result<Vec<TriggerDescriptor>> {
        let sql = r#"
            SELECT t.tgname::text AS name, pg_catalog.pg_get_triggerdef(t.oid, true) AS definition
            FROM pg_catalog.pg_trigger t
            WHERE t.tgrelid = $1::oid
                AND (NOT t.tgisinternal OR (t.tgisinternal AND t.tgenabled = 'D'))
            ORDER BY 1
        "#;

        let rows = sqlx::query_as::<_, PgDefinitionRow>(sql)
            .bind(oid)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TriggerDescriptor {
                name: row.name,
                definition: row.definition,
            })
            .collect())
    }
}

#[async_trait]
impl<'a> Catalog for PostgresAnalyzer<'a> {
    async fn introspect(&self, table: &TableRef) -> Result<TableSnapshot> {
        let oid = self.resolve_oid(table).await?;
        let server_version = self.server_version().await?;

        let mut snapshot = TableSnapshot::new(&table.to_string(), Dialect::Postgres);
        snapshot.server_version = Some(server_version);

        snapshot.table.comment =
            sqlx::query_scalar("SELECT pg_catalog.obj_description($1::oid, 'pg_class')")
                .bind(oid)
                .fetch_one(self.pool)
                .await?;

        for row in self.columns(oid, server_version).await? {
            let auto_increment = matches!(row.identity.as_str(), "a" | "d")
                || row
                    .default_expr
                    .as_deref()
                    .map_or(false, |d| d.starts_with("nextval("));

            snapshot.add_column(ColumnDescriptor {
                name: row.name,
                db_type: row.db_type,
                nullable: !row.not_null,
                default: row.default_expr,
                primary_key: row.primary_key,
                auto_increment,
                comment: row.comment,
            });
        }

        if snapshot.columns.is_empty() {
            return Err(missing_relation(table));
        }

        snapshot.table.primary_key = self.primary_key(oid).await?;
        snapshot.indexes = self.indexes(oid).await?;
        snapshot.check_constraints = self.check_constraints(oid).await?;
        snapshot.foreign_keys = self
            .foreign_keys(oid, false)
            .await?
            .into_iter()
            .map(ForeignKeyDescriptor::from)
            .collect();
        snapshot.referenced_by = self
            .foreign_keys(oid, true)
            .await?
            .into_iter()
            .map(|row| ReferenceDescriptor {
                referencing_table: row.table_name.clone(),
                foreign_key: row.into(),
            })
            .collect();
        snapshot.triggers = self.triggers(oid).await?;

        Ok(snapshot)
    }
}

// Row types for MySQL queries
#[derive(FromRow)]
struct MySqlColumnRow {
    name: String,
    db_type: String,
    is_nullable: String,
    column_default: Option<String>,
    extra: String,
    column_key: String,
    column_comment: String,
}

#[derive(FromRow)]
struct MySqlIndexRow {
    index_name: String,
    column_name: Option<String>,
    non_unique: i64,
}

#[derive(FromRow)]
struct MySqlForeignKeyRow {
    constraint_name: String,
    column_name: String,
    ref_table: String,
    ref_column: String,
}

/// MySQL catalog through information_schema
struct MySqlAnalyzer<'a> {
    pool: &'a Pool<MySql>,
}

impl<'a> MySqlAnalyzer<'a> {
    async fn schema_name(&self, table: &TableRef) -> Result<String> {
        if let Some(schema) = &table.schema {
            return Ok(schema.clone());
        }

        let current: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
            .fetch_one(self.pool)
            .await?;
        current.ok_or_else(|| {
            Error::IntrospectionError("no schema given and no database selected".to_string())
        })
    }
}

#[async_trait]
impl<'a> Catalog for MySqlAnalyzer<'a> {
    async fn introspect(&self, table: &TableRef) -> Result<TableSnapshot> {
        let schema = self.schema_name(table).await?;
        let mut snapshot = TableSnapshot::new(&table.to_string(), Dialect::Generic);

        // Columns
        let sql = r#"
            SELECT
                CAST(column_name AS CHAR) AS name,
                CAST(column_type AS CHAR) AS db_type,
                CAST(is_nullable AS CHAR) AS is_nullable,
                CAST(column_default AS CHAR) AS column_default,
                CAST(extra AS CHAR) AS extra,
                CAST(column_key AS CHAR) AS column_key,
                CAST(column_comment AS CHAR) AS column_comment
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query_as::<_, MySqlColumnRow>(sql)
            .bind(&schema)
            .bind(&table.name)
            .fetch_all(self.pool)
            .await?;

        if column_rows.is_empty() {
            return Err(missing_relation(table));
        }

        for col in column_rows {
            snapshot.add_column(ColumnDescriptor {
                name: col.name,
                db_type: col.db_type,
                nullable: col.is_nullable == "YES",
                default: col.column_default,
                primary_key: col.column_key == "PRI",
                auto_increment: col.extra.to_lowercase().contains("auto_increment"),
                comment: Some(col.column_comment).filter(|c| !c.is_empty()),
            });
        }

        // Primary key, in key order rather than column order
        let sql = r#"
            SELECT CAST(column_name AS CHAR)
            FROM information_schema.key_column_usage
            WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY'
            ORDER BY ordinal_position
        "#;

        snapshot.table.primary_key = sqlx::query_scalar(sql)
            .bind(&schema)
            .bind(&table.name)
            .fetch_all(self.pool)
            .await?;

        let sql = r#"
            SELECT CAST(table_comment AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = ? AND table_name = ?
        "#;

        let comment: Option<Option<String>> = sqlx::query_scalar(sql)
            .bind(&schema)
            .bind(&table.name)
            .fetch_optional(self.pool)
            .await?;
        snapshot.table.comment = comment.flatten().filter(|c| !c.is_empty());

        // Indexes
        let sql = r#"
            SELECT
                CAST(index_name AS CHAR) AS index_name,
                CAST(column_name AS CHAR) AS column_name,
                CAST(non_unique AS SIGNED) AS non_unique
            FROM information_schema.statistics
            WHERE table_schema = ? AND table_name = ? AND index_name <> 'PRIMARY'
            ORDER BY index_name, seq_in_index
        "#;

        let index_rows = sqlx::query_as::<_, MySqlIndexRow>(sql)
            .bind(&schema)
            .bind(&table.name)
            .fetch_all(self.pool)
            .await?;

        let mut indexes: BTreeMap<String, IndexDescriptor> = BTreeMap::new();
        for row in index_rows {
            let index = indexes
                .entry(row.index_name.clone())
                .or_insert_with(|| IndexDescriptor {
                    name: row.index_name,
                    columns: Vec::new(),
                    is_unique: row.non_unique == 0,
                    is_primary: false,
                    definition: None,
                });
            if let Some(column) = row.column_name {
                index.columns.push(column);
            }
        }
        snapshot.indexes = indexes.into_values().collect();

        // Foreign keys
        let sql = r#"
            SELECT
                CAST(constraint_name AS CHAR) AS constraint_name,
                CAST(column_name AS CHAR) AS column_name,
                CAST(referenced_table_name AS CHAR) AS ref_table,
                CAST(referenced_column_name AS CHAR) AS ref_column
            FROM information_schema.key_column_usage
            WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL
            ORDER BY constraint_name, ordinal_position
        "#;

        let fk_rows = sqlx::query_as::<_, MySqlForeignKeyRow>(sql)
            .bind(&schema)
            .bind(&table.name)
            .fetch_all(self.pool)
            .await?;

        let mut foreign_keys: BTreeMap<String, ForeignKeyDescriptor> = BTreeMap::new();
        for row in fk_rows {
            let fk = foreign_keys
                .entry(row.constraint_name.clone())
                .or_insert_with(|| ForeignKeyDescriptor {
                    name: Some(row.constraint_name),
                    definition: None,
                    columns: Vec::new(),
                    ref_table: row.ref_table,
                    ref_columns: Some(Vec::new()),
                });
            fk.columns.push(row.column_name);
            if let Some(ref_columns) = fk.ref_columns.as_mut() {
                ref_columns.push(row.ref_column);
            }
        }
        snapshot.foreign_keys = foreign_keys.into_values().collect();

        Ok(snapshot)
    }
}

/// SQLite catalog through the table pragmas
struct SqliteAnalyzer<'a> {
    pool: &'a Pool<Sqlite>,
}

impl<'a> SqliteAnalyzer<'a> {
    fn pragma(table: &TableRef, name: &str, argument: &str) -> String {
        let schema = table
            .schema
            .as_deref()
            .map(|s| format!("{}.", quote_identifier(s)))
            .unwrap_or_default();
        format!("PRAGMA {}{}({})", schema, name, quote_identifier(argument))
    }
}

#[async_trait]
impl<'a> Catalog for SqliteAnalyzer<'a> {
    async fn introspect(&self, table: &TableRef) -> Result<TableSnapshot> {
        let mut snapshot = TableSnapshot::new(&table.to_string(), Dialect::Generic);

        let pragma = Self::pragma(table, "table_info", &table.name);
        let columns = sqlx::query(&pragma).fetch_all(self.pool).await?;

        if columns.is_empty() {
            return Err(missing_relation(table));
        }

        let mut key_positions: Vec<(i64, String)> = Vec::new();
        let mut descriptors = Vec::with_capacity(columns.len());
        for col in &columns {
            let name: String = col.try_get("name")?;
            let data_type: String = col.try_get("type")?;
            let notnull: i64 = col.try_get("notnull")?;
            let dflt_value: Option<String> = col.try_get("dflt_value")?;
            let pk: i64 = col.try_get("pk")?;

            if pk > 0 {
                key_positions.push((pk, name.clone()));
            }

            let mut column = ColumnDescriptor::new(&name, &data_type);
            column.nullable = notnull == 0;
            column.default = dflt_value;
            column.primary_key = pk > 0;
            descriptors.push(column);
        }

        // an INTEGER PRIMARY KEY is an alias for the rowid
        let single_key = key_positions.len() == 1;
        for mut column in descriptors {
            column.auto_increment =
                single_key && column.primary_key && column.db_type.eq_ignore_ascii_case("integer");
            snapshot.add_column(column);
        }

        key_positions.sort();
        snapshot.table.primary_key = key_positions.into_iter().map(|(_, name)| name).collect();

        // Indexes
        let pragma = Self::pragma(table, "index_list", &table.name);
        let index_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

        for row in index_rows {
            let name: String = row.try_get("name")?;
            let unique: i64 = row.try_get("unique")?;
            let origin: Option<String> = row.try_get("origin").ok();

            if origin.as_deref() == Some("pk") {
                continue;
            }

            let pragma = Self::pragma(table, "index_info", &name);
            let column_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;
            let mut columns = Vec::with_capacity(column_rows.len());
            for column in column_rows {
                let column_name: Option<String> = column.try_get("name")?;
                columns.push(column_name.unwrap_or_else(|| "<expression>".to_string()));
            }

            snapshot.indexes.push(IndexDescriptor {
                name,
                columns,
                is_unique: unique != 0,
                is_primary: false,
                definition: None,
            });
        }

        // Foreign keys, one row per column grouped by id
        let pragma = Self::pragma(table, "foreign_key_list", &table.name);
        let fk_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

        let mut foreign_keys: BTreeMap<i64, ForeignKeyDescriptor> = BTreeMap::new();
        for row in fk_rows {
            let id: i64 = row.try_get("id")?;
            let ref_table: String = row.try_get("table")?;
            let from: String = row.try_get("from")?;
            let to: Option<String> = row.try_get("to")?;

            let fk = foreign_keys.entry(id).or_insert_with(|| ForeignKeyDescriptor {
                name: None,
                definition: None,
                columns: Vec::new(),
                ref_table,
                ref_columns: None,
            });
            fk.columns.push(from);
            if let Some(to) = to {
                fk.ref_columns.get_or_insert_with(Vec::new).push(to);
            }
        }
        snapshot.foreign_keys = foreign_keys.into_values().collect();

        Ok(snapshot)
    }
}
