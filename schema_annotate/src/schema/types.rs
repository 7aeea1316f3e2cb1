//! Type definitions for catalog objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rendering path a catalog belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Columns, indexes and unnamed foreign keys only (SQLite, MySQL)
    Generic,
    /// Adds check constraints, named foreign keys, reverse references and triggers
    Postgres,
}

/// A possibly schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    /// Create an unqualified table reference
    pub fn new(name: &str) -> Self {
        Self {
            schema: None,
            name: name.to_string(),
        }
    }

    /// Create a schema-qualified table reference
    pub fn qualified(schema: &str, name: &str) -> Self {
        Self {
            schema: Some(schema.to_string()),
            name: name.to_string(),
        }
    }

    /// Parse `table` or `schema.table`
    pub fn parse(input: &str) -> Self {
        match input.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::qualified(schema, name)
            }
            _ => Self::new(input),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// What a model reads its rows from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSource {
    /// A plain table the catalog can describe
    Table(TableRef),
    /// A joined or filtered dataset; kept verbatim, never introspected
    Derived(String),
}

/// Table-level facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub primary_key: Vec<String>,
    pub comment: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primary_key: Vec::new(),
            comment: None,
        }
    }

    /// Whether the primary key spans more than one column
    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key.len() > 1
    }
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub db_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, db_type: &str) -> Self {
        Self {
            name: name.to_string(),
            db_type: db_type.to_string(),
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
    /// `pg_get_indexdef` output on PostgreSQL, absent elsewhere
    pub definition: Option<String>,
}

/// Represents a check constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub definition: String,
}

/// Represents a foreign key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub name: Option<String>,
    pub definition: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: String,
    /// `None` when the key targets the referenced table's primary key implicitly
    pub ref_columns: Option<Vec<String>>,
}

/// A foreign key held by another table that points at the annotated one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    pub referencing_table: String,
    pub foreign_key: ForeignKeyDescriptor,
}

/// Represents a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDescriptor {
    pub name: String,
    pub definition: String,
}

/// Everything the renderer needs to know about one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table: TableDescriptor,
    pub dialect: Dialect,
    /// `server_version_num` on PostgreSQL
    pub server_version: Option<u32>,
    pub columns: Vec<ColumnDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub check_constraints: Vec<ConstraintDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub referenced_by: Vec<ReferenceDescriptor>,
    pub triggers: Vec<TriggerDescriptor>,
}

impl TableSnapshot {
    /// Create an empty snapshot for the given table
    pub fn new(name: &str, dialect: Dialect) -> Self {
        Self {
            table: TableDescriptor::new(name),
            dialect,
            server_version: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            check_constraints: Vec::new(),
            foreign_keys: Vec::new(),
            referenced_by: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Add a column, keeping the primary key list in step with its flag
    pub fn add_column(&mut self, column: ColumnDescriptor) {
        if column.primary_key && !self.table.primary_key.contains(&column.name) {
            self.table.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
    }

    /// PostgreSQL 10 introduced identity columns
    pub fn supports_identity(&self) -> bool {
        self.dialect == Dialect::Postgres && self.server_version.map_or(false, |v| v >= 100_000)
    }
}
