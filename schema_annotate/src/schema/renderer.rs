//! Schema comment renderer
//!
//! Turns a [`TableSnapshot`] into the `#`-prefixed comment block written into
//! model files. Rendering from a live catalog never fails: anything that
//! cannot be introspected renders as an empty string.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RenderOptions;
use crate::schema::align::align;
use crate::schema::analyzer::Catalog;
use crate::schema::types::{
    ColumnDescriptor, Dialect, ForeignKeyDescriptor, IndexDescriptor, TableSnapshot, TableSource,
};

/// First line of every rendered block
pub const HEADER_PREFIX: &str = "# Table: ";

const IDENTITY: &str = "GENERATED BY DEFAULT AS IDENTITY";

static USING_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)USING (.+)\z").unwrap());
static CHECK_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)CHECK (.+)\z").unwrap());
static FOREIGN_KEY_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)FOREIGN KEY (.+)\z").unwrap());
static TRIGGER_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)((?:BEFORE|AFTER|INSTEAD OF) .+)\z").unwrap());

/// Renders schema comments with a fixed set of options
pub struct SchemaRenderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> SchemaRenderer<'a> {
    /// Create a new renderer
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    /// Introspect the source through the catalog and render it.
    ///
    /// Returns an empty string for derived datasets and for tables the
    /// catalog cannot describe.
    pub async fn render(&self, catalog: &dyn Catalog, source: &TableSource) -> String {
        let table = match source {
            TableSource::Table(table) => table,
            TableSource::Derived(dataset) => {
                tracing::debug!(dataset = %dataset, "Model is backed by a derived dataset");
                return String::new();
            }
        };

        match catalog.introspect(table).await {
            Ok(snapshot) => self.render_snapshot(&snapshot),
            Err(e) => {
                tracing::debug!(table = %table, error = %e, "Table could not be introspected");
                String::new()
            }
        }
    }

    /// Render an already introspected table
    pub fn render_snapshot(&self, snapshot: &TableSnapshot) -> String {
        let mut output = vec![format!("{}{}", HEADER_PREFIX, snapshot.table.name)];

        if self.options.comments {
            if let Some(comment) = non_empty(&snapshot.table.comment) {
                let mut lines = comment.lines();
                output.push(format!("# Comment: {}", lines.next().unwrap_or_default()));
                output.extend(lines.map(|l| format!("#   {}", l).trim_end().to_string()));
            }
        }

        self.push_columns(&mut output, snapshot);

        match snapshot.dialect {
            Dialect::Postgres => self.push_postgres_sections(&mut output, snapshot),
            Dialect::Generic => self.push_generic_sections(&mut output, snapshot),
        }

        if self.options.border {
            let width = output.iter().map(|l| l.chars().count()).max().unwrap_or(0);
            let border = format!("# {}", "-".repeat(width.saturating_sub(2)));
            output.insert(1, border.clone());
            output.push(border);
        }

        output.join(self.options.line_ending.as_str())
    }

    fn push_columns(&self, output: &mut Vec<String>, snapshot: &TableSnapshot) {
        let composite = snapshot.table.has_composite_primary_key();
        if composite {
            output.push(format!(
                "# Primary Key: ({})",
                snapshot.table.primary_key.join(", ")
            ));
        }

        let with_comments = self.options.comments
            && snapshot.columns.iter().any(|c| non_empty(&c.comment).is_some());

        output.push("# Columns:".to_string());
        let rows: Vec<Vec<String>> = snapshot
            .columns
            .iter()
            .map(|column| {
                let mut row = vec![
                    column.name.clone(),
                    column.db_type.clone(),
                    column_attributes(column, snapshot, composite),
                ];
                if with_comments {
                    row.push(non_empty(&column.comment).unwrap_or_default().to_string());
                }
                row
            })
            .collect();
        output.extend(align(&rows));
    }

    fn push_generic_sections(&self, output: &mut Vec<String>, snapshot: &TableSnapshot) {
        if self.options.indexes && !snapshot.indexes.is_empty() {
            let mut indexes: Vec<&IndexDescriptor> = snapshot.indexes.iter().collect();
            indexes.sort_by(|a, b| a.name.cmp(&b.name));

            let rows: Vec<Vec<String>> = indexes
                .into_iter()
                .map(|index| {
                    let columns = format!("({})", index.columns.join(", "));
                    vec![index.name.clone(), index_text(index, &columns)]
                })
                .collect();
            push_section(output, "# Indexes:", &rows);
        }

        if self.options.foreign_keys && !snapshot.foreign_keys.is_empty() {
            let mut clauses: Vec<String> =
                snapshot.foreign_keys.iter().map(foreign_key_clause).collect();
            clauses.sort();

            let rows: Vec<Vec<String>> = clauses.into_iter().map(|c| vec![c]).collect();
            push_section(output, "# Foreign key constraints:", &rows);
        }
    }

    fn push_postgres_sections(&self, output: &mut Vec<String>, snapshot: &TableSnapshot) {
        if self.options.indexes && !snapshot.indexes.is_empty() {
            // catalog order: primary first, then unique, then name
            let rows: Vec<Vec<String>> = snapshot
                .indexes
                .iter()
                .map(|index| {
                    let definition = match &index.definition {
                        Some(definition) => clause(&USING_CLAUSE, definition).to_string(),
                        None => format!("({})", index.columns.join(", ")),
                    };
                    vec![index.name.clone(), index_text(index, &definition)]
                })
                .collect();
            push_section(output, "# Indexes:", &rows);
        }

        if self.options.constraints && !snapshot.check_constraints.is_empty() {
            let mut checks: Vec<_> = snapshot.check_constraints.iter().collect();
            checks.sort_by(|a, b| a.name.cmp(&b.name));

            let rows: Vec<Vec<String>> = checks
                .into_iter()
                .map(|c| vec![c.name.clone(), clause(&CHECK_CLAUSE, &c.definition).to_string()])
                .collect();
            push_section(output, "# Check constraints:", &rows);
        }

        if self.options.foreign_keys && !snapshot.foreign_keys.is_empty() {
            let mut foreign_keys: Vec<_> = snapshot.foreign_keys.iter().collect();
            foreign_keys.sort_by(|a, b| a.name.cmp(&b.name));

            let rows: Vec<Vec<String>> = foreign_keys
                .into_iter()
                .map(|fk| vec![fk.name.clone().unwrap_or_default(), foreign_key_clause(fk)])
                .collect();
            push_section(output, "# Foreign key constraints:", &rows);
        }

        if self.options.references && !snapshot.referenced_by.is_empty() {
            let mut references: Vec<_> = snapshot.referenced_by.iter().collect();
            references.sort_by(|a, b| {
                (&a.referencing_table, &a.foreign_key.name)
                    .cmp(&(&b.referencing_table, &b.foreign_key.name))
            });

            let rows: Vec<Vec<String>> = references
                .into_iter()
                .map(|r| {
                    vec![
                        r.referencing_table.clone(),
                        r.foreign_key.name.clone().unwrap_or_default(),
                        foreign_key_clause(&r.foreign_key),
                    ]
                })
                .collect();
            push_section(output, "# Referenced By:", &rows);
        }

        if self.options.triggers && !snapshot.triggers.is_empty() {
            let mut triggers: Vec<_> = snapshot.triggers.iter().collect();
            triggers.sort_by(|a, b| a.name.cmp(&b.name));

            let rows: Vec<Vec<String>> = triggers
                .into_iter()
                .map(|t| vec![t.name.clone(), clause(&TRIGGER_CLAUSE, &t.definition).to_string()])
                .collect();
            push_section(output, "# Triggers:", &rows);
        }
    }
}

fn push_section(output: &mut Vec<String>, title: &str, rows: &[Vec<String>]) {
    output.push(title.to_string());
    output.extend(align(rows));
}

/// Attribute text of a column row
fn column_attributes(column: &ColumnDescriptor, snapshot: &TableSnapshot, composite: bool) -> String {
    let mut attributes: Vec<String> = Vec::new();
    let identity =
        column.auto_increment && column.default.is_none() && snapshot.supports_identity();
    let single_key = column.primary_key && !composite;

    if single_key {
        attributes.push("PRIMARY KEY".to_string());
        if column.auto_increment && snapshot.dialect != Dialect::Postgres {
            attributes.push("AUTOINCREMENT".to_string());
        } else if identity {
            attributes.push(IDENTITY.to_string());
        }
    }

    if !column.nullable && !column.primary_key {
        attributes.push("NOT NULL".to_string());
    }

    if let Some(default) = &column.default {
        attributes.push(format!("DEFAULT {}", default));
    }

    if identity && !single_key {
        attributes.push(IDENTITY.to_string());
    }

    attributes.join(" ")
}

fn index_text(index: &IndexDescriptor, definition: &str) -> String {
    let prefix = if index.is_primary {
        "PRIMARY KEY "
    } else if index.is_unique {
        "UNIQUE "
    } else {
        ""
    };
    format!("{}{}", prefix, definition)
}

/// `(cols) REFERENCES table(ref_cols)`, from the catalog text when available
fn foreign_key_clause(fk: &ForeignKeyDescriptor) -> String {
    if let Some(definition) = &fk.definition {
        return clause(&FOREIGN_KEY_CLAUSE, definition).to_string();
    }

    let ref_columns = fk
        .ref_columns
        .as_ref()
        .map(|cols| format!("({})", cols.join(", ")))
        .unwrap_or_default();
    format!("({}) REFERENCES {}{}", fk.columns.join(", "), fk.ref_table, ref_columns)
}

/// The captured tail of a catalog definition, or the whole text if it does not match
fn clause<'d>(pattern: &Regex, definition: &'d str) -> &'d str {
    pattern
        .captures(definition)
        .and_then(|c| c.get(1))
        .map_or(definition, |m| m.as_str())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
