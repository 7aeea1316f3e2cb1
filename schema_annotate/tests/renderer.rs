//! Rendering of introspected tables into schema comments

use pretty_assertions::assert_eq;
use rstest::*;

use schema_annotate::config::{LineEnding, RenderOptions};
use schema_annotate::schema::types::{
    ColumnDescriptor, ConstraintDescriptor, Dialect, ForeignKeyDescriptor, IndexDescriptor,
    ReferenceDescriptor, TableSnapshot, TriggerDescriptor,
};
use schema_annotate::SchemaRenderer;

fn options() -> RenderOptions {
    RenderOptions {
        line_ending: LineEnding::Lf,
        ..Default::default()
    }
}

fn render(snapshot: &TableSnapshot, options: &RenderOptions) -> String {
    SchemaRenderer::new(options).render_snapshot(snapshot)
}

fn pg_index(name: &str, table: &str, columns: &str, primary: bool, unique: bool) -> IndexDescriptor {
    IndexDescriptor {
        name: name.to_string(),
        columns: columns.split(", ").map(String::from).collect(),
        is_unique: unique || primary,
        is_primary: primary,
        definition: Some(format!(
            "CREATE {}INDEX {} ON public.{} USING btree ({})",
            if unique || primary { "UNIQUE " } else { "" },
            name,
            table,
            columns
        )),
    }
}

fn pg_foreign_key(name: &str, definition: &str) -> ForeignKeyDescriptor {
    ForeignKeyDescriptor {
        name: Some(name.to_string()),
        definition: Some(format!("FOREIGN KEY {}", definition)),
        columns: Vec::new(),
        ref_table: String::new(),
        ref_columns: None,
    }
}

fn generic_foreign_key(columns: &[&str], ref_table: &str) -> ForeignKeyDescriptor {
    ForeignKeyDescriptor {
        name: None,
        definition: None,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        ref_table: ref_table.to_string(),
        ref_columns: None,
    }
}

#[fixture]
fn pg_items() -> TableSnapshot {
    let mut snapshot = TableSnapshot::new("items", Dialect::Postgres);
    snapshot.server_version = Some(150_004);

    snapshot.add_column(
        ColumnDescriptor::new("id", "integer")
            .primary_key()
            .auto_increment()
            .default("nextval('items_id_seq'::regclass)"),
    );
    snapshot.add_column(ColumnDescriptor::new("category_id", "integer").not_null());
    snapshot.add_column(ColumnDescriptor::new("manufacturer_name", "character varying(50)"));
    snapshot.add_column(ColumnDescriptor::new("manufacturer_location", "text"));
    snapshot.add_column(ColumnDescriptor::new("in_stock", "boolean").default("false"));
    snapshot.add_column(ColumnDescriptor::new("name", "text").default("'John'::text"));
    snapshot.add_column(ColumnDescriptor::new("price", "double precision").default("0"));

    snapshot.indexes = vec![
        pg_index("items_pkey", "items", "id", true, true),
        pg_index("name", "items", "manufacturer_name, manufacturer_location", false, true),
        pg_index("manufacturer_name", "items", "manufacturer_name", false, false),
    ];
    snapshot.check_constraints = vec![ConstraintDescriptor {
        name: "pos_id".to_string(),
        definition: "CHECK (id > 0)".to_string(),
    }];
    snapshot.foreign_keys = vec![
        pg_foreign_key(
            "items_manufacturer_name_fkey",
            "(manufacturer_name, manufacturer_location) REFERENCES manufacturers(name, location)",
        ),
        pg_foreign_key("items_category_id_fkey", "(category_id) REFERENCES categories(id)"),
    ];
    snapshot.triggers = vec![TriggerDescriptor {
        name: "valid_price".to_string(),
        definition: "CREATE TRIGGER valid_price BEFORE INSERT OR UPDATE ON items FOR EACH ROW EXECUTE FUNCTION valid_price()".to_string(),
    }];

    snapshot
}

#[fixture]
fn pg_categories() -> TableSnapshot {
    let mut snapshot = TableSnapshot::new("categories", Dialect::Postgres);
    snapshot.server_version = Some(150_004);

    snapshot.add_column(ColumnDescriptor::new("id", "integer").primary_key().auto_increment());
    snapshot.add_column(ColumnDescriptor::new("name", "text").not_null());

    snapshot.indexes = vec![
        pg_index("categories_pkey", "categories", "id", true, true),
        pg_index("categories_name_key", "categories", "name", false, true),
    ];
    snapshot.referenced_by = vec![ReferenceDescriptor {
        referencing_table: "items".to_string(),
        foreign_key: pg_foreign_key(
            "items_category_id_fkey",
            "(category_id) REFERENCES categories(id)",
        ),
    }];

    snapshot
}

#[fixture]
fn sqlite_items() -> TableSnapshot {
    let mut snapshot = TableSnapshot::new("items", Dialect::Generic);

    snapshot.add_column(ColumnDescriptor::new("id", "integer").primary_key().auto_increment());
    snapshot.add_column(ColumnDescriptor::new("category_id", "integer").not_null());
    snapshot.add_column(ColumnDescriptor::new("manufacturer_name", "varchar(50)"));
    snapshot.add_column(ColumnDescriptor::new("manufacturer_location", "varchar(255)"));
    snapshot.add_column(ColumnDescriptor::new("in_stock", "boolean").default("0"));
    snapshot.add_column(ColumnDescriptor::new("name", "varchar(255)").default("'John'"));
    snapshot.add_column(ColumnDescriptor::new("price", "double precision").default("0"));

    snapshot.indexes = vec![
        IndexDescriptor {
            name: "name".to_string(),
            columns: vec!["manufacturer_name".to_string(), "manufacturer_location".to_string()],
            is_unique: true,
            is_primary: false,
            definition: None,
        },
        IndexDescriptor {
            name: "manufacturer_name".to_string(),
            columns: vec!["manufacturer_name".to_string()],
            is_unique: false,
            is_primary: false,
            definition: None,
        },
    ];
    snapshot.foreign_keys = vec![
        generic_foreign_key(&["manufacturer_name", "manufacturer_location"], "manufacturers"),
        generic_foreign_key(&["category_id"], "categories"),
    ];

    snapshot
}

#[rstest]
fn renders_postgres_table(pg_items: TableSnapshot) {
    let expected = "\
# Table: items
# Columns:
#  id                    | integer               | PRIMARY KEY DEFAULT nextval('items_id_seq'::regclass)
#  category_id           | integer               | NOT NULL
#  manufacturer_name     | character varying(50) |
#  manufacturer_location | text                  |
#  in_stock              | boolean               | DEFAULT false
#  name                  | text                  | DEFAULT 'John'::text
#  price                 | double precision      | DEFAULT 0
# Indexes:
#  items_pkey        | PRIMARY KEY btree (id)
#  name              | UNIQUE btree (manufacturer_name, manufacturer_location)
#  manufacturer_name | btree (manufacturer_name)
# Check constraints:
#  pos_id | (id > 0)
# Foreign key constraints:
#  items_category_id_fkey       | (category_id) REFERENCES categories(id)
#  items_manufacturer_name_fkey | (manufacturer_name, manufacturer_location) REFERENCES manufacturers(name, location)
# Triggers:
#  valid_price | BEFORE INSERT OR UPDATE ON items FOR EACH ROW EXECUTE FUNCTION valid_price()";

    assert_eq!(render(&pg_items, &options()), expected);
}

#[rstest]
fn disabled_sections_are_omitted(pg_items: TableSnapshot) {
    let options = RenderOptions {
        indexes: false,
        constraints: false,
        foreign_keys: false,
        triggers: false,
        ..options()
    };

    let expected = "\
# Table: items
# Columns:
#  id                    | integer               | PRIMARY KEY DEFAULT nextval('items_id_seq'::regclass)
#  category_id           | integer               | NOT NULL
#  manufacturer_name     | character varying(50) |
#  manufacturer_location | text                  |
#  in_stock              | boolean               | DEFAULT false
#  name                  | text                  | DEFAULT 'John'::text
#  price                 | double precision      | DEFAULT 0";

    assert_eq!(render(&pg_items, &options), expected);
}

#[rstest]
#[case::indexes(RenderOptions { indexes: false, ..options() }, "# Indexes:")]
#[case::constraints(RenderOptions { constraints: false, ..options() }, "# Check constraints:")]
#[case::foreign_keys(RenderOptions { foreign_keys: false, ..options() }, "# Foreign key constraints:")]
#[case::triggers(RenderOptions { triggers: false, ..options() }, "# Triggers:")]
fn each_toggle_removes_only_its_section(
    pg_items: TableSnapshot,
    #[case] options: RenderOptions,
    #[case] section: &str,
) {
    let full = render(&pg_items, &self::options());
    let partial = render(&pg_items, &options);

    assert!(full.contains(section));
    assert!(!partial.contains(section));

    let others = [
        "# Columns:",
        "# Indexes:",
        "# Check constraints:",
        "# Foreign key constraints:",
        "# Triggers:",
    ];
    for other in others.iter().filter(|s| **s != section) {
        assert!(partial.contains(other), "{} missing", other);
    }
}

#[rstest]
fn border_wraps_the_block(pg_items: TableSnapshot) {
    let options = RenderOptions {
        border: true,
        indexes: false,
        constraints: false,
        foreign_keys: false,
        triggers: false,
        ..options()
    };

    let rendered = render(&pg_items, &options);
    let lines: Vec<&str> = rendered.lines().collect();
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap();

    assert_eq!(lines[0], "# Table: items");
    assert!(lines[1].starts_with("# ---"));
    assert_eq!(lines[1], *lines.last().unwrap());
    assert_eq!(lines[1].chars().count(), widest);
    assert_eq!(lines[2], "# Columns:");
}

#[rstest]
fn identity_and_reverse_references(pg_categories: TableSnapshot) {
    let expected = "\
# Table: categories
# Columns:
#  id   | integer | PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY
#  name | text    | NOT NULL
# Indexes:
#  categories_pkey     | PRIMARY KEY btree (id)
#  categories_name_key | UNIQUE btree (name)
# Referenced By:
#  items | items_category_id_fkey | (category_id) REFERENCES categories(id)";

    assert_eq!(render(&pg_categories, &options()), expected);

    let without_references = RenderOptions {
        references: false,
        ..options()
    };
    assert!(!render(&pg_categories, &without_references).contains("Referenced By"));
}

#[rstest]
fn identity_needs_postgres_10(mut pg_categories: TableSnapshot) {
    pg_categories.server_version = Some(90_624);
    let rendered = render(&pg_categories, &options());
    assert!(rendered.contains("#  id   | integer | PRIMARY KEY\n"));
}

#[test]
fn composite_primary_key() {
    let mut snapshot = TableSnapshot::new("manufacturers", Dialect::Postgres);
    snapshot.server_version = Some(150_004);
    snapshot.add_column(ColumnDescriptor::new("name", "text").primary_key());
    snapshot.add_column(ColumnDescriptor::new("location", "text").primary_key());
    snapshot.indexes = vec![pg_index("manufacturers_pkey", "manufacturers", "name, location", true, true)];
    snapshot.referenced_by = vec![ReferenceDescriptor {
        referencing_table: "items".to_string(),
        foreign_key: pg_foreign_key(
            "items_manufacturer_name_fkey",
            "(manufacturer_name, manufacturer_location) REFERENCES manufacturers(name, location)",
        ),
    }];

    let expected = "\
# Table: manufacturers
# Primary Key: (name, location)
# Columns:
#  name     | text |
#  location | text |
# Indexes:
#  manufacturers_pkey | PRIMARY KEY btree (name, location)
# Referenced By:
#  items | items_manufacturer_name_fkey | (manufacturer_name, manufacturer_location) REFERENCES manufacturers(name, location)";

    assert_eq!(render(&snapshot, &options()), expected);
}

#[test]
fn multiline_check_constraint() {
    let mut snapshot = TableSnapshot::new("newline_tests", Dialect::Postgres);
    snapshot.server_version = Some(150_004);
    snapshot.add_column(ColumnDescriptor::new("abcde_fghi_id", "integer"));
    snapshot.add_column(ColumnDescriptor::new("jkl_mnopqr_id", "integer"));
    snapshot.check_constraints = vec![ConstraintDescriptor {
        name: "valid_stuvw_xyz0".to_string(),
        definition: "CHECK (\nCASE\n    WHEN abcde_fghi_id = ANY (ARRAY[5, 6]) THEN jkl_mnopqr_id IS NOT NULL\n    ELSE jkl_mnopqr_id IS NULL\nEND)".to_string(),
    }];

    let expected = "\
# Table: newline_tests
# Columns:
#  abcde_fghi_id | integer |
#  jkl_mnopqr_id | integer |
# Check constraints:
#  valid_stuvw_xyz0 | (
#    CASE
#        WHEN abcde_fghi_id = ANY (ARRAY[5, 6]) THEN jkl_mnopqr_id IS NOT NULL
#        ELSE jkl_mnopqr_id IS NULL
#    END)";

    assert_eq!(render(&snapshot, &options()), expected);
}

#[test]
fn table_and_column_comments() {
    let mut snapshot = TableSnapshot::new("comment_tests", Dialect::Postgres);
    snapshot.server_version = Some(150_004);
    snapshot.table.comment = Some("comment_tests table comment".to_string());
    snapshot.add_column(ColumnDescriptor::new("id", "integer").primary_key().auto_increment());
    snapshot.add_column(ColumnDescriptor::new("name", "text").comment("name column comment"));
    snapshot.indexes = vec![pg_index("comment_tests_pkey", "comment_tests", "id", true, true)];

    let expected = "\
# Table: comment_tests
# Comment: comment_tests table comment
# Columns:
#  id   | integer | PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY |
#  name | text    |                                              | name column comment
# Indexes:
#  comment_tests_pkey | PRIMARY KEY btree (id)";
    assert_eq!(render(&snapshot, &options()), expected);

    let without_comments = RenderOptions {
        comments: false,
        ..options()
    };
    let expected = "\
# Table: comment_tests
# Columns:
#  id   | integer | PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY
#  name | text    |
# Indexes:
#  comment_tests_pkey | PRIMARY KEY btree (id)";
    assert_eq!(render(&snapshot, &without_comments), expected);
}

#[test]
fn self_referencing_foreign_key() {
    let mut snapshot = TableSnapshot::new("fk_tests", Dialect::Postgres);
    snapshot.server_version = Some(150_004);
    snapshot.add_column(ColumnDescriptor::new("id", "integer").primary_key().auto_increment());
    snapshot.add_column(ColumnDescriptor::new("b", "integer"));
    snapshot.add_column(ColumnDescriptor::new("c", "integer"));
    snapshot.indexes = vec![
        pg_index("fk_tests_pkey", "fk_tests", "id", true, true),
        pg_index("fk_tests_b_uidx", "fk_tests", "b", false, true),
    ];
    let fk = pg_foreign_key("fk_tests_c_fk", "(c) REFERENCES fk_tests(b)");
    snapshot.foreign_keys = vec![fk.clone()];
    snapshot.referenced_by = vec![ReferenceDescriptor {
        referencing_table: "fk_tests".to_string(),
        foreign_key: fk,
    }];

    let expected = "\
# Table: fk_tests
# Columns:
#  id | integer | PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY
#  b  | integer |
#  c  | integer |
# Indexes:
#  fk_tests_pkey   | PRIMARY KEY btree (id)
#  fk_tests_b_uidx | UNIQUE btree (b)
# Foreign key constraints:
#  fk_tests_c_fk | (c) REFERENCES fk_tests(b)
# Referenced By:
#  fk_tests | fk_tests_c_fk | (c) REFERENCES fk_tests(b)";

    assert_eq!(render(&snapshot, &options()), expected);
}

#[rstest]
fn renders_generic_table(sqlite_items: TableSnapshot) {
    let expected = "\
# Table: items
# Columns:
#  id                    | integer          | PRIMARY KEY AUTOINCREMENT
#  category_id           | integer          | NOT NULL
#  manufacturer_name     | varchar(50)      |
#  manufacturer_location | varchar(255)     |
#  in_stock              | boolean          | DEFAULT 0
#  name                  | varchar(255)     | DEFAULT 'John'
#  price                 | double precision | DEFAULT 0
# Indexes:
#  manufacturer_name | (manufacturer_name)
#  name              | UNIQUE (manufacturer_name, manufacturer_location)
# Foreign key constraints:
#  (category_id) REFERENCES categories
#  (manufacturer_name, manufacturer_location) REFERENCES manufacturers";

    assert_eq!(render(&sqlite_items, &options()), expected);
}

#[rstest]
fn generic_sections_can_be_disabled(sqlite_items: TableSnapshot) {
    let options = RenderOptions {
        indexes: false,
        foreign_keys: false,
        ..options()
    };
    let rendered = render(&sqlite_items, &options);

    assert_eq!(rendered.lines().count(), 9);
    assert!(rendered.ends_with("#  price                 | double precision | DEFAULT 0"));
}

#[rstest]
fn crlf_line_endings(sqlite_items: TableSnapshot) {
    let options = RenderOptions {
        line_ending: LineEnding::Crlf,
        ..options()
    };
    let rendered = render(&sqlite_items, &options);

    assert!(rendered.starts_with("# Table: items\r\n# Columns:\r\n"));
    assert_eq!(rendered.matches('\n').count(), rendered.matches("\r\n").count());
}
