//! Column alignment for comment rows

/// Prefix of every aligned row
const ROW_PREFIX: &str = "#  ";

/// Prefix of the extra lines of a cell that spans several lines
const CONTINUATION_PREFIX: &str = "#    ";

/// Align rows of cells into commented lines.
///
/// Each column is padded to its widest cell and columns are joined with
/// ` | `. A cell containing line breaks keeps its first line in place and
/// emits the remaining lines below the row, indented under the comment
/// marker. Trailing whitespace is trimmed from every line.
///
/// ```
/// use schema_annotate::schema::align::align;
///
/// let rows = vec![
///     vec!["abcdef".to_string(), "1".to_string()],
///     vec!["g".to_string(), "123456".to_string()],
/// ];
/// assert_eq!(align(&rows), vec!["#  abcdef | 1", "#  g      | 123456"]);
/// ```
pub fn align(rows: &[Vec<String>]) -> Vec<String> {
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; column_count];

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
            widths[i] = widths[i].max(width);
        }
    }

    let mut output = Vec::with_capacity(rows.len());
    for row in rows {
        let mut continuation = Vec::new();
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| {
                let mut lines = cell.lines();
                let first = lines.next().unwrap_or("");
                continuation.extend(lines.map(|l| format!("{}{}", CONTINUATION_PREFIX, l)));
                format!("{:<width$}", first, width = width)
            })
            .collect();

        output.push(format!("{}{}", ROW_PREFIX, cells.join(" | ")).trim_end().to_string());
        output.extend(continuation.into_iter().map(|l| l.trim_end().to_string()));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn pads_each_column_to_its_widest_cell() {
        let aligned = align(&rows(&[&["abcdef", "1"], &["g", "123456"]]));
        assert_eq!(aligned, vec!["#  abcdef | 1", "#  g      | 123456"]);
    }

    #[test]
    fn trims_trailing_padding_of_empty_last_cells() {
        let aligned = align(&rows(&[
            &["id", "integer", "PRIMARY KEY"],
            &["manufacturer_name", "varchar(50)", ""],
        ]));
        assert_eq!(
            aligned,
            vec![
                "#  id                | integer     | PRIMARY KEY",
                "#  manufacturer_name | varchar(50) |",
            ]
        );
    }

    #[test]
    fn multi_line_cells_continue_below_the_row() {
        let condition = "(\nCASE\n    WHEN a = 1 THEN b IS NOT NULL\n    ELSE b IS NULL\nEND)";
        let aligned = align(&rows(&[&["valid_ab", condition]]));
        assert_eq!(
            aligned,
            vec![
                "#  valid_ab | (",
                "#    CASE",
                "#        WHEN a = 1 THEN b IS NOT NULL",
                "#        ELSE b IS NULL",
                "#    END)",
            ]
        );
    }

    #[test]
    fn no_rows_no_lines() {
        assert!(align(&[]).is_empty());
    }
}
