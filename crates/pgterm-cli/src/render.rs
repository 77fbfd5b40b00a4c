use comfy_table::{Cell, Table};
use std::fmt::Write;

use pgterm_runtime::{Output, ResultSet};

const NULL_TEXT: &str = "NULL";

/// Text printed for one executed line: a table when there are columns to
/// show, then the summary.
pub fn render(output: &Output) -> String {
    let mut text = String::new();
    if let Output::Rows { result, .. } = output
        && !result.columns.is_empty()
    {
        // Writing to a String cannot fail.
        let _ = writeln!(text, "{}", table(result));
    }
    text.push_str(&output.summary());
    text
}

fn table(result: &ResultSet) -> Table {
    let mut table = Table::new();
    table.set_header(&result.columns);
    for row in &result.rows {
        table.add_row(
            row.iter()
                .map(|value| Cell::new(value.as_deref().unwrap_or(NULL_TEXT)))
                .collect::<Vec<_>>(),
        );
    }
    table
}
