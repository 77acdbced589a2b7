//! Sortable result tables.
//!
//! Rows are loosely typed JSON objects, so columns are inferred from the
//! data itself. Sorting keeps a single key and direction per table.

use std::cmp::Ordering;

use serde_json::Value;

use crate::backend::Record;

/// Direction of a sorted column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Asc => "▲",
            Self::Desc => "▼",
        }
    }
}

/// Current sort of a table. No key means rows keep their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn by(key: impl Into<String>, direction: SortDirection) -> Self {
        Self { key: Some(key.into()), direction }
    }

    /// Select a column: the current column flips direction, a new column
    /// starts descending.
    pub fn toggle(&mut self, key: &str) {
        if self.key.as_deref() == Some(key) {
            self.direction = self.direction.flip();
        } else {
            self.key = Some(key.to_string());
            self.direction = SortDirection::Desc;
        }
    }

    /// Step through columns with a single key: descending, then ascending,
    /// then the next column.
    pub fn cycle(&mut self, columns: &[Column]) {
        if columns.is_empty() {
            return;
        }
        let current = self.key.as_deref().and_then(|k| columns.iter().position(|c| c.key == k));
        match current {
            Some(i) if self.direction == SortDirection::Desc => self.toggle(&columns[i].key),
            Some(i) => self.toggle(&columns[(i + 1) % columns.len()].key),
            None => self.toggle(&columns[0].key),
        }
    }
}

/// An inferred table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub label: String,
    /// Right-aligned and thousands-separated
    pub numeric: bool,
    /// Emphasized label column
    pub highlight: bool,
}

/// Turn a snake_case key into a header label.
pub fn column_label(key: &str) -> String {
    key.replace('_', " ")
}

/// Infer columns from the keys of the first row.
pub fn infer_columns(rows: &[Record]) -> Vec<Column> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let mut columns: Vec<Column> = first
        .keys()
        .map(|key| Column {
            key: key.clone(),
            label: column_label(key),
            numeric: rows.iter().any(|r| r.get(key).is_some_and(Value::is_number)),
            highlight: false,
        })
        .collect();

    let label_index = columns
        .iter()
        .position(|c| rows.iter().all(|r| r.get(&c.key).is_some_and(Value::is_string)))
        .unwrap_or(0);
    if let Some(column) = columns.get_mut(label_index) {
        column.highlight = true;
    }

    columns
}

/// Compare two cells the way the table sorts them.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let (Some(Value::Number(x)), Some(Value::Number(y))) = (a, b) {
        if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    let (a, b) = (display_value(a), display_value(b));
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
}

/// Rows in display order. Sorting is stable.
pub fn sort_rows<'a>(rows: &'a [Record], sort: &SortState) -> Vec<&'a Record> {
    let mut sorted: Vec<&Record> = rows.iter().collect();
    if let Some(key) = sort.key.as_deref() {
        sorted.sort_by(|a, b| {
            let ordering = compare_cells(a.get(key), b.get(key));
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
    sorted
}

fn group_digits(digits: &str) -> String {
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Format an integer with thousands separators.
pub fn format_num(n: i64) -> String {
    let grouped = group_digits(&n.unsigned_abs().to_string());
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return format_num(i);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => {
            let text = f.to_string();
            let (sign, unsigned) = text.strip_prefix('-').map_or(("", text.as_str()), |t| ("-", t));
            let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
            if frac.is_empty() {
                format!("{sign}{}", group_digits(whole))
            } else {
                format!("{sign}{}.{frac}", group_digits(whole))
            }
        }
        _ => n.to_string(),
    }
}

/// Text shown for a cell.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// A table ready for display.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    pub columns: Vec<Column>,
    /// Rows to show, sorted and capped
    pub rows: Vec<&'a Record>,
    /// Number of rows before the cap
    pub total: usize,
}

impl<'a> TableView<'a> {
    pub fn new(rows: &'a [Record], sort: &SortState, max_rows: Option<usize>) -> Self {
        let mut sorted = sort_rows(rows, sort);
        if let Some(max) = max_rows {
            sorted.truncate(max);
        }
        Self { columns: infer_columns(rows), rows: sorted, total: rows.len() }
    }

    /// "Showing X of Y rows" when the cap hid some rows.
    pub fn footer(&self) -> Option<String> {
        (self.total > self.rows.len())
            .then(|| format!("Showing {} of {} rows", self.rows.len(), self.total))
    }

    pub fn cells(&self, row: &Record) -> Vec<String> {
        self.columns.iter().map(|c| display_value(row.get(&c.key))).collect()
    }

    /// Header label with a sort arrow on the sorted column.
    pub fn header(&self, column: &Column, sort: &SortState) -> String {
        if sort.key.as_deref() == Some(column.key.as_str()) {
            format!("{} {}", column.label, sort.direction.arrow())
        } else {
            column.label.clone()
        }
    }

    /// Render as aligned plain text.
    pub fn render_text(&self, sort: &SortState) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let headers: Vec<String> = self.columns.iter().map(|c| self.header(c, sort)).collect();
        let body: Vec<Vec<String>> = self.rows.iter().map(|r| self.cells(r)).collect();

        let widths: Vec<usize> = (0..self.columns.len())
            .map(|i| {
                body.iter()
                    .map(|cells| cells[i].chars().count())
                    .chain(std::iter::once(headers[i].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&self.columns)
                .zip(&widths)
                .map(|((cell, column), width)| {
                    if column.numeric {
                        format!("{cell:>width$}")
                    } else {
                        format!("{cell:<width$}")
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(&headers));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        out.push('\n');
        for cells in &body {
            out.push_str(&line(cells));
            out.push('\n');
        }
        if let Some(footer) = self.footer() {
            out.push_str(&footer);
            out.push('\n');
        }
        out
    }
}
