//! Table extraction: colspan/rowspan expansion into a rectangular matrix.
//!
//! Filing tables abuse `colspan` and `rowspan` heavily (a "$" sign in its own spanned
//! cell, indented row labels, multi-row headers). [`TableMatrix`] expands every spanned
//! cell into the grid it covers, with expanded positions sharing the original cell's
//! text and origin, so downstream code can address `(row, col)` without caring how the
//! filer laid things out.
//!
//! Matrix conservation holds by construction: the number of occupied grid positions
//! equals the sum over source cells of `colspan × rowspan`.

use serde::{Deserialize, Serialize};

/// One source cell before expansion.
#[derive(Debug, Clone, Default)]
pub struct SourceCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
    pub is_header: bool,
}

impl SourceCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            colspan: 1,
            rowspan: 1,
            is_header: false,
        }
    }
}

/// One expanded grid position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixCell {
    pub text: String,

    /// `(row, col)` of the source cell this position was expanded from. Filler cells
    /// inserted to keep the grid rectangular have no origin.
    pub origin: Option<(usize, usize)>,

    pub is_header: bool,
}

impl MatrixCell {
    /// Whether this position came from an actual source cell (as opposed to
    /// rectangularization filler).
    pub fn is_occupied(&self) -> bool {
        self.origin.is_some()
    }
}

/// A rectangular table with spans expanded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMatrix {
    pub rows: usize,
    pub cols: usize,
    grid: Vec<MatrixCell>,

    /// Number of leading header rows. Multi-row headers stay separate rows; merging
    /// happens only at render time.
    pub header_rows: usize,

    pub caption: Option<String>,
}

impl TableMatrix {
    /// Expands source rows into a rectangular matrix.
    ///
    /// Rowspan overflow past the last row is clipped; rows shorter than the widest
    /// row are padded with unoccupied filler cells.
    pub fn from_rows(source: &[Vec<SourceCell>], caption: Option<String>) -> Self {
        let row_count = source.len();
        if row_count == 0 {
            return TableMatrix::default();
        }

        // First pass: compute the grid width under span expansion.
        let mut widths = vec![0usize; row_count];
        {
            // carried[col] = rows a spanning cell still occupies below the current row
            let mut carried: Vec<usize> = Vec::new();
            for (r, row) in source.iter().enumerate() {
                let mut col = 0;
                let mut width = 0;
                for cell in row {
                    while col < carried.len() && carried[col] > 0 {
                        width = width.max(col + 1);
                        col += 1;
                    }
                    let colspan = cell.colspan.max(1);
                    let rowspan = cell.rowspan.max(1);
                    for c in col..col + colspan {
                        if carried.len() <= c {
                            carried.resize(c + 1, 0);
                        }
                        carried[c] = carried[c].max(rowspan);
                    }
                    col += colspan;
                    width = width.max(col);
                }
                // Trailing carried columns extend the row
                for (c, remaining) in carried.iter().enumerate() {
                    if *remaining > 0 {
                        width = width.max(c + 1);
                    }
                }
                widths[r] = width;
                for remaining in carried.iter_mut() {
                    *remaining = remaining.saturating_sub(1);
                }
            }
        }
        let cols = widths.into_iter().max().unwrap_or(0);
        if cols == 0 {
            return TableMatrix::default();
        }

        let mut grid = vec![MatrixCell::default(); row_count * cols];
        let mut occupied = vec![false; row_count * cols];

        for (r, row) in source.iter().enumerate() {
            let mut col = 0;
            for (c_idx, cell) in row.iter().enumerate() {
                while col < cols && occupied[r * cols + col] {
                    col += 1;
                }
                if col >= cols {
                    break;
                }
                let colspan = cell.colspan.max(1).min(cols - col);
                let rowspan = cell.rowspan.max(1).min(row_count - r);
                for dr in 0..rowspan {
                    for dc in 0..colspan {
                        let index = (r + dr) * cols + (col + dc);
                        grid[index] = MatrixCell {
                            text: cell.text.clone(),
                            origin: Some((r, c_idx)),
                            is_header: cell.is_header,
                        };
                        occupied[index] = true;
                    }
                }
                col += colspan;
            }
        }

        let header_rows = detect_header_rows(source);

        TableMatrix {
            rows: row_count,
            cols,
            grid,
            header_rows,
            caption,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&MatrixCell> {
        if row < self.rows && col < self.cols {
            self.grid.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = &MatrixCell> {
        (0..self.cols).filter_map(move |c| self.cell(row, c))
    }

    /// Number of grid positions expanded from source cells. Equals the sum of
    /// `colspan × rowspan` over all source cells (after clipping).
    pub fn occupied_count(&self) -> usize {
        self.grid.iter().filter(|c| c.is_occupied()).count()
    }

    /// Column classification: true for columns whose non-empty body cells are mostly
    /// numeric (currency symbols, commas, parens-for-negative and percent accepted).
    pub fn numeric_columns(&self) -> Vec<bool> {
        (0..self.cols)
            .map(|c| {
                let mut numeric = 0usize;
                let mut non_empty = 0usize;
                for r in self.header_rows..self.rows {
                    let Some(cell) = self.cell(r, c) else { continue };
                    let text = cell.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    non_empty += 1;
                    if parse_numeric(text).is_some() || text == "$" || text == "%" {
                        numeric += 1;
                    }
                }
                non_empty > 0 && numeric * 2 > non_empty
            })
            .collect()
    }

    /// Columns that contain only currency symbols; the renderer merges each with the
    /// value column to its right.
    pub fn currency_columns(&self) -> Vec<bool> {
        (0..self.cols)
            .map(|c| {
                let mut symbols = 0usize;
                let mut non_empty = 0usize;
                for r in self.header_rows..self.rows {
                    let Some(cell) = self.cell(r, c) else { continue };
                    let text = cell.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    non_empty += 1;
                    if text == "$" || text == "(" || text == ")" {
                        symbols += 1;
                    }
                }
                non_empty > 0 && symbols == non_empty
            })
            .collect()
    }

    /// Header text for a column, joining multi-row header cells top-down.
    pub fn column_heading(&self, col: usize) -> String {
        let mut parts: Vec<String> = Vec::new();
        for r in 0..self.header_rows {
            if let Some(cell) = self.cell(r, col) {
                let text = cell.text.trim();
                if !text.is_empty() && parts.last().map(String::as_str) != Some(text) {
                    parts.push(text.to_string());
                }
            }
        }
        parts.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// Leading rows consisting of `<th>` cells or, failing that, rows before the first
/// row with a numeric majority.
fn detect_header_rows(source: &[Vec<SourceCell>]) -> usize {
    let mut count = 0;
    for row in source {
        let header_like = !row.is_empty()
            && row
                .iter()
                .all(|c| c.is_header || c.text.trim().is_empty() || parse_numeric(&c.text).is_none());
        let any_header = row.iter().any(|c| c.is_header);
        if header_like && (any_header || count == 0 && all_text(row)) {
            count += 1;
        } else {
            break;
        }
    }
    count.min(source.len().saturating_sub(1))
}

fn all_text(row: &[SourceCell]) -> bool {
    row.iter()
        .any(|c| !c.text.trim().is_empty() && parse_numeric(&c.text).is_none())
}

/// Lenient financial-number parser: `$1,234`, `(567)`, `12.5%`.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().map(|n| {
        if negative && n > 0.0 { -n } else { n }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str) -> SourceCell {
        SourceCell::new(text)
    }

    fn span(text: &str, colspan: usize, rowspan: usize) -> SourceCell {
        SourceCell {
            text: text.to_string(),
            colspan,
            rowspan,
            is_header: false,
        }
    }

    fn header(text: &str, colspan: usize) -> SourceCell {
        SourceCell {
            text: text.to_string(),
            colspan,
            rowspan: 1,
            is_header: true,
        }
    }

    #[test]
    fn test_simple_grid() {
        let rows = vec![
            vec![header("Label", 1), header("2023", 1), header("2022", 1)],
            vec![cell("Revenue"), cell("1,000"), cell("900")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        assert_eq!(matrix.rows, 2);
        assert_eq!(matrix.cols, 3);
        assert_eq!(matrix.header_rows, 1);
        assert_eq!(matrix.cell(1, 1).unwrap().text, "1,000");
    }

    #[test]
    fn test_colspan_expansion() {
        let rows = vec![
            vec![header("", 1), header("Years ended", 2)],
            vec![cell("Revenue"), cell("1,000"), cell("900")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        assert_eq!(matrix.cols, 3);
        // Both expanded header positions share text and origin
        assert_eq!(matrix.cell(0, 1).unwrap().text, "Years ended");
        assert_eq!(matrix.cell(0, 2).unwrap().text, "Years ended");
        assert_eq!(matrix.cell(0, 1).unwrap().origin, Some((0, 1)));
        assert_eq!(matrix.cell(0, 2).unwrap().origin, Some((0, 1)));
    }

    #[test]
    fn test_rowspan_expansion() {
        let rows = vec![
            vec![span("Segment", 1, 2), cell("Q1"), cell("100")],
            vec![cell("Q2"), cell("110")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        assert_eq!(matrix.cols, 3);
        assert_eq!(matrix.cell(0, 0).unwrap().text, "Segment");
        assert_eq!(matrix.cell(1, 0).unwrap().text, "Segment");
        // Second row's own cells slot in after the carried column
        assert_eq!(matrix.cell(1, 1).unwrap().text, "Q2");
        assert_eq!(matrix.cell(1, 2).unwrap().text, "110");
    }

    #[test]
    fn test_matrix_conservation() {
        let rows = vec![
            vec![span("a", 2, 1), cell("b")],
            vec![cell("c"), span("d", 1, 1), cell("e")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        let expected: usize = 2 * 1 + 1 + 1 + 1 + 1; // sum of colspan*rowspan
        assert_eq!(matrix.occupied_count(), expected);
    }

    #[test]
    fn test_empty_column_preserved() {
        // Four period columns, one entirely empty: the grid must keep all four.
        let rows = vec![
            vec![header("", 1), header("Q1", 1), header("Q2", 1), header("Q3", 1), header("Q4", 1)],
            vec![cell("Cash"), cell("10"), cell(""), cell("30"), cell("40")],
            vec![cell("Debt"), cell("5"), cell(""), cell("15"), cell("20")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        assert_eq!(matrix.cols, 5);
        assert_eq!(matrix.cell(1, 2).unwrap().text, "");
        assert!(matrix.cell(1, 2).unwrap().is_occupied());
    }

    #[test]
    fn test_numeric_columns() {
        let rows = vec![
            vec![header("Label", 1), header("$", 1), header("2023", 1)],
            vec![cell("Revenue"), cell("$"), cell("1,000")],
            vec![cell("Net income"), cell("$"), cell("(250)")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        let numeric = matrix.numeric_columns();
        assert_eq!(numeric, vec![false, true, true]);
        let currency = matrix.currency_columns();
        assert_eq!(currency, vec![false, true, false]);
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("1,234"), Some(1234.0));
        assert_eq!(parse_numeric("$1,234.50"), Some(1234.5));
        assert_eq!(parse_numeric("(567)"), Some(-567.0));
        assert_eq!(parse_numeric("12.5%"), Some(12.5));
        assert_eq!(parse_numeric("Revenue"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn test_multi_row_header_kept_separate() {
        let rows = vec![
            vec![header("", 1), header("Three months", 2)],
            vec![header("", 1), header("2023", 1), header("2022", 1)],
            vec![cell("Revenue"), cell("100"), cell("90")],
        ];
        let matrix = TableMatrix::from_rows(&rows, None);
        assert_eq!(matrix.header_rows, 2);
        assert_eq!(matrix.column_heading(1), "Three months 2023");
    }
}
