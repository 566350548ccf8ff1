//! Result-table parsing for subprocess backends
//!
//! SPiM writes comma-separated tables with a quoted header line;
//! StochKit2 writes whitespace-separated tables without one. Both reduce
//! to the same shape: a leading time column followed by one column per
//! reported species.

use crate::error::{Result, RuntimeError};

/// Column separator used by a result table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Comma-separated (SPiM)
    Comma,
    /// Any run of spaces or tabs (StochKit2)
    Whitespace,
}

/// Parsed result table: time column plus dependent rows
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    /// Column headers, without the time column; empty when the table
    /// carried no header line
    pub headers: Vec<String>,
    /// Time values, one per row
    pub independent: Vec<f64>,
    /// Dependent values, one row per time value
    pub dependent: Vec<Vec<f64>>,
}

impl ResultTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.independent.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.independent.is_empty()
    }

    /// Number of dependent columns
    pub fn width(&self) -> usize {
        self.dependent.first().map_or(0, Vec::len)
    }
}

/// Parse a result table from raw text.
///
/// The first line is treated as a header when any of its fields fails to
/// parse as a number. Every data row must have the same width; blank
/// lines are skipped.
pub fn parse_table(text: &str, delimiter: Delimiter) -> Result<ResultTable> {
    let mut headers = Vec::new();
    let mut independent = Vec::new();
    let mut dependent = Vec::new();
    let mut width = None;

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = split(line, delimiter);
        if fields.is_empty() {
            continue;
        }

        let parsed: std::result::Result<Vec<f64>, _> =
            fields.iter().map(|f| f.parse::<f64>()).collect();
        match parsed {
            Err(_) if independent.is_empty() && headers.is_empty() => {
                headers = fields
                    .iter()
                    .map(|f| f.trim_matches('"').to_string())
                    .collect();
            }
            Err(_) => {
                return Err(RuntimeError::parse(
                    number + 1,
                    format!("non-numeric field in data row: '{}'", line),
                ));
            }
            Ok(values) => {
                let (first, rest) = match values.split_first() {
                    Some(split) => split,
                    None => continue,
                };
                match width {
                    None => width = Some(rest.len()),
                    Some(expected) if expected != rest.len() => {
                        return Err(RuntimeError::parse(
                            number + 1,
                            format!(
                                "row has {} dependent values, expected {}",
                                rest.len(),
                                expected
                            ),
                        ));
                    }
                    Some(_) => {}
                }
                independent.push(*first);
                dependent.push(rest.to_vec());
            }
        }
    }

    if independent.is_empty() {
        return Err(RuntimeError::parse(1, "result table has no data rows"));
    }
    if !headers.is_empty() && headers.len() != width.unwrap_or(0) + 1 {
        return Err(RuntimeError::parse(
            1,
            format!(
                "header names {} columns but rows have {}",
                headers.len(),
                width.unwrap_or(0) + 1
            ),
        ));
    }
    if !headers.is_empty() {
        headers.remove(0);
    }

    Ok(ResultTable {
        headers,
        independent,
        dependent,
    })
}

fn split(line: &str, delimiter: Delimiter) -> Vec<&str> {
    match delimiter {
        Delimiter::Comma => line.split(',').map(str::trim).collect(),
        Delimiter::Whitespace => line.split_whitespace().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spim_style_table() {
        let text = "\"Time\",\"R()\",\"F()\"\n0.0,120,40\n0.5,130,38\n1.0,141,36\n";
        let table = parse_table(text, Delimiter::Comma).expect("parses");
        assert_eq!(table.headers, vec!["R()".to_string(), "F()".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.width(), 2);
        assert_eq!(table.independent, vec![0.0, 0.5, 1.0]);
        assert_eq!(table.dependent[2], vec![141.0, 36.0]);
    }

    #[test]
    fn test_stochkit_style_table_without_header() {
        let text = "0 120 40 0\n0.5\t130\t38\t2\n";
        let table = parse_table(text, Delimiter::Whitespace).expect("parses");
        assert!(table.headers.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 3);
        assert_eq!(table.dependent[1], vec![130.0, 38.0, 2.0]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let text = "\n0,1\n\n1,2\n\n";
        let table = parse_table(text, Delimiter::Comma).expect("parses");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let text = "0,1,2\n1,3\n";
        let err = parse_table(text, Delimiter::Comma).expect_err("ragged");
        assert!(matches!(err, RuntimeError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_non_numeric_data_row_rejected() {
        let text = "0,1\nnope,2\n";
        assert!(matches!(
            parse_table(text, Delimiter::Comma),
            Err(RuntimeError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(parse_table("", Delimiter::Comma).is_err());
        assert!(parse_table("\"Time\",\"A\"\n", Delimiter::Comma).is_err());
    }

    use proptest::prelude::*;

    fn uniform_rows() -> impl Strategy<Value = Vec<Vec<f64>>> {
        (3usize..6).prop_flat_map(|width| {
            proptest::collection::vec(
                proptest::collection::vec(-1e6f64..1e6, width..=width),
                1..20,
            )
        })
    }

    proptest::proptest! {
        #[test]
        fn parse_recovers_rendered_rows(rows in uniform_rows()) {
            let width = rows[0].len();
            let text: String = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|v| format!("{:.6}", v))
                        .collect::<Vec<_>>()
                        .join(",")
                        + "\n"
                })
                .collect();

            let table = parse_table(&text, Delimiter::Comma).expect("renders parse");
            proptest::prop_assert_eq!(table.len(), rows.len());
            proptest::prop_assert_eq!(table.width(), width - 1);
            for (parsed, original) in table.independent.iter().zip(rows.iter()) {
                proptest::prop_assert!((parsed - original[0]).abs() < 1e-5);
            }
        }
    }
}
