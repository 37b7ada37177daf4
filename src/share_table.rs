// 📊 Shareholding Table Parser
//
// Company filings embed the share register as a small HTML table:
//   <tr><td>identity</td><td>name</td><td>class</td><td>count</td>...</tr>
// The parser never fails: rows it cannot read are skipped.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::normalize::{clean_text, strip_markup};

/// Minimum cells for a row to carry shareholding data.
const MIN_CELLS: usize = 4;

lazy_static! {
    static ref ROW: Regex = Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap();
    static ref CELL: Regex = Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCell {
    pub shares_class: Option<String>,
    pub shares_count: i64,
}

/// Parse an embedded share table into `identity → {class, count}`.
pub fn parse_share_table(html: &str) -> BTreeMap<String, ShareCell> {
    let mut holdings: BTreeMap<String, ShareCell> = BTreeMap::new();

    for row in ROW.captures_iter(html) {
        let cells: Vec<String> = CELL
            .captures_iter(&row[1])
            .map(|cell| strip_markup(&cell[1]))
            .collect();

        if cells.len() < MIN_CELLS {
            continue;
        }

        let identity = match clean_text(&cells[0]) {
            Some(identity) => identity,
            None => continue,
        };

        let count = match parse_share_count(&cells[3]) {
            Some(count) => count,
            None => {
                tracing::trace!(identity = %identity, raw = %cells[3], "skipping share row");
                continue;
            }
        };

        let class = clean_text(&cells[2]);

        holdings
            .entry(identity)
            .and_modify(|existing| {
                existing.shares_count += count;
                if class.is_some() {
                    existing.shares_class = class.clone();
                }
            })
            .or_insert(ShareCell {
                shares_class: class,
                shares_count: count,
            });
    }

    holdings
}

/// Parse a share count, dropping thousands separators. Negative counts are
/// rejected.
fn parse_share_count(raw: &str) -> Option<i64> {
    let digits: String = strip_markup(raw)
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '_' | '\''))
        .collect();

    digits.parse::<i64>().ok().filter(|count| *count >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <table>
          <tr><th>ID</th><th>Name</th><th>Class</th><th>Shares</th></tr>
          <tr><td>19900515-11101</td><td>John Doe</td><td>Ordinary</td><td><b>1,000</b></td></tr>
          <TR class="odd"><TD>C-0042</TD><TD>Acme Holdings</TD><TD>Preference</TD><TD>2 500</TD></TR>
        </table>"#;

    #[test]
    fn test_parse_valid_rows() {
        let holdings = parse_share_table(TABLE);

        assert_eq!(holdings.len(), 2);
        let john = &holdings["19900515-11101"];
        assert_eq!(john.shares_class.as_deref(), Some("Ordinary"));
        assert_eq!(john.shares_count, 1000);

        let acme = &holdings["C-0042"];
        assert_eq!(acme.shares_class.as_deref(), Some("Preference"));
        assert_eq!(acme.shares_count, 2500);
    }

    #[test]
    fn test_malformed_count_returns_empty() {
        let html = "<tr><td>X1</td><td>X</td><td>Ordinary</td><td>lots</td></tr>";
        assert!(parse_share_table(html).is_empty());
    }

    #[test]
    fn test_bad_row_skipped_individually() {
        let html = "<tr><td>A</td><td>a</td><td>Ord</td><td>ten</td></tr>\
                    <tr><td>B</td><td>b</td><td>Ord</td><td>10</td></tr>";
        let holdings = parse_share_table(html);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings["B"].shares_count, 10);
    }

    #[test]
    fn test_short_rows_and_garbage() {
        assert!(parse_share_table("<tr><td>A</td><td>Ord</td><td>10</td></tr>").is_empty());
        assert!(parse_share_table("not a table at all").is_empty());
        assert!(parse_share_table("<tr><td>unterminated").is_empty());
        assert!(parse_share_table("").is_empty());
    }

    #[test]
    fn test_repeated_identity_sums_counts() {
        let html = "<tr><td>A</td><td>a</td><td>Ord</td><td>10</td></tr>\
                    <tr><td>A</td><td>a</td><td>Pref</td><td>5</td></tr>";
        let holdings = parse_share_table(html);
        assert_eq!(holdings["A"].shares_count, 15);
        assert_eq!(holdings["A"].shares_class.as_deref(), Some("Pref"));
    }
}
