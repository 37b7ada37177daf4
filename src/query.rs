// 🔎 Query Service - paginated, sorted, highlighted search over one index
//
// Page 1 (or any page requested without a usable token) is served by offset.
// Later pages carry a cursor: the (sort value, id) of the previous page's last
// row, and the query resumes strictly after it. The id is always the
// tie-breaker, so pages never overlap or skip rows with equal sort values.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::cursor::SortCursor;
use crate::db::is_known_index;
use crate::error::QueryError;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

lazy_static! {
    static ref SORT_FIELD: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
}

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn after(&self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub whole_sentence: bool,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub cursor_token: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_sort_field() -> String {
    "id".to_string()
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            page: default_page(),
            page_size: default_page_size(),
            search_term: None,
            whole_word: false,
            whole_sentence: false,
            sort_field: default_sort_field(),
            sort_order: SortOrder::Asc,
            cursor_token: None,
        }
    }
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.page < 1 {
            return Err(QueryError::InvalidRequest("page must be at least 1".into()));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(QueryError::InvalidRequest(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if !SORT_FIELD.is_match(&self.sort_field) {
            return Err(QueryError::InvalidRequest(format!(
                "invalid sort field '{}'",
                self.sort_field
            )));
        }
        Ok(())
    }

    /// `"field:asc"` - the signature a cursor must carry to be honored.
    pub fn sort_signature(&self) -> String {
        format!("{}:{}", self.sort_field, self.sort_order.as_str())
    }

    fn term(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_count: u64,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_token: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub document: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
    pub pagination: Pagination,
}

// ============================================================================
// FULL-TEXT QUERY
// ============================================================================

/// Split a search term the way the FTS tokenizer does: runs of letters and digits.
pub fn tokenize(term: &str) -> Vec<String> {
    term.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// FTS5 MATCH expression for a request, or `None` without a search term.
pub fn match_expression(request: &SearchRequest) -> Result<Option<String>, QueryError> {
    let term = match request.term() {
        Some(term) => term,
        None => return Ok(None),
    };

    let tokens = tokenize(term);
    if tokens.is_empty() {
        return Err(QueryError::InvalidRequest(format!(
            "search term '{}' has no searchable words",
            term
        )));
    }

    let expression = if request.whole_sentence {
        format!("\"{}\"", tokens.join(" "))
    } else if request.whole_word {
        tokens
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" AND ")
    } else {
        tokens
            .iter()
            .map(|t| format!("\"{}\"*", t))
            .collect::<Vec<_>>()
            .join(" AND ")
    };

    Ok(Some(expression))
}

// ============================================================================
// HIGHLIGHTING
// ============================================================================

/// Strip combining marks so "José" and "jose" compare equal, the way the
/// FTS tokenizer folds them.
fn fold_char(c: char) -> impl Iterator<Item = char> {
    std::iter::once(c).nfd().filter(|c| !is_combining_mark(*c))
}

/// Folded copy of `text`, plus the original byte span behind every folded byte.
fn fold_text(text: &str) -> (String, Vec<(usize, usize)>) {
    let mut folded = String::with_capacity(text.len());
    let mut spans = Vec::with_capacity(text.len());
    for (start, c) in text.char_indices() {
        let end = start + c.len_utf8();
        for f in fold_char(c) {
            folded.push(f);
            spans.extend(std::iter::repeat((start, end)).take(f.len_utf8()));
        }
    }
    (folded, spans)
}

fn highlight_pattern(request: &SearchRequest) -> Option<Regex> {
    let tokens: Vec<String> = tokenize(request.term()?)
        .iter()
        .map(|t| regex::escape(&t.chars().flat_map(fold_char).collect::<String>()))
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let pattern = if request.whole_sentence {
        format!(r"\b{}\b", tokens.join(r"[^\p{L}\p{N}]+"))
    } else {
        let mut escaped = tokens;
        // Longest first so "kilimo" wins over "kil"
        escaped.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = escaped.join("|");
        if request.whole_word {
            format!(r"\b(?:{})\b", alternation)
        } else {
            // Prefix matches start at a word boundary, never mid-word
            format!(r"\b(?:{})", alternation)
        }
    };

    RegexBuilder::new(&pattern).case_insensitive(true).build().ok()
}

/// Wrap matches in `<em>`, or `None` when nothing matches. Matching runs on the
/// folded text; the marks are placed around the original characters.
fn mark_matches(text: &str, pattern: &Regex) -> Option<String> {
    let (folded, spans) = fold_text(text);
    let mut marked = String::with_capacity(text.len() + 16);
    let mut last = 0;
    let mut found = false;
    for m in pattern.find_iter(&folded) {
        if m.start() == m.end() {
            continue;
        }
        let start = spans[m.start()].0;
        let end = spans[m.end() - 1].1;
        if start < last {
            continue;
        }
        marked.push_str(&text[last..start]);
        marked.push_str("<em>");
        marked.push_str(&text[start..end]);
        marked.push_str("</em>");
        last = end;
        found = true;
    }
    if !found {
        return None;
    }
    marked.push_str(&text[last..]);
    Some(marked)
}

/// Wrap matches of the search term(s) in `<em>` for every string field of
/// `document`, keyed by dotted path. Fields without a match are left out.
pub fn highlight(document: &Value, request: &SearchRequest) -> Option<Map<String, Value>> {
    let pattern = highlight_pattern(request)?;
    let mut fields = Map::new();
    collect_highlights(document, "", &pattern, &mut fields);
    Some(fields)
}

fn collect_highlights(value: &Value, path: &str, pattern: &Regex, out: &mut Map<String, Value>) {
    let child = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    };

    match value {
        Value::String(text) => {
            if let Some(marked) = mark_matches(text, pattern) {
                out.insert(path.to_string(), Value::String(marked));
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_highlights(item, &child(key), pattern, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_highlights(item, &child(&i.to_string()), pattern, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// SQL
// ============================================================================

/// Positional parameter list that hands out `?N` placeholders.
#[derive(Default)]
struct SqlParams(Vec<SqlValue>);

impl SqlParams {
    fn bind(&mut self, value: SqlValue) -> String {
        self.0.push(value);
        format!("?{}", self.0.len())
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Text(String::new()),
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::String(String::new()),
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

struct PageRow {
    id: String,
    body: String,
    sort_key: SqlValue,
}

/// Run a search against `index`.
pub fn search(
    conn: &Connection,
    index: &str,
    request: &SearchRequest,
) -> Result<SearchResponse, QueryError> {
    if !is_known_index(index) {
        return Err(QueryError::UnknownIndex(index.to_string()));
    }
    request.validate()?;

    let expression = match_expression(request)?;
    let signature = request.sort_signature();
    let cursor = request
        .cursor_token
        .as_deref()
        .and_then(SortCursor::decode)
        .filter(|c| c.matches(request.page, &signature));

    // Filter shared by the count and the page query
    let mut params = SqlParams::default();
    let mut filter = format!("d.index_name = {}", params.bind(SqlValue::Text(index.to_string())));
    if let Some(expression) = &expression {
        filter.push_str(&format!(
            " AND d.doc_key IN (SELECT rowid FROM documents_fts WHERE documents_fts MATCH {})",
            params.bind(SqlValue::Text(expression.clone()))
        ));
    }

    let total_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM documents d WHERE {}", filter),
        params_from_iter(params.0.iter()),
        |row| row.get(0),
    )?;

    let path = params.bind(SqlValue::Text(format!("$.{}", request.sort_field)));
    let sort_expr = format!("COALESCE(json_extract(d.body, {}), '')", path);
    let order = request.sort_order;

    let mut sql = format!(
        "SELECT d.id, d.body, {} AS sort_key FROM documents d WHERE {}",
        sort_expr, filter
    );

    match cursor.as_ref().and_then(|c| Some((c.sort_value()?, c.last_id()?))) {
        Some((value, last_id)) => {
            let value = params.bind(json_to_sql(value));
            let last_id = params.bind(SqlValue::Text(last_id.to_string()));
            sql.push_str(&format!(
                " AND ({}, d.id) {} ({}, {})",
                sort_expr,
                order.after(),
                value,
                last_id
            ));
            sql.push_str(&format!(
                " ORDER BY sort_key {0}, d.id {0} LIMIT {1}",
                order.sql(),
                params.bind(SqlValue::Integer(request.page_size as i64))
            ));
        }
        None => {
            let offset = (request.page as i64 - 1) * request.page_size as i64;
            sql.push_str(&format!(
                " ORDER BY sort_key {0}, d.id {0} LIMIT {1} OFFSET {2}",
                order.sql(),
                params.bind(SqlValue::Integer(request.page_size as i64)),
                params.bind(SqlValue::Integer(offset))
            ));
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.0.iter()), |row| {
            Ok(PageRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sort_key: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let next_cursor = rows.last().map(|last| {
        SortCursor::new(
            request.page.saturating_add(1),
            signature.clone(),
            sql_to_json(last.sort_key.clone()),
            &last.id,
        )
        .encode()
    });
    let has_more = rows.len() == request.page_size as usize;

    let items = rows
        .into_iter()
        .map(|row| {
            let document: Value = serde_json::from_str(&row.body).map_err(|source| {
                QueryError::CorruptDocument {
                    id: row.id.clone(),
                    source,
                }
            })?;
            let highlight = highlight(&document, request);
            Ok(SearchItem {
                id: row.id,
                document,
                highlight,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    let total_count = total_count.max(0) as u64;
    let page_size = request.page_size as u64;

    Ok(SearchResponse {
        items,
        pagination: Pagination {
            current_page: request.page,
            total_pages: (total_count + page_size - 1) / page_size,
            total_count,
            page_size: request.page_size,
            cursor_token: next_cursor,
            has_more,
        },
    })
}
