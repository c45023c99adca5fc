//! In-memory driver for testing.

use super::{Connection, Credentials, Driver, PreparedStatement};
use crate::config::ConnectOptions;
use crate::dsn::DataSource;
use crate::error::{CoreError, CoreResult};

/// Hosts the memory driver treats as reachable.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Statement verbs the memory driver accepts.
const VERBS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "REPLACE", "WITH", "SHOW", "DESCRIBE", "DESC",
    "EXPLAIN", "CREATE", "DROP", "ALTER", "TRUNCATE", "SET", "CALL", "DO",
];

/// A driver that needs no server.
///
/// This driver is suitable for:
/// - Unit and integration tests of the gateway and the C ABI
/// - Binding authors who want to exercise the API without MySQL
///
/// It behaves like a local server with no tables: only `localhost`,
/// `127.0.0.1` and `::1` are reachable, an empty user is refused,
/// and prepare performs a shallow syntax check. `SELECT` statements report
/// result columns named after their select list.
#[derive(Debug, Default)]
pub struct MemoryDriver;

impl MemoryDriver {
    /// Creates a new memory driver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(
        &self,
        source: &DataSource,
        credentials: &Credentials,
        _options: &ConnectOptions,
    ) -> CoreResult<Box<dyn Connection>> {
        if !LOCAL_HOSTS.contains(&source.host.as_str()) {
            return Err(CoreError::connection(format!(
                "unknown host `{}`",
                source.host
            )));
        }
        if credentials.user.is_empty() {
            return Err(CoreError::connection("access denied for empty user"));
        }

        Ok(Box::new(MemoryConnection {
            in_transaction: false,
            next_statement_id: 1,
        }))
    }
}

/// A session of the [`MemoryDriver`].
#[derive(Debug)]
struct MemoryConnection {
    in_transaction: bool,
    next_statement_id: u32,
}

impl Connection for MemoryConnection {
    fn begin(&mut self) -> CoreResult<()> {
        if self.in_transaction {
            return Err(CoreError::transaction("transaction already active"));
        }
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        if !std::mem::replace(&mut self.in_transaction, false) {
            return Err(CoreError::transaction("no transaction"));
        }
        Ok(())
    }

    fn rollback(&mut self) -> CoreResult<()> {
        if !std::mem::replace(&mut self.in_transaction, false) {
            return Err(CoreError::transaction("no transaction"));
        }
        Ok(())
    }

    fn prepare(&mut self, query: &str) -> CoreResult<Box<dyn PreparedStatement>> {
        let (columns, param_count) = analyze(query)?;
        let id = self.next_statement_id;
        self.next_statement_id = self.next_statement_id.wrapping_add(1).max(1);
        Ok(Box::new(MemoryStatement {
            id,
            columns,
            param_count,
        }))
    }

    fn ping(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryStatement {
    id: u32,
    columns: Vec<String>,
    param_count: usize,
}

impl PreparedStatement for MemoryStatement {
    fn id(&self) -> u32 {
        self.id
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn param_count(&self) -> usize {
        self.param_count
    }
}

/// Checks a query and returns its result columns and parameter count.
fn analyze(query: &str) -> CoreResult<(Vec<String>, usize)> {
    let query = query.trim().trim_end_matches(';').trim_end();
    if query.is_empty() {
        return Err(CoreError::prepare("query was empty"));
    }

    let verb_len = query
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(query.len());
    let verb = query[..verb_len].to_ascii_uppercase();
    if !VERBS.contains(&verb.as_str()) {
        let near: String = query.chars().take(32).collect();
        return Err(CoreError::prepare(format!(
            "syntax error near '{near}'"
        )));
    }

    let chars = unquoted(query)?;
    let param_count = chars.iter().filter(|(_, c, _)| *c == '?').count();

    let columns = if verb == "SELECT" {
        select_columns(&query[verb_len..])?
    } else {
        Vec::new()
    };
    Ok((columns, param_count))
}

/// Characters outside quoted sections with their byte offset and paren depth.
fn unquoted(text: &str) -> CoreResult<Vec<(usize, char, u32)>> {
    let mut out = Vec::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0u32;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push((i, c, depth));
    }

    if quote.is_some() {
        return Err(CoreError::prepare("unterminated quoted string"));
    }
    Ok(out)
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Byte offset of the first top-level, unquoted occurrence of `word`.
fn find_keyword(text: &str, word: &str) -> CoreResult<Option<usize>> {
    let chars = unquoted(text)?;
    for &(i, c, depth) in &chars {
        if depth != 0 || !c.is_ascii_alphabetic() {
            continue;
        }
        let before_ok = text[..i].chars().next_back().map_or(true, |p| !is_ident(p));
        let candidate = text.get(i..i + word.len());
        let after_ok = text[i..]
            .get(word.len()..)
            .and_then(|rest| rest.chars().next())
            .map_or(true, |n| !is_ident(n));
        if before_ok && after_ok && candidate.is_some_and(|w| w.eq_ignore_ascii_case(word)) {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn select_columns(list: &str) -> CoreResult<Vec<String>> {
    let list = match find_keyword(list, "from")? {
        Some(end) => &list[..end],
        None => list,
    };
    let mut list = list.trim();
    for modifier in ["distinct", "all"] {
        if find_keyword(list, modifier)? == Some(0) {
            list = list[modifier.len()..].trim_start();
        }
    }
    if list.is_empty() {
        return Err(CoreError::prepare("empty select list"));
    }

    let commas: Vec<usize> = unquoted(list)?
        .into_iter()
        .filter(|(_, c, depth)| *c == ',' && *depth == 0)
        .map(|(i, _, _)| i)
        .collect();

    let mut columns = Vec::with_capacity(commas.len() + 1);
    let mut start = 0;
    for end in commas.into_iter().chain(std::iter::once(list.len())) {
        let item = list[start..end].trim();
        if item.is_empty() {
            return Err(CoreError::prepare("empty item in select list"));
        }
        columns.push(column_name(item)?);
        start = end + 1;
    }
    Ok(columns)
}

fn column_name(item: &str) -> CoreResult<String> {
    if let Some(at) = find_keyword(item, "as")? {
        let alias = item[at + 2..].trim();
        if alias.is_empty() {
            return Err(CoreError::prepare("missing alias after AS"));
        }
        return Ok(strip_quotes(alias).to_string());
    }

    let is_path = item
        .chars()
        .all(|c| is_ident(c) || c == '.' || c == '`');
    if is_path {
        let last = item.rsplit('.').next().unwrap_or(item);
        return Ok(strip_quotes(last).to_string());
    }
    Ok(item.to_string())
}

fn strip_quotes(text: &str) -> &str {
    for q in ['`', '"', '\''] {
        if let Some(inner) = text.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            return inner;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn connect(dsn: &str, user: &str) -> CoreResult<Box<dyn Connection>> {
        let source = DataSource::parse(dsn)?;
        MemoryDriver::new().connect(
            &source,
            &Credentials::new(user, "secret"),
            &ConnectOptions::default(),
        )
    }

    #[test]
    fn connects_to_local_hosts() {
        assert!(connect("dbi:memory:database=test", "test").is_ok());
        assert!(connect("dbi:memory:host=127.0.0.1", "test").is_ok());
    }

    #[test]
    fn unreachable_host_is_connection_error() {
        let err = connect("dbi:memory:database=test;host=10.0.0.15", "test")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.to_string().contains("10.0.0.15"));
    }

    #[test]
    fn empty_user_is_refused() {
        let err = connect("dbi:memory:", "").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn transaction_state() {
        let mut conn = connect("dbi:memory:", "test").unwrap();
        assert_eq!(conn.commit().unwrap_err().kind(), ErrorKind::Transaction);
        conn.begin().unwrap();
        assert_eq!(conn.begin().unwrap_err().kind(), ErrorKind::Transaction);
        conn.rollback().unwrap();
        conn.begin().unwrap();
        conn.commit().unwrap();
        assert!(conn.rollback().is_err());
    }

    #[test]
    fn prepare_select_literal() {
        let mut conn = connect("dbi:memory:", "test").unwrap();
        let stmt = conn.prepare("SELECT 42").unwrap();
        assert_eq!(stmt.columns(), ["42".to_string()]);
        assert_eq!(stmt.param_count(), 0);
        assert_eq!(stmt.id(), 1);

        let next = conn.prepare("select 1").unwrap();
        assert_eq!(next.id(), 2);
    }

    #[test]
    fn select_list_names() {
        let (columns, params) = analyze(
            "SELECT DISTINCT t.id, `name`, COUNT(*) AS total, CONCAT(a, ',', b) \
             FROM t WHERE x = ? AND y = '?'",
        )
        .unwrap();
        assert_eq!(columns, ["id", "name", "total", "CONCAT(a, ',', b)"]);
        assert_eq!(params, 1);
    }

    #[test]
    fn from_inside_identifier_is_not_a_keyword() {
        let (columns, _) = analyze("SELECT fromage, x_from FROM cheese").unwrap();
        assert_eq!(columns, ["fromage", "x_from"]);
    }

    #[test]
    fn non_select_has_no_columns() {
        let (columns, params) = analyze("INSERT INTO t (a, b) VALUES (?, ?);").unwrap();
        assert!(columns.is_empty());
        assert_eq!(params, 2);
    }

    #[test]
    fn rejects_bad_queries() {
        for query in [
            "",
            "   ;",
            "SELEC 1",
            "42",
            "SELECT 'open",
            "SELECT FROM t",
            "SELECT a,, b",
            "SELECT a AS",
        ] {
            let err = analyze(query).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Prepare, "accepted `{query}`");
        }
    }
}
