//! SQL dialects: identifier quoting, literal rendering and identity retrieval.
//!
//! All SQL the engine emits is plain text with inlined literals, so this
//! module is the single place where a [`Value`] becomes SQL. Each backend
//! reports its [`Dialect`] and everything above this layer stays
//! dialect-agnostic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The SQL flavors the engine knows how to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Plain SQL-92 with no identity support.
    #[default]
    #[serde(alias = "sql92", alias = "gadfly")]
    Generic,
    #[serde(alias = "pgsql", alias = "postgresql")]
    Postgres,
    MySql,
    #[serde(alias = "sqlite3")]
    Sqlite,
    Firebird,
}

/// How a dialect obtains the value of a freshly generated identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRetrieval {
    /// Ask a sequence for the next value before the INSERT.
    PrefetchSequence,
    /// Run the INSERT, then select the row by a "last id" expression.
    PostInsertQuery,
    /// The dialect has no way to generate identities.
    Unsupported,
}

/// Words that always need quoting when used as identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "default", "delete", "desc", "distinct", "drop", "else",
    "end", "foreign", "from", "grant", "group", "having", "in", "index", "insert",
    "into", "is", "join", "key", "like", "limit", "not", "null", "offset", "on", "or",
    "order", "primary", "references", "select", "set", "table", "then", "to", "union",
    "unique", "update", "user", "values", "when", "where",
];

impl Dialect {
    /// Resolves an adapter name as used in connection strings.
    pub fn from_adapter(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "generic" | "sql92" | "gadfly" => Some(Dialect::Generic),
            "pgsql" | "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" => Some(Dialect::MySql),
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            "firebird" => Some(Dialect::Firebird),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Firebird => "firebird",
        }
    }

    /// Always-quoted identifier: backticks for MySQL, double quotes elsewhere.
    pub fn quote_identifier(self, name: &str) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            _ => '"',
        };
        let mut out = String::with_capacity(name.len() + 2);
        out.push(quote);
        for c in name.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Renders an identifier, quoting it only when it is not a plain,
    /// non-reserved name.
    pub fn identifier(self, name: &str) -> String {
        if is_plain_identifier(name) {
            name.to_string()
        } else {
            self.quote_identifier(name)
        }
    }

    /// Quotes and escapes a string literal.
    ///
    /// MySQL interprets backslash escapes inside literals, so backslashes and
    /// control characters are escaped there. Every other dialect only
    /// doubles single quotes.
    pub fn string_literal(self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        match self {
            Dialect::MySql => {
                for c in s.chars() {
                    match c {
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\x1a' => out.push_str("\\Z"),
                        c => out.push(c),
                    }
                }
            }
            _ => {
                for c in s.chars() {
                    if c == '\'' {
                        out.push('\'');
                    }
                    out.push(c);
                }
            }
        }
        out.push('\'');
        out
    }

    pub fn binary_literal(self, bytes: &[u8]) -> String {
        match self {
            Dialect::Postgres => format!("'\\x{}'", hex::encode(bytes)),
            _ => format!("X'{}'", hex::encode_upper(bytes)),
        }
    }

    /// Renders any value as a literal of this dialect.
    pub fn literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Double(v) if v.is_nan() => self.string_literal("NaN"),
            Value::Double(v) if v.is_infinite() => {
                self.string_literal(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Double(v) => format!("{v:?}"),
            Value::Text(s) => self.string_literal(s),
            Value::Bytes(b) => self.binary_literal(b),
            Value::Date(d) => self.string_literal(&d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => self.string_literal(&t.format("%H:%M:%S%.f").to_string()),
            Value::Timestamp(ts) => {
                self.string_literal(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            Value::Json(j) => self.string_literal(&j.to_string()),
        }
    }

    pub const fn identity_retrieval(self) -> IdentityRetrieval {
        match self {
            Dialect::Postgres | Dialect::Firebird => IdentityRetrieval::PrefetchSequence,
            Dialect::MySql | Dialect::Sqlite => IdentityRetrieval::PostInsertQuery,
            Dialect::Generic => IdentityRetrieval::Unsupported,
        }
    }

    /// The conventional sequence (or generator) backing `table.column`.
    pub fn default_sequence_name(self, table: &str, column: &str) -> String {
        match self {
            Dialect::Firebird => format!("GEN_PK_{}", table.to_ascii_uppercase()),
            _ => format!("{table}_{column}_seq"),
        }
    }

    /// Query returning the next value of `sequence` as a one-row, one-column
    /// result, for dialects with sequences.
    pub fn next_value_query(self, sequence: &str) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!("SELECT nextval({})", self.string_literal(sequence))),
            Dialect::Firebird => Some(format!(
                "SELECT GEN_ID({}, 1) FROM RDB$DATABASE",
                self.identifier(sequence)
            )),
            _ => None,
        }
    }

    /// Expression yielding the identity generated by the last INSERT on this
    /// connection.
    pub fn last_identity_expression(self, sequence: &str) -> Option<String> {
        match self {
            Dialect::MySql => Some("LAST_INSERT_ID()".to_string()),
            Dialect::Sqlite => Some("last_insert_rowid()".to_string()),
            Dialect::Postgres => Some(format!("currval({})", self.string_literal(sequence))),
            Dialect::Generic | Dialect::Firebird => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name.to_ascii_lowercase().as_str())
}
