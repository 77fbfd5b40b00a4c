//! The pseudo-command grammar.
//!
//! One complete input line is tokenized on whitespace and classified by its
//! first word. Verbs match case-insensitively; arguments keep the case the
//! operator typed.

use crate::error::SqlError;

/// Leading words of statements whose table references are qualified. Other
/// statements go to the server as typed, including ones the SQL grammar in
/// use does not know, such as `VACUUM` or `REFRESH MATERIALIZED VIEW`.
const QUALIFIED_VERBS: [&str; 7] = [
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "TABLE", "VALUES",
];

/// A classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SHOW ...`
    Show(ShowTarget),
    /// `DESCRIBE <table>` or `DESC <table>`
    Describe(String),
    /// `USE SCHEMA <s>` or `USE DATABASE <d>`
    Use(UseTarget),
    /// Anything sent to the server as typed.
    PassThrough {
        sql: String,
        /// Whether unqualified tables should be placed in the active schema.
        qualify: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowTarget {
    Schemas,
    Tables,
    Databases,
    CreateTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseTarget {
    Schema(String),
    Database(String),
}

impl Command {
    /// Classify one input line. A trailing `;` is optional.
    pub fn parse(input: &str) -> Result<Self, SqlError> {
        let statement = strip_terminator(input);
        let tokens: Vec<&str> = statement.split_whitespace().collect();

        let Some(first) = tokens.first() else {
            return Err(SqlError::unsupported(""));
        };

        match first.to_ascii_uppercase().as_str() {
            "SHOW" => parse_show(&tokens),
            "DESCRIBE" | "DESC" => match tokens.get(1) {
                Some(table) => Ok(Command::Describe(table.to_string())),
                None => Err(SqlError::missing("DESCRIBE")),
            },
            "USE" => parse_use(&tokens),
            "GRANT" => Ok(Command::PassThrough {
                sql: terminated(statement),
                qualify: false,
            }),
            verb @ ("CREATE" | "ALTER") => {
                if tokens.len() < 3 {
                    return Err(SqlError::missing(verb));
                }
                Ok(Command::PassThrough {
                    sql: terminated(statement),
                    qualify: tokens[1].eq_ignore_ascii_case("TABLE"),
                })
            }
            verb => Ok(Command::PassThrough {
                sql: terminated(statement),
                qualify: is_qualified_verb(verb),
            }),
        }
    }
}

fn parse_show(tokens: &[&str]) -> Result<Command, SqlError> {
    let Some(sub) = tokens.get(1) else {
        return Err(SqlError::missing("SHOW"));
    };

    let target = match sub.to_ascii_uppercase().as_str() {
        "SCHEMAS" => ShowTarget::Schemas,
        "TABLES" => ShowTarget::Tables,
        "DATABASES" => ShowTarget::Databases,
        "CREATE" => {
            match tokens.get(2) {
                Some(kind) if kind.eq_ignore_ascii_case("TABLE") => {}
                Some(kind) => return Err(SqlError::unsupported(&format!("SHOW CREATE {kind}"))),
                None => return Err(SqlError::missing("SHOW CREATE TABLE")),
            }
            match tokens.get(3) {
                Some(table) => ShowTarget::CreateTable(table.to_string()),
                None => return Err(SqlError::missing("SHOW CREATE TABLE")),
            }
        }
        other => return Err(SqlError::unsupported(&format!("SHOW {other}"))),
    };
    Ok(Command::Show(target))
}

fn parse_use(tokens: &[&str]) -> Result<Command, SqlError> {
    let Some(sub) = tokens.get(1) else {
        return Err(SqlError::missing("USE"));
    };

    let sub = sub.to_ascii_uppercase();
    let name = tokens.get(2).map(|s| s.to_string());
    match (sub.as_str(), name) {
        ("SCHEMA", Some(name)) => Ok(Command::Use(UseTarget::Schema(name))),
        ("DATABASE", Some(name)) => Ok(Command::Use(UseTarget::Database(name))),
        ("SCHEMA" | "DATABASE", None) => Err(SqlError::missing(&format!("USE {sub}"))),
        (other, _) => Err(SqlError::unsupported(&format!("USE {other}"))),
    }
}

/// Drop surrounding whitespace and any trailing semicolons.
pub fn strip_terminator(input: &str) -> &str {
    input.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// `verb` is an upper-cased first token. A parenthesized query such as
/// `(SELECT ...) UNION ...` counts by its first word.
fn is_qualified_verb(verb: &str) -> bool {
    let word = verb.trim_start_matches('(');
    let word = word.split('(').next().unwrap_or(word);
    QUALIFIED_VERBS.contains(&word)
}

fn terminated(statement: &str) -> String {
    format!("{statement};")
}

/// True for the reserved words that end the session.
pub fn is_exit(input: &str) -> bool {
    let word = strip_terminator(input);
    word.eq_ignore_ascii_case("exit") || word.eq_ignore_ascii_case("quit")
}

/// True for the reserved word that prints the command catalog.
pub fn is_help(input: &str) -> bool {
    strip_terminator(input).eq_ignore_ascii_case("help")
}
