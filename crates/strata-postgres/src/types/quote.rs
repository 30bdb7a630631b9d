//! Quoting helpers for dynamically built SQL.
//!
//! Prefer bound parameters whenever the statement accepts them. These helpers
//! exist for the places where PostgreSQL does not accept parameters, such as
//! the channel name of a `LISTEN` command.

use std::sync::LazyLock;

use regex::Regex;

/// Identifiers that PostgreSQL accepts without quotes.
static SIMPLE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$").expect("simple identifier pattern is valid")
});

/// Quotes a string literal, doubling embedded single quotes.
///
/// ```
/// use strata_postgres::quote_string;
///
/// assert_eq!(quote_string("it's"), "'it''s'");
/// ```
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quotes an identifier if it is not a simple identifier.
///
/// Simple identifiers (a letter or underscore followed by letters, digits,
/// underscores or dollar signs) are returned unchanged; anything else is
/// wrapped in double quotes with embedded double quotes doubled.
///
/// ```
/// use strata_postgres::quote_identifier;
///
/// assert_eq!(quote_identifier("events"), "events");
/// assert_eq!(quote_identifier("job events"), "\"job events\"");
/// ```
pub fn quote_identifier(s: &str) -> String {
    if SIMPLE_IDENTIFIER.is_match(s) {
        return s.to_owned();
    }

    quote_channel(s)
}

/// Quotes a notification channel name.
///
/// Always wraps the name in double quotes with embedded double quotes
/// doubled, so `LISTEN` matches the exact name passed to `pg_notify`: case
/// is preserved and reserved words such as `user` are accepted.
///
/// ```
/// use strata_postgres::quote_channel;
///
/// assert_eq!(quote_channel("Jobs"), "\"Jobs\"");
/// assert_eq!(quote_channel("user"), "\"user\"");
/// ```
pub fn quote_channel(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
