//! Escape tables compiled into a single pattern.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::fmt;

/// A replacement table applied in one pass.
///
/// Keys are matched in table order, so with overlapping keys the earlier
/// one wins.
#[derive(Clone)]
pub struct Escapes {
    table: IndexMap<String, String>,
    pattern: Option<Regex>,
}

impl Escapes {
    /// Compiles the table.
    pub fn new<I, K, V>(table: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table: IndexMap<String, String> = table
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        let pattern = if table.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = table.keys().map(|key| regex::escape(key)).collect();
            Some(Regex::new(&alternatives.join("|"))?)
        };
        Ok(Self { table, pattern })
    }

    /// The replacement table.
    pub fn table(&self) -> &IndexMap<String, String> {
        &self.table
    }

    /// Replaces every occurrence of a key with its value.
    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            None => text.to_string(),
            Some(pattern) => pattern
                .replace_all(text, |captures: &Captures<'_>| {
                    self.table.get(&captures[0]).cloned().unwrap_or_default()
                })
                .into_owned(),
        }
    }
}

impl PartialEq for Escapes {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl fmt::Debug for Escapes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escapes").field("table", &self.table).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replaces_all_keys() {
        let escapes = Escapes::new([("&", "&amp;"), ("<", "&lt;"), ("\"", "&quot;")]).unwrap();
        assert_eq!(escapes.apply(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;>&amp;");
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let escapes = Escapes::new([(".*", "-")]).unwrap();
        assert_eq!(escapes.apply("a.*b.c"), "a-b.c");
    }

    #[test]
    fn test_empty_table_is_identity() {
        let escapes = Escapes::new(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(escapes.apply("unchanged"), "unchanged");
    }
}
