//! Catalog type definitions.
//!
//! Defines [`Table`] (a schema-qualified table identity), [`Relationship`]
//! (a foreign key from a child table into its parent), and [`TemporalTable`]
//! (a system-versioned table paired with its history table).

use serde::Serialize;

/// A table identity, optionally namespaced by schema.
///
/// Equality, hashing and ordering are by `(schema, name)`. Engines without
/// schema namespacing (SQLite) leave `schema` as `None`, which sorts before
/// every named schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Table {
    /// Owning schema, or `None` for schema-less engines.
    pub schema: Option<String>,
    /// Unquoted table name.
    pub name: String,
}

impl Table {
    pub fn new(schema: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(Into::into),
            name: name.into(),
        }
    }

    /// A table with no schema.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Whether `self`, used as a filter, selects `other`.
    ///
    /// A filter without a schema matches the name in every schema.
    pub fn matches(&self, other: &Table) -> bool {
        self.matches_by(other, |a, b| a == b)
    }

    /// [`Table::matches`] with names compared without regard to ASCII case.
    pub fn matches_ignore_case(&self, other: &Table) -> bool {
        self.matches_by(other, |a, b| a.eq_ignore_ascii_case(b))
    }

    fn matches_by(&self, other: &Table, same: impl Fn(&str, &str) -> bool) -> bool {
        same(&self.name, &other.name)
            && match (&self.schema, &other.schema) {
                (None, _) => true,
                (Some(filter), Some(schema)) => same(filter, schema),
                (Some(_), None) => false,
            }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl std::str::FromStr for Table {
    type Err = String;

    /// Parses `schema.name` or a bare `name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (schema, name) = match s.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, s),
        };

        if name.is_empty() || schema.is_some_and(str::is_empty) {
            return Err(format!("invalid table name: {s:?}"));
        }

        Ok(Table::new(schema, name))
    }
}

/// A foreign key: `child` holds a reference into `parent`.
///
/// Identity is the full `(parent, child, name)` tuple, so a composite key
/// reported once per column collapses to a single relationship in a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Relationship {
    /// The referenced table.
    pub parent: Table,
    /// The table holding the foreign key columns.
    pub child: Table,
    /// Constraint name as reported by the engine.
    pub name: String,
}

impl Relationship {
    pub fn new(parent: Table, child: Table, name: impl Into<String>) -> Self {
        Self {
            parent,
            child,
            name: name.into(),
        }
    }

    /// A relationship whose child and parent are the same table.
    pub fn is_self_referencing(&self) -> bool {
        self.parent == self.child
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({})", self.child, self.parent, self.name)
    }
}

/// A system-versioned table and the history table that records its prior rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TemporalTable {
    pub schema: Option<String>,
    pub name: String,
    pub history_schema: String,
    pub history_name: String,
}

impl TemporalTable {
    pub fn new(
        schema: Option<impl Into<String>>,
        name: impl Into<String>,
        history_schema: impl Into<String>,
        history_name: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.map(Into::into),
            name: name.into(),
            history_schema: history_schema.into(),
            history_name: history_name.into(),
        }
    }

    /// The versioned table itself.
    pub fn table(&self) -> Table {
        Table {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }

    /// The paired history table.
    pub fn history_table(&self) -> Table {
        Table::new(Some(self.history_schema.as_str()), self.history_name.as_str())
    }
}
