//! Result ordering.

use serde::{Deserialize, Serialize};

/// One ordering field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOrderParameter {
    /// Field name.
    pub name: String,
    /// Ascending when true.
    pub asc: bool,
}

impl QueryOrderParameter {
    /// Parses a field name, `-name` meaning descending.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('-') {
            Some(stripped) => Self {
                name: stripped.to_string(),
                asc: false,
            },
            None => Self {
                name: s.strip_prefix('+').unwrap_or(s).to_string(),
                asc: true,
            },
        }
    }
}

/// An ordered list of ordering fields; earlier fields take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOrder {
    parameters: Vec<QueryOrderParameter>,
}

impl QueryOrder {
    /// Creates an empty order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders ascending by `name`.
    pub fn asc(name: impl Into<String>) -> Self {
        Self::new().add_order_field(name, true)
    }

    /// Orders descending by `name`.
    pub fn desc(name: impl Into<String>) -> Self {
        Self::new().add_order_field(name, false)
    }

    /// Appends an ordering field.
    pub fn add_order_field(mut self, name: impl Into<String>, asc: bool) -> Self {
        self.parameters.push(QueryOrderParameter {
            name: name.into(),
            asc,
        });
        self
    }

    /// Parses a comma-separated list such as `name,-entityModifyDate`.
    pub fn parse(s: &str) -> Self {
        Self {
            parameters: s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(QueryOrderParameter::parse)
                .collect(),
        }
    }

    /// The ordering fields in precedence order.
    pub fn parameters(&self) -> &[QueryOrderParameter] {
        &self.parameters
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
