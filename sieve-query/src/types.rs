//! Ordering and projection types used in query building.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::sql::quote_qualified;

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Order by specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The column name to order by.
    pub column: Cow<'static, str>,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: impl Into<Cow<'static, str>>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }

    /// Create an ascending order.
    pub fn asc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Desc)
    }

    /// Write the SQL directly to a buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sieve_query::types::OrderByField;
    ///
    /// let field = OrderByField::desc("authors.name");
    /// let mut buffer = String::from("ORDER BY ");
    /// field.write_sql(&mut buffer);
    /// assert_eq!(buffer, "ORDER BY authors.name DESC");
    /// ```
    #[inline]
    pub fn write_sql(&self, buffer: &mut String) {
        buffer.push_str(&quote_qualified(&self.column));
        buffer.push(' ');
        buffer.push_str(self.order.as_sql());
    }
}

/// Ordered list of sort fields; empty means "no explicit ordering".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBy {
    fields: Vec<OrderByField>,
}

impl OrderBy {
    /// Create an empty order by (no ordering).
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if the order by is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The sort fields in priority order.
    pub fn fields(&self) -> &[OrderByField] {
        &self.fields
    }

    /// Generate the SQL ORDER BY clause (without the "ORDER BY" keyword).
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            field.write_sql(&mut sql);
        }
        sql
    }
}

impl From<OrderByField> for OrderBy {
    fn from(field: OrderByField) -> Self {
        Self { fields: vec![field] }
    }
}

impl From<Vec<OrderByField>> for OrderBy {
    fn from(fields: Vec<OrderByField>) -> Self {
        Self { fields }
    }
}

/// Column list of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Select {
    /// Select all fields.
    #[default]
    All,
    /// Select specific fields.
    Fields(Vec<String>),
}

impl Select {
    /// Create a selection for specific fields.
    pub fn fields(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// The selected columns; empty for [`Select::All`].
    pub fn columns(&self) -> &[String] {
        match self {
            Self::All => &[],
            Self::Fields(fields) => fields,
        }
    }

    /// Generate the SQL column list.
    pub fn to_sql(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Fields(fields) => fields
                .iter()
                .map(|f| quote_qualified(f))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_chain() {
        let order = OrderBy::from(vec![OrderByField::asc("authors.name"), OrderByField::desc("authors.id")]);
        assert_eq!(order.to_sql(), "authors.name ASC, authors.id DESC");
        assert_eq!(order.fields().len(), 2);
    }

    #[test]
    fn test_order_by_none() {
        assert!(OrderBy::none().is_empty());
        assert_eq!(OrderBy::none().to_sql(), "");
    }

    #[test]
    fn test_select_fields() {
        assert_eq!(Select::All.to_sql(), "*");
        assert!(Select::All.columns().is_empty());
        let select = Select::fields(["authors.name", "user.id"]);
        assert_eq!(select.to_sql(), "authors.name, \"user\".id");
        assert_eq!(select.columns().len(), 2);
    }
}
