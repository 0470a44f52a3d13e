use crate::error::{Error, Result};

/// Queryable fields. Everything except `status` translates to a column of
/// the joined view; `status` only exists after live-state hydration.
const FIELDS: &[&str] = &[
    "id",
    "command",
    "preamble",
    "node_id",
    "node_name",
    "created_at",
    "updated_at",
    "parents",
    "children",
    "status",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Contains,
}

/// One parsed `<field><op><value>` token. `=` is exact, `~` is substring.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn sql_clause(&self) -> String {
        match self.op {
            FilterOp::Eq => format!("{} = ?", self.field),
            FilterOp::Contains => format!("{} LIKE ?", self.field),
        }
    }

    pub fn sql_param(&self) -> String {
        match self.op {
            FilterOp::Eq => self.value.clone(),
            FilterOp::Contains => format!("%{}%", self.value),
        }
    }

    pub fn matches_status(&self, status: &str) -> bool {
        match self.op {
            FilterOp::Eq => status.eq_ignore_ascii_case(&self.value),
            FilterOp::Contains => status
                .to_ascii_lowercase()
                .contains(&self.value.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFilters {
    /// Filters pushed into the store query as bound parameters.
    pub sql: Vec<Filter>,
    /// A `status` filter, applied after live-state lookup.
    pub status: Option<Filter>,
}

/// Parses filter tokens like `node_id=123456` or `command~train`. Field names
/// outside the allowlist and tokens without an operator are rejected; values
/// are never spliced into SQL.
pub fn parse(tokens: &[String]) -> Result<ParsedFilters> {
    let mut parsed = ParsedFilters::default();

    for token in tokens {
        let eq = token.find('=');
        let tilde = token.find('~');
        let (index, op) = match (eq, tilde) {
            (Some(e), Some(t)) if t < e => (t, FilterOp::Contains),
            (Some(e), _) => (e, FilterOp::Eq),
            (None, Some(t)) => (t, FilterOp::Contains),
            (None, None) => {
                return Err(Error::InvalidFilter(format!(
                    "`{token}` has no `=` or `~` operator"
                )));
            }
        };

        let field = &token[..index];
        let value = &token[index + 1..];
        if !FIELDS.contains(&field) {
            return Err(Error::InvalidFilter(format!("unknown field `{field}`")));
        }

        let filter = Filter {
            field: field.to_string(),
            op,
            value: value.to_string(),
        };
        if filter.field == "status" {
            parsed.status = Some(filter);
        } else {
            parsed.sql.push(filter);
        }
    }

    Ok(parsed)
}
