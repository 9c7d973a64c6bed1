use regex::Regex;

/// Tokens that matter when rewriting placeholders.
///
/// Literals, quoted identifiers and comments are matched whole so that a
/// `:name` inside them is never taken for a placeholder. Unterminated regions
/// run to the end of the text.
const TOKEN_PATTERN: &str = concat!(
    r"(?s)",
    r"'(?:[^']|'')*(?:'|$)",
    r#"|"(?:[^"]|"")*(?:"|$)"#,
    r"|`[^`]*(?:`|$)",
    r"|\[[^\]]*(?:\]|$)",
    r"|--[^\n]*",
    r"|/\*.*?(?:\*/|$)",
    r"|:([A-Za-z_][A-Za-z0-9_]*)?",
);

/// One placeholder occurrence, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindParameter {
    /// 1-based position of the rewritten `?`.
    pub index: usize,
    pub name: String,
}

/// SQL with its named placeholders rewritten to positional ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    template: String,
    sql: String,
    parameters: Vec<BindParameter>,
}

impl ParsedSql {
    /// The SQL as written by the caller.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The SQL handed to SQLite.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[BindParameter] {
        &self.parameters
    }
}

/// Converts named placeholders (`:name`) to positional placeholders (`?`) for SQLite.
///
/// # Examples
///
/// ```
/// use sqlx_named_mapper::NamedParameterParser;
///
/// let parser = NamedParameterParser::new()?;
/// let parsed = parser.parse("SELECT * FROM person WHERE name = :name AND note <> ':skip'")?;
/// assert_eq!(parsed.sql(), "SELECT * FROM person WHERE name = ? AND note <> ':skip'");
/// assert_eq!(parsed.parameters().len(), 1);
/// assert_eq!(parsed.parameters()[0].name, "name");
/// # Ok::<(), sqlx_named_mapper::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct NamedParameterParser {
    tokens: Regex,
}

impl NamedParameterParser {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            tokens: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Rewrites `template` and lists its placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) when a `:` outside a
    /// literal or comment is not followed by an identifier.
    pub fn parse(&self, template: &str) -> crate::Result<ParsedSql> {
        let mut sql = String::with_capacity(template.len());
        let mut parameters = Vec::new();
        let mut copied = 0;

        for caps in self.tokens.captures_iter(template) {
            let Some(token) = caps.get(0) else { continue };
            if !token.as_str().starts_with(':') {
                continue;
            }
            let Some(name) = caps.get(1) else {
                return Err(crate::Error::Parse {
                    position: token.start(),
                    sql: template.to_owned(),
                });
            };
            sql.push_str(&template[copied..token.start()]);
            sql.push('?');
            copied = token.end();
            parameters.push(BindParameter {
                index: parameters.len() + 1,
                name: name.as_str().to_owned(),
            });
        }
        sql.push_str(&template[copied..]);

        Ok(ParsedSql {
            template: template.to_owned(),
            sql,
            parameters,
        })
    }
}

/// Converts named placeholders (`:name`) to positional placeholders (`?`).
///
/// # Examples
///
/// ```
/// use sqlx_named_mapper::parser::build_query;
///
/// let sql = build_query("SELECT * FROM users WHERE id = :id AND name = :name")?;
/// assert_eq!(sql, "SELECT * FROM users WHERE id = ? AND name = ?");
/// # Ok::<(), sqlx_named_mapper::Error>(())
/// ```
pub fn build_query(template: &str) -> crate::Result<String> {
    let parsed = NamedParameterParser::new()?.parse(template)?;
    Ok(parsed.sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(template: &str) -> crate::Result<ParsedSql> {
        NamedParameterParser::new().unwrap().parse(template)
    }

    fn names(parsed: &ParsedSql) -> Vec<&str> {
        parsed.parameters().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_build_query_single_param() {
        let result = build_query("SELECT * FROM users WHERE id = :id").unwrap();
        assert_eq!(result, "SELECT * FROM users WHERE id = ?");
    }

    #[test]
    fn test_build_query_multiple_params() {
        let result = build_query("SELECT * FROM users WHERE id = :id AND name = :name").unwrap();
        assert_eq!(result, "SELECT * FROM users WHERE id = ? AND name = ?");
    }

    #[test]
    fn test_build_query_no_params() {
        let parsed = parse("SELECT * FROM users").unwrap();
        assert_eq!(parsed.sql(), "SELECT * FROM users");
        assert!(parsed.parameters().is_empty());
    }

    #[test]
    fn test_repeated_params_are_independent_positions() {
        let parsed = parse("SELECT * FROM users WHERE id = :id OR user_id = :id").unwrap();
        assert_eq!(parsed.sql(), "SELECT * FROM users WHERE id = ? OR user_id = ?");
        assert_eq!(
            parsed.parameters(),
            &[
                BindParameter { index: 1, name: "id".into() },
                BindParameter { index: 2, name: "id".into() },
            ]
        );
    }

    #[test]
    fn test_indices_follow_occurrence_order() {
        let parsed =
            parse("INSERT INTO person (name, age, dateOfBirth) VALUES (:name, :age, :dateOfBirth)")
                .unwrap();
        let indices: Vec<usize> = parsed.parameters().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(names(&parsed), vec!["name", "age", "dateOfBirth"]);
        assert_eq!(parsed.template(), "INSERT INTO person (name, age, dateOfBirth) VALUES (:name, :age, :dateOfBirth)");
    }

    #[test]
    fn test_with_underscores() {
        let parsed = parse("SELECT * FROM users WHERE user_id = :user_id").unwrap();
        assert_eq!(parsed.sql(), "SELECT * FROM users WHERE user_id = ?");
        assert_eq!(names(&parsed), vec!["user_id"]);
    }

    #[test]
    fn test_literals_and_comments_are_skipped() {
        let parsed = parse(
            "SELECT ':a', 'it''s :b', \"col:c\", [x:d], `y:e` -- :f\n\
             FROM t /* :g */ WHERE v = :h",
        )
        .unwrap();
        assert_eq!(names(&parsed), vec!["h"]);
        assert!(parsed.sql().ends_with("WHERE v = ?"));
        assert!(parsed.sql().contains("'it''s :b'"));
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        let parsed = parse("SELECT :a, 'never closed :b").unwrap();
        assert_eq!(names(&parsed), vec!["a"]);
    }

    #[test]
    fn test_sigil_without_identifier_fails() {
        let err = parse("SELECT * FROM t WHERE a = : AND b = :b").unwrap_err();
        assert!(matches!(err, crate::Error::Parse { position: 26, .. }));

        assert!(parse("SELECT a::text FROM t").is_err());
        assert!(parse("SELECT * FROM t WHERE a = :1").is_err());
    }
}
