use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use tracing::trace;

use crate::parser::BindParameter;
use crate::record::Parameters;
use crate::value::Value;

/// Type alias for SQLx Query with SQLite arguments
pub type Q<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds one engine primitive at the next position.
pub fn bind_value(query: Q<'_>, value: Value) -> Q<'_> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(i) => query.bind(i),
        Value::Real(f) => query.bind(f),
        Value::Text(text) => query.bind(text),
        Value::Blob(bytes) => query.bind(bytes),
    }
}

/// Resolves every placeholder from `carrier` and binds it, in index order.
///
/// `sql` is the caller's SQL text and only appears in error reports.
///
/// # Errors
///
/// Returns [`Error::Bind`](crate::Error::Bind) when placeholders exist but no
/// carrier was supplied, when the carrier has no property of a placeholder's
/// name, or when a property value cannot be encoded.
pub fn bind_parameters<'q, P>(
    mut query: Q<'q>,
    parameters: &[BindParameter],
    carrier: &P,
    sql: &str,
) -> crate::Result<Q<'q>>
where
    P: Parameters + ?Sized,
{
    let Some(first) = parameters.first() else {
        return Ok(query);
    };
    if !carrier.is_present() {
        return Err(crate::Error::Bind {
            name: first.name.clone(),
            reason: "no parameter carrier was supplied".to_owned(),
            sql: sql.to_owned(),
        });
    }

    for parameter in parameters {
        let value = carrier
            .property(&parameter.name)
            .map_err(|e| crate::Error::Bind {
                name: parameter.name.clone(),
                reason: e.to_string(),
                sql: sql.to_owned(),
            })?
            .ok_or_else(|| crate::Error::Bind {
                name: parameter.name.clone(),
                reason: "parameter carrier has no such property".to_owned(),
                sql: sql.to_owned(),
            })?;
        trace!(
            index = parameter.index,
            name = %parameter.name,
            ty = %value.value_type(),
            "binding parameter"
        );
        query = bind_value(query, value);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Params;

    fn parameters(names: &[&str]) -> Vec<BindParameter> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| BindParameter {
                index: i + 1,
                name: (*name).to_owned(),
            })
            .collect()
    }

    #[test]
    fn test_no_placeholders_needs_no_carrier() {
        let query = sqlx::query::<Sqlite>("SELECT 1");
        assert!(bind_parameters(query, &[], &(), "SELECT 1").is_ok());
    }

    #[test]
    fn test_missing_carrier_fails() {
        let query = sqlx::query::<Sqlite>("SELECT ?");
        let err = bind_parameters(query, &parameters(&["id"]), &(), "SELECT :id").err().unwrap();
        match err {
            crate::Error::Bind { name, reason, sql } => {
                assert_eq!(name, "id");
                assert!(reason.contains("no parameter carrier"));
                assert_eq!(sql, "SELECT :id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_property_names_it() {
        let query = sqlx::query::<Sqlite>("SELECT ?, ?");
        let params = Params::new().set("a", 1);
        let err = bind_parameters(query, &parameters(&["a", "b"]), &params, "SELECT :a, :b")
            .err().unwrap();
        assert!(matches!(err, crate::Error::Bind { ref name, .. } if name == "b"));
        assert_eq!(err.kind(), crate::ErrorKind::Bind);
    }

    #[test]
    fn test_unencodable_value_fails() {
        let query = sqlx::query::<Sqlite>("SELECT ?");
        let params = Params::new().set("n", u64::MAX);
        let err = bind_parameters(query, &parameters(&["n"]), &params, "SELECT :n").err().unwrap();
        assert!(matches!(err, crate::Error::Bind { ref reason, .. } if reason.contains("out of range")));
    }
}
