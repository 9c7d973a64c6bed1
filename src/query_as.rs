use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Statement;

use crate::binder::bind_parameters;
use crate::mapper::{Column, ResultMapper};
use crate::parser::{BindParameter, NamedParameterParser, ParsedSql};
use crate::query::{prepare, Lifecycle, Operation, Stage};
use crate::record::{Parameters, Record};

/// A query with named placeholders whose rows are mapped into `R`.
///
/// `PreparedQueryAs` is similar to [`PreparedQuery`](crate::PreparedQuery)
/// but returns records built from each row through `R`'s binding table. It
/// supports `fetch_all`, `fetch_optional` and row-by-row `fetch_each`.
///
/// # Type Parameters
///
/// * `R` - The result shape, a [`Record`]
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::{Connection, SqliteConnection};
/// use sqlx_named_mapper::{impl_record, Params, PreparedQueryAs};
///
/// #[derive(Debug, Default)]
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// impl_record!(Person { name, age });
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
///
/// let query = PreparedQueryAs::<Person>::new("SELECT * FROM person WHERE age > :minAge")?;
/// let people = query
///     .fetch_all(&mut conn, &Params::new().set("minAge", 20))
///     .await?;
/// for person in people {
///     println!("{} ({})", person.name, person.age);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PreparedQueryAs<R> {
    parsed: ParsedSql,
    _pd: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> PreparedQueryAs<R> {
    /// Creates a new `PreparedQueryAs` from an SQL template.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder in the template is malformed.
    pub fn new(template: impl AsRef<str>) -> crate::Result<Self> {
        NamedParameterParser::new()?.parse(template.as_ref()).map(Self::from_parsed)
    }

    pub fn from_parsed(parsed: ParsedSql) -> Self {
        Self {
            parsed,
            _pd: std::marker::PhantomData,
        }
    }

    pub fn template(&self) -> &str {
        self.parsed.template()
    }

    /// The SQL handed to SQLite.
    pub fn sql(&self) -> &str {
        self.parsed.sql()
    }

    pub fn parameters(&self) -> &[BindParameter] {
        self.parsed.parameters()
    }

    /// Prepares, binds and steps the query, handing each row to `on_row`
    /// until it returns `false` or the rows run out.
    ///
    /// Returns the number of rows stepped.
    async fn for_each_row<P, F>(
        &self,
        conn: &mut SqliteConnection,
        carrier: &P,
        mut on_row: F,
    ) -> crate::Result<usize>
    where
        P: Parameters + ?Sized,
        F: FnMut(&ResultMapper<'_, R>, &SqliteRow) -> crate::Result<bool>,
    {
        let parsed = &self.parsed;
        let mut lifecycle = Lifecycle::new(Operation::Query, parsed.template());
        let statement = prepare(conn, parsed, &mut lifecycle).await?;
        let columns: Vec<Column> = statement.columns().iter().map(Column::from_sqlite).collect();

        let query = bind_parameters(statement.query(), parsed.parameters(), carrier, parsed.template())?;
        lifecycle.advance(Stage::Bound);

        let mapper = ResultMapper::<R>::new(&columns, parsed.template());
        let mut rows = query.fetch(&mut *conn);
        let mut stepped = 0;
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| Operation::Query.engine_failure(&e, parsed.template()))?
        {
            lifecycle.step();
            stepped += 1;
            if !on_row(&mapper, &row)? {
                break;
            }
        }
        Ok(stepped)
    }

    /// Executes the query and returns all matching rows, in fetch order.
    ///
    /// No matching rows yields an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or if any row cannot be mapped to `R`.
    pub async fn fetch_all<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<Vec<R>>
    where
        P: Parameters + ?Sized,
    {
        let mut records = Vec::new();
        self.for_each_row(conn, carrier, |mapper, row| {
            records.push(mapper.map_row(row)?);
            Ok(true)
        })
        .await?;
        Ok(records)
    }

    /// Executes the query and returns at most one row.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - More than one row is found ([`Error::TooManyRows`](crate::Error::TooManyRows))
    /// - The query fails
    /// - The row cannot be mapped to `R`
    pub async fn fetch_optional<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<Option<R>>
    where
        P: Parameters + ?Sized,
    {
        let template = self.parsed.template();
        let mut found = None;
        self.for_each_row(conn, carrier, |mapper, row| {
            if found.is_some() {
                return Err(crate::Error::TooManyRows {
                    sql: template.to_owned(),
                });
            }
            found = Some(mapper.map_row(row)?);
            Ok(true)
        })
        .await?;
        Ok(found)
    }

    /// Executes the query and hands each mapped row to `consumer`, in fetch order.
    ///
    /// The consumer returns `Ok(true)` to keep going and `Ok(false)` to stop.
    /// An error from the consumer stops iteration and is returned unchanged.
    /// Returns the number of rows handed to the consumer.
    pub async fn fetch_each<P, F>(
        &self,
        conn: &mut SqliteConnection,
        carrier: &P,
        mut consumer: F,
    ) -> crate::Result<usize>
    where
        P: Parameters + ?Sized,
        F: FnMut(R) -> crate::Result<bool>,
    {
        self.for_each_row(conn, carrier, |mapper, row| consumer(mapper.map_row(row)?))
            .await
    }
}
