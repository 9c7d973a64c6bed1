//! Name-addressed access to parameter carriers and result shapes.
//!
//! A struct takes part in binding and mapping through a [`Bindings`] table
//! built once per type: property name → getter, setter and type tag. The
//! table is looked up by name when a placeholder is bound and when a result
//! column is assigned. [`impl_record!`](crate::impl_record) writes the table
//! for a plain struct.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;

use crate::value::{ConversionError, FromValue, ToValue, Value, ValueType};

type Getter<R> = Box<dyn Fn(&R) -> Result<Value, ConversionError> + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, Value) -> Result<(), ConversionError> + Send + Sync>;

struct Property<R> {
    name: String,
    ty: ValueType,
    get: Getter<R>,
    set: Setter<R>,
}

/// Per-type binding table mapping property names to accessors.
///
/// # Examples
///
/// ```
/// use sqlx_named_mapper::{Bindings, Value, ValueType};
///
/// #[derive(Default)]
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// let bindings = Bindings::<Person>::new()
///     .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
///     .field("age", |p: &Person| &p.age, |p: &mut Person| &mut p.age);
///
/// let mut person = Person::default();
/// bindings.set(&mut person, "age", Value::Integer(30)).unwrap()?;
/// assert_eq!(person.age, 30);
/// assert_eq!(bindings.type_of("name"), Some(ValueType::Text));
/// # Ok::<(), sqlx_named_mapper::ConversionError>(())
/// ```
pub struct Bindings<R> {
    properties: Vec<Property<R>>,
    by_name: HashMap<String, usize>,
}

impl<R: 'static> Bindings<R> {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers a property backed by a struct field.
    ///
    /// Registering a name twice replaces the earlier entry.
    pub fn field<T>(mut self, name: &str, get: fn(&R) -> &T, get_mut: fn(&mut R) -> &mut T) -> Self
    where
        T: ToValue + FromValue + 'static,
    {
        let property = Property {
            name: name.to_owned(),
            ty: T::value_type(),
            get: Box::new(move |record: &R| get(record).to_value()),
            set: Box::new(move |record: &mut R, value: Value| {
                *get_mut(record) = T::from_value(value)?;
                Ok(())
            }),
        };
        match self.by_name.get(name) {
            Some(&slot) => self.properties[slot] = property,
            None => {
                self.by_name.insert(name.to_owned(), self.properties.len());
                self.properties.push(property);
            }
        }
        self
    }
}

impl<R: 'static> Default for Bindings<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Bindings<R> {
    fn property(&self, name: &str) -> Option<&Property<R>> {
        self.by_name.get(name).map(|&slot| &self.properties[slot])
    }

    /// Reads a property; `None` when the table has no such name.
    pub fn get(&self, record: &R, name: &str) -> Option<Result<Value, ConversionError>> {
        self.property(name).map(|p| (p.get)(record))
    }

    /// Assigns a property; `None` when the table has no such name.
    pub fn set(&self, record: &mut R, name: &str, value: Value) -> Option<Result<(), ConversionError>> {
        self.property(name).map(|p| (p.set)(record, value))
    }

    pub fn type_of(&self, name: &str) -> Option<ValueType> {
        self.property(name).map(|p| p.ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Property names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// A result shape: a type instantiated once per row and filled by column name.
pub trait Record: Default + 'static {
    fn bindings() -> &'static Bindings<Self>;
}

/// A parameter carrier: supplies placeholder values by property name.
pub trait Parameters {
    /// `Ok(None)` means the carrier has no property of that name.
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError>;

    /// `false` when no carrier was supplied at all.
    fn is_present(&self) -> bool {
        true
    }
}

/// No carrier. Binding a statement with placeholders against it fails.
impl Parameters for () {
    fn property(&self, _name: &str) -> Result<Option<Value>, ConversionError> {
        Ok(None)
    }

    fn is_present(&self) -> bool {
        false
    }
}

impl<P: Parameters> Parameters for Option<P> {
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError> {
        match self {
            Some(inner) => inner.property(name),
            None => Ok(None),
        }
    }

    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Parameters::is_present)
    }
}

impl<P: Parameters + ?Sized> Parameters for &P {
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError> {
        (**self).property(name)
    }

    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

impl<K, V, S> Parameters for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash,
    V: ToValue,
    S: BuildHasher,
{
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError> {
        self.get(name).map(ToValue::to_value).transpose()
    }
}

impl<K, V> Parameters for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: ToValue,
{
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError> {
        self.get(name).map(ToValue::to_value).transpose()
    }
}

/// Ad-hoc parameter carrier for statements without a matching struct.
///
/// Conversion failures are kept and reported when the statement is bound.
///
/// ```
/// use sqlx_named_mapper::{Parameters, Params, Value};
///
/// let params = Params::new().set("name", "Alice").set("age", 30);
/// assert_eq!(params.property("age").unwrap(), Some(Value::Integer(30)));
/// assert_eq!(params.property("email").unwrap(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: IndexMap<String, Result<Value, ConversionError>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: ToValue>(mut self, name: impl Into<String>, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<V: ToValue>(&mut self, name: impl Into<String>, value: V) {
        self.values.insert(name.into(), value.to_value());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Parameters for Params {
    fn property(&self, name: &str) -> Result<Option<Value>, ConversionError> {
        self.values.get(name).cloned().transpose()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_property_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $name:literal) => {
        $name
    };
}

/// Implements [`Record`] and [`Parameters`] for a struct with public-enough fields.
///
/// Each listed field becomes a property named after the field, or after the
/// string given with `=>`.
///
/// ```
/// use sqlx_named_mapper::{impl_record, Parameters, Record, Value};
///
/// #[derive(Debug, Default)]
/// struct Person {
///     key: i64,
///     name: String,
///     date_of_birth: Option<String>,
/// }
///
/// impl_record!(Person { key, name, date_of_birth => "dateOfBirth" });
///
/// let person = Person { key: 1, name: "Alice".into(), date_of_birth: None };
/// assert_eq!(person.property("name").unwrap(), Some(Value::Text("Alice".into())));
/// assert_eq!(person.property("dateOfBirth").unwrap(), Some(Value::Null));
/// assert!(Person::bindings().contains("key"));
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident $(=> $name:literal)?),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn bindings() -> &'static $crate::Bindings<Self> {
                static BINDINGS: ::std::sync::OnceLock<$crate::Bindings<$ty>> =
                    ::std::sync::OnceLock::new();
                BINDINGS.get_or_init(|| {
                    $crate::Bindings::<$ty>::new()
                        $(.field(
                            $crate::__record_property_name!($field $(, $name)?),
                            |record: &$ty| &record.$field,
                            |record: &mut $ty| &mut record.$field,
                        ))*
                })
            }
        }

        impl $crate::Parameters for $ty {
            fn property(
                &self,
                name: &str,
            ) -> ::std::result::Result<::std::option::Option<$crate::Value>, $crate::ConversionError> {
                <$ty as $crate::Record>::bindings().get(self, name).transpose()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_record;

    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: i64,
        owner: String,
        balance: Option<f64>,
        active: bool,
    }

    impl_record!(Account { id, owner => "ownerName", balance, active });

    #[test]
    fn test_bindings_built_once() {
        let first = Account::bindings() as *const Bindings<Account>;
        let second = Account::bindings() as *const Bindings<Account>;
        assert_eq!(first, second);
        assert_eq!(
            Account::bindings().names().collect::<Vec<_>>(),
            vec!["id", "ownerName", "balance", "active"]
        );
    }

    #[test]
    fn test_record_get_and_set_by_name() {
        let bindings = Account::bindings();
        let mut account = Account::default();

        bindings
            .set(&mut account, "ownerName", Value::Text("Bob".into()))
            .unwrap()
            .unwrap();
        bindings
            .set(&mut account, "balance", Value::Integer(12))
            .unwrap()
            .unwrap();
        bindings
            .set(&mut account, "active", Value::Integer(1))
            .unwrap()
            .unwrap();

        assert_eq!(account.owner, "Bob");
        assert_eq!(account.balance, Some(12.0));
        assert!(account.active);
        assert!(bindings.set(&mut account, "owner", Value::Null).is_none());
        assert_eq!(bindings.type_of("active"), Some(ValueType::Boolean));
    }

    #[test]
    fn test_record_as_parameters() {
        let account = Account {
            id: 7,
            owner: "Carol".into(),
            balance: None,
            active: false,
        };
        assert_eq!(account.property("id").unwrap(), Some(Value::Integer(7)));
        assert_eq!(account.property("balance").unwrap(), Some(Value::Null));
        assert_eq!(account.property("missing").unwrap(), None);
        assert!(account.is_present());
    }

    #[test]
    fn test_setter_reports_conversion_failure() {
        let mut account = Account::default();
        let result = Account::bindings()
            .set(&mut account, "id", Value::Text("seven".into()))
            .unwrap();
        assert!(matches!(result, Err(ConversionError::InvalidText { .. })));
    }

    #[test]
    fn test_map_carriers() {
        let mut map = HashMap::new();
        map.insert("minAge", 20_i64);
        assert_eq!(map.property("minAge").unwrap(), Some(Value::Integer(20)));
        assert_eq!(map.property("maxAge").unwrap(), None);

        let tree: BTreeMap<String, Value> =
            BTreeMap::from([("name".to_string(), Value::Text("Dan".into()))]);
        assert_eq!(tree.property("name").unwrap(), Some(Value::Text("Dan".into())));
    }

    #[test]
    fn test_absent_carriers() {
        assert!(!().is_present());
        assert!(!None::<Params>.is_present());
        assert!(Some(Params::new()).is_present());
    }

    #[test]
    fn test_params_keeps_conversion_error_until_bind() {
        let params = Params::new().set("big", u64::MAX).set("ok", 1_i32);
        assert!(params.property("big").is_err());
        assert_eq!(params.property("ok").unwrap(), Some(Value::Integer(1)));
        assert_eq!(params.len(), 2);
    }
}
