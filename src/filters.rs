//! Filter records
//!
//! A [`Filter`] is an immutable value record translating one external query
//! parameter into one ORM lookup. Expansion copies and re-namespaces these
//! records; nothing mutates a filter after it is declared.

use crate::meta::LOOKUP_SEP;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;

/// How a raw query-string value is coerced before reaching the ORM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coercion {
	Text,
	Integer,
	Float,
	Boolean,
	Date,
	Time,
	DateTime,
}

/// A coerced query-string value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterValue {
	Text(String),
	Integer(i64),
	Float(f64),
	Boolean(bool),
	Date(NaiveDate),
	Time(NaiveTime),
	DateTime(DateTime<FixedOffset>),
}

/// Raw value failed to parse as the filter's coercion kind
#[derive(Debug, Error)]
#[error("expected {expected} value, got {value:?}")]
pub struct CoercionError {
	pub expected: &'static str,
	pub value: String,
}

impl Coercion {
	/// Coercion kind for a field class, text by default
	pub fn for_field_class(field_class: &str) -> Self {
		match field_class {
			"IntegerField" | "AutoField" | "BigIntegerField" | "SmallIntegerField"
			| "ForeignKey" => Self::Integer,
			"FloatField" | "DecimalField" => Self::Float,
			"BooleanField" => Self::Boolean,
			"DateField" => Self::Date,
			"TimeField" => Self::Time,
			"DateTimeField" => Self::DateTime,
			_ => Self::Text,
		}
	}

	/// Parses a raw query-string value
	///
	/// Dates and times accept ISO-8601 (the wire format the host's REST
	/// layer emits); datetimes without an offset are read as UTC. Booleans
	/// accept `true`/`false`/`1`/`0` case-insensitively.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::filters::{Coercion, FilterValue};
	///
	/// assert_eq!(Coercion::Integer.coerce("30").unwrap(), FilterValue::Integer(30));
	/// assert_eq!(Coercion::Boolean.coerce("True").unwrap(), FilterValue::Boolean(true));
	/// assert!(Coercion::Date.coerce("not-a-date").is_err());
	/// ```
	pub fn coerce(&self, raw: &str) -> Result<FilterValue, CoercionError> {
		let raw = raw.trim();
		match self {
			Self::Text => Ok(FilterValue::Text(raw.to_string())),
			Self::Integer => raw
				.parse::<i64>()
				.map(FilterValue::Integer)
				.map_err(|_| CoercionError {
					expected: "integer",
					value: raw.to_string(),
				}),
			Self::Float => raw
				.parse::<f64>()
				.map(FilterValue::Float)
				.map_err(|_| CoercionError {
					expected: "float",
					value: raw.to_string(),
				}),
			Self::Boolean => match raw.to_ascii_lowercase().as_str() {
				"true" | "1" => Ok(FilterValue::Boolean(true)),
				"false" | "0" => Ok(FilterValue::Boolean(false)),
				_ => Err(CoercionError {
					expected: "boolean",
					value: raw.to_string(),
				}),
			},
			Self::Date => raw
				.parse::<NaiveDate>()
				.map(FilterValue::Date)
				.map_err(|_| CoercionError {
					expected: "ISO-8601 date",
					value: raw.to_string(),
				}),
			Self::Time => raw
				.parse::<NaiveTime>()
				.map(FilterValue::Time)
				.map_err(|_| CoercionError {
					expected: "ISO-8601 time",
					value: raw.to_string(),
				}),
			Self::DateTime => DateTime::parse_from_rfc3339(raw)
				.map(FilterValue::DateTime)
				.or_else(|_| {
					raw.parse::<NaiveDateTime>()
						.map(|naive| FilterValue::DateTime(naive.and_utc().fixed_offset()))
				})
				.map_err(|_| CoercionError {
					expected: "ISO-8601 datetime",
					value: raw.to_string(),
				}),
		}
	}
}

/// Discriminates how a filter participates in expansion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterKind {
	/// A concrete predicate on a field
	Scalar { coercion: Coercion },
	/// Delegates to the filter set registered for a related model
	Related {
		target: String,
		parent_relation: Option<String>,
	},
	/// Marker expanding into one scalar filter per valid lookup
	AllLookups,
}

/// A named query predicate
///
/// `param_name` is the external name clients use; `field_path` is the dotted
/// traversal path handed to the ORM; `lookup` is the lookup expression
/// applied at the end of that path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
	pub param_name: String,
	pub field_path: String,
	pub lookup: String,
	pub kind: FilterKind,
}

impl Filter {
	/// A concrete scalar filter
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::filters::{Coercion, Filter};
	///
	/// let filter = Filter::scalar("age__gte", "age", "gte", Coercion::Integer);
	/// assert_eq!(filter.query_key(), "age__gte");
	/// ```
	pub fn scalar(
		param_name: impl Into<String>,
		field_path: impl Into<String>,
		lookup: impl Into<String>,
		coercion: Coercion,
	) -> Self {
		Self {
			param_name: param_name.into(),
			field_path: field_path.into(),
			lookup: lookup.into(),
			kind: FilterKind::Scalar { coercion },
		}
	}

	/// A relational filter delegating to the filter set registered as `target`
	pub fn related(
		param_name: impl Into<String>,
		field_path: impl Into<String>,
		target: impl Into<String>,
	) -> Self {
		Self {
			param_name: param_name.into(),
			field_path: field_path.into(),
			lookup: "exact".to_string(),
			kind: FilterKind::Related {
				target: target.into(),
				parent_relation: None,
			},
		}
	}

	/// An all-lookups marker on `field_path`
	pub fn all_lookups(param_name: impl Into<String>, field_path: impl Into<String>) -> Self {
		Self {
			param_name: param_name.into(),
			field_path: field_path.into(),
			lookup: "exact".to_string(),
			kind: FilterKind::AllLookups,
		}
	}

	/// Sets the join-field hint on a relational filter; no-op for other kinds
	pub fn parent_relation(mut self, parent: impl Into<String>) -> Self {
		if let FilterKind::Related {
			parent_relation, ..
		} = &mut self.kind
		{
			*parent_relation = Some(parent.into());
		}
		self
	}

	/// The ORM keyword argument for this filter
	///
	/// Joins `field_path` and `lookup` with the path separator; `exact` is
	/// elided, matching the host's kwarg convention.
	pub fn query_key(&self) -> String {
		if self.lookup == "exact" {
			self.field_path.clone()
		} else {
			format!("{}{}{}", self.field_path, LOOKUP_SEP, self.lookup)
		}
	}

	/// The coercion applied to raw values, if this is a concrete scalar
	pub fn coercion(&self) -> Option<Coercion> {
		match &self.kind {
			FilterKind::Scalar { coercion } => Some(*coercion),
			_ => None,
		}
	}
}

/// Forces `isnull` filters into boolean shape
///
/// A filter whose lookup is `isnull` gets boolean coercion regardless of the
/// field's native kind, and its parameter name carries the explicit `isnull`
/// suffix. Idempotent; non-`isnull` filters pass through unchanged.
pub fn fix_filter_field(mut filter: Filter) -> Filter {
	if filter.lookup != "isnull" {
		return filter;
	}
	let suffix = format!("{LOOKUP_SEP}isnull");
	if !filter.param_name.ends_with(&suffix) {
		filter.param_name = format!("{}{}", filter.param_name, suffix);
	}
	filter.kind = FilterKind::Scalar {
		coercion: Coercion::Boolean,
	};
	filter
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_query_key_elides_exact() {
		let filter = Filter::scalar("name", "name", "exact", Coercion::Text);
		assert_eq!(filter.query_key(), "name");
	}

	#[test]
	fn test_query_key_joins_lookup() {
		let filter = Filter::scalar("author__age__gte", "author__age", "gte", Coercion::Integer);
		assert_eq!(filter.query_key(), "author__age__gte");
	}

	#[test]
	fn test_related_filter_defaults() {
		let filter = Filter::related("author", "author", "UserFilterSet");
		assert_eq!(filter.lookup, "exact");
		assert_eq!(
			filter.kind,
			FilterKind::Related {
				target: "UserFilterSet".to_string(),
				parent_relation: None,
			}
		);
	}

	#[test]
	fn test_parent_relation_builder() {
		let filter = Filter::related("author", "author", "UserFilterSet").parent_relation("user");
		match filter.kind {
			FilterKind::Related {
				parent_relation, ..
			} => assert_eq!(parent_relation.as_deref(), Some("user")),
			_ => panic!("expected related kind"),
		}
	}

	#[test]
	fn test_fix_filter_field_forces_boolean() {
		let filter = Filter::scalar("created__isnull", "created", "isnull", Coercion::DateTime);
		let fixed = fix_filter_field(filter);
		assert_eq!(fixed.coercion(), Some(Coercion::Boolean));
		assert_eq!(fixed.param_name, "created__isnull");
	}

	#[test]
	fn test_fix_filter_field_appends_suffix() {
		let filter = Filter::scalar("author", "author", "isnull", Coercion::Integer);
		let fixed = fix_filter_field(filter);
		assert_eq!(fixed.param_name, "author__isnull");
		assert_eq!(fixed.query_key(), "author__isnull");
	}

	#[test]
	fn test_fix_filter_field_idempotent() {
		let filter = Filter::scalar("author__isnull", "author", "isnull", Coercion::Boolean);
		let once = fix_filter_field(filter.clone());
		let twice = fix_filter_field(once.clone());
		assert_eq!(once, twice);
		assert_eq!(once, filter);
	}

	#[test]
	fn test_fix_filter_field_passes_other_lookups() {
		let filter = Filter::scalar("age__gte", "age", "gte", Coercion::Integer);
		assert_eq!(fix_filter_field(filter.clone()), filter);
	}

	#[test]
	fn test_coercion_for_field_class() {
		assert_eq!(Coercion::for_field_class("CharField"), Coercion::Text);
		assert_eq!(Coercion::for_field_class("AutoField"), Coercion::Integer);
		assert_eq!(Coercion::for_field_class("BooleanField"), Coercion::Boolean);
		assert_eq!(Coercion::for_field_class("DateTimeField"), Coercion::DateTime);
		assert_eq!(Coercion::for_field_class("SomethingElse"), Coercion::Text);
	}

	#[test]
	fn test_coerce_integer() {
		assert_eq!(
			Coercion::Integer.coerce(" 42 ").unwrap(),
			FilterValue::Integer(42)
		);
		assert!(Coercion::Integer.coerce("forty-two").is_err());
	}

	#[test]
	fn test_coerce_boolean_spellings() {
		for raw in ["true", "TRUE", "1"] {
			assert_eq!(
				Coercion::Boolean.coerce(raw).unwrap(),
				FilterValue::Boolean(true)
			);
		}
		for raw in ["false", "False", "0"] {
			assert_eq!(
				Coercion::Boolean.coerce(raw).unwrap(),
				FilterValue::Boolean(false)
			);
		}
		assert!(Coercion::Boolean.coerce("yes").is_err());
	}

	#[test]
	fn test_coerce_iso_date() {
		assert_eq!(
			Coercion::Date.coerce("2024-01-15").unwrap(),
			FilterValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
		);
	}

	#[test]
	fn test_coerce_datetime_with_and_without_offset() {
		let aware = Coercion::DateTime.coerce("2024-01-15T10:30:00+09:00").unwrap();
		let naive = Coercion::DateTime.coerce("2024-01-15T10:30:00").unwrap();
		match (aware, naive) {
			(FilterValue::DateTime(a), FilterValue::DateTime(n)) => {
				assert_eq!(a.offset().local_minus_utc(), 9 * 3600);
				assert_eq!(n.offset().local_minus_utc(), 0);
			}
			_ => panic!("expected datetime values"),
		}
	}

	#[test]
	fn test_coerce_time() {
		assert_eq!(
			Coercion::Time.coerce("14:30:00").unwrap(),
			FilterValue::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap())
		);
	}
}
