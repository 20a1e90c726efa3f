//! Lookup enumeration
//!
//! Computes every lookup expression a field supports, by walking the field
//! class hierarchy registered in a [`LookupRegistry`] and chaining through
//! transform lookups (`year__gte`).
//!
//! Recursion into transforms stops only when the next transform is the same
//! one currently being expanded. There is no cycle detection across multiple
//! transforms: a registry where transform A produces a class carrying
//! transform B, whose output carries A again, recurses without bound. No
//! stock registration exhibits this shape.

use crate::meta::{FieldMeta, LOOKUP_SEP, RelationKind, RelationMeta};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One queryable operation registered on a field class
///
/// Plain lookups compare and produce a boolean predicate. Transforms produce
/// a value of `output_class`, on which further lookups chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupDescriptor {
	pub name: String,
	pub output_class: Option<String>,
}

impl LookupDescriptor {
	/// A plain comparison lookup
	pub fn lookup(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			output_class: None,
		}
	}

	/// A transform producing a value of `output_class`
	pub fn transform(name: impl Into<String>, output_class: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			output_class: Some(output_class.into()),
		}
	}

	pub fn is_transform(&self) -> bool {
		self.output_class.is_some()
	}
}

#[derive(Debug, Clone, Default)]
struct FieldClassEntry {
	parent: Option<String>,
	lookups: IndexMap<String, LookupDescriptor>,
}

/// Read-only table of field classes and the lookups registered on them
///
/// An explicit, injected dependency of the enumeration functions; tests can
/// supply synthetic registries. [`LookupRegistry::with_defaults`] mirrors the
/// stock lookup tables of a Django-style ORM.
#[derive(Debug, Clone, Default)]
pub struct LookupRegistry {
	classes: HashMap<String, FieldClassEntry>,
}

impl LookupRegistry {
	pub fn new() -> Self {
		Self {
			classes: HashMap::new(),
		}
	}

	/// Declares a field class and its parent class
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::lookups::{LookupDescriptor, LookupRegistry};
	///
	/// let mut registry = LookupRegistry::new();
	/// registry.register_class("Field", None);
	/// registry.register_class("CharField", Some("Field"));
	/// registry.register_lookup("Field", LookupDescriptor::lookup("exact"));
	/// registry.register_lookup("CharField", LookupDescriptor::lookup("icontains"));
	///
	/// let lookups = registry.class_lookups("CharField");
	/// assert!(lookups.contains_key("exact"));
	/// assert!(lookups.contains_key("icontains"));
	/// ```
	pub fn register_class(&mut self, name: &str, parent: Option<&str>) {
		let entry = self.classes.entry(name.to_string()).or_default();
		entry.parent = parent.map(str::to_string);
	}

	/// Registers a lookup on a field class, declaring the class if needed
	pub fn register_lookup(&mut self, class: &str, descriptor: LookupDescriptor) {
		let entry = self.classes.entry(class.to_string()).or_default();
		entry.lookups.insert(descriptor.name.clone(), descriptor);
	}

	/// Compiled lookup table for a field class
	///
	/// Walks the class hierarchy most-generic-first, so a lookup registered
	/// on a subclass replaces a same-named lookup inherited from an
	/// ancestor while keeping the ancestor's position in the table.
	pub fn class_lookups(&self, field_class: &str) -> IndexMap<String, LookupDescriptor> {
		let mut chain = Vec::new();
		let mut seen = HashSet::new();
		let mut cursor = Some(field_class);
		while let Some(name) = cursor {
			if !seen.insert(name) {
				break;
			}
			chain.push(name);
			cursor = self
				.classes
				.get(name)
				.and_then(|entry| entry.parent.as_deref());
		}

		let mut compiled = IndexMap::new();
		for name in chain.iter().rev() {
			if let Some(entry) = self.classes.get(*name) {
				for (lookup_name, descriptor) in &entry.lookups {
					compiled.insert(lookup_name.clone(), descriptor.clone());
				}
			}
		}
		compiled
	}

	/// Registry pre-populated with the stock field classes and lookups
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();

		registry.register_class("Field", None);
		for name in ["exact", "iexact", "in", "isnull"] {
			registry.register_lookup("Field", LookupDescriptor::lookup(name));
		}

		registry.register_class("CharField", Some("Field"));
		for name in [
			"contains",
			"icontains",
			"startswith",
			"istartswith",
			"endswith",
			"iendswith",
			"regex",
			"iregex",
		] {
			registry.register_lookup("CharField", LookupDescriptor::lookup(name));
		}
		registry.register_class("TextField", Some("CharField"));
		registry.register_class("EmailField", Some("CharField"));
		registry.register_class("SlugField", Some("CharField"));
		registry.register_class("URLField", Some("CharField"));

		registry.register_class("IntegerField", Some("Field"));
		for name in ["gt", "gte", "lt", "lte", "range"] {
			registry.register_lookup("IntegerField", LookupDescriptor::lookup(name));
		}
		registry.register_class("AutoField", Some("IntegerField"));
		registry.register_class("BigIntegerField", Some("IntegerField"));
		registry.register_class("SmallIntegerField", Some("IntegerField"));

		registry.register_class("FloatField", Some("Field"));
		registry.register_class("DecimalField", Some("Field"));
		for class in ["FloatField", "DecimalField"] {
			for name in ["gt", "gte", "lt", "lte", "range"] {
				registry.register_lookup(class, LookupDescriptor::lookup(name));
			}
		}

		registry.register_class("BooleanField", Some("Field"));
		registry.register_class("UUIDField", Some("Field"));
		registry.register_class("ForeignKey", Some("Field"));

		registry.register_class("DateField", Some("Field"));
		for name in ["gt", "gte", "lt", "lte", "range"] {
			registry.register_lookup("DateField", LookupDescriptor::lookup(name));
		}
		for name in ["year", "month", "day"] {
			registry.register_lookup(
				"DateField",
				LookupDescriptor::transform(name, "IntegerField"),
			);
		}

		registry.register_class("DateTimeField", Some("DateField"));
		registry.register_lookup("DateTimeField", LookupDescriptor::transform("date", "DateField"));
		registry.register_lookup("DateTimeField", LookupDescriptor::transform("time", "TimeField"));
		for name in ["hour", "minute", "second"] {
			registry.register_lookup(
				"DateTimeField",
				LookupDescriptor::transform(name, "IntegerField"),
			);
		}

		registry.register_class("TimeField", Some("Field"));
		for name in ["gt", "gte", "lt", "lte", "range"] {
			registry.register_lookup("TimeField", LookupDescriptor::lookup(name));
		}
		for name in ["hour", "minute", "second"] {
			registry.register_lookup(
				"TimeField",
				LookupDescriptor::transform(name, "IntegerField"),
			);
		}

		registry
	}
}

/// Every lookup expression valid for `field`, in registration order
///
/// Forward foreign-key fields yield no direct lookups; relational traversal
/// is the expansion engine's concern.
///
/// # Examples
///
/// ```
/// use reinhardt_filterset::lookups::{LookupRegistry, lookups_for_field};
/// use reinhardt_filterset::meta::FieldMeta;
///
/// let registry = LookupRegistry::with_defaults();
/// let field = FieldMeta::new("published", "DateField");
/// let lookups = lookups_for_field(&registry, &field);
/// assert!(lookups.contains(&"exact".to_string()));
/// assert!(lookups.contains(&"year__gte".to_string()));
/// ```
pub fn lookups_for_field(registry: &LookupRegistry, field: &FieldMeta) -> Vec<String> {
	if matches!(
		field.relation,
		Some(RelationMeta {
			kind: RelationKind::ForwardOne,
			..
		})
	) {
		return Vec::new();
	}

	let mut lookups = Vec::new();
	for (name, descriptor) in registry.class_lookups(&field.field_class) {
		if descriptor.is_transform() {
			for sub in lookups_for_transform(registry, &descriptor) {
				lookups.push(format!("{name}{LOOKUP_SEP}{sub}"));
			}
		} else {
			lookups.push(name);
		}
	}
	lookups
}

/// Lookup expressions chainable after `transform`
///
/// A transform identical to the one being expanded indicates immediate
/// recursion and is not followed.
pub fn lookups_for_transform(registry: &LookupRegistry, transform: &LookupDescriptor) -> Vec<String> {
	let mut lookups = Vec::new();
	let Some(output_class) = transform.output_class.as_deref() else {
		return lookups;
	};

	for (name, descriptor) in registry.class_lookups(output_class) {
		if descriptor.is_transform() {
			if descriptor == *transform {
				continue;
			}
			for sub in lookups_for_transform(registry, &descriptor) {
				lookups.push(format!("{name}{LOOKUP_SEP}{sub}"));
			}
		} else {
			lookups.push(name);
		}
	}
	lookups
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_class_lookups_inherits_ancestors() {
		let registry = LookupRegistry::with_defaults();
		let lookups = registry.class_lookups("CharField");
		assert!(lookups.contains_key("exact"));
		assert!(lookups.contains_key("icontains"));
		assert!(!lookups.contains_key("gte"));
	}

	#[test]
	fn test_class_lookups_specific_overrides_generic() {
		let mut registry = LookupRegistry::new();
		registry.register_class("Field", None);
		registry.register_class("CharField", Some("Field"));
		registry.register_lookup("Field", LookupDescriptor::lookup("exact"));
		registry.register_lookup("CharField", LookupDescriptor::transform("exact", "CharField"));

		let lookups = registry.class_lookups("CharField");
		assert_eq!(lookups.len(), 1);
		assert!(lookups["exact"].is_transform());
	}

	#[test]
	fn test_class_lookups_unknown_class_is_empty() {
		let registry = LookupRegistry::with_defaults();
		assert!(registry.class_lookups("NoSuchField").is_empty());
	}

	#[test]
	fn test_foreign_key_yields_no_lookups() {
		let registry = LookupRegistry::with_defaults();
		let field = FieldMeta::foreign_key("author", "User");
		assert!(lookups_for_field(&registry, &field).is_empty());
	}

	#[test]
	fn test_transform_chain_on_date_field() {
		let registry = LookupRegistry::with_defaults();
		let field = FieldMeta::new("published", "DateField");
		let lookups = lookups_for_field(&registry, &field);

		assert!(lookups.contains(&"year__gte".to_string()));
		assert!(lookups.contains(&"year__exact".to_string()));
		// a transform never appears bare, only joined with a terminal lookup
		assert!(!lookups.contains(&"year".to_string()));
	}

	#[test]
	fn test_two_hop_transform_chain() {
		let registry = LookupRegistry::with_defaults();
		let field = FieldMeta::new("created", "DateTimeField");
		let lookups = lookups_for_field(&registry, &field);

		// date -> DateField, whose year transform -> IntegerField
		assert!(lookups.contains(&"date__year__gte".to_string()));
	}

	#[test]
	fn test_self_repeating_transform_stops() {
		let mut registry = LookupRegistry::new();
		registry.register_class("CharField", None);
		registry.register_lookup("CharField", LookupDescriptor::lookup("exact"));
		registry.register_lookup("CharField", LookupDescriptor::transform("unaccent", "CharField"));

		let field = FieldMeta::new("name", "CharField");
		let lookups = lookups_for_field(&registry, &field);

		assert_eq!(lookups, vec!["exact".to_string(), "unaccent__exact".to_string()]);
	}

	#[test]
	fn test_enumeration_is_deterministic() {
		let registry = LookupRegistry::with_defaults();
		let field = FieldMeta::new("title", "CharField");
		let first = lookups_for_field(&registry, &field);
		let second = lookups_for_field(&registry, &field);
		assert_eq!(first, second);
	}
}
