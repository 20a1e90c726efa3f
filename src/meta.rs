//! Model and field metadata
//!
//! The narrow slice of the host ORM this crate consumes: enough field
//! introspection to resolve a dotted path to a field descriptor and to walk
//! forward and reverse relations. Filter sets never touch a database; they
//! only read these descriptors at declaration time.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Separator joining path segments in parameter names and ORM field paths
pub const LOOKUP_SEP: &str = "__";

/// Direction of a relation as seen from the declaring model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationKind {
	/// Forward foreign key to the target model
	ForwardOne,
	/// Reverse accessor for a foreign key declared on the target model
	ReverseMany,
}

/// Relation endpoint carried by a relational field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationMeta {
	pub target: String,
	pub kind: RelationKind,
}

/// Metadata about a single model field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMeta {
	pub name: String,
	pub field_class: String,
	pub nullable: bool,
	pub primary_key: bool,
	pub relation: Option<RelationMeta>,
}

impl FieldMeta {
	/// Creates a new field descriptor
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::meta::FieldMeta;
	///
	/// let field = FieldMeta::new("username", "CharField");
	/// assert_eq!(field.name, "username");
	/// assert_eq!(field.field_class, "CharField");
	/// assert!(!field.nullable);
	/// ```
	pub fn new(name: impl Into<String>, field_class: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			field_class: field_class.into(),
			nullable: false,
			primary_key: false,
			relation: None,
		}
	}

	/// Creates a forward foreign-key field pointing at `target`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::meta::FieldMeta;
	///
	/// let field = FieldMeta::foreign_key("author", "User");
	/// assert!(field.is_relation());
	/// assert!(!field.is_reverse());
	/// ```
	pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
		let mut field = Self::new(name, "ForeignKey");
		field.relation = Some(RelationMeta {
			target: target.into(),
			kind: RelationKind::ForwardOne,
		});
		field
	}

	/// Creates a reverse relation accessor for a foreign key declared on `target`
	pub fn reverse(name: impl Into<String>, target: impl Into<String>) -> Self {
		let mut field = Self::new(name, "ManyToOneRel");
		field.relation = Some(RelationMeta {
			target: target.into(),
			kind: RelationKind::ReverseMany,
		});
		field
	}

	/// Sets the nullable flag
	pub fn nullable(mut self, nullable: bool) -> Self {
		self.nullable = nullable;
		self
	}

	/// Sets the primary_key flag
	pub fn primary_key(mut self, primary_key: bool) -> Self {
		self.primary_key = primary_key;
		self
	}

	pub fn is_relation(&self) -> bool {
		self.relation.is_some()
	}

	pub fn is_reverse(&self) -> bool {
		matches!(
			self.relation,
			Some(RelationMeta {
				kind: RelationKind::ReverseMany,
				..
			})
		)
	}
}

/// Metadata for one model: its registered name and its fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMeta {
	pub name: String,
	fields: Vec<FieldMeta>,
}

impl ModelMeta {
	/// Creates a new model descriptor
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::meta::{FieldMeta, ModelMeta};
	///
	/// let model = ModelMeta::new("User")
	///     .field(FieldMeta::new("id", "AutoField").primary_key(true))
	///     .field(FieldMeta::new("username", "CharField"));
	/// assert!(model.get_field("username").is_some());
	/// assert!(model.get_field("missing").is_none());
	/// ```
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fields: Vec::new(),
		}
	}

	/// Adds a field to the model
	pub fn field(mut self, field: FieldMeta) -> Self {
		self.fields.push(field);
		self
	}

	/// Gets a field by name
	pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
		self.fields.iter().find(|f| f.name == name)
	}

	/// The first field flagged as primary key, if any
	pub fn pk_field(&self) -> Option<&FieldMeta> {
		self.fields.iter().find(|f| f.primary_key)
	}

	pub fn fields(&self) -> &[FieldMeta] {
		&self.fields
	}
}

/// Process-wide registry of model descriptors, keyed by registered model name
///
/// Registration happens at startup; afterwards the registry is only read, so
/// concurrent request-time readers need no external locking.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
	models: Arc<RwLock<HashMap<String, ModelMeta>>>,
}

impl ModelRegistry {
	/// Creates an empty registry
	pub fn new() -> Self {
		Self {
			models: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	/// Registers a model under its `ModelMeta::name`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::meta::{FieldMeta, ModelMeta, ModelRegistry};
	///
	/// let registry = ModelRegistry::new();
	/// registry.register(ModelMeta::new("User").field(FieldMeta::new("name", "CharField")));
	/// assert!(registry.get("User").is_some());
	/// ```
	pub fn register(&self, model: ModelMeta) {
		if let Ok(mut models) = self.models.write() {
			models.insert(model.name.clone(), model);
		}
	}

	/// Gets a registered model by name
	pub fn get(&self, name: &str) -> Option<ModelMeta> {
		if let Ok(models) = self.models.read() {
			models.get(name).cloned()
		} else {
			None
		}
	}

	/// Resolves a dotted field path starting from `model`
	///
	/// Walks `LOOKUP_SEP`-separated segments across relations, so
	/// `author__country__name` starting from a Note model resolves to the
	/// Country.name descriptor. Returns `None` as soon as a segment names a
	/// field the current model doesn't have, or a non-terminal segment is
	/// not a relation.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::meta::{FieldMeta, ModelMeta, ModelRegistry};
	///
	/// let registry = ModelRegistry::new();
	/// registry.register(ModelMeta::new("User").field(FieldMeta::new("name", "CharField")));
	/// registry.register(ModelMeta::new("Note").field(FieldMeta::foreign_key("author", "User")));
	///
	/// let field = registry.resolve_field("Note", "author__name").unwrap();
	/// assert_eq!(field.field_class, "CharField");
	/// ```
	pub fn resolve_field(&self, model: &str, path: &str) -> Option<FieldMeta> {
		let mut current = self.get(model)?;
		let mut segments = path.split(LOOKUP_SEP).peekable();

		while let Some(segment) = segments.next() {
			let field = current.get_field(segment)?;
			if segments.peek().is_none() {
				return Some(field.clone());
			}
			let relation = field.relation.as_ref()?;
			current = self.get(&relation.target)?;
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_registry() -> ModelRegistry {
		let registry = ModelRegistry::new();
		registry.register(
			ModelMeta::new("Country")
				.field(FieldMeta::new("id", "AutoField").primary_key(true))
				.field(FieldMeta::new("name", "CharField")),
		);
		registry.register(
			ModelMeta::new("User")
				.field(FieldMeta::new("id", "AutoField").primary_key(true))
				.field(FieldMeta::new("username", "CharField"))
				.field(FieldMeta::foreign_key("country", "Country").nullable(true)),
		);
		registry.register(
			ModelMeta::new("Note")
				.field(FieldMeta::new("id", "AutoField").primary_key(true))
				.field(FieldMeta::new("title", "CharField"))
				.field(FieldMeta::foreign_key("author", "User")),
		);
		registry
	}

	#[test]
	fn test_field_meta_builder() {
		let field = FieldMeta::new("age", "IntegerField")
			.nullable(true)
			.primary_key(false);
		assert_eq!(field.name, "age");
		assert_eq!(field.field_class, "IntegerField");
		assert!(field.nullable);
		assert!(!field.is_relation());
	}

	#[test]
	fn test_foreign_key_field() {
		let field = FieldMeta::foreign_key("author", "User");
		assert_eq!(field.field_class, "ForeignKey");
		assert!(field.is_relation());
		assert!(!field.is_reverse());
		assert_eq!(field.relation.unwrap().target, "User");
	}

	#[test]
	fn test_reverse_field() {
		let field = FieldMeta::reverse("notes", "Note");
		assert!(field.is_reverse());
	}

	#[test]
	fn test_model_meta_pk_field() {
		let model = ModelMeta::new("User")
			.field(FieldMeta::new("id", "AutoField").primary_key(true))
			.field(FieldMeta::new("username", "CharField"));
		assert_eq!(model.pk_field().unwrap().name, "id");
	}

	#[test]
	fn test_model_meta_without_pk() {
		let model = ModelMeta::new("Bare").field(FieldMeta::new("value", "IntegerField"));
		assert!(model.pk_field().is_none());
	}

	#[test]
	fn test_resolve_field_single_segment() {
		let registry = sample_registry();
		let field = registry.resolve_field("Note", "title").unwrap();
		assert_eq!(field.field_class, "CharField");
	}

	#[test]
	fn test_resolve_field_across_relations() {
		let registry = sample_registry();
		let field = registry.resolve_field("Note", "author__country__name").unwrap();
		assert_eq!(field.name, "name");
		assert_eq!(field.field_class, "CharField");
	}

	#[test]
	fn test_resolve_field_missing_segment() {
		let registry = sample_registry();
		assert!(registry.resolve_field("Note", "nonexistent").is_none());
		assert!(registry.resolve_field("Note", "author__nonexistent").is_none());
	}

	#[test]
	fn test_resolve_field_through_non_relation() {
		let registry = sample_registry();
		// title is not a relation, so it cannot appear mid-path
		assert!(registry.resolve_field("Note", "title__author").is_none());
	}

	#[test]
	fn test_resolve_field_unknown_model() {
		let registry = sample_registry();
		assert!(registry.resolve_field("Missing", "title").is_none());
	}
}
