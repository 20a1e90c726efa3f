//! Filter set declaration and expansion
//!
//! A [`FilterSetDef`] collects declared filters for one model (phase 1). The
//! expansion engine (phase 2, [`expand`]) turns the declaration into the flat
//! parameter registry request code reads: relational filters pull in the
//! target set's expanded registry under a namespaced prefix, and all-lookups
//! markers materialize one filter per valid lookup expression.
//!
//! Expansion runs once per definition, at startup, before request handling;
//! the resulting [`FilterSet`] is read-only for the life of the process.

use crate::error::{FilterSetError, FilterSetResult};
use crate::filters::{Coercion, Filter, FilterKind, FilterValue, fix_filter_field};
use crate::lookups::{LookupRegistry, lookups_for_field};
use crate::meta::{FieldMeta, LOOKUP_SEP, ModelRegistry};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Declared filters for one model, before expansion
#[derive(Debug, Clone)]
pub struct FilterSetDef {
	name: String,
	model: String,
	filters: IndexMap<String, Filter>,
}

impl FilterSetDef {
	/// Starts a declaration for `model`, registered under `name`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_filterset::filters::{Coercion, Filter};
	/// use reinhardt_filterset::filterset::FilterSetDef;
	///
	/// let def = FilterSetDef::new("UserFilterSet", "User")
	///     .filter(Filter::scalar("username", "username", "exact", Coercion::Text))
	///     .filter(Filter::all_lookups("email", "email"));
	/// assert_eq!(def.declared().len(), 2);
	/// ```
	pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			model: model.into(),
			filters: IndexMap::new(),
		}
	}

	/// Declares a filter, keyed by its parameter name; re-declaring replaces
	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.insert(filter.param_name.clone(), filter);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	/// The declared filters, in declaration order
	pub fn declared(&self) -> &IndexMap<String, Filter> {
		&self.filters
	}
}

/// The expanded, read-only parameter registry for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSet {
	name: String,
	model: String,
	filters: IndexMap<String, Filter>,
}

impl FilterSet {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn get(&self, param_name: &str) -> Option<&Filter> {
		self.filters.get(param_name)
	}

	pub fn has(&self, param_name: &str) -> bool {
		self.filters.contains_key(param_name)
	}

	pub fn values(&self) -> impl Iterator<Item = &Filter> {
		self.filters.values()
	}

	/// External parameter names, in registry order
	pub fn param_names(&self) -> impl Iterator<Item = &str> {
		self.filters.keys().map(String::as_str)
	}

	pub fn filters(&self) -> &IndexMap<String, Filter> {
		&self.filters
	}

	pub fn len(&self) -> usize {
		self.filters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.filters.is_empty()
	}

	/// Validates and translates query parameters into ORM keyword arguments
	///
	/// Parameters without a registered filter pass through untouched (they
	/// belong to other layers: pagination, ordering). Relational filters
	/// coerce as text; the host compares them against the relation's key.
	///
	/// # Errors
	///
	/// Returns [`FilterSetError::InvalidValue`] when a raw value fails its
	/// filter's coercion.
	pub fn translate(
		&self,
		params: &HashMap<String, String>,
	) -> FilterSetResult<Vec<(String, FilterValue)>> {
		let mut kwargs = Vec::new();
		for (param_name, filter) in &self.filters {
			let Some(raw) = params.get(param_name) else {
				continue;
			};
			let coercion = filter.coercion().unwrap_or(Coercion::Text);
			let value =
				coercion
					.coerce(raw)
					.map_err(|source| FilterSetError::InvalidValue {
						param: param_name.clone(),
						source,
					})?;
			kwargs.push((filter.query_key(), value));
		}
		Ok(kwargs)
	}
}

/// Expands a declaration into its flat parameter registry
///
/// `resolve` supplies the expanded registry of a related target by its
/// registered name; returning `None` leaves that marker un-expanded. The
/// function is pure in its inputs and directly callable from tests;
/// [`FilterSetRegistry::expanded`] wires it up with lazy memoized
/// resolution.
pub fn expand<R>(
	def: &FilterSetDef,
	models: &ModelRegistry,
	lookups: &LookupRegistry,
	mut resolve: R,
) -> FilterSet
where
	R: FnMut(&str) -> Option<Arc<FilterSet>>,
{
	let mut registry = def.filters.clone();

	let declared: Vec<Filter> = def.filters.values().cloned().collect();
	for marker in &declared {
		match &marker.kind {
			FilterKind::Related { target, .. } => {
				let Some(target_set) = resolve(target) else {
					debug!(
						filterset = %def.name,
						target = %target,
						"related target not registered, marker left un-expanded"
					);
					continue;
				};
				// One-level self-reference guard: a target registered for the
				// same model iterates the registry being built, where every
				// candidate is already present and gets skipped.
				let self_referential = target_set.model() == def.model;
				let source: Vec<Filter> = if self_referential {
					registry.values().cloned().collect()
				} else {
					target_set.values().cloned().collect()
				};
				populate_from_related(
					&mut registry,
					marker,
					target_set.model(),
					&source,
					self_referential,
				);

				// probe for an absent relation
				let isnull = fix_filter_field(Filter::scalar(
					marker.param_name.clone(),
					marker.field_path.clone(),
					"isnull",
					Coercion::Boolean,
				));
				registry.insert(isnull.param_name.clone(), isnull);
			}
			FilterKind::AllLookups => {
				let Some(field) = models.resolve_field(&def.model, &marker.field_path) else {
					debug!(
						filterset = %def.name,
						field = %marker.field_path,
						"field not found on model, all-lookups marker skipped"
					);
					continue;
				};
				let (lookup_names, coercion) = if field.is_reverse() {
					reverse_field_lookups(models, lookups, &field)
				} else {
					(
						lookups_for_field(lookups, &field),
						Coercion::for_field_class(&field.field_class),
					)
				};

				for lookup in &lookup_names {
					let param =
						format!("{}{}{}", marker.param_name, LOOKUP_SEP, lookup);
					let generated = fix_filter_field(Filter::scalar(
						param,
						marker.field_path.clone(),
						lookup.clone(),
						coercion,
					));
					// last registration wins on collision
					registry.insert(generated.param_name.clone(), generated);
				}

				// the bare parameter name keeps filtering as exact
				let concrete = Filter::scalar(
					marker.param_name.clone(),
					marker.field_path.clone(),
					"exact",
					coercion,
				);
				registry.insert(concrete.param_name.clone(), concrete);

				debug!(
					filterset = %def.name,
					field = %marker.field_path,
					generated = lookup_names.len(),
					"expanded all-lookups marker"
				);
			}
			FilterKind::Scalar { .. } => {}
		}
	}

	FilterSet {
		name: def.name.clone(),
		model: def.model.clone(),
		filters: registry,
	}
}

/// Copies `source` entries into `registry`, namespaced under `marker`
fn populate_from_related(
	registry: &mut IndexMap<String, Filter>,
	marker: &Filter,
	target_model: &str,
	source: &[Filter],
	self_referential: bool,
) {
	let parent_hint = target_model.to_lowercase();
	for entry in source {
		let external = format!("{}{}{}", marker.param_name, LOOKUP_SEP, entry.param_name);
		if should_skip(registry, &external, entry, self_referential) {
			debug!(param = %external, "skipping candidate during relational expansion");
			continue;
		}

		let mut copied = entry.clone();
		copied.param_name = external.clone();
		copied.field_path = format!(
			"{}{}{}",
			marker.field_path, LOOKUP_SEP, entry.field_path
		);
		if let FilterKind::Related {
			parent_relation, ..
		} = &mut copied.kind
		{
			if parent_relation.is_none() {
				*parent_relation = Some(parent_hint.clone());
			}
		}
		registry.insert(external, copied);
	}
}

/// The three relational skip tests, applied before every copy
fn should_skip(
	registry: &IndexMap<String, Filter>,
	external: &str,
	entry: &Filter,
	self_referential: bool,
) -> bool {
	// already present under the prospective name
	if registry.contains_key(external) {
		return true;
	}
	if self_referential {
		// a relational candidate re-entering the set being built
		if matches!(entry.kind, FilterKind::Related { .. })
			&& registry
				.values()
				.any(|f| matches!(f.kind, FilterKind::Related { .. }))
		{
			return true;
		}
		// a candidate that is itself an entry of the current registry
		if registry.values().any(|f| f == entry) {
			return true;
		}
	}
	false
}

/// Lookup set and coercion for a reverse relation: those of the target's
/// primary key
fn reverse_field_lookups(
	models: &ModelRegistry,
	lookups: &LookupRegistry,
	field: &FieldMeta,
) -> (Vec<String>, Coercion) {
	let pk = field
		.relation
		.as_ref()
		.and_then(|relation| models.get(&relation.target))
		.and_then(|model| model.pk_field().cloned());
	match pk {
		Some(pk) => (
			lookups_for_field(lookups, &pk),
			Coercion::for_field_class(&pk.field_class),
		),
		None => (Vec::new(), Coercion::Text),
	}
}

#[derive(Default)]
struct RegistryInner {
	defs: IndexMap<String, FilterSetDef>,
	expanded: HashMap<String, Arc<FilterSet>>,
	in_progress: HashSet<String>,
}

/// Holds filter-set definitions and their lazily expanded registries
///
/// Definitions register in any order; a related target is resolved by name
/// only when expansion first needs it, so forward and circular references
/// between definitions cannot deadlock registration. Expansion is memoized;
/// a definition referenced while its own expansion is still in progress is
/// seen in its declared (pre-expansion) shape.
///
/// # Examples
///
/// ```
/// use reinhardt_filterset::filters::{Coercion, Filter};
/// use reinhardt_filterset::filterset::{FilterSetDef, FilterSetRegistry};
/// use reinhardt_filterset::lookups::LookupRegistry;
/// use reinhardt_filterset::meta::{FieldMeta, ModelMeta, ModelRegistry};
///
/// let models = ModelRegistry::new();
/// models.register(
///     ModelMeta::new("User")
///         .field(FieldMeta::new("id", "AutoField").primary_key(true))
///         .field(FieldMeta::new("age", "IntegerField")),
/// );
/// models.register(
///     ModelMeta::new("Note")
///         .field(FieldMeta::new("title", "CharField"))
///         .field(FieldMeta::foreign_key("author", "User")),
/// );
///
/// let registry = FilterSetRegistry::new(models, LookupRegistry::with_defaults());
/// registry.register(
///     FilterSetDef::new("UserFilterSet", "User")
///         .filter(Filter::scalar("age__gte", "age", "gte", Coercion::Integer)),
/// );
/// registry.register(
///     FilterSetDef::new("NoteFilterSet", "Note")
///         .filter(Filter::related("author", "author", "UserFilterSet")),
/// );
///
/// let notes = registry.expanded("NoteFilterSet").unwrap();
/// assert!(notes.has("author__age__gte"));
/// assert!(notes.has("author__isnull"));
/// ```
pub struct FilterSetRegistry {
	models: ModelRegistry,
	lookups: LookupRegistry,
	inner: Arc<RwLock<RegistryInner>>,
}

impl FilterSetRegistry {
	pub fn new(models: ModelRegistry, lookups: LookupRegistry) -> Self {
		Self {
			models,
			lookups,
			inner: Arc::new(RwLock::new(RegistryInner::default())),
		}
	}

	/// Registers a definition under its name; re-registering replaces
	pub fn register(&self, def: FilterSetDef) {
		if let Ok(mut inner) = self.inner.write() {
			inner.expanded.remove(def.name());
			inner.defs.insert(def.name().to_string(), def);
		}
	}

	/// Registered definition names, in registration order
	pub fn names(&self) -> Vec<String> {
		if let Ok(inner) = self.inner.read() {
			inner.defs.keys().cloned().collect()
		} else {
			Vec::new()
		}
	}

	pub fn models(&self) -> &ModelRegistry {
		&self.models
	}

	pub fn lookups(&self) -> &LookupRegistry {
		&self.lookups
	}

	/// The expanded registry for `name`, expanding it on first access
	///
	/// # Errors
	///
	/// Returns [`FilterSetError::UnknownFilterSet`] when no definition is
	/// registered under `name`.
	pub fn expanded(&self, name: &str) -> FilterSetResult<Arc<FilterSet>> {
		if let Some(set) = self.memoized(name) {
			return Ok(set);
		}
		let def = self
			.def(name)
			.ok_or_else(|| FilterSetError::UnknownFilterSet(name.to_string()))?;

		if !self.mark_in_progress(name) {
			// referenced from inside its own expansion: declared shape only
			return Ok(Arc::new(FilterSet {
				name: def.name.clone(),
				model: def.model.clone(),
				filters: def.filters.clone(),
			}));
		}

		let set = Arc::new(expand(&def, &self.models, &self.lookups, |target| {
			self.expanded(target).ok()
		}));

		if let Ok(mut inner) = self.inner.write() {
			inner.in_progress.remove(name);
			inner.expanded.insert(name.to_string(), set.clone());
		}
		Ok(set)
	}

	/// Expands every registered definition, in registration order
	pub fn expand_all(&self) -> FilterSetResult<()> {
		for name in self.names() {
			self.expanded(&name)?;
		}
		Ok(())
	}

	fn memoized(&self, name: &str) -> Option<Arc<FilterSet>> {
		if let Ok(inner) = self.inner.read() {
			inner.expanded.get(name).cloned()
		} else {
			None
		}
	}

	fn def(&self, name: &str) -> Option<FilterSetDef> {
		if let Ok(inner) = self.inner.read() {
			inner.defs.get(name).cloned()
		} else {
			None
		}
	}

	fn mark_in_progress(&self, name: &str) -> bool {
		if let Ok(mut inner) = self.inner.write() {
			inner.in_progress.insert(name.to_string())
		} else {
			false
		}
	}
}
