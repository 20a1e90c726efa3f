//! Chainable declarative filter sets for Django-style ORMs
//!
//! Filter declarations on one model can reference the filter set of a
//! related model, exposing the related set's parameters under a namespaced
//! prefix (`?author__country__name__icontains=foo`), and a single
//! all-lookups marker expands into one parameter per lookup expression the
//! field supports (`name__exact`, `name__icontains`, `name__gte`, ...).
//!
//! Expansion is a declaration-time pass: definitions collect into a
//! [`filterset::FilterSetRegistry`], and each definition's flat parameter
//! registry is computed once, before request handling starts. Model and
//! lookup metadata are supplied explicitly through [`meta::ModelRegistry`]
//! and [`lookups::LookupRegistry`], so the crate stays independent of any
//! particular database layer.
//!
//! ```
//! use reinhardt_filterset::prelude::*;
//!
//! let models = ModelRegistry::new();
//! models.register(
//!     ModelMeta::new("User")
//!         .field(FieldMeta::new("id", "AutoField").primary_key(true))
//!         .field(FieldMeta::new("name", "CharField")),
//! );
//! models.register(
//!     ModelMeta::new("Note")
//!         .field(FieldMeta::new("title", "CharField"))
//!         .field(FieldMeta::foreign_key("author", "User")),
//! );
//!
//! let registry = FilterSetRegistry::new(models, LookupRegistry::with_defaults());
//! registry.register(
//!     FilterSetDef::new("UserFilterSet", "User").filter(Filter::all_lookups("name", "name")),
//! );
//! registry.register(
//!     FilterSetDef::new("NoteFilterSet", "Note")
//!         .filter(Filter::related("author", "author", "UserFilterSet")),
//! );
//!
//! let notes = registry.expanded("NoteFilterSet").unwrap();
//! assert!(notes.has("author__name__icontains"));
//! assert!(notes.has("author__isnull"));
//! ```

pub mod error;
pub mod filters;
pub mod filterset;
pub mod lookups;
pub mod meta;

pub use error::{FilterSetError, FilterSetResult};
pub use filters::{Coercion, CoercionError, Filter, FilterKind, FilterValue, fix_filter_field};
pub use filterset::{FilterSet, FilterSetDef, FilterSetRegistry, expand};
pub use lookups::{LookupDescriptor, LookupRegistry, lookups_for_field, lookups_for_transform};
pub use meta::{FieldMeta, LOOKUP_SEP, ModelMeta, ModelRegistry, RelationKind, RelationMeta};

/// Common imports for declaring and expanding filter sets
pub mod prelude {
	pub use crate::error::{FilterSetError, FilterSetResult};
	pub use crate::filters::{Coercion, Filter, FilterKind, FilterValue};
	pub use crate::filterset::{FilterSet, FilterSetDef, FilterSetRegistry};
	pub use crate::lookups::{LookupDescriptor, LookupRegistry};
	pub use crate::meta::{FieldMeta, LOOKUP_SEP, ModelMeta, ModelRegistry};
}
