use crate::filters::CoercionError;
use thiserror::Error;

/// Error type for filter-set construction and request-parameter translation
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FilterSetError {
	#[error("unknown filter set: {0}")]
	UnknownFilterSet(String),

	#[error("invalid value for parameter '{param}'")]
	InvalidValue {
		param: String,
		#[source]
		source: CoercionError,
	},
}

pub type FilterSetResult<T> = Result<T, FilterSetError>;
