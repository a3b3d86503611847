//! Shared map aliases
//!
//! [`IndexMap`] keeps user-specified order for headers and variables so that
//! serialized requests and environments round-trip the way the user wrote them.

use indexmap::IndexMap;

/// Header name to value (one value per name, as stored by the API)
pub type HeaderMap = IndexMap<String, String>;

/// Variable name to value, for environments and the merged per-execution table
pub type VariableTable = IndexMap<String, String>;

/// Path variable name to stored value
pub type PathVariables = IndexMap<String, String>;
