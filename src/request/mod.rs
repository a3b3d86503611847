//! Request execution module
//!
//! Variable resolution, body building and the executor that runs a stored
//! request end to end.

mod body;
mod executor;
mod params;
mod variables;

pub use body::{
    remove_header, resolve_body, set_header, FileHandle, FileRegistry, MultipartField, RequestBody,
    PLACEHOLDER_FILE_CONTENT,
};
pub use executor::{
    EnvironmentUpdateFn, RequestExecutor, DEFAULT_TIMEOUT, TEST_EXECUTION_ERROR, USER_AGENT_STRING,
};
pub use params::{
    build_headers_from_pairs, build_url_with_params, parse_headers, parse_url_params, KeyValuePair,
};
pub use variables::{
    extract_path_variables, merge_environments, replace_path_variables, replace_variables,
    resolve_url, PathVariable,
};
