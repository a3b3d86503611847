//! Data model shared by the executor, the schedule engine and the API client

mod collection;
mod environment;
mod request;
mod response;
mod schedule;
pub mod types;

pub use collection::{Collection, CollectionFull, CollectionUpdate, NewCollection};
pub use environment::{Environment, EnvironmentInput, EnvironmentUpdate};
pub use request::{BodyType, FieldType, FormField, HttpRequest, NewRequest, RequestUpdate};
pub use response::{RequestResponse, TestResult};
pub use schedule::{
    CollectionExecution, ExecutionStatus, ItemStatus, RequestExecution, Schedule,
    ScheduleExecution,
};
pub use types::{HeaderMap, PathVariables, VariableTable};

pub(crate) use response::body_text;
