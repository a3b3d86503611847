//! JavaScript scripting support via QuickJS (rquickjs)

mod context;
mod modules;
mod runtime;

pub use runtime::{JsScriptEngine, RunReport};
