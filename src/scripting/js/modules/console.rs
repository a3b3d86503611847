//! Console module for JavaScript
//!
//! Routes `console.*` output to tracing under the `script` target.

use rquickjs::{Ctx, Function};
use tracing::{debug, error, info, warn};

use crate::errors::OpenRequestError;

const CONSOLE_JS: &str = r#"
(function (global) {
  const emit = global.__pm_console;
  function format(value) {
    if (typeof value === "string") return value;
    try {
      const json = JSON.stringify(value);
      return json === undefined ? String(value) : json;
    } catch (e) {
      return String(value);
    }
  }
  function logger(level) {
    return function () {
      emit(level, Array.prototype.map.call(arguments, format).join(" "));
    };
  }
  global.console = {
    log: logger("log"),
    info: logger("info"),
    warn: logger("warn"),
    error: logger("error"),
    debug: logger("debug"),
  };
})(globalThis);
"#;

pub fn register(ctx: &Ctx<'_>) -> Result<(), OpenRequestError> {
    ctx.globals()
        .set("__pm_console", Function::new(ctx.clone(), emit)?)
        .map_err(|e| OpenRequestError::Script(format!("Failed to set console bridge: {}", e)))?;

    ctx.eval::<(), _>(CONSOLE_JS)
        .map_err(|e| OpenRequestError::Script(format!("Failed to install console: {}", e)))?;

    Ok(())
}

fn emit(level: String, message: String) {
    match level.as_str() {
        "error" => error!(target: "script", "{}", message),
        "warn" => warn!(target: "script", "{}", message),
        "debug" => debug!(target: "script", "{}", message),
        _ => info!(target: "script", "{}", message),
    }
}
