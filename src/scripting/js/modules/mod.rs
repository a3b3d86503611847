//! JavaScript module registrations

mod console;
mod pm;

use rquickjs::Ctx;
use crate::errors::OpenRequestError;

/// Register all built-in modules.
///
/// The context bridge must already be injected: `pm` reads its input and
/// native functions when it is installed.
pub fn register_all(ctx: &Ctx<'_>) -> Result<(), OpenRequestError> {
    console::register(ctx)?;
    pm::register(ctx)?;

    Ok(())
}
