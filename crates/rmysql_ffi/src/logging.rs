//! Logging setup for C callers.
//!
//! The library emits `tracing` events but installs no subscriber on its own,
//! except when a caller asks for debug output through [`crate::Attribs`]
//! and nothing else has claimed the global subscriber.

use rmysql_core::DEBUG_TARGET;
use std::ffi::{c_char, CStr};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "RMYSQL_LOG";

/// Filter used when neither the caller nor the environment supplies one.
pub const DEFAULT_FILTER: &str = "warn";

/// Builds a filter from explicit directives, else `RMYSQL_LOG`, else
/// [`DEFAULT_FILTER`].
pub(crate) fn build_filter(directives: Option<&str>) -> Option<EnvFilter> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => Some(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        ),
    }
}

fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Directives for the debug-attribute subscriber: the environment's (or the
/// default) filter with the debug target always enabled at `info`.
pub(crate) fn debug_directives(env: Option<&str>) -> String {
    let base = env
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    format!("{base},{DEBUG_TARGET}=info")
}

/// Installs a stderr subscriber so that debug-attribute events are visible.
///
/// Only the first call does anything; it is a no-op when a subscriber is
/// already installed.
pub(crate) fn ensure_debug_subscriber() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env = std::env::var(LOG_ENV).ok();
        let filter = build_filter(Some(&debug_directives(env.as_deref())))
            .or_else(|| build_filter(Some(&debug_directives(None))));
        if let Some(filter) = filter {
            install(filter);
        }
    });
}

/// Installs the global log subscriber.
///
/// # Arguments
///
/// * `filter` - `tracing` filter directives such as `"rmysql_core=debug"`,
///   or null to read `RMYSQL_LOG` (default `"warn"`)
///
/// # Returns
///
/// `true` if the subscriber was installed; `false` if the directives are
/// invalid or a subscriber is already installed.
///
/// # Safety
///
/// `filter` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn rmysql_init_logging(filter: *const c_char) -> bool {
    let directives = if filter.is_null() {
        None
    } else {
        match CStr::from_ptr(filter).to_str() {
            Ok(s) => Some(s),
            Err(_) => return false,
        }
    };

    match build_filter(directives) {
        Some(filter) => install(filter),
        None => false,
    }
}
