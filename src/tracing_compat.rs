//! Logging shim over `tracing`.
//!
//! With the `tracing-integration` feature (on by default) these are the
//! `tracing` macros. Without it they expand to closures that borrow every
//! field and format argument without evaluating them, so variables that only
//! feed a log line still count as used and call sites never need their own
//! `cfg` guards.

#[cfg(feature = "tracing-integration")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
pub(crate) mod noop {
    /// Accepts the `tracing` field syntax used in this crate: `name = value`,
    /// `name = %value`, `name = ?value`, `%value`, `?value`, shorthand `name`,
    /// then an optional message literal with format arguments.
    macro_rules! noop_log {
        () => {};
        ($msg:literal $(, $arg:expr)* $(,)?) => {{
            $( let _ = || { let _ = &$arg; }; )*
        }};
        ($name:ident = %$value:expr $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
        ($name:ident = ?$value:expr $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
        ($name:ident = $value:expr $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
        (%$value:expr $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
        (?$value:expr $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
        ($value:ident $(, $($rest:tt)*)?) => {{
            let _ = || { let _ = &$value; };
            $crate::tracing_compat::noop::noop_log!($($($rest)*)?);
        }};
    }

    #[allow(unused_imports)]
    pub(crate) use noop_log;
    #[allow(unused_imports)]
    pub(crate) use noop_log as debug;
    #[allow(unused_imports)]
    pub(crate) use noop_log as error;
    #[allow(unused_imports)]
    pub(crate) use noop_log as info;
    #[allow(unused_imports)]
    pub(crate) use noop_log as trace;
    #[allow(unused_imports)]
    pub(crate) use noop_log as warn;
}

#[cfg(not(feature = "tracing-integration"))]
#[allow(unused_imports)]
pub(crate) use noop::{debug, error, info, trace, warn};
