pub mod error;
pub mod config;
pub mod handles;
pub mod resources;
pub mod fsdriver;
pub mod materialize;
pub mod catalog;
pub mod remote;
pub mod consolidate;
pub mod session;

pub use error::{GridError, GridResult, MergeStep};
pub use config::GridConfig;
pub use session::SessionContext;

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
