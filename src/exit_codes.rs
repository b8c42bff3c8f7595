//! Exit code constants for the crewfile CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, unreadable file)
//! - 2: Parse failure (template, YAML structure, missing fields, duplicates)
//! - 3: Assembly failure (unresolved references, cycles, unknown selectors)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or an unreadable document.
pub const USER_ERROR: i32 = 1;

/// Parse failure: template rendering, YAML structure, or declaration validation.
pub const PARSE_FAILURE: i32 = 2;

/// Assembly failure: unresolved references, dependency cycles, unknown model selectors.
pub const ASSEMBLY_FAILURE: i32 = 3;
