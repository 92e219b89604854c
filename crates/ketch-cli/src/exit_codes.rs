//! Process exit codes
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - invalid resource, name or value
pub const VALIDATION_ERROR: i32 = 2;

/// Render error - an application chart could not be assembled
pub const RENDER_ERROR: i32 = 3;

/// A named resource does not exist
pub const NOT_FOUND: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// The API server rejected or failed a request
pub const CLUSTER_ERROR: i32 = 6;

/// Usage error - conflicting arguments or options (sysexits.h EX_USAGE)
pub const USAGE_ERROR: i32 = 64;
