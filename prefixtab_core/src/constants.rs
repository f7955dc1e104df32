//! Constants for the prefix table and its C ABI

/// Hard ceiling on the number of stored prefixes.
pub const MAX_CAPACITY: usize = 64;
pub const DEFAULT_CAPACITY: usize = MAX_CAPACITY;

/// Longest valid IPv4 mask length.
pub const MAX_PREFIX_LEN: u8 = 32;

/// Boundary return values for add / delete.
pub const FFI_OK: i32 = 0;
pub const FFI_ERR: i32 = -1;

/// Boundary return value for a check that found nothing.
pub const NO_MATCH: i8 = -1;
