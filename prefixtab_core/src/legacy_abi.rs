//! Handle-less `add` / `delete` / `check`, for callers written against the
//! `IPv4.so` boundary (`int add(unsigned int base, char mask)` …).
//!
//! All three share one table created on first use. New code should open
//! its own table through [`crate::public_api`] instead.

use crate::errors::ErrorCode;
use crate::public_api::{length, status};
use crate::PrefixTable;
use once_cell::sync::Lazy;
use std::os::raw::{c_char, c_int, c_uint};

static TABLE: Lazy<PrefixTable> = Lazy::new(PrefixTable::new);

#[no_mangle]
pub extern "C" fn add(base: c_uint, mask: c_char) -> c_int {
    status(TABLE.add_raw(i64::from(base), mask as i64).map_err(ErrorCode::from))
}

#[no_mangle]
pub extern "C" fn delete(base: c_uint, mask: c_char) -> c_int {
    status(TABLE.delete_raw(i64::from(base), mask as i64).map_err(ErrorCode::from))
}

#[no_mangle]
pub extern "C" fn check(addr: c_uint) -> i8 {
    length(TABLE.check_raw(i64::from(addr)).map_err(ErrorCode::from))
}
