use crate::{
    constants::{FFI_ERR, FFI_OK, NO_MATCH},
    errors::{set_last_error, ErrorCode},
    helpers::ipv4_to_u32,
    Prefix, PrefixTable, TableConfig,
};
use std::{
    ffi::CStr,
    os::raw::{c_char, c_int, c_uint},
};

/// Opaque handle – **always** treated as owned by the caller.
pub type PrefixTableHandle = *mut PrefixTable;

// ─────────────────────────── helpers ─────────────────────────────────── //

#[inline]
fn cstr<'a>(p: *const c_char) -> Result<&'a str, ErrorCode> {
    if p.is_null() {
        return Err(ErrorCode::Utf8Error);
    }
    unsafe { CStr::from_ptr(p) }
        .to_str()
        .map_err(|_| ErrorCode::Utf8Error)
}

#[inline]
fn table<'a>(h: PrefixTableHandle) -> Result<&'a PrefixTable, ErrorCode> {
    unsafe { h.as_ref() }.ok_or(ErrorCode::InvalidHandle)
}

/// Record the outcome and collapse it to the 0 / -1 boundary contract.
#[inline]
pub(crate) fn status(r: Result<(), ErrorCode>) -> c_int {
    match r {
        Ok(()) => {
            set_last_error(ErrorCode::Success);
            FFI_OK
        }
        Err(code) => {
            set_last_error(code);
            FFI_ERR
        }
    }
}

/// Record the outcome and collapse it to a mask length or -1.
#[inline]
pub(crate) fn length(r: Result<Option<u8>, ErrorCode>) -> i8 {
    match r {
        Ok(Some(plen)) => {
            set_last_error(ErrorCode::Success);
            plen as i8
        }
        Ok(None) => {
            set_last_error(ErrorCode::NoMatch);
            NO_MATCH
        }
        Err(code) => {
            set_last_error(code);
            NO_MATCH
        }
    }
}

// ───────────────────────── lifetime ──────────────────────────────────── //

/// Create an empty table holding up to `capacity` prefixes (1..=64).
/// Returns `Success` **and** stores the handle in `*out`
/// -- or an error code otherwise.
#[no_mangle]
pub extern "C" fn prefix_table_open(capacity: usize, out: *mut PrefixTableHandle) -> ErrorCode {
    if out.is_null() {
        set_last_error(ErrorCode::InvalidHandle);
        return ErrorCode::InvalidHandle;
    }
    let code = match PrefixTable::with_config(TableConfig { capacity }) {
        Ok(t) => unsafe {
            *out = Box::into_raw(Box::new(t));
            ErrorCode::Success
        },
        Err(e) => ErrorCode::from(e),
    };
    set_last_error(code);
    code
}

#[no_mangle]
pub extern "C" fn prefix_table_close(h: PrefixTableHandle) {
    if !h.is_null() {
        unsafe { drop(Box::from_raw(h)) };
    }
}

// ───────────────────────── add / delete / check ──────────────────────── //

/// 0 on success, -1 on any failure. `prefix_table_last_error` says which.
#[no_mangle]
pub extern "C" fn prefix_table_add(h: PrefixTableHandle, base: c_uint, mask: c_char) -> c_int {
    status(table(h).and_then(|t| {
        t.add_raw(i64::from(base), mask as i64)
            .map_err(ErrorCode::from)
    }))
}

#[no_mangle]
pub extern "C" fn prefix_table_delete(h: PrefixTableHandle, base: c_uint, mask: c_char) -> c_int {
    status(table(h).and_then(|t| {
        t.delete_raw(i64::from(base), mask as i64)
            .map_err(ErrorCode::from)
    }))
}

/// Longest matching mask length for `addr`, or -1.
#[no_mangle]
pub extern "C" fn prefix_table_check(h: PrefixTableHandle, addr: c_uint) -> i8 {
    length(table(h).and_then(|t| t.check_raw(i64::from(addr)).map_err(ErrorCode::from)))
}

// ───────────────────── text forms ────────────────────────────────────── //

/// Add `"a.b.c.d/len"` (or a bare address as `/32`).
#[no_mangle]
pub extern "C" fn prefix_table_add_cidr(h: PrefixTableHandle, cidr_utf8: *const c_char) -> c_int {
    status(table(h).and_then(|t| {
        let p: Prefix = cstr(cidr_utf8)?.parse()?;
        t.add(p.base(), p.prefix_len()).map_err(ErrorCode::from)
    }))
}

#[no_mangle]
pub extern "C" fn prefix_table_delete_cidr(
    h: PrefixTableHandle,
    cidr_utf8: *const c_char,
) -> c_int {
    status(table(h).and_then(|t| {
        let p: Prefix = cstr(cidr_utf8)?.parse()?;
        t.delete(p.base(), p.prefix_len()).map_err(ErrorCode::from)
    }))
}

#[no_mangle]
pub extern "C" fn prefix_table_check_str(h: PrefixTableHandle, addr_utf8: *const c_char) -> i8 {
    length(table(h).and_then(|t| {
        let addr = ipv4_to_u32(cstr(addr_utf8)?)?;
        Ok(t.check(addr))
    }))
}

// ───────────────────── size & maintenance ────────────────────────────── //

#[no_mangle]
pub extern "C" fn prefix_table_len(h: PrefixTableHandle, out: *mut u64) -> ErrorCode {
    if out.is_null() {
        set_last_error(ErrorCode::InvalidHandle);
        return ErrorCode::InvalidHandle;
    }
    let code = match table(h) {
        Ok(t) => {
            unsafe { *out = t.len() as u64 };
            ErrorCode::Success
        }
        Err(code) => code,
    };
    set_last_error(code);
    code
}

#[no_mangle]
pub extern "C" fn prefix_table_clear(h: PrefixTableHandle) -> c_int {
    status(table(h).and_then(|t| t.clear().map(|_| ()).map_err(ErrorCode::from)))
}
