//! Error handling and C-ABI error codes for prefixtab

use std::cell::RefCell;
use std::fmt;
use std::os::raw::c_char;

/// Why a table operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Mask length outside `0..=32`.
    InvalidMask,
    /// Base or address not representable as an unsigned 32-bit value.
    InvalidBase,
    /// The exact (base, length) pair is already stored.
    DuplicatePrefix,
    /// The exact (base, length) pair is not stored.
    NotFound,
    /// The table already holds `capacity` entries, or a requested
    /// capacity is above the hard ceiling.
    CapacityExceeded,
    ZeroCapacity,
    /// Text that does not parse as an IPv4 address or CIDR block.
    InvalidPrefix,
    Lock(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMask => write!(f, "mask length must be in 0..=32"),
            Error::InvalidBase => write!(f, "address is not an unsigned 32-bit value"),
            Error::DuplicatePrefix => write!(f, "prefix already present"),
            Error::NotFound => write!(f, "prefix not found"),
            Error::CapacityExceeded => write!(f, "capacity exceeded"),
            Error::ZeroCapacity => write!(f, "zero capacity"),
            Error::InvalidPrefix => write!(f, "invalid prefix"),
            Error::Lock(msg) => write!(f, "lock error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    CapacityExceeded = 1,
    ZeroCapacity = 2,
    InvalidMask = 3,
    InvalidBase = 4,
    DuplicatePrefix = 5,
    NotFound = 6,
    NoMatch = 7,
    InvalidPrefix = 8,
    InvalidHandle = 9,
    Utf8Error = 10,
    LockFailed = 11,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        self.as_cstr().trim_end_matches('\0')
    }

    // NUL-terminated so the same literal can cross the ABI.
    fn as_cstr(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success\0",
            ErrorCode::CapacityExceeded => "Capacity exceeded\0",
            ErrorCode::ZeroCapacity => "Zero capacity\0",
            ErrorCode::InvalidMask => "Invalid mask length\0",
            ErrorCode::InvalidBase => "Invalid base address\0",
            ErrorCode::DuplicatePrefix => "Duplicate prefix\0",
            ErrorCode::NotFound => "Not found\0",
            ErrorCode::NoMatch => "No match\0",
            ErrorCode::InvalidPrefix => "Invalid prefix\0",
            ErrorCode::InvalidHandle => "Invalid handle\0",
            ErrorCode::Utf8Error => "UTF-8 conversion error\0",
            ErrorCode::LockFailed => "Lock failed\0",
        }
    }
}

impl From<&Error> for ErrorCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::InvalidMask => ErrorCode::InvalidMask,
            Error::InvalidBase => ErrorCode::InvalidBase,
            Error::DuplicatePrefix => ErrorCode::DuplicatePrefix,
            Error::NotFound => ErrorCode::NotFound,
            Error::CapacityExceeded => ErrorCode::CapacityExceeded,
            Error::ZeroCapacity => ErrorCode::ZeroCapacity,
            Error::InvalidPrefix => ErrorCode::InvalidPrefix,
            Error::Lock(_) => ErrorCode::LockFailed,
        }
    }
}

impl From<Error> for ErrorCode {
    fn from(e: Error) -> Self {
        ErrorCode::from(&e)
    }
}

// Thread-local last error for C-ABI
thread_local! {
    static LAST_ERROR: RefCell<ErrorCode> = const { RefCell::new(ErrorCode::Success) };
}

pub fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = code);
}

pub fn get_last_error() -> ErrorCode {
    LAST_ERROR.with(|cell| *cell.borrow())
}

/// Code recorded by the most recent ABI call on this thread.
#[no_mangle]
pub extern "C" fn prefix_table_last_error() -> ErrorCode {
    get_last_error()
}

/// Static, NUL-terminated description of `code`. Never free it.
#[no_mangle]
pub extern "C" fn prefix_table_strerror(code: ErrorCode) -> *const c_char {
    code.as_cstr().as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn every_error_maps_to_a_distinct_code() {
        let all = [
            Error::InvalidMask,
            Error::InvalidBase,
            Error::DuplicatePrefix,
            Error::NotFound,
            Error::CapacityExceeded,
            Error::ZeroCapacity,
            Error::InvalidPrefix,
            Error::Lock("poisoned".into()),
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| ErrorCode::from(e) as i32).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(!codes.contains(&(ErrorCode::Success as i32)));
    }

    #[test]
    fn strerror_is_nul_terminated() {
        let s = unsafe { CStr::from_ptr(prefix_table_strerror(ErrorCode::DuplicatePrefix)) };
        assert_eq!(s.to_str().unwrap(), "Duplicate prefix");
        assert_eq!(ErrorCode::NoMatch.as_str(), "No match");
    }

    #[test]
    fn last_error_is_per_thread() {
        set_last_error(ErrorCode::NotFound);
        let other = std::thread::spawn(get_last_error).join().unwrap();
        assert_eq!(other, ErrorCode::Success);
        assert_eq!(prefix_table_last_error(), ErrorCode::NotFound);
    }
}
