//! Minimal run‑time metrics sink.
//!
//! Prometheus export is left out; instead the host process may register a
//! raw callback that receives name/value pairs for every table metric.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_ulonglong};
use std::sync::Arc;

/// Signature for external collectors. `name` is NUL-terminated and only
/// valid for the duration of the call.
pub type StatsCallback = unsafe extern "C" fn(name: *const c_char, value: c_ulonglong);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register a callback from C/other languages. Only the first registration
/// takes effect.
///
/// # Safety
/// `cb` must stay callable for the rest of the process lifetime and be safe
/// to invoke from any thread.
#[no_mangle]
pub unsafe extern "C" fn prefix_table_register_stats_callback(cb: StatsCallback) {
    let _ = CALLBACK.set(cb);
    init();
}

/// Forwarding recorder. Uses the callback **if** it was registered.
struct FfiRecorder;

/// One named metric handle; the name is kept as a C string.
struct FfiMetric {
    name: CString,
}

impl FfiMetric {
    fn new(key: &Key) -> Arc<Self> {
        // metric names are ASCII literals; an interior NUL is dropped to empty
        let name = CString::new(key.name()).unwrap_or_default();
        Arc::new(Self { name })
    }

    fn emit(&self, value: u64) {
        if let Some(cb) = CALLBACK.get() {
            unsafe { cb(self.name.as_ptr(), value as c_ulonglong) };
        }
    }
}

impl Recorder for FfiRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(FfiMetric::new(key))
    }
    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(FfiMetric::new(key))
    }
    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(FfiMetric::new(key))
    }
}

impl metrics::CounterFn for FfiMetric {
    fn increment(&self, value: u64) {
        self.emit(value);
    }
    fn absolute(&self, value: u64) {
        self.emit(value);
    }
}

impl metrics::GaugeFn for FfiMetric {
    fn set(&self, value: f64) {
        self.emit(value as u64);
    }
    fn increment(&self, value: f64) {
        self.emit(value as u64);
    }
    fn decrement(&self, value: f64) {
        self.emit(value as u64);
    }
}

impl metrics::HistogramFn for FfiMetric {
    fn record(&self, value: f64) {
        self.emit(value as u64);
    }
}

/// Install exactly **once**. Leaves an already-installed host recorder alone.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if metrics::set_global_recorder(FfiRecorder).is_err() {
            log::debug!("[TELEMETRY] a global recorder is already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEEN_ADDS: AtomicU64 = AtomicU64::new(0);

    unsafe extern "C" fn collect(name: *const c_char, value: c_ulonglong) {
        let name = CStr::from_ptr(name).to_str().unwrap_or("");
        if name == "prefixtab_adds_total" {
            SEEN_ADDS.fetch_add(value, Ordering::SeqCst);
        }
    }

    #[test]
    fn callback_receives_table_counters() {
        unsafe { prefix_table_register_stats_callback(collect) };
        let table = crate::PrefixTable::new();
        table.add(0x0A14_0000, 16).unwrap();
        assert!(SEEN_ADDS.load(Ordering::SeqCst) >= 1);
    }
}
