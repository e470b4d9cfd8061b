//! Routes `log` records to the host through a UniFFI callback
//!
//! The bridge is installed once per process. The sink and level can be swapped
//! at any time afterwards; with no sink, records are dropped.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

static BRIDGE: OnceLock<CallbackBridge> = OnceLock::new();

struct BridgeState {
    sink: Option<Arc<dyn LogCallback>>,
    filter: LevelFilter,
}

struct CallbackBridge {
    state: RwLock<BridgeState>,
}

impl CallbackBridge {
    fn with_filter(filter: LevelFilter) -> Self {
        Self {
            state: RwLock::new(BridgeState { sink: None, filter }),
        }
    }

    fn update(&self, change: impl FnOnce(&mut BridgeState)) {
        if let Ok(mut state) = self.state.write() {
            change(&mut state);
        }
    }

    /// The sink for a record at `level`, if one should receive it
    fn sink_for(&self, level: Level) -> Option<Arc<dyn LogCallback>> {
        let state = self.state.read().ok()?;
        if level > state.filter {
            return None;
        }
        state.sink.clone()
    }
}

impl Log for CallbackBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.sink_for(metadata.level()).is_some()
    }

    fn log(&self, record: &Record) {
        // The read guard is released before calling out; the host may log back
        let Some(sink) = self.sink_for(record.level()) else {
            return;
        };
        sink.on_log(
            FfiLogLevel::from(record.level()),
            record.target().to_string(),
            record.args().to_string(),
        );
    }

    fn flush(&self) {}
}

/// Install the bridge as the process logger.
///
/// Errors if some other logger got there first. The bridge itself is created
/// either way, so [`set_log_callback`] and [`set_log_level`] still apply.
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let filter = max_level.to_level_filter();
    let bridge = BRIDGE.get_or_init(|| CallbackBridge::with_filter(filter));
    log::set_logger(bridge)?;
    log::set_max_level(filter);
    Ok(())
}

/// Swap the host sink. `None` silences logging.
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(bridge) = BRIDGE.get() {
        bridge.update(|state| state.sink = callback);
    }
}

pub fn set_log_level(level: Level) {
    let filter = level.to_level_filter();
    if let Some(bridge) = BRIDGE.get() {
        bridge.update(|state| state.filter = filter);
        log::set_max_level(filter);
    }
}
