mod address;
mod handler;

use parking_lot::Mutex;

use crate::relay::{RelayAddress, RelayAddressSink};

/// Sink call as observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SinkCall {
    Set(String),
    Copy,
}

/// Sink that records every call in order.
#[derive(Debug, Default)]
pub(super) struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub(super) fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }
}

impl RelayAddressSink for RecordingSink {
    fn set_relay_address(&self, address: &RelayAddress) {
        self.calls.lock().push(SinkCall::Set(address.to_string()));
    }

    fn trigger_clipboard_copy(&self) {
        self.calls.lock().push(SinkCall::Copy);
    }
}
