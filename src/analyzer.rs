//! `Analyzer`: the public facade combining the capture FSM, the trigger
//! subsystem, and the vendor request handler into one driven object.

use std::convert::TryFrom;

use crate::capture::{CaptureFsm, CycleInput};
use crate::config::AnalyzerOptions;
use crate::error::ProtocolError;
use crate::record::RecordSink;
use crate::trigger::TriggerSubsystem;
use crate::vendor::handler::VendorHandler;
use crate::vendor::requests::VendorRequest;
use crate::vendor::state::SupportedSpeeds;
use crate::vendor::{is_claimed, SetupPacket};

/// The whole engine: capture pipeline, trigger subsystem, and vendor
/// handler, stepped one byte-source clock cycle at a time and addressed by
/// vendor control requests the rest of the time.
pub struct Analyzer {
    capture: CaptureFsm,
    trigger: TriggerSubsystem,
    vendor: VendorHandler,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self {
            capture: CaptureFsm::new(),
            trigger: TriggerSubsystem::new(),
            vendor: VendorHandler::new(options.supported_speeds),
            options,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Advance the capture pipeline by one byte-source clock cycle,
    /// emitting any records into `sink`.
    pub fn step(&mut self, input: CycleInput, sink: &mut impl RecordSink) {
        self.capture.step(input, &mut self.trigger, sink);
    }

    pub fn overrun(&self) -> bool {
        self.capture.overrun()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_capturing()
    }

    /// Dispatch a data-IN vendor control request. Returns `Ok(None)` if the
    /// setup packet isn't claimed by this interface at all (the caller
    /// should fall through to the rest of its USB stack rather than treat
    /// this as an error).
    pub fn vendor_in(&self, setup: &SetupPacket) -> Result<Option<Vec<u8>>, ProtocolError> {
        if !is_claimed(setup) {
            return Ok(None);
        }
        let request = VendorRequest::try_from(setup.request).map_err(|_| ProtocolError::UnknownRequest(setup.request))?;
        self.vendor.handle_in(&self.trigger, request, setup.value).map(Some)
    }

    /// Dispatch a data-OUT (or no-data) vendor control request. Returns
    /// `Ok(false)` if not claimed.
    pub fn vendor_out(&mut self, setup: &SetupPacket, payload: &[u8]) -> Result<bool, ProtocolError> {
        if !is_claimed(setup) {
            return Ok(false);
        }
        let request = VendorRequest::try_from(setup.request).map_err(|_| ProtocolError::UnknownRequest(setup.request))?;
        self.vendor.handle_out(&mut self.trigger, request, setup.value, payload)?;
        Ok(true)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}
