//! JTAG TAP (Test Access Port) state tracker.
//!
//! A pure transition function over the 16-state IEEE 1149.1 graph, used by
//! the backend to know which state a `shift:` command's TMS sequence will
//! leave the TAP in — which is what the Capture-IR workaround checks.
//! Carries no hardware knowledge; `TapState` transitions are sampled on
//! every TCK rising edge, one bit of TMS at a time.

/// One of the 16 states of the IEEE 1149.1 TAP controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapState {
    TestLogicReset,
    RunTestIdle,
    SelectDrScan,
    CaptureDr,
    ShiftDr,
    Exit1Dr,
    PauseDr,
    Exit2Dr,
    UpdateDr,
    SelectIrScan,
    CaptureIr,
    ShiftIr,
    Exit1Ir,
    PauseIr,
    Exit2Ir,
    UpdateIr,
}

impl TapState {
    /// The state reached from `self` after one TCK edge with the given TMS
    /// value. This is the complete IEEE 1149.1 transition table; every
    /// state has exactly one successor for TMS=0 and one for TMS=1.
    pub fn next(self, tms: bool) -> TapState {
        use TapState::*;
        match (self, tms) {
            (TestLogicReset, false) => RunTestIdle,
            (TestLogicReset, true) => TestLogicReset,

            (RunTestIdle, false) => RunTestIdle,
            (RunTestIdle, true) => SelectDrScan,

            (SelectDrScan, false) => CaptureDr,
            (SelectDrScan, true) => SelectIrScan,

            (CaptureDr, false) => ShiftDr,
            (CaptureDr, true) => Exit1Dr,

            (ShiftDr, false) => ShiftDr,
            (ShiftDr, true) => Exit1Dr,

            (Exit1Dr, false) => PauseDr,
            (Exit1Dr, true) => UpdateDr,

            (PauseDr, false) => PauseDr,
            (PauseDr, true) => Exit2Dr,

            (Exit2Dr, false) => ShiftDr,
            (Exit2Dr, true) => UpdateDr,

            (UpdateDr, false) => RunTestIdle,
            (UpdateDr, true) => SelectDrScan,

            (SelectIrScan, false) => CaptureIr,
            (SelectIrScan, true) => TestLogicReset,

            (CaptureIr, false) => ShiftIr,
            (CaptureIr, true) => Exit1Ir,

            (ShiftIr, false) => ShiftIr,
            (ShiftIr, true) => Exit1Ir,

            (Exit1Ir, false) => PauseIr,
            (Exit1Ir, true) => UpdateIr,

            (PauseIr, false) => PauseIr,
            (PauseIr, true) => Exit2Ir,

            (Exit2Ir, false) => ShiftIr,
            (Exit2Ir, true) => UpdateIr,

            (UpdateIr, false) => RunTestIdle,
            (UpdateIr, true) => SelectDrScan,
        }
    }
}

/// Folds a TAP state through a sequence of TMS bits, returning the final
/// state. An empty sequence leaves `start` unchanged.
pub fn track<I: IntoIterator<Item = bool>>(start: TapState, tms_bits: I) -> TapState {
    tms_bits.into_iter().fold(start, TapState::next)
}
