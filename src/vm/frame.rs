//! Call-frame bookkeeping (§4.3 State, Call/return discipline).

#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Code-section offset to resume the caller at, after `RETURN`.
    pub return_ip: usize,
    /// Stack index at which the callee's local slot 0 lives.
    pub frame_pointer: usize,
}
