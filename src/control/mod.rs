//! Control primitives driven by the FSM: the moisture debouncer and the
//! pump cycle controller.

pub mod debouncer;
pub mod pump;
