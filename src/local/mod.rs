//! Local handlers (§4.2): answer from in-process state, no upstream I/O.

pub mod cache;
pub mod constans;
pub mod hosts;
