//! Domain model: the verification aggregate, its attempts and event log,
//! and the ports the engine talks to.

pub mod attempt;
pub mod event;
pub mod evidence;
pub mod ports;
pub mod report;
pub mod verification;
