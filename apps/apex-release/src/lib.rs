//! Release tooling: evidence signing, guardrail measurement, and the
//! promotion policy gate.

pub mod error;
pub mod evidence;
pub mod guardrails;
pub mod policy;
