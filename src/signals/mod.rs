// =============================================================================
// Signals Module
// =============================================================================
//
// Pure mapping from indicator state to a bounded directional signal. The
// composite is recomputed in full on every tick; no state survives between
// invocations beyond the emitted value.

pub mod composite;

pub use composite::{generate, Signal, SignalComponents};
