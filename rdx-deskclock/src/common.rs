//! Contains common, primitive types shared across the Deskclock core.
//!
//! Every instant in the core is a plain epoch-millisecond integer. Elapsed and
//! remaining durations are derived from these anchors, never accumulated from
//! per-beat deltas, so the helpers here deal in the same unit.

use slotmap::new_key_type;

/// Wall-clock instant in milliseconds since the Unix epoch.
pub type EpochMs = i64;

new_key_type! {
    /// Uniquely and safely identifies a scheduled heartbeat or deadline job.
    ///
    /// Returned when a recurring callback is registered with the engine's
    /// heartbeat registry. Keys are never reused, so cancelling with a stale id
    /// is a harmless no-op rather than cancelling someone else's job.
    pub struct HeartbeatId;
}

/// Returns `later - earlier`, clamped at zero.
///
/// A system clock that jumps backwards produces a negative delta for a moment;
/// callers see zero instead of a negative duration.
pub fn elapsed_between(earlier: EpochMs, later: EpochMs) -> i64 {
    later.saturating_sub(earlier).max(0)
}
