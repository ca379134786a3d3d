// ── Bounded history storage ──
//
// Fixed-capacity ring buffers, and per-key collections of them that back
// every rolling series the engine keeps.

mod history;
mod ring;

pub use history::{DEFAULT_WINDOW, RollingHistoryStore};
pub use ring::{Iter, RingBuffer};
