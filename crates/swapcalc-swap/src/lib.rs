pub mod format;
pub mod reducer;
pub mod session;
pub mod state;
pub mod validation;

pub use reducer::{reduce, Effect, Event, Query};
pub use session::{Caches, SwapSession};
pub use state::{Field, Lookup, Side, SidePanel, SwapState};
