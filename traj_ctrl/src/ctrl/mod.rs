//! Closed loop trajectory control module

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod law;
mod params;
mod shaper;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use law::*;
pub use params::*;
pub use shaper::*;
pub use state::*;
