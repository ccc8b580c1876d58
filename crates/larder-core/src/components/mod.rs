//! Component definitions.
//!
//! Components are pure data. Crew components are attached to `hecs`
//! entities in the [`Roster`](crate::roster::Roster); vessels are kept in a
//! plain map owned by the engine.

mod individual;
mod resources;
mod vessel;

pub use individual::*;
pub use resources::*;
pub use vessel::*;
