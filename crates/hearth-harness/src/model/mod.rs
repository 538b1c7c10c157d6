//! Reference model for model-based testing.
//!
//! [`ModelWorld`] is a deliberately naive re-statement of the relay's
//! membership and leader rules: plain vectors and linear scans. Random
//! [`Operation`] sequences are applied to both the model and a
//! [`SimServer`](crate::SimServer), and their [`ObservableState`]s must match
//! after every step.

mod operation;
mod world;

pub use operation::{ClientSlot, Operation, QueryKind, ROOM_NAMES};
pub use world::{ModelRoom, ModelWorld, ObservableState};
