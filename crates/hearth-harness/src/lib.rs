//! Deterministic simulation harness for the Hearth relay.
//!
//! Drives the real [`ServerDriver`](hearth_server::ServerDriver) through an
//! in-memory transport and a manually advanced clock. No sockets, no threads,
//! no wall-clock time: a test is a sequence of events and the transcript each
//! client received.
//!
//! # Model-Based Testing
//!
//! The `model` module holds a reference implementation of registration,
//! rooms and leader election. Operations are applied to both the model and a
//! [`SimServer`], and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties of the relay state that hold
//! after every event. Use [`InvariantRegistry::standard()`] for all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_server;
pub mod sim_transport;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, LeaderValidity, MembershipConsistency,
    NoEmptyRooms, RoomSnapshot, SessionSnapshot, SingleRoomMembership, StateConsistency,
    SystemSnapshot, Violation,
};
pub use model::{ClientSlot, ModelRoom, ModelWorld, ObservableState, Operation, QueryKind, ROOM_NAMES};
pub use sim_env::{DEFAULT_WALL_CLOCK_SECS, SimEnv};
pub use sim_server::SimServer;
pub use sim_transport::SimTransport;
