//! Action executor.
//!
//! Runs driver actions against a [`LineSink`], in order. Sends and broadcasts
//! go through [`Fanout`]; whatever an eviction produces (departure notices,
//! leader announcements, closes) is queued behind the remaining actions and
//! runs in the same call.

use std::collections::VecDeque;

use hearth_core::{ConnectionId, Environment};

use crate::{
    driver::{LogLevel, ServerAction, ServerDriver},
    fanout::{Fanout, LineSink},
};

/// What executing a batch of actions did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Lines handed to the transport
    pub delivered: usize,
    /// Peers evicted after a failed write
    pub evicted: Vec<ConnectionId>,
    /// Connections whose transport was closed
    pub closed: Vec<ConnectionId>,
}

/// Execute `actions` and everything they cause.
pub fn execute_actions<E, S>(
    driver: &mut ServerDriver<E>,
    actions: Vec<ServerAction>,
    sink: &mut S,
) -> ExecutionReport
where
    E: Environment,
    S: LineSink,
{
    let mut queue: VecDeque<ServerAction> = actions.into();
    let mut report = ExecutionReport::default();

    while let Some(action) = queue.pop_front() {
        let outcome = match action {
            ServerAction::SendToConnection { connection, line } => {
                Fanout::new(driver, sink).to_connection(connection, &line)
            },
            ServerAction::BroadcastToRoom { room, line, exclude } => {
                Fanout::new(driver, sink).to_room(room.as_str(), &line, exclude)
            },
            ServerAction::BroadcastToAll { line, exclude } => {
                Fanout::new(driver, sink).to_all(&line, exclude)
            },
            ServerAction::CloseConnection { connection, reason } => {
                tracing::debug!("Closing connection {}: {}", connection, reason);
                sink.close(connection, &reason);
                report.closed.push(connection);
                continue;
            },
            ServerAction::Log { level, message } => {
                match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                }
                continue;
            },
        };

        report.delivered += outcome.delivered;
        report.evicted.extend(outcome.evicted);
        queue.extend(outcome.follow_up);
    }

    report
}
