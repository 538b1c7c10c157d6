//! The reference model.

use std::collections::{BTreeMap, BTreeSet};

use super::operation::ClientSlot;

/// What the relay lets a client observe, reduced to values the model and the
/// real server can both produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableState {
    /// Registered usernames, in registration order.
    pub users: Vec<String>,
    /// Live rooms.
    pub rooms: BTreeMap<String, ModelRoom>,
}

/// One room as seen from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRoom {
    /// Usernames of the members.
    pub members: BTreeSet<String>,
    /// Username of the leader.
    pub leader: Option<String>,
}

#[derive(Debug, Clone)]
struct ModelClient {
    room: Option<String>,
    rank: u64,
}

/// Reference model of registration, rooms and leaders.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    clients: Vec<Option<ModelClient>>,
    next_rank: u64,
}

impl ModelWorld {
    /// `num_clients` disconnected clients.
    pub fn new(num_clients: usize) -> Self {
        Self { clients: vec![None; num_clients], next_rank: 0 }
    }

    /// Number of client slots.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Username a slot registers with.
    pub fn username(slot: ClientSlot) -> String {
        format!("user{slot}")
    }

    /// Whether `slot` has a registered connection.
    pub fn is_connected(&self, slot: ClientSlot) -> bool {
        self.client(slot).is_some()
    }

    /// Room `slot` is in.
    pub fn room_of(&self, slot: ClientSlot) -> Option<&str> {
        self.client(slot).and_then(|client| client.room.as_deref())
    }

    /// Register `slot`. Returns false when it already was.
    pub fn login(&mut self, slot: ClientSlot) -> bool {
        let Some(entry) = self.clients.get_mut(usize::from(slot)) else {
            return false;
        };
        if entry.is_some() {
            return false;
        }

        *entry = Some(ModelClient { room: None, rank: self.next_rank });
        self.next_rank += 1;
        true
    }

    /// Move `slot` into `room`. Blank names and the current room change
    /// nothing.
    pub fn join(&mut self, slot: ClientSlot, room: &str) {
        let room = room.trim();
        if room.is_empty() {
            return;
        }
        if let Some(Some(client)) = self.clients.get_mut(usize::from(slot)) {
            client.room = Some(room.to_string());
        }
    }

    /// Drop `slot`'s connection.
    pub fn disconnect(&mut self, slot: ClientSlot) {
        if let Some(entry) = self.clients.get_mut(usize::from(slot)) {
            *entry = None;
        }
    }

    /// Slots that receive a chat line from `slot`: everyone else in its room.
    pub fn chat_recipients(&self, slot: ClientSlot) -> BTreeSet<ClientSlot> {
        let Some(room) = self.room_of(slot) else {
            return BTreeSet::new();
        };
        self.members(room).filter(|&other| other != slot).collect()
    }

    /// Leader of `room`: the member that registered first.
    pub fn leader_of(&self, room: &str) -> Option<ClientSlot> {
        self.members(room).min_by_key(|&slot| self.client(slot).map_or(u64::MAX, |client| client.rank))
    }

    /// Everything the model says a client could observe.
    pub fn observable_state(&self) -> ObservableState {
        let mut registered: Vec<(u64, ClientSlot)> = self
            .slots()
            .filter_map(|slot| self.client(slot).map(|client| (client.rank, slot)))
            .collect();
        registered.sort_unstable();

        let mut rooms: BTreeMap<String, ModelRoom> = BTreeMap::new();
        for slot in self.slots() {
            if let Some(room) = self.room_of(slot) {
                rooms.entry(room.to_string()).or_default().members.insert(Self::username(slot));
            }
        }
        for (name, room) in &mut rooms {
            room.leader = self.leader_of(name).map(Self::username);
        }

        ObservableState {
            users: registered.into_iter().map(|(_, slot)| Self::username(slot)).collect(),
            rooms,
        }
    }

    fn client(&self, slot: ClientSlot) -> Option<&ModelClient> {
        self.clients.get(usize::from(slot)).and_then(Option::as_ref)
    }

    fn slots(&self) -> impl Iterator<Item = ClientSlot> + '_ {
        (0..self.clients.len()).map(|slot| slot as ClientSlot)
    }

    fn members<'a>(&'a self, room: &'a str) -> impl Iterator<Item = ClientSlot> + 'a {
        self.slots().filter(move |&slot| self.room_of(slot) == Some(room))
    }
}
