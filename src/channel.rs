use std::{cell::Cell, rc::Rc};

use parse_display::Display;
use serde::{Deserialize, Serialize};

use crate::{
    listeners::{self, SharedListeners},
    Subscription,
};


/// Shared selection index of a [`SyncChannel`].
///
/// `current_index` is 1-based and lies in `1..=count`, or is `0` when `count` is `0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{current_index}/{count}")]
pub struct ChannelState {
    pub current_index: usize,
    pub count: usize,
}
impl ChannelState {
    fn new(count: usize) -> Self {
        Self {
            current_index: if count == 0 { 0 } else { 1 },
            count,
        }
    }
    fn with_count(self, count: usize) -> Self {
        let current_index = if count == 0 {
            0
        } else {
            self.current_index.clamp(1, count)
        };
        Self {
            current_index,
            count,
        }
    }
    pub fn contains(&self, index: usize) -> bool {
        (1..=self.count).contains(&index)
    }
}

/// Participant of a [`SyncChannel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Side {
    First,
    Second,
}
impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
    fn slot(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }
}

/// Two-party agreement on a selection index, e.g. between a paging control and a tab host.
///
/// A proposal equal to the current index does nothing, and an accepted proposal is only
/// reported to the other participant. Proposals that merely echo what a participant was told
/// therefore never start a notification cycle.
#[derive(Clone)]
pub struct SyncChannel(Rc<ChannelNode>);

struct ChannelNode {
    state: Cell<ChannelState>,
    listeners: [SharedListeners<ChannelState>; 2],
}

impl SyncChannel {
    pub fn new(count: usize) -> Self {
        Self(Rc::new(ChannelNode {
            state: Cell::new(ChannelState::new(count)),
            listeners: [listeners::new_shared(), listeners::new_shared()],
        }))
    }
    pub fn peer(&self, side: Side) -> Peer {
        Peer {
            node: self.0.clone(),
            side,
        }
    }
    pub fn peers(&self) -> (Peer, Peer) {
        (self.peer(Side::First), self.peer(Side::Second))
    }
    pub fn state(&self) -> ChannelState {
        self.0.state.get()
    }

    /// Change the number of selectable indexes, clamping the current index into the new range.
    ///
    /// Both participants are notified if the state changed.
    pub fn set_count(&self, count: usize) -> bool {
        self.0.set_count(count)
    }
}

impl ChannelNode {
    fn propose(&self, side: Side, index: usize) -> bool {
        let state = self.state.get();
        if index == state.current_index {
            return false;
        }
        if !state.contains(index) {
            tracing::trace!(%side, index, %state, "proposal out of range");
            return false;
        }
        let state = ChannelState {
            current_index: index,
            ..state
        };
        self.state.set(state);
        listeners::notify(&self.listeners[side.other().slot()], &state);
        true
    }
    fn set_count(&self, count: usize) -> bool {
        let old = self.state.get();
        let state = old.with_count(count);
        if state == old {
            return false;
        }
        self.state.set(state);
        for ls in &self.listeners {
            if self.state.get() != state {
                break;
            }
            listeners::notify(ls, &state);
        }
        true
    }
}

/// One side's handle to a [`SyncChannel`].
pub struct Peer {
    node: Rc<ChannelNode>,
    side: Side,
}

impl Peer {
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn state(&self) -> ChannelState {
        self.node.state.get()
    }
    pub fn current_index(&self) -> usize {
        self.state().current_index
    }
    pub fn count(&self) -> usize {
        self.state().count
    }

    /// Propose a new current index.
    ///
    /// Returns `true` if the proposal was accepted, in which case only the other participant is
    /// notified. Proposing the current index or an index outside `1..=count` does nothing.
    pub fn propose(&self, index: usize) -> bool {
        self.node.propose(self.side, index)
    }
    pub fn next(&self) -> bool {
        self.propose(self.current_index() + 1)
    }
    pub fn prev(&self) -> bool {
        match self.current_index() {
            0 => false,
            i => self.propose(i - 1),
        }
    }
    pub fn set_count(&self, count: usize) -> bool {
        self.node.set_count(count)
    }

    /// Register `f` to be called when the other participant changes the index or the count changes.
    pub fn subscribe(&self, f: impl Fn(&ChannelState) + 'static) -> Subscription {
        let ls = &self.node.listeners[self.side.slot()];
        let id = ls.borrow_mut().insert(f);
        listeners::subscription(ls, id)
    }
}
impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("side", &self.side)
            .field("state", &self.state())
            .finish()
    }
}
