//! # Network Monitor
//!
//! Connectivity state machine that decides when to ask the user about
//! replaying queued mutations. It knows nothing about where connectivity
//! events come from; the listener feeds it.
//!
//! ```text
//! Offline --online, queue non-empty--> SyncPending --accept--> Syncing
//!    ^                                     |                      |
//!    |                                  decline              sync done
//!    |                                     v                      |
//!    +------------ offline ------------ Online <------------------+
//! ```
//!
//! A user is prompted at most once per Offline -> Online edge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the client stands with respect to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    #[default]
    Offline,
    Online,
    /// Online with queued work, waiting for the user's answer
    SyncPending,
    Syncing,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        !matches!(self, ConnectivityState::Offline)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectivityState::Offline => "offline",
            ConnectivityState::Online => "online",
            ConnectivityState::SyncPending => "sync_pending",
            ConnectivityState::Syncing => "syncing",
        };
        f.write_str(name)
    }
}

/// What the caller should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    None,
    /// Ask whether to sync `pending` queued changes
    PromptUser { pending: usize },
    StartSync,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityMonitor {
    state: ConnectivityState,
    prompted: bool,
    auto_confirm: bool,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the prompt and start syncing as soon as the edge is seen
    pub fn with_auto_confirm(auto_confirm: bool) -> Self {
        Self {
            auto_confirm,
            ..Self::default()
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Feed one connectivity notification together with the queue length
    pub fn observe(&mut self, online: bool, pending: usize) -> MonitorAction {
        if !online {
            if self.state != ConnectivityState::Offline {
                tracing::debug!("Connectivity lost while {}", self.state);
            }
            self.state = ConnectivityState::Offline;
            self.prompted = false;
            return MonitorAction::None;
        }

        if self.state != ConnectivityState::Offline {
            return MonitorAction::None;
        }

        self.state = ConnectivityState::Online;
        if pending == 0 || self.prompted {
            return MonitorAction::None;
        }

        self.prompted = true;
        if self.auto_confirm {
            self.state = ConnectivityState::Syncing;
            MonitorAction::StartSync
        } else {
            self.state = ConnectivityState::SyncPending;
            MonitorAction::PromptUser { pending }
        }
    }

    /// Connectivity came back while a pass from before the drop is still
    /// running. Counts as this edge's sync: back to `Syncing` without a
    /// prompt. Returns `false` unless the monitor was offline.
    pub fn sync_resumed(&mut self) -> bool {
        if self.state != ConnectivityState::Offline {
            return false;
        }
        self.state = ConnectivityState::Syncing;
        self.prompted = true;
        true
    }

    /// The user's answer to the last prompt
    pub fn answer(&mut self, accepted: bool) -> MonitorAction {
        if self.state != ConnectivityState::SyncPending {
            tracing::debug!("Ignoring prompt answer while {}", self.state);
            return MonitorAction::None;
        }

        if accepted {
            self.state = ConnectivityState::Syncing;
            MonitorAction::StartSync
        } else {
            self.state = ConnectivityState::Online;
            MonitorAction::None
        }
    }

    /// A sync pass has ended, successfully or not
    pub fn sync_finished(&mut self) {
        if self.state == ConnectivityState::Syncing {
            self.state = ConnectivityState::Online;
        }
    }
}
