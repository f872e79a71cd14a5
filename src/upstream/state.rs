//! Fetcher state machine
//!
//! `Created → Opening → Streaming ⇄ Retrying → Closed`. `Closed` is terminal.

/// Lifecycle state of an upstream fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherState {
    /// Constructed, background task not started
    Created,
    /// First connection attempt in progress
    Opening,
    /// Connected, bytes flowing into the buffer
    Streaming,
    /// Connection lost or refused, backing off before the next attempt
    Retrying,
    /// Terminal: closed explicitly, upstream ended, or retry budget exhausted
    Closed,
}

impl FetcherState {
    /// Whether the fetcher can still deliver bytes
    pub fn is_closed(self) -> bool {
        self == FetcherState::Closed
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: FetcherState) -> bool {
        use FetcherState::*;

        matches!(
            (self, next),
            (Created, Opening)
                | (Opening, Streaming)
                | (Opening, Retrying)
                | (Streaming, Retrying)
                | (Retrying, Streaming)
                | (Created | Opening | Streaming | Retrying, Closed)
        )
    }
}

impl std::fmt::Display for FetcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FetcherState::Created => "created",
            FetcherState::Opening => "opening",
            FetcherState::Streaming => "streaming",
            FetcherState::Retrying => "retrying",
            FetcherState::Closed => "closed",
        };
        f.write_str(name)
    }
}
