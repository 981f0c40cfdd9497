use std::collections::VecDeque;

use crate::components::{RegionId, Tick};

/// Completed map operations. The host drains these to redraw the chart
/// once per operation. Every variant includes tick: Tick.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    VariableAdded {
        variable: String,
        tick: Tick,
    },
    VariableRemoved {
        variable: String,
        tick: Tick,
    },
    DatasetSelected {
        dataset: String,
        tick: Tick,
    },
    DatasetDeselected {
        dataset: String,
        tick: Tick,
    },
    DatasetSwitched {
        from: String,
        to: String,
        animated: bool,
        tick: Tick,
    },
    RegionToggled {
        region: RegionId,
        highlighted: bool,
        tick: Tick,
    },
    TopNChanged {
        n: usize,
        tick: Tick,
    },
    ExtrusionRescaled {
        multiplier: f64,
        tick: Tick,
    },
    PauseToggled {
        paused: bool,
        tick: Tick,
    },
    /// An operation arrived during a transition and was queued.
    OperationDeferred {
        queued: usize,
        tick: Tick,
    },
}

impl MapEvent {
    pub fn tick(&self) -> Tick {
        match self {
            MapEvent::VariableAdded { tick, .. }
            | MapEvent::VariableRemoved { tick, .. }
            | MapEvent::DatasetSelected { tick, .. }
            | MapEvent::DatasetDeselected { tick, .. }
            | MapEvent::DatasetSwitched { tick, .. }
            | MapEvent::RegionToggled { tick, .. }
            | MapEvent::TopNChanged { tick, .. }
            | MapEvent::ExtrusionRescaled { tick, .. }
            | MapEvent::PauseToggled { tick, .. }
            | MapEvent::OperationDeferred { tick, .. } => *tick,
        }
    }
}

/// Bounded log of map events. Once full, each push drops the oldest entry.
pub struct EventLog {
    entries: VecDeque<MapEvent>,
    limit: usize,
}

impl EventLog {
    /// A zero limit is raised to one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, event: MapEvent) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MapEvent> {
        self.entries.iter()
    }

    /// Last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&MapEvent> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// Events stamped after `since`, oldest first.
    pub fn since(&self, since: Tick) -> Vec<&MapEvent> {
        self.entries.iter().filter(|e| e.tick() > since).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
