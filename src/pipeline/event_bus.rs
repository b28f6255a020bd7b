// src/pipeline/event_bus.rs
//
// Alert lifecycle events published by the analyzer and drained by the run
// loop, so the analysis code never has to know who is listening.

use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Started {
        track_id: u32,
        label: String,
        timestamp: f64,
        clip_dispatched: bool,
    },
    Cleared {
        track_id: u32,
        timestamp: f64,
        duration: f64,
    },
    TimedOut {
        track_id: u32,
        timestamp: f64,
        cooldown_until: f64,
    },
    EntitiesEvicted {
        count: usize,
        timestamp: f64,
    },
}

pub struct EventBus {
    events: VecDeque<AlertEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: AlertEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<AlertEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evicted(count: usize) -> AlertEvent {
        AlertEvent::EntitiesEvicted {
            count,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        bus.publish(evicted(1));
        bus.publish(evicted(2));
        bus.publish(evicted(3));
        assert_eq!(bus.drain(), vec![evicted(2), evicted(3)]);
        assert!(bus.drain().is_empty());
    }
}
