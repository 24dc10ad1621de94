//! Engine event bus
//!
//! Key principles:
//! - Key-value arguments (no order dependency)
//! - Registration-free consumption: the engine context drains due events
//!   once per frame and routes them to the owning systems
//! - Queuing support (immediate + deferred delivery)

use std::collections::HashMap;

/// Event code identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    /// The drawable surface changed size
    WindowResized,
    /// Render mode changed (normals/lighting debug views and the like)
    RenderModeChanged,
    /// A texture finished (re)loading
    TextureReloaded,
}

/// Variant for type-safe event arguments
#[derive(Debug, Clone)]
pub enum EventArg {
    /// Width/height pair
    Size(u32, u32),
    /// Integer mode discriminator
    Mode(i32),
    /// Resource name
    Name(String),
}

/// Event with code and key-value arguments
#[derive(Debug, Clone)]
pub struct Event {
    /// Code identifying the event
    pub code: EventCode,
    /// Timestamp when the event was created (seconds)
    pub timestamp: f64,
    args: HashMap<&'static str, EventArg>,
}

impl Event {
    /// Create a new event with the given code and timestamp
    pub fn new(code: EventCode, timestamp: f64) -> Self {
        Self {
            code,
            timestamp,
            args: HashMap::new(),
        }
    }

    /// Convenience constructor for a resize event
    pub fn resized(width: u32, height: u32, timestamp: f64) -> Self {
        Self::new(EventCode::WindowResized, timestamp)
            .with_arg("size", EventArg::Size(width, height))
    }

    /// Add an argument to the event (builder pattern)
    pub fn with_arg(mut self, key: &'static str, value: EventArg) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&EventArg> {
        self.args.get(key)
    }

    /// Get the size argument if present
    pub fn get_size(&self) -> Option<(u32, u32)> {
        if let Some(EventArg::Size(w, h)) = self.get_arg("size") {
            Some((*w, *h))
        } else {
            None
        }
    }

    /// Get the mode argument if present
    pub fn get_mode(&self) -> Option<i32> {
        if let Some(EventArg::Mode(mode)) = self.get_arg("mode") {
            Some(*mode)
        } else {
            None
        }
    }

    /// Get the name argument if present
    pub fn get_name(&self) -> Option<&str> {
        if let Some(EventArg::Name(name)) = self.get_arg("name") {
            Some(name)
        } else {
            None
        }
    }
}

/// Event bus with immediate and deferred queues
///
/// Producers `send` or `post`; the engine context drains due events once
/// per frame and dispatches them itself, so no handler registration (and
/// no aliased mutable borrows of the systems) is needed.
#[derive(Default)]
pub struct EventBus {
    immediate_queue: Vec<Event>,
    deferred_queue: Vec<(f64, Event)>,
    current_time: f64,
}

impl EventBus {
    /// Create a new empty event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Update current time (seconds since start)
    pub fn update_time(&mut self, time: f64) {
        self.current_time = time;
    }

    /// Send an event for delivery this frame
    pub fn send(&mut self, event: Event) {
        self.immediate_queue.push(event);
    }

    /// Post an event for deferred delivery at the specified time
    pub fn post(&mut self, delivery_time: f64, event: Event) {
        self.deferred_queue.push((delivery_time, event));
    }

    /// Drain every due event: the whole immediate queue plus deferred
    /// events whose delivery time has arrived
    pub fn drain_due(&mut self) -> Vec<Event> {
        let mut due = std::mem::take(&mut self.immediate_queue);
        let mut i = 0;
        while i < self.deferred_queue.len() {
            if self.deferred_queue[i].0 <= self.current_time {
                let (_, event) = self.deferred_queue.remove(i);
                due.push(event);
            } else {
                i += 1;
            }
        }
        due
    }

    /// Clear all queued events (useful for state transitions)
    pub fn clear(&mut self) {
        self.immediate_queue.clear();
        self.deferred_queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_events_drain_in_order() {
        let mut bus = EventBus::new();
        bus.send(Event::resized(800, 600, 0.0));
        bus.send(Event::new(EventCode::RenderModeChanged, 0.0).with_arg("mode", EventArg::Mode(2)));

        let due = bus.drain_due();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].code, EventCode::WindowResized);
        assert_eq!(due[0].get_size(), Some((800, 600)));
        assert_eq!(due[1].get_mode(), Some(2));
        assert!(bus.drain_due().is_empty());
    }

    #[test]
    fn test_deferred_events_wait_for_their_time() {
        let mut bus = EventBus::new();
        bus.post(1.0, Event::new(EventCode::TextureReloaded, 1.0));

        bus.update_time(0.5);
        assert!(bus.drain_due().is_empty());

        bus.update_time(1.0);
        let due = bus.drain_due();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].code, EventCode::TextureReloaded);
    }
}
