use crate::event::SessionEvent;
use crate::listener::SessionListener;

/// Handle of a subscribed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fans session events out to the subscribed listeners.
#[derive(Default)]
pub(crate) struct Dispatcher {
    listeners: Vec<(ListenerId, Box<dyn SessionListener + Send>)>,
    next_id: u64,
}

impl Dispatcher {
    pub fn subscribe(&mut self, listener: Box<dyn SessionListener + Send>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        self.listeners.push((id, listener));
        id
    }

    /// Returns whether the listener was subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let count = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);

        self.listeners.len() != count
    }

    /// Delivers an event to every listener, in subscription order.
    pub fn dispatch(&mut self, event: &SessionEvent) {
        tracing::trace!(?event, "dispatch");

        for (_, listener) in self.listeners.iter_mut() {
            listener.on_event(event);
        }
    }
}
