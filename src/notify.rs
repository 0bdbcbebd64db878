// Current-value broadcast to registered listeners

use tracing::debug;

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

/// Holds the latest value and replays it to listeners
///
/// New listeners receive the current value as soon as they subscribe.
/// `publish` then delivers each new value to every listener in
/// registration order. Only the latest value is retained.
pub struct Broadcaster<T> {
    current: T,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_id: u64,
}

impl<T> Broadcaster<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        listener(&self.current);
        self.listeners.push((id, Box::new(listener)));

        debug!(subscription = id.0, listeners = self.listeners.len(), "Broadcaster::subscribe: registered");
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, value: T) {
        self.current = value;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_receives_current_value() {
        let mut bc = Broadcaster::new(7);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        bc.subscribe(move |v: &i32| sink.borrow_mut().push(*v));

        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn test_publish_in_registration_order() {
        let mut bc = Broadcaster::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let sink = log.clone();
            bc.subscribe(move |v: &i32| sink.borrow_mut().push(format!("{}:{}", name, v)));
        }
        log.borrow_mut().clear();

        bc.publish(1);
        assert_eq!(*log.borrow(), vec!["first:1", "second:1", "third:1"]);

        // A late subscriber sees the published value, not the initial one
        let sink = log.clone();
        bc.subscribe(move |v: &i32| sink.borrow_mut().push(format!("late:{}", v)));
        assert_eq!(log.borrow().last().map(String::as_str), Some("late:1"));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bc = Broadcaster::new(0);
        let count = Rc::new(RefCell::new(0));

        let sink = count.clone();
        let id = bc.subscribe(move |_: &i32| *sink.borrow_mut() += 1);
        assert_eq!(*count.borrow(), 1);

        assert!(bc.unsubscribe(id));
        assert!(!bc.unsubscribe(id));

        bc.publish(5);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_publish_without_listeners_retains_latest() {
        let mut bc = Broadcaster::new(String::from("a"));
        bc.publish(String::from("b"));
        bc.publish(String::from("c"));

        let seen = Rc::new(RefCell::new(String::new()));
        let sink = seen.clone();
        bc.subscribe(move |v: &String| *sink.borrow_mut() = v.clone());
        assert_eq!(*seen.borrow(), "c");
    }
}
