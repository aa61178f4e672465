use uuid::Uuid;

use crate::error::Error;

/// Stable identity of a registered hook, used to remove it and to
/// attribute callback failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(Uuid);

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a hook callback returns. `Ok(false)` removes the hook once the
/// current run finishes; any other `Ok` keeps it. An `Err` aborts the run.
pub type HookResult = Result<bool, Box<dyn std::error::Error>>;

struct Entry<T> {
    id: HookId,
    callback: Box<dyn FnMut(&T) -> HookResult>,
}

/// An ordered collection of render callbacks.
///
/// Callbacks run in insertion order. A failing callback is wrapped into a
/// single identified error and stops the current run, but the collection
/// is left intact, the next run re-runs the remaining callbacks.
pub struct Hooks<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Hooks<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add<F>(&mut self, callback: F) -> HookId
    where
        F: FnMut(&T) -> HookResult + 'static,
    {
        let id = HookId(Uuid::new_v4());
        self.entries.push(Entry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Removes a hook by id. Returns `true` if it was present.
    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    /// Invokes every callback in insertion order.
    ///
    /// Self-removals requested by returning `false` take effect after the
    /// run, including a run cut short by a failure.
    pub fn run(&mut self, payload: &T) -> Result<(), Error> {
        let mut removals = Vec::new();
        let mut failure = None;

        for entry in self.entries.iter_mut() {
            match (entry.callback)(payload) {
                Ok(false) => removals.push(entry.id),
                Ok(_) => {}
                Err(source) => {
                    failure = Some(Error::HookCallbackFailure {
                        hook: entry.id.0,
                        message: source.to_string(),
                    });
                    break;
                }
            }
        }

        if !removals.is_empty() {
            self.entries.retain(|entry| !removals.contains(&entry.id));
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Empties the collection.
    pub fn destroy(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_run_in_insertion_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut hooks: Hooks<u32> = Hooks::new();

        for tag in ["first", "second", "third"].iter() {
            let sink = Rc::clone(&order);
            hooks.add(move |_| {
                sink.borrow_mut().push(*tag);
                Ok(true)
            });
        }

        hooks.run(&0).unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_returning_false_removes_after_run() {
        let calls = Rc::new(RefCell::new(0));
        let mut hooks: Hooks<u32> = Hooks::new();

        let counter = Rc::clone(&calls);
        hooks.add(move |_| {
            *counter.borrow_mut() += 1;
            Ok(false)
        });
        let keeper = Rc::clone(&calls);
        hooks.add(move |_| {
            *keeper.borrow_mut() += 10;
            Ok(true)
        });

        hooks.run(&0).unwrap();
        // the self-removing hook still ran this time, and so did the next
        assert_eq!(*calls.borrow(), 11);
        assert_eq!(hooks.len(), 1);

        hooks.run(&0).unwrap();
        assert_eq!(*calls.borrow(), 21);
    }

    #[test]
    fn test_failure_stops_the_run_but_keeps_hooks() {
        let late_calls = Rc::new(RefCell::new(0));
        let mut hooks: Hooks<u32> = Hooks::new();

        hooks.add(|_| Ok(true));
        let failing = hooks.add(|_| Err("boom".into()));
        let counter = Rc::clone(&late_calls);
        hooks.add(move |_| {
            *counter.borrow_mut() += 1;
            Ok(true)
        });

        match hooks.run(&0) {
            Err(Error::HookCallbackFailure { hook, message }) => {
                assert_eq!(HookId(hook), failing);
                assert!(message.contains("boom"));
            }
            other => panic!("ran: {:?}", other),
        }
        // the callback after the failure did not execute
        assert_eq!(*late_calls.borrow(), 0);
        // nothing was removed
        assert_eq!(hooks.len(), 3);
    }

    #[test]
    fn test_remove_and_destroy() {
        let mut hooks: Hooks<u32> = Hooks::new();
        let id = hooks.add(|_| Ok(true));
        hooks.add(|_| Ok(true));

        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));
        assert_eq!(hooks.len(), 1);

        hooks.destroy();
        assert!(hooks.is_empty());
    }
}
