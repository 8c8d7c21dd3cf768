use std::cell::RefCell;
use std::collections::BTreeMap;

/// Ordered handler lists keyed by object label.
#[derive(Debug)]
pub struct ListenerRegistry<H> {
    handlers: BTreeMap<String, Vec<H>>,
}

impl<H> Default for ListenerRegistry<H> {
    fn default() -> Self {
        ListenerRegistry {
            handlers: BTreeMap::new(),
        }
    }
}

impl<H: Clone> ListenerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler; returns how many handlers the label now has.
    pub fn register(&mut self, label: &str, handler: H) -> usize {
        let list = self.handlers.entry(label.to_string()).or_default();
        list.push(handler);
        list.len()
    }

    pub fn snapshot(&self, label: &str) -> Vec<H> {
        self.handlers.get(label).cloned().unwrap_or_default()
    }

    pub fn handler_count(&self, label: &str) -> usize {
        self.handlers.get(label).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Drops every handler registered for `label`.
    pub fn forget(&mut self, label: &str) -> Vec<H> {
        self.handlers.remove(label).unwrap_or_default()
    }

    /// Drops handler lists whose label fails `keep`.
    pub fn retain_labels<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.total();
        self.handlers.retain(|label, _| keep(label));
        before - self.total()
    }

    pub fn release_all(&mut self) -> Vec<H> {
        std::mem::take(&mut self.handlers)
            .into_values()
            .flatten()
            .collect()
    }

    /// Invokes the handlers registered for `label` when the pass starts, in
    /// registration order.
    ///
    /// The list is copied before the first call so handlers may register or
    /// forget handlers freely. `is_live` is checked before every call; once
    /// the object is gone the remaining handlers are skipped. Returns how
    /// many handlers ran. The first handler error stops the pass.
    pub fn fire<E, L, F>(
        registry: &RefCell<Self>,
        label: &str,
        mut is_live: L,
        mut invoke: F,
    ) -> Result<usize, E>
    where
        L: FnMut() -> bool,
        F: FnMut(H) -> Result<(), E>,
    {
        let snapshot = registry.borrow().snapshot(label);
        let mut fired = 0;
        for handler in snapshot {
            if !is_live() {
                break;
            }
            invoke(handler)?;
            fired += 1;
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn handlers_fire_once_each_in_registration_order() {
        let registry = RefCell::new(ListenerRegistry::new());
        registry.borrow_mut().register("A", "first");
        registry.borrow_mut().register("A", "second");
        registry.borrow_mut().register("B", "other");

        let mut calls = Vec::new();
        let fired = ListenerRegistry::fire(&registry, "A", || true, |name| {
            calls.push(name);
            Ok::<_, ()>(())
        })
        .unwrap();
        assert_eq!(fired, 2);
        assert_eq!(calls, vec!["first", "second"]);
    }

    #[test]
    fn deleted_objects_fire_nothing() {
        let registry = RefCell::new(ListenerRegistry::new());
        registry.borrow_mut().register("A", 1);
        let fired = ListenerRegistry::fire(&registry, "A", || false, |_| Err("must not run"))
            .unwrap();
        assert_eq!(fired, 0);
    }

    #[test]
    fn registrations_during_a_pass_wait_for_the_next_pass() {
        let registry = Rc::new(RefCell::new(ListenerRegistry::new()));
        registry.borrow_mut().register("A", 1);
        registry.borrow_mut().register("A", 2);

        let fired = ListenerRegistry::fire(&*registry, "A", || true, |n| {
            registry.borrow_mut().register("A", n * 10);
            if n == 1 {
                registry.borrow_mut().forget("A");
            }
            Ok::<_, ()>(())
        })
        .unwrap();
        assert_eq!(fired, 2);
        assert_eq!(registry.borrow().snapshot("A"), vec![20]);
    }

    #[test]
    fn a_handler_deleting_the_object_stops_the_pass() {
        let registry = RefCell::new(ListenerRegistry::new());
        for n in 0..3 {
            registry.borrow_mut().register("A", n);
        }
        let live = Cell::new(true);
        let fired = ListenerRegistry::fire(&registry, "A", || live.get(), |_| {
            live.set(false);
            Ok::<_, ()>(())
        })
        .unwrap();
        assert_eq!(fired, 1);
    }

    #[test]
    fn handler_errors_propagate() {
        let registry = RefCell::new(ListenerRegistry::new());
        registry.borrow_mut().register("A", 1);
        registry.borrow_mut().register("A", 2);
        let fail_first = |n: i32| if n == 1 { Err(n) } else { Ok(()) };
        let err = ListenerRegistry::fire(&registry, "A", || true, fail_first).unwrap_err();
        assert_eq!(err, 1);
    }

    #[test]
    fn release_all_empties_every_list() {
        let mut registry = ListenerRegistry::new();
        registry.register("A", 1);
        registry.register("B", 2);
        assert_eq!(registry.release_all(), vec![1, 2]);
        assert_eq!(registry.total(), 0);
        registry.register("C", 3);
        assert_eq!(registry.retain_labels(|label| label != "C"), 1);
    }
}
