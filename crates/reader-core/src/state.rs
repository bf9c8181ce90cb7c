//! Observable state containers with optional persistence.
//!
//! An [`Atom`] holds one value, notifies subscribers after every write, and,
//! when created with [`Atom::persisted`], writes the new value through a
//! [`KeyValueStore`] adapter. Atoms are single-threaded (`Rc`-based); the
//! reader runs all state updates from one event loop.

use crate::error::StoreError;
use reader_model::{keys, ItemFit, ReaderPreferences, ReadingDirection, Scaling};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use tracing::warn;

/// String key/value persistence used by persisted atoms.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile store, handy for tests and sessions without a data directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;
type Writer<T> = Box<dyn Fn(&T)>;

struct AtomInner<T> {
    value: T,
    listeners: Vec<(u64, Listener<T>)>,
    next_listener: u64,
    writer: Option<Writer<T>>,
}

/// A shared, observable value.
pub struct Atom<T> {
    inner: Rc<RefCell<AtomInner<T>>>,
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: Clone + 'static> Atom<T> {
    pub fn new(value: T) -> Self {
        Self::with_writer(value, None)
    }

    fn with_writer(value: T, writer: Option<Writer<T>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(AtomInner {
                value,
                listeners: Vec::new(),
                next_listener: 0,
                writer,
            })),
        }
    }

    /// Creates an atom backed by `store` under `key`.
    ///
    /// The initial value is read from the store; a missing or unreadable
    /// entry falls back to `default`. Every `set` writes the JSON encoding.
    pub fn persisted(key: &str, default: T, store: Rc<dyn KeyValueStore>) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        let value = match store.load(key) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(error) => {
                    warn!(key, %error, "ignoring unreadable persisted value");
                    default
                }
            },
            None => default,
        };

        let key = key.to_owned();
        let writer: Writer<T> = Box::new(move |value: &T| {
            let result = serde_json::to_string(value)
                .map_err(|error| StoreError::Encode { key: key.clone(), message: error.to_string() })
                .and_then(|encoded| store.store(&key, &encoded));

            if let Err(error) = result {
                warn!(key = %key, %error, "failed to persist value");
            }
        });

        Self::with_writer(value, Some(writer))
    }

    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Stores `value`, persists it if the atom is persisted, then notifies
    /// subscribers in subscription order.
    pub fn set(&self, value: T) {
        let listeners: Vec<Listener<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = value.clone();
            if let Some(writer) = &inner.writer {
                writer(&inner.value);
            }
            inner.listeners.iter().map(|(_, listener)| Rc::clone(listener)).collect()
        };

        for listener in listeners {
            listener(&value);
        }
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.borrow().value);
        self.set(next);
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let listener: Listener<T> = Rc::new(listener);
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak: Weak<RefCell<AtomInner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Handle returned by [`Atom::subscribe`]. Dropping it keeps the listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Persisted reader preferences, one atom per preference.
#[derive(Clone)]
pub struct ReaderSettings {
    pub fit: Atom<ItemFit>,
    pub scaling: Atom<Scaling>,
    pub auto_navigate_interval: Atom<u32>,
    pub auto_read_next_countdown: Atom<u32>,
    pub auto_navigate: Atom<bool>,
    pub stretch_fit: Atom<bool>,
    pub wheel_zoom: Atom<bool>,
    pub direction: Atom<ReadingDirection>,
}

impl ReaderSettings {
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let defaults = ReaderPreferences::default();

        Self {
            fit: Atom::persisted(keys::FIT, defaults.fit, Rc::clone(&store)),
            scaling: Atom::persisted(keys::SCALING, defaults.scaling, Rc::clone(&store)),
            auto_navigate_interval: Atom::persisted(
                keys::NAVIGATE_INTERVAL,
                defaults.auto_navigate_interval,
                Rc::clone(&store),
            ),
            auto_read_next_countdown: Atom::persisted(
                keys::READ_NEXT_COUNTDOWN,
                defaults.auto_read_next_countdown,
                Rc::clone(&store),
            ),
            auto_navigate: Atom::persisted(
                keys::AUTO_NAVIGATE,
                defaults.auto_navigate,
                Rc::clone(&store),
            ),
            stretch_fit: Atom::persisted(keys::STRETCH_FIT, defaults.stretch_fit, Rc::clone(&store)),
            wheel_zoom: Atom::persisted(keys::WHEEL_ZOOM, defaults.wheel_zoom, Rc::clone(&store)),
            direction: Atom::persisted(keys::DIRECTION, defaults.direction, store),
        }
    }

    pub fn snapshot(&self) -> ReaderPreferences {
        ReaderPreferences {
            fit: self.fit.get(),
            scaling: self.scaling.get(),
            auto_navigate_interval: self.auto_navigate_interval.get(),
            auto_read_next_countdown: self.auto_read_next_countdown.get(),
            auto_navigate: self.auto_navigate.get(),
            stretch_fit: self.stretch_fit.get(),
            wheel_zoom: self.wheel_zoom.get(),
            direction: self.direction.get(),
        }
    }

    pub fn apply(&self, preferences: &ReaderPreferences) {
        self.fit.set(preferences.fit);
        self.scaling.set(preferences.scaling);
        self.auto_navigate_interval.set(preferences.auto_navigate_interval);
        self.auto_read_next_countdown.set(preferences.auto_read_next_countdown);
        self.auto_navigate.set(preferences.auto_navigate);
        self.stretch_fit.set(preferences.stretch_fit);
        self.wheel_zoom.set(preferences.wheel_zoom);
        self.direction.set(preferences.direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_model::ImageSize;
    use std::cell::Cell;

    #[test]
    fn set_notifies_subscribers_with_new_value() {
        let atom = Atom::new(1_u32);
        let seen = Rc::new(Cell::new(0));

        let sink = Rc::clone(&seen);
        let _subscription = atom.subscribe(move |value| sink.set(*value));

        atom.set(5);
        assert_eq!(atom.get(), 5);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let atom = Atom::new(0_u32);
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let subscription = atom.subscribe(move |_| counter.set(counter.get() + 1));

        atom.set(1);
        subscription.unsubscribe();
        atom.set(2);

        assert_eq!(calls.get(), 1);
        assert_eq!(atom.subscriber_count(), 0);
    }

    #[test]
    fn listeners_may_read_the_atom() {
        let atom = Atom::new(String::from("a"));
        let reader = atom.clone();
        let seen = Rc::new(RefCell::new(String::new()));

        let sink = Rc::clone(&seen);
        let _subscription = atom.subscribe(move |_| *sink.borrow_mut() = reader.get());

        atom.update(|value| format!("{value}b"));
        assert_eq!(seen.borrow().as_str(), "ab");
    }

    #[test]
    fn persisted_atom_writes_through_and_reloads() {
        let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());

        let atom = Atom::persisted("reader_zoom", false, Rc::clone(&store));
        assert!(!atom.get());

        atom.set(true);
        assert_eq!(store.load("reader_zoom").as_deref(), Some("true"));

        let reloaded = Atom::persisted("reader_zoom", false, store);
        assert!(reloaded.get());
    }

    #[test]
    fn unreadable_value_falls_back_to_default() {
        let store = Rc::new(MemoryStore::new());
        store.store("reader_navigate_interval", "\"soon\"").expect("memory store accepts writes");

        let atom = Atom::persisted("reader_navigate_interval", 20_u32, store);
        assert_eq!(atom.get(), 20);
    }

    #[test]
    fn settings_round_trip_through_store() {
        let store = Rc::new(MemoryStore::new());
        let settings = ReaderSettings::load(Rc::clone(&store) as Rc<dyn KeyValueStore>);
        assert_eq!(settings.snapshot(), ReaderPreferences::default());

        let preferences = ReaderPreferences {
            fit: ItemFit::Width,
            scaling: Scaling::Fixed(ImageSize::X960),
            auto_navigate: true,
            direction: ReadingDirection::LeftToRight,
            ..ReaderPreferences::default()
        };
        settings.apply(&preferences);

        assert_eq!(store.load(keys::SCALING).as_deref(), Some("13"));
        assert_eq!(store.load(keys::FIT).as_deref(), Some("\"width\""));

        let reloaded = ReaderSettings::load(store);
        assert_eq!(reloaded.snapshot(), preferences);
    }
}
