// src/events.rs
//
// Symbolic event vocabulary shared by the labelling function, the
// transition-expression language and the machine.
//
// Events compare, hash and order by name. The alphabet is fixed when a
// machine is built; the labelling function rejects detectors for names
// outside it at registration time.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A symbolic event. Identity is by name.
///
/// The name is held as `Arc<str>` so sets built on the step path clone the
/// detector's event rather than re-allocating the string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Event(Arc<str>);

impl Event {
    pub fn new(name: &str) -> Self {
        Event(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event(Arc::from(name.as_str()))
    }
}

impl From<Event> for String {
    fn from(event: Event) -> Self {
        event.0.to_string()
    }
}

// Lets `BTreeSet<Event>` be probed with a plain `&str`. Sound because the
// derived `Ord` on `Event` is exactly the `str` ordering of the name.
impl Borrow<str> for Event {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A set of events observed on one ground transition.
///
/// Set semantics: duplicate detector firings coalesce. Backed by a
/// `BTreeSet` so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSet(BTreeSet<Event>);

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set directly from names. Mostly useful in tests and when
    /// driving a machine without a labelling function.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        EventSet(names.into_iter().map(|n| Event::new(n.as_ref())).collect())
    }

    /// Insert an event; returns false if it was already present.
    pub fn insert(&mut self, event: Event) -> bool {
        self.0.insert(event)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.0.iter()
    }
}

impl FromIterator<Event> for EventSet {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        EventSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a Event;
    type IntoIter = std::collections::btree_set::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, event) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{event}")?;
        }
        write!(f, "}}")
    }
}

/// The finite, user-declared event alphabet.
///
/// Declaration order is preserved for introspection; duplicates coalesce
/// (the alphabet is a set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAlphabet {
    events: Vec<Event>,
    lookup: BTreeSet<Event>,
}

impl EventAlphabet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut events = Vec::new();
        let mut lookup = BTreeSet::new();
        for name in names {
            let event = Event::new(name.as_ref());
            if lookup.insert(event.clone()) {
                events.push(event);
            }
        }
        EventAlphabet { events, lookup }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    /// Look up the interned event for `name`, if declared.
    pub fn event(&self, name: &str) -> Option<Event> {
        self.lookup.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
