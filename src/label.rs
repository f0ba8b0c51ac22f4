// src/label.rs
//
// The labelling function: a fixed bank of event detectors run over each
// ground transition (o, a, o'). Every detector is a pure predicate for one
// declared event; the result is the set of events whose predicates fired.

use std::fmt;

use crate::error::ConstructionError;
use crate::events::{Event, EventAlphabet, EventSet};

/// A detector predicate over one ground transition.
///
/// Detectors must be pure and must not panic; a detector that cannot decide
/// returns false.
pub type DetectorFn<O, A> = Box<dyn Fn(&O, &A, &O) -> bool + Send + Sync>;

/// Maps ground transitions to event sets by running the detector bank.
///
/// Detectors are declared once at construction as `(event name, predicate)`
/// pairs and the bank is fixed thereafter. Declaration order is preserved
/// for introspection but has no effect on results (set semantics).
pub struct LabellingFunction<O, A> {
    alphabet: EventAlphabet,
    detectors: Vec<(Event, DetectorFn<O, A>)>,
}

impl<O, A> LabellingFunction<O, A> {
    /// Build a labelling function over `alphabet`.
    ///
    /// Registering a detector for a name outside the alphabet is a
    /// construction-time error. Several detectors may share one event;
    /// their firings coalesce.
    pub fn new<S>(
        alphabet: EventAlphabet,
        detectors: Vec<(S, DetectorFn<O, A>)>,
    ) -> Result<Self, ConstructionError>
    where
        S: AsRef<str>,
    {
        let mut bank = Vec::with_capacity(detectors.len());
        for (name, predicate) in detectors {
            let event = alphabet.event(name.as_ref()).ok_or_else(|| {
                ConstructionError::UnknownEvent {
                    name: name.as_ref().to_string(),
                }
            })?;
            bank.push((event, predicate));
        }
        Ok(LabellingFunction {
            alphabet,
            detectors: bank,
        })
    }

    /// Run every detector on `(obs, action, next_obs)` and return the union
    /// of the events that fired.
    pub fn events(&self, obs: &O, action: &A, next_obs: &O) -> EventSet {
        let mut fired = EventSet::new();
        for (event, predicate) in &self.detectors {
            if predicate(obs, action, next_obs) {
                fired.insert(event.clone());
            }
        }
        fired
    }

    pub fn alphabet(&self) -> &EventAlphabet {
        &self.alphabet
    }

    /// Events of the registered detectors, in declaration order.
    pub fn detector_events(&self) -> impl Iterator<Item = &Event> {
        self.detectors.iter().map(|(event, _)| event)
    }
}

impl<O, A> fmt::Debug for LabellingFunction<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabellingFunction")
            .field("alphabet", &self.alphabet)
            .field(
                "detectors",
                &self.detector_events().collect::<Vec<_>>(),
            )
            .finish()
    }
}
