// src/machine.rs
//
// The Counting Reward Machine: a counter automaton whose edges are labelled
// with transition expressions and emit rewards.
//
// Users supply the machine in its surface form (MachineSpec): three
// parallel maps keyed by source state and expression string, as in the
// paper notation. Construction normalises that to one ordered edge list per
// state (parsed expression, destination, counter delta, reward emitter),
// validates every well-formedness invariant up front, and moves the default
// edge to the end of its list. After construction the machine is immutable
// and freely shareable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConstructionError, TerminalStep};
use crate::events::{EventAlphabet, EventSet};
use crate::expr::TransitionExpr;

/// Machine state identifier. Non-negative identifiers are ordinary states.
pub type StateId = i32;

/// The distinguished terminal sink.
pub const TERMINAL_STATE: StateId = -1;

/// Reward attached to a machine edge: a constant scalar, or a pure function
/// of the ground transition the edge fired on.
pub enum RewardEmitter<O, A> {
    Constant(f64),
    Functional(Arc<dyn Fn(&O, &A, &O) -> f64 + Send + Sync>),
}

impl<O, A> RewardEmitter<O, A> {
    pub fn functional<F>(f: F) -> Self
    where
        F: Fn(&O, &A, &O) -> f64 + Send + Sync + 'static,
    {
        RewardEmitter::Functional(Arc::new(f))
    }

    /// Evaluate against the ground transition. Constant emitters ignore the
    /// arguments.
    pub fn emit(&self, obs: &O, action: &A, next_obs: &O) -> f64 {
        match self {
            RewardEmitter::Constant(reward) => *reward,
            RewardEmitter::Functional(f) => f(obs, action, next_obs),
        }
    }
}

impl<O, A> Clone for RewardEmitter<O, A> {
    fn clone(&self) -> Self {
        match self {
            RewardEmitter::Constant(reward) => RewardEmitter::Constant(*reward),
            RewardEmitter::Functional(f) => RewardEmitter::Functional(Arc::clone(f)),
        }
    }
}

impl<O, A> fmt::Debug for RewardEmitter<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardEmitter::Constant(reward) => f.debug_tuple("Constant").field(reward).finish(),
            RewardEmitter::Functional(_) => f.write_str("Functional(..)"),
        }
    }
}

impl<O, A> From<f64> for RewardEmitter<O, A> {
    fn from(reward: f64) -> Self {
        RewardEmitter::Constant(reward)
    }
}

/// Surface form of a machine, as the user writes it: parallel maps from
/// source state and expression string to destination / counter delta /
/// reward. The three maps must agree on their keys at both levels.
///
/// Per-state expression order in `state_transitions` is the tie-break
/// order: when several non-default edges match, the first declared wins.
#[derive(Debug)]
pub struct MachineSpec<O, A> {
    pub initial_state: StateId,
    pub initial_counters: Vec<i64>,
    pub terminal_states: BTreeSet<StateId>,
    pub state_transitions: Vec<(StateId, Vec<(String, StateId)>)>,
    pub counter_transitions: Vec<(StateId, Vec<(String, Vec<i64>)>)>,
    pub reward_transitions: Vec<(StateId, Vec<(String, RewardEmitter<O, A>)>)>,
    /// User-declared reachable `(state, counters)` set for counterfactual
    /// enumeration. Exact reachability is undecidable; the machine only
    /// validates shape, never computes the set.
    pub reachable: Vec<(StateId, Vec<i64>)>,
}

impl<O, A> Default for MachineSpec<O, A> {
    fn default() -> Self {
        MachineSpec {
            initial_state: 0,
            initial_counters: Vec::new(),
            terminal_states: BTreeSet::from([TERMINAL_STATE]),
            state_transitions: Vec::new(),
            counter_transitions: Vec::new(),
            reward_transitions: Vec::new(),
            reachable: Vec::new(),
        }
    }
}

/// A normalised machine edge.
#[derive(Debug, Clone)]
pub struct Transition<O, A> {
    pub expr: TransitionExpr,
    pub next_state: StateId,
    pub counter_delta: Vec<i64>,
    pub reward: RewardEmitter<O, A>,
}

/// Result of one machine step.
#[derive(Debug)]
pub struct MachineStep<'m, O, A> {
    pub next_state: StateId,
    pub next_counters: Vec<i64>,
    pub reward: &'m RewardEmitter<O, A>,
}

/// An immutable, validated Counting Reward Machine.
///
/// Type parameters are the ground observation and action types seen by
/// functional reward emitters; a machine using only constant rewards can be
/// built for any pair.
#[derive(Debug)]
pub struct CountingRewardMachine<O, A> {
    alphabet: EventAlphabet,
    initial_state: StateId,
    initial_counters: Vec<i64>,
    terminal_states: BTreeSet<StateId>,
    states: Vec<StateId>,
    edges: BTreeMap<StateId, Vec<Transition<O, A>>>,
    reachable: Vec<(StateId, Vec<i64>)>,
}

impl<O, A> CountingRewardMachine<O, A> {
    /// Validate `spec` and build the machine.
    ///
    /// Checks, in order: counter arity is at least one; declared states are
    /// unique, non-terminal and include the initial state; the three maps
    /// agree on their keys at both levels; every expression parses against
    /// the alphabet and arity; every delta has the machine arity; every
    /// destination is declared or terminal; every state has exactly one
    /// default edge (normalised to the end of its list); the reachable set
    /// is non-empty and well-shaped.
    pub fn new(alphabet: EventAlphabet, spec: MachineSpec<O, A>) -> Result<Self, ConstructionError> {
        let arity = spec.initial_counters.len();
        if arity == 0 {
            return Err(ConstructionError::ArityMismatch {
                context: "initial counters".to_string(),
                expected: 1,
                found: 0,
            });
        }

        let mut states: Vec<StateId> = Vec::with_capacity(spec.state_transitions.len());
        for (state, _) in &spec.state_transitions {
            if states.contains(state) {
                return Err(ConstructionError::KeyMismatch {
                    context: format!("state {state} declared twice in state-transition map"),
                });
            }
            if spec.terminal_states.contains(state) {
                return Err(ConstructionError::KeyMismatch {
                    context: format!("terminal state {state} has outgoing transitions"),
                });
            }
            states.push(*state);
        }
        if !states.contains(&spec.initial_state) {
            return Err(ConstructionError::UnknownState {
                state: spec.initial_state,
                context: "initial state".to_string(),
            });
        }

        let counter_map = keyed_map(&spec.counter_transitions, "counter")?;
        let reward_map = keyed_map(&spec.reward_transitions, "reward")?;
        for state in counter_map.keys() {
            if !states.contains(state) {
                return Err(ConstructionError::KeyMismatch {
                    context: format!("state {state} appears only in the counter-transition map"),
                });
            }
        }
        for state in reward_map.keys() {
            if !states.contains(state) {
                return Err(ConstructionError::KeyMismatch {
                    context: format!("state {state} appears only in the reward-transition map"),
                });
            }
        }

        let mut edges: BTreeMap<StateId, Vec<Transition<O, A>>> = BTreeMap::new();
        for (state, declared) in &spec.state_transitions {
            let state = *state;
            let deltas = counter_map.get(&state).ok_or_else(|| {
                ConstructionError::KeyMismatch {
                    context: format!("state {state} missing from counter-transition map"),
                }
            })?;
            let rewards = reward_map.get(&state).ok_or_else(|| {
                ConstructionError::KeyMismatch {
                    context: format!("state {state} missing from reward-transition map"),
                }
            })?;

            let mut seen: BTreeSet<&str> = BTreeSet::new();
            let mut transitions = Vec::with_capacity(declared.len());
            for (expr_str, next_state) in declared {
                if !seen.insert(expr_str.as_str()) {
                    return Err(ConstructionError::KeyMismatch {
                        context: format!("state {state}: duplicate expression {expr_str:?}"),
                    });
                }
                let expr =
                    TransitionExpr::parse(expr_str, &alphabet, arity).map_err(|source| {
                        ConstructionError::Parse {
                            state,
                            expr: expr_str.clone(),
                            source,
                        }
                    })?;
                let delta = deltas.get(expr_str.as_str()).ok_or_else(|| {
                    ConstructionError::KeyMismatch {
                        context: format!(
                            "state {state}: expression {expr_str:?} missing from counter-transition map"
                        ),
                    }
                })?;
                if delta.len() != arity {
                    return Err(ConstructionError::ArityMismatch {
                        context: format!("counter delta at state {state}, expression {expr_str:?}"),
                        expected: arity,
                        found: delta.len(),
                    });
                }
                let reward = rewards.get(expr_str.as_str()).ok_or_else(|| {
                    ConstructionError::KeyMismatch {
                        context: format!(
                            "state {state}: expression {expr_str:?} missing from reward-transition map"
                        ),
                    }
                })?;
                if !states.contains(next_state) && !spec.terminal_states.contains(next_state) {
                    return Err(ConstructionError::UnknownState {
                        state: *next_state,
                        context: format!("destination of state {state}, expression {expr_str:?}"),
                    });
                }
                transitions.push(Transition {
                    expr,
                    next_state: *next_state,
                    counter_delta: (*delta).clone(),
                    reward: (*reward).clone(),
                });
            }

            // Expressions present only in the counter or reward map.
            for key in deltas.keys() {
                if !seen.contains(key) {
                    return Err(ConstructionError::KeyMismatch {
                        context: format!(
                            "state {state}: expression {key:?} appears only in the counter-transition map"
                        ),
                    });
                }
            }
            for key in rewards.keys() {
                if !seen.contains(key) {
                    return Err(ConstructionError::KeyMismatch {
                        context: format!(
                            "state {state}: expression {key:?} appears only in the reward-transition map"
                        ),
                    });
                }
            }

            // Exactly one default edge, normalised to last position so the
            // declared order of the remaining edges is the tie-break order.
            let mut default_idx = None;
            for (i, transition) in transitions.iter().enumerate() {
                if transition.expr.is_default() {
                    if default_idx.is_some() {
                        return Err(ConstructionError::DuplicateDefault { state });
                    }
                    default_idx = Some(i);
                }
            }
            match default_idx {
                Some(idx) => {
                    let default_edge = transitions.remove(idx);
                    transitions.push(default_edge);
                }
                None => return Err(ConstructionError::MissingDefault { state }),
            }

            edges.insert(state, transitions);
        }

        if spec.reachable.is_empty() {
            return Err(ConstructionError::EmptyReachableSet);
        }
        for (state, counters) in &spec.reachable {
            if !states.contains(state) && !spec.terminal_states.contains(state) {
                return Err(ConstructionError::UnknownState {
                    state: *state,
                    context: "reachable configuration set".to_string(),
                });
            }
            if counters.len() != arity {
                return Err(ConstructionError::ArityMismatch {
                    context: format!("reachable configuration for state {state}"),
                    expected: arity,
                    found: counters.len(),
                });
            }
        }

        Ok(CountingRewardMachine {
            alphabet,
            initial_state: spec.initial_state,
            initial_counters: spec.initial_counters,
            terminal_states: spec.terminal_states,
            states,
            edges,
            reachable: spec.reachable,
        })
    }

    /// Execute one machine step from `(state, counters)` on `events`.
    ///
    /// Edges are tried in declared order; the first match wins. The default
    /// edge sits last and is taken unconditionally when nothing else
    /// matched, so a step from a non-terminal declared state always
    /// succeeds. Stepping a terminal state fails with [`TerminalStep`];
    /// passing an undeclared state is a contract violation and panics.
    pub fn transition(
        &self,
        state: StateId,
        counters: &[i64],
        events: &EventSet,
    ) -> Result<MachineStep<'_, O, A>, TerminalStep> {
        if self.is_terminal(state) {
            return Err(TerminalStep { state });
        }
        let edges = match self.edges.get(&state) {
            Some(edges) => edges,
            None => panic!("transition from undeclared state {state}"),
        };
        debug_assert_eq!(counters.len(), self.counter_arity());

        for edge in edges {
            if edge.expr.is_default() || edge.expr.matches(events, counters) {
                let next_counters = counters
                    .iter()
                    .zip(&edge.counter_delta)
                    .map(|(counter, delta)| counter + delta)
                    .collect();
                return Ok(MachineStep {
                    next_state: edge.next_state,
                    next_counters,
                    reward: &edge.reward,
                });
            }
        }
        unreachable!("every non-terminal state has a default edge");
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn initial_counters(&self) -> &[i64] {
        &self.initial_counters
    }

    pub fn counter_arity(&self) -> usize {
        self.initial_counters.len()
    }

    pub fn terminal_states(&self) -> &BTreeSet<StateId> {
        &self.terminal_states
    }

    pub fn is_terminal(&self, state: StateId) -> bool {
        self.terminal_states.contains(&state)
    }

    /// Declared non-terminal states, in declaration order.
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn alphabet(&self) -> &EventAlphabet {
        &self.alphabet
    }

    /// The normalised edge list of a declared state (default edge last).
    pub fn transitions(&self, state: StateId) -> Option<&[Transition<O, A>]> {
        self.edges.get(&state).map(|edges| edges.as_slice())
    }

    /// The user-declared reachable configuration set.
    pub fn reachable_configurations(&self) -> &[(StateId, Vec<i64>)] {
        &self.reachable
    }
}

/// Cross `states` with every counter tuple inside the per-counter
/// inclusive `bounds`: the explicit form of a "finite bound per counter"
/// reachable-set declaration.
pub fn bounded_configurations(
    states: &[StateId],
    bounds: &[(i64, i64)],
) -> Vec<(StateId, Vec<i64>)> {
    let mut tuples: Vec<Vec<i64>> = vec![Vec::new()];
    for &(lo, hi) in bounds {
        let mut extended = Vec::new();
        for prefix in &tuples {
            for value in lo..=hi {
                let mut tuple = prefix.clone();
                tuple.push(value);
                extended.push(tuple);
            }
        }
        tuples = extended;
    }

    let mut configs = Vec::with_capacity(states.len() * tuples.len());
    for &state in states {
        for tuple in &tuples {
            configs.push((state, tuple.clone()));
        }
    }
    configs
}

fn keyed_map<'s, T>(
    entries: &'s [(StateId, Vec<(String, T)>)],
    map_name: &str,
) -> Result<BTreeMap<StateId, BTreeMap<&'s str, &'s T>>, ConstructionError> {
    let mut map: BTreeMap<StateId, BTreeMap<&str, &T>> = BTreeMap::new();
    for (state, items) in entries {
        if map.contains_key(state) {
            return Err(ConstructionError::KeyMismatch {
                context: format!("state {state} declared twice in {map_name}-transition map"),
            });
        }
        let mut by_expr = BTreeMap::new();
        for (expr, value) in items {
            if by_expr.insert(expr.as_str(), value).is_some() {
                return Err(ConstructionError::KeyMismatch {
                    context: format!(
                        "state {state}: duplicate expression {expr:?} in {map_name}-transition map"
                    ),
                });
            }
        }
        map.insert(*state, by_expr);
    }
    Ok(map)
}
