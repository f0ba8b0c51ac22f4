//! Counting Reward Machine core.
//!
//! This crate implements Counting Reward Machines (CRMs): counter automata
//! that consume symbolic events derived from a labelling of ground
//! environment transitions and emit rewards. Combined with a ground
//! environment, a CRM forms a *cross-product environment* whose
//! observations augment the ground observation with the automaton state and
//! counter values, restoring the Markov property for non-Markovian reward
//! specifications.
//!
//! # Architecture
//!
//! The step path is a straight pipeline:
//!
//! - **Events** (`events`): the finite, user-declared event alphabet.
//!   Events are names; sets of them are what one ground transition emits.
//!
//! - **Labelling** (`label`): a fixed bank of pure detector predicates run
//!   over each ground transition `(o, a, o')`; the union of firings is the
//!   transition's event set.
//!
//! - **Expressions** (`expr`): the edge-label language
//!   `«formula» / «counter-pattern»` — propositional logic over events plus
//!   per-counter zero tests. Parsed once at machine construction.
//!
//! - **Machine** (`machine`): the automaton itself. Built from the
//!   parallel-map surface form, validated exhaustively, then immutable and
//!   freely shareable. One step maps `(u, c, events)` to
//!   `(u', c', reward emitter)`.
//!
//! - **Cross-product** (`crossproduct`): Gym-style `reset`/`step` over a
//!   ground environment, with the machine as the sole reward source and a
//!   user-supplied observation codec.
//!
//! - **Counterfactual** (`counterfactual`): replays one real transition's
//!   event set against every declared-reachable machine configuration,
//!   producing the full batch of experiences an agent could have recorded.
//!
//! The `letter` module wires all of the above into a small deterministic
//! grid world used by the integration tests; `logging` provides the JSONL
//! episode sink.
//!
//! Everything is deterministic given the ground environment's seed;
//! randomness lives only in ground environments.

pub mod counterfactual;
pub mod crossproduct;
pub mod error;
pub mod events;
pub mod expr;
pub mod label;
pub mod letter;
pub mod logging;
pub mod machine;

// --- Re-exports for ergonomic external use ---------------------------------

pub use error::{
    ConstructionError, EncoderError, ParseError, StateError, StepError, TerminalStep,
};

pub use events::{Event, EventAlphabet, EventSet};

pub use expr::{CounterConstraint, Formula, TransitionExpr};

pub use label::{DetectorFn, LabellingFunction};

pub use machine::{
    bounded_configurations, CountingRewardMachine, MachineSpec, MachineStep, RewardEmitter,
    StateId, Transition, TERMINAL_STATE,
};

pub use crossproduct::{
    verify_codec_roundtrip, CrossProduct, GroundEnv, GroundStep, ObsCodec, StepInfo, StepResult,
};

pub use counterfactual::{generate_experience, ExperienceBatch, ExperienceInfo};

pub use logging::{EpisodeSink, JsonlSink, NoopSink, StepRecord};

pub use letter::{
    letter_alphabet, letter_cross_product, letter_labelling, letter_machine, LetterAction,
    LetterCodec, LetterObs, LetterWorld, LetterWorldConfig,
};
