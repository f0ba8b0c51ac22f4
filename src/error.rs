// src/error.rs
//
// Failure model for the CRM core.
//
// Construction-time errors abort machine creation and name the offending
// source state and expression. Runtime errors abort the current step; the
// cross-product commits episode state only after all fallible work has
// succeeded, so a failed step leaves the episode unchanged.

use thiserror::Error;

use crate::machine::StateId;

/// Error produced while parsing a transition expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character outside the expression grammar.
    #[error("unexpected character {found:?} at byte {pos}")]
    UnexpectedChar { found: char, pos: usize },
    /// A well-formed token in a position the grammar does not allow.
    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    /// The expression ended while more input was required.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    /// An atom that is not in the declared event alphabet.
    #[error("unknown event {name:?}")]
    UnknownEvent { name: String },
    /// Counter pattern length disagrees with the machine's counter arity.
    #[error("counter pattern has {found} items, expected {expected}")]
    PatternArity { expected: usize, found: usize },
    /// A counter-pattern item other than `Z`, `NZ` or `-`.
    #[error("invalid counter pattern item {found:?} (expected Z, NZ or -)")]
    BadPatternItem { found: String },
    /// Leftover tokens after a complete expression.
    #[error("trailing input after expression")]
    TrailingInput,
}

/// Error detected while building a machine, labelling function or
/// cross-product. Construction is all-or-nothing: any of these aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A transition expression failed to parse.
    #[error("state {state}, expression {expr:?}: {source}")]
    Parse {
        state: StateId,
        expr: String,
        source: ParseError,
    },
    /// A counter tuple or delta has the wrong arity.
    #[error("{context}: expected arity {expected}, found {found}")]
    ArityMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    /// The three transition maps disagree on their keys.
    #[error("transition maps disagree: {context}")]
    KeyMismatch { context: String },
    /// A non-terminal state has no default edge.
    #[error("state {state} has no default edge")]
    MissingDefault { state: StateId },
    /// A state declares more than one default edge.
    #[error("state {state} has more than one default edge")]
    DuplicateDefault { state: StateId },
    /// A detector was registered for an event outside the alphabet.
    #[error("unknown event {name:?}")]
    UnknownEvent { name: String },
    /// A state is referenced but never declared.
    #[error("unknown state {state} referenced by {context}")]
    UnknownState { state: StateId, context: String },
    /// The user-declared reachable configuration set is empty.
    #[error("reachable configuration set is empty")]
    EmptyReachableSet,
    /// The labelling function and the machine were built over different
    /// alphabets.
    #[error("labelling alphabet does not match machine alphabet")]
    AlphabetMismatch,
}

/// A machine transition was requested from a terminal state.
///
/// The cross-product never does this (it refuses to step a finished
/// episode); seeing it means a caller drove the machine directly out of
/// protocol. Never recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("machine transition invoked on terminal state {state}")]
pub struct TerminalStep {
    pub state: StateId,
}

/// The cross-product was used out of protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// `step` was called before the first `reset`.
    #[error("step called before reset")]
    NotReset,
    /// `step` was called after the episode terminated or truncated.
    #[error("step called after the episode ended; call reset first")]
    EpisodeOver,
}

/// Any error a cross-product step can surface. Machine errors pass through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Machine(#[from] TerminalStep),
}

/// The user-supplied `encode` / `decode_ground` hooks disagree.
///
/// Produced by [`crate::crossproduct::verify_codec_roundtrip`]; the codecs
/// themselves are infallible at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("encode/decode_ground round-trip mismatch at machine state {state}")]
pub struct EncoderError {
    pub state: StateId,
}
