// src/letter.rs
//
// Letter world: a small deterministic grid environment used by the
// integration tests and as the reference wiring of a full cross-product.
//
// The agent walks a bounded grid containing three letter cells. Landing on
// a letter fires the matching event. The task machine counts As in state 0,
// switches to state 1 on B, then drains one C per counted A; the C taken at
// counter zero pays the accepting reward and ends the episode. Every other
// transition pays a small step penalty.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::crossproduct::{CrossProduct, GroundEnv, GroundStep, ObsCodec};
use crate::error::ConstructionError;
use crate::events::EventAlphabet;
use crate::label::{DetectorFn, LabellingFunction};
use crate::machine::{
    bounded_configurations, CountingRewardMachine, MachineSpec, StateId, TERMINAL_STATE,
};

/// Per-step penalty on non-accepting transitions.
pub const STEP_REWARD: f64 = -0.1;

/// Reward for the accepting transition into the terminal sink.
pub const ACCEPT_REWARD: f64 = 1.0;

/// Ground observation: the agent's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterObs {
    pub row: i64,
    pub col: i64,
}

/// The four moves plus standing still. Moves off the grid clamp in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterAction {
    Up,
    Down,
    Left,
    Right,
    Stay,
}

/// Static letter-world layout.
#[derive(Debug, Clone)]
pub struct LetterWorldConfig {
    pub rows: i64,
    pub cols: i64,
    /// Start cell when `random_start` is off.
    pub start: (i64, i64),
    pub a_cell: (i64, i64),
    pub b_cell: (i64, i64),
    pub c_cell: (i64, i64),
    /// Start each episode on a seeded random letter-free cell.
    pub random_start: bool,
}

impl Default for LetterWorldConfig {
    fn default() -> Self {
        LetterWorldConfig {
            rows: 5,
            cols: 5,
            start: (2, 0),
            a_cell: (0, 2),
            b_cell: (2, 4),
            c_cell: (4, 2),
            random_start: false,
        }
    }
}

/// Deterministic grid ground environment.
#[derive(Debug)]
pub struct LetterWorld {
    config: LetterWorldConfig,
    pos: (i64, i64),
    rng: ChaCha8Rng,
}

impl LetterWorld {
    pub fn new(config: LetterWorldConfig) -> Self {
        let pos = config.start;
        LetterWorld {
            config,
            pos,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    pub fn config(&self) -> &LetterWorldConfig {
        &self.config
    }

    /// Letter at `cell`, if any.
    pub fn symbol_at(&self, cell: (i64, i64)) -> Option<char> {
        if cell == self.config.a_cell {
            Some('A')
        } else if cell == self.config.b_cell {
            Some('B')
        } else if cell == self.config.c_cell {
            Some('C')
        } else {
            None
        }
    }

    fn sample_start(&mut self) -> (i64, i64) {
        // Bounded retry keeps this total even on degenerate layouts.
        for _ in 0..64 {
            let cell = (
                self.rng.gen_range(0..self.config.rows),
                self.rng.gen_range(0..self.config.cols),
            );
            if self.symbol_at(cell).is_none() {
                return cell;
            }
        }
        self.config.start
    }
}

impl GroundEnv for LetterWorld {
    type Obs = LetterObs;
    type Action = LetterAction;

    fn reset(&mut self, seed: Option<u64>) -> LetterObs {
        self.rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(0));
        self.pos = if self.config.random_start {
            self.sample_start()
        } else {
            self.config.start
        };
        LetterObs {
            row: self.pos.0,
            col: self.pos.1,
        }
    }

    fn step(&mut self, action: &LetterAction) -> GroundStep<LetterObs> {
        let (dr, dc) = match action {
            LetterAction::Up => (-1, 0),
            LetterAction::Down => (1, 0),
            LetterAction::Left => (0, -1),
            LetterAction::Right => (0, 1),
            LetterAction::Stay => (0, 0),
        };
        self.pos = (
            (self.pos.0 + dr).clamp(0, self.config.rows - 1),
            (self.pos.1 + dc).clamp(0, self.config.cols - 1),
        );
        GroundStep {
            obs: LetterObs {
                row: self.pos.0,
                col: self.pos.1,
            },
            reward: 0.0,
            terminated: false,
            truncated: false,
        }
    }
}

/// The letter-world alphabet.
pub fn letter_alphabet() -> EventAlphabet {
    EventAlphabet::new(["A", "B", "C"])
}

/// Detectors: a letter event fires when the agent lands on its cell.
pub fn letter_labelling(
    config: &LetterWorldConfig,
) -> Result<LabellingFunction<LetterObs, LetterAction>, ConstructionError> {
    let a = config.a_cell;
    let b = config.b_cell;
    let c = config.c_cell;
    let detectors: Vec<(&str, DetectorFn<LetterObs, LetterAction>)> = vec![
        ("A", Box::new(move |_o, _act, next| (next.row, next.col) == a)),
        ("B", Box::new(move |_o, _act, next| (next.row, next.col) == b)),
        ("C", Box::new(move |_o, _act, next| (next.row, next.col) == c)),
    ];
    LabellingFunction::new(letter_alphabet(), detectors)
}

/// The A-B-C task machine, arity 1, counter bounded by `counter_bound`
/// for counterfactual enumeration.
pub fn letter_machine(
    counter_bound: i64,
) -> Result<CountingRewardMachine<LetterObs, LetterAction>, ConstructionError> {
    let spec = MachineSpec {
        initial_state: 0,
        initial_counters: vec![0],
        state_transitions: vec![
            (
                0,
                vec![
                    ("A / (-)".to_string(), 0),
                    ("B / (-)".to_string(), 1),
                    (String::new(), 0),
                ],
            ),
            (
                1,
                vec![
                    ("C / (NZ)".to_string(), 1),
                    ("C / (Z)".to_string(), TERMINAL_STATE),
                    (String::new(), 1),
                ],
            ),
        ],
        counter_transitions: vec![
            (
                0,
                vec![
                    ("A / (-)".to_string(), vec![1]),
                    ("B / (-)".to_string(), vec![0]),
                    (String::new(), vec![0]),
                ],
            ),
            (
                1,
                vec![
                    ("C / (NZ)".to_string(), vec![-1]),
                    ("C / (Z)".to_string(), vec![0]),
                    (String::new(), vec![0]),
                ],
            ),
        ],
        reward_transitions: vec![
            (
                0,
                vec![
                    ("A / (-)".to_string(), STEP_REWARD.into()),
                    ("B / (-)".to_string(), STEP_REWARD.into()),
                    (String::new(), STEP_REWARD.into()),
                ],
            ),
            (
                1,
                vec![
                    ("C / (NZ)".to_string(), STEP_REWARD.into()),
                    ("C / (Z)".to_string(), ACCEPT_REWARD.into()),
                    (String::new(), STEP_REWARD.into()),
                ],
            ),
        ],
        reachable: bounded_configurations(&[0, 1], &[(0, counter_bound)]),
        ..MachineSpec::default()
    };
    CountingRewardMachine::new(letter_alphabet(), spec)
}

/// Augmented observation layout `[row, col, u, c1, ..., ck]`.
///
/// `decode_ground` assumes an observation produced by `encode`; feeding it
/// anything shorter is a contract violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LetterCodec;

impl LetterCodec {
    /// Flat observation dimension for a machine with `counter_arity`
    /// counters: row, col, machine state, then one slot per counter.
    pub fn dim(counter_arity: usize) -> usize {
        3 + counter_arity
    }
}

impl ObsCodec for LetterCodec {
    type GroundObs = LetterObs;
    type Obs = Vec<i64>;

    fn encode(&self, ground: &LetterObs, state: StateId, counters: &[i64]) -> Vec<i64> {
        let mut obs = Vec::with_capacity(3 + counters.len());
        obs.push(ground.row);
        obs.push(ground.col);
        obs.push(state as i64);
        obs.extend_from_slice(counters);
        obs
    }

    fn decode_ground(&self, obs: &Vec<i64>) -> LetterObs {
        LetterObs {
            row: obs[0],
            col: obs[1],
        }
    }
}

/// Fully wired letter-world cross-product.
pub fn letter_cross_product(
    config: LetterWorldConfig,
    max_steps: u64,
    counter_bound: i64,
) -> Result<CrossProduct<LetterWorld, LetterCodec>, ConstructionError> {
    let machine = Arc::new(letter_machine(counter_bound)?);
    let lf = letter_labelling(&config)?;
    CrossProduct::new(LetterWorld::new(config), machine, lf, LetterCodec, max_steps)
}
