// src/crossproduct.rs
//
// The cross-product environment: ground environment x labelling function x
// machine, presented as a single Gym-style environment whose observation
// augments the ground observation with the machine state and counters.
//
// The machine is the sole reward source; ground rewards and ground
// termination flags are discarded by contract. Episode state (machine
// state, counters, step count, last ground observation) is owned here and
// committed atomically after all fallible work in a step has succeeded.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::counterfactual::{generate_experience, ExperienceBatch};
use crate::error::{ConstructionError, EncoderError, StateError, StepError};
use crate::events::EventSet;
use crate::label::LabellingFunction;
use crate::logging::{EpisodeSink, NoopSink, StepRecord};
use crate::machine::{CountingRewardMachine, StateId};

/// Result of one ground-environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundStep<O> {
    pub obs: O,
    /// Ground reward. Ignored by the cross-product.
    pub reward: f64,
    /// Ground termination flag. Ignored by the cross-product.
    pub terminated: bool,
    /// Ground truncation flag. Ignored by the cross-product.
    pub truncated: bool,
}

/// The ground environment contract consumed by the cross-product.
pub trait GroundEnv {
    type Obs: Clone;
    type Action;

    /// Start a new episode and return the initial observation.
    fn reset(&mut self, seed: Option<u64>) -> Self::Obs;

    /// Advance the ground dynamics by one action.
    fn step(&mut self, action: &Self::Action) -> GroundStep<Self::Obs>;
}

/// User-supplied augmented-observation layout.
///
/// `encode` and `decode_ground` must be mutually consistent on the
/// `(ground obs, state, counters)` domain seen at runtime:
/// `decode_ground(encode(o, u, c)) == o`. [`verify_codec_roundtrip`] checks
/// this in tests.
pub trait ObsCodec {
    type GroundObs;
    type Obs: Clone;

    fn encode(&self, ground: &Self::GroundObs, state: StateId, counters: &[i64]) -> Self::Obs;

    fn decode_ground(&self, obs: &Self::Obs) -> Self::GroundObs;
}

/// Per-step diagnostic record returned alongside the observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step index within the episode (1-based).
    pub step: u64,
    /// Machine state after the transition.
    pub machine_state: StateId,
    /// Counters after the transition.
    pub counters: Vec<i64>,
    /// Events the labelling function observed on this transition.
    pub events: EventSet,
    /// Why the episode ended, if it did.
    pub termination_reason: Option<String>,
}

/// Result of a single cross-product step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult<Obs> {
    pub observation: Obs,
    pub reward: f64,
    /// The machine reached a terminal state.
    pub terminated: bool,
    /// The step limit was reached.
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone)]
struct Episode<O> {
    machine_state: StateId,
    counters: Vec<i64>,
    steps: u64,
    last_ground_obs: O,
    finished: bool,
}

/// Gym-style cross-product of a ground environment, a labelling function
/// and a counting reward machine.
///
/// Machines are immutable and arrive behind an `Arc` so several
/// cross-products (and the counterfactual generator) can share one. A
/// cross-product itself owns mutable episode state and is not shareable.
pub struct CrossProduct<G, C>
where
    G: GroundEnv,
    C: ObsCodec<GroundObs = G::Obs>,
{
    ground: G,
    machine: Arc<CountingRewardMachine<G::Obs, G::Action>>,
    lf: LabellingFunction<G::Obs, G::Action>,
    codec: C,
    max_steps: u64,
    sink: Box<dyn EpisodeSink + Send>,
    episode: Option<Episode<G::Obs>>,
}

impl<G, C> fmt::Debug for CrossProduct<G, C>
where
    G: GroundEnv,
    C: ObsCodec<GroundObs = G::Obs>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossProduct")
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl<G, C> CrossProduct<G, C>
where
    G: GroundEnv,
    C: ObsCodec<GroundObs = G::Obs>,
{
    /// Compose the cross-product. The labelling function and the machine
    /// must share one alphabet.
    pub fn new(
        ground: G,
        machine: Arc<CountingRewardMachine<G::Obs, G::Action>>,
        lf: LabellingFunction<G::Obs, G::Action>,
        codec: C,
        max_steps: u64,
    ) -> Result<Self, ConstructionError> {
        if lf.alphabet() != machine.alphabet() {
            return Err(ConstructionError::AlphabetMismatch);
        }
        Ok(CrossProduct {
            ground,
            machine,
            lf,
            codec,
            max_steps,
            sink: Box::new(NoopSink),
            episode: None,
        })
    }

    /// Replace the episode sink (default: [`NoopSink`]). Sinks observe
    /// committed steps only and never affect semantics.
    pub fn with_sink(mut self, sink: Box<dyn EpisodeSink + Send>) -> Self {
        self.sink = sink;
        self
    }

    /// Start a new episode: reset the ground environment, rewind the
    /// machine to `(u0, c0)`, and return the initial augmented observation.
    pub fn reset(&mut self, seed: Option<u64>) -> C::Obs {
        let ground_obs = self.ground.reset(seed);
        let machine_state = self.machine.initial_state();
        let counters = self.machine.initial_counters().to_vec();
        let observation = self.codec.encode(&ground_obs, machine_state, &counters);

        self.episode = Some(Episode {
            machine_state,
            counters,
            steps: 0,
            last_ground_obs: ground_obs,
            finished: false,
        });
        observation
    }

    /// Advance one step: ground step, labelling, machine transition,
    /// reward emission, then the atomic episode commit.
    pub fn step(&mut self, action: &G::Action) -> Result<StepResult<C::Obs>, StepError> {
        let mut episode = match self.episode.take() {
            Some(episode) => episode,
            None => return Err(StateError::NotReset.into()),
        };
        if episode.finished {
            self.episode = Some(episode);
            return Err(StateError::EpisodeOver.into());
        }

        let step = episode.steps + 1;
        let ground = self.ground.step(action);
        let events = self
            .lf
            .events(&episode.last_ground_obs, action, &ground.obs);
        let machine_step =
            match self
                .machine
                .transition(episode.machine_state, &episode.counters, &events)
            {
                Ok(machine_step) => machine_step,
                Err(err) => {
                    self.episode = Some(episode);
                    return Err(err.into());
                }
            };

        let reward = machine_step
            .reward
            .emit(&episode.last_ground_obs, action, &ground.obs);
        let next_state = machine_step.next_state;
        let next_counters = machine_step.next_counters;

        let terminated = self.machine.is_terminal(next_state);
        let truncated = step >= self.max_steps;
        let observation = self.codec.encode(&ground.obs, next_state, &next_counters);

        let termination_reason = if terminated {
            Some("MachineTerminal".to_string())
        } else if truncated {
            Some("MaxSteps".to_string())
        } else {
            None
        };
        let info = StepInfo {
            step,
            machine_state: next_state,
            counters: next_counters.clone(),
            events: events.clone(),
            termination_reason,
        };

        episode.machine_state = next_state;
        episode.counters = next_counters;
        episode.steps = step;
        episode.last_ground_obs = ground.obs;
        episode.finished = terminated || truncated;
        self.episode = Some(episode);

        self.sink.log_step(&StepRecord {
            step,
            machine_state: info.machine_state,
            counters: info.counters.clone(),
            events: info.events.clone(),
            reward,
            terminated,
            truncated,
        });

        Ok(StepResult {
            observation,
            reward,
            terminated,
            truncated,
            info,
        })
    }

    /// Recover the ground observation from an augmented observation.
    pub fn to_ground_obs(&self, obs: &C::Obs) -> G::Obs {
        self.codec.decode_ground(obs)
    }

    /// Replay one real ground transition against every non-terminal
    /// reachable machine configuration. See [`crate::counterfactual`].
    pub fn generate_counterfactual_experience(
        &self,
        obs: &G::Obs,
        action: &G::Action,
        next_obs: &G::Obs,
    ) -> ExperienceBatch<C::Obs, G::Action>
    where
        G::Action: Clone,
    {
        generate_experience(&self.machine, &self.lf, &self.codec, obs, action, next_obs)
    }

    pub fn machine(&self) -> &CountingRewardMachine<G::Obs, G::Action> {
        &self.machine
    }

    pub fn ground(&self) -> &G {
        &self.ground
    }

    /// The observation codec; its `Obs` type is the environment's
    /// observation space, shape helpers included.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Machine state of the running episode, if one is active.
    pub fn machine_state(&self) -> Option<StateId> {
        self.episode.as_ref().map(|episode| episode.machine_state)
    }

    /// Counters of the running episode, if one is active.
    pub fn counters(&self) -> Option<&[i64]> {
        self.episode
            .as_ref()
            .map(|episode| episode.counters.as_slice())
    }

    /// Steps taken in the running episode, if one is active.
    pub fn steps(&self) -> Option<u64> {
        self.episode.as_ref().map(|episode| episode.steps)
    }
}

/// Assert that a codec round-trips on one `(ground obs, state, counters)`
/// point: decoding the encoded observation recovers the ground observation,
/// and re-encoding reproduces the augmented observation. Intended for test
/// builds; the codecs themselves are trusted at runtime.
pub fn verify_codec_roundtrip<C>(
    codec: &C,
    ground: &C::GroundObs,
    state: StateId,
    counters: &[i64],
) -> Result<(), EncoderError>
where
    C: ObsCodec,
    C::GroundObs: PartialEq,
    C::Obs: PartialEq,
{
    let encoded = codec.encode(ground, state, counters);
    let decoded = codec.decode_ground(&encoded);
    if &decoded != ground {
        return Err(EncoderError { state });
    }
    let reencoded = codec.encode(&decoded, state, counters);
    if reencoded != encoded {
        return Err(EncoderError { state });
    }
    Ok(())
}
