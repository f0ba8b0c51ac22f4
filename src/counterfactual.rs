// src/counterfactual.rs
//
// Counterfactual experience generation: replay the event set of one real
// ground transition against every non-terminal reachable machine
// configuration, producing the experience the agent would have recorded
// from each. No environment stepping happens here.

use serde::{Deserialize, Serialize};

use crate::crossproduct::ObsCodec;
use crate::label::LabellingFunction;
use crate::machine::{CountingRewardMachine, StateId};

/// Machine-side annotations for one counterfactual experience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceInfo {
    /// Configuration the experience was generated from.
    pub machine_state: StateId,
    pub counters: Vec<i64>,
    /// Configuration after the replayed transition.
    pub next_machine_state: StateId,
    pub next_counters: Vec<i64>,
}

/// A batch of experiences as parallel buffers, one entry per replayed
/// configuration: `(obs, action, next_obs, reward, done, info)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceBatch<Obs, Act> {
    pub observations: Vec<Obs>,
    pub actions: Vec<Act>,
    pub next_observations: Vec<Obs>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    pub infos: Vec<ExperienceInfo>,
}

impl<Obs, Act> ExperienceBatch<Obs, Act> {
    fn with_capacity(capacity: usize) -> Self {
        ExperienceBatch {
            observations: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            next_observations: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
            infos: Vec::with_capacity(capacity),
        }
    }

    fn push(
        &mut self,
        obs: Obs,
        action: Act,
        next_obs: Obs,
        reward: f64,
        done: bool,
        info: ExperienceInfo,
    ) {
        self.observations.push(obs);
        self.actions.push(action);
        self.next_observations.push(next_obs);
        self.rewards.push(reward);
        self.dones.push(done);
        self.infos.push(info);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Replay one real transition `(obs, action, next_obs)` against every
/// non-terminal `(u, c)` in the machine's reachable configuration set.
///
/// The event set is computed once; for each configuration the machine is
/// stepped, the reward emitted against the real ground transition, and
/// both ends encoded through the codec. For any configuration a real
/// rollout could have been in, the produced tuple is identical to what
/// that rollout would have recorded.
pub fn generate_experience<O, A, C>(
    machine: &CountingRewardMachine<O, A>,
    lf: &LabellingFunction<O, A>,
    codec: &C,
    obs: &O,
    action: &A,
    next_obs: &O,
) -> ExperienceBatch<C::Obs, A>
where
    C: ObsCodec<GroundObs = O>,
    A: Clone,
{
    let events = lf.events(obs, action, next_obs);
    let configurations = machine.reachable_configurations();
    let mut batch = ExperienceBatch::with_capacity(configurations.len());

    for (state, counters) in configurations {
        if machine.is_terminal(*state) {
            continue;
        }
        let Ok(machine_step) = machine.transition(*state, counters, &events) else {
            continue;
        };

        let reward = machine_step.reward.emit(obs, action, next_obs);
        let done = machine.is_terminal(machine_step.next_state);
        let encoded = codec.encode(obs, *state, counters);
        let encoded_next = codec.encode(next_obs, machine_step.next_state, &machine_step.next_counters);

        batch.push(
            encoded,
            action.clone(),
            encoded_next,
            reward,
            done,
            ExperienceInfo {
                machine_state: *state,
                counters: counters.clone(),
                next_machine_state: machine_step.next_state,
                next_counters: machine_step.next_counters,
            },
        );
    }

    batch
}
