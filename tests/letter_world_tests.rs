use countrm::letter::{
    letter_cross_product, letter_machine, LetterAction, LetterObs, LetterWorldConfig,
    ACCEPT_REWARD, STEP_REWARD,
};
use countrm::machine::{StateId, TERMINAL_STATE};
use countrm::{verify_codec_roundtrip, EventSet, LetterCodec, StepError};

const EPS: f64 = 1e-12;

/// Drive the machine through a sequence of event sets, collecting the
/// `(u, c)` trajectory and per-step rewards. Rewards are emitted against a
/// dummy ground transition (the letter machine is all-constant).
fn run_machine(events: &[&[&str]]) -> (Vec<(StateId, i64)>, Vec<f64>) {
    let machine = letter_machine(3).unwrap();
    let dummy = LetterObs { row: 0, col: 0 };

    let mut state = machine.initial_state();
    let mut counters = machine.initial_counters().to_vec();
    let mut trajectory = vec![(state, counters[0])];
    let mut rewards = Vec::new();

    for names in events {
        let set = EventSet::from_names(names.iter().copied());
        let step = machine.transition(state, &counters, &set).unwrap();
        rewards.push(step.reward.emit(&dummy, &LetterAction::Stay, &dummy));
        state = step.next_state;
        counters = step.next_counters;
        trajectory.push((state, counters[0]));
    }
    (trajectory, rewards)
}

#[test]
fn count_two_as_then_drain() {
    // {}, {A}, {A}, {B}, {C}, {C}: count to two, switch on B, drain twice.
    let (trajectory, rewards) = run_machine(&[&[], &["A"], &["A"], &["B"], &["C"], &["C"]]);

    assert_eq!(
        trajectory,
        vec![(0, 0), (0, 0), (0, 1), (0, 2), (1, 2), (1, 1), (1, 0)]
    );
    for reward in &rewards {
        assert!((reward - STEP_REWARD).abs() < EPS);
    }

    // One more C at (1, 0) takes the accepting edge into the sink.
    let machine = letter_machine(3).unwrap();
    let step = machine
        .transition(1, &[0], &EventSet::from_names(["C"]))
        .unwrap();
    assert_eq!(step.next_state, TERMINAL_STATE);
    let dummy = LetterObs { row: 0, col: 0 };
    assert!((step.reward.emit(&dummy, &LetterAction::Stay, &dummy) - ACCEPT_REWARD).abs() < EPS);
}

#[test]
fn immediate_b_then_c_terminates_in_two_steps() {
    let (trajectory, rewards) = run_machine(&[&["B"], &["C"]]);

    assert_eq!(trajectory, vec![(0, 0), (1, 0), (TERMINAL_STATE, 0)]);
    assert_eq!(rewards.len(), 2);
    assert!((rewards[0] - STEP_REWARD).abs() < EPS);
    assert!((rewards[1] - ACCEPT_REWARD).abs() < EPS);
}

#[test]
fn one_a_needs_one_drain_before_accepting() {
    let (trajectory, rewards) = run_machine(&[&["A"], &["B"], &["C"], &["C"]]);

    assert_eq!(
        trajectory,
        vec![(0, 0), (0, 1), (1, 1), (1, 0), (TERMINAL_STATE, 0)]
    );
    assert!((rewards[0] - STEP_REWARD).abs() < EPS);
    assert!((rewards[1] - STEP_REWARD).abs() < EPS);
    assert!((rewards[2] - STEP_REWARD).abs() < EPS);
    assert!((rewards[3] - ACCEPT_REWARD).abs() < EPS);
}

/// The walkable plan for the default layout: one A, then B, then C twice
/// (the second C lands on the drained counter and accepts).
fn full_task_plan() -> Vec<LetterAction> {
    use LetterAction::*;
    vec![
        Right, Up, Up, Right, // ... onto A at (0, 2)
        Down, Right, Down, Right, // ... onto B at (2, 4)
        Down, Down, Left, Left, // ... onto C at (4, 2)
        Stay, // refire C with the counter drained
    ]
}

#[test]
fn full_task_episode_through_the_grid() {
    let mut env = letter_cross_product(LetterWorldConfig::default(), 100, 3).unwrap();
    let obs = env.reset(None);
    assert_eq!(obs, vec![2, 0, 0, 0]);

    let plan = full_task_plan();
    let mut last = None;
    for (i, action) in plan.iter().enumerate() {
        let result = env.step(action).unwrap();
        if i < plan.len() - 1 {
            assert!(!result.terminated, "terminated early at step {i}");
            assert!((result.reward - STEP_REWARD).abs() < EPS);
        }
        last = Some(result);
    }

    let last = last.unwrap();
    assert!(last.terminated);
    assert!(!last.truncated);
    assert!((last.reward - ACCEPT_REWARD).abs() < EPS);
    assert_eq!(last.info.machine_state, TERMINAL_STATE);
    assert_eq!(last.info.counters, vec![0]);

    // Augmented observation carries the terminal machine state.
    assert_eq!(last.observation, vec![4, 2, -1, 0]);
}

#[test]
fn empty_events_never_terminate_until_truncation() {
    // Stay on the (letter-free) start cell: the event set is empty every
    // step, the machine sits at (0, 0), and only the step limit ends it.
    let mut env = letter_cross_product(LetterWorldConfig::default(), 200, 3).unwrap();
    env.reset(None);

    for step in 1..=200u64 {
        let result = env.step(&LetterAction::Stay).unwrap();
        assert!((result.reward - STEP_REWARD).abs() < EPS);
        assert!(!result.terminated);
        assert_eq!(result.info.machine_state, 0);
        assert_eq!(result.info.counters, vec![0]);
        assert!(result.info.events.is_empty());
        assert_eq!(result.truncated, step == 200);
    }

    let err = env.step(&LetterAction::Stay).unwrap_err();
    assert!(matches!(err, StepError::State(_)));
}

#[test]
fn identical_seeds_replay_identically() {
    let config = LetterWorldConfig {
        random_start: true,
        ..LetterWorldConfig::default()
    };
    let plan = full_task_plan();

    let mut env1 = letter_cross_product(config.clone(), 100, 3).unwrap();
    let mut env2 = letter_cross_product(config, 100, 3).unwrap();

    let obs1 = env1.reset(Some(1234));
    let obs2 = env2.reset(Some(1234));
    assert_eq!(obs1, obs2);

    for action in &plan {
        let r1 = env1.step(action).unwrap();
        let r2 = env2.step(action).unwrap();
        assert_eq!(r1.observation, r2.observation);
        assert!((r1.reward - r2.reward).abs() < EPS);
        assert_eq!(r1.terminated, r2.terminated);
        assert_eq!(r1.truncated, r2.truncated);
        assert_eq!(r1.info, r2.info);
        if r1.terminated || r1.truncated {
            break;
        }
    }
}

#[test]
fn transition_is_total_over_all_event_subsets() {
    // Every reachable non-terminal configuration must step successfully on
    // every subset of the alphabet, landing in a declared or terminal state
    // with counters of the machine's arity.
    let machine = letter_machine(3).unwrap();
    let letters = ["A", "B", "C"];

    for (state, counters) in machine.reachable_configurations() {
        if machine.is_terminal(*state) {
            continue;
        }
        for mask in 0..(1u32 << letters.len()) {
            let subset: Vec<&str> = letters
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, name)| *name)
                .collect();
            let events = EventSet::from_names(subset);

            let step = machine.transition(*state, counters, &events).unwrap();
            assert_eq!(step.next_counters.len(), machine.counter_arity());
            assert!(
                machine.states().contains(&step.next_state)
                    || machine.is_terminal(step.next_state)
            );
        }
    }
}

#[test]
fn codec_round_trips_across_the_runtime_domain() {
    for row in 0..5 {
        for col in 0..5 {
            let ground = LetterObs { row, col };
            for state in [-1, 0, 1] {
                for counter in 0..4 {
                    assert!(
                        verify_codec_roundtrip(&LetterCodec, &ground, state, &[counter]).is_ok()
                    );
                }
            }
        }
    }
}
