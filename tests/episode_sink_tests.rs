use countrm::letter::{letter_cross_product, LetterAction, LetterWorldConfig, STEP_REWARD};
use countrm::{JsonlSink, StepRecord};

#[test]
fn cross_product_logs_committed_steps_as_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("episode.jsonl");

    {
        let mut env = letter_cross_product(LetterWorldConfig::default(), 100, 3)
            .unwrap()
            .with_sink(Box::new(JsonlSink::create(&path).unwrap()));
        env.reset(None);

        // Three moves along the bottom-left corner; no letters fire.
        env.step(&LetterAction::Down).unwrap();
        env.step(&LetterAction::Down).unwrap();
        env.step(&LetterAction::Right).unwrap();
    } // dropping the env flushes the sink

    let contents = std::fs::read_to_string(&path).unwrap();
    let records: Vec<StepRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.step, i as u64 + 1);
        assert_eq!(record.machine_state, 0);
        assert_eq!(record.counters, vec![0]);
        assert!(record.events.is_empty());
        assert!((record.reward - STEP_REWARD).abs() < 1e-12);
        assert!(!record.terminated);
        assert!(!record.truncated);
    }
}

#[test]
fn sink_records_the_accepting_step() {
    use LetterAction::*;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accept.jsonl");

    {
        let mut env = letter_cross_product(LetterWorldConfig::default(), 100, 3)
            .unwrap()
            .with_sink(Box::new(JsonlSink::create(&path).unwrap()));
        env.reset(None);

        // Straight to B at (2, 4), then to C at (4, 2). No A was counted,
        // so the first C lands on a zero counter and accepts.
        for action in [Right, Right, Right, Right, Down, Down, Left, Left] {
            env.step(&action).unwrap();
        }
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let records: Vec<StepRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 8);

    let last = records.last().unwrap();
    assert!(last.terminated);
    assert_eq!(last.machine_state, -1);
    assert!(last.events.contains("C"));
    assert!((last.reward - 1.0).abs() < 1e-12);
}
