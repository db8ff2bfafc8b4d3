use std::{env, fs};

use orchestra_train::{
    CheckpointState, Environment, ModelIdentifiers, Property, RunOptions, SessionConfig, Tensor,
    TrainErr, TrainingSession, scheduler::SchedulerSpec,
};

const TRAIN: &str = r#"{
    "layers": [{ "dense": { "weight": "w", "bias": "b", "dim": [2, 1] } }],
    "loss": { "loss_fn": "mse" }
}"#;

const SCHEDULER: SchedulerSpec = SchedulerSpec::Linear {
    warmup_steps: 0,
    total_steps: 10,
};

fn env() -> Environment {
    let mut env = Environment::new();
    env.register_model("train", TRAIN);
    env.register_model("adam", r#"{ "adam": {} }"#);
    env
}

fn checkpoint() -> CheckpointState {
    let mut state = CheckpointState::new();
    state
        .add_parameter("w", Tensor::new(vec![2, 1], vec![0.5, -1.]).unwrap(), true)
        .unwrap();
    state
        .add_parameter("b", Tensor::new(vec![1], vec![0.]).unwrap(), true)
        .unwrap();
    state
}

fn batch() -> Vec<Tensor> {
    vec![
        Tensor::new(vec![2, 2], vec![1., 2., -1., 0.5]).unwrap(),
        Tensor::new(vec![2, 1], vec![1., 0.]).unwrap(),
    ]
}

/// Runs `steps` full training steps, returning the final learning rate.
fn train(state: &mut CheckpointState, steps: usize) -> f32 {
    let env = env();
    let ids = ModelIdentifiers::new("train").with_optimizer("adam");
    let mut session = TrainingSession::new(&env, SessionConfig::default(), &[], state, &ids).unwrap();
    session
        .register_scheduler(|view| SCHEDULER.build(view), 1.)
        .unwrap();

    let options = RunOptions::new();
    for _ in 0..steps {
        session.lazy_reset_grad();
        session.train_step(&options, &batch()).unwrap();
        session.optimizer_step(&options).unwrap();
        session.scheduler_step().unwrap();
    }

    session.learning_rate().unwrap()
}

#[test]
fn save_and_load_preserves_training_progress() {
    let mut state = checkpoint();
    train(&mut state, 3);
    state.add_property("epoch", 3_i64);

    let path = env::temp_dir().join(format!("resume-{}.json", std::process::id()));
    state.save(&path).unwrap();
    let loaded = CheckpointState::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(loaded, state);
    assert_eq!(loaded.optimizer().step(), 3);
    assert_eq!(loaded.optimizer().scheduler_step(), 3);
    assert_eq!(loaded.property("epoch"), Some(&Property::Int(3)));

    let names: Vec<_> = loaded.optimizer().param_names().collect();
    assert_eq!(names, ["b", "w"]);
    assert_eq!(loaded.optimizer().state("w").unwrap().len(), 2);
}

#[test]
fn resumed_training_matches_uninterrupted_training() {
    let mut uninterrupted = checkpoint();
    let lr = train(&mut uninterrupted, 4);

    let mut resumed = checkpoint();
    train(&mut resumed, 3);

    let path = env::temp_dir().join(format!("resume-match-{}.json", std::process::id()));
    resumed.save(&path).unwrap();
    let mut resumed = CheckpointState::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    let resumed_lr = train(&mut resumed, 1);

    assert!((lr - resumed_lr).abs() < 1e-6);
    assert_eq!(resumed.optimizer().step(), 4);
    for (name, param) in uninterrupted.parameters().iter() {
        let other = resumed.parameters().get(name).unwrap();
        for (a, b) in param.data().data().iter().zip(other.data().data()) {
            assert!((a - b).abs() < 1e-6, "{name} diverged: {a} vs {b}");
        }
    }
}

#[test]
fn resumed_scheduler_restores_the_learning_rate() {
    let mut state = checkpoint();
    train(&mut state, 3);

    let env = env();
    let ids = ModelIdentifiers::new("train").with_optimizer("adam");
    let mut session =
        TrainingSession::new(&env, SessionConfig::default(), &[], &mut state, &ids).unwrap();
    session
        .register_scheduler(|view| SCHEDULER.build(view), 1.)
        .unwrap();

    // three linear decay steps out of ten
    assert!((session.learning_rate().unwrap() - 0.7).abs() < 1e-6);
}

#[test]
fn load_rejects_parameters_whose_data_doesnt_fill_their_shape() {
    let state = checkpoint();
    let path = env::temp_dir().join(format!("malformed-{}.json", std::process::id()));
    state.save(&path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let malformed = raw.replacen(r#""shape":[1],"data":[0.0]"#, r#""shape":[2],"data":[0.0]"#, 1);
    assert_ne!(raw, malformed);
    fs::write(&path, malformed).unwrap();

    let loaded = CheckpointState::load(&path);
    let _ = fs::remove_file(&path);

    assert!(matches!(loaded, Err(TrainErr::Serialization(_))));
}
