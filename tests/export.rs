#![cfg(feature = "export")]

use std::{env, fs};

use orchestra_train::{
    CheckpointState, Environment, ModelIdentifiers, RunOptions, SessionConfig, Tensor, TrainErr,
    TrainingSession, inference::InferenceModel, initialization::ParamInit,
    engine::GraphSpec,
};

const TRAIN: &str = r#"{
    "layers": [
        { "dense": { "weight": "fc1.weight", "bias": "fc1.bias", "dim": [2, 3],
                     "act_fn": { "sigmoid": { "amp": 1.0 } } } },
        { "dense": { "weight": "fc2.weight", "bias": "fc2.bias", "dim": [3, 1] } }
    ],
    "loss": { "loss_fn": "mse" }
}"#;

fn env() -> Environment {
    let mut env = Environment::new();
    env.register_model("train", TRAIN);
    env.register_model("eval", TRAIN);
    env.register_model("momentum", r#"{ "gradient_descent_with_momentum": { "momentum": 0.9 } }"#);
    env
}

fn checkpoint() -> CheckpointState {
    let spec = GraphSpec::from_json(TRAIN).unwrap();
    CheckpointState::init_from_graph(&spec, ParamInit::XavierUniform, Some(42)).unwrap()
}

fn inputs() -> Vec<Tensor> {
    vec![
        Tensor::new(vec![3, 2], vec![0., 0., 0.5, 1., 1., -1.]).unwrap(),
        Tensor::new(vec![3, 1], vec![0., 1., 0.5]).unwrap(),
    ]
}

#[test]
fn exported_model_matches_eval() {
    let env = env();
    let mut state = checkpoint();
    let ids = ModelIdentifiers::new("train")
        .with_eval("eval")
        .with_optimizer("momentum");
    let mut session =
        TrainingSession::new(&env, SessionConfig::default(), &[], &mut state, &ids).unwrap();

    session.set_learning_rate(0.5).unwrap();
    for _ in 0..3 {
        session.lazy_reset_grad();
        session.train_step(&RunOptions::new(), &inputs()).unwrap();
        session.optimizer_step(&RunOptions::new()).unwrap();
    }

    let path = env::temp_dir().join(format!("export-{}.json", std::process::id()));
    session
        .export_model_for_inferencing(&path, &["output".into()])
        .unwrap();

    let model = InferenceModel::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(model.input_names(), ["input"]);
    assert_eq!(model.output_names(), ["output"]);

    let eval = session.eval_step(&RunOptions::new(), &inputs()).unwrap();
    let exported = model.run(&inputs()[..1]).unwrap();

    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].shape(), eval[1].shape());
    for (a, b) in exported[0].data().iter().zip(eval[1].data()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn export_snapshots_parameters_at_call_time() {
    let env = env();
    let mut state = checkpoint();
    let ids = ModelIdentifiers::new("train").with_optimizer("momentum");
    let mut session =
        TrainingSession::new(&env, SessionConfig::default(), &[], &mut state, &ids).unwrap();

    let path = env::temp_dir().join(format!("export-snapshot-{}.json", std::process::id()));
    session
        .export_model_for_inferencing(&path, &["output".into()])
        .unwrap();

    let before = InferenceModel::load(&path).unwrap().run(&inputs()[..1]).unwrap();

    session.set_learning_rate(0.5).unwrap();
    session.train_step(&RunOptions::new(), &inputs()).unwrap();
    session.optimizer_step(&RunOptions::new()).unwrap();

    let after = InferenceModel::load(&path).unwrap().run(&inputs()[..1]).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(before, after);
}

#[test]
fn export_rejects_unknown_outputs() {
    let env = env();
    let mut state = checkpoint();
    let session = TrainingSession::new(
        &env,
        SessionConfig::default(),
        &[],
        &mut state,
        &ModelIdentifiers::new("train"),
    )
    .unwrap();

    let path = env::temp_dir().join("export-never-written.json");
    assert!(matches!(
        session.export_model_for_inferencing(&path, &["logits".into()]),
        Err(TrainErr::InvalidArgument(_))
    ));
    assert!(matches!(
        session.export_model_for_inferencing(&path, &[]),
        Err(TrainErr::InvalidArgument(_))
    ));
    assert!(!path.exists());
}
