use std::{env, fs, num::NonZeroUsize, path::PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use serde::Deserialize;

use orchestra_train::{
    CheckpointState, Environment, ModelIdentifiers, Property, RunOptions, SessionConfig, Tensor,
    TrainingSession, engine::GraphSpec, initialization::ParamInit, scheduler::SchedulerSpec,
};

#[derive(Debug, Deserialize)]
struct DatasetConfig {
    data: Vec<f32>,
    x_size: usize,
    y_size: usize,
}

#[derive(Debug, Deserialize)]
struct ExportConfig {
    path: PathBuf,
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RunConfig {
    train_model: String,
    #[serde(default)]
    eval_model: Option<String>,
    optim_model: String,
    checkpoint: PathBuf,
    #[serde(default = "default_init")]
    init: ParamInit,
    #[serde(default)]
    seed: Option<u64>,
    dataset: DatasetConfig,
    epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
    #[serde(default = "default_accumulation")]
    grad_accumulation: NonZeroUsize,
    learning_rate: f32,
    #[serde(default = "default_scheduler")]
    scheduler: SchedulerSpec,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    export: Option<ExportConfig>,
}

fn default_init() -> ParamInit {
    ParamInit::XavierUniform
}

fn default_accumulation() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn default_scheduler() -> SchedulerSpec {
    SchedulerSpec::Constant
}

const EPOCH: &str = "epoch";

/// The loss is the first output of a graph with a loss head.
fn loss_of(outputs: &[Tensor]) -> Result<f32> {
    outputs
        .first()
        .and_then(|loss| loss.data().first())
        .copied()
        .context("graph produced no loss")
}

/// Splits the dataset's rows in `[x, y]` batches.
fn batches(dataset: &DatasetConfig, batch_size: usize) -> Result<Vec<[Tensor; 2]>> {
    let DatasetConfig {
        data,
        x_size,
        y_size,
    } = dataset;

    let row = x_size + y_size;
    if *x_size == 0 || *y_size == 0 || data.is_empty() || data.len() % row != 0 {
        bail!(
            "dataset of {} values can't be split in rows of {x_size} + {y_size}",
            data.len()
        );
    }

    data.chunks(row * batch_size)
        .map(|chunk| -> Result<[Tensor; 2]> {
            let rows = chunk.len() / row;
            let (mut x, mut y) = (Vec::with_capacity(rows * x_size), Vec::with_capacity(rows * y_size));

            for sample in chunk.chunks(row) {
                let (xs, ys) = sample.split_at(*x_size);
                x.extend_from_slice(xs);
                y.extend_from_slice(ys);
            }

            Ok([
                Tensor::new(vec![rows, *x_size], x)?,
                Tensor::new(vec![rows, *y_size], y)?,
            ])
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        bail!("usage: orchestra-train <run-config.json>");
    };

    let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: RunConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    config.scheduler.validate()?;

    let env = Environment::new();
    let mut ids = ModelIdentifiers::new(&config.train_model).with_optimizer(&config.optim_model);
    if let Some(eval) = &config.eval_model {
        ids = ids.with_eval(eval);
    }

    let mut state = if config.checkpoint.exists() {
        info!("resuming from {}", config.checkpoint.display());
        CheckpointState::load(&config.checkpoint)?
    } else {
        let spec = GraphSpec::from_json(&env.resolve(&config.train_model)?)?;
        CheckpointState::init_from_graph(&spec, config.init, config.seed)?
    };

    let start = match state.property(EPOCH) {
        Some(Property::Int(epoch)) => usize::try_from(*epoch).unwrap_or_default(),
        _ => 0,
    };
    let end = start + config.epochs.get();
    let batches = batches(&config.dataset, config.batch_size.get())?;

    {
        let mut session =
            TrainingSession::new(&env, config.session.clone(), &[], &mut state, &ids)?;

        let scheduler = config.scheduler;
        session.register_scheduler(|view| scheduler.build(view), config.learning_rate)?;

        let accumulation = config.grad_accumulation.get();
        for epoch in start..end {
            let mut loss = 0.;

            for (i, batch) in batches.iter().enumerate() {
                let options = RunOptions::new().with_tag(format!("epoch-{epoch}-batch-{i}"));
                let outputs = session.train_step(&options, batch)?;
                loss += loss_of(&outputs)?;

                if (i + 1) % accumulation == 0 || i + 1 == batches.len() {
                    session.optimizer_step(&options)?;
                    session.lazy_reset_grad();
                }
            }

            let lr = session.scheduler_step()?;
            info!(
                epoch = epoch,
                loss = loss / batches.len() as f32,
                lr = lr;
                "finished epoch"
            );

            if config.eval_model.is_some() {
                if session.eval_model_input_count()? != 2 {
                    bail!("the eval model must take an input and a target");
                }

                let eval_loss = batches.iter().try_fold(0., |acc, batch| {
                    let outputs = session.eval_step(&RunOptions::new(), batch)?;
                    anyhow::Ok(acc + loss_of(&outputs)?)
                })?;

                info!(epoch = epoch, loss = eval_loss / batches.len() as f32; "evaluated");
            }
        }

        if let Some(export) = &config.export {
            session.export_model_for_inferencing(&export.path, &export.outputs)?;
        }
    }

    state.add_property(EPOCH, end as i64);
    state.save(&config.checkpoint)?;
    info!("saved checkpoint to {}", config.checkpoint.display());

    Ok(())
}
