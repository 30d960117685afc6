//! Modelport CLI - converts a pretrained transformer model directory into a
//! portable computation-graph artifact.
//!
//! This binary is a thin front over the modelport library: it parses
//! arguments, sets up logging and maps the run outcome to an exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use modelport::{
    ExportConfig, ExportDefaults, LogSink, ModelSource, ModelportError, SyntheticSpec,
};

#[derive(Parser, Debug)]
#[command(name = "modelport")]
#[command(about = "Export transformer language models to portable graph artifacts")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a model directory to a graph artifact
    Convert {
        /// Model directory (config.json + tokenizer.json)
        model_path: PathBuf,

        /// Destination path of the primary artifact
        #[arg(short, long)]
        output: PathBuf,

        /// Operator-set version to export with
        #[arg(long, default_value_t = ExportDefaults::OPSET)]
        opset: u32,

        /// Maximum example-input sequence length
        #[arg(long, default_value_t = ExportDefaults::MAX_SEQUENCE_LENGTH)]
        max_length: usize,

        /// Task hint recorded in the run report
        #[arg(long, default_value = ExportDefaults::TASK)]
        task: String,

        /// Overwrite an existing file at the destination
        #[arg(short, long)]
        force: bool,
    },

    /// Write a small synthetic model directory for toolchain validation
    MakeTestModel {
        /// Directory to create the model in
        dir: PathBuf,

        /// Number of hidden layers
        #[arg(long, default_value_t = 2)]
        layers: usize,

        /// Hidden dimension
        #[arg(long, default_value_t = 8)]
        hidden_size: usize,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let result = match args.command {
        Command::Convert {
            model_path,
            output,
            opset,
            max_length,
            task,
            force,
        } => run_convert(model_path, output, opset, max_length, task, force),
        Command::MakeTestModel {
            dir,
            layers,
            hidden_size,
        } => run_make_test_model(dir, layers, hidden_size),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            if let Some(ModelportError::AllStrategiesFailed { attempts }) =
                err.downcast_ref::<ModelportError>()
            {
                for attempt in attempts {
                    error!(strategy = %attempt.strategy, "attempt outcome: {:?}", attempt.outcome);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run_convert(
    model_path: PathBuf,
    output: PathBuf,
    opset: u32,
    max_length: usize,
    task: String,
    force: bool,
) -> Result<()> {
    let source = ModelSource::new(model_path).task(task);
    let config = ExportConfig::new(output)
        .opset(opset)
        .max_length(max_length)
        .overwrite(force);

    let outcome = modelport::convert(&source, &config, &LogSink)?;
    if outcome.fidelity.is_degraded() {
        warn!(
            fidelity = %outcome.fidelity,
            strategy = %outcome.strategy,
            "export succeeded at reduced fidelity; the artifact does not carry the full forward pass"
        );
    }
    info!(
        output = %outcome.artifacts.primary.path.display(),
        report = %outcome.report.display(),
        "conversion complete"
    );
    Ok(())
}

fn run_make_test_model(dir: PathBuf, layers: usize, hidden_size: usize) -> Result<()> {
    let spec = SyntheticSpec {
        num_hidden_layers: layers,
        hidden_size,
        ..SyntheticSpec::default()
    };
    modelport::write_test_model(&dir, &spec)
        .with_context(|| format!("writing test model to {}", dir.display()))?;
    info!(
        dir = %dir.display(),
        model_type = %spec.model_type,
        "synthetic test model written"
    );
    Ok(())
}
