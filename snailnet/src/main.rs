//! Command line interface to create, inspect, run and train snail networks.

use env_logger::Builder;
use log::{debug, info};
use quicli::prelude::*;
use snail::{config::NetworkConfig, models::Network};
use snailnet::{read_samples, read_tensor, training_pairs};
use std::path::PathBuf;
use structopt::StructOpt;

/// Creates a randomly initialized network
#[derive(Debug, StructOpt)]
struct InitOpts {
    /// Path to the JSON description of the network
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    /// Output path, writes to /path/to/config.bin if not available
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Prints the layers of a network
#[derive(Debug, StructOpt)]
struct InspectOpts {
    /// Path to the network file
    #[structopt(parse(from_os_str))]
    network: PathBuf,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Runs a forward pass
#[derive(Debug, StructOpt)]
struct PredictOpts {
    /// Path to the network file
    #[structopt(parse(from_os_str))]
    network: PathBuf,
    /// Path to a (depth, height, width) npy array
    #[structopt(parse(from_os_str))]
    input: PathBuf,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Trains a network with gradient descent
#[derive(Debug, StructOpt)]
struct TrainOpts {
    /// Path to the network file
    #[structopt(parse(from_os_str))]
    network: PathBuf,
    /// Path to a (samples, depth, height, width) npy array of inputs
    #[structopt(parse(from_os_str))]
    inputs: PathBuf,
    /// Path to a (samples, depth, height, width) npy array of targets
    #[structopt(parse(from_os_str))]
    targets: PathBuf,
    /// Number of passes over the samples
    #[structopt(short = "e", long = "epochs", default_value = "10")]
    epochs: usize,
    /// Learning rate
    #[structopt(short = "l", long = "lambda", default_value = "0.1")]
    lambda: f32,
    /// Output path, overwrites the input network if not available
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Build and train small convolutional networks.
#[derive(Debug, StructOpt)]
#[structopt(name = "snailnet")]
enum Snailnet {
    #[structopt(
        name = "init",
        about = "Creates a randomly initialized network from a JSON description."
    )]
    Init(InitOpts),
    #[structopt(name = "inspect", about = "Prints type and geometry of every layer.")]
    Inspect(InspectOpts),
    #[structopt(
        name = "predict",
        about = "Runs a network on an npy array and prints the output."
    )]
    Predict(PredictOpts),
    #[structopt(
        name = "train",
        about = "Trains a network on npy sample stacks and saves it. \
        Logs the mean loss of every epoch."
    )]
    Train(TrainOpts),
}

/// Trait for the subcommands that snailnet uses
trait SnailnetOpts {
    /// Performs the subcommand
    fn run(&self) -> CliResult;
    /// Returns the verbosity command
    fn get_verbosity(&self) -> &Verbosity;
    /// Sets up logging
    fn setup_env_logger(&self) -> CliResult {
        let mut builder = Builder::from_default_env();

        builder
            .filter(None, self.get_verbosity().log_level().to_level_filter())
            .init();

        Ok(())
    }
}

impl SnailnetOpts for InitOpts {
    fn run(&self) -> CliResult {
        let config = NetworkConfig::from_path(&self.config)?;
        let net = Network::from_config(&config)?;

        let mut alternate_output_name = self.config.clone();
        alternate_output_name.set_extension("bin");
        let filepath = match &self.output {
            Some(p) => p,
            None => &alternate_output_name,
        };
        net.save(filepath)?;
        info!(
            "Created network {} -> {} with {} layers at {}",
            net.input_size(),
            net.output_size(),
            net.layers().len(),
            filepath.display()
        );
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl SnailnetOpts for InspectOpts {
    fn run(&self) -> CliResult {
        let net = Network::load(&self.network)?;
        println!("input {}, output {}", net.input_size(), net.output_size());
        for (i, layer) in net.layers().iter().enumerate() {
            println!("{}: {}", i, layer);
        }
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl SnailnetOpts for PredictOpts {
    fn run(&self) -> CliResult {
        let mut net = Network::load(&self.network)?;
        let input = read_tensor(&self.input)?;
        let output = net.forward(&input)?;
        println!("{:.6}", output.as_array());
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl SnailnetOpts for TrainOpts {
    fn run(&self) -> CliResult {
        let mut net = Network::load(&self.network)?;
        let samples = training_pairs(read_samples(&self.inputs)?, read_samples(&self.targets)?)?;
        debug!(
            "Training on {} samples, lambda {}",
            samples.len(),
            self.lambda
        );

        for epoch in 0..self.epochs {
            let mut total_loss = 0.;
            for (input, target) in &samples {
                total_loss += net.train(input, target, self.lambda)?;
            }
            info!(
                "Epoch {}: mean loss {}",
                epoch + 1,
                total_loss / samples.len() as f32
            );
        }

        let filepath = self.output.as_ref().unwrap_or(&self.network);
        net.save(filepath)?;
        info!("Saved trained network to {}", filepath.display());
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl SnailnetOpts for Snailnet {
    fn run(&self) -> CliResult {
        match self {
            Snailnet::Init(c) => c.run(),
            Snailnet::Inspect(c) => c.run(),
            Snailnet::Predict(c) => c.run(),
            Snailnet::Train(c) => c.run(),
        }
    }

    fn get_verbosity(&self) -> &Verbosity {
        match self {
            Snailnet::Init(c) => c.get_verbosity(),
            Snailnet::Inspect(c) => c.get_verbosity(),
            Snailnet::Predict(c) => c.get_verbosity(),
            Snailnet::Train(c) => c.get_verbosity(),
        }
    }
}

fn main() -> CliResult {
    let args = Snailnet::from_args();
    args.setup_env_logger()?;
    args.run()
}
