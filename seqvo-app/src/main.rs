//! Seqvo Command-Line Tool
//!
//! Builds the windowed training index for a set of pose/image sequences,
//! decodes the frames into the shared cache and prints individual samples.

mod app;

use clap::{Parser, ValueEnum};
use seqvo_train::Split;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SplitArg {
    Train,
    Valid,
}

impl From<SplitArg> for Split {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Train => Split::Train,
            SplitArg::Valid => Split::Valid,
        }
    }
}

/// Seqvo - windowed visual-odometry training data
#[derive(Parser, Debug)]
#[command(name = "seqvo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON dataset configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Which sequence list to load
    #[arg(short, long, value_enum, default_value_t = SplitArg::Train)]
    split: SplitArg,

    /// Use evaluation transforms (no augmentation)
    #[arg(long)]
    eval: bool,

    /// Print the sample at this index
    #[arg(long)]
    sample: Option<usize>,

    /// Only build the window index, skipping image decoding
    #[arg(long)]
    index_only: bool,

    /// Log level, overriding the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();

    let mut config = match app::AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(if e.is_configuration() { 2 } else { 1 });
        }
    };
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    app::init_logging(&config.logging);

    let options = app::RunOptions {
        split: args.split.into(),
        training: !args.eval,
        sample: args.sample,
        index_only: args.index_only,
    };
    if let Err(e) = app::run(&config, options) {
        tracing::error!("{}", e);
        std::process::exit(if e.is_configuration() { 2 } else { 1 });
    }
}
