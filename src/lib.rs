pub mod cli;
pub mod column;
pub mod datatype;
pub mod datetime_format;
pub mod fetch;
pub mod integrity;
pub mod io_utils;
pub mod key;
pub mod metadata;
pub mod number_format;
pub mod report;
pub mod row;
pub mod schema;
pub mod table;
pub mod table_print;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(level: LevelFilter) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csvw_validate", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => {
            init_logging(args.log_level.to_filter());
            validate::execute(&args)
        }
    }
}
