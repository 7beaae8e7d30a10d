//! runspec
//!
//! Command-line front end for resolving and validating ML run specifications.

use anyhow::Result;
use clap::Parser;
use runspec::cli::Cli;
use runspec::error::SpecError;
use runspec::logging::init_tracing;
use tracing::{Level, debug};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(&cli.log, level)?;
    debug!(command = ?cli.command, format = %cli.format, "starting");

    match cli.command.run() {
        Ok(value) => {
            print!("{}", cli.format.render(&value)?);
            Ok(())
        }
        Err(err) => {
            match err.downcast_ref::<SpecError>() {
                Some(spec_err) => {
                    let diagnostic = spec_err.diagnostic();
                    debug!(code = ?diagnostic.code, section = ?diagnostic.section, "Resolution failed");
                    eprint!("{}", cli.format.render_diagnostic(&diagnostic)?);
                }
                None => eprintln!("error: {err:#}"),
            }
            std::process::exit(1);
        }
    }
}
