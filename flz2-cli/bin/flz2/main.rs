//! Block-parallel LZMA2-family compression utility.
//!
//! Compresses files into the `.lzma2` block container and back, with
//! command line syntax similar to xz and gzip.

use std::process;

mod opts;

use opts::Flz2Opts;

use flz2_cli::{format_error_for_stderr, run_cli};

const PROGRAM_NAME: &str = "flz2";

fn main() {
    let opts = Flz2Opts::parse();
    let config = opts.config();

    match run_cli(&opts.files(), &config, PROGRAM_NAME) {
        // Warnings were reported for skipped files; signal them in the
        // exit status like upstream xz does.
        Ok(true) => process::exit(2),
        Ok(false) => {}
        Err(err) => {
            if let Some(msg) = format_error_for_stderr(PROGRAM_NAME, config.quiet, &err) {
                eprintln!("{msg}");
            }
            process::exit(1);
        }
    }
}
