//! Command line argument parsing for the flz2 utility.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use flz2_cli::{parse_byte_size, CliConfig, OperationMode};

/// The operation given as the first positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Compress INPUT into the .lzma2 container
    Compress,
    /// Decompress a .lzma2 stream
    #[value(alias = "uncompress")]
    Decompress,
    /// Validate a .lzma2 stream without writing output
    Test,
}

/// Block-parallel LZMA2-family compression utility
#[derive(Parser, Debug)]
#[command(
    name = "flz2",
    version,
    about = "Compress or decompress .lzma2 files",
    long_about = "flz2 is a block-parallel data compression tool. The native file format is \
                 the .lzma2 block container. With no INPUT, or when INPUT is omitted, data is \
                 read from standard input and written to standard output."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Flz2Opts {
    /// Operation to perform
    #[arg(value_enum, value_name = "MODE")]
    pub mode: ModeArg,

    /// Input file (omit to read from stdin)
    #[arg(value_name = "INPUT")]
    pub input: Option<String>,

    /// Output file (derived from INPUT when omitted)
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write to standard output
    #[arg(short = 'c', long = "stdout", alias = "to-stdout", conflicts_with = "output")]
    pub stdout: bool,

    /// Force overwrite of output file
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Keep (don't delete) input files. This is the default; the flag is
    /// accepted for compatibility with other compression tools.
    #[arg(short = 'k', long = "keep")]
    pub keep: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode (suppress warnings). Use twice to suppress errors too.
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose", action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Compression preset level (1-10, default 6)
    #[arg(short = 'p', long = "preset", value_name = "LEVEL")]
    pub preset: Option<u32>,

    /// Use at most this many worker threads (0 = auto)
    #[arg(short = 'T', long = "threads", value_name = "NUM")]
    pub threads: Option<u32>,

    /// Block size for parallel compression (accepts K/M/G suffixes)
    #[arg(short = 'B', long = "block-size", value_name = "SIZE", value_parser = parse_byte_size)]
    pub block_size: Option<u64>,

    /// Don't append the whole-stream integrity digest when compressing
    #[arg(long = "no-check")]
    pub no_check: bool,
}

impl Flz2Opts {
    /// Parse command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Determine operation mode from the positional argument
    pub fn operation_mode(&self) -> OperationMode {
        match self.mode {
            ModeArg::Compress => OperationMode::Compress,
            ModeArg::Decompress => OperationMode::Decompress,
            ModeArg::Test => OperationMode::Test,
        }
    }

    /// Input files to process; empty means stdin
    pub fn files(&self) -> Vec<String> {
        self.input.iter().filter(|path| path.as_str() != "-").cloned().collect()
    }

    /// Build CLI configuration from the parsed options
    pub fn config(&self) -> CliConfig {
        CliConfig {
            mode: self.operation_mode(),
            force: self.force,
            keep: true,
            stdout: self.stdout,
            output: self.output.clone(),
            verbose: self.verbose,
            quiet: self.quiet,
            preset: self.preset,
            threads: self.threads,
            block_size: self.block_size,
            integrity: !self.no_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test operation mode parsing from the positional argument.
    #[test]
    fn parses_operation_mode() {
        let opts = Flz2Opts::try_parse_from(["flz2", "decompress", "file.lzma2"]).unwrap();
        assert_eq!(opts.operation_mode(), OperationMode::Decompress);
        let config = opts.config();
        assert_eq!(config.mode, OperationMode::Decompress);
        assert!(!config.force);

        let opts = Flz2Opts::try_parse_from(["flz2", "test", "file.lzma2"]).unwrap();
        assert_eq!(opts.operation_mode(), OperationMode::Test);

        let opts = Flz2Opts::try_parse_from(["flz2", "compress", "file.txt"]).unwrap();
        assert_eq!(opts.operation_mode(), OperationMode::Compress);

        assert!(Flz2Opts::try_parse_from(["flz2", "file.txt"]).is_err());
    }

    /// Test that an explicit OUTPUT positional lands in the configuration.
    #[test]
    fn explicit_output_is_captured() {
        let opts =
            Flz2Opts::try_parse_from(["flz2", "compress", "input.txt", "custom.bin"]).unwrap();
        assert_eq!(opts.files(), ["input.txt"]);
        assert_eq!(opts.config().output, Some(PathBuf::from("custom.bin")));
    }

    /// Test that "-" and an omitted INPUT both mean stdin.
    #[test]
    fn stdin_spellings() {
        let opts = Flz2Opts::try_parse_from(["flz2", "compress"]).unwrap();
        assert!(opts.files().is_empty());

        let opts = Flz2Opts::try_parse_from(["flz2", "compress", "-"]).unwrap();
        assert!(opts.files().is_empty());
    }

    /// Test that tuning options land in the configuration.
    #[test]
    fn tuning_options_flow_into_config() {
        let opts = Flz2Opts::try_parse_from([
            "flz2",
            "compress",
            "-p",
            "9",
            "-T",
            "4",
            "--block-size",
            "2M",
            "--no-check",
            "file.txt",
        ])
        .unwrap();

        let config = opts.config();
        assert_eq!(config.preset, Some(9));
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.block_size, Some(2 * 1024 * 1024));
        assert!(!config.integrity);
        assert_eq!(opts.files(), ["file.txt"]);
    }

    /// Test long-option aliases.
    #[test]
    fn parse_accepts_aliases() {
        let opts =
            Flz2Opts::try_parse_from(["flz2", "uncompress", "--to-stdout", "file.lzma2"]).unwrap();
        assert_eq!(opts.operation_mode(), OperationMode::Decompress);
        assert!(opts.stdout);
    }

    /// Test that a malformed block size is rejected at parse time.
    #[test]
    fn rejects_bad_block_size() {
        assert!(Flz2Opts::try_parse_from(["flz2", "compress", "--block-size", "huge", "f"]).is_err());
        assert!(Flz2Opts::try_parse_from(["flz2", "compress", "--block-size", "0", "f"]).is_err());
    }

    /// Test argument conflicts.
    #[test]
    fn conflicting_arguments_are_rejected() {
        assert!(Flz2Opts::try_parse_from(["flz2", "compress", "-v", "-q", "f"]).is_err());
        assert!(Flz2Opts::try_parse_from(["flz2", "compress", "-c", "f", "out"]).is_err());
    }
}
