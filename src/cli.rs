//! CLI argument definitions for `crate-vendor`.
//!
//! Kept apart from the binary entrypoint so parsing can be tested without
//! spawning a process.

use crate::logging::level_filter;
use crate::vendor::VendorOptions;
use camino::Utf8PathBuf;
use clap::Parser;
use log::LevelFilter;

/// Expand Rust `.crate` archives into a vendor directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "crate-vendor")]
#[command(version, about)]
#[command(long_about = concat!(
    "Expand Rust .crate archives into a vendor directory.\n\n",
    "Each archive is unpacked into VENDOR_DIR/<name>-<version>/ and a ",
    ".cargo-checksum.json manifest is written alongside it, so cargo can build ",
    "from the directory with source replacement.\n\n",
    "Crates that are already vendored are skipped unless --force is given.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Vendor a single crate:\n",
    "    $ crate-vendor downloads/foo-1.0.0.crate vendor\n\n",
    "  Vendor every crate in a directory, replacing existing copies:\n",
    "    $ crate-vendor --force downloads vendor\n\n",
    "  Keep going past broken archives:\n",
    "    $ crate-vendor --continue-on-error downloads vendor",
))]
pub struct Cli {
    /// A single .crate file or a directory containing .crate files.
    #[arg(value_name = "SOURCE")]
    pub source: Utf8PathBuf,

    /// Existing directory that receives the expanded crates.
    #[arg(value_name = "VENDOR_DIR")]
    pub vendor_dir: Utf8PathBuf,

    /// Delete and re-expand crates that are already vendored.
    #[arg(long)]
    pub force: bool,

    /// Report failed crates and carry on with the rest of the directory.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Log every extracted file and the written manifests.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Runtime options selected by the flags.
    #[must_use]
    pub const fn vendor_options(&self) -> VendorOptions {
        VendorOptions {
            force: self.force,
            continue_on_error: self.continue_on_error,
        }
    }

    /// Log level selected by `--verbose` and `--quiet`.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        level_filter(self.verbose, self.quiet)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
