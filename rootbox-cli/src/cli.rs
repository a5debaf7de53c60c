//! CLI argument parsing for rootbox.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rootbox")]
#[command(version, about = "Root shell task runner and flashable zip installer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the staged install.zip
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Accept the reboot offer after a successful flash
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install a flashable zip
    Flash {
        /// Path or URI of the zip
        source: String,

        /// Name shown in progress output instead of the file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Control MagiskHide
    Hide {
        #[command(subcommand)]
        action: HideAction,
    },

    /// List block devices and detect the boot partition
    Blocks,

    /// List installed modules
    Modules,

    /// List online repositories from a JSON file against installed modules
    Repos {
        file: PathBuf,
    },

    /// Report busybox, systemless hosts and disable-marker state
    Features,

    /// List installed apps eligible for hiding
    Apps,

    /// Read release info from a JSON update document
    Update {
        file: PathBuf,
    },

    /// Reboot the device
    Reboot,
}

#[derive(Debug, Subcommand)]
pub enum HideAction {
    Add { package: String },
    Rm { package: String },
    Enable,
    Disable,
    List,
}
