//! ruffpack - application image packer for Ruff devices.
//!
//! Packs an application directory into a RAPP (or legacy RUFF) image:
//! - scripts compiled with the host compiler when available
//! - native modules linked at their final flash address
//! - assets stored in a hashed read-only filesystem

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ruffpack::commands;
use ruffpack::commands::erase::EraseTarget;
use ruffpack::commands::pack::PackOptions;
use ruffpack::commands::upgrade::FirmwareFiles;
use ruffpack::config::{parse_number, Config};
use ruffpack::image::Format;

#[derive(Parser)]
#[command(name = "ruffpack")]
#[command(about = "Ruff application image packer")]
#[command(
    after_help = "QUICK START:\n  ruffpack preflight     Check host tools\n  ruffpack pack .        Create <name>.bin\n  ruffpack deploy .      Pack and flash at the app origin\n  ruffpack show config   Show effective configuration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ImageArgs {
    /// Application directory
    #[arg(default_value = ".")]
    app_dir: PathBuf,

    /// JSON manifest to pack instead of listing the directory
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Image format: rapp or ruff (legacy)
    #[arg(long)]
    format: Option<Format>,

    /// Load address of the image (default: 0x300000)
    #[arg(long, value_parser = parse_address)]
    address: Option<u32>,

    /// Page size of the image trailer, floored to a multiple of 8
    #[arg(long)]
    align: Option<usize>,

    /// Ship scripts as source without compiling them
    #[arg(long)]
    source: bool,
}

impl ImageArgs {
    fn into_options(self) -> PackOptions {
        PackOptions {
            app_dir: self.app_dir,
            manifest: self.manifest,
            format: self.format,
            origin: self.address,
            alignment: self.align,
            source: self.source,
            exclude: Vec::new(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an application image file
    Pack {
        #[command(flatten)]
        image: ImageArgs,

        /// Output path (default: package.json name, ".bin" appended)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pack an application and flash it to the device
    Deploy {
        #[command(flatten)]
        image: ImageArgs,

        /// Serial port of the device
        #[arg(long)]
        port: Option<String>,
    },

    /// Erase device flash (default: whole chip)
    Erase {
        /// Erase only the firmware region
        #[arg(long, conflicts_with = "application")]
        firmware: bool,

        /// Erase only the application region
        #[arg(long)]
        application: bool,

        #[arg(long)]
        port: Option<String>,
    },

    /// Flash new device firmware
    Upgrade {
        #[arg(long)]
        bootloader: PathBuf,

        /// Partition table binary
        #[arg(long)]
        partition: PathBuf,

        /// Firmware application binary
        #[arg(long)]
        app: PathBuf,

        #[arg(long)]
        port: Option<String>,
    },

    /// Run preflight checks for an application
    Preflight {
        #[arg(default_value = ".")]
        app_dir: PathBuf,

        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config {
        #[arg(default_value = ".")]
        app_dir: PathBuf,
    },
}

fn parse_address(value: &str) -> Result<u32, String> {
    parse_number(value).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack { image, output } => {
            let config = Config::load(&image.app_dir)?;
            let options = image.into_options();
            commands::cmd_pack(&config, &options, output.as_deref())?;
        }

        Commands::Deploy { image, port } => {
            let config = Config::load(&image.app_dir)?;
            commands::cmd_deploy(&config, &image.into_options(), port)?;
        }

        Commands::Erase {
            firmware,
            application,
            port,
        } => {
            let config = Config::load(&PathBuf::from("."))?;
            let target = match (firmware, application) {
                (true, _) => EraseTarget::Firmware,
                (_, true) => EraseTarget::Application,
                _ => EraseTarget::All,
            };
            commands::cmd_erase(&config, target, port)?;
        }

        Commands::Upgrade {
            bootloader,
            partition,
            app,
            port,
        } => {
            let config = Config::load(&PathBuf::from("."))?;
            let files = FirmwareFiles {
                bootloader,
                partition,
                app,
            };
            commands::cmd_upgrade(&config, files, port)?;
        }

        Commands::Preflight { app_dir, strict } => {
            let config = Config::load(&app_dir)?;
            commands::cmd_preflight(&config, &app_dir, strict)?;
        }

        Commands::Show { what } => match what {
            ShowTarget::Config { app_dir } => {
                let config = Config::load(&app_dir)?;
                commands::cmd_show(commands::show::ShowTarget::Config, &config)?;
            }
        },
    }

    Ok(())
}
