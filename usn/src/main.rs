#![allow(clippy::multiple_crate_versions)]
#![doc = include_str!("../../README.md")]

use std::{io::Write as _, path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use bootcfg::NetbootConfig;
use clap::Parser;
use fetch::Fetcher;
use iso::{Extractor, ServerLiveIso};
use log::{error, info};

mod pipeline;
mod settings;
mod source;
mod tree;

use settings::Settings;
use source::ImageSource;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Ubuntu Server Live ISO to PXE/TFTP Netboot Tree Utility"
)]
struct Cli {
    #[arg(
        short,
        long,
        help = "URL of the Ubuntu Server Live ISO. The installer downloads the image from it."
    )]
    url: Option<String>,

    #[arg(
        short,
        long,
        help = "Local copy of the ISO, used instead of downloading it from --url"
    )]
    iso: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "URL of the autoinstall data, ending with a slash. user-data and meta-data must be served under it."
    )]
    autoinstall_url: Option<String>,

    #[arg(
        short,
        long,
        allow_hyphen_values = true,
        help = "Extra kernel arguments, appended at the end of the kernel command line"
    )]
    extra_args: Option<String>,

    #[arg(
        short,
        long,
        help = "Directory to generate the tree into. A temporary directory is used otherwise."
    )]
    out_dir: Option<PathBuf>,

    #[arg(long, value_enum, help = "Backend used to read the ISO content")]
    extractor: Option<Extractor>,

    #[arg(long, help = "Keep the downloaded ISO in the user cache directory")]
    cache: bool,

    #[arg(short, long, help = "Settings file")]
    config: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

fn run(cli: &Cli) -> Result<PathBuf, anyhow::Error> {
    let source = ImageSource::from_args(cli.url.as_deref(), cli.iso.as_deref())?;

    let netboot = NetbootConfig::new(
        cli.url.as_deref(),
        cli.autoinstall_url.as_deref(),
        cli.extra_args.as_deref(),
    )?;

    let settings = Settings::load(cli.config.as_deref()).context("Couldn't load the settings")?;
    let extractor = cli.extractor.unwrap_or(settings.extractor);

    let fetcher = Fetcher::new()?;
    let image = source.acquire(&fetcher, cli.cache)?;

    let iso = ServerLiveIso::open(image.path(), extractor)
        .with_context(|| format!("Couldn't read {}", image.path().display()))?;

    info!("Using {} image {}", iso.architecture(), iso.release());

    Ok(pipeline::generate(
        &iso,
        &netboot,
        &settings,
        &fetcher,
        cli.out_dir.as_deref(),
    )?)
}

fn main() -> ExitCode {
    init_logger();

    let cli = Cli::parse();

    info!(
        "Running {} {}",
        env!("CARGO_CRATE_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match run(&cli) {
        Ok(path) => {
            info!("Netboot generation complete: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
