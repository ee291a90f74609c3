use anyhow::Result;
use clap::Parser;
use dsp_sandbox::{app::App, args::Args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    App::new(&Args::parse())?.run()
}
