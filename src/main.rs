mod classifier;
mod cli;
mod config;
mod filter;
mod ipc;
mod landmarks;
mod logging;
mod pipeline;
mod rotation;
mod source;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
