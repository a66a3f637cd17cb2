//! The main entrypoint for polaris-install, which mostly just delegates to
//! its library.

use anyhow::Result;

fn run() -> Result<()> {
    polaris_utils::initialize_tracing();
    tracing::trace!("starting {}", polaris_utils::NAME);
    polaris_installer::cli::run_from_iter(std::env::args_os())
}

fn main() {
    polaris_utils::run_main(run)
}
