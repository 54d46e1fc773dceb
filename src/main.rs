use anyhow::Result;
use glim::run_demo;

fn main() -> Result<()> {
    env_logger::init();
    smol::block_on(run_demo())
}
