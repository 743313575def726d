use anyhow::Result;
use clap::Parser;

mod assets;
mod camera;
mod config;
mod engine;
mod input;
mod interaction;
mod math;
mod model;
mod orbit;
mod physics;
mod picking;
mod rendering;
mod scene_graph;
mod stages;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = config::AppConfig::parse();
    log::info!("Starting at {} with assets from {}", config.route, config.assets_root.display());

    pollster::block_on(window::run(config))?;

    Ok(())
}
