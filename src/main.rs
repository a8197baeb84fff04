use pbr_viewer::{ViewerConfig, flow};

fn main() -> anyhow::Result<()> {
    flow::init_logging();
    let config = ViewerConfig::from_env();
    flow::run(config)?;
    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
