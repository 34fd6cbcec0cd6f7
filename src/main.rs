use grainflow::{EdgePolicy, SimConfig, Simulation};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimConfig::default().with_edge_policy(EdgePolicy::Contain);
    if let Err(e) = Simulation::new().with_config(config).run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
