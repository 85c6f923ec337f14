use mapserv::render::BedrockViz;
use mapserv::{Config, Error, Frontend, Network};
use std::process::ExitCode;
use std::sync::Arc;

fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    config.prepare()?;
    log::info!(
        "worlds from {}, maps in {}",
        config.worlds_root.display(),
        config.maps_root.display()
    );
    if config.management_key.is_none() {
        log::info!("no MANAGEMENT_KEY set, only this host can manage maps");
    }

    let addr = config.listen_addr();
    let mut network =
        Network::bind(addr).map_err(|source| Error::Bind { port: addr.port(), source })?;
    let renderer = Arc::new(BedrockViz::new(&config.renderer));
    let mut frontend = Frontend::start(config, renderer)?;
    frontend.set_waker(network.waker());

    log::info!("Server running at http://localhost:{}/", addr.port());
    match local_ip_address::local_ip() {
        Ok(ip) => log::info!("Remote viewers can use http://{ip}:{}/", addr.port()),
        Err(e) => log::warn!("unable to find a LAN address: {e}"),
    }
    loop {
        network.process_requests_until(None, &mut frontend)?;
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
