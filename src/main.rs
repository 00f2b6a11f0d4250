use std::time::Instant;

use conn_tracker::Config;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut config = Config::from_env()?;
    if let Some(path) = std::env::args_os().nth(1) {
        config.capture_path = path.into();
    }

    let start = Instant::now();
    let report = conn_tracker::analyze_file(&config.capture_path, &config)?;
    log::info!("Took {:?}", start.elapsed());

    print!("{report}");
    Ok(())
}
