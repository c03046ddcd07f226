use std::env;
use std::sync::Arc;
use std::time::Duration;

use salus_it500::{
    Config, JsonFileStore, StatisticsPoller, ThermostatBuilder, local_clock,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> salus_it500::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).expect("usage: monitor <config.yaml>");
    let config = Config::load(path)?;

    let thermostat = ThermostatBuilder::from_config(&config)
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|snap| {
            let fmt = |t: Option<salus_it500::Temperature>| {
                t.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
            };
            println!(
                "room {} | target {} | mode {} | action {:?}",
                fmt(snap.current_temperature),
                fmt(snap.target_temperature),
                snap.mode.as_str(),
                snap.hvac_action(),
            );
        })
        .build()?;

    let state_dir = config
        .state_dir
        .clone()
        .unwrap_or_else(|| "salus-state".into());
    let store = Arc::new(JsonFileStore::new(state_dir)?);

    let mut stats = StatisticsPoller::new(store.clone(), config.statistics_interval());
    let handles: Vec<_> = thermostat
        .standard_statistics(store.as_ref(), local_clock()())
        .into_iter()
        .map(|acc| stats.add(acc))
        .collect();

    println!("Monitoring {} ({})...", thermostat.name(), thermostat.device_id());
    let poll_task = thermostat.poller().spawn();
    let stats_task = stats.spawn();

    let mut report = tokio::time::interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                for handle in &handles {
                    let acc = handle.lock().await;
                    println!("{}: {:.2} h", acc.name(), acc.value());
                }
            }
        }
    }

    poll_task.abort();
    stats_task.abort();
    Ok(())
}
