use chrono::Local;
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

mod channels;
mod commands;
mod config;
mod db;
mod delivery;
mod logging;
mod scheduler;
mod sweep;
mod worker;

use channels::DiscordDelivery;
use config::Config;
use db::ReminderDb;
use worker::ReminderWorker;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), String> {
    dotenv().ok();

    let config = Config::from_env()?;
    let _logger = logging::init(config.log_file.as_deref())?;

    log::info!(
        "Loaded config: {} allowed user(s), tick every {}s",
        config.allow_list.len(),
        config.tick_secs
    );

    let db = ReminderDb::new(&config.db_path);
    let mut store = db.load();

    sweep::run(&mut store, &db, Local::now().date_naive());

    let (handle, rx) = worker::channel();

    let client = channels::create_discord_client(&config.bot_token, handle.clone()).await?;
    let delivery = Arc::new(DiscordDelivery::new(client.http.clone()));

    let reminder_worker = ReminderWorker::new(store, db, delivery, config.allow_list, config.schedule);
    let worker_task = tokio::spawn(reminder_worker.run(rx));
    let ticker = worker::spawn_ticker(handle, Duration::from_secs(config.tick_secs));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl-C, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    let result = channels::start_discord_listener(client, shutdown_rx).await;

    // Once the ticker and client drop their handles the queue drains and closes
    ticker.abort();
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("[SCHEDULER] Worker task failed: {}", e),
        Err(_) => log::warn!("[SCHEDULER] Worker did not stop within {:?}", WORKER_DRAIN_TIMEOUT),
    }

    log::info!("Reminder bot stopped");
    result
}
