mod album_index;
mod cli;
mod config;
mod console;
mod cover_embed;
mod cover_files;
mod cover_search;
mod image_pipeline;
mod media_file_discovery;
mod metadata_tags;
mod protocol;
mod scan_manager;

use std::thread;

use clap::Parser;
use cli::Cli;
use config::{Config, NetworkConfig, ScanConfig, SearchConfig};
use console::ConsoleFrontend;
use log::info;
use protocol::{Message, ScanMessage};
use scan_manager::ScanManager;
use tokio::sync::broadcast;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn sanitize_config(config: Config) -> Config {
    let clamped_max_candidates = config.search.max_candidates.clamp(1, 10);
    let clamped_connect_timeout = config.network.connect_timeout_secs.clamp(1, 60);
    let clamped_read_timeout = config.network.read_timeout_secs.clamp(1, 300);
    let clamped_write_timeout = config.network.write_timeout_secs.clamp(1, 300);
    let clamped_download_cap = config.network.download_max_size_mb.clamp(1, 200);

    Config {
        scan: ScanConfig {
            music_folder: config.scan.music_folder,
        },
        search: SearchConfig {
            endpoint: config.search.endpoint,
            max_candidates: clamped_max_candidates,
        },
        network: NetworkConfig {
            connect_timeout_secs: clamped_connect_timeout,
            read_timeout_secs: clamped_read_timeout,
            write_timeout_secs: clamped_write_timeout,
            download_max_size_mb: clamped_download_cap,
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let mut clog = colog::default_builder();
    clog.filter(None, log_level);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_dir = dirs::config_dir().ok_or("Could not determine the user config directory")?;
    let config_file = config_dir.join("coverscout.toml");

    if !config_file.exists() {
        let default_config = Config::default();

        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(config_file.clone(), toml::to_string(&default_config)?)?;
    }

    let config_content = std::fs::read_to_string(config_file.clone())?;
    let config = sanitize_config(toml::from_str::<Config>(&config_content).unwrap_or_default());

    let initial_message = match cli.command.initial_message(&config.scan.music_folder) {
        Ok(message) => message,
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(2);
        }
    };

    // Bus carrying messages between the worker and the console
    let (bus_sender, _) = broadcast::channel(1024);

    // Setup scan manager
    let worker_bus_receiver = bus_sender.subscribe();
    let worker_bus_sender = bus_sender.clone();
    let worker_config = config.clone();
    thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scan_manager = ScanManager::new(
                worker_bus_receiver,
                worker_bus_sender.clone(),
                &worker_config,
            );
            scan_manager.run();
        }));
        if let Err(payload) = run_result {
            let reason = panic_payload_to_string(payload.as_ref());
            log::error!("ScanManager thread terminated due to panic: {}", reason);
            let _ = worker_bus_sender.send(Message::Scan(ScanMessage::ScanFailed(format!(
                "Worker crashed: {reason}"
            ))));
        }
    });

    // The console must be subscribed before the initial message goes out
    let console_bus_receiver = bus_sender.subscribe();

    let bus_sender_clone = bus_sender.clone();
    let _ = bus_sender_clone.send(initial_message);

    let mut console = ConsoleFrontend::new(console_bus_receiver, bus_sender.clone());
    let exit_code = console.run();

    info!("Application exiting");
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
