use std::sync::Arc;

use ledpanel::pattern::TestPixels;
use ledpanel_daemon::artnet::{self, ArtNetClient};
use ledpanel_daemon::buttons::ButtonWatcher;
use ledpanel_daemon::config::{Config, DEFAULT_CONFIG_PATH, parse_config};
use ledpanel_daemon::display::headless::HeadlessDisplay;
use ledpanel_daemon::error::DaemonError;
use ledpanel_daemon::event_loop::EventLoop;
use ledpanel_daemon::led::{LogWriter, SmartLedStrip};
use ledpanel_daemon::network;
use ledpanel_daemon::panel::PanelController;
use ledpanel_daemon::screens::{MenuSettings, ScreenManager};
use log::{error, info};
use tokio::net::UdpSocket;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Frames waiting for the event loop before the receiver has to wait.
const FRAME_QUEUE_DEPTH: usize = 64;

fn run_shutdown_thread(task_tracker: &TaskTracker, shutdown_token: CancellationToken) {
    task_tracker.spawn(async move {
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                return;
            }
        };
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("failed to listen for ctrl-c: {e}");
                }
            }
            _ = terminate.recv() => {}
            _ = shutdown_token.cancelled() => return,
        }
        info!("received shutdown signal, switching panel off");
        shutdown_token.cancel();
    });
}

async fn run(config: Config) -> Result<(), DaemonError> {
    let geometry = config.geometry();
    let address = config.address()?;

    let client = ArtNetClient::new();
    let subscriptions = client.subscriptions();
    let strip = SmartLedStrip::new(
        LogWriter::default(),
        geometry.pixel_count(),
        config.max_brightness,
    );
    let mut panel = PanelController::new(
        geometry,
        address,
        Box::new(client),
        Box::new(strip),
        config.max_brightness,
    )?;
    panel.set_on_off(true)?;
    panel.subscribe()?;

    let socket = UdpSocket::bind(&config.artnet_bind)
        .await
        .map_err(|e| DaemonError::BindError(config.artnet_bind.clone(), e))?;

    let task_tracker = TaskTracker::new();
    let shutdown_token = CancellationToken::new();
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    artnet::run_receiver(
        &task_tracker,
        socket,
        subscriptions,
        frames_tx,
        shutdown_token.clone(),
    );
    let (event_loop, loop_handle) = EventLoop::new(panel, frames_rx);

    let ip = network::local_ip_address().await;
    info!("panel reachable at {}", network::display_ip(ip));
    let settings = MenuSettings {
        home_text: config.home_text.clone(),
        ip_text: network::display_ip(ip),
        backlight_timeout: config.backlight_timeout(),
        test_pattern: Arc::new(TestPixels::new(geometry.columns, geometry.rows)),
        repeat_test_pattern: config.repeat_test_pattern,
    };
    let display = HeadlessDisplay::new(config.backlight_path.clone());
    let manager = ScreenManager::new(settings, geometry, address, Box::new(display), loop_handle)?;

    let button_manager = manager.clone();
    let buttons = ButtonWatcher::start(&config, move |button| {
        button_manager.handle_button(button)
    })?;

    run_shutdown_thread(&task_tracker, shutdown_token.clone());
    let mut panel = event_loop.run(shutdown_token.clone()).await;

    // LEDs go dark before anything else is released
    panel.shutdown();
    buttons.stop();
    manager.cleanup();

    task_tracker.close();
    task_tracker.wait().await;
    info!("shut down");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DaemonError> {
    ledpanel::init_logging(log::LevelFilter::Info);

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = parse_config(&config_path).await?;
    run(config).await
}
