use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("listharvest starting up...");
    run().await
}

#[cfg(not(target_os = "macos"))]
async fn run() -> Result<()> {
    anyhow::bail!("the automation backend for this platform is still in development; only macOS is supported");
}

#[cfg(target_os = "macos")]
async fn run() -> Result<()> {
    use std::fs;
    use std::time::Duration;

    use anyhow::{bail, Context};
    use tokio_util::sync::CancellationToken;

    use listharvest::harvest::{calibrate, HarvestController, HarvestStatus, TerminationWindow};
    use listharvest::ocr::TextRecognizer;
    use listharvest::port::LivePanelPort;
    use listharvest::session::{spawn_cancel_watcher, KeepAwake};
    use listharvest::settings::{load_region, SettingsStore};
    use listharvest::{capture, input, macos_bridge};

    const DIALOG_TITLE: &str = "List Harvest";

    let config_dir = dirs::config_dir()
        .context("no user configuration directory")?
        .join("listharvest");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("failed to create {}", config_dir.display()))?;

    let store = SettingsStore::new(config_dir.join("settings.json"))?;
    let settings = store.current();
    if settings.search_term.is_empty() {
        bail!(
            "no search term configured; set `search_term` in {}",
            config_dir.join("settings.json").display()
        );
    }

    let region_path = config_dir.join("region.txt");
    let Some(region) = load_region(&region_path)? else {
        bail!(
            "no saved capture region; write a line of the form x,y,width,height to {}",
            region_path.display()
        );
    };

    macos_bridge::show_dialog(
        DIALOG_TITLE,
        "Save any open work now. The target app will be restarted and driven automatically.",
    )?;
    macos_bridge::restart_target(&settings.target_app, Duration::from_secs(2))?;

    // Park the window on the largest display, full screen, so the saved
    // region keeps meaning the same pixels across runs.
    let display = capture::largest_monitor()?;
    macos_bridge::move_window_to(&settings.target_app, display.x + 50, display.y + 50)?;
    std::thread::sleep(Duration::from_secs(1));
    macos_bridge::maximize_window(&settings.target_app)?;
    macos_bridge::type_into_search_field(&settings.target_app, &settings.search_term)?;

    // Calibration hand-shake: the user scrolls one reference page, the
    // listener measures it, and the panel is rewound to its start.
    macos_bridge::show_dialog(
        DIALOG_TITLE,
        "After closing this dialog, scroll the results panel until everything \
         currently visible has left the view, then stop moving.",
    )?;
    let manual_delta =
        input::measure_manual_scroll(Duration::from_secs(20), Duration::from_secs(2))?;
    log::info!("measured manual scroll of {manual_delta} ticks");
    let calibration = calibrate(manual_delta, settings.margin_ticks)?;
    input::scroll_by(
        -calibration.direction * calibration.return_steps,
        Duration::from_millis(800),
    );

    let window = TerminationWindow::from_calibration(&calibration);
    log::info!(
        "calibrated: unit {} ticks, step {}, termination window {} interactions",
        calibration.calibrated_unit,
        calibration.safe_step,
        window.num_int_check
    );

    let recognizer = TextRecognizer::new(&settings.detection_model, &settings.recognition_model)?;
    let session_token = CancellationToken::new();
    let _keep_awake = KeepAwake::start();
    spawn_cancel_watcher(session_token.clone());
    println!("Harvesting; press Enter to cancel.");

    let port = LivePanelPort::new(
        recognizer,
        settings.harvest_config().recognition_timeout,
        session_token.clone(),
    );

    let mut controller = HarvestController::new();
    controller.start(
        port,
        region,
        calibration,
        settings.harvest_config(),
        session_token,
    )?;
    let outcome = controller.wait().await?;

    match &outcome.status {
        HarvestStatus::Completed => log::info!("harvest completed"),
        HarvestStatus::Cancelled => log::warn!("harvest cancelled; printing partial results"),
        HarvestStatus::Failed(err) => {
            log::error!("harvest failed ({err}); printing partial results")
        }
    }

    let mut count = 0usize;
    for item in outcome.kept_items() {
        println!("{}", item.text);
        println!();
        count += 1;
    }
    log::info!(
        "{count} entries harvested across {} extracted items",
        outcome.history.len()
    );

    macos_bridge::show_dialog(DIALOG_TITLE, &format!("Done! {count} entries harvested."))?;
    Ok(())
}
