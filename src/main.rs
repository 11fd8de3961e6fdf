use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use droppy::actor;
use droppy::actor::drag_monitor::DragSessionMonitor;
use droppy::actor::hit_test::InterceptDecision;
use droppy::actor::ingest::{IngestNormalizer, RejectingPromiseResolver};
use droppy::actor::notification_center::{NotificationCenter, SystemNotification};
use droppy::actor::reactor::Reactor;
use droppy::common::config::Config;
use droppy::common::log::{DEFAULT_DIRECTIVE, init_logging};
use droppy::model::geometry::{self, NotchGeometry};
use droppy::sys::geometry::{Point, Rect};
use droppy::sys::mail::OsascriptMailExporter;
use droppy::sys::screen::{DisplayId, DisplayInfo, ScreenProvider, StaticScreens};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Displays are queried this often while watching; unchanged topologies are
/// dropped by the notification center.
const DISPLAY_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    name = "droppy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Diagnostics for the notch shelf interaction engine"
)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log more. Repeat for trace output.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use a built-in MacBook plus external display layout.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the derived notch geometry of every display as JSON.
    Displays {
        /// Shelf rows used for the expanded zone.
        #[arg(long, default_value_t = 1)]
        rows: usize,
    },
    /// Print the resolved configuration.
    Config,
    /// Report how a click at a screen point is routed while idle.
    HitTest {
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
    },
    /// Run the engine and print every notch event as a JSON line.
    Watch,
}

#[derive(Serialize)]
struct DisplayReport {
    #[serde(flatten)]
    display: DisplayInfo,
    is_notch_display: bool,
    geometry: Option<NotchGeometry>,
}

#[derive(Serialize)]
struct HitTestReport {
    point: Point,
    display: Option<DisplayId>,
    decision: InterceptDecision,
    tracking_rect: Option<Rect>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(match cli.verbose {
        0 => DEFAULT_DIRECTIVE,
        1 => "droppy=debug",
        _ => "droppy=trace",
    });
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Displays { rows } => {
            let displays = screens(cli.simulate)?.displays()?;
            let notch = geometry::resolve_notch_display(&displays);
            let report: Vec<_> = displays
                .into_iter()
                .map(|display| {
                    let geometry = match geometry::derive(&display, &config.settings, rows) {
                        Ok(geometry) => Some(geometry),
                        Err(err) => {
                            warn!("{err}");
                            None
                        }
                    };
                    DisplayReport {
                        is_notch_display: notch == Some(display.id),
                        display,
                        geometry,
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config => print!("{}", toml::to_string_pretty(&config)?),
        Command::HitTest { x, y } => {
            let report = hit_test(config, screens(cli.simulate)?.displays()?, Point::new(x, y));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Watch => watch(config, cli.simulate)?,
    }
    Ok(())
}

fn screens(simulate: bool) -> anyhow::Result<Box<dyn ScreenProvider>> {
    if simulate {
        return Ok(Box::new(StaticScreens::sample_notch_and_external()));
    }
    native_screens()
}

#[cfg(target_os = "macos")]
fn native_screens() -> anyhow::Result<Box<dyn ScreenProvider>> {
    let provider = droppy::sys::screen::NsScreenProvider::new()
        .context("reading displays needs the main thread")?;
    Ok(Box::new(provider))
}

#[cfg(not(target_os = "macos"))]
fn native_screens() -> anyhow::Result<Box<dyn ScreenProvider>> {
    debug!("No display provider on this platform; using the sample layout");
    Ok(Box::new(StaticScreens::sample_notch_and_external()))
}

fn normalizer(config: &Config) -> Arc<IngestNormalizer> {
    Arc::new(IngestNormalizer::new(
        &config.settings.ingest,
        Arc::new(RejectingPromiseResolver),
        Arc::new(OsascriptMailExporter::default()),
    ))
}

fn hit_test(config: Config, displays: Vec<DisplayInfo>, point: Point) -> HitTestReport {
    let display = geometry::display_at(&displays, point).map(|d| d.id);
    let (notch_tx, _notch_rx) = actor::channel();
    let normalizer = normalizer(&config);
    let mut reactor = Reactor::new(
        config,
        Arc::new(DragSessionMonitor::new()),
        normalizer,
        notch_tx,
        CancellationToken::new(),
    );
    reactor.set_displays(displays);
    let Some(display) = display else {
        info!(?point, "Point is on no display");
        return HitTestReport {
            point,
            display: None,
            decision: InterceptDecision::PassThrough,
            tracking_rect: None,
        };
    };
    HitTestReport {
        point,
        display: Some(display),
        decision: reactor.hit_test(display, point),
        tracking_rect: reactor.tracking_rect(display),
    }
}

/// Runs everything on the main thread, where the display provider lives.
fn watch(config: Config, simulate: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the runtime")?;
    runtime.block_on(async move {
        let shutdown = CancellationToken::new();
        let monitor = Arc::new(DragSessionMonitor::new());
        let poll_interval = config.settings.drag_monitor.poll_interval();
        let normalizer = normalizer(&config);
        let (notch_tx, mut notch_rx) = actor::channel();
        let (reactor, reactor_task) =
            Reactor::spawn(config, Arc::clone(&monitor), normalizer, notch_tx, shutdown.clone());
        spawn_drag_poller(&monitor, poll_interval, shutdown.clone());

        let mut center = NotificationCenter::new(screens(simulate)?, monitor, reactor.sender());
        center.send_initial()?;
        let (notify_tx, notify_rx) = actor::channel();

        let printer = tokio::spawn(async move {
            while let Some((_, event)) = notch_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!("Could not encode {event:?}: {err}"),
                }
            }
        });
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(DISPLAY_POLL_INTERVAL);
            loop {
                interval.tick().await;
                notify_tx.send(SystemNotification::DisplaysReconfigured);
            }
        });
        let stop = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Interrupted"),
                Err(err) => warn!("Cannot listen for Ctrl-C: {err}"),
            }
            stop.cancel();
        });

        info!("Watching; press Ctrl-C to stop");
        center.run(notify_rx, shutdown.clone()).await;
        ticker.abort();
        reactor_task.await.context("reactor task")?;
        printer.abort();
        Ok::<_, anyhow::Error>(())
    })
}

#[cfg(target_os = "macos")]
fn spawn_drag_poller(
    monitor: &Arc<DragSessionMonitor>,
    interval: Duration,
    cancel: CancellationToken,
) {
    use droppy::sys::pasteboard::SystemDragProbe;
    monitor.spawn_poller(Arc::new(SystemDragProbe), interval, cancel);
}

#[cfg(not(target_os = "macos"))]
fn spawn_drag_poller(_: &Arc<DragSessionMonitor>, _: Duration, _: CancellationToken) {
    debug!("No drag probe on this platform");
}
