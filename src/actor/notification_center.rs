//! This actor turns window-system notifications into reactor events.
//!
//! Display reconfiguration arrives in bursts while the window server settles,
//! so refreshes are coalesced, retried while the display query fails, and
//! dropped when the topology did not actually change. Lock and unlock reset
//! the drag monitor, since the system drag state is unreliable around them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::actor;
use crate::actor::drag_monitor::DragSessionMonitor;
use crate::actor::reactor::{self, Event};
use crate::sys::screen::{DisplayId, DisplayInfo, ScreenError, ScreenProvider};

const REFRESH_DEFAULT_DELAY: Duration = Duration::from_millis(150);
const REFRESH_RETRY_DELAY: Duration = Duration::from_millis(150);
const REFRESH_MAX_RETRIES: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemNotification {
    /// Displays were added, removed, moved or changed resolution.
    DisplaysReconfigured,
    ScreenLocked,
    ScreenUnlocked,
    /// The system woke from sleep. Display modes can change without a
    /// reconfiguration notification.
    Woke,
}

pub type Sender = actor::Sender<SystemNotification>;
type Receiver = actor::Receiver<SystemNotification>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct DisplayTopologyFingerprint(Vec<(DisplayId, u64, u64, u64, u64, u64)>);

impl DisplayTopologyFingerprint {
    fn of(displays: &[DisplayInfo]) -> Self {
        Self(
            displays
                .iter()
                .map(|d| {
                    (
                        d.id,
                        d.frame.origin.x.to_bits(),
                        d.frame.origin.y.to_bits(),
                        d.frame.size.width.to_bits(),
                        d.frame.size.height.to_bits(),
                        d.safe_area_top.to_bits(),
                    )
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRefresh {
    deadline: Instant,
    attempt: u8,
}

pub struct NotificationCenter {
    screens: Box<dyn ScreenProvider>,
    monitor: Arc<DragSessionMonitor>,
    reactor_tx: reactor::Sender,
    last_sent: Option<DisplayTopologyFingerprint>,
    pending: Option<PendingRefresh>,
}

impl NotificationCenter {
    pub fn new(
        screens: Box<dyn ScreenProvider>,
        monitor: Arc<DragSessionMonitor>,
        reactor_tx: reactor::Sender,
    ) -> Self {
        Self {
            screens,
            monitor,
            reactor_tx,
            last_sent: None,
            pending: None,
        }
    }

    /// Sends the current display configuration unconditionally.
    pub fn send_initial(&mut self) -> Result<(), ScreenError> {
        let displays = self.screens.displays()?;
        self.last_sent = None;
        self.send_displays(displays);
        Ok(())
    }

    /// Runs until `cancel` fires or every sender is gone.
    ///
    /// The display provider may be bound to the main thread, so this future
    /// is not `Send`; await it on the thread that owns the provider.
    pub async fn run(mut self, mut notifications: Receiver, cancel: CancellationToken) {
        loop {
            let deadline = self.pending.map(|p| p.deadline);
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = notifications.recv() => {
                    let Some((span, notification)) = next else { break };
                    let _guard = span.enter();
                    self.handle_notification(notification);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.process_refresh();
                }
            }
        }
        debug!("Notification center stopped");
    }

    fn handle_notification(&mut self, notification: SystemNotification) {
        trace!(?notification, "System notification");
        match notification {
            SystemNotification::DisplaysReconfigured | SystemNotification::Woke => {
                self.schedule_refresh()
            }
            SystemNotification::ScreenLocked => {
                info!("Screen locked; resetting drag state");
                self.monitor.force_reset();
                self.reactor_tx.send(Event::ScreenLocked);
            }
            SystemNotification::ScreenUnlocked => {
                info!("Screen unlocked; resetting drag state");
                self.monitor.force_reset();
                self.reactor_tx.send(Event::ScreenUnlocked);
                self.schedule_refresh();
            }
        }
    }

    /// Notifications in the same burst share one refresh.
    fn schedule_refresh(&mut self) {
        if self.pending.is_some() {
            trace!("Refresh already pending");
            return;
        }
        self.pending = Some(PendingRefresh {
            deadline: Instant::now() + REFRESH_DEFAULT_DELAY,
            attempt: 0,
        });
    }

    fn process_refresh(&mut self) {
        let Some(PendingRefresh { attempt, .. }) = self.pending.take() else {
            return;
        };
        match self.screens.displays() {
            Ok(displays) => self.send_displays(displays),
            Err(err) if attempt < REFRESH_MAX_RETRIES => {
                debug!(attempt, "Display query failed, retrying: {err}");
                self.pending = Some(PendingRefresh {
                    deadline: Instant::now() + REFRESH_RETRY_DELAY,
                    attempt: attempt + 1,
                });
            }
            Err(err) => warn!("Giving up on display refresh: {err}"),
        }
    }

    fn send_displays(&mut self, displays: Vec<DisplayInfo>) {
        let fingerprint = DisplayTopologyFingerprint::of(&displays);
        if self.last_sent.as_ref() == Some(&fingerprint) {
            trace!("Display topology unchanged");
            return;
        }
        debug!(count = displays.len(), "Sending display configuration");
        self.last_sent = Some(fingerprint);
        self.reactor_tx.send(Event::ScreenParametersChanged(displays));
    }
}
