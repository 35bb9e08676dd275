//! # Background Sync Listener
//!
//! Long-running task that watches connectivity, feeds the
//! [`ConnectivityMonitor`] and, when it says so, asks the user (through an
//! mpsc channel of [`SyncPromptRequest`]s) whether to replay the queue.
//!
//! Prompts and sync passes run in their own tasks so a disconnect is seen
//! while the user is still deciding. A sync pass that has started is always
//! allowed to finish, even on unsubscribe.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo(synchronizer: std::sync::Arc<tasksync::client::sync::Synchronizer>) {
//! use tasksync::client::sync::start_listener;
//! use tokio::sync::{mpsc, watch};
//!
//! let (online_tx, online_rx) = watch::channel(false);
//! let (prompt_tx, mut prompt_rx) = mpsc::channel(4);
//! let listener = start_listener(synchronizer, online_rx, Some(prompt_tx));
//!
//! tokio::spawn(async move {
//!     while let Some(prompt) = prompt_rx.recv().await {
//!         prompt.accept();
//!     }
//! });
//!
//! online_tx.send_replace(true);
//! listener.unsubscribe().await;
//! # }
//! ```

use crate::client::error::SyncError;
use crate::client::sync::network_monitor::{ConnectivityMonitor, MonitorAction};
use crate::client::sync::sync_state::SyncState;
use crate::client::sync::synchronizer::Synchronizer;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

/// A question for the user: sync `pending` queued changes now?
///
/// Dropping the request without answering counts as a decline.
#[derive(Debug)]
pub struct SyncPromptRequest {
    pub pending: usize,
    respond: oneshot::Sender<bool>,
}

impl SyncPromptRequest {
    pub fn respond(self, accepted: bool) {
        // The listener may have gone offline or stopped in the meantime
        let _ = self.respond.send(accepted);
    }

    pub fn accept(self) {
        self.respond(true);
    }

    pub fn decline(self) {
        self.respond(false);
    }
}

/// Handle to a running listener
#[derive(Debug)]
pub struct ListenerHandle {
    status: watch::Receiver<SyncState>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Subscribe to state changes
    pub fn status(&self) -> watch::Receiver<SyncState> {
        self.status.clone()
    }

    /// Current state
    pub fn current(&self) -> SyncState {
        self.status.borrow().clone()
    }

    /// Stop listening and wait until any running pass has finished.
    ///
    /// Dropping the handle also stops the listener, without waiting.
    pub async fn unsubscribe(self) {
        let ListenerHandle { shutdown, task, .. } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            tracing::warn!("Connectivity listener ended abnormally: {}", e);
        }
    }
}

struct ListenerContext {
    synchronizer: Arc<Synchronizer>,
    monitor: Mutex<ConnectivityMonitor>,
    status: watch::Sender<SyncState>,
    prompts: Option<mpsc::Sender<SyncPromptRequest>>,
    closing: watch::Sender<bool>,
}

impl ListenerContext {
    fn monitor(&self) -> MutexGuard<'_, ConnectivityMonitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_connectivity(&self) {
        let state = self.monitor().state();
        self.status.send_if_modified(|status| {
            if status.connectivity == state {
                return false;
            }
            status.connectivity = state;
            true
        });
    }
}

/// Start watching `connectivity`.
///
/// With `prompts` set to `None` the user is never asked and a sync starts on
/// every Offline -> Online edge that finds queued work.
pub fn start_listener(
    synchronizer: Arc<Synchronizer>,
    connectivity: watch::Receiver<bool>,
    prompts: Option<mpsc::Sender<SyncPromptRequest>>,
) -> ListenerHandle {
    let auto_confirm = prompts.is_none();
    let (status, status_rx) = watch::channel(SyncState::default());
    let (closing, _) = watch::channel(false);
    let (shutdown, shutdown_rx) = oneshot::channel();

    let ctx = Arc::new(ListenerContext {
        synchronizer,
        monitor: Mutex::new(ConnectivityMonitor::with_auto_confirm(auto_confirm)),
        status,
        prompts,
        closing,
    });

    tracing::info!("Starting connectivity listener (auto confirm: {})", auto_confirm);
    let task = tokio::spawn(listen(ctx, connectivity, shutdown_rx));

    ListenerHandle {
        status: status_rx,
        shutdown,
        task,
    }
}

async fn listen(
    ctx: Arc<ListenerContext>,
    mut connectivity: watch::Receiver<bool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut flows = JoinSet::new();

    let online = *connectivity.borrow_and_update();
    handle_connectivity(&ctx, online, &mut flows).await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = connectivity.changed() => {
                if changed.is_err() {
                    tracing::debug!("Connectivity source closed");
                    break;
                }
                let online = *connectivity.borrow_and_update();
                handle_connectivity(&ctx, online, &mut flows).await;
            }
            Some(joined) = flows.join_next(), if !flows.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Sync flow ended abnormally: {}", e);
                }
            }
        }
    }

    ctx.closing.send_replace(true);
    while let Some(joined) = flows.join_next().await {
        if let Err(e) = joined {
            tracing::warn!("Sync flow ended abnormally: {}", e);
        }
    }
    tracing::info!("Connectivity listener stopped");
}

async fn handle_connectivity(ctx: &Arc<ListenerContext>, online: bool, flows: &mut JoinSet<()>) {
    let pending = if online {
        match ctx.synchronizer.queue().len().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Could not read the mutation queue: {}", e);
                0
            }
        }
    } else {
        0
    };

    // Checked under the monitor lock so the running pass cannot report
    // back in between
    let (action, resumed) = {
        let mut monitor = ctx.monitor();
        if online && ctx.synchronizer.is_running() && monitor.sync_resumed() {
            (MonitorAction::None, true)
        } else {
            (monitor.observe(online, pending), false)
        }
    };
    ctx.publish_connectivity();

    if resumed {
        tracing::info!("Back online while a sync pass is still running, not asking again");
        flows.spawn(follow_running_pass(Arc::clone(ctx)));
        return;
    }

    match action {
        MonitorAction::None => {}
        MonitorAction::PromptUser { pending } => match ctx.prompts.clone() {
            Some(prompts) => {
                tracing::info!("Back online with {} queued changes, asking to sync", pending);
                flows.spawn(prompt_flow(Arc::clone(ctx), prompts, pending));
            }
            None => {
                if ctx.monitor().answer(true) == MonitorAction::StartSync {
                    flows.spawn(run_sync(Arc::clone(ctx)));
                }
            }
        },
        MonitorAction::StartSync => {
            tracing::info!("Back online with {} queued changes, syncing", pending);
            flows.spawn(run_sync(Arc::clone(ctx)));
        }
    }
}

async fn prompt_flow(
    ctx: Arc<ListenerContext>,
    prompts: mpsc::Sender<SyncPromptRequest>,
    pending: usize,
) {
    let mut closing = ctx.closing.subscribe();

    let ask = async move {
        let (respond, answer) = oneshot::channel();
        if prompts.send(SyncPromptRequest { pending, respond }).await.is_err() {
            tracing::warn!("Nobody is listening for sync prompts, treating as declined");
            return false;
        }
        answer.await.unwrap_or(false)
    };

    let accepted = tokio::select! {
        accepted = ask => accepted,
        _ = closing.wait_for(|closing| *closing) => return,
    };

    tracing::info!("Sync prompt {}", if accepted { "accepted" } else { "declined" });
    let action = ctx.monitor().answer(accepted);
    ctx.publish_connectivity();

    if action == MonitorAction::StartSync {
        run_sync(ctx).await;
    }
}

async fn run_sync(ctx: Arc<ListenerContext>) {
    ctx.status.send_modify(|status| status.is_syncing = true);
    ctx.publish_connectivity();

    let result = ctx.synchronizer.process_queue().await;
    if let Err(SyncError::PassInProgress) = result {
        tracing::debug!("A sync pass is already running, waiting for it");
        follow_running_pass(Arc::clone(&ctx)).await;
        ctx.status.send_modify(|status| status.is_syncing = false);
        return;
    }
    if let Err(e) = &result {
        tracing::error!("Sync pass failed: {}", e);
        ctx.synchronizer.telemetry().record_error("sync.pass", e);
    }

    ctx.monitor().sync_finished();
    let connectivity = ctx.monitor().state();
    ctx.status.send_modify(|status| {
        status.connectivity = connectivity;
        status.is_syncing = false;
        status.last_sync = Some(Utc::now());
        status.passes += 1;
        match result {
            Ok(report) => {
                status.last_report = Some(report);
                status.last_error = None;
            }
            Err(e) => status.last_error = Some(e.to_string()),
        }
    });
}

/// Leave `Syncing` once a pass this flow did not start has ended
async fn follow_running_pass(ctx: Arc<ListenerContext>) {
    ctx.synchronizer.wait_idle().await;
    ctx.monitor().sync_finished();
    ctx.publish_connectivity();
}
