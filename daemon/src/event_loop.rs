//! The single-threaded loop that owns the panel.
//!
//! Universe frames and every action coming from other threads are run here,
//! one at a time. Other threads get a [`LoopHandle`] and never see the
//! panel directly.

use std::time::Duration;

use futures::StreamExt;
use log::{debug, info};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

use crate::client::UniverseFrame;
use crate::panel::PanelController;

pub type Action = Box<dyn FnOnce(&mut PanelController) + Send>;

#[derive(Debug, Error)]
#[error("event loop has stopped")]
pub struct LoopClosed;

enum Request {
    Execute(Action),
    Schedule(Duration, Action),
}

/// Cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct LoopHandle {
    requests: mpsc::UnboundedSender<Request>,
}

impl LoopHandle {
    /// Runs `action` on the loop as soon as it gets to it.
    pub fn execute<F>(&self, action: F) -> Result<(), LoopClosed>
    where
        F: FnOnce(&mut PanelController) + Send + 'static,
    {
        self.requests
            .send(Request::Execute(Box::new(action)))
            .map_err(|_| LoopClosed)
    }

    /// Runs `action` on the loop once `delay` has passed. The timer is armed
    /// by the loop itself when it picks the request up.
    pub fn schedule_delayed<F>(&self, delay: Duration, action: F) -> Result<(), LoopClosed>
    where
        F: FnOnce(&mut PanelController) + Send + 'static,
    {
        self.requests
            .send(Request::Schedule(delay, Box::new(action)))
            .map_err(|_| LoopClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

pub struct EventLoop {
    panel: PanelController,
    requests: mpsc::UnboundedReceiver<Request>,
    frames: mpsc::Receiver<UniverseFrame>,
    delayed: DelayQueue<Action>,
}

impl EventLoop {
    pub fn new(panel: PanelController, frames: mpsc::Receiver<UniverseFrame>) -> (Self, LoopHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = Self {
            panel,
            requests: rx,
            frames,
            delayed: DelayQueue::new(),
        };
        (event_loop, LoopHandle { requests: tx })
    }

    /// Runs until `shutdown_token` is cancelled and hands the panel back so
    /// the caller can switch it off. Pending delayed actions are dropped.
    pub async fn run(mut self, shutdown_token: CancellationToken) -> PanelController {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_token.cancelled() => {
                    info!("event loop shutting down");
                    break;
                }
                Some(request) = self.requests.recv() => match request {
                    Request::Execute(action) => action(&mut self.panel),
                    Request::Schedule(delay, action) => {
                        debug!("arming action in {delay:?}");
                        self.delayed.insert(action, delay);
                    }
                },
                Some(expired) = self.delayed.next(), if !self.delayed.is_empty() => {
                    (expired.into_inner())(&mut self.panel);
                }
                Some(frame) = self.frames.recv() => {
                    self.panel.handle_universe(frame.universe, &frame.data);
                }
                else => break,
            }
        }
        if !self.delayed.is_empty() {
            debug!("dropping {} pending actions", self.delayed.len());
        }
        self.panel
    }
}
