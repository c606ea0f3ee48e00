//! Runs a [`DataSource`] on its own thread so fetches never block the caller.

use crate::error::FetchError;
use crate::navigation::FetchTicket;
use crate::source::{DataSource, FetchResponse};
use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, warn};
use std::thread::JoinHandle;
use std::time::Duration;

/// A finished fetch, tagged with the token it was issued under.
#[derive(Debug)]
pub struct FetchDone {
    pub token: u64,
    pub result: Result<FetchResponse, FetchError>,
}

enum WorkerCommand {
    Fetch(FetchTicket),
    Shutdown,
}

pub struct FetchWorker {
    command_tx: Sender<WorkerCommand>,
    done_rx: Receiver<FetchDone>,
    handle: Option<JoinHandle<()>>,
}

impl FetchWorker {
    pub fn spawn<S>(source: S) -> Self
    where
        S: DataSource + Send + 'static,
    {
        let (command_tx, command_rx) = bounded(32);
        let (done_tx, done_rx) = bounded(32);
        let handle = std::thread::spawn(move || Worker::new(source, command_rx, done_tx).run());
        Self {
            command_tx,
            done_rx,
            handle: Some(handle),
        }
    }

    /// Queue a ticket. Returns false once the worker has stopped.
    pub fn submit(&self, ticket: FetchTicket) -> bool {
        self.command_tx.send(WorkerCommand::Fetch(ticket)).is_ok()
    }

    pub fn try_recv(&self) -> Option<FetchDone> {
        match self.done_rx.try_recv() {
            Ok(done) => Some(done),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<FetchDone> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(done) => Some(done),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for FetchWorker {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(WorkerCommand::Shutdown);
        // Unread results would otherwise keep the worker blocked on a full queue.
        drop(std::mem::replace(&mut self.done_rx, never()));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker<S> {
    source: S,
    command_rx: Receiver<WorkerCommand>,
    done_tx: Sender<FetchDone>,
}

impl<S: DataSource> Worker<S> {
    fn new(source: S, command_rx: Receiver<WorkerCommand>, done_tx: Sender<FetchDone>) -> Self {
        Self {
            source,
            command_rx,
            done_tx,
        }
    }

    fn run(mut self) {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                WorkerCommand::Fetch(ticket) => {
                    debug!("worker fetching token {}", ticket.token);
                    let result = self.source.fetch(&ticket.request);
                    if let Err(err) = &result {
                        warn!("token {} failed in source: {err}", ticket.token);
                    }
                    let done = FetchDone {
                        token: ticket.token,
                        result,
                    };
                    if self.done_tx.send(done).is_err() {
                        break;
                    }
                }
                WorkerCommand::Shutdown => break,
            }
        }
    }
}
