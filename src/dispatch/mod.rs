//! Record Dispatcher
//!
//! Turns messages into formatted lines and hands them to a single writer
//! thread, so producers never wait on disk I/O.

mod record;

pub use record::{Level, Record};

use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};

use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::logfile::{ArchivedFile, RotatingLogWriter};

/// Work sent to the writer thread
enum Command {
    Write(Vec<u8>),
    Archive(oneshot::Sender<Result<Vec<ArchivedFile>>>),
    Flush(oneshot::Sender<()>),
}

/// Front end for a rotating log.
///
/// Owns the writer thread. Requests are handled in the order they were
/// queued, so `archive()` sees every record logged before it.
pub struct Dispatcher {
    sender: Option<mpsc::UnboundedSender<Command>>,
    worker: Option<JoinHandle<Result<()>>>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Spawn the writer thread for `writer`
    pub fn new(writer: RotatingLogWriter, config: DispatchConfig) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name(format!("wolflog-{}", writer.name()))
            .spawn(move || writer_task(writer, receiver))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            config,
        })
    }

    pub fn level(&self) -> Level {
        self.config.level
    }

    /// Whether records at `level` are written
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.config.level
    }

    /// Log `message` under `tag`
    pub fn log(&self, level: Level, tag: &str, message: &str) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.submit(Record::new(level, tag, message))
    }

    /// Log `message` with an error and its causes
    pub fn log_error(
        &self,
        level: Level,
        tag: &str,
        message: &str,
        error: &(dyn std::error::Error + 'static),
    ) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.submit(Record::new(level, tag, message).with_error(error))
    }

    pub fn verbose(&self, message: &str) -> Result<()> {
        self.log(Level::Verbose, &self.config.tag, message)
    }

    pub fn debug(&self, message: &str) -> Result<()> {
        self.log(Level::Debug, &self.config.tag, message)
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.log(Level::Info, &self.config.tag, message)
    }

    pub fn warn(&self, message: &str) -> Result<()> {
        self.log(Level::Warn, &self.config.tag, message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.log(Level::Error, &self.config.tag, message)
    }

    /// Queue a finished record, bypassing the level filter
    pub fn submit(&self, record: Record) -> Result<()> {
        if self.config.console {
            echo(&record);
        }
        self.send(Command::Write(record.format().into_bytes()))
    }

    /// Queue bytes that are already formatted
    pub fn write_raw(&self, content: Vec<u8>) -> Result<()> {
        self.send(Command::Write(content))
    }

    /// Archive the log once everything queued so far is written.
    ///
    /// Blocks the caller; do not call from inside an async runtime.
    pub fn archive(&self) -> Result<Vec<ArchivedFile>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Archive(tx))?;
        rx.blocking_recv().map_err(|_| Error::ShuttingDown)?
    }

    /// Wait until everything queued so far is written
    pub fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.blocking_recv().map_err(|_| Error::ShuttingDown)
    }

    /// Drain the queue, close the writer and stop the writer thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn send(&self, command: Command) -> Result<()> {
        match &self.sender {
            Some(sender) => sender.send(command).map_err(|_| Error::ShuttingDown),
            None => Err(Error::ShuttingDown),
        }
    }

    fn stop(&mut self) -> Result<()> {
        // Closing the channel lets the worker drain and exit
        drop(self.sender.take());

        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| Error::Internal("log writer thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Log dispatcher shutdown failed: {}", e);
        }
    }
}

/// Writer thread loop
fn writer_task(writer: RotatingLogWriter, mut receiver: mpsc::UnboundedReceiver<Command>) -> Result<()> {
    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::Write(content) => {
                if let Err(e) = writer.write(&content) {
                    tracing::error!("Log write failed: {}", e);
                }
            }
            Command::Archive(reply) => {
                let _ = reply.send(writer.archive());
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    writer.close()
}

/// Console sink: replay the record as a tracing event
fn echo(record: &Record) {
    let tag = record.tag.as_str();
    let message = record.message.as_str();
    match record.level {
        Level::Verbose => tracing::trace!(target: "wolflog::console", tag, "{}", message),
        Level::Debug => tracing::debug!(target: "wolflog::console", tag, "{}", message),
        Level::Info => tracing::info!(target: "wolflog::console", tag, "{}", message),
        Level::Warn => tracing::warn!(target: "wolflog::console", tag, "{}", message),
        Level::Error => tracing::error!(target: "wolflog::console", tag, "{}", message),
    }
}
