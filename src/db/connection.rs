//! The pressure store's single SQLite connection.
//!
//! Uploads write a data file, every frame and its alerts in one
//! transaction, and heatmap views update a frame while inserting alerts.
//! Every statement runs on one worker thread, so those transactions never
//! interleave. Async callers hand the worker a closure and await its result
//! on a oneshot channel.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::db::migrations::run_migrations;

const WORKER_NAME: &str = "graphene-db";

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreMessage {
    Run(StoreJob),
    Stop,
}

/// Open the database file and bring its schema up to date.
fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open pressure store {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("pressure store stays in rollback-journal mode: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    run_migrations(&mut conn).context("failed to migrate pressure store")?;
    Ok(conn)
}

fn serve(mut conn: Connection, inbox: mpsc::Receiver<StoreMessage>) {
    let mut jobs: u64 = 0;
    while let Ok(message) = inbox.recv() {
        match message {
            StoreMessage::Run(job) => {
                job(&mut conn);
                jobs += 1;
            }
            StoreMessage::Stop => break,
        }
    }
    debug!("pressure store worker stopping after {jobs} jobs");
}

struct Worker {
    outbox: mpsc::Sender<StoreMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else { return };

        if self.outbox.send(StoreMessage::Stop).is_err() {
            error!("pressure store worker exited before shutdown");
        }
        if handle.join().is_err() {
            error!("pressure store worker panicked");
        }
    }
}

/// Handle to the pressure store. Clones share one worker thread, which
/// stops when the last clone is dropped.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the store at `db_path`. Returns once the
    /// schema is migrated, so a bad file fails here rather than on first use.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (outbox, inbox) = mpsc::channel::<StoreMessage>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = db_path.clone();

        let handle = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || match open_store(&worker_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, inbox);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn pressure store worker")?;

        ready_rx
            .recv()
            .context("pressure store worker exited during startup")??;

        info!("pressure store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                outbox,
                handle: Mutex::new(Some(handle)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` on the store's connection and return its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: StoreJob = Box::new(move |conn| {
            // The caller may have been cancelled; the job still ran.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .outbox
            .send(StoreMessage::Run(job))
            .map_err(|_| anyhow!("pressure store worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("pressure store worker stopped before replying"))?
    }
}
