//! Fixed-size pool of render workers.
//!
//! Each worker is an OS thread owning one `MarkupRenderer`. A small tokio
//! actor owns the pool state (FIFO job queue, idle workers, the reply
//! channel of every in-flight job) and reacts to worker events:
//!
//! ```text
//! worker ──Started──▶ actor ──▶ ticket.started
//!        ──Rendered / Fault──▶ ticket.result
//!        ──Complete──▶ worker idle, next queued job dispatched
//! ```
//!
//! A panic inside page code is caught on the worker, reported to that job
//! only, and the worker is replaced so the pool keeps its size. Closing
//! drops every queued and in-flight reply: waiting callers observe
//! `PoolClosed`. Threads cannot be killed; a worker busy at close time
//! finishes its render into the void and exits.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};

use super::{RenderContext, RenderFault, RenderJob, RendererFactory};

type WorkerId = usize;
type Outcome = Result<String, RenderFault>;

struct Pending {
    job: RenderJob,
    started: oneshot::Sender<()>,
    reply: oneshot::Sender<Outcome>,
}

enum WorkerEvent {
    Started,
    Rendered(String),
    Fault(RenderFault),
    Complete,
}

enum PoolMsg {
    Submit(Pending),
    Worker(WorkerId, WorkerEvent),
    Close,
}

/// Handle to a submitted job.
pub struct RenderTicket {
    started: oneshot::Receiver<()>,
    result: oneshot::Receiver<Outcome>,
}

impl RenderTicket {
    /// Resolves when a worker picks the job up. `false` if it never will.
    pub async fn started(&mut self) -> bool {
        (&mut self.started).await.is_ok()
    }

    pub async fn finish(self) -> Outcome {
        self.result.await.unwrap_or(Err(RenderFault::PoolClosed))
    }
}

#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<PoolMsg>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers (at least one). Must run inside a tokio runtime.
    pub fn spawn(size: usize, factory: Arc<dyn RendererFactory>) -> std::io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut actor = PoolActor {
            rx,
            tx: tx.clone(),
            factory,
            workers: FxHashMap::default(),
            idle: VecDeque::new(),
            queue: VecDeque::new(),
            next_id: 0,
        };
        for _ in 0..size {
            actor.add_worker()?;
        }
        tokio::spawn(actor.run());
        crate::debug!("render"; "pool started with {} workers", size);
        Ok(Self { tx, size })
    }

    pub fn submit(&self, job: RenderJob) -> RenderTicket {
        let (started_tx, started) = oneshot::channel();
        let (reply_tx, result) = oneshot::channel();
        // A closed pool drops the message, and with it the reply sender.
        let _ = self.tx.send(PoolMsg::Submit(Pending {
            job,
            started: started_tx,
            reply: reply_tx,
        }));
        RenderTicket { started, result }
    }

    /// Abandon queued and in-flight jobs and stop the pool.
    pub fn close(&self) {
        let _ = self.tx.send(PoolMsg::Close);
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

struct InFlight {
    started: Option<oneshot::Sender<()>>,
    reply: Option<oneshot::Sender<Outcome>>,
}

struct Worker {
    tasks: Sender<RenderJob>,
    in_flight: Option<InFlight>,
}

struct PoolActor {
    rx: mpsc::UnboundedReceiver<PoolMsg>,
    tx: mpsc::UnboundedSender<PoolMsg>,
    factory: Arc<dyn RendererFactory>,
    workers: FxHashMap<WorkerId, Worker>,
    idle: VecDeque<WorkerId>,
    queue: VecDeque<Pending>,
    next_id: WorkerId,
}

impl PoolActor {
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                PoolMsg::Submit(pending) => {
                    self.queue.push_back(pending);
                    self.dispatch();
                }
                PoolMsg::Worker(id, event) => self.on_worker_event(id, event),
                PoolMsg::Close => break,
            }
        }
        crate::debug!("render"; "pool closed, {} queued and {} running abandoned",
            self.queue.len(),
            self.workers.values().filter(|w| w.in_flight.is_some()).count());
    }

    fn add_worker(&mut self) -> std::io::Result<()> {
        let id = self.next_id;
        self.next_id += 1;
        let tasks = spawn_worker(id, Arc::clone(&self.factory), self.tx.clone())?;
        self.workers.insert(
            id,
            Worker {
                tasks,
                in_flight: None,
            },
        );
        self.idle.push_back(id);
        Ok(())
    }

    fn replace_worker(&mut self, id: WorkerId) {
        self.workers.remove(&id);
        self.idle.retain(|&idle| idle != id);
        if let Err(err) = self.add_worker() {
            crate::log!("error"; "cannot start render worker: {}", err);
        }
    }

    /// Hand queued jobs to idle workers, oldest first.
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(id) = self.idle.pop_front() else {
                return;
            };
            let Some(worker) = self.workers.get_mut(&id) else {
                continue;
            };
            let Some(pending) = self.queue.pop_front() else {
                return;
            };
            match worker.tasks.send(pending.job) {
                Ok(()) => {
                    worker.in_flight = Some(InFlight {
                        started: Some(pending.started),
                        reply: Some(pending.reply),
                    });
                }
                Err(channel::SendError(job)) => {
                    // Worker thread is gone; requeue and replace it.
                    self.queue.push_front(Pending { job, ..pending });
                    self.replace_worker(id);
                }
            }
        }
    }

    fn on_worker_event(&mut self, id: WorkerId, event: WorkerEvent) {
        let Some(worker) = self.workers.get_mut(&id) else {
            return;
        };
        match event {
            WorkerEvent::Started => {
                if let Some(started) = worker.in_flight.as_mut().and_then(|f| f.started.take()) {
                    let _ = started.send(());
                }
            }
            WorkerEvent::Rendered(markup) => {
                if let Some(reply) = worker.in_flight.as_mut().and_then(|f| f.reply.take()) {
                    let _ = reply.send(Ok(markup));
                }
            }
            WorkerEvent::Fault(fault) => {
                let panicked = matches!(fault, RenderFault::Panicked(_));
                if let Some(reply) = worker.in_flight.as_mut().and_then(|f| f.reply.take()) {
                    let _ = reply.send(Err(fault));
                }
                if panicked {
                    crate::debug!("render"; "worker {} panicked, replacing", id);
                    self.replace_worker(id);
                    self.dispatch();
                }
            }
            WorkerEvent::Complete => {
                worker.in_flight = None;
                self.idle.push_back(id);
                self.dispatch();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn spawn_worker(
    id: WorkerId,
    factory: Arc<dyn RendererFactory>,
    events: mpsc::UnboundedSender<PoolMsg>,
) -> std::io::Result<Sender<RenderJob>> {
    let (tasks, rx) = channel::bounded::<RenderJob>(1);
    thread::Builder::new()
        .name(format!("render-{id}"))
        .spawn(move || worker_loop(id, factory.as_ref(), rx, events))?;
    Ok(tasks)
}

fn worker_loop(
    id: WorkerId,
    factory: &dyn RendererFactory,
    tasks: Receiver<RenderJob>,
    events: mpsc::UnboundedSender<PoolMsg>,
) {
    let send = |event| events.send(PoolMsg::Worker(id, event)).is_ok();
    let mut renderer = factory.create();

    while let Ok(job) = tasks.recv() {
        if !send(WorkerEvent::Started) {
            return;
        }
        let mut context = RenderContext::for_job(&job);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&job, &mut context)));
        match outcome {
            Ok(Ok(markup)) => {
                send(WorkerEvent::Rendered(markup));
            }
            Ok(Err(err)) => {
                send(WorkerEvent::Fault(RenderFault::Failed(err)));
            }
            Err(payload) => {
                // The renderer may be left inconsistent; this worker retires.
                send(WorkerEvent::Fault(RenderFault::Panicked(panic_message(
                    payload.as_ref(),
                ))));
                return;
            }
        }
        if !send(WorkerEvent::Complete) {
            return;
        }
    }
}
