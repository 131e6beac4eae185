//! Fake collaborators shared by the unit tests.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::{Endpoint, WorkerCommand};
use crate::connection::{Dialer, LinkStream};
use crate::error::{DialError, SpawnError};
use crate::events::{StatusUpdate, SupervisorState};
use crate::process::{Launcher, Worker, WorkerExit};
use crate::reporters::StatusReporter;

/// Reporter that keeps every update.
#[derive(Default)]
pub struct Recorder {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl Recorder {
    pub fn states(&self) -> Vec<SupervisorState> {
        self.updates.lock().unwrap().iter().map(|u| u.state).collect()
    }
}

#[async_trait]
impl StatusReporter for Recorder {
    async fn report(&self, update: &StatusUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Collapses repeated states, so refusal reports do not show up as transitions.
pub fn transitions(updates: impl IntoIterator<Item = StatusUpdate>) -> Vec<SupervisorState> {
    let mut out: Vec<SupervisorState> = Vec::new();
    for u in updates {
        if out.last() != Some(&u.state) {
            out.push(u.state);
        }
    }
    out
}

#[derive(Default)]
struct LauncherState {
    spawns: u32,
    kills: u32,
    crashes: Vec<Option<oneshot::Sender<i32>>>,
    fail: Option<io::ErrorKind>,
}

/// Launcher whose workers run until crashed or killed.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn failing(kind: io::ErrorKind) -> Self {
        let launcher = Self::default();
        launcher.fail_launches(kind);
        launcher
    }

    /// Makes every launch from now on fail with `kind`.
    pub fn fail_launches(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().fail = Some(kind);
    }

    pub fn spawns(&self) -> u32 {
        self.state.lock().unwrap().spawns
    }

    pub fn kills(&self) -> u32 {
        self.state.lock().unwrap().kills
    }

    /// Makes the most recently launched worker exit with `code`.
    pub fn crash_latest(&self, code: i32) {
        let mut st = self.state.lock().unwrap();
        if let Some(tx) = st.crashes.last_mut().and_then(Option::take) {
            let _ = tx.send(code);
        }
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<Box<dyn Worker>, SpawnError> {
        let mut st = self.state.lock().unwrap();
        if let Some(kind) = st.fail {
            return Err(SpawnError::from_io(command.program.clone(), kind.into()));
        }
        let (tx, rx) = oneshot::channel();
        st.spawns += 1;
        st.crashes.push(Some(tx));
        Ok(Box::new(FakeWorker {
            pid: 1000 + st.spawns,
            crash: rx,
            launcher: self.state.clone(),
        }))
    }
}

struct FakeWorker {
    pid: u32,
    crash: oneshot::Receiver<i32>,
    launcher: Arc<Mutex<LauncherState>>,
}

#[async_trait]
impl Worker for FakeWorker {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> WorkerExit {
        match (&mut self.crash).await {
            Ok(code) => WorkerExit::Code(code),
            Err(_) => std::future::pending().await,
        }
    }

    async fn kill(&mut self) {
        self.launcher.lock().unwrap().kills += 1;
    }
}

#[derive(Clone, Copy)]
enum Script {
    RefuseFor(Duration),
    Unreachable,
}

#[derive(Default)]
struct SocketCounters {
    dials: AtomicU32,
    closed: AtomicU32,
    established: AtomicU32,
}

/// Dialer driven by a script relative to its creation time.
///
/// Every dial opens a counted "socket" that is closed when the dial fails,
/// is abandoned, or when the established stream is dropped.
#[derive(Clone)]
pub struct ScriptedDialer {
    script: Script,
    latency: Duration,
    started: Instant,
    counters: Arc<SocketCounters>,
    peers: Arc<Mutex<Vec<DuplexStream>>>,
}

impl ScriptedDialer {
    fn new(script: Script) -> Self {
        Self {
            script,
            latency: Duration::ZERO,
            started: Instant::now(),
            counters: Arc::default(),
            peers: Arc::default(),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Script::RefuseFor(Duration::ZERO))
    }

    pub fn refusing_for(d: Duration) -> Self {
        Self::new(Script::RefuseFor(d))
    }

    pub fn never_accepting() -> Self {
        Self::new(Script::RefuseFor(Duration::MAX))
    }

    pub fn unreachable() -> Self {
        Self::new(Script::Unreachable)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn dials(&self) -> u32 {
        self.counters.dials.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn established(&self) -> u32 {
        self.counters.established.load(Ordering::SeqCst)
    }

    /// Server side of the most recent established link.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.peers.lock().unwrap().pop()
    }

    /// Closes the server side of every established link.
    pub fn hang_up(&self) {
        self.peers.lock().unwrap().clear();
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, endpoint: &Endpoint) -> Result<LinkStream, DialError> {
        self.counters.dials.fetch_add(1, Ordering::SeqCst);
        let guard = SocketGuard(self.counters.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.script {
            Script::Unreachable => Err(DialError::new(
                endpoint.to_string(),
                io::Error::other("failed to lookup address information"),
            )),
            Script::RefuseFor(d) if self.started.elapsed() < d => {
                drop(guard);
                Err(DialError::refused(endpoint.to_string()))
            }
            Script::RefuseFor(_) => {
                let (client, server) = tokio::io::duplex(4096);
                self.counters.established.fetch_add(1, Ordering::SeqCst);
                self.peers.lock().unwrap().push(server);
                Ok(Box::new(CountedStream {
                    inner: client,
                    _guard: guard,
                }))
            }
        }
    }
}

struct SocketGuard(Arc<SocketCounters>);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.0.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct CountedStream {
    inner: DuplexStream,
    _guard: SocketGuard,
}

impl AsyncRead for CountedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for CountedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
