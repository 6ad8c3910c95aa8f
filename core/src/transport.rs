//! Long-lived HTTP transport to the agent's local endpoint.
//!
//! A [`Session`] owns the async runtime that delivers I/O completions and one
//! pooled HTTP client. [`Connection`]s are cheap handles bound to a host and
//! port; creating one performs no I/O. Requests issued through a connection
//! either run detached on the session runtime (status probe) or block the
//! calling thread until they finish (inventory trigger).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::TransportError;

/// Per-phase limits, each independently configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub resolve: Duration,
    pub connect: Duration,
    pub send: Duration,
    pub receive: Duration,
}

impl Timeouts {
    /// Upper bound for dispatching a request and receiving its headers.
    pub fn request(&self) -> Duration {
        self.resolve + self.connect + self.send + self.receive
    }
}

struct SessionInner {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    client: reqwest::Client,
    timeouts: Timeouts,
    closed: AtomicBool,
}

impl SessionInner {
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            // Outstanding requests are abandoned, not awaited.
            runtime.shutdown_background();
            info!("Transport session closed");
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Process-wide transport context. Clones share the same runtime and client.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start the transport runtime and build the pooled client.
    pub fn open(user_agent: &str, timeouts: Timeouts) -> Result<Self, TransportError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("agent-monitor-http")
            .enable_all()
            .build()?;

        let client = {
            let _guard = runtime.enter();
            reqwest::Client::builder()
                .user_agent(user_agent)
                .no_proxy()
                .connect_timeout(timeouts.resolve + timeouts.connect)
                .timeout(timeouts.request())
                .build()?
        };

        info!("Transport session opened ({user_agent})");
        debug!("Transport timeouts: {:?}", timeouts);

        let handle = runtime.handle().clone();
        Ok(Self {
            inner: Arc::new(SessionInner {
                runtime: Mutex::new(Some(runtime)),
                handle,
                client,
                timeouts,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Bind a reusable logical connection. Performs no I/O.
    pub fn connect(&self, host: &str, port: u16) -> Connection {
        let base_url = format!("http://{host}:{port}");
        debug!("Connection bound to {base_url}");
        Connection {
            session: Arc::clone(&self.inner),
            base_url,
        }
    }

    /// Tear down the runtime. Safe to call more than once.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

/// Handle to the agent endpoint, shared by the probe and the inventory trigger.
#[derive(Clone)]
pub struct Connection {
    session: Arc<SessionInner>,
    base_url: String,
}

impl Connection {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.session.timeouts
    }

    pub fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.session.client
    }

    /// Run `future` detached on the transport runtime.
    ///
    /// Returns `false` and drops the future when the session is closed.
    pub(crate) fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            warn!("Transport session closed; request not sent");
            return false;
        }
        self.session.handle.spawn(future);
        true
    }

    /// Run `future` to completion on the transport runtime, blocking the caller.
    ///
    /// Must not be called from a transport worker thread.
    pub(crate) fn block_on<F>(&self, future: F) -> Result<F::Output, TransportError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let task = self.session.handle.spawn(future);
        self.session
            .handle
            .block_on(task)
            .map_err(|_| TransportError::Closed)
    }
}

/// Await a transport future under a deadline, flattening both failure kinds
/// into a printable reason.
pub(crate) async fn timed<T, F>(limit: Duration, future: F) -> Result<T, String>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {limit:?}")),
    }
}
