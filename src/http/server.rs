use crate::app::App;
use crate::error::{Error, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server as HyperServer;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Process-wide stop flag shared by the accept loop and request handling
///
/// Once requested it stays requested. New requests are answered with 503 and
/// the accept loop drains in-flight connections before it exits.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            log::info!("Shutdown requested - draining in-flight requests");
        }
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle to a running server
#[derive(Debug)]
pub struct Listening {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<()>>,
}

impl Listening {
    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Stop accepting connections; in-flight requests still complete
    pub fn close(&self) {
        self.shutdown.request();
    }

    /// Wait for the accept loop to finish
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::internal(format!("Server task failed: {}", e)))?
    }
}

/// Bind `addr` and spawn the accept loop for `app`
pub(crate) fn spawn(app: Arc<App>, addr: SocketAddr) -> Result<Listening> {
    let shutdown = app.shutdown().clone();

    let make_svc = make_service_fn(move |_conn| {
        let app = Arc::clone(&app);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let app = Arc::clone(&app);
                async move { Ok::<_, Infallible>(app.handle_hyper(req).await) }
            }))
        }
    });

    let server = HyperServer::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    let signal = shutdown.clone();
    let server = server.with_graceful_shutdown(async move { signal.wait().await });

    log::info!("Hydrogen server listening on {}", local_addr);

    let task = tokio::spawn(async move {
        let result = server.await;
        match &result {
            Ok(()) => log::info!("Server on {} stopped", local_addr),
            Err(e) => log::error!("Server error: {}", e),
        }
        result.map_err(Error::from)
    });

    Ok(Listening {
        local_addr,
        shutdown,
        task,
    })
}

/// Request shutdown on SIGTERM or SIGINT (Ctrl+C elsewhere)
pub fn install_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    log::error!("Failed to install SIGTERM handler: {}", e);
                    return;
                }
            };

            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(sig) => sig,
                Err(e) => {
                    log::error!("Failed to install SIGINT handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    log::info!("Received SIGTERM signal - initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    log::info!("Received SIGINT signal (Ctrl+C) - initiating graceful shutdown");
                }
                _ = shutdown.wait() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        log::error!("Failed to listen for Ctrl+C signal: {}", e);
                        return;
                    }
                    log::info!("Received Ctrl+C signal - initiating graceful shutdown");
                }
                _ = shutdown.wait() => return,
            }
        }

        shutdown.request();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_wait_after_request() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        shutdown.request();
        shutdown.request();
        assert!(shutdown.is_requested());
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        tokio::task::yield_now().await;
        shutdown.request();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
