//! Fixed-delay repetition of ingestion tasks.
//!
//! Each cycle runs in its own task so that an error or a panic is logged and
//! the next cycle still runs after the delay.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct FeedScheduler {
    name: Arc<str>,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl FeedScheduler {
    /// Runs `task` now and again `delay` after each cycle completes. Must be
    /// called from within a tokio runtime.
    pub fn spawn<F, Fut>(name: impl AsRef<str>, delay: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name.as_ref());
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            info!("starting {task_name} every {delay:?}");
            loop {
                match tokio::spawn(task()).await {
                    Ok(Ok(())) => debug!("{task_name} cycle completed"),
                    Ok(Err(report)) => error!("{task_name} cycle failed: {report:?}"),
                    Err(join_error) if join_error.is_panic() => {
                        let message = panic_message(join_error.into_panic());
                        error!("{task_name} cycle panicked: {message}")
                    }
                    Err(join_error) => error!("{task_name} cycle aborted: {join_error}"),
                }

                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("stopped {task_name}");
        });

        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the schedule and waits for an in-flight cycle to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

impl Drop for FeedScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
