//! Background execution of sync phases.
//!
//! Every unit runs in its own tokio task under a supervisor that reports
//! the result over a oneshot channel. A panic or cancellation is reported
//! as [`TaskReport::Crashed`], never as a completed result.

pub mod scheduler;

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};

pub use scheduler::spawn_schedule_worker;

#[derive(Debug)]
pub enum TaskReport<T, E> {
    Completed(T),
    Failed(E),
    Crashed(String),
}

/// Resolves to the unit's report.
#[derive(Debug)]
pub struct TaskHandle<T, E> {
    label: String,
    rx: oneshot::Receiver<TaskReport<T, E>>,
}

impl<T, E> TaskHandle<T, E> {
    pub fn label(&self) -> &str { &self.label }

    pub async fn report(self) -> TaskReport<T, E> {
        match self.rx.await {
            Ok(report) => report,
            Err(_) => TaskReport::Crashed(format!("{}: supervisor dropped without reporting", self.label)),
        }
    }
}

/// Runs units with a process-wide concurrency bound.
#[derive(Clone, Debug)]
pub struct BackgroundRunner {
    permits: Arc<Semaphore>,
}

impl BackgroundRunner {
    pub fn new(max_concurrent: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    pub fn available(&self) -> usize { self.permits.available_permits() }

    pub fn submit<F, T, E>(&self, label: impl Into<String>, task: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let permits = self.permits.clone();
        let unit = label.clone();

        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                let _ = tx.send(TaskReport::Crashed(format!("{unit}: runner closed")));
                return;
            };
            let report = match tokio::spawn(task).await {
                Ok(Ok(value)) => TaskReport::Completed(value),
                Ok(Err(err)) => TaskReport::Failed(err),
                Err(join) if join.is_panic() => {
                    let reason = panic_message(join.into_panic());
                    tracing::error!(task = %unit, reason = %reason, "Background task panicked");
                    TaskReport::Crashed(reason)
                }
                Err(join) => {
                    tracing::error!(task = %unit, "Background task cancelled");
                    TaskReport::Crashed(format!("cancelled: {join}"))
                }
            };
            drop(permit);
            if tx.send(report).is_err() {
                tracing::debug!(task = %unit, "Task report dropped, no one waiting");
            }
        });

        TaskHandle { label, rx }
    }
}

impl Default for BackgroundRunner {
    fn default() -> Self { Self::new(4) }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_and_failed_are_reported() {
        let runner = BackgroundRunner::new(2);
        let ok = runner.submit("ok", async { Ok::<_, String>(7) });
        let err = runner.submit("err", async { Err::<u32, _>("boom".to_string()) });
        assert!(matches!(ok.report().await, TaskReport::Completed(7)));
        assert!(matches!(err.report().await, TaskReport::Failed(e) if e == "boom"));
    }

    #[tokio::test]
    async fn panic_is_reported_as_crash() {
        let runner = BackgroundRunner::new(1);
        let handle = runner.submit("panics", async {
            if true {
                panic!("executor exploded");
            }
            Ok::<u32, String>(1)
        });
        match handle.report().await {
            TaskReport::Crashed(reason) => assert!(reason.contains("executor exploded")),
            other => panic!("expected crash, got {other:?}"),
        }
        // The permit is released after a crash.
        assert_eq!(runner.available(), 1);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let runner = BackgroundRunner::new(1);
        let slow = runner.submit("slow", async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>(())
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runner.available(), 0);
        slow.report().await;
    }
}
