use std::cell::RefCell;
use std::rc::Rc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info_span};

type MutableJoinSet = Rc<RefCell<JoinSet<()>>>;

/// Collects the long-running tasks of a process so that `main` can wait
/// for all of them.
#[derive(Default)]
pub struct Builder {
    join_set: MutableJoinSet,
}

impl Builder {
    pub fn new_task(&self, name: &'static str) -> Spawner {
        Spawner {
            name,
            join_set: self.join_set.clone(),
        }
    }

    /// Waits for every spawned task, logging tasks that panicked.
    pub async fn join_all(self) {
        let mut join_set = self.join_set.take();
        while let Some(result) = join_set.join_next().await {
            if let Err(err) = result {
                error!("Task failed: {}", err);
            }
        }
    }
}

pub struct Spawner {
    name: &'static str,
    join_set: MutableJoinSet,
}

impl Spawner {
    #[track_caller]
    pub fn spawn<F>(self, task: F)
    where
        F: Future<Output = ()>,
        F: Send + 'static,
    {
        debug!("Spawning task '{}'", self.name);
        self.join_set
            .borrow_mut()
            .spawn(task.instrument(info_span!("task", name = self.name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_join_all_waits_for_tasks() {
        let builder = Builder::default();
        let counter = Arc::new(AtomicUsize::new(0));

        for name in ["first", "second", "third"] {
            let counter = counter.clone();
            builder.new_task(name).spawn(async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        builder.join_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_join() {
        let builder = Builder::default();
        builder.new_task("panics").spawn(async {
            panic!("boom");
        });
        builder.new_task("fine").spawn(async {});
        builder.join_all().await;
    }
}
