#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde_json::json;

use jobflow::data::{DataNode, InMemoryDataNode};
use jobflow::task::{Task, TaskContext};

/// An in-memory data node that has never been written.
pub fn node(id: &str) -> Arc<InMemoryDataNode> {
    Arc::new(InMemoryDataNode::new(id))
}

/// An in-memory data node already holding a value, so it is ready for
/// reading and valid.
pub fn source(id: &str) -> Arc<InMemoryDataNode> {
    Arc::new(InMemoryDataNode::with_value(id, json!({ "source": id })))
}

/// A latch task functions can wait on. Waiting gives up after 10 seconds so
/// a broken test fails instead of hanging.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, cond) = &*self.inner;
        *open.lock() = true;
        cond.notify_all();
    }

    pub fn is_open(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Returns whether the gate was opened in time.
    pub fn wait(&self) -> bool {
        let (open, cond) = &*self.inner;
        let mut open = open.lock();
        if !*open {
            let _ = cond.wait_for(&mut open, Duration::from_secs(10));
        }
        *open
    }
}

/// Tracks how many task functions run at the same time.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Succeed,
    Fail(String),
    Panic(String),
}

/// Builder for in-memory tasks with scripted behaviour.
pub struct TaskBuilder {
    id: String,
    inputs: Vec<Arc<dyn DataNode>>,
    outputs: Vec<Arc<dyn DataNode>>,
    skippable: bool,
    outcome: Outcome,
    runs: Option<Arc<AtomicUsize>>,
    order: Option<Arc<Mutex<Vec<String>>>>,
    gate: Option<Gate>,
    probe: Option<Arc<ConcurrencyProbe>>,
    duration: Option<Duration>,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            skippable: false,
            outcome: Outcome::Succeed,
            runs: None,
            order: None,
            gate: None,
            probe: None,
            duration: None,
        }
    }

    pub fn input<N: DataNode + 'static>(mut self, node: &Arc<N>) -> Self {
        self.inputs.push(Arc::clone(node) as Arc<dyn DataNode>);
        self
    }

    pub fn output<N: DataNode + 'static>(mut self, node: &Arc<N>) -> Self {
        self.outputs.push(Arc::clone(node) as Arc<dyn DataNode>);
        self
    }

    pub fn skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    /// Return an error with `message` instead of succeeding.
    pub fn fails(mut self, message: &str) -> Self {
        self.outcome = Outcome::Fail(message.to_string());
        self
    }

    pub fn panics(mut self, message: &str) -> Self {
        self.outcome = Outcome::Panic(message.to_string());
        self
    }

    /// Increment `counter` each time the function runs.
    pub fn count_runs(mut self, counter: &Arc<AtomicUsize>) -> Self {
        self.runs = Some(Arc::clone(counter));
        self
    }

    /// Append the task id to `order` each time the function runs.
    pub fn record_order(mut self, order: &Arc<Mutex<Vec<String>>>) -> Self {
        self.order = Some(Arc::clone(order));
        self
    }

    /// Block the function until `gate` opens.
    pub fn wait_for(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub fn probe(mut self, probe: &Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(Arc::clone(probe));
        self
    }

    /// Sleep for `duration` inside the function.
    pub fn takes(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn build(self) -> Arc<Task> {
        let TaskBuilder {
            id,
            inputs,
            outputs,
            skippable,
            outcome,
            runs,
            order,
            gate,
            probe,
            duration,
        } = self;

        let mut task = Task::new(id.as_str(), move |ctx: &TaskContext<'_>| {
            if let Some(probe) = &probe {
                probe.enter();
            }
            if let Some(runs) = &runs {
                runs.fetch_add(1, Ordering::SeqCst);
            }
            if let Some(order) = &order {
                order.lock().push(ctx.task.id().to_string());
            }
            if let Some(gate) = &gate {
                gate.wait();
            }
            if let Some(duration) = duration {
                thread::sleep(duration);
            }
            if let Some(probe) = &probe {
                probe.exit();
            }

            match &outcome {
                Outcome::Succeed => Ok(()),
                Outcome::Fail(message) => Err(anyhow::anyhow!("{message}")),
                Outcome::Panic(message) => panic!("{message}"),
            }
        })
        .skippable(skippable);

        for input in inputs {
            task = task.with_input(input);
        }
        for output in outputs {
            task = task.with_output(output);
        }
        Arc::new(task)
    }
}
