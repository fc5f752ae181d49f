use conflux_core::error::{ActionError, ComposeError};
use conflux_core::middleware::{BoxFuture, Middleware, Next, compose};
use std::sync::{Arc, Mutex};

/// Context for composer tests: a single mutable number.
struct Counter {
    value: Mutex<i64>,
}

impl Counter {
    fn new(value: i64) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    fn get(&self) -> i64 {
        *self.value.lock().unwrap()
    }
}

/// Records a label before and after delegating.
struct LogStep {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware<Counter> for LogStep {
    fn handle<'a>(
        &'a self,
        ctx: &'a Counter,
        mut next: Next<'a, Counter>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("{}:pre", self.label));
            next.run(ctx).await?;
            self.log.lock().unwrap().push(format!("{}:post", self.label));
            Ok(())
        })
    }
}

/// Doubles the counter after the rest of the chain has run.
struct DoubleAfter;

impl Middleware<Counter> for DoubleAfter {
    fn handle<'a>(
        &'a self,
        ctx: &'a Counter,
        mut next: Next<'a, Counter>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            next.run(ctx).await?;
            let mut value = ctx.value.lock().unwrap();
            *value *= 2;
            Ok(())
        })
    }
}

// --- Onion ordering ---

#[tokio::test]
async fn wraps_in_onion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = compose(vec![
        Arc::new(LogStep {
            label: "log",
            log: Arc::clone(&log),
        }) as Arc<dyn Middleware<Counter>>,
        Arc::new(DoubleAfter),
    ]);

    let ctx = Counter::new(3);
    chain.run(&ctx).await.unwrap();

    // The multiply happens on the unwind, inside the logger's wrap.
    assert_eq!(ctx.get(), 6);
    assert_eq!(*log.lock().unwrap(), vec!["log:pre", "log:post"]);
}

#[tokio::test]
async fn executes_in_list_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = compose(
        ["a", "b", "c"]
            .into_iter()
            .map(|label| {
                Arc::new(LogStep {
                    label,
                    log: Arc::clone(&log),
                }) as Arc<dyn Middleware<Counter>>
            })
            .collect(),
    );

    chain.run(&Counter::new(0)).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["a:pre", "b:pre", "c:pre", "c:post", "b:post", "a:post"]
    );
}

// --- Empty and reusable chains ---

#[tokio::test]
async fn empty_chain_is_a_noop() {
    let chain = compose::<Counter>(vec![]);
    assert!(chain.is_empty());
    chain.run(&Counter::new(1)).await.unwrap();
}

#[tokio::test]
async fn chain_is_reusable() {
    let chain = compose(vec![Arc::new(DoubleAfter) as Arc<dyn Middleware<Counter>>]);
    let ctx = Counter::new(1);

    chain.run(&ctx).await.unwrap();
    chain.run(&ctx).await.unwrap();

    assert_eq!(ctx.get(), 4);
}

// --- Short-circuit ---

/// Never calls `next`.
struct ShortCircuit;

impl Middleware<Counter> for ShortCircuit {
    fn handle<'a>(
        &'a self,
        _ctx: &'a Counter,
        _next: Next<'a, Counter>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move { Ok(()) })
    }
}

#[tokio::test]
async fn skipping_next_short_circuits_downstream() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = compose(vec![
        Arc::new(ShortCircuit) as Arc<dyn Middleware<Counter>>,
        Arc::new(LogStep {
            label: "unreached",
            log: Arc::clone(&log),
        }),
    ]);

    chain.run(&Counter::new(0)).await.unwrap();
    assert!(log.lock().unwrap().is_empty());
}

// --- Errors ---

/// Rejects without delegating.
struct Fails;

impl Middleware<Counter> for Fails {
    fn handle<'a>(
        &'a self,
        _ctx: &'a Counter,
        _next: Next<'a, Counter>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move { Err(ActionError::failed("boom")) })
    }
}

#[tokio::test]
async fn middleware_error_aborts_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = compose(vec![
        Arc::new(LogStep {
            label: "outer",
            log: Arc::clone(&log),
        }) as Arc<dyn Middleware<Counter>>,
        Arc::new(Fails),
        Arc::new(LogStep {
            label: "unreached",
            log: Arc::clone(&log),
        }),
    ]);

    let err = chain.run(&Counter::new(0)).await.unwrap_err();
    assert!(matches!(err, ActionError::Failed(message) if message == "boom"));

    // Outer middleware saw the chain start but its `?` aborted the unwind log.
    assert_eq!(*log.lock().unwrap(), vec!["outer:pre"]);
}

// --- Double-next guard ---

/// Calls its continuation twice.
struct CallsNextTwice;

impl Middleware<Counter> for CallsNextTwice {
    fn handle<'a>(
        &'a self,
        ctx: &'a Counter,
        mut next: Next<'a, Counter>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            next.run(ctx).await?;
            next.run(ctx).await
        })
    }
}

#[tokio::test]
async fn second_next_call_is_a_compose_error() {
    let chain = compose(vec![
        Arc::new(CallsNextTwice) as Arc<dyn Middleware<Counter>>,
        Arc::new(DoubleAfter),
    ]);

    let ctx = Counter::new(1);
    let err = chain.run(&ctx).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::Compose(ComposeError::NextCalledTwice { index: 1 })
    ));

    // Downstream ran exactly once before the fault.
    assert_eq!(ctx.get(), 2);
}
