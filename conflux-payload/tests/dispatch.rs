use conflux_core::error::ActionError;
use conflux_core::middleware::{BoxFuture, Middleware, Next};
use conflux_core::test_utils::{FailingMiddleware, RecordingMiddleware};
use conflux_payload::{ActionInput, Payload};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Mw = Arc<dyn Middleware<Payload>>;

fn recording(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Mw {
    Arc::new(RecordingMiddleware::new(label, Arc::clone(log)))
}

// --- Name matching and ordering ---

#[tokio::test]
async fn dispatch_runs_only_matching_middleware_in_registration_order() {
    let payload = Payload::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    payload.on(&["save".into()], recording("save", &log));
    payload.on(&["load".into()], recording("load", &log));
    payload.on(&["save".into(), "sync".into()], recording("both", &log));

    payload.act(["save".into()]).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["save:pre", "both:pre", "both:post", "save:post"]
    );
}

#[tokio::test]
async fn middleware_matching_several_requested_names_runs_once() {
    let payload = Payload::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    payload.on(&["save".into(), "sync".into()], recording("both", &log));

    payload.act(["save".into(), "sync".into()]).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["both:pre", "both:post"]);
}

#[tokio::test]
async fn dispatch_without_names_runs_the_default_bucket() {
    let payload = Payload::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    payload.on(&[], recording("default", &log));
    payload.on(&["named".into()], recording("named", &log));

    payload
        .act([ActionInput::patch(json!({"touched": true}))])
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["default:pre", "default:post"]);
    assert_eq!(payload.get("touched"), Some(json!(true)));
}

// --- Patches ---

#[tokio::test]
async fn patches_merge_even_when_no_middleware_match() {
    let payload = Payload::new();
    payload
        .act([ActionInput::patch(json!({"a": {"b": 1}}))])
        .await
        .unwrap();
    payload
        .act([ActionInput::patch(json!({"a": {"c": 2}}))])
        .await
        .unwrap();

    assert_eq!(payload.get("a"), Some(json!({"b": 1, "c": 2})));
}

#[tokio::test]
async fn embedded_action_field_names_the_dispatch() {
    let payload = Payload::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    payload.on(&["save".into()], recording("save", &log));

    payload
        .act([ActionInput::patch(json!({"$action": "save", "draft": false}))])
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["save:pre", "save:post"]);
    assert_eq!(payload.get("draft"), Some(json!(false)));
    // The marker field is consumed, not merged.
    assert_eq!(payload.get("$action"), None);
}

#[tokio::test]
async fn embedded_action_field_accepts_name_arrays() {
    let payload = Payload::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    payload.on(&["a".into()], recording("a", &calls));
    payload.on(&["b".into()], recording("b", &calls));

    payload
        .act([ActionInput::patch(json!({"$action": ["a", "b"]}))])
        .await
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["a:pre", "b:pre", "b:post", "a:post"]
    );
}

// --- Registry maintenance ---

#[tokio::test]
async fn full_unuse_empties_the_registry() {
    let payload = Payload::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mw = recording("mw", &log);

    payload.on(&["a".into(), "b".into()], Arc::clone(&mw));
    assert_eq!(payload.middleware_count(), 1);

    payload.off(&["a".into()], &mw);
    assert_eq!(payload.middleware_count(), 1);

    payload.off(&["b".into()], &mw);
    assert_eq!(payload.middleware_count(), 0);

    payload.act(["a".into(), "b".into()]).await.unwrap();
    assert!(log.lock().unwrap().is_empty());
}

// --- Middleware mutate the container ---

/// Doubles the numeric field "v" after the rest of the chain runs.
struct DoubleV;

impl Middleware<Payload> for DoubleV {
    fn handle<'a>(
        &'a self,
        ctx: &'a Payload,
        mut next: Next<'a, Payload>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            next.run(ctx).await?;
            let v = ctx.get("v").and_then(|v| v.as_i64()).unwrap_or_default();
            ctx.set("v", json!(v * 2));
            Ok(())
        })
    }
}

#[tokio::test]
async fn middleware_see_patches_merged_before_the_chain_runs() {
    let payload = Payload::new();
    payload.on(&["calc".into()], Arc::new(DoubleV));

    payload
        .act([
            ActionInput::name("calc"),
            ActionInput::patch(json!({"v": 3})),
        ])
        .await
        .unwrap();

    assert_eq!(payload.get("v"), Some(json!(6)));
}

// --- Failure semantics ---

#[tokio::test]
async fn middleware_failure_propagates_after_cleanup() {
    let payload = Payload::new();
    payload.on(
        &["explode".into()],
        Arc::new(FailingMiddleware::new("went wrong")),
    );

    let err = payload.act(["explode".into()]).await.unwrap_err();
    assert!(matches!(err, ActionError::Failed(message) if message == "went wrong"));

    // In-flight bookkeeping unwound on the failure path too.
    assert!(!payload.is_acting(&[]));
    assert!(!payload.loading());
}

// --- In-flight tracking ---

/// Parks until notified, counting chain entries and completions.
struct Gate {
    notify: Arc<Notify>,
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl Gate {
    fn new(notify: &Arc<Notify>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let gate = Self {
            notify: Arc::clone(notify),
            started: Arc::clone(&started),
            completed: Arc::clone(&completed),
        };
        (gate, started, completed)
    }
}

impl Middleware<Payload> for Gate {
    fn handle<'a>(
        &'a self,
        ctx: &'a Payload,
        mut next: Next<'a, Payload>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.notify.notified().await;
            next.run(ctx).await?;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn overlapping_dispatches_keep_the_name_in_flight_until_both_finish() {
    let payload = Payload::new();
    let notify = Arc::new(Notify::new());
    let (gate, started, completed) = Gate::new(&notify);

    payload.on(&["save".into()], Arc::new(gate));

    let first = tokio::spawn({
        let payload = payload.clone();
        async move { payload.act(["save".into()]).await }
    });
    let second = tokio::spawn({
        let payload = payload.clone();
        async move { payload.act(["save".into()]).await }
    });

    // Let both dispatches reach the gate.
    while started.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }
    assert!(payload.is_acting(&["save".into()]));
    assert!(payload.loading());

    // Release one dispatch and wait for it to finish its chain.
    notify.notify_one();
    while completed.load(Ordering::SeqCst) < 1 {
        tokio::task::yield_now().await;
    }

    // One occurrence done, the other still in flight.
    assert!(payload.is_acting(&["save".into()]));

    notify.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert!(!payload.is_acting(&["save".into()]));
    assert!(!payload.loading());
}

#[tokio::test]
async fn loading_watch_sees_transitions_synchronously() {
    let payload = Payload::new();
    let notify = Arc::new(Notify::new());
    let (gate, _started, _completed) = Gate::new(&notify);
    let mut watch = payload.loading_watch();

    assert!(!*watch.borrow());

    payload.on(&["work".into()], Arc::new(gate));

    let task = tokio::spawn({
        let payload = payload.clone();
        async move { payload.act(["work".into()]).await }
    });

    watch.changed().await.unwrap();
    assert!(*watch.borrow());

    notify.notify_one();
    task.await.unwrap().unwrap();

    watch.changed().await.unwrap();
    assert!(!*watch.borrow());
}

#[tokio::test]
async fn is_acting_with_no_names_reports_any_activity() {
    let payload = Payload::new();
    assert!(!payload.is_acting(&[]));

    let notify = Arc::new(Notify::new());
    let (gate, _started, _completed) = Gate::new(&notify);
    payload.on(&["background".into()], Arc::new(gate));

    let task = tokio::spawn({
        let payload = payload.clone();
        async move { payload.act(["background".into()]).await }
    });

    while !payload.is_acting(&[]) {
        tokio::task::yield_now().await;
    }
    assert!(!payload.is_acting(&["other".into()]));

    notify.notify_one();
    task.await.unwrap().unwrap();
    assert!(!payload.is_acting(&[]));
}

// --- Membership-owned middleware ---

#[tokio::test]
async fn owner_teardown_deregisters_membership_middleware() {
    use conflux_payload::JoinOptions;
    use conflux_scope::{Context, Owner};

    let ctx = Context::root();
    let owner = Owner::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let membership =
        Payload::join(&owner, &ctx, json!({"n": 0}), JoinOptions::create()).unwrap();
    let payload = membership.payload().clone();

    membership.on(&["tick".into()], recording("tick", &log));
    payload.act(["tick".into()]).await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);

    owner.dispose();

    payload.act(["tick".into()]).await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 2, "middleware gone after teardown");
    assert_eq!(payload.middleware_count(), 0);
}

#[tokio::test]
async fn membership_off_stops_tracking_removed_names() {
    use conflux_payload::JoinOptions;
    use conflux_scope::{Context, Owner};

    let ctx = Context::root();
    let owner = Owner::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let membership =
        Payload::join(&owner, &ctx, json!({}), JoinOptions::create()).unwrap();
    let payload = membership.payload().clone();
    let mw = recording("mw", &log);

    membership.on(&["a".into(), "b".into()], Arc::clone(&mw));
    membership.off(&["a".into()], &mw);

    payload.act(["a".into()]).await.unwrap();
    assert!(log.lock().unwrap().is_empty());

    payload.act(["b".into()]).await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
}
