use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use agentflow::{
    Capability, CapabilityRegistry, ChannelEvent, ChannelOptions, Config, Engine, EngineBuilder, ExecutionStatus, FlowDefinition, FlowError, InvocationContext,
    InvocationError, NodeRunStatus, Notification, Notifier, NotifyTarget, Trigger,
};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Returns `{ score: input.score }`.
struct Scorer;

#[async_trait]
impl Capability for Scorer {
    async fn call(
        &self,
        _: &str,
        input: Value,
        _: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        Ok(json!({ "score": input["score"] }))
    }
}

/// Returns its input, optionally after a delay.
struct Echo {
    delay: Duration,
}

#[async_trait]
impl Capability for Echo {
    async fn call(
        &self,
        _: &str,
        input: Value,
        _: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        tokio::time::sleep(self.delay).await;
        Ok(input)
    }
}

/// Fails the first `failures` calls, then echoes its input.
struct Flaky {
    failures: u32,
    retryable: bool,
    calls: AtomicU32,
    attempts: Mutex<Vec<(u32, Instant)>>,
}

impl Flaky {
    fn new(
        failures: u32,
        retryable: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            failures,
            retryable,
            calls: AtomicU32::new(0),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for Flaky {
    async fn call(
        &self,
        _: &str,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        self.attempts.lock().unwrap().push((ctx.attempt, Instant::now()));
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(InvocationError {
                message: format!("upstream unavailable (call {})", call),
                retryable: self.retryable,
            });
        }
        Ok(input)
    }
}

/// Never answers within a test, counts how often it was called.
#[derive(Default)]
struct Stalled {
    calls: AtomicU32,
}

#[async_trait]
impl Capability for Stalled {
    async fn call(
        &self,
        _: &str,
        input: Value,
        _: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(input)
    }
}

#[derive(Default)]
struct CollectingNotifier {
    sent: Mutex<Vec<(NotifyTarget, Notification)>>,
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> agentflow::Result<()> {
        self.sent.lock().unwrap().push((target.clone(), notification.clone()));
        Ok(())
    }
}

fn config() -> Config {
    let mut config = Config {
        async_worker_thread_number: 4,
        retry_backoff_base_ms: 10,
        cancel_grace_ms: 200,
        ..Default::default()
    };
    config.env.insert("region".to_string(), "eu-west".to_string());
    config
}

fn registry() -> CapabilityRegistry {
    let registry = CapabilityRegistry::new();
    registry.register("scorer", Arc::new(Scorer));
    registry.register(
        "echo",
        Arc::new(Echo {
            delay: Duration::ZERO,
        }),
    );
    registry
}

fn create_engine(registry: CapabilityRegistry) -> Engine {
    let engine = EngineBuilder::new().config(config()).invoker(Arc::new(registry)).build().unwrap();
    engine.launch();
    engine
}

fn flow(value: Value) -> FlowDefinition {
    serde_json::from_value(value).unwrap()
}

fn trigger(data: Value) -> Trigger {
    Trigger::new("tenant-1", data).with_context("vendor-42", "vendor")
}

fn scoring_flow() -> FlowDefinition {
    flow(json!({
        "id": "vendor-scoring",
        "name": "Vendor scoring",
        "status": "active",
        "nodes": [
            { "id": "A", "type": "agent", "agent_id": "scorer", "skill": "score", "input": { "score": "${trigger_data.score}" } },
            { "id": "B", "type": "condition", "condition": { "type": "greater_than", "field": "A.output.score", "value": 70 } },
            { "id": "C", "type": "agent", "agent_id": "echo", "skill": "echo", "input": { "approved_score": "${A.score}" } }
        ],
        "edges": [
            { "from": "A", "to": "B" },
            { "from": "B", "to": "C", "condition": { "type": "equals", "field": "condition_result", "value": true } }
        ]
    }))
}

#[test]
fn engine_scenario_condition_true_runs_branch() {
    let engine = create_engine(registry());
    let execution = engine.start(&scoring_flow(), trigger(json!({"score": 80}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.context_id.as_deref(), Some("vendor-42"));
    assert!(execution.completed_at.is_some());
    assert!(execution.duration_ms.unwrap() >= 0);

    let detail = engine.get_execution(&execution.id).unwrap();
    assert_eq!(detail.nodes.len(), 3);
    assert_eq!(detail.node("B").unwrap().output_snapshot, json!({"condition_result": true}));

    let c = detail.node("C").unwrap();
    assert_eq!(c.status, NodeRunStatus::Completed);
    assert_eq!(c.input_snapshot, json!({"approved_score": 80}));
    assert_eq!(c.output_snapshot, json!({"approved_score": 80}));
    engine.shutdown();
}

#[test]
fn engine_scenario_condition_false_skips_branch() {
    let engine = create_engine(registry());
    let execution = engine.start(&scoring_flow(), trigger(json!({"score": 50}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.error_message, None);

    let detail = engine.get_execution(&execution.id).unwrap();
    assert_eq!(detail.node("B").unwrap().output_snapshot, json!({"condition_result": false}));
    assert_eq!(detail.node("C").unwrap().status, NodeRunStatus::Skipped);
    engine.shutdown();
}

#[test]
fn engine_scenario_retries_exhausted() {
    let flaky = Flaky::new(u32::MAX, true);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "retry-exhausted",
        "name": "retry",
        "status": "active",
        "nodes": [
            { "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "retry": { "enabled": true, "count": 2 } },
            { "id": "B", "type": "agent", "agent_id": "echo", "skill": "echo" }
        ],
        "edges": [{ "from": "A", "to": "B" }]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();

    assert_eq!(flaky.calls(), 3);
    assert_eq!(execution.status, ExecutionStatus::Failed);
    let error = execution.error_message.clone().unwrap();
    assert!(error.contains("after 3 attempt(s)"), "{}", error);

    let detail = engine.get_execution(&execution.id).unwrap();
    let a = detail.node("A").unwrap();
    assert_eq!(a.status, NodeRunStatus::Failed);
    assert_eq!(a.retry_attempt, 2);
    assert!(detail.node("B").is_none());

    let attempts = flaky.attempts.lock().unwrap().iter().map(|(attempt, _)| *attempt).collect::<Vec<_>>();
    assert_eq!(attempts, vec![0, 1, 2]);
    engine.shutdown();
}

#[test]
fn engine_scenario_flow_timeout() {
    let registry = registry();
    registry.register(
        "slow",
        Arc::new(Echo {
            delay: Duration::from_secs(10),
        }),
    );
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "timeout",
        "name": "timeout",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "slow", "skill": "run" }],
        "settings": { "timeout_seconds": 5 }
    }));

    let started = Instant::now();
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert!(started.elapsed() < Duration::from_secs(8));

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.as_deref().unwrap().contains("timed out after 5 seconds"));

    let detail = engine.get_execution(&execution.id).unwrap();
    assert_eq!(detail.node("A").unwrap().status, NodeRunStatus::Failed);
    engine.shutdown();
}

#[test]
fn engine_rejects_invalid_definitions() {
    let engine = create_engine(registry());

    let dangling = flow(json!({
        "id": "dangling",
        "name": "dangling",
        "status": "active",
        "nodes": [{ "id": "A", "type": "parallel" }],
        "edges": [{ "from": "A", "to": "missing" }]
    }));
    assert!(matches!(engine.deploy(&dangling), Err(FlowError::Validation(_))));

    let cyclic = flow(json!({
        "id": "cyclic",
        "name": "cyclic",
        "status": "active",
        "nodes": [{ "id": "A", "type": "parallel" }, { "id": "B", "type": "parallel" }],
        "edges": [{ "from": "A", "to": "B" }, { "from": "B", "to": "A" }]
    }));
    assert!(matches!(engine.deploy(&cyclic), Err(FlowError::Validation(_))));

    assert!(engine.execute("dangling", trigger(json!({}))).is_err());
    assert!(engine.list_executions("cyclic").unwrap().is_empty());
    engine.shutdown();
}

#[test]
fn engine_backoff_doubles_between_attempts() {
    let flaky = Flaky::new(u32::MAX, true);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = EngineBuilder::new()
        .config(Config {
            retry_backoff_base_ms: 50,
            ..config()
        })
        .invoker(Arc::new(registry))
        .build()
        .unwrap();
    engine.launch();

    let def = flow(json!({
        "id": "backoff",
        "name": "backoff",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "retry": { "enabled": true, "count": 3 } }]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);

    let times = flaky.attempts.lock().unwrap().iter().map(|(_, at)| *at).collect::<Vec<_>>();
    assert_eq!(times.len(), 4);
    let gaps = times.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();
    for (k, gap) in gaps.iter().enumerate() {
        assert!(*gap >= Duration::from_millis(50 << k), "gap {} was {:?}", k, gap);
    }
    assert!(gaps[2] > gaps[0]);
    engine.shutdown();
}

#[test]
fn engine_flow_level_retry_applies_without_node_override() {
    let flaky = Flaky::new(1, true);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "flow-retry",
        "name": "flow retry",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "input": { "k": "v" } }],
        "settings": { "retry_on_failure": true, "retry_count": 1 }
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let a = engine.get_execution(&execution.id).unwrap().node("A").cloned().unwrap();
    assert_eq!(a.status, NodeRunStatus::Completed);
    assert_eq!(a.retry_attempt, 1);
    assert_eq!(a.output_snapshot, json!({"k": "v"}));
    engine.shutdown();
}

#[test]
fn engine_terminal_errors_are_not_retried() {
    let flaky = Flaky::new(u32::MAX, false);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "terminal",
        "name": "terminal",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "retry": { "enabled": true, "count": 3 } }]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(flaky.calls(), 1);
    engine.shutdown();
}

#[test]
fn engine_unresolved_variable_fails_node_without_calling() {
    let flaky = Flaky::new(0, true);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "unresolved",
        "name": "unresolved",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "retry": { "enabled": true, "count": 3 }, "input": { "v": "${trigger_data.missing}" } }]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.unwrap().contains("unresolved variable '${trigger_data.missing}'"));
    assert_eq!(flaky.calls(), 0);

    let a = engine.get_execution(&execution.id).unwrap().node("A").cloned().unwrap();
    assert_eq!(a.status, NodeRunStatus::Failed);
    assert_eq!(a.retry_attempt, 0);
    engine.shutdown();
}

#[test]
fn engine_skipped_branch_does_not_block_siblings() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "fan-out",
        "name": "fan out",
        "status": "active",
        "nodes": [
            { "id": "P", "type": "parallel" },
            { "id": "X", "type": "agent", "agent_id": "echo", "skill": "echo" },
            { "id": "Y", "type": "agent", "agent_id": "echo", "skill": "echo", "input": { "tier": "${trigger_data.tier}" } }
        ],
        "edges": [
            { "from": "P", "to": "X", "condition": { "type": "equals", "field": "trigger_data.tier", "value": "platinum" } },
            { "from": "P", "to": "Y" }
        ]
    }));
    let execution = engine.start(&def, trigger(json!({"tier": "gold"}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let detail = engine.get_execution(&execution.id).unwrap();
    assert_eq!(detail.node("X").unwrap().status, NodeRunStatus::Skipped);
    assert_eq!(detail.node("Y").unwrap().status, NodeRunStatus::Completed);
    assert_eq!(detail.node("Y").unwrap().output_snapshot, json!({"tier": "gold"}));
    engine.shutdown();
}

#[test]
fn engine_merge_waits_for_all_predecessors() {
    let registry = registry();
    registry.register(
        "slow",
        Arc::new(Echo {
            delay: Duration::from_millis(300),
        }),
    );
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "merge-wait",
        "name": "merge wait",
        "status": "active",
        "nodes": [
            { "id": "T", "type": "trigger" },
            { "id": "fast", "type": "agent", "agent_id": "echo", "skill": "echo", "input": { "a": 1 } },
            { "id": "slow", "type": "agent", "agent_id": "slow", "skill": "echo", "input": { "b": 2 } },
            { "id": "M", "type": "merge" },
            { "id": "agg", "type": "action", "action": "aggregate_results", "input": { "fast": "${fast}", "slow": "${slow}", "vendor": "${T.vendor}" } }
        ],
        "edges": [
            { "from": "T", "to": "fast" },
            { "from": "T", "to": "slow" },
            { "from": "fast", "to": "M" },
            { "from": "slow", "to": "M" },
            { "from": "M", "to": "agg" }
        ]
    }));
    let execution = engine.start(&def, trigger(json!({"vendor": "acme"}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let detail = engine.get_execution(&execution.id).unwrap();
    let slow = detail.node("slow").unwrap();
    let merge = detail.node("M").unwrap();
    assert!(merge.started_at >= slow.completed_at.unwrap());
    assert!(merge.started_at >= detail.node("fast").unwrap().completed_at.unwrap());

    assert_eq!(detail.node("agg").unwrap().output_snapshot, json!({"results": {"fast": {"a": 1}, "slow": {"b": 2}, "vendor": "acme"}}));
    engine.shutdown();
}

#[test]
fn engine_node_with_all_incoming_edges_skipped_is_skipped() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "all-skipped",
        "name": "all skipped",
        "status": "active",
        "nodes": [
            { "id": "check", "type": "condition", "condition": { "type": "exists", "field": "trigger_data.flag" } },
            { "id": "X", "type": "agent", "agent_id": "echo", "skill": "echo" },
            { "id": "Y", "type": "agent", "agent_id": "echo", "skill": "echo" },
            { "id": "M", "type": "merge" },
            { "id": "after", "type": "agent", "agent_id": "echo", "skill": "echo" },
            { "id": "partial", "type": "merge" }
        ],
        "edges": [
            { "from": "check", "to": "X", "condition": { "type": "equals", "field": "condition_result", "value": true } },
            { "from": "check", "to": "Y", "condition": { "type": "equals", "field": "condition_result", "value": true } },
            { "from": "X", "to": "M" },
            { "from": "Y", "to": "M" },
            { "from": "M", "to": "after" },
            { "from": "check", "to": "partial" },
            { "from": "X", "to": "partial" }
        ]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let detail = engine.get_execution(&execution.id).unwrap();
    for nid in ["X", "Y", "M", "after"] {
        assert_eq!(detail.node(nid).unwrap().status, NodeRunStatus::Skipped, "node {}", nid);
    }
    // one taken edge is enough
    assert_eq!(detail.node("partial").unwrap().status, NodeRunStatus::Completed);
    engine.shutdown();
}

#[test]
fn engine_retry_creates_new_execution() {
    let flaky = Flaky::new(1, true);
    let registry = registry();
    registry.register("flaky", flaky.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "manual-retry",
        "name": "manual retry",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "flaky", "skill": "run", "input": { "vendor": "${trigger_data.vendor}" } }]
    }));
    let failed = engine.start(&def, trigger(json!({"vendor": "acme"}))).unwrap();
    assert_eq!(failed.status, ExecutionStatus::Failed);
    let failed_detail = engine.get_execution(&failed.id).unwrap();

    let retry_id = engine.retry(&failed.id).unwrap();
    assert_ne!(retry_id, failed.id);
    let retried = engine.wait(&retry_id).unwrap();
    assert_eq!(retried.status, ExecutionStatus::Completed);
    assert_eq!(retried.retry_of.as_deref(), Some(failed.id.as_str()));
    assert_eq!(retried.trigger_data, json!({"vendor": "acme"}));
    assert_eq!(retried.context_id.as_deref(), Some("vendor-42"));

    let original = engine.get_execution(&failed.id).unwrap();
    assert_eq!(original.execution, failed_detail.execution);
    assert_eq!(original.nodes, failed_detail.nodes);

    assert!(matches!(engine.retry(&retry_id), Err(FlowError::Execution(_))));
    assert_eq!(engine.list_executions("manual-retry").unwrap().len(), 2);
    engine.shutdown();
}

#[test]
fn engine_admission_rejects_over_limit() {
    let registry = registry();
    registry.register(
        "slow",
        Arc::new(Echo {
            delay: Duration::from_millis(500),
        }),
    );
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "admission",
        "name": "admission",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "slow", "skill": "run" }],
        "settings": { "max_concurrent_executions": 1 }
    }));
    engine.deploy(&def).unwrap();

    let first = engine.execute("admission", trigger(json!({}))).unwrap();
    assert_eq!(engine.running_executions("admission"), 1);
    assert!(matches!(engine.execute("admission", trigger(json!({}))), Err(FlowError::Admission(_))));
    assert_eq!(engine.list_executions("admission").unwrap().len(), 1);

    assert_eq!(engine.wait(&first).unwrap().status, ExecutionStatus::Completed);
    let second = engine.execute("admission", trigger(json!({}))).unwrap();
    assert_eq!(engine.wait(&second).unwrap().status, ExecutionStatus::Completed);
    engine.shutdown();
}

#[test]
fn engine_cancel_marks_execution_cancelled() {
    let registry = registry();
    registry.register(
        "slow",
        Arc::new(Echo {
            delay: Duration::from_secs(10),
        }),
    );
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "cancel",
        "name": "cancel",
        "status": "active",
        "nodes": [
            { "id": "A", "type": "agent", "agent_id": "slow", "skill": "run" },
            { "id": "B", "type": "agent", "agent_id": "echo", "skill": "echo" }
        ],
        "edges": [{ "from": "A", "to": "B" }]
    }));
    engine.deploy(&def).unwrap();

    let started = Instant::now();
    let id = engine.execute("cancel", trigger(json!({}))).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.cancel(&id).unwrap();

    let execution = engine.wait(&id).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert_eq!(execution.error_message.as_deref(), Some("execution cancelled: cancelled by caller"));

    let detail = engine.get_execution(&id).unwrap();
    assert_eq!(detail.node("A").unwrap().status, NodeRunStatus::Failed);
    assert!(detail.node("B").is_none());

    assert!(engine.cancel(&id).is_err());
    engine.shutdown();
}

#[test]
fn engine_resolves_env_and_context() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "context",
        "name": "context",
        "status": "active",
        "nodes": [
            { "id": "A", "type": "action", "action": "passthrough", "input": {
                "region": "${env.region}",
                "flow": "${context.flow_id}",
                "node": "${context.node_id}",
                "label": "${trigger_data.vendor}@${env.region}"
            } }
        ]
    }));
    let execution = engine.start(&def, trigger(json!({"vendor": "acme"}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let a = engine.get_execution(&execution.id).unwrap().node("A").cloned().unwrap();
    assert_eq!(a.output_snapshot, json!({"region": "eu-west", "flow": "context", "node": "A", "label": "acme@eu-west"}));
    engine.shutdown();
}

#[test]
fn engine_delay_suspends_branch() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "delay",
        "name": "delay",
        "status": "active",
        "nodes": [
            { "id": "wait", "type": "delay", "duration_seconds": 0.3 },
            { "id": "A", "type": "agent", "agent_id": "echo", "skill": "echo" }
        ],
        "edges": [{ "from": "wait", "to": "A" }]
    }));
    let started = Instant::now();
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(execution.status, ExecutionStatus::Completed);
    engine.shutdown();
}

#[test]
fn engine_inactive_flow_is_not_executed() {
    let engine = create_engine(registry());

    let mut def = scoring_flow();
    def.status = agentflow::FlowStatus::Draft;
    engine.deploy(&def).unwrap();

    assert!(matches!(engine.execute(&def.id, trigger(json!({}))), Err(FlowError::Execution(_))));
    assert!(matches!(engine.execute("unknown", trigger(json!({}))), Err(FlowError::Execution(_))));
    engine.shutdown();
}

#[test]
fn engine_requires_launch() {
    let engine = EngineBuilder::new().config(config()).build().unwrap();
    assert!(matches!(engine.execute("any", trigger(json!({}))), Err(FlowError::Engine(_))));
}

#[test]
fn engine_sends_notifications_after_completion() {
    let notifier = Arc::new(CollectingNotifier::default());
    let engine = EngineBuilder::new().config(config()).invoker(Arc::new(registry())).notifier(notifier.clone()).build().unwrap();
    engine.launch();

    let def = flow(json!({
        "id": "notify",
        "name": "notify",
        "status": "active",
        "nodes": [{
            "id": "A", "type": "agent", "agent_id": "echo", "skill": "echo",
            "input": { "ok": true },
            "notify": [{ "type": "webhook", "url": "http://hooks.local/review" }],
            "customAttributes": { "queue": "compliance" }
        }]
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let deadline = Instant::now() + Duration::from_secs(2);
    while notifier.sent.lock().unwrap().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (target, notification) = &sent[0];
    assert_eq!(
        *target,
        NotifyTarget::Webhook {
            url: "http://hooks.local/review".to_string()
        }
    );
    assert_eq!(notification.node_id, "A");
    assert_eq!(notification.execution_id, execution.id);
    assert_eq!(notification.output, json!({"ok": true}));
    assert_eq!(notification.custom_attributes["queue"], "compliance");
    drop(sent);
    engine.shutdown();
}

#[test]
fn engine_publishes_completion_events() {
    let engine = create_engine(registry());

    let (tx, rx) = flume::unbounded();
    ChannelEvent::channel(engine.channel(), ChannelOptions::default()).unwrap().on_complete(move |id| {
        let _ = tx.send(id);
    });

    let (node_tx, node_rx) = flume::unbounded();
    ChannelEvent::channel(engine.channel(), ChannelOptions::with_nid("C")).unwrap().on_event(move |e| {
        let _ = node_tx.send(e.nid.clone());
    });

    let execution = engine.start(&scoring_flow(), trigger(json!({"score": 90}))).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), execution.id);
    assert_eq!(node_rx.recv_timeout(Duration::from_secs(2)).unwrap(), "C");
    engine.shutdown();
}

#[test]
fn engine_node_timeout_is_retried() {
    let stalled = Arc::new(Stalled::default());
    let registry = registry();
    registry.register("stalled", stalled.clone());
    let engine = create_engine(registry);

    let def = flow(json!({
        "id": "node-timeout",
        "name": "node timeout",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "stalled", "skill": "run", "timeout_seconds": 1, "retry": { "enabled": true, "count": 1 } }]
    }));
    let started = Instant::now();
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(stalled.calls.load(Ordering::SeqCst), 2);
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.as_deref().unwrap().contains("attempt timed out after 1 seconds"));

    let a = engine.get_execution(&execution.id).unwrap().node("A").cloned().unwrap();
    assert_eq!(a.status, NodeRunStatus::Failed);
    assert_eq!(a.retry_attempt, 1);
    assert!(a.error_message.unwrap().contains("timed out"));
    engine.shutdown();
}

#[test]
fn engine_unbounded_flow_timeout_runs_to_completion() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "far-deadline",
        "name": "far deadline",
        "status": "active",
        "nodes": [{ "id": "A", "type": "agent", "agent_id": "echo", "skill": "echo", "input": { "ok": true } }],
        "settings": { "timeout_seconds": u64::MAX }
    }));
    let execution = engine.start(&def, trigger(json!({}))).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.completed_at.is_some());
    assert_eq!(engine.running_executions("far-deadline"), 0);
    engine.shutdown();
}

#[test]
fn engine_rejects_out_of_range_delay_on_deploy() {
    let engine = create_engine(registry());

    let def = flow(json!({
        "id": "endless-delay",
        "name": "endless delay",
        "status": "active",
        "nodes": [{ "id": "wait", "type": "delay", "duration_days": 1e15 }]
    }));
    assert!(matches!(engine.deploy(&def), Err(FlowError::Validation(_))));
    assert!(matches!(engine.start(&def, trigger(json!({}))), Err(FlowError::Validation(_))));
    assert!(engine.list_executions("endless-delay").unwrap().is_empty());
    engine.shutdown();
}
