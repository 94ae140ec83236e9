//! Flow engine - the main entry point for agentflow.
//!
//! The engine manages the lifecycle of flows and executions, including:
//! - Deploying and validating flow definitions
//! - Admitting, running, cancelling and retrying executions
//! - Managing the event channel and storage
//! - Graceful shutdown coordination

mod admission;
mod tracker;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info};

use crate::{
    Config, FlowError, Result, StoreType,
    capability::{CapabilityInvoker, CapabilityRegistry},
    common::MemCache,
    dispatcher::{DispatchOutcome, Dispatcher, NodeRunner},
    model::FlowDefinition,
    notify::{NoopNotifier, Notifier},
    runtime::{Channel, Context, ExecutionHandle},
    store::{
        DbStore, MemStore, PostgresStore, Query, Store,
        data::{ExecutionStatus, FlowExecution, FlowNodeExecution},
    },
    utils,
    workflow::Workflow,
};

use admission::Admission;
pub(crate) use tracker::Tracker;

/// Reason attached to caller initiated cancellation.
const CANCEL_REASON: &str = "cancelled by caller";

/// What an execution is started with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trigger {
    pub tenant_id: String,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub context_type: Option<String>,
    #[serde(default)]
    pub trigger_data: Value,
}

impl Trigger {
    pub fn new(
        tenant_id: &str,
        trigger_data: Value,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            context_id: None,
            context_type: None,
            trigger_data,
        }
    }

    pub fn with_context(
        mut self,
        context_id: &str,
        context_type: &str,
    ) -> Self {
        self.context_id = Some(context_id.to_string());
        self.context_type = Some(context_type.to_string());
        self
    }
}

/// An execution together with its node execution records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionDetail {
    pub execution: FlowExecution,
    pub nodes: Vec<FlowNodeExecution>,
}

impl ExecutionDetail {
    /// The record of `node_id`, if the node was reached.
    pub fn node(
        &self,
        node_id: &str,
    ) -> Option<&FlowNodeExecution> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

/// The flow engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().invoker(Arc::new(registry)).build()?;
/// engine.launch();
///
/// engine.deploy(&flow)?;
/// let id = engine.execute(&flow.id, Trigger::new("tenant-1", json!({"vendor": "acme"})))?;
/// let execution = engine.wait(&id)?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Config,
    /// Event channel for broadcasting execution events.
    channel: Arc<Channel>,
    /// Persistent storage for flows and executions.
    store: Arc<Store>,
    invoker: Arc<dyn CapabilityInvoker>,
    notifier: Arc<dyn Notifier>,
    admission: Arc<Admission>,
    /// Handles of the executions that have not finished yet.
    procs: Arc<MemCache<String, Arc<ExecutionHandle>>>,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
}

impl Engine {
    /// Creates a new engine on `runtime`.
    ///
    /// This initializes the storage backend (memory or PostgreSQL) and the
    /// event channel.
    pub fn new(
        config: Config,
        runtime: Arc<Runtime>,
        invoker: Arc<dyn CapabilityInvoker>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = config.store.postgres.as_ref().ok_or_else(|| FlowError::Config("postgres configuration is required when store type is postgres".to_string()))?;
                Box::new(PostgresStore::new(&postgres.database_url, runtime.clone())?)
            }
        };
        db.init(&store)?;

        Ok(Self {
            channel: Arc::new(Channel::new(runtime.clone())),
            store: Arc::new(store),
            invoker,
            notifier,
            admission: Admission::new(),
            procs: Arc::new(MemCache::new()),
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            config,
        })
    }

    /// Creates an engine with its own runtime, no capabilities and no notifier.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.async_worker_thread_number.max(1).into())
            .enable_all()
            .build()
            .map_err(|e| FlowError::Engine(format!("failed to build runtime: {}", e)))?;

        Self::new(config, Arc::new(runtime), Arc::new(CapabilityRegistry::new()), Arc::new(NoopNotifier))
    }

    /// Starts the engine and begins dispatching events.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.channel.listen();
        info!("engine launched");
    }

    /// Gracefully shuts down the engine.
    ///
    /// Running executions are cancelled and the event channel stops.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        for (_, handle) in self.procs.iter() {
            debug!(execution_id = handle.id(), flow_id = handle.flow_id(), "cancelling execution on shutdown");
            handle.cancel("engine shutdown");
        }
        self.channel.shutdown();
        info!("engine shutdown");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Validates and stores a flow definition, replacing an earlier version.
    ///
    /// Executions already running keep the definition they started with.
    pub fn deploy(
        &self,
        flow: &FlowDefinition,
    ) -> Result<bool> {
        Workflow::try_from(flow)?;
        self.store.deploy(flow)
    }

    /// Starts an execution of an active, deployed flow and returns its id.
    ///
    /// The execution runs in the background. Node failures are recorded on
    /// the execution and never returned here.
    pub fn execute(
        &self,
        flow_id: &str,
        trigger: Trigger,
    ) -> Result<String> {
        self.ensure_running()?;

        let flow = self.find_flow(flow_id)?;
        if !flow.is_active() {
            return Err(FlowError::Execution(format!("flow '{}' is not active", flow_id)));
        }

        self.run_execution(flow, trigger, None)
    }

    /// Deploys `flow`, executes it and waits for the terminal record.
    pub fn start(
        &self,
        flow: &FlowDefinition,
        trigger: Trigger,
    ) -> Result<FlowExecution> {
        self.deploy(flow)?;
        let id = self.execute(&flow.id, trigger)?;
        self.wait(&id)
    }

    /// Runs a failed execution again as a new execution.
    ///
    /// The original records are left untouched, the new record points back
    /// through `retry_of`.
    pub fn retry(
        &self,
        execution_id: &str,
    ) -> Result<String> {
        self.ensure_running()?;

        let original = self.find_execution(execution_id)?;
        if original.status != ExecutionStatus::Failed {
            return Err(FlowError::Execution(format!("execution '{}' is {}, only failed executions can be retried", execution_id, original.status.as_ref())));
        }

        let flow = self.find_flow(&original.flow_id)?;
        let trigger = Trigger {
            tenant_id: original.tenant_id,
            context_id: original.context_id,
            context_type: original.context_type,
            trigger_data: original.trigger_data,
        };

        self.run_execution(flow, trigger, Some(original.id))
    }

    /// Cancels a running execution.
    pub fn cancel(
        &self,
        execution_id: &str,
    ) -> Result<()> {
        match self.procs.get(&execution_id.to_string()) {
            Some(handle) => {
                handle.cancel(CANCEL_REASON);
                Ok(())
            }
            None => Err(FlowError::Execution(format!("execution '{}' is not running", execution_id))),
        }
    }

    /// Blocks until the execution is terminal and returns its record.
    pub fn wait(
        &self,
        execution_id: &str,
    ) -> Result<FlowExecution> {
        utils::block_on(&self.runtime, self.wait_async(execution_id))
    }

    pub async fn wait_async(
        &self,
        execution_id: &str,
    ) -> Result<FlowExecution> {
        if let Some(handle) = self.procs.get(&execution_id.to_string()) {
            handle.wait().await;
        }
        self.find_execution(execution_id)
    }

    /// The execution record and all of its node execution records.
    pub fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionDetail> {
        Ok(ExecutionDetail {
            execution: self.find_execution(execution_id)?,
            nodes: self.store.list_node_executions(execution_id)?,
        })
    }

    /// Executions of a flow, newest first.
    pub fn list_executions(
        &self,
        flow_id: &str,
    ) -> Result<Vec<FlowExecution>> {
        let q = Query::new().eq("flow_id", flow_id).order("started_at", true);
        Ok(self.store.executions().query(&q)?.rows)
    }

    /// Number of executions of `flow_id` currently admitted.
    pub fn running_executions(
        &self,
        flow_id: &str,
    ) -> u32 {
        self.admission.running(flow_id)
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    fn ensure_running(&self) -> Result<()> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(FlowError::Engine("engine is not running".to_string()));
        }
        Ok(())
    }

    fn find_flow(
        &self,
        flow_id: &str,
    ) -> Result<FlowDefinition> {
        self.store.find_flow(flow_id).map_err(|_| FlowError::Execution(format!("flow '{}' not found", flow_id)))
    }

    fn find_execution(
        &self,
        execution_id: &str,
    ) -> Result<FlowExecution> {
        self.store.executions().find(execution_id).map_err(|_| FlowError::Execution(format!("execution '{}' not found", execution_id)))
    }

    fn run_execution(
        &self,
        flow: FlowDefinition,
        trigger: Trigger,
        retry_of: Option<String>,
    ) -> Result<String> {
        let workflow = Arc::new(Workflow::try_from(&flow)?);
        let permit = self.admission.acquire(&flow.id, flow.settings.max_concurrent_executions)?;

        let now = utils::time::time_millis();
        let execution = FlowExecution {
            id: utils::uuid(),
            flow_id: flow.id.clone(),
            tenant_id: trigger.tenant_id.clone(),
            status: ExecutionStatus::Pending,
            trigger_data: trigger.trigger_data.clone(),
            context_id: trigger.context_id.clone(),
            context_type: trigger.context_type.clone(),
            current_node_id: None,
            error_message: None,
            retry_of,
            started_at: now,
            completed_at: None,
            duration_ms: None,
            timestamp: now,
        };
        self.store.executions().create(&execution)?;

        let execution_id = execution.id.clone();
        let handle = ExecutionHandle::new(&execution_id, &flow.id);
        self.procs.set(execution_id.clone(), handle.clone());

        let ctx = Arc::new(Context::new(&execution_id, &flow.id, &trigger.tenant_id, trigger.trigger_data, self.invoker.clone()));
        for (key, value) in self.config.env.iter() {
            ctx.env().set(key.clone(), value.clone());
        }

        let tracker = Arc::new(Tracker::new(self.store.clone(), self.channel.clone(), execution));
        let runner = Arc::new(NodeRunner::new(ctx.clone(), tracker.clone(), self.notifier.clone(), &flow.settings, Duration::from_millis(self.config.retry_backoff_base_ms)));
        let dispatcher = Dispatcher::new(
            ctx,
            workflow,
            runner,
            tracker.clone(),
            handle.command_queue(),
            flow.settings.timeout_seconds,
            Duration::from_millis(self.config.cancel_grace_ms),
        );

        info!(execution_id = %execution_id, flow_id = %flow.id, "execution started");
        let procs = self.procs.clone();
        self.runtime.spawn(async move {
            let outcome = supervise(handle.id(), dispatcher.run()).await;
            let record = tracker.finish(&outcome);
            info!(execution_id = %record.id, status = record.status.as_ref(), duration_ms = ?record.duration_ms, "execution finished");

            drop(permit);
            procs.remove(&handle.id().to_string());
            handle.finish();
            debug!(execution_id = %record.id, "execution handle released");
        });

        Ok(execution_id)
    }
}

/// Run the dispatcher on its own task so a panic still yields an outcome.
async fn supervise<F>(
    execution_id: &str,
    dispatch: F,
) -> DispatchOutcome
where
    F: Future<Output = DispatchOutcome> + Send + 'static,
{
    match tokio::spawn(dispatch).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(execution_id, error = %err, "dispatcher task aborted");
            DispatchOutcome::Failed(format!("dispatcher aborted: {}", err))
        }
    }
}
