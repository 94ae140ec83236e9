use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    Config, Engine, FlowError, Result,
    capability::{CapabilityInvoker, CapabilityRegistry},
    notify::{NoopNotifier, Notifier},
};

#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    invoker: Option<Arc<dyn CapabilityInvoker>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Where capability calls of agent nodes go. Defaults to an empty [`CapabilityRegistry`].
    pub fn invoker(
        mut self,
        invoker: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Receives node notifications. Defaults to [`NoopNotifier`].
    pub fn notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(&self) -> Result<Engine> {
        let runtime = match &self.rt {
            Some(rt) => rt.clone(),
            None => Arc::new(
                Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.max(1).into())
                    .enable_all()
                    .build()
                    .map_err(|e| FlowError::Engine(format!("failed to build runtime: {}", e)))?,
            ),
        };
        let invoker = self.invoker.clone().unwrap_or_else(|| Arc::new(CapabilityRegistry::new()));
        let notifier = self.notifier.clone().unwrap_or_else(|| Arc::new(NoopNotifier));

        Engine::new(self.config.clone(), runtime, invoker, notifier)
    }
}
