use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use globset::{Glob, GlobMatcher};
use tokio::runtime::Runtime;

use crate::{
    FlowError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Message},
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap().clone();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().unwrap().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;

pub type ExecutionEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type ExecutionEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the execution id
    /// eg. exec1*
    pub execution_id: String,

    /// use the glob pattern to match the node id
    /// eg. review_*
    pub nid: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            execution_id: "*".to_string(),
            nid: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        execution_id: &str,
        nid: &str,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            nid: nid.to_string(),
        }
    }

    pub fn with_execution_id(execution_id: &str) -> Self {
        Self::new(execution_id, "*")
    }

    pub fn with_nid(nid: &str) -> Self {
        Self::new("*", nid)
    }
}

/// In-process pub/sub for execution events.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,

    events: ShareLock<Vec<ExecutionEventHandle>>,
    events_async: ShareLock<Vec<ExecutionEventHandleAsync>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Publish a message. Dropped silently while nobody listens.
    pub(crate) fn emit(
        &self,
        msg: Message,
    ) {
        let _ = self.event_queue.send(Event::new(&msg));
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// A filtered view of the [`Channel`] used to register handlers.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (GlobMatcher, GlobMatcher),
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let matcher = |pattern: &str| Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| FlowError::Engine(format!("invalid channel pattern '{}': {}", pattern, e)));

        Ok(Self {
            glob: (matcher(&options.execution_id)?, matcher(&options.nid)?),
            channel,
        })
    }

    /// Called with the execution id when an execution completes successfully.
    pub fn on_complete(
        &self,
        f: impl Fn(String) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, e) {
                f(e.execution_id.clone());
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.events_async.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }
}

fn is_match(
    glob: &(GlobMatcher, GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_execution, pat_nid) = glob;
    pat_execution.is_match(&e.execution_id) && pat_nid.is_match(&e.nid)
}
