use std::sync::Arc;

use db::Store;
use queue::JobQueue;
use sink_client::SinkClient;
use source_client::SourceClient;
use utils::config::Settings;

/// Shared, cloneable handle every route extracts via `State`. Cloning is
/// an `Arc` bump, not a deep copy -- the clients, store and queue are
/// each already safe for concurrent use on their own.
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

struct Inner {
    source: Arc<dyn SourceClient>,
    sink: Arc<dyn SinkClient>,
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    settings: Settings,
}

impl AppState {
    pub fn new(
        source: Arc<dyn SourceClient>,
        sink: Arc<dyn SinkClient>,
        store: Arc<dyn Store>,
        queue: Arc<dyn JobQueue>,
        settings: Settings,
    ) -> Self {
        Self(Arc::new(Inner { source, sink, store, queue, settings }))
    }

    pub fn source(&self) -> &dyn SourceClient {
        self.0.source.as_ref()
    }

    pub fn sink(&self) -> &dyn SinkClient {
        self.0.sink.as_ref()
    }

    pub fn store(&self) -> &dyn Store {
        self.0.store.as_ref()
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.0.queue.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.0.settings
    }

    pub fn worker(&self) -> worker::Worker<'_> {
        worker::Worker {
            source: self.source(),
            sink: self.sink(),
            store: self.store(),
            settings: self.settings(),
        }
    }

    pub fn reconciler(&self) -> reconciler::Reconciler<'_> {
        reconciler::Reconciler {
            source: self.source(),
            sink: self.sink(),
            store: self.store(),
            settings: self.settings(),
        }
    }
}
