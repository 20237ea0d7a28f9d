//! Global, shared, immutable-after-boot server state: the two read-only
//! catalogs, the data store they were loaded from, and the
//! dispatch/worker/persistence machinery every connection shares.

use crate::config::RuntimeConfig;
use crate::datastore::DataStore;
use crate::definitions::DefinitionManager;
use crate::dispatch::{Dispatcher, WorkerPool};
use crate::error::BootError;
use crate::persistence::{Persistence, TransactionQueue};
use crate::serverdata::script::NullScriptHost;
use crate::serverdata::{self, ServerDataManager};
use std::sync::Arc;

pub struct GlobalState {
    pub config: RuntimeConfig,
    pub data_store: Arc<DataStore>,
    pub definitions: Arc<DefinitionManager>,
    pub server_data: Arc<ServerDataManager>,
    pub dispatcher: Dispatcher,
    pub worker_pool: Arc<WorkerPool>,
    pub transaction_queue: Arc<TransactionQueue>,
    pub persistence: Arc<dyn Persistence>,
}

impl GlobalState {
    /// Loads the definition catalog and the server-data catalog from
    /// `config`'s data-store search paths, in fixed order: binary tables,
    /// then the XML overlay categories (`tokusei`, `s_status`,
    /// `enchant_set`, `enchant_special`) registered into the
    /// still-mutable `DefinitionManager`, then every remaining
    /// `serverdata::LOAD_ORDER` category registered into the
    /// `ServerDataManager` that holds an `Arc` back to those now-frozen
    /// definitions. No real script interpreter is wired up yet, so
    /// `scripts` loads through [`NullScriptHost`] — a deployment with no
    /// `.nut` files boots clean; one with any fails loudly rather than
    /// silently skipping them.
    pub fn boot(
        config: RuntimeConfig,
        persistence: Arc<dyn Persistence>,
        dispatcher: Dispatcher,
    ) -> Result<Arc<Self>, BootError> {
        let data_store = Arc::new(DataStore::new(config.data_store_paths.clone()));

        let mut definitions = DefinitionManager::load(&data_store)?;
        serverdata::load_overlays(&data_store, &mut definitions)?;
        let definitions = Arc::new(definitions);

        let mut server_data = ServerDataManager::new(definitions.clone());
        serverdata::load_zones_and_partials(&data_store, &mut server_data)?;
        serverdata::load_remaining_categories(&data_store, &mut server_data)?;
        serverdata::load_scripts(&data_store, &NullScriptHost, &mut server_data)?;
        let server_data = Arc::new(server_data);

        let worker_threads = config.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });

        Ok(Arc::new(Self {
            config,
            data_store,
            definitions,
            server_data,
            dispatcher,
            worker_pool: Arc::new(WorkerPool::new(worker_threads)),
            transaction_queue: Arc::new(TransactionQueue::new()),
            persistence,
        }))
    }
}
