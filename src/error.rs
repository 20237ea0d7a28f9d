//! Boot-time error aggregation. Anything that fails before the server
//! starts accepting connections is fatal; `main` maps `BootError` to a
//! non-zero exit code.

use crate::datastore::DataStoreError;
use crate::definitions::DefinitionError;
use crate::serverdata::ServerDataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    DataStore(#[from] DataStoreError),
    #[error(transparent)]
    Definitions(#[from] DefinitionError),
    #[error(transparent)]
    ServerData(#[from] ServerDataError),
    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}
