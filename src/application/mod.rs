// Application layer: the ledger service owns every mutation, the query
// service every read. Both share one repository handle.

pub mod error;
pub mod ledger;
pub mod query;

pub use error::*;
pub use ledger::*;
pub use query::*;

use crate::storage::Repository;

/// The two services over a single database, as handed to a front end.
pub struct Services {
    pub ledger: LedgerService,
    pub query: QueryService,
}

impl Services {
    pub fn new(repo: Repository) -> Self {
        Self {
            ledger: LedgerService::new(repo.clone()),
            query: QueryService::new(repo),
        }
    }

    /// Create (if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let repo = Repository::init(&database_url(database_path)).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let repo = Repository::connect(&database_url(database_path), false).await?;
        Ok(Self::new(repo))
    }
}

fn database_url(database_path: &str) -> String {
    format!("sqlite:{}", database_path)
}
