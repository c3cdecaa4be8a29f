use derive_new::new;

use crate::database::Database;

/// Shared by every handler. Each request borrows the database handle from here and passes it down explicitly.
#[derive(Debug, Clone, new)]
pub struct App {
    pub database: Database,
}
