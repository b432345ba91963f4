//! Fragment table migration runner for ystore.
//!
//! Provisions the relational backend out of band, before any worker starts.
//!
//! Usage:
//!   migrator up      - Create the fragments table
//!   migrator down    - Drop the fragments table
//!   migrator status  - Show migration status
//!
//! The connection string is read from `DATABASE_URL`.

use sea_orm_migration::prelude::*;
use ystore_db::migration::Migrator;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Run the migrator CLI (it sets up its own tracing)
    cli::run_cli(Migrator).await;
}
