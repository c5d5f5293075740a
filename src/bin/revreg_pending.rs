//! revreg-pending: Pending revocation report
//!
//! Lists revocation registry records that still carry unpublished
//! credential revocations, e.g. after a crash between staging a revocation
//! and writing its delta to the ledger.
//!
//! ## Configuration
//! - REVREG_CONFIG / `--config <path>`: YAML configuration file
//! - REVREG__STORAGE__TYPE: `memory` or `sqlite` (default: sqlite)
//! - REVREG_LOG: tracing filter (default: info)
//!
//! Publishing needs issuer and ledger access; this binary only reads the
//! record store.

use tracing::{info, warn};

use revreg::config::Config;
use revreg::services::RecordQueryService;
use revreg::storage::init_storage;
use revreg::utils::bootstrap::{init_tracing, parse_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path(std::env::args().skip(1));
    let config = Config::load(config_path.as_deref())?;

    let store = init_storage(&config.storage).await?;
    let queries = RecordQueryService::new(store);

    let pending = queries.find_pending().await?;
    if pending.is_empty() {
        info!("No pending revocations");
        return Ok(());
    }

    for record in &pending {
        warn!(
            record_id = %record.record_id(),
            sequence_id = %record.sequence_id(),
            cred_def_id = record.cred_def_id().unwrap_or_default(),
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            state = %record.state(),
            pending = ?record.pending_pub(),
            "Pending revocations awaiting publication"
        );
    }
    info!(records = pending.len(), "Pending revocation report finished");

    Ok(())
}
