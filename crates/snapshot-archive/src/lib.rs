//! Daily archive of condensed market views.
//!
//! One immutable JSON file per business date, pruned by a tiered retention
//! policy so recent days stay dense and older history thins out.

pub mod archive;
pub mod error;
pub mod history;
pub mod retention;

pub use archive::{ArchiveOutcome, Archiver, SweepReport};
pub use error::ArchiveError;
pub use history::{build_sector_trends, format_history_context, SectorTrend};
pub use retention::{RetentionPolicy, Verdict};
