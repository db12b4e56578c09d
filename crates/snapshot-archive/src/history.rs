use chrono::NaiveDate;
use pulse_core::{ArchiveSnapshot, SectorSignal};
use serde::{Deserialize, Serialize};

/// Sectors listed per day in the history context
const SECTORS_PER_DAY: usize = 5;

/// Heat series of one sector, oldest point first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorTrend {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub heat: Vec<u8>,
}

/// Compress recent snapshots into a short text block, one line per day.
///
/// `history` is expected newest first, as returned by `Archiver::load_history`.
/// Returns `None` when there is nothing to say.
pub fn format_history_context(history: &[ArchiveSnapshot]) -> Option<String> {
    let lines: Vec<String> = history
        .iter()
        .map(|snapshot| {
            let mut sectors: Vec<_> = snapshot.sectors.iter().collect();
            sectors.sort_by(|a, b| b.heat.cmp(&a.heat));
            let top = sectors
                .iter()
                .take(SECTORS_PER_DAY)
                .map(|s| format!("{}{}{}", s.name, s.direction.arrow(), s.heat))
                .collect::<Vec<_>>()
                .join(" ");

            let sentiment = if snapshot.sentiment.trim().is_empty() {
                "-"
            } else {
                snapshot.sentiment.trim()
            };

            if top.is_empty() {
                format!("{} 情绪:{}", snapshot.date, sentiment)
            } else {
                format!("{} 情绪:{} 板块:{}", snapshot.date, sentiment, top)
            }
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Heat series for each current sector across the history window.
///
/// Points run oldest to newest and end with `today` carrying the current
/// heat. A day on which the sector was absent contributes 0. A snapshot
/// dated `today` is superseded by the current report.
pub fn build_sector_trends(
    history: &[ArchiveSnapshot],
    current: &[SectorSignal],
    today: NaiveDate,
) -> Vec<SectorTrend> {
    let mut past: Vec<&ArchiveSnapshot> = history.iter().filter(|s| s.date < today).collect();
    past.sort_by_key(|s| s.date);

    let mut dates: Vec<NaiveDate> = past.iter().map(|s| s.date).collect();
    dates.push(today);

    current
        .iter()
        .map(|signal| {
            let mut heat: Vec<u8> = past
                .iter()
                .map(|snapshot| {
                    snapshot
                        .sectors
                        .iter()
                        .find(|s| s.name == signal.name)
                        .map(|s| s.heat)
                        .unwrap_or(0)
                })
                .collect();
            heat.push(signal.heat);

            SectorTrend {
                name: signal.name.clone(),
                dates: dates.clone(),
                heat,
            }
        })
        .collect()
}
