use market_data::{MarketDataService, SectorShortlist};
use pulse_core::{Direction, InstrumentSummary, SectorSignal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bullish sectors at or above this heat count towards the overheat alert
const OVERHEAT_MIN_HEAT: u8 = 4;
const OVERHEAT_MIN_CONFIDENCE: u8 = 80;

/// A report sector together with the instruments that track it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSector {
    pub name: String,
    /// Index sector the name resolved to, when any
    pub matched: Option<String>,
    pub heat: u8,
    pub direction: Direction,
    pub instruments: Vec<InstrumentSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverheatAlert {
    pub level: String,
    pub note: String,
    pub count: usize,
}

/// Look up instruments for every sector named in the report.
pub async fn enrich_sectors(
    market: &MarketDataService,
    sectors: &[SectorSignal],
    per_sector: usize,
) -> Vec<EnrichedSector> {
    let names: Vec<String> = sectors.iter().map(|s| s.name.clone()).collect();
    let shortlists = market.sector_shortlist(&names, per_sector).await;
    let enriched = attach_shortlists(sectors, shortlists);
    tracing::info!(
        "Enriched {}/{} sectors with instruments",
        enriched.iter().filter(|s| !s.instruments.is_empty()).count(),
        enriched.len()
    );
    enriched
}

/// Pair report sectors with shortlists by requested name, keeping report order.
pub fn attach_shortlists(sectors: &[SectorSignal], shortlists: Vec<SectorShortlist>) -> Vec<EnrichedSector> {
    let mut by_name: HashMap<String, SectorShortlist> = shortlists
        .into_iter()
        .map(|s| (s.sector.clone(), s))
        .collect();

    sectors
        .iter()
        .map(|signal| {
            let shortlist = by_name.remove(&signal.name);
            EnrichedSector {
                name: signal.name.clone(),
                matched: shortlist.as_ref().map(|s| s.matched.clone()),
                heat: signal.heat,
                direction: signal.direction,
                instruments: shortlist.map(|s| s.instruments).unwrap_or_default(),
            }
        })
        .collect()
}

/// Flag crowded bullish calls: two confident hot sectors is warm, three or more is overheated.
pub fn overheat_alert(sectors: &[SectorSignal]) -> Option<OverheatAlert> {
    let hot = sectors
        .iter()
        .filter(|s| {
            s.direction == Direction::Bullish
                && s.heat >= OVERHEAT_MIN_HEAT
                && s.confidence.unwrap_or(0) >= OVERHEAT_MIN_CONFIDENCE
        })
        .count();

    match hot {
        0 | 1 => None,
        2 => Some(OverheatAlert {
            level: "偏热".to_string(),
            note: "热点集中，注意高位波动".to_string(),
            count: hot,
        }),
        _ => Some(OverheatAlert {
            level: "过热".to_string(),
            note: "高热度板块过多，注意追高风险".to_string(),
            count: hot,
        }),
    }
}
