//! Keyword rules mapping fund names to sectors.
//!
//! Exclusions are checked first and remove an instrument from the index
//! altogether. Otherwise the first inclusion rule with a keyword contained in
//! the name decides the sector, so rule order matters.

use chrono::{DateTime, Utc};
use pulse_core::{SectorEntry, SectorMap, SectorMember};
use std::collections::HashSet;

use crate::provider::ListingRecord;

/// A labelled keyword set; a name matches when it contains any keyword.
#[derive(Debug, Clone, Copy)]
pub struct SectorRule {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

impl SectorRule {
    pub fn matches(&self, name: &str) -> bool {
        self.keywords.iter().any(|kw| name.contains(kw))
    }
}

pub const EXCLUSION_RULES: &[SectorRule] = &[
    SectorRule {
        label: "broad-index",
        keywords: &[
            "500", "300", "1000", "50ETF", "科创50", "创业板ETF", "A500", "中证A", "综指",
            "上证", "深证", "中小板", "恒生指数", "国企", "央企",
        ],
    },
    SectorRule {
        label: "bond",
        keywords: &["债"],
    },
    SectorRule {
        label: "money-market",
        keywords: &["货币", "添益", "日利", "短融", "保证金"],
    },
    SectorRule {
        label: "cross-border",
        keywords: &[
            "纳指", "标普", "日经", "德国", "法国", "中韩", "中概", "沙特", "巴西", "越南", "印度",
        ],
    },
    SectorRule {
        label: "strategy",
        keywords: &["红利", "自由现金", "期货", "豆粕", "能源化工"],
    },
];

pub const SECTOR_RULES: &[SectorRule] = &[
    SectorRule { label: "黄金", keywords: &["黄金", "金ETF", "上海金"] },
    SectorRule { label: "有色", keywords: &["有色", "金属ETF", "稀土", "铜", "铝", "锌"] },
    SectorRule { label: "芯片", keywords: &["芯片", "半导体", "集成电路", "半导设备"] },
    SectorRule { label: "证券", keywords: &["证券", "券商", "非银"] },
    SectorRule { label: "银行", keywords: &["银行"] },
    SectorRule { label: "医药", keywords: &["医疗", "医药", "生物", "创新药"] },
    SectorRule { label: "白酒", keywords: &["酒ETF", "白酒"] },
    SectorRule { label: "消费", keywords: &["消费", "食品"] },
    SectorRule { label: "军工", keywords: &["军工", "国防", "卫星", "航天", "航空"] },
    SectorRule { label: "新能源", keywords: &["新能源", "光伏", "风电", "清洁能源"] },
    SectorRule { label: "锂电池", keywords: &["锂电", "电池", "储能"] },
    SectorRule { label: "汽车", keywords: &["汽车", "智能车", "新能车"] },
    SectorRule { label: "房地产", keywords: &["房地产", "地产"] },
    SectorRule { label: "煤炭", keywords: &["煤炭"] },
    SectorRule { label: "钢铁", keywords: &["钢铁"] },
    SectorRule { label: "石油", keywords: &["石油", "油气"] },
    SectorRule { label: "化工", keywords: &["化工"] },
    SectorRule { label: "电力", keywords: &["电力", "电网", "电气"] },
    SectorRule { label: "农业", keywords: &["农业", "养殖", "畜牧"] },
    SectorRule { label: "家电", keywords: &["家电"] },
    SectorRule { label: "机器人", keywords: &["机器人"] },
    SectorRule { label: "人工智能", keywords: &["人工智能", "AI"] },
    SectorRule { label: "软件", keywords: &["软件", "云计算", "计算机"] },
    SectorRule { label: "通信", keywords: &["通信", "5G"] },
    SectorRule { label: "互联网", keywords: &["互联网"] },
    SectorRule { label: "游戏", keywords: &["游戏", "动漫"] },
    SectorRule { label: "传媒", keywords: &["传媒", "影视"] },
    SectorRule { label: "环保", keywords: &["环保", "碳中和"] },
    SectorRule { label: "恒生科技", keywords: &["恒生科技"] },
    SectorRule { label: "港股", keywords: &["港股", "香港", "恒生互联", "恒生医疗", "恒生生物"] },
];

/// Names the analyzer tends to use, mapped to index sectors
pub const SECTOR_ALIASES: &[(&str, &str)] = &[
    ("新能源车", "锂电池"),
    ("光伏", "新能源"),
    ("创新药", "医药"),
    ("贵金属", "黄金"),
    ("券商", "证券"),
];

/// Label of the first exclusion rule matching `name`.
pub fn exclusion_for(name: &str) -> Option<&'static str> {
    EXCLUSION_RULES.iter().find(|r| r.matches(name)).map(|r| r.label)
}

/// Sector of a fund name, or `None` when excluded or unmatched.
pub fn classify(name: &str) -> Option<&'static str> {
    if exclusion_for(name).is_some() {
        return None;
    }
    SECTOR_RULES.iter().find(|r| r.matches(name)).map(|r| r.label)
}

/// Group listings into sectors, rule order preserved, members ranked by
/// amount descending and capped at `top_n`. Duplicate codes keep their first row.
pub fn build_sector_map(
    listings: &[ListingRecord],
    min_amount: f64,
    top_n: usize,
    built_at: DateTime<Utc>,
) -> SectorMap {
    let mut seen = HashSet::new();
    let mut buckets: Vec<Vec<SectorMember>> = vec![Vec::new(); SECTOR_RULES.len()];

    for row in listings {
        if row.amount < min_amount || !seen.insert(row.code.as_str()) {
            continue;
        }
        let Some(label) = classify(&row.name) else {
            continue;
        };
        if let Some(idx) = SECTOR_RULES.iter().position(|r| r.label == label) {
            buckets[idx].push(SectorMember {
                symbol: row.code.clone(),
                name: row.name.clone(),
                amount: row.amount,
            });
        }
    }

    let sectors = SECTOR_RULES
        .iter()
        .zip(buckets)
        .filter(|(_, members)| !members.is_empty())
        .map(|(rule, mut members)| {
            members.sort_by(|a, b| b.amount.total_cmp(&a.amount));
            members.truncate(top_n);
            SectorEntry {
                name: rule.label.to_string(),
                members,
            }
        })
        .collect();

    SectorMap {
        sectors,
        built_at: Some(built_at),
    }
}

/// Find the index entry for a sector name as written by the analyzer.
///
/// Aliases are tried first, then the exact name, then containment either way
/// in rule order.
pub fn resolve_sector<'a>(map: &'a SectorMap, requested: &str) -> Option<&'a SectorEntry> {
    let requested = requested.trim();
    if requested.is_empty() {
        return None;
    }

    let aliased = SECTOR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == requested)
        .and_then(|(_, target)| map.get(target));
    if aliased.is_some() {
        return aliased;
    }

    map.get(requested).or_else(|| {
        map.sectors
            .iter()
            .find(|s| s.name.contains(requested) || requested.contains(s.name.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, name: &str, amount: f64) -> ListingRecord {
        ListingRecord {
            code: code.to_string(),
            name: name.to_string(),
            amount,
        }
    }

    #[test]
    fn test_exclusions_win_over_inclusions() {
        assert_eq!(classify("半导体ETF"), Some("芯片"));
        assert_eq!(classify("沪深300ETF"), None);
        assert_eq!(classify("国债ETF"), None);
        assert_eq!(classify("纳指科技ETF"), None);
        assert_eq!(classify("中证红利ETF"), None);
        assert_eq!(exclusion_for("银华日利"), Some("money-market"));
        assert_eq!(classify("豆粕ETF"), None);
    }

    #[test]
    fn test_first_match_wins() {
        // Contains both 新能源 and 汽车 keywords; 新能源 is listed first
        assert_eq!(classify("新能源汽车ETF"), Some("新能源"));
        assert_eq!(classify("新能车ETF"), Some("汽车"));
        assert_eq!(classify("黄金ETF"), Some("黄金"));
        assert_eq!(classify("恒生科技ETF"), Some("恒生科技"));
        assert_eq!(classify("随便什么基金"), None);
    }

    #[test]
    fn test_build_sector_map_ranks_and_caps() {
        let listings = vec![
            row("512480", "半导体ETF", 2.0e9),
            row("159995", "芯片ETF", 3.0e9),
            row("512760", "芯片ETF基金", 1.0e9),
            row("588200", "科创芯片ETF", 4.0e6),
            row("518880", "黄金ETF", 5.0e9),
            row("510300", "沪深300ETF", 9.0e9),
            row("512480", "半导体ETF重复", 9.9e9),
        ];
        let map = build_sector_map(&listings, 5_000_000.0, 2, Utc::now());

        assert_eq!(map.names(), vec!["黄金", "芯片"]);
        let chips = map.get("芯片").unwrap();
        let symbols: Vec<&str> = chips.members.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["159995", "512480"]);
    }

    #[test]
    fn test_resolve_sector() {
        let listings = vec![
            row("512480", "半导体ETF", 2.0e9),
            row("159755", "电池ETF", 1.0e9),
            row("512880", "证券ETF", 3.0e9),
            row("515790", "光伏ETF", 1.0e9),
        ];
        let map = build_sector_map(&listings, 0.0, 5, Utc::now());

        assert_eq!(resolve_sector(&map, "芯片").unwrap().name, "芯片");
        assert_eq!(resolve_sector(&map, "新能源车").unwrap().name, "锂电池");
        assert_eq!(resolve_sector(&map, "券商").unwrap().name, "证券");
        assert_eq!(resolve_sector(&map, "光伏").unwrap().name, "新能源");
        assert_eq!(resolve_sector(&map, "新能源").unwrap().name, "新能源");
        assert_eq!(resolve_sector(&map, "芯片半导体").unwrap().name, "芯片");
        assert!(resolve_sector(&map, "航运").is_none());
        assert!(resolve_sector(&map, " ").is_none());
    }

    #[test]
    fn test_alias_targets_are_sector_labels() {
        for (alias, target) in SECTOR_ALIASES {
            assert!(
                SECTOR_RULES.iter().any(|r| r.label == *target),
                "alias {} points at unknown sector {}",
                alias,
                target
            );
        }
    }
}
