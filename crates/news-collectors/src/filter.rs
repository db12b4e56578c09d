//! Keyword pre-filter applied before the corpus goes to the analyzer.

use chrono::{DateTime, Duration, Utc};
use pulse_core::NewsItem;
use serde::Serialize;

use crate::similarity::merge_near_duplicates;

/// Single-company noise removed outright
const HARD_FILTER_KEYWORDS: &[&str] = &[
    "净利润", "预增", "预减", "预亏", "扭亏", "业绩快报", "业绩预告",
    "同比增长", "同比下降", "同比减少",
    "回购股份", "回购价格", "质押", "解押",
    "辞职", "辞去", "聘任", "任命",
    "询价转让", "询价申购", "IPO申请", "递交上市",
    "原料药上市", "药品注册", "专利授权",
];

const HIGH_VALUE_KEYWORDS: &[&str] = &[
    // Macro
    "央行", "降息", "降准", "加息", "GDP", "CPI", "PMI",
    // Market moves
    "涨停", "跌停", "暴涨", "暴跌", "创新高", "新低", "主力资金", "北向资金", "外资",
    // Policy
    "政策", "监管", "发改委", "证监会", "国务院",
    // Industry
    "芯片", "AI", "人工智能", "新能源", "光伏", "锂电", "贵金属", "黄金", "白银", "原油",
];

const EARNINGS_KEYWORDS: &[&str] = &[
    "净利润", "预增", "预减", "预亏", "扭亏", "业绩快报", "业绩预告", "同比增长", "同比下降",
];

const LOW_VALUE_KEYWORDS: &[&str] = &[
    // Personnel
    "辞职", "辞去", "聘任", "任命", "离任",
    // Share pledges and freezes
    "质押", "解押", "解除质押", "冻结", "解冻",
    // Routine filings
    "回购进展", "增持计划", "减持计划", "股份变动", "注册资本", "章程修订", "董事会决议",
    "回购股份", "回购价格", "回购方案", "拟将回购", "询价转让", "询价申购", "募投项目",
    "变更部分", "审核状态", "已问询", "提交上市申请",
    // Low information
    "互动平台", "投资者问", "公司回应称", "不存在需要更正", "信息披露",
    // Minor company notices
    "原料药上市申请", "药品注册", "专利授权", "中标项目", "签订合同", "战略合作",
    "股东大会", "临时公告", "更正公告", "计划受托人", "公开市场上购买",
    // Sanctions
    "被禁止参加", "行政处罚", "警示函",
    // Broker ratings
    "维持", "目标价", "优于大市", "买入评级", "料香港", "料蒙牛", "推荐新鸿基",
    // Distant markets
    "印度", "俄罗斯央行", "西班牙", "巴西", "乌克兰", "敖德萨", "日债",
    // Consultations
    "征求意见稿", "公开征求意见",
];

const POSITIVE_EARNINGS: &[&str] = &["预增", "扭亏", "同比增长"];
const NEGATIVE_EARNINGS: &[&str] = &["预减", "预亏", "同比下降", "亏损"];

/// Titles in the "other" bucket must be longer than this to be kept
const OTHER_MIN_CHARS: usize = 30;

/// Knobs for [`preprocess`]
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub window_hours: i64,
    pub near_dup_threshold: f64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            window_hours: 6,
            near_dup_threshold: crate::similarity::DEFAULT_NEAR_DUP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessStats {
    pub total: usize,
    pub recent: usize,
    pub high_value: usize,
    pub earnings: usize,
    pub low_value: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub high_value: Vec<NewsItem>,
    pub earnings_summary: String,
    pub stats: PreprocessStats,
}

fn contains_any(title: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| title.contains(kw))
}

/// Drop single-company noise by title keyword.
pub fn hard_filter(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let before = items.len();
    let kept: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| !contains_any(&item.title, HARD_FILTER_KEYWORDS))
        .collect();
    tracing::info!("Hard filter: {} -> {} items", before, kept.len());
    kept
}

/// Window, classify and merge the corpus.
///
/// Items without a timestamp count as recent. High-value titles win over
/// the earnings and low-value buckets; anything else is kept only when its
/// title is long enough to carry real content.
pub fn preprocess(items: Vec<NewsItem>, now: DateTime<Utc>, options: &PreprocessOptions) -> Preprocessed {
    if items.is_empty() {
        return Preprocessed::default();
    }

    let total = items.len();
    let cutoff = now - Duration::hours(options.window_hours);
    let recent: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| item.published_at.map_or(true, |ts| ts > cutoff))
        .collect();
    let recent_count = recent.len();

    let mut high_value = Vec::new();
    let mut earnings = Vec::new();
    let mut low_value = 0usize;

    for item in recent {
        let title = item.title.as_str();
        if contains_any(title, HIGH_VALUE_KEYWORDS) {
            high_value.push(item);
        } else if contains_any(title, EARNINGS_KEYWORDS) {
            earnings.push(item);
        } else if contains_any(title, LOW_VALUE_KEYWORDS) {
            low_value += 1;
        } else if title.chars().count() > OTHER_MIN_CHARS {
            high_value.push(item);
        }
    }

    let high_value = merge_near_duplicates(high_value, options.near_dup_threshold, |i: &NewsItem| {
        i.title.as_str()
    });
    let earnings_summary = summarize_earnings(&earnings);

    let stats = PreprocessStats {
        total,
        recent: recent_count,
        high_value: high_value.len(),
        earnings: earnings.len(),
        low_value,
    };
    tracing::info!(
        "Preprocess: {} items -> {} high value, {} earnings",
        stats.total,
        stats.high_value,
        stats.earnings
    );

    Preprocessed {
        high_value,
        earnings_summary,
        stats,
    }
}

/// Company name heading an earnings title: `【公司：...` or `公司:...`.
fn earnings_company(title: &str) -> String {
    let trimmed = title.trim_start_matches('【');
    if let Some(pos) = trimmed.find(['：', ':']) {
        let head = &trimmed[..pos];
        if !head.is_empty() && !head.contains(['【', '】']) {
            return head.to_string();
        }
    }
    title.chars().take(6).collect()
}

/// One-line digest of earnings announcements.
pub fn summarize_earnings(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for item in items {
        let company = earnings_company(&item.title);
        if contains_any(&item.title, POSITIVE_EARNINGS) {
            positive.push(company);
        } else if contains_any(&item.title, NEGATIVE_EARNINGS) {
            negative.push(company);
        }
    }

    let mut parts = Vec::new();
    if !positive.is_empty() {
        let names: Vec<&str> = positive.iter().take(5).map(String::as_str).collect();
        parts.push(format!("业绩预增: {}等{}家", names.join(", "), positive.len()));
    }
    if !negative.is_empty() {
        let names: Vec<&str> = negative.iter().take(5).map(String::as_str).collect();
        parts.push(format!("业绩预减: {}等{}家", names.join(", "), negative.len()));
    }

    if parts.is_empty() {
        format!("今日{}家公司发布业绩预告", items.len())
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::SourceType;

    fn item(title: &str, published_at: Option<DateTime<Utc>>) -> NewsItem {
        NewsItem::new(title, "财联社", SourceType::Domestic, "zh").with_published_at(published_at)
    }

    #[test]
    fn test_hard_filter() {
        let items = vec![
            item("某公司：2024年净利润预增120%", None),
            item("央行开展1000亿元逆回购操作", None),
            item("某公司董事长辞职", None),
        ];
        let kept = hard_filter(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "央行开展1000亿元逆回购操作");
    }

    #[test]
    fn test_preprocess_buckets_and_window() {
        let now = Utc::now();
        let items = vec![
            item("央行宣布下调存款准备金率0.5个百分点", Some(now)),
            item("央行宣布下调存款准备金率0.5个百分点！", Some(now)),
            item("光伏板块午后拉升", Some(now - Duration::hours(10))),
            item("甲公司：2024年净利润预增120%", None),
            item("乙公司：2024年预亏3亿元", None),
            item("某公司董事会决议公告", None),
            item("短标题", None),
            item("交通运输部发布通知要求各地做好春运期间道路交通安全保障工作的紧急通知", None),
        ];

        let out = preprocess(items, now, &PreprocessOptions::default());
        assert_eq!(out.stats.total, 8);
        assert_eq!(out.stats.recent, 7);
        assert_eq!(out.stats.earnings, 2);
        assert_eq!(out.stats.low_value, 1);
        assert_eq!(out.high_value.len(), 2);
        assert_eq!(out.high_value[0].title, "央行宣布下调存款准备金率0.5个百分点");
        assert_eq!(out.earnings_summary, "业绩预增: 甲公司等1家; 业绩预减: 乙公司等1家");
    }

    #[test]
    fn test_summary_without_direction() {
        let items = vec![item("丙公司发布业绩快报", None)];
        assert_eq!(summarize_earnings(&items), "今日1家公司发布业绩预告");
        assert_eq!(summarize_earnings(&[]), "");
    }
}
