//! Classifies 8-K item combinations by predictive M&A value and layers
//! insider trade direction on top.
//!
//! The key insight carried over from the grounding source: item 2.01
//! (acquisition complete) means the deal is already done — too late to act
//! on. The predictive signal is 1.01 (material agreement) appearing *before*
//! 2.01. IPO/SPAC/offering filings trip the same item combination without
//! being an M&A signal at all, so they're downgraded separately.

use std::collections::HashSet;

use super::feed::InsiderContext;

pub const IPO_KEYWORDS: &[&str] = &[
    "underwriting agreement",
    "initial public offering",
    "ipo",
    "prospectus supplement",
    "public offering price",
    "shares of common stock registered",
    "business combination agreement",
];

pub const ITEM_NAMES: &[(&str, &str)] = &[
    ("1.01", "Material Agreement"),
    ("1.02", "Agreement Terminated"),
    ("2.01", "Acquisition/Disposition"),
    ("2.03", "New Debt"),
    ("5.01", "Control Change"),
    ("5.02", "Executive Change"),
    ("5.03", "Governance Change"),
    ("7.01", "Regulation FD"),
    ("8.01", "Other Events"),
    ("9.01", "Exhibits"),
];

pub fn item_name(item_number: &str) -> Option<&'static str> {
    ITEM_NAMES.iter().find(|(k, _)| *k == item_number).map(|(_, v)| *v)
}

pub fn is_ipo_filing(raw_texts: &[String]) -> bool {
    let combined = raw_texts.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>().join(" ");
    IPO_KEYWORDS.iter().any(|kw| combined.contains(kw))
}

/// Returns `(level, summary)` — level is one of `"high"`, `"medium"`, `"low"`.
pub fn classify_signal_level(items: &[String], raw_texts: &[String]) -> (&'static str, &'static str) {
    let items_set: HashSet<&str> = items.iter().map(String::as_str).collect();

    let deal_closed = items_set.contains("2.01") || items_set.contains("5.01");
    let has_material_agreement = items_set.contains("1.01");
    let has_exec_changes = items_set.contains("5.02");
    let has_governance_changes = items_set.contains("5.03");

    // The IPO check runs only when 1.01 or 5.02/5.03 is otherwise present,
    // and short-circuits every item-combination rule below it once it fires.
    if (has_material_agreement || has_exec_changes || has_governance_changes) && is_ipo_filing(raw_texts) {
        return ("low", "IPO/Offering Filing - Not M&A");
    }

    if has_material_agreement && !deal_closed {
        if has_exec_changes || has_governance_changes {
            return ("high", "Deal in Progress - Material Agreement + Leadership Changes");
        }
        return ("medium", "Material Agreement Filed - Potential Deal");
    }

    if has_exec_changes && has_governance_changes && !deal_closed {
        return ("medium", "Multiple Leadership/Governance Changes");
    }

    if deal_closed {
        if has_material_agreement {
            return ("low", "Acquisition Completed");
        }
        return ("low", "Control Change Completed");
    }

    if has_exec_changes {
        return ("low", "Executive Change");
    }

    if has_governance_changes {
        return ("low", "Governance Change");
    }

    ("low", "SEC Filing")
}

/// Layers insider trade direction on an 8-K signal level. Returns one of
/// `"critical"`, `"high_bearish"`, `"high"`, `"medium"`, `"low"`.
pub fn compute_combined_signal(signal_level: &str, insider_ctx: Option<&InsiderContext>) -> &'static str {
    let Some(ctx) = insider_ctx else { return level_str(signal_level) };
    if ctx.trade_count == 0 {
        return level_str(signal_level);
    }

    match signal_level {
        "high" => match ctx.net_direction.as_str() {
            "buying" => "critical",
            "selling" => "high_bearish",
            _ => level_str(signal_level),
        },
        "medium" => {
            if ctx.net_direction == "buying" {
                "high"
            } else {
                level_str(signal_level)
            }
        }
        other => level_str(other),
    }
}

fn level_str(level: &str) -> &'static str {
    match level {
        "high" => "high",
        "medium" => "medium",
        "low" => "low",
        "critical" => "critical",
        "high_bearish" => "high_bearish",
        _ => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn material_agreement_with_leadership_change_is_high() {
        let (level, _) = classify_signal_level(&items(&["1.01", "5.02"]), &[]);
        assert_eq!(level, "high");
    }

    #[test]
    fn ipo_keyword_downgrades_to_low() {
        let texts = vec!["This Initial Public Offering prospectus supplement...".to_string()];
        let (level, summary) = classify_signal_level(&items(&["1.01", "5.02"]), &texts);
        assert_eq!(level, "low");
        assert_eq!(summary, "IPO/Offering Filing - Not M&A");
    }

    #[test]
    fn ipo_keyword_overrides_even_without_a_material_agreement_item() {
        // 5.02+5.03 alone would otherwise classify as "medium" — the IPO
        // check still runs because 5.02/5.03 is present.
        let texts = vec!["...underwriting agreement among the parties...".to_string()];
        let (level, summary) = classify_signal_level(&items(&["5.02", "5.03"]), &texts);
        assert_eq!(level, "low");
        assert_eq!(summary, "IPO/Offering Filing - Not M&A");
    }

    #[test]
    fn closed_deal_is_low_even_with_material_agreement() {
        let (level, summary) = classify_signal_level(&items(&["1.01", "2.01"]), &[]);
        assert_eq!(level, "low");
        assert_eq!(summary, "Acquisition Completed");
    }

    #[test]
    fn combined_signal_escalates_high_plus_buying_to_critical() {
        let ctx = InsiderContext {
            net_direction: "buying".to_string(),
            total_buy_value: 100.0,
            total_sell_value: 0.0,
            notable_trades: vec![],
            cluster_activity: false,
            trade_count: 1,
            person_matches: vec![],
        };
        assert_eq!(compute_combined_signal("high", Some(&ctx)), "critical");
    }

    #[test]
    fn combined_signal_passes_through_without_trades() {
        assert_eq!(compute_combined_signal("medium", None), "medium");
    }
}
