//! Classifies a Form 4 transaction code into a trade type, disambiguating
//! option exercises (`M`) by whether the same insider sold the underlying
//! shares the same day.

use std::collections::HashSet;

/// Trade types that read as bullish: the insider ends up holding more stock.
pub const BULLISH_TRADE_TYPES: &[&str] = &["buy", "exercise_hold"];

/// Trade types that read as bearish: the insider reduces their position.
pub const BEARISH_TRADE_TYPES: &[&str] = &["sell", "disposition"];

pub fn is_bullish_trade(trade_type: &str) -> bool {
    BULLISH_TRADE_TYPES.contains(&trade_type)
}

pub fn is_bearish_trade(trade_type: &str) -> bool {
    BEARISH_TRADE_TYPES.contains(&trade_type)
}

/// Classifies a single transaction code. `same_day_codes` is the set of every
/// other transaction code the same insider filed on the same date — used
/// only to disambiguate `M` (option exercise): with a same-day `S`, the
/// exercise is really a same-day sale (`exercise_sell`); with only `F` (tax
/// withholding) or alone, it's a hold (`exercise_hold`).
pub fn classify_trade(code: &str, same_day_codes: Option<&HashSet<String>>) -> &'static str {
    match code.to_uppercase().as_str() {
        "P" => "buy",
        "S" => "sell",
        "A" => "award",
        "D" => "disposition",
        "G" => "gift",
        "C" => "conversion",
        "W" => "will",
        "F" => "tax",
        "M" => {
            if same_day_codes.map(|codes| codes.contains("S")).unwrap_or(false) {
                "exercise_sell"
            } else {
                "exercise_hold"
            }
        }
        _ => "other",
    }
}

/// Classifies a batch of trade rows, pairing each `M` with same-person
/// same-date codes from the same batch rather than the whole dataset —
/// trades by a different person, or the same person on a different date,
/// never pair.
pub fn classify_trades_batch<T>(
    trades: &[T],
    name_of: impl Fn(&T) -> &str,
    date_of: impl Fn(&T) -> &str,
    code_of: impl Fn(&T) -> &str,
) -> Vec<&'static str> {
    use std::collections::HashMap;

    let mut codes_by_person_date: HashMap<(&str, &str), HashSet<String>> = HashMap::new();
    for trade in trades {
        let key = (name_of(trade), date_of(trade));
        codes_by_person_date
            .entry(key)
            .or_default()
            .insert(code_of(trade).to_uppercase());
    }

    trades
        .iter()
        .map(|trade| {
            let key = (name_of(trade), date_of(trade));
            let same_day = codes_by_person_date.get(&key);
            classify_trade(code_of(trade), same_day)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_simple_codes() {
        assert_eq!(classify_trade("P", None), "buy");
        assert_eq!(classify_trade("S", None), "sell");
        assert_eq!(classify_trade("A", None), "award");
        assert_eq!(classify_trade("X", None), "other");
        assert_eq!(classify_trade("", None), "other");
        assert_eq!(classify_trade("p", None), "buy");
    }

    #[test]
    fn exercise_alone_is_hold() {
        assert_eq!(classify_trade("M", None), "exercise_hold");
        let mut same_day = HashSet::new();
        same_day.insert("M".to_string());
        assert_eq!(classify_trade("M", Some(&same_day)), "exercise_hold");
    }

    #[test]
    fn exercise_with_same_day_sale_is_exercise_sell() {
        let mut same_day = HashSet::new();
        same_day.insert("M".to_string());
        same_day.insert("S".to_string());
        assert_eq!(classify_trade("M", Some(&same_day)), "exercise_sell");
    }

    #[test]
    fn exercise_with_same_day_tax_withholding_is_still_hold() {
        let mut same_day = HashSet::new();
        same_day.insert("M".to_string());
        same_day.insert("F".to_string());
        assert_eq!(classify_trade("M", Some(&same_day)), "exercise_hold");
    }

    #[derive(Clone)]
    struct Row {
        name: String,
        date: String,
        code: String,
    }

    fn batch(rows: &[(&str, &str, &str)]) -> Vec<Row> {
        rows.iter()
            .map(|(n, d, c)| Row { name: n.to_string(), date: d.to_string(), code: c.to_string() })
            .collect()
    }

    #[test]
    fn batch_pairs_only_same_person_same_date() {
        let rows = batch(&[("Alice", "2025-01-01", "M"), ("Alice", "2025-01-01", "S")]);
        let result = classify_trades_batch(&rows, |r| &r.name, |r| &r.date, |r| &r.code);
        assert_eq!(result, vec!["exercise_sell", "sell"]);

        let rows = batch(&[("Alice", "2025-01-01", "M"), ("Bob", "2025-01-01", "S")]);
        let result = classify_trades_batch(&rows, |r| &r.name, |r| &r.date, |r| &r.code);
        assert_eq!(result, vec!["exercise_hold", "sell"]);

        let rows = batch(&[("Alice", "2025-01-01", "M"), ("Alice", "2025-01-02", "S")]);
        let result = classify_trades_batch(&rows, |r| &r.name, |r| &r.date, |r| &r.code);
        assert_eq!(result, vec!["exercise_hold", "sell"]);
    }

    #[test]
    fn sentiment_helpers_agree_with_constants() {
        assert!(is_bullish_trade("buy"));
        assert!(is_bullish_trade("exercise_hold"));
        assert!(!is_bullish_trade("sell"));
        assert!(is_bearish_trade("disposition"));
        assert!(!is_bearish_trade("exercise_sell"));
    }

    #[test]
    fn bullish_and_bearish_sets_are_disjoint() {
        let bullish: HashSet<_> = BULLISH_TRADE_TYPES.iter().collect();
        let bearish: HashSet<_> = BEARISH_TRADE_TYPES.iter().collect();
        assert!(bullish.is_disjoint(&bearish));
    }
}
