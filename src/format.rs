// ===============================
// src/format.rs
// ===============================

/// US-dollar style, two decimals, thousands separators: `$1,234.56`, `-$5.00`.
pub fn usd(v: f64) -> String {
    if !v.is_finite() {
        return if v.is_nan() { "NaN".to_string() } else if v > 0.0 { "$∞".to_string() } else { "-$∞".to_string() };
    }
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    // -0.001 rounds to $0.00, not -$0.00
    let negative = v < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Change column: "+ $3.00" for gains, "-$3.00" for losses.
pub fn signed_usd(v: f64) -> String {
    if v >= 0.0 { format!("+ {}", usd(v)) } else { usd(v) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands_and_rounds() {
        assert_eq!(usd(0.0), "$0.00");
        assert_eq!(usd(100.0), "$100.00");
        assert_eq!(usd(1234.5), "$1,234.50");
        assert_eq!(usd(1_000_000.0), "$1,000,000.00");
        assert_eq!(usd(169.004), "$169.00");
        assert_eq!(usd(12.345678), "$12.35");
    }

    #[test]
    fn negatives_and_signs() {
        assert_eq!(usd(-5.0), "-$5.00");
        assert_eq!(usd(-0.001), "$0.00");
        assert_eq!(usd(-98765.4), "-$98,765.40");
        assert_eq!(signed_usd(39.0), "+ $39.00");
        assert_eq!(signed_usd(-39.0), "-$39.00");
    }
}
