//! Masks Indian identity and banking numbers before text is stored.

use std::sync::LazyLock;

use regex::Regex;

/// Applied in order: a 12-digit Aadhaar number must be masked before the
/// broader account-number rule sees it.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b[A-Z]{5}[0-9]{4}[A-Z]\b", "PAN_[REDACTED]"),
        (r"\b\d{12}\b", "AADHAAR_[REDACTED]"),
        (r"\b[A-Z]{4}0[A-Z0-9]{6}\b", "IFSC_[REDACTED]"),
        (r"\b\d{9,18}\b", "ACNO_[REDACTED]"),
    ]
    .into_iter()
    .map(|(pat, label)| (Regex::new(pat).expect("static regex is valid"), label))
    .collect()
});

/// Replaces PAN, Aadhaar, IFSC and bank account numbers with labelled placeholders.
pub fn redact_pii(text: &str) -> String {
    RULES.iter().fold(text.to_string(), |acc, (re, label)| {
        re.replace_all(&acc, *label).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_each_kind() {
        let text = "PAN ABCDE1234F, Aadhaar 123456789012, IFSC HDFC0001234, A/c 50100123456789.";
        assert_eq!(
            redact_pii(text),
            "PAN PAN_[REDACTED], Aadhaar AADHAAR_[REDACTED], IFSC IFSC_[REDACTED], A/c ACNO_[REDACTED]."
        );
    }

    #[test]
    fn leaves_amounts_and_short_numbers() {
        let text = "EMI 10,250 for 240 months at 8.75%";
        assert_eq!(redact_pii(text), text);
    }

    #[test]
    fn does_not_match_inside_words() {
        assert_eq!(redact_pii("refXABCDE1234F"), "refXABCDE1234F");
    }
}
