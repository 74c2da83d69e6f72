//! Best-effort extraction of loan terms from OCR'd sanction letters.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "SanctionedAmount",
            r"(?is)(?:Loan Amount Sanctioned.*?:\s*[_|\s]*)(₹?\s?[\d,]+)",
        ),
        ("EMI", r"(?is)(?:Amount of EMI.*?:|EMI\s*[:\-])\s*₹?\s?([\d,]+)"),
        (
            "ROI",
            r"(?is)(?:Floating Interest Rate.*?[-–]\s*|ROI.*?:\s*)(\d+(?:\.\d+)?%?)",
        ),
        (
            "Tenure",
            r"(?is)(?:Loan Tenor.*?:|Tenure.*?:)\s*(\d+\s*(?:years?|months?))",
        ),
        (
            "SanctionDate",
            r"(?is)(?:Sanction(?:ed)? Date.*?:\s*)([0-9]{1,2}[-/][A-Za-z]{3}[-/][0-9]{2,4}|[0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{2,4}|[A-Za-z]{3,9}\s+\d{1,2},\s*\d{4})",
        ),
    ]
    .into_iter()
    .map(|(name, pat)| (name, Regex::new(pat).expect("static regex is valid")))
    .collect()
});

static OCR_ARTIFACTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_|]+").expect("static regex is valid"));
static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("static regex is valid"));

fn clean(s: &str) -> String {
    let s = OCR_ARTIFACTS.replace_all(s, "");
    MULTI_SPACE.replace_all(&s, " ").trim().to_string()
}

/// Pulls known loan fields out of `text`. Fields that are not found are omitted.
pub fn extract_fields(text: &str) -> BTreeMap<String, String> {
    let text = clean(text);
    PATTERNS
        .iter()
        .filter_map(|(name, re)| {
            let value = re.captures(&text)?.get(1)?;
            Some((name.to_string(), clean(value.as_str())))
        })
        .collect()
}
