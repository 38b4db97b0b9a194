use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Payload of the completion endpoint.
#[derive(Deserialize, Debug)]
pub struct SuggestionsResponse {
    pub suggestions: Option<Vec<SuggestionItem>>,
}

#[derive(Deserialize, Debug)]
pub struct SuggestionItem {
    pub value: Option<String>,
}

/// Result count as shown on the search page.
///
/// `value` is the numeral on the page. When the page only gave a floor
/// ("10,000+ results", "over 10,000") `open_ended` is set; comparisons still
/// use `value` as-is.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCount {
    pub value: u64,
    pub open_ended: bool,
}

impl ResultCount {
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            open_ended: false,
        }
    }

    pub fn at_least(value: u64) -> Self {
        Self {
            value,
            open_ended: true,
        }
    }
}

impl fmt::Display for ResultCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_thousands(self.value))?;
        if self.open_ended {
            write!(f, "+")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PhraseCount {
    pub phrase: String,
    pub count: ResultCount,
}

#[derive(Serialize, Debug, Clone)]
pub struct CandidateFailure {
    pub phrase: String,
    pub reason: String,
    #[serde(skip)]
    pub connect: bool,
}

/// Everything one run produced.
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub seed: String,
    pub threshold: u64,
    /// Every phrase that was counted, in candidate order.
    pub evaluated: Vec<PhraseCount>,
    pub failures: Vec<CandidateFailure>,
    /// Phrases under the threshold, fewest results first.
    pub niches: Vec<PhraseCount>,
}

impl RunReport {
    /// Nothing could be counted and every attempt died on a connection failure.
    pub fn network_lost(&self) -> bool {
        self.evaluated.is_empty()
            && !self.failures.is_empty()
            && self.failures.iter().all(|f| f.connect)
    }
}

#[derive(Tabled)]
pub struct NicheRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "🔑 Phrase")]
    pub phrase: String,
    #[tabled(rename = "📊 Results")]
    pub results: String,
}

impl NicheRow {
    pub fn from_niches(niches: &[PhraseCount]) -> Vec<Self> {
        niches
            .iter()
            .enumerate()
            .map(|(index, niche)| NicheRow {
                rank: index + 1,
                phrase: niche.phrase.clone(),
                results: niche.count.to_string(),
            })
            .collect()
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
