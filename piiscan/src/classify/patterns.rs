use std::collections::HashSet;

use regex::Regex;

use crate::config::ClassifierConfig;
use crate::error::{PiiScanError, Result};
use crate::models::{Entity, EntityType};

use super::EntityClassifier;

/// How far back (in characters) to look for context words before a match.
const CONTEXT_WINDOW_CHARS: usize = 50;

const PERSON_SCORE: f32 = 0.6;
const PERSON_CONTEXT: &[&str] = &[
    "name", "mr", "mrs", "ms", "dr", "signed", "patient", "customer", "employee",
];

/// Capitalized words that start sentences or label fields far more often than
/// they appear inside names.
const NON_NAME_WORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "And", "Or", "Of", "To", "In", "On", "At", "For",
    "From", "By", "With", "Dear", "Sir", "Madam", "Mr", "Mrs", "Ms", "Dr", "Name", "Phone",
    "Email", "Mail", "Tel", "Fax", "Call", "Contact", "Address", "Street", "Avenue", "Road",
    "City", "State", "Date", "Total", "Invoice", "Account", "Number", "Card", "Credit", "Bank",
    "Social", "Security", "Please", "Thank", "Thanks", "Hello", "Hi", "Regards", "Sincerely",
    "Page", "Report", "Form", "Signature", "Signed", "Patient", "Customer", "Employee", "Id",
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "January",
    "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

#[derive(Debug, Clone, Copy)]
enum Check {
    None,
    Luhn,
    Ssn,
    TrimTrailingPunctuation,
}

struct Recognizer {
    entity_type: EntityType,
    pattern: Regex,
    score: f32,
    context: &'static [&'static str],
    check: Check,
}

impl Recognizer {
    fn new(
        entity_type: EntityType,
        pattern: &str,
        score: f32,
        context: &'static [&'static str],
        check: Check,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            PiiScanError::Config(format!("Invalid {entity_type} pattern: {e}"))
        })?;
        Ok(Self {
            entity_type,
            pattern,
            score,
            context,
            check,
        })
    }

    /// Validated (start, end) of a raw regex match, or None to discard it.
    fn refine(&self, text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
        let matched = &text[start..end];
        match self.check {
            Check::None => Some((start, end)),
            Check::Luhn => luhn_valid(matched).then_some((start, end)),
            Check::Ssn => ssn_valid(matched).then_some((start, end)),
            Check::TrimTrailingPunctuation => {
                let trimmed = matched.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']);
                (!trimmed.is_empty()).then_some((start, start + trimmed.len()))
            }
        }
    }
}

/// Regex-driven PII recognizer set with context-word score enhancement.
pub struct PatternClassifier {
    recognizers: Vec<Recognizer>,
    name_run: Regex,
    name_token: Regex,
    min_score: f32,
    context_boost: f32,
    allowed: HashSet<EntityType>,
}

impl PatternClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let recognizers = vec![
            Recognizer::new(
                EntityType::Email,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}\b",
                1.0,
                &["email", "mail", "e-mail", "contact"],
                Check::None,
            )?,
            Recognizer::new(
                EntityType::Phone,
                r"(?:\+?1[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]\d{4}\b",
                0.5,
                &["phone", "tel", "telephone", "call", "mobile", "cell", "fax"],
                Check::None,
            )?,
            Recognizer::new(
                EntityType::CreditCard,
                r"\b(?:\d[ -]?){12,18}\d\b",
                1.0,
                &["card", "credit", "visa", "mastercard", "amex", "payment"],
                Check::Luhn,
            )?,
            Recognizer::new(
                EntityType::UsSsn,
                r"\b\d{3}[- ]\d{2}[- ]\d{4}\b",
                0.5,
                &["ssn", "social", "security"],
                Check::Ssn,
            )?,
            Recognizer::new(
                EntityType::IpAddress,
                r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
                0.6,
                &["ip", "address", "host", "server"],
                Check::None,
            )?,
            Recognizer::new(
                EntityType::Url,
                r#"\b(?:https?://|www\.)[^\s<>"']+"#,
                0.5,
                &["url", "website", "link", "site"],
                Check::TrimTrailingPunctuation,
            )?,
        ];

        let token = r"[A-Z][a-z]+(?:['-]?[A-Z][a-z]+)?";
        let name_run = Regex::new(&format!(r"\b{token}(?:[ \t]+{token})*\b"))
            .map_err(|e| PiiScanError::Config(format!("Invalid PERSON pattern: {e}")))?;
        let name_token = Regex::new(token)
            .map_err(|e| PiiScanError::Config(format!("Invalid PERSON pattern: {e}")))?;

        Ok(Self {
            recognizers,
            name_run,
            name_token,
            min_score: config.min_score,
            context_boost: config.context_boost,
            allowed: config.entities.iter().copied().collect(),
        })
    }

    fn is_allowed(&self, entity_type: EntityType) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&entity_type)
    }

    fn score_with_context(&self, text: &str, start: usize, base: f32, context: &[&str]) -> f32 {
        if context.is_empty() || self.context_boost <= 0.0 {
            return base;
        }
        let window = preceding_window(text, start, CONTEXT_WINDOW_CHARS);
        let has_context = window
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .any(|word| context.contains(&word));
        if has_context {
            (base + self.context_boost).min(1.0)
        } else {
            base
        }
    }

    fn person_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        for run in self.name_run.find_iter(text) {
            let mut segment: Vec<(usize, usize)> = Vec::new();
            let tokens = self
                .name_token
                .find_iter(run.as_str())
                .map(|t| (run.start() + t.start(), run.start() + t.end()));

            for (start, end) in tokens {
                if NON_NAME_WORDS.contains(&&text[start..end]) {
                    push_name_segment(&mut spans, &segment);
                    segment.clear();
                } else {
                    segment.push((start, end));
                }
            }
            push_name_segment(&mut spans, &segment);
        }
        spans
    }
}

fn push_name_segment(spans: &mut Vec<(usize, usize)>, segment: &[(usize, usize)]) {
    if (2..=3).contains(&segment.len()) {
        spans.push((segment[0].0, segment[segment.len() - 1].1));
    }
}

impl EntityClassifier for PatternClassifier {
    fn classify(&self, text: &str) -> Result<Vec<Entity>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();

        for recognizer in &self.recognizers {
            if !self.is_allowed(recognizer.entity_type) {
                continue;
            }
            for m in recognizer.pattern.find_iter(text) {
                let Some((start, end)) = recognizer.refine(text, m.start(), m.end()) else {
                    continue;
                };
                let score =
                    self.score_with_context(text, start, recognizer.score, recognizer.context);
                found.push(Entity {
                    entity_type: recognizer.entity_type,
                    text: text[start..end].to_string(),
                    start,
                    end,
                    score,
                });
            }
        }

        if self.is_allowed(EntityType::Person) {
            for (start, end) in self.person_spans(text) {
                let score = self.score_with_context(text, start, PERSON_SCORE, PERSON_CONTEXT);
                found.push(Entity {
                    entity_type: EntityType::Person,
                    text: text[start..end].to_string(),
                    start,
                    end,
                    score,
                });
            }
        }

        found.retain(|e| e.score >= self.min_score && e.has_valid_score());
        let mut entities = remove_contained(found);
        entities.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then(a.entity_type.cmp(&b.entity_type))
        });

        Ok(entities)
    }
}

/// Lowercased text of up to `chars` characters before byte offset `start`.
fn preceding_window(text: &str, start: usize, chars: usize) -> String {
    let prefix = &text[..start];
    let from = prefix
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    prefix[from..].to_lowercase()
}

/// Drop results fully covered by another result that scores at least as high.
/// For identical spans and scores the earlier result wins.
fn remove_contained(results: Vec<Entity>) -> Vec<Entity> {
    let covered: Vec<bool> = results
        .iter()
        .enumerate()
        .map(|(i, a)| {
            results.iter().enumerate().any(|(j, b)| {
                if i == j || b.start > a.start || a.end > b.end {
                    return false;
                }
                let b_wider = (b.end - b.start) > (a.end - a.start);
                b.score > a.score || (b.score == a.score && (b_wider || j < i))
            })
        })
        .collect();

    results
        .into_iter()
        .zip(covered)
        .filter_map(|(entity, covered)| (!covered).then_some(entity))
        .collect()
}

fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn ssn_valid(candidate: &str) -> bool {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return false;
    }
    let (area, rest) = digits.split_at(3);
    let (group, serial) = rest.split_at(2);
    area != "000" && area != "666" && !area.starts_with('9') && group != "00" && serial != "0000"
}
