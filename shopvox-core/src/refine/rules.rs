use super::{QueryRefiner, MAX_TERMS};
use crate::capability::CapabilityError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Longest transcript still taken as an already concise query.
const CONCISE_WORDS: usize = 4;

/// Plain terms kept even when constraint terms crowd the list.
const MIN_CONTENT_TERMS: usize = 3;

const FILLER: &[&str] = &[
    "a", "about", "actually", "ah", "also", "although", "am", "an", "and", "any", "anything", "are", "at",
    "basically", "be", "because", "been", "but", "buy", "by", "can", "could", "do", "does", "either", "er",
    "find", "from", "get", "give", "good", "has", "have", "hello", "hey", "hi", "hmm", "however", "i", "i'd",
    "i'm", "if", "im", "in", "is", "it", "it's", "its", "just", "kind", "let", "let's", "like", "look",
    "looking", "me", "mine", "my", "need", "nice", "nor", "of", "oh", "ok", "okay", "on", "one", "ones", "or",
    "our", "please", "purchase", "really", "search", "searching", "shop", "shopping", "should", "show", "so",
    "some", "something", "sort", "thank", "thanks", "that", "the", "then", "there", "these", "thing",
    "things", "this", "those", "though", "to", "too", "uh", "uhh", "um", "umm", "us", "very", "wanna",
    "want", "was", "we", "well", "what", "which", "while", "will", "with", "would", "yet", "you", "your",
];

const EXCLUSION_MARKERS: &[&str] = &[
    "not", "without", "no", "except", "excluding", "don't", "dont", "nothing", "avoid", "never",
];
const EXCLUSION_PAIRS: &[(&str, &str)] = &[("do", "not"), ("other", "than"), ("instead", "of")];
const OPTIONAL_MARKERS: &[&str] = &["maybe", "preferably", "ideally", "optionally"];
const PRICE_MARKERS: &[&str] = &["under", "below", "within", "above", "over", "upto"];
const PRICE_PAIRS: &[(&str, &str)] = &[("less", "than"), ("more", "than"), ("up", "to")];
const CURRENCY_WORDS: &[&str] = &["rupees", "rupee", "rs", "inr", "dollars", "dollar", "usd"];

/// Tokens searched after an exclusion marker for the excluded term, so that
/// "don't want any leather" still reaches "leather".
const EXCLUSION_REACH: usize = 4;
/// Tokens searched after other markers.
const MARKER_REACH: usize = 2;

/// "for" after these verbs introduces the product, not its purpose.
const SEARCH_VERBS: &[&str] = &["look", "looking", "search", "searching", "shop", "shopping"];

/// Deterministic refiner built from keyword rules.
///
/// Transcripts of up to four words without filler are returned unchanged.
/// Longer ones are reduced to content terms, capitalized names (multi-word
/// ones quoted), a `for <use>` intent, a price constraint with its currency,
/// `(optional)` terms and `-excluded` terms. Only words that occur in the
/// transcript are ever emitted.
#[derive(Debug, Clone, Default)]
pub struct RuleRefiner;

impl RuleRefiner {
    pub fn new() -> Self {
        Self
    }

    /// Refines a transcript. Blank input gives an empty query.
    pub fn refine_text(&self, transcript: &str) -> String {
        let trimmed = transcript.trim();
        if trimmed.is_empty() || is_concise(trimmed) {
            return trimmed.to_string();
        }

        let terms = Terms::extract(trimmed).assemble();
        if terms.is_empty() {
            return trimmed.to_string();
        }
        terms.join(", ")
    }
}

#[async_trait]
impl QueryRefiner for RuleRefiner {
    fn name(&self) -> &str {
        "rules"
    }

    async fn refine(&self, transcript: &str) -> Result<String, CapabilityError> {
        Ok(self.refine_text(transcript))
    }
}

fn is_concise(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.len() <= CONCISE_WORDS
        && words
            .iter()
            .all(|w| !FILLER.contains(&clean_word(w).to_lowercase().as_str()))
}

fn clean_word(raw: &str) -> &str {
    raw.trim_matches(|c: char| !(c.is_alphanumeric() || c == '₹'))
}

#[derive(Debug)]
struct Token {
    text: String,
    lower: String,
    sentence_start: bool,
}

impl Token {
    fn is_filler(&self) -> bool {
        FILLER.contains(&self.lower.as_str())
    }

    fn is_marker(&self) -> bool {
        let lower = self.lower.as_str();
        EXCLUSION_MARKERS.contains(&lower)
            || OPTIONAL_MARKERS.contains(&lower)
            || PRICE_MARKERS.contains(&lower)
            || lower == "for"
    }

    fn is_name(&self) -> bool {
        !self.sentence_start
            && !self.is_filler()
            && !self.is_marker()
            && self.text.chars().next().is_some_and(char::is_uppercase)
    }
}

/// Splits text outside double quotes into tokens; quoted spans are returned
/// separately as exact phrases.
fn tokenize(text: &str) -> (Vec<Token>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut quoted = Vec::new();

    for (segment_no, segment) in text.split('"').enumerate() {
        if segment_no % 2 == 1 {
            let phrase = segment.split_whitespace().collect::<Vec<_>>().join(" ");
            if !phrase.is_empty() {
                quoted.push(phrase);
            }
            continue;
        }

        let mut sentence_start = segment_no == 0;
        for raw in segment.split_whitespace() {
            let word = clean_word(raw);
            if !word.is_empty() {
                tokens.push(Token {
                    text: word.to_string(),
                    lower: word.to_lowercase().replace('\u{2019}', "'"),
                    sentence_start,
                });
            }
            sentence_start = raw.ends_with(['.', '!', '?']);
        }
    }

    (tokens, quoted)
}

#[derive(Debug, Default)]
struct Terms {
    content: Vec<String>,
    names: Vec<String>,
    price: Vec<String>,
    intent: Vec<String>,
    optional: Vec<String>,
    excluded: Vec<String>,
}

impl Terms {
    fn extract(text: &str) -> Self {
        let (tokens, quoted) = tokenize(text);
        let mut terms = Terms {
            names: quoted.into_iter().map(|p| format!("\"{}\"", p)).collect(),
            ..Default::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let lower = token.lower.as_str();

            if let Some(after) = exclusion_marker(&tokens, i) {
                if let Some(j) = next_content(&tokens, after, EXCLUSION_REACH) {
                    terms.excluded.push(format!("-{}", tokens[j].lower));
                    i = j + 1;
                    continue;
                }
            } else if OPTIONAL_MARKERS.contains(&lower) {
                if let Some(j) = next_content(&tokens, i + 1, MARKER_REACH) {
                    terms.optional.push(format!("({})", tokens[j].lower));
                    i = j + 1;
                    continue;
                }
            } else if lower == "for" {
                let after_search_verb = i > 0 && SEARCH_VERBS.contains(&tokens[i - 1].lower.as_str());
                if !after_search_verb {
                    if let Some(j) = next_content(&tokens, i + 1, MARKER_REACH).filter(|&j| parse_amount(&tokens[j].lower).is_none()) {
                        terms.intent.push(format!("for {}", tokens[j].lower));
                        i = j + 1;
                        continue;
                    }
                }
            } else if let Some((term, next)) = price_term(&tokens, i) {
                terms.price.push(term);
                i = next;
                continue;
            }

            if token.is_name() {
                let end = tokens[i..]
                    .iter()
                    .position(|t| !t.is_name())
                    .map_or(tokens.len(), |n| i + n);
                let run: Vec<&str> = tokens[i..end].iter().map(|t| t.text.as_str()).collect();
                if run.len() > 1 {
                    terms.names.push(format!("\"{}\"", run.join(" ")));
                } else {
                    terms.names.push(run.join(""));
                }
                i = end;
                continue;
            }

            if !token.is_filler() && !token.is_marker() && lower != "for" {
                terms.content.push(token.lower.clone());
            }
            i += 1;
        }

        terms
    }

    /// Orders, deduplicates and caps the terms. Plain terms come first but
    /// give way to constraints beyond [`MIN_CONTENT_TERMS`].
    fn assemble(self) -> Vec<String> {
        let others: Vec<String> = [self.names, self.price, self.intent, self.optional, self.excluded]
            .into_iter()
            .flatten()
            .collect();

        let content = dedup(self.content);
        let budget = MAX_TERMS
            .saturating_sub(others.len())
            .max(MIN_CONTENT_TERMS)
            .min(content.len());

        let mut terms = dedup(content.into_iter().take(budget).chain(others).collect());
        terms.truncate(MAX_TERMS);
        terms
    }
}

fn dedup(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|term| {
            let key = term
                .trim_matches(|c: char| matches!(c, '"' | '(' | ')' | '-'))
                .to_lowercase();
            seen.insert(key)
        })
        .collect()
}

/// First non-filler token among the `reach` tokens starting at `from`.
fn next_content(tokens: &[Token], from: usize, reach: usize) -> Option<usize> {
    (from..tokens.len().min(from + reach)).find(|&j| !tokens[j].is_filler() && !tokens[j].is_marker())
}

/// Recognizes a one- or two-word exclusion marker at `i`, returning the
/// index after it.
fn exclusion_marker(tokens: &[Token], i: usize) -> Option<usize> {
    let lower = tokens[i].lower.as_str();
    if EXCLUSION_MARKERS.contains(&lower) {
        return Some(i + 1);
    }
    let next = tokens.get(i + 1)?;
    EXCLUSION_PAIRS
        .iter()
        .any(|(first, second)| *first == lower && *second == next.lower)
        .then_some(i + 2)
}

/// Recognizes `<marker> <amount> [currency]` starting at `i`, returning the
/// term and the index after it.
fn price_term(tokens: &[Token], i: usize) -> Option<(String, usize)> {
    let lower = tokens[i].lower.as_str();
    let (marker, amount_at) = if PRICE_MARKERS.contains(&lower) {
        (lower.to_string(), i + 1)
    } else {
        let next = tokens.get(i + 1)?;
        PRICE_PAIRS
            .iter()
            .find(|(first, second)| *first == lower && *second == next.lower)
            .map(|(first, second)| (format!("{} {}", first, second), i + 2))?
    };

    let amount = parse_amount(&tokens.get(amount_at)?.lower)?;
    let mut term = format!("{} {}", marker, amount);
    let mut next = amount_at + 1;

    if let Some(currency) = tokens
        .get(next)
        .filter(|t| CURRENCY_WORDS.contains(&t.lower.as_str()))
    {
        term.push(' ');
        term.push_str(&currency.lower);
        next += 1;
    }
    Some((term, next))
}

/// An amount such as `3000`, `3,000`, `2.5k` or `₹499`, with thousands
/// separators removed.
fn parse_amount(word: &str) -> Option<String> {
    let (symbol, rest) = match word.strip_prefix('₹') {
        Some(rest) => ("₹", rest),
        None => ("", word),
    };
    let digits = rest.strip_suffix('k').unwrap_or(rest);
    let valid = digits.starts_with(|c: char| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.');

    valid.then(|| format!("{}{}", symbol, rest.replace(',', "")))
}
