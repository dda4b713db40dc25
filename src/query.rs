//! Free-text query intake
//!
//! Turns a user utterance into a [`ParsedQuery`]: is it about the weather,
//! which place does it name, did the user type coordinates, and what else
//! did they ask for. Everything here is rule based; there is no model in
//! the loop.

use crate::models::PlaceQuery;
use crate::weather::validate_coordinates;

/// Words that mark an utterance as weather related
const WEATHER_WORDS: &[&str] = &[
    "weather", "forecast", "temperature", "temperatures", "rain", "raining", "rainy", "snow",
    "snowing", "snowy", "sunny", "sun", "sunrise", "sunset", "wind", "windy", "gust", "gusts",
    "humid", "humidity", "cold", "hot", "warm", "chilly", "degrees", "precipitation", "cloudy",
    "clouds", "cloud", "storm", "stormy", "fog", "foggy", "drizzle", "umbrella", "celsius",
    "freezing",
];

/// Prepositions that introduce a place name
const PLACE_PREPOSITIONS: &[&str] = &["in", "for", "at", "near", "around", "of"];

/// Words that end a place phrase
const PLACE_TERMINATORS: &[&str] = &[
    "today", "tomorrow", "tonight", "this", "next", "now", "right", "on", "over", "during", "and",
    "will", "is", "are", "the", "later", "currently", "please", "like", "going", "with", "by",
    "morning", "afternoon", "evening", "night", "noon", "midnight", "weekend", "week", "hourly",
    "daily",
];

/// Capitalised words that never start a place name
const NON_PLACE_WORDS: &[&str] = &[
    "what", "what's", "whats", "how", "how's", "is", "will", "does", "do", "tell", "show", "give",
    "the", "weather", "forecast", "today", "tomorrow", "i", "i'm", "please", "can", "could",
    "would", "should", "it", "it's", "hi", "hello", "hey", "thanks", "thank", "and", "any",
    "yes", "no", "ok", "okay", "my", "me", "mean", "one", "a", "an",
];

/// Words that carry no request beyond "the weather at this place"
const GENERIC_WORDS: &[&str] = &[
    "what", "what's", "whats", "is", "the", "weather", "like", "how", "how's", "current",
    "currently", "tell", "me", "about", "please", "show", "give", "get", "forecast", "a", "an",
    "can", "you", "could", "i", "know", "want", "to", "there", "right", "now", "today", "hi",
    "hello", "hey", "it", "it's", "in", "for", "at", "of", "and", "then", "also", "instead",
];

/// Lead-ins a clarification reply may start with
const CONTEXT_LEAD_INS: &[&str] = &[
    "i mean the one in",
    "i meant the one in",
    "the one in",
    "i mean",
    "i meant",
    "it's in",
    "its in",
    "it is in",
    "in",
];

/// Result of parsing one utterance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    /// The utterance mentions the weather
    pub weather_intent: bool,
    /// Place name found in the text
    pub place: Option<String>,
    /// Region or country given after the place ("Springfield, Illinois")
    pub context: Option<String>,
    /// Coordinates typed by the user
    pub coordinates: Option<(f64, f64)>,
    /// Residual request beyond the place
    pub other_information: Option<String>,
}

impl ParsedQuery {
    /// Whether anything locates the request on a map
    #[must_use]
    pub fn has_location(&self) -> bool {
        self.place.is_some() || self.coordinates.is_some()
    }

    /// Convert into a place query for the resolver
    #[must_use]
    pub fn into_place_query(self, text: &str) -> PlaceQuery {
        PlaceQuery {
            text: text.to_string(),
            place: self.place,
            context: self.context,
            coordinates: self.coordinates,
            other_information: self.other_information,
        }
    }
}

/// Query parsing utilities
pub struct QueryParser;

impl QueryParser {
    /// Parse a user utterance
    #[must_use]
    pub fn parse(input: &str) -> ParsedQuery {
        let input = input.trim();
        let tokens = tokenize(input);
        let weather_intent = tokens.iter().any(|t| WEATHER_WORDS.contains(&t.lower.as_str()));

        let found = Self::place_after_preposition(&tokens).or_else(|| Self::capitalised_run(&tokens));

        if let Some(((lat, lon), span)) = Self::find_coordinates(&tokens) {
            // "Paris on June 5, 2024": an out-of-range pair loses to a place named elsewhere
            let place_elsewhere = found
                .as_ref()
                .is_some_and(|(_, (start, end))| *end <= span.0 || *start >= span.1);
            if validate_coordinates(lat, lon).is_ok() || !place_elsewhere {
                return ParsedQuery {
                    weather_intent,
                    coordinates: Some((lat, lon)),
                    other_information: residual(&tokens, Some(span)),
                    ..ParsedQuery::default()
                };
            }
        }

        let Some((place, span)) = found else {
            return ParsedQuery {
                weather_intent,
                other_information: residual(&tokens, None),
                ..ParsedQuery::default()
            };
        };
        let (place, context) = split_context(&place);

        ParsedQuery {
            weather_intent,
            place: Some(place),
            context,
            coordinates: None,
            other_information: residual(&tokens, Some(span)),
        }
    }

    /// Whether the whole utterance reads like a bare place name ("Paris", "Springfield, Illinois")
    #[must_use]
    pub fn is_bare_place(input: &str) -> bool {
        let tokens = tokenize(input.trim());
        if tokens.is_empty() || tokens.len() > 5 {
            return false;
        }
        Self::capitalised_run(&tokens).is_some_and(|(_, span)| span == (0, tokens.len()))
    }

    /// Extract the disambiguating hint from a clarification reply ("it's in France" -> "France").
    ///
    /// Only a lead-in phrase or a bare place name counts as a reply; anything
    /// else yields `None`.
    #[must_use]
    pub fn clarification_context(input: &str) -> Option<String> {
        let trimmed = input
            .trim()
            .trim_end_matches(['.', '!', '?'])
            .trim();
        let after_lead_in = CONTEXT_LEAD_INS.iter().find_map(|lead_in| {
            let head = trimmed.get(..lead_in.len())?;
            let rest = &trimmed[lead_in.len()..];
            (head.eq_ignore_ascii_case(lead_in) && rest.starts_with(char::is_whitespace))
                .then(|| rest.trim())
        });
        let context = match after_lead_in {
            Some(rest) => rest,
            None if Self::is_bare_place(trimmed) => trimmed,
            None => return None,
        };
        let context = context
            .trim_start_matches("the ")
            .trim_end_matches(" please")
            .trim()
            .trim_matches(',');
        if context.is_empty() {
            None
        } else {
            Some(context.to_string())
        }
    }

    /// Find a "lat, lon" pair, returning it with its token span.
    ///
    /// The numbers must be comma separated or carry a decimal point, so
    /// "June 5 2024" is not a pair.
    fn find_coordinates(tokens: &[Token]) -> Option<((f64, f64), (usize, usize))> {
        tokens.windows(2).enumerate().find_map(|(i, pair)| {
            let lat = parse_number(&pair[0].text)?;
            let lon = parse_number(&pair[1].text)?;
            let decimal = pair.iter().any(|t| t.text.contains('.'));
            (pair[0].comma || decimal).then_some(((lat, lon), (i, i + 2)))
        })
    }

    /// Place phrase after the last place preposition ("weather in New York tomorrow")
    fn place_after_preposition(tokens: &[Token]) -> Option<(String, (usize, usize))> {
        let starts = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| PLACE_PREPOSITIONS.contains(&t.lower.as_str()))
            .map(|(i, _)| i + 1);

        let mut phrases = Vec::new();
        for start in starts {
            let mut end = start;
            while end < tokens.len() {
                let token = &tokens[end];
                if PLACE_TERMINATORS.contains(&token.lower.as_str())
                    || WEATHER_WORDS.contains(&token.lower.as_str())
                {
                    break;
                }
                end += 1;
                if token.ends_clause && !token.text.ends_with(',') {
                    break;
                }
            }
            if end > start {
                phrases.push((start, end));
            }
        }

        // "cold in Paris at night": a capitalised phrase beats a trailing lowercase one
        let (start, end) = phrases
            .iter()
            .rev()
            .find(|(start, _)| tokens[*start].text.starts_with(char::is_uppercase))
            .or_else(|| phrases.last())
            .copied()?;
        Some((join(&tokens[start..end]), (start - 1, end)))
    }

    /// Longest run of capitalised words that are not question words ("Paris weather")
    fn capitalised_run(tokens: &[Token]) -> Option<(String, (usize, usize))> {
        let mut best: Option<(usize, usize)> = None;
        let mut i = 0;
        while i < tokens.len() {
            if !is_place_word(&tokens[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < tokens.len() && is_place_word(&tokens[i]) {
                i += 1;
                if tokens[i - 1].ends_clause && !tokens[i - 1].text.ends_with(',') {
                    break;
                }
            }
            if best.is_none_or(|(s, e)| i - start > e - s) {
                best = Some((start, i));
            }
        }
        best.map(|(start, end)| (join(&tokens[start..end]), (start, end)))
    }
}

#[derive(Debug, Clone)]
struct Token {
    /// Word with surrounding punctuation stripped
    text: String,
    lower: String,
    /// Word was followed by punctuation that ends a phrase
    ends_clause: bool,
    /// Word was followed by a comma
    comma: bool,
}

fn tokenize(input: &str) -> Vec<Token> {
    input
        .split_whitespace()
        .filter_map(|raw| {
            let ends_clause = raw.ends_with([',', '?', '!', '.', ';']);
            let comma = raw.ends_with(',');
            let text = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '.' && c != '\'')
                .trim_end_matches(['.', '\''])
                .to_string();
            if text.is_empty() {
                return None;
            }
            // keep the comma so coordinate pairs and "City, Region" survive
            let text = if comma && parse_number(&text).is_none() {
                format!("{text},")
            } else {
                text
            };
            let lower = text.trim_end_matches(',').to_lowercase();
            Some(Token {
                text,
                lower,
                ends_clause,
                comma,
            })
        })
        .collect()
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim_end_matches(',')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Split "Springfield, Illinois" into the place and its region or country
fn split_context(place: &str) -> (String, Option<String>) {
    match place.split_once(',') {
        Some((name, context)) if !name.trim().is_empty() && !context.trim().is_empty() => {
            (name.trim().to_string(), Some(context.trim().to_string()))
        }
        _ => (place.trim_end_matches(',').to_string(), None),
    }
}

fn is_place_word(token: &Token) -> bool {
    token.text.chars().next().is_some_and(char::is_uppercase)
        && !NON_PLACE_WORDS.contains(&token.lower.as_str())
        && !WEATHER_WORDS.contains(&token.lower.as_str())
}

fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(',')
        .to_string()
}

/// What is left of the utterance once the place phrase is removed
fn residual(tokens: &[Token], span: Option<(usize, usize)>) -> Option<String> {
    let kept: Vec<&Token> = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| span.is_none_or(|(start, end)| *i < start || *i >= end))
        .map(|(_, t)| t)
        .collect();

    let meaningful = kept
        .iter()
        .any(|t| !GENERIC_WORDS.contains(&t.lower.trim_end_matches(',')));
    if !meaningful {
        return None;
    }

    Some(
        kept.iter()
            .map(|t| t.text.trim_end_matches(','))
            .collect::<Vec<_>>()
            .join(" "),
    )
}
