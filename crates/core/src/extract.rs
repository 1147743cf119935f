use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::intent::{contains_any, contains_phrase, find_phrase, normalize_text, title_case, tokenize};
use crate::models::{ExtractedSlots, SlotValue, Utterance};
use crate::registry::{SlotRule, TemplateDefinition};

const CITIES: &[&str] = &[
    "amsterdam",
    "austin",
    "bangalore",
    "berlin",
    "boston",
    "chicago",
    "delhi",
    "denver",
    "dubai",
    "dublin",
    "hong kong",
    "lisbon",
    "london",
    "los angeles",
    "madrid",
    "miami",
    "mumbai",
    "new york",
    "paris",
    "portland",
    "rome",
    "san francisco",
    "seattle",
    "singapore",
    "sydney",
    "tokyo",
    "toronto",
    "vancouver",
];

const COMPANY_TICKERS: &[(&str, &str)] = &[
    ("alphabet", "GOOGL"),
    ("amazon", "AMZN"),
    ("apple", "AAPL"),
    ("facebook", "META"),
    ("google", "GOOGL"),
    ("ibm", "IBM"),
    ("meta", "META"),
    ("microsoft", "MSFT"),
    ("netflix", "NFLX"),
    ("nvidia", "NVDA"),
    ("tesla", "TSLA"),
];

// Upper-case tokens that are never tickers.
const TICKER_STOPLIST: &[&str] = &[
    "A", "AI", "AM", "CEO", "EPS", "ETF", "EU", "I", "IPO", "NASDAQ", "NYSE", "OK", "PM", "UK",
    "US", "USD",
];

const CUISINES: &[&str] = &[
    "american",
    "bbq",
    "burger",
    "chinese",
    "french",
    "greek",
    "indian",
    "italian",
    "japanese",
    "korean",
    "mexican",
    "pizza",
    "ramen",
    "seafood",
    "steak",
    "sushi",
    "tacos",
    "thai",
    "vegan",
    "vietnamese",
];

const HIGH_SEVERITY: &[&str] = &[
    "critical",
    "emergency",
    "on fire",
    "outage",
    "crashed",
    "breach",
    "overheating",
    "overheated",
    "failed",
    "failure",
    "is down",
    "went down",
    "urgent",
];
const MEDIUM_SEVERITY: &[&str] = &["warning", "degraded", "slow", "elevated", "error", "failing"];
const LOW_SEVERITY: &[&str] = &["minor", "notice", "info", "low"];

const REPORT_NOUNS: &[&str] = &[
    "report",
    "summary",
    "dashboard",
    "metrics",
    "analytics",
    "statistics",
    "stats",
    "breakdown",
];
const REPORT_SUBJECTS: &[&str] = &["sales", "revenue", "kpi", "kpis", "traffic", "usage"];
const FILLER: &[&str] = &[
    "a", "an", "the", "me", "my", "our", "your", "show", "get", "give", "see", "view", "latest",
    "this", "that", "for", "of",
];

const WHEN_WORDS: &[&str] = &["today", "tonight", "tomorrow", "weekend"];

static FLIGHT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b((?:[A-Z]{2}|[A-Z][0-9]|[0-9][A-Z])\s?[0-9]{1,4})\b")
        .expect("valid flight number regex")
});
static FLIGHT_AFTER_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bflight\s+([a-z0-9]{2}\s?[0-9]{1,4})\b").expect("valid flight keyword regex")
});
static CASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z]{1,5})\b").expect("valid cashtag regex"));
static UPPER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{1,5}(?:\.[A-Z])?)\b").expect("valid ticker regex"));
static PLACE_AFTER_PREPOSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:in|at|for|about|near)\s+([A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*)")
        .expect("valid place regex")
});
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid date regex"));
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));
static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)").expect("valid currency regex"));
static PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(q[1-4](?:\s+(?:19|20)\d{2})?|(?:this|last|next)\s+(?:week|month|quarter|year)|(?:january|february|march|april|may|june|july|august|september|october|november|december)(?:\s+(?:19|20)\d{2})?|(?:19|20)\d{2})\b",
    )
    .expect("valid period regex")
});
static TREND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(up|down)\s+(\d+(?:\.\d+)?)\s*%").expect("valid trend regex")
});
static COMPONENT_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:module|service|server|component|node|host)\s+([A-Za-z0-9][A-Za-z0-9_.\-]*)")
        .expect("valid component regex")
});
static COMPONENT_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z0-9][A-Za-z0-9_.\-]*)\s+(?:module|service|server|component|node|host)\b")
        .expect("valid component regex")
});
static HERO_TOPIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:about|to|on)\s+([A-Z][\w-]*(?:\s+[A-Z][\w-]*)*)").expect("valid topic regex")
});
static FORM_SUBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(feedback|survey|form|questionnaire|registration)\s+(?:for|about|on)\s+(?:the\s+|our\s+|my\s+)?([a-z0-9][a-z0-9 '\-]*?)(?:\s+with\b|[.?!,]|$)",
    )
    .expect("valid form subject regex")
});
static FORM_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwith\s+(?:the\s+)?(?:fields?\s+(?:for\s+)?)?(.+?)(?:\s+fields?)?\s*[.?!]?$")
        .expect("valid form fields regex")
});
static TOP_N: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btop\s+(\d{1,2})\s+([a-z][a-z ]*?)(?:\s+(?:for|in|of|this|today)\b|[.?!,]|$)")
        .expect("valid top-n regex")
});
static LIST_NOUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(tasks|to-?dos?|to do list|reminders|errands|priorities|items)\b(?:\s+for\s+([a-z][a-z0-9 ]*?))?(?:[.?!,]|$)",
    )
    .expect("valid list noun regex")
});
static COUNTED_ITEMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s+(?:tasks|items|things|reminders|errands)\b")
        .expect("valid item count regex")
});
static AFTER_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*(.+?)\s*[.?!]?$").expect("valid colon regex"));
static ENUMERATION_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:,|;|\band\b|\bor\b)\s*").expect("valid split regex"));

#[derive(Debug, Clone)]
pub struct SlotExtractor {
    context_carry: bool,
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self {
            context_carry: true,
        }
    }
}

struct Scan {
    text: String,
    tokens: Vec<String>,
}

impl SlotExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_carry(mut self, enabled: bool) -> Self {
        self.context_carry = enabled;
        self
    }

    pub fn extract(&self, utterance: &Utterance, definition: &TemplateDefinition) -> ExtractedSlots {
        let text = normalize_text(&utterance.text);
        let scan = Scan {
            tokens: tokenize(&text),
            text,
        };

        let mut slots = ExtractedSlots::new();
        for spec in &definition.slots {
            if let Some(value) = apply(spec.rule, &scan) {
                slots.insert(spec.name, value);
            }
        }

        if let Some(context) = utterance.context.as_ref().filter(|_| self.context_carry) {
            if context.previous_template_id == definition.id {
                for spec in definition.slots.iter().filter(|spec| spec.carry && !spec.is_live()) {
                    if slots.contains(spec.name) {
                        continue;
                    }
                    if let Some(value) = context.previous_slots.get(spec.name) {
                        slots.insert(spec.name, value.clone());
                    }
                }
            }
        }

        slots
    }
}

fn apply(rule: SlotRule, scan: &Scan) -> Option<SlotValue> {
    match rule {
        SlotRule::Utterance => utterance_text(scan).map(SlotValue::from),
        SlotRule::HeroTopic => hero_topic(scan).map(SlotValue::from),
        SlotRule::HeroTitle => {
            hero_topic(scan).map(|topic| SlotValue::from(format!("Welcome to {topic}")))
        }
        SlotRule::Severity => severity(scan).map(SlotValue::from),
        SlotRule::Component => component(scan).map(SlotValue::from),
        SlotRule::Measurement => first_number(&scan.text).map(SlotValue::from),
        SlotRule::ReportTitle => report_title(scan).map(SlotValue::from),
        SlotRule::Period => period(scan).map(SlotValue::from),
        SlotRule::Amount => amount(scan).map(SlotValue::from),
        SlotRule::Trend => trend(scan).map(SlotValue::from),
        SlotRule::FormTitle => form_subject(scan)
            .map(|(kind, subject)| SlotValue::from(format!("{} for {}", title_case(&kind), subject))),
        SlotRule::FormSubject => form_subject(scan).map(|(_, subject)| SlotValue::from(subject)),
        SlotRule::FormFields => form_fields(scan).map(SlotValue::from),
        SlotRule::ListTitle => list_title(scan).map(SlotValue::from),
        SlotRule::Count => list_count(scan).map(SlotValue::from),
        SlotRule::ListItems => list_items(scan).map(SlotValue::from),
        SlotRule::FlightNumber => flight_number(scan).map(SlotValue::from),
        SlotRule::Place => place(scan).map(SlotValue::from),
        SlotRule::IsoDate => iso_date(scan).map(SlotValue::from),
        SlotRule::When => when(scan).map(SlotValue::from),
        SlotRule::Ticker => ticker(scan).map(SlotValue::from),
        SlotRule::Cuisine => cuisine(scan).map(|cuisine| SlotValue::from(title_case(cuisine))),
        SlotRule::RestaurantQuery => restaurant_query(scan).map(SlotValue::from),
        SlotRule::PopupTool => popup_tool(scan).map(SlotValue::from),
        SlotRule::PopupTitle => popup_tool(scan).map(|tool| SlotValue::from(popup_copy(tool).0)),
        SlotRule::PopupText => popup_tool(scan).map(|tool| SlotValue::from(popup_copy(tool).1)),
        SlotRule::PopupButton => popup_tool(scan).map(|tool| SlotValue::from(popup_copy(tool).2)),
        SlotRule::Live | SlotRule::Derived => None,
    }
}

fn utterance_text(scan: &Scan) -> Option<String> {
    (!scan.tokens.is_empty()).then(|| scan.text.clone())
}

fn hero_topic(scan: &Scan) -> Option<String> {
    HERO_TOPIC
        .captures(&scan.text)
        .map(|caps| caps[1].to_string())
}

fn severity(scan: &Scan) -> Option<&'static str> {
    let tokens = &scan.tokens;
    if let Some(position) = find_phrase(tokens, "severity") {
        if let Some(level) = tokens
            .get(position + 1)
            .filter(|level| ["low", "medium", "high"].contains(&level.as_str()))
        {
            return match level.as_str() {
                "low" => Some("low"),
                "medium" => Some("medium"),
                _ => Some("high"),
            };
        }
    }

    if contains_any(tokens, HIGH_SEVERITY) {
        Some("high")
    } else if contains_any(tokens, MEDIUM_SEVERITY) {
        Some("medium")
    } else if contains_any(tokens, LOW_SEVERITY) {
        Some("low")
    } else {
        None
    }
}

fn component(scan: &Scan) -> Option<String> {
    let after = COMPONENT_AFTER
        .captures(&scan.text)
        .map(|caps| caps[1].to_string())
        .filter(|name| !is_filler(name));
    let before = || {
        COMPONENT_BEFORE
            .captures(&scan.text)
            .map(|caps| caps[1].to_string())
            .filter(|name| !is_filler(name))
    };

    after
        .or_else(before)
        .or_else(|| contains_phrase(&scan.tokens, "system").then(|| "System".to_string()))
        .map(|name| name.trim_end_matches(|ch: char| ch.is_ascii_punctuation()).to_string())
        .filter(|name| !name.is_empty())
}

fn is_filler(word: &str) -> bool {
    let lowered = word.to_lowercase();
    FILLER.contains(&lowered.as_str()) || ["is", "was", "has", "in", "on"].contains(&lowered.as_str())
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER
        .find_iter(text)
        .filter(|found| !is_inside_identifier(text, found.start(), found.end()))
        .find_map(|found| found.as_str().parse::<f64>().ok())
}

fn is_inside_identifier(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|ch| ch.is_ascii_alphabetic()) || after.is_some_and(|ch| ch.is_ascii_alphabetic())
}

fn report_title(scan: &Scan) -> Option<String> {
    let tokens = &scan.tokens;
    if let Some((position, noun)) = tokens
        .iter()
        .enumerate()
        .find(|(_, token)| REPORT_NOUNS.contains(&token.as_str()))
    {
        let subject = position
            .checked_sub(1)
            .and_then(|prev| tokens.get(prev))
            .filter(|word| !FILLER.contains(&word.as_str()) && !word.chars().all(|ch| ch.is_ascii_digit()));
        return Some(match subject {
            Some(subject) => title_case(&format!("{subject} {noun}")),
            None => title_case(noun),
        });
    }

    REPORT_SUBJECTS
        .iter()
        .find(|subject| contains_phrase(tokens, subject))
        .map(|subject| title_case(&format!("{subject} summary")))
}

fn period(scan: &Scan) -> Option<String> {
    PERIOD.captures(&scan.text).map(|caps| {
        let raw = normalize_text(&caps[1]);
        let mut chars = raw.chars();
        let quarter = matches!(
            (chars.next(), chars.next()),
            (Some('q' | 'Q'), Some(digit)) if digit.is_ascii_digit()
        );
        if quarter {
            raw.to_uppercase()
        } else {
            title_case(&raw.to_lowercase())
        }
    })
}

fn amount(scan: &Scan) -> Option<String> {
    CURRENCY
        .captures(&scan.text)
        .map(|caps| caps[1].replace(',', ""))
}

fn trend(scan: &Scan) -> Option<String> {
    if let Some(caps) = TREND.captures(&scan.text) {
        return Some(format!("{} {}%", title_case(&caps[1].to_lowercase()), &caps[2]));
    }

    let tokens = &scan.tokens;
    if contains_any(tokens, &["growing", "increasing", "rising", "up"]) {
        Some("Up".to_string())
    } else if contains_any(tokens, &["declining", "decreasing", "falling", "down"]) {
        Some("Down".to_string())
    } else {
        None
    }
}

fn form_subject(scan: &Scan) -> Option<(String, String)> {
    FORM_SUBJECT.captures(&scan.text).and_then(|caps| {
        let subject = caps[2].trim();
        (!subject.is_empty()).then(|| (caps[1].to_lowercase(), title_case(subject)))
    })
}

fn form_fields(scan: &Scan) -> Option<Vec<String>> {
    let caps = FORM_FIELDS.captures(&scan.text)?;
    let fields = split_enumeration(&caps[1])
        .into_iter()
        .filter(|field| field.split_whitespace().count() <= 3)
        .map(|field| field.to_lowercase())
        .collect::<Vec<_>>();
    (!fields.is_empty()).then_some(fields)
}

fn split_enumeration(input: &str) -> Vec<String> {
    ENUMERATION_SPLIT
        .split(input)
        .map(|part| {
            part.trim()
                .trim_matches(|ch: char| ch.is_ascii_punctuation())
                .trim()
                .to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}

fn list_title(scan: &Scan) -> Option<String> {
    if let Some(caps) = TOP_N.captures(&scan.text) {
        return Some(format!("Top {} {}", &caps[1], title_case(caps[2].trim())));
    }

    LIST_NOUN.captures(&scan.text).map(|caps| {
        let noun = title_case(&caps[1].to_lowercase());
        match caps.get(2).map(|owner| owner.as_str().trim()).filter(|owner| !owner.is_empty()) {
            Some(owner) => format!("{noun} for {}", title_case(owner)),
            None => noun,
        }
    })
}

fn list_count(scan: &Scan) -> Option<f64> {
    TOP_N
        .captures(&scan.text)
        .or_else(|| COUNTED_ITEMS.captures(&scan.text))
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

fn list_items(scan: &Scan) -> Option<Vec<String>> {
    let caps = AFTER_COLON.captures(&scan.text)?;
    let items = split_enumeration(&caps[1]);
    (items.len() > 1).then_some(items)
}

fn flight_number(scan: &Scan) -> Option<String> {
    FLIGHT_NUMBER
        .captures(&scan.text)
        .or_else(|| FLIGHT_AFTER_KEYWORD.captures(&scan.text))
        .map(|caps| {
            caps[1]
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|number| number.chars().any(|ch| ch.is_ascii_digit()))
}

fn place(scan: &Scan) -> Option<String> {
    if let Some(city) = CITIES
        .iter()
        .find(|city| contains_phrase(&scan.tokens, city))
    {
        return Some(title_case(city));
    }

    PLACE_AFTER_PREPOSITION
        .captures_iter(&scan.text)
        .map(|caps| caps[1].to_string())
        .find(|candidate| {
            let lowered = candidate.to_lowercase();
            !WHEN_WORDS.contains(&lowered.as_str()) && !is_weekday(&lowered)
        })
}

fn is_weekday(word: &str) -> bool {
    [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ]
    .contains(&word)
}

fn iso_date(scan: &Scan) -> Option<NaiveDate> {
    ISO_DATE
        .captures(&scan.text)
        .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok())
}

fn when(scan: &Scan) -> Option<&'static str> {
    WHEN_WORDS
        .iter()
        .copied()
        .find(|word| contains_phrase(&scan.tokens, word))
}

fn ticker(scan: &Scan) -> Option<String> {
    if let Some(caps) = CASHTAG.captures(&scan.text) {
        return Some(caps[1].to_uppercase());
    }

    if let Some((_, symbol)) = COMPANY_TICKERS
        .iter()
        .find(|(company, _)| contains_phrase(&scan.tokens, company))
    {
        return Some(symbol.to_string());
    }

    UPPER_TOKEN
        .captures_iter(&scan.text)
        .map(|caps| caps[1].to_string())
        .find(|symbol| !TICKER_STOPLIST.contains(&symbol.as_str()))
}

fn cuisine(scan: &Scan) -> Option<&'static str> {
    CUISINES
        .iter()
        .copied()
        .find(|cuisine| contains_phrase(&scan.tokens, cuisine))
}

fn restaurant_query(scan: &Scan) -> Option<String> {
    if let Some(cuisine) = cuisine(scan) {
        return Some(match place(scan) {
            Some(place) => format!("{cuisine} restaurant in {place}"),
            None => format!("{cuisine} restaurant"),
        });
    }

    utterance_text(scan).map(|text| {
        text.trim_end_matches(|ch: char| ch.is_ascii_punctuation())
            .to_string()
    })
}

fn popup_tool(scan: &Scan) -> Option<&'static str> {
    let tokens = &scan.tokens;
    if contains_any(tokens, &["calendar", "schedule", "meeting", "invite", "agenda"]) {
        Some("calendar")
    } else if contains_any(tokens, &["city picker", "city selector"])
        || (contains_any(tokens, &["city", "cities"])
            && contains_any(tokens, &["select", "pick", "choose"]))
    {
        Some("city_picker")
    } else if contains_any(tokens, &["checklist", "check list"]) {
        Some("checklist")
    } else if contains_any(tokens, &["settings", "preferences", "options"]) {
        Some("settings")
    } else {
        None
    }
}

fn popup_copy(tool: &str) -> (&'static str, &'static str, &'static str) {
    match tool {
        "calendar" => (
            "Open Calendar",
            "View your upcoming events and schedule.",
            "View Calendar",
        ),
        "city_picker" => (
            "Select a City",
            "Choose a city from the list.",
            "Choose City",
        ),
        "checklist" => (
            "Open Checklist",
            "Review and tick off your checklist items.",
            "View Checklist",
        ),
        _ => (
            "Open Settings",
            "Adjust your preferences.",
            "Open Settings",
        ),
    }
}
