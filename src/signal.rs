//! Terminal-signal grammar shared by the iteration loop and the review engine.
//!
//! A pure function over an agent's accumulated response text: scans for the
//! first occurrence (case-insensitive, whitespace-tolerant) of one of the
//! terminal-grammar tokens and returns a deterministic `Signal`. Kept as one
//! table of case-insensitive regex scanners so both contexts share the exact
//! same grammar, per the subprocess-I/O design notes for this codebase.

use once_cell::sync::Lazy;
use regex::Regex;

/// The context a response is being parsed in. The default signal when no
/// terminal token is present differs by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    Iteration,
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Complete,
    Continue,
    Blocked { reason: String },
    Approve { summary: String },
    Reject { reason: String },
}

pub const NO_REVIEW_SIGNAL_REASON: &str = "no review signal";

struct GrammarEntry {
    regex: &'static Lazy<Regex>,
    build: fn(&regex::Captures) -> Signal,
}

static COMPLETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*complete\s*/?\s*>").expect("valid regex"));
static CONTINUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*continue\s*/?\s*>").expect("valid regex"));
static BLOCKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<\s*blocked\s+reason\s*=\s*"([^"]*)"\s*/?\s*>"#).expect("valid regex")
});
static APPROVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<\s*approve\s+summary\s*=\s*"([^"]*)"\s*/?\s*>"#).expect("valid regex")
});
static REJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<\s*reject\s+reason\s*=\s*"([^"]*)"\s*/?\s*>"#).expect("valid regex")
});

fn grammar() -> [GrammarEntry; 5] {
    [
        GrammarEntry {
            regex: &COMPLETE_RE,
            build: |_| Signal::Complete,
        },
        GrammarEntry {
            regex: &CONTINUE_RE,
            build: |_| Signal::Continue,
        },
        GrammarEntry {
            regex: &BLOCKED_RE,
            build: |c| Signal::Blocked {
                reason: c[1].to_string(),
            },
        },
        GrammarEntry {
            regex: &APPROVE_RE,
            build: |c| Signal::Approve {
                summary: c[1].to_string(),
            },
        },
        GrammarEntry {
            regex: &REJECT_RE,
            build: |c| Signal::Reject {
                reason: c[1].to_string(),
            },
        },
    ]
}

/// Scans `text` for the first terminal token in document order and returns
/// the corresponding `Signal`. Always returns a value: absence of any token
/// falls back to the context-appropriate default.
pub fn parse_signal(text: &str, context: ParseContext) -> Signal {
    let mut best: Option<(usize, Signal)> = None;

    for entry in grammar() {
        if let Some(caps) = entry.regex.captures(text) {
            let whole = caps.get(0).expect("capture 0 always present");
            let signal = (entry.build)(&caps);
            if best.as_ref().map(|(pos, _)| whole.start() < *pos).unwrap_or(true) {
                best = Some((whole.start(), signal));
            }
        }
    }

    match best {
        Some((_, signal)) => signal,
        None => match context {
            ParseContext::Iteration => Signal::Continue,
            ParseContext::Review => Signal::Reject {
                reason: NO_REVIEW_SIGNAL_REASON.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_is_recognized() {
        let signal = parse_signal("all done. <complete/>", ParseContext::Iteration);
        assert_eq!(signal, Signal::Complete);
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let signal = parse_signal("ok < COMPLETE  />", ParseContext::Iteration);
        assert_eq!(signal, Signal::Complete);
    }

    #[test]
    fn blocked_captures_reason() {
        let signal = parse_signal(
            r#"working... <blocked reason="missing api key"/>"#,
            ParseContext::Iteration,
        );
        assert_eq!(
            signal,
            Signal::Blocked {
                reason: "missing api key".to_string()
            }
        );
    }

    #[test]
    fn first_match_in_document_order_wins() {
        let signal = parse_signal(
            r#"<continue/> then later <complete/>"#,
            ParseContext::Iteration,
        );
        assert_eq!(signal, Signal::Continue);
    }

    #[test]
    fn default_in_iteration_context_is_continue() {
        let signal = parse_signal("just some prose with no signal", ParseContext::Iteration);
        assert_eq!(signal, Signal::Continue);
    }

    #[test]
    fn default_in_review_context_is_reject() {
        let signal = parse_signal("just some prose with no signal", ParseContext::Review);
        assert_eq!(
            signal,
            Signal::Reject {
                reason: NO_REVIEW_SIGNAL_REASON.to_string()
            }
        );
    }

    #[test]
    fn approve_captures_summary() {
        let signal = parse_signal(
            r#"<approve summary="looks good"/>"#,
            ParseContext::Review,
        );
        assert_eq!(
            signal,
            Signal::Approve {
                summary: "looks good".to_string()
            }
        );
    }

    #[test]
    fn reject_captures_reason() {
        let signal = parse_signal(r#"<reject reason="missing tests"/>"#, ParseContext::Review);
        assert_eq!(
            signal,
            Signal::Reject {
                reason: "missing tests".to_string()
            }
        );
    }

    #[test]
    fn is_deterministic_and_idempotent_over_repeated_parses() {
        let text = r#"<blocked reason="x"/>"#;
        let first = parse_signal(text, ParseContext::Iteration);
        let second = parse_signal(text, ParseContext::Iteration);
        assert_eq!(first, second);
    }
}
