//! Maps raw log text to a state class and an accent colour.
//!
//! Log lines produced by the agent carry a leading pictograph describing what
//! the agent is doing. The first such symbol is looked up in a fixed table;
//! anything unknown degrades to [`StateClass::Neutral`].

use serde::{Deserialize, Serialize};

use crate::Rgb;

/// Coarse effect a token has on the activity channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateClass {
    Working,
    Idle,
    Neutral,
}

/// Accent families. Each maps to one colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Cognition,
    Io,
    Failure,
    Idle,
    Waiting,
}

impl Bucket {
    pub fn accent(self) -> Rgb {
        match self {
            Bucket::Cognition => CYAN,
            Bucket::Io => AMBER,
            Bucket::Failure => RED,
            Bucket::Idle => Rgb::WHITE,
            Bucket::Waiting => VIOLET,
        }
    }

    pub fn state_class(self) -> StateClass {
        match self {
            Bucket::Cognition | Bucket::Io => StateClass::Working,
            Bucket::Idle => StateClass::Idle,
            Bucket::Failure | Bucket::Waiting => StateClass::Neutral,
        }
    }
}

const CYAN: Rgb = Rgb::new(0.0, 0.898, 1.0);
const AMBER: Rgb = Rgb::new(1.0, 0.702, 0.0);
const RED: Rgb = Rgb::new(1.0, 0.09, 0.267);
const VIOLET: Rgb = Rgb::new(0.702, 0.533, 1.0);

/// Accent used when no token is found or the token is unknown.
pub const DEFAULT_ACCENT: Rgb = Rgb::new(0.878, 0.251, 0.984);

const CATEGORIES: &[(char, Bucket)] = &[
    // cognition
    ('\u{1F4AD}', Bucket::Cognition), // thought balloon
    ('\u{1F4CB}', Bucket::Cognition), // clipboard
    ('\u{1F9E9}', Bucket::Cognition), // puzzle piece
    ('\u{1F5E3}', Bucket::Cognition), // speaking head
    ('\u{1F916}', Bucket::Cognition), // robot
    ('\u{1F4A1}', Bucket::Cognition), // light bulb
    ('\u{1F9EC}', Bucket::Cognition), // dna
    ('\u{1F504}', Bucket::Cognition), // retry arrows
    ('\u{1F3AC}', Bucket::Cognition), // clapper board
    // tools and I/O
    ('\u{1F310}', Bucket::Io), // globe
    ('\u{1F52C}', Bucket::Io), // microscope
    ('\u{1F40D}', Bucket::Io), // snake
    ('\u{1F41A}', Bucket::Io), // shell
    ('\u{1F4BE}', Bucket::Io), // floppy disk
    ('\u{1F4D6}', Bucket::Io), // open book
    ('\u{1F50D}', Bucket::Io), // magnifier left
    ('\u{1F50E}', Bucket::Io), // magnifier right
    ('\u{1F440}', Bucket::Io), // eyes
    ('\u{2B07}', Bucket::Io),  // down arrow
    ('\u{1F4DD}', Bucket::Io), // memo
    ('\u{1F4CD}', Bucket::Io), // pin
    ('\u{1F4DA}', Bucket::Io), // books
    ('\u{2702}', Bucket::Io),  // scissors
    ('\u{1F9F9}', Bucket::Io), // broom
    ('\u{1F464}', Bucket::Io), // bust
    // failure
    ('\u{274C}', Bucket::Failure),  // cross mark
    ('\u{26A0}', Bucket::Failure),  // warning
    ('\u{1F6D1}', Bucket::Failure), // stop sign
    // idle
    ('\u{1F4A4}', Bucket::Idle), // zzz
    ('\u{1F3C1}', Bucket::Idle), // chequered flag
    ('\u{2705}', Bucket::Idle),  // check mark
    ('\u{1F680}', Bucket::Idle), // rocket
    // waiting
    ('\u{23F3}', Bucket::Waiting), // hourglass
];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Symbol found in the text, mapped or not.
    pub token: Option<char>,
    /// Table entry the token resolved to, if any.
    pub bucket: Option<Bucket>,
    pub state_class: StateClass,
    pub accent: Rgb,
}

impl Classification {
    pub fn neutral(token: Option<char>) -> Self {
        Self {
            token,
            bucket: None,
            state_class: StateClass::Neutral,
            accent: DEFAULT_ACCENT,
        }
    }

    /// True when the token resolved to a table entry.
    pub fn is_mapped(&self) -> bool {
        self.bucket.is_some()
    }

    pub fn is_failure(&self) -> bool {
        self.bucket == Some(Bucket::Failure)
    }
}

/// Classifies a log line. Never fails.
pub fn classify(text: &str) -> Classification {
    let Some(token) = first_symbol(text) else {
        return Classification::neutral(None);
    };

    match lookup(token) {
        Some(bucket) => Classification {
            token: Some(token),
            bucket: Some(bucket),
            state_class: bucket.state_class(),
            accent: bucket.accent(),
        },
        None => Classification::neutral(Some(token)),
    }
}

/// Returns the bucket of a token, if the table knows it.
pub fn lookup(token: char) -> Option<Bucket> {
    CATEGORIES
        .iter()
        .find(|(symbol, _)| *symbol == token)
        .map(|(_, bucket)| *bucket)
}

/// Finds the first pictographic or symbol code point in `text`.
pub fn first_symbol(text: &str) -> Option<char> {
    text.chars().find(|c| is_symbol(*c))
}

/// Arrows through miscellaneous symbols (U+2190..U+2BFF) and the
/// supplementary pictograph planes (U+1F000..U+1FAFF).
fn is_symbol(c: char) -> bool {
    matches!(c as u32, 0x2190..=0x2BFF | 0x1F000..=0x1FAFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cognition_tokens_as_working() {
        let result = classify("[INFO ] 💭 12:00:01 - [abc] THINKING");
        assert_eq!(result.token, Some('💭'));
        assert_eq!(result.state_class, StateClass::Working);
        assert_eq!(result.accent, CYAN);
    }

    #[test]
    fn strips_variation_selector() {
        // The speaking head is usually followed by U+FE0F.
        let result = classify("🗣️ asking the model");
        assert_eq!(result.token, Some('\u{1F5E3}'));
        assert_eq!(result.bucket, Some(Bucket::Cognition));

        let warning = classify("⚠️ disk almost full");
        assert!(warning.is_failure());
        assert_eq!(warning.state_class, StateClass::Neutral);
        assert_eq!(warning.accent, RED);
    }

    #[test]
    fn idle_and_io_buckets() {
        assert_eq!(classify("🏁 done").state_class, StateClass::Idle);
        assert_eq!(classify("✅ ok").accent, Rgb::WHITE);
        let io = classify("💾 writing report.md");
        assert_eq!(io.state_class, StateClass::Working);
        assert_eq!(io.accent, AMBER);
    }

    #[test]
    fn missing_token_is_neutral() {
        let result = classify("plain text without symbols");
        assert_eq!(result, Classification::neutral(None));
        assert!(!result.is_mapped());
    }

    #[test]
    fn unmapped_token_keeps_token_and_uses_default_accent() {
        let result = classify("🦀 crab");
        assert_eq!(result.token, Some('🦀'));
        assert_eq!(result.bucket, None);
        assert_eq!(result.accent, DEFAULT_ACCENT);
    }

    #[test]
    fn geometric_shapes_and_math_symbols_are_tokens() {
        for (text, token) in [
            ("▶ running step", '\u{25B6}'),
            ("■ stopped", '\u{25A0}'),
            ("∑ totals", '\u{2211}'),
            ("⟳ refresh", '\u{27F3}'),
        ] {
            let result = classify(text);
            assert_eq!(result.token, Some(token), "{text}");
            assert_eq!(result.state_class, StateClass::Neutral);
            assert_eq!(result.accent, DEFAULT_ACCENT);
        }
        assert_eq!(first_symbol("\u{218F}\u{2C00}"), None);
    }

    #[test]
    fn empty_text_is_neutral() {
        assert_eq!(classify("").state_class, StateClass::Neutral);
    }

    #[test]
    fn table_buckets_are_disjoint() {
        for (index, (symbol, _)) in CATEGORIES.iter().enumerate() {
            assert!(
                CATEGORIES[index + 1..].iter().all(|(other, _)| other != symbol),
                "{symbol} listed twice"
            );
            assert!(is_symbol(*symbol), "{symbol} would never be extracted");
        }
    }
}
