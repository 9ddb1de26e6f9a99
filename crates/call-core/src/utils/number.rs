//! Dial string handling: validation, normalization and post-dial digits

use crate::errors::{CallError, CallResult};

const PAUSE: char = ',';
const WAIT: char = ';';

/// A validated dial string split into the number to dial and the post-dial
/// sequence sent once the call connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialString {
    pub number: String,
    /// Starts with the separator that introduced it (`,` or `;`)
    pub post_dial: Option<String>,
}

impl DialString {
    /// Validate and normalize a dial string.
    ///
    /// Spaces, dashes and parentheses are dropped, `P`/`W` become `,`/`;`.
    /// `+` is only accepted as the first character.
    pub fn parse(input: &str, max_len: usize) -> CallResult<Self> {
        if input.trim().is_empty() {
            return Err(CallError::invalid_argument("phone number is empty"));
        }
        if input.chars().count() > max_len {
            return Err(CallError::invalid_argument(format!(
                "phone number longer than {} characters",
                max_len
            )));
        }

        let mut normalized = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                ' ' | '-' | '(' | ')' => {}
                '0'..='9' | '*' | '#' | PAUSE | WAIT => normalized.push(c),
                'P' | 'p' => normalized.push(PAUSE),
                'W' | 'w' => normalized.push(WAIT),
                '+' if normalized.is_empty() => normalized.push(c),
                _ => {
                    return Err(CallError::invalid_argument(format!(
                        "illegal character '{}' in phone number",
                        c
                    )));
                }
            }
        }

        let split_at = normalized.find([PAUSE, WAIT]);
        let (number, post_dial) = match split_at {
            Some(idx) => (normalized[..idx].to_string(), Some(normalized[idx..].to_string())),
            None => (normalized, None),
        };
        if number.is_empty() || number == "+" {
            return Err(CallError::invalid_argument("phone number has no digits"));
        }
        Ok(Self { number, post_dial })
    }
}

/// Next chunk of a post-dial sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDialSplit {
    /// Digits (and pauses) to hand to the radio now; may be empty
    pub send_now: String,
    /// What follows the next wait, if there is one
    pub after_wait: Option<String>,
}

impl PostDialSplit {
    /// Split at the first wait character
    pub fn next(sequence: &str) -> Self {
        match sequence.find(WAIT) {
            Some(idx) => Self {
                send_now: sequence[..idx].to_string(),
                after_wait: Some(sequence[idx + WAIT.len_utf8()..].to_string()),
            },
            None => Self {
                send_now: sequence.to_string(),
                after_wait: None,
            },
        }
    }

    /// True when `send_now` holds at least one tone
    pub fn has_digits(&self) -> bool {
        self.send_now.chars().any(|c| c != PAUSE)
    }
}

/// Legal DTMF tone characters
pub fn is_dtmf_char(c: char) -> bool {
    matches!(c, '0'..='9' | '*' | '#' | 'A'..='D')
}
