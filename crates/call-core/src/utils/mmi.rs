//! MMI (supplementary service) code recognition, 3GPP TS 22.030 section 6.5.2
//!
//! A procedure starts with `*`, `#`, `**`, `##` or `*#`, carries a two or
//! three digit service code, up to four `*`-separated information fields and
//! is terminated by `#`. Anything after the terminating `#` is kept as the
//! dial string.

use serde::{Deserialize, Serialize};

/// Procedure type selected by the MMI prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmiAction {
    /// `*`
    Activate,
    /// `#`
    Deactivate,
    /// `*#`
    Interrogate,
    /// `**`
    Register,
    /// `##`
    Erase,
}

impl MmiAction {
    pub fn prefix(&self) -> &'static str {
        match self {
            MmiAction::Activate => "*",
            MmiAction::Deactivate => "#",
            MmiAction::Interrogate => "*#",
            MmiAction::Register => "**",
            MmiAction::Erase => "##",
        }
    }
}

/// A recognized MMI request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmiCode {
    pub full_string: String,
    /// None for short codes and free-form `*...#` strings
    pub action: Option<MmiAction>,
    pub service_code: String,
    pub sia: String,
    pub sib: String,
    pub sic: String,
    pub pwd: String,
    pub dial_string: String,
}

impl MmiCode {
    fn raw(input: &str) -> Self {
        Self {
            full_string: input.to_string(),
            action: None,
            service_code: String::new(),
            sia: String::new(),
            sib: String::new(),
            sic: String::new(),
            pwd: String::new(),
            dial_string: String::new(),
        }
    }

    /// Recognize an MMI request.
    ///
    /// `has_cellular_call` widens short codes from two digits (not starting
    /// with `1`) to any one or two digit string, which in-call means a
    /// call-control request.
    pub fn parse(input: &str, has_cellular_call: bool) -> Option<Self> {
        if input.is_empty() {
            return None;
        }
        if is_short_code(input, has_cellular_call) {
            return Some(Self::raw(input));
        }
        if let Some(code) = parse_structured(input) {
            return Some(code);
        }
        let starts = input.starts_with('*') || input.starts_with('#');
        if starts && input.ends_with('#') {
            return Some(Self::raw(input));
        }
        None
    }
}

pub fn is_mmi_code(input: &str, has_cellular_call: bool) -> bool {
    MmiCode::parse(input, has_cellular_call).is_some()
}

fn is_short_code(input: &str, has_cellular_call: bool) -> bool {
    if !input.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if has_cellular_call {
        matches!(input.len(), 1 | 2)
    } else {
        input.len() == 2 && !input.starts_with('1')
    }
}

fn parse_structured(input: &str) -> Option<MmiCode> {
    // Longer prefixes first; at most one candidate can be followed by a digit
    let candidates = [
        MmiAction::Register,
        MmiAction::Erase,
        MmiAction::Interrogate,
        MmiAction::Activate,
        MmiAction::Deactivate,
    ];
    let action = candidates.into_iter().find(|a| {
        input
            .strip_prefix(a.prefix())
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit())
    })?;
    let rest = &input[action.prefix().len()..];

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if !(2..=3).contains(&digits) {
        return None;
    }
    let service_code = &rest[..digits];
    let mut rest = &rest[digits..];

    let mut fields: Vec<&str> = Vec::with_capacity(4);
    while let Some(after_star) = rest.strip_prefix('*') {
        if fields.len() == 4 {
            return None;
        }
        let len = after_star.find(['*', '#']).unwrap_or(after_star.len());
        fields.push(&after_star[..len]);
        rest = &after_star[len..];
    }
    let dial_string = rest.strip_prefix('#')?;

    let consumed = input.len() - dial_string.len();
    let mut full_string = input[..consumed].to_string();
    if dial_string.ends_with('#') {
        full_string = input.to_string();
    }

    let field = |i: usize| fields.get(i).map(|s| s.to_string()).unwrap_or_default();
    Some(MmiCode {
        full_string,
        action: Some(action),
        service_code: service_code.to_string(),
        sia: field(0),
        sib: field(1),
        sic: field(2),
        pwd: field(3),
        dial_string: dial_string.to_string(),
    })
}

/// Outcome of an MMI request as reported by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MmiCodeResult {
    Success,
    Failed,
}

/// Payload of the `mmiCodeResult` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmiCodeInfo {
    pub result: MmiCodeResult,
    pub message: String,
}

impl MmiCodeInfo {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            result: MmiCodeResult::Success,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result: MmiCodeResult::Failed,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_call_forwarding() {
        let code = MmiCode::parse("**21*12345678#", false).expect("MMI code");
        assert_eq!(code.action, Some(MmiAction::Register));
        assert_eq!(code.service_code, "21");
        assert_eq!(code.sia, "12345678");
        assert_eq!(code.sib, "");
        assert_eq!(code.full_string, "**21*12345678#");
        assert_eq!(code.dial_string, "");
    }

    #[test]
    fn test_interrogate_imei() {
        let code = MmiCode::parse("*#06#", false).expect("MMI code");
        assert_eq!(code.action, Some(MmiAction::Interrogate));
        assert_eq!(code.service_code, "06");
    }

    #[test]
    fn test_all_information_fields() {
        let code = MmiCode::parse("*330*1111*10*2*0000#", false).expect("MMI code");
        assert_eq!(code.action, Some(MmiAction::Activate));
        assert_eq!(code.service_code, "330");
        assert_eq!(
            (code.sia.as_str(), code.sib.as_str(), code.sic.as_str(), code.pwd.as_str()),
            ("1111", "10", "2", "0000")
        );
    }

    #[test]
    fn test_trailing_dial_string() {
        let code = MmiCode::parse("#31#10086", false).expect("MMI code");
        assert_eq!(code.action, Some(MmiAction::Deactivate));
        assert_eq!(code.service_code, "31");
        assert_eq!(code.full_string, "#31#");
        assert_eq!(code.dial_string, "10086");
    }

    #[test]
    fn test_short_codes() {
        assert!(is_mmi_code("22", false));
        assert!(!is_mmi_code("12", false));
        assert!(!is_mmi_code("7", false));
        assert!(is_mmi_code("1", true));
        assert!(is_mmi_code("12", true));
    }

    #[test]
    fn test_free_form_star_hash() {
        let code = MmiCode::parse("*1234#", false).expect("MMI code");
        assert_eq!(code.action, None);
        assert_eq!(code.full_string, "*1234#");
    }

    #[test]
    fn test_ordinary_numbers_are_not_mmi() {
        assert!(!is_mmi_code("10086", false));
        assert!(!is_mmi_code("112", false));
        assert!(!is_mmi_code("*21", false));
        assert!(!is_mmi_code("", true));
    }
}
