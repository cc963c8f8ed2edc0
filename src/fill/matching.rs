//! Pure value logic for filling: option matching, checkbox intent and
//! read-back verification.

use super::ReadBack;

/// Runs of whitespace collapsed to one space, ends trimmed.
pub fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`collapse`], lowercased.
pub fn normalize(text: &str) -> String {
    collapse(text).to_lowercase()
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Index of the option that best matches `wanted`: an exact match ignoring
/// case and whitespace, else the first option containing `wanted`.
/// Blank options never match.
pub fn match_option(options: &[String], wanted: &str) -> Option<usize> {
    let exact = squash(wanted);
    if exact.is_empty() {
        return None;
    }
    if let Some(index) = options.iter().position(|o| squash(o) == exact) {
        return Some(index);
    }
    let needle = normalize(wanted);
    options
        .iter()
        .position(|o| !o.trim().is_empty() && normalize(o).contains(&needle))
}

/// Desired checked state for a checkbox answer. Anything that is not an
/// explicit negative means "check it".
pub fn checkbox_intent(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "no" | "false" | "0" | "off" | "unchecked"
    )
}

pub fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// What the control should report after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Text(String),
    Phone(String),
    Choice(String),
    Checked(bool),
    File(String),
}

impl Expected {
    pub fn matches(&self, read: &ReadBack) -> bool {
        match (self, read) {
            (Expected::Text(want), ReadBack::Text(got)) => collapse(want) == collapse(got),
            (Expected::Phone(want), ReadBack::Text(got)) => {
                let (want, got) = (digits(want), digits(got));
                // Masked inputs may prepend a country code.
                !want.is_empty() && got.ends_with(&want)
            }
            (Expected::Choice(want), ReadBack::Choice(Some(got))) => normalize(want) == normalize(got),
            (Expected::Checked(want), ReadBack::Checked(got)) => want == got,
            (Expected::File(name), ReadBack::Files(names)) => names.iter().any(|n| n == name),
            _ => false,
        }
    }
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Text(v) | Expected::Phone(v) | Expected::Choice(v) | Expected::File(v) => {
                write!(f, "{v:?}")
            }
            Expected::Checked(v) => write!(f, "{v}"),
        }
    }
}
