//! Turns raw control snapshots into field descriptors: label choice,
//! type classification, required detection, option cleanup, identity and
//! locator hints. Everything here is pure so it can be tested without a browser.

use std::collections::HashSet;

use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::schema::{FieldDescriptor, FieldType, LocatorHint};

/// Snapshot of one interactive control as read from the DOM.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawControl {
    pub tag: String,
    pub input_type: String,
    pub name: String,
    pub dom_id: String,
    /// `<label for>` or wrapping label. For a radio, its own option label.
    pub label: String,
    pub aria_label: String,
    pub preceding_text: String,
    pub placeholder: String,
    /// Radio group question.
    pub group_label: String,
    pub required_attr: bool,
    pub aria_required: bool,
    pub options: Vec<RawOption>,
    pub dom_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawOption {
    pub text: String,
    pub value: String,
    pub disabled: bool,
}

impl RawControl {
    fn is_radio(&self) -> bool {
        self.tag == "input" && self.input_type.eq_ignore_ascii_case("radio")
    }

    /// First non-empty label source, uncleaned so required markers survive.
    pub fn raw_question(&self) -> &str {
        if self.is_radio() {
            return self.group_label.trim();
        }
        [&self.label, &self.aria_label, &self.preceding_text, &self.placeholder]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

/// Keyword table for generic text inputs, in precedence order.
const LABEL_KEYWORDS: &[(FieldType, &[&str])] = &[
    (FieldType::Email, &["email", "e mail"]),
    (FieldType::Phone, &["phone", "telephone", "mobile", "cell"]),
    (FieldType::Url, &["url", "website", "linkedin", "github", "portfolio", "link"]),
    (FieldType::Date, &["date", "dob", "birthday"]),
];

/// Native type wins; generic text inputs fall back to label keywords.
/// `None` means the control is outside the supported taxonomy.
pub fn classify(control: &RawControl, question: &str) -> Option<FieldType> {
    match control.tag.as_str() {
        "textarea" => return Some(FieldType::Textarea),
        "select" => return Some(FieldType::Dropdown),
        "input" => {}
        _ => return None,
    }
    match control.input_type.to_ascii_lowercase().as_str() {
        "email" => Some(FieldType::Email),
        "tel" => Some(FieldType::Phone),
        "url" => Some(FieldType::Url),
        "date" | "datetime-local" | "month" | "week" => Some(FieldType::Date),
        "file" => Some(FieldType::File),
        "checkbox" => Some(FieldType::Checkbox),
        "radio" => Some(FieldType::Radio),
        "number" => Some(FieldType::Text),
        "" | "text" | "search" => Some(infer_from_label(question).unwrap_or(FieldType::Text)),
        _ => None,
    }
}

/// Whole-word keyword match over the label.
pub fn infer_from_label(question: &str) -> Option<FieldType> {
    let words = words(question);
    LABEL_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_phrase(&words, k)))
        .map(|(field_type, _)| *field_type)
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| w == n))
}

/// Any one signal is enough: native attribute, ARIA, or an asterisk in the label.
pub fn is_required(control: &RawControl) -> bool {
    control.required_attr || control.aria_required || control.raw_question().contains('*')
}

/// Strip required markers and trailing colons, collapse whitespace.
pub fn clean_question(raw: &str) -> String {
    let collapsed = raw.replace('*', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
        .trim()
        .to_string()
}

/// Option labels in DOM order without placeholders, disabled entries,
/// blanks or duplicates.
pub fn clean_options(options: &[RawOption]) -> Vec<String> {
    let mut seen = HashSet::new();
    options
        .iter()
        .enumerate()
        .filter(|(i, o)| !(*i == 0 && o.value.trim().is_empty()))
        .filter(|(_, o)| !o.disabled)
        .map(|(_, o)| o.text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .filter(|text| seen.insert(text.clone()))
        .collect()
}

/// Collapse radios sharing a name into one control whose options are the
/// individual radio labels. Position is that of the first radio.
pub fn group_radios(controls: &[RawControl]) -> Vec<RawControl> {
    let mut grouped: Vec<RawControl> = Vec::new();
    for control in controls {
        if !control.is_radio() {
            grouped.push(control.clone());
            continue;
        }
        let option = RawOption {
            text: if control.label.trim().is_empty() {
                control.aria_label.clone()
            } else {
                control.label.clone()
            },
            // Non-empty so the first radio is never mistaken for a placeholder.
            value: "radio".into(),
            disabled: false,
        };
        let existing = grouped
            .iter_mut()
            .find(|g| g.is_radio() && !control.name.is_empty() && g.name == control.name);
        match existing {
            Some(group) => {
                group.required_attr |= control.required_attr;
                group.aria_required |= control.aria_required;
                group.options.push(option);
            }
            None => {
                let mut group = control.clone();
                group.label.clear();
                group.aria_label.clear();
                group.options = vec![option];
                grouped.push(group);
            }
        }
    }
    grouped
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

fn humanize(text: &str) -> String {
    slugify(text).replace('_', " ")
}

fn synthesize_id(control: &RawControl, question: &str) -> String {
    [&control.name, &control.dom_id]
        .iter()
        .map(|s| slugify(s))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| {
            let mut hasher = Sha1::new();
            hasher.update(question.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            format!("q_{}", &digest[..10])
        })
}

fn unique_id(base: String, taken: &mut HashSet<String>) -> String {
    let mut id = base.clone();
    let mut n = 2;
    while !taken.insert(id.clone()) {
        id = format!("{base}_{n}");
        n += 1;
    }
    id
}

fn css_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Ranked re-location strategies: attribute selectors, then label text, then DOM path.
fn locator_hints(control: &RawControl, field_type: FieldType, label: Option<&str>) -> Vec<LocatorHint> {
    let mut hints = Vec::new();
    let base = if field_type == FieldType::Radio {
        "input[type=\"radio\"]".to_string()
    } else {
        control.tag.clone()
    };
    if !control.name.is_empty() {
        hints.push(LocatorHint::Css {
            selector: format!("{base}[name=\"{}\"]", css_quote(&control.name)),
        });
    }
    if !control.dom_id.is_empty() && field_type != FieldType::Radio {
        hints.push(LocatorHint::Css {
            selector: format!("{base}[id=\"{}\"]", css_quote(&control.dom_id)),
        });
    }
    if let Some(text) = label {
        hints.push(LocatorHint::Label { text: text.to_string() });
    }
    if !control.dom_path.is_empty() {
        hints.push(LocatorHint::Position {
            path: control.dom_path.clone(),
        });
    }
    hints
}

/// Build the ordered field list for one document's controls.
pub fn build_fields(controls: &[RawControl]) -> Vec<FieldDescriptor> {
    let mut taken = HashSet::new();
    group_radios(controls)
        .iter()
        .filter_map(|control| build_field(control, &mut taken))
        .collect()
}

fn build_field(control: &RawControl, taken: &mut HashSet<String>) -> Option<FieldDescriptor> {
    let cleaned = clean_question(control.raw_question());
    let labelled = !cleaned.is_empty();
    let question = if labelled {
        cleaned
    } else {
        [&control.name, &control.dom_id]
            .iter()
            .map(|s| humanize(s))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    };

    let Some(field_type) = classify(control, &question) else {
        warn!(
            tag = %control.tag,
            input_type = %control.input_type,
            question = %question,
            "unsupported field type, skipping"
        );
        return None;
    };

    let options = if field_type.has_options() {
        clean_options(&control.options)
    } else {
        Vec::new()
    };
    if field_type.has_options() && options.is_empty() {
        warn!(question = %question, %field_type, "choice field without options, skipping");
        return None;
    }

    let id = unique_id(synthesize_id(control, &question), taken);
    let locator_hints = locator_hints(control, field_type, labelled.then_some(question.as_str()));

    Some(FieldDescriptor {
        id,
        required: is_required(control),
        question,
        field_type,
        options,
        value: String::new(),
        locator_hints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(input_type: &str, name: &str, label: &str) -> RawControl {
        RawControl {
            tag: "input".into(),
            input_type: input_type.into(),
            name: name.into(),
            label: label.into(),
            dom_path: "body > form:nth-of-type(1) > input:nth-of-type(1)".into(),
            ..Default::default()
        }
    }

    fn radio(name: &str, group: &str, label: &str) -> RawControl {
        RawControl {
            group_label: group.into(),
            ..input("radio", name, label)
        }
    }

    #[test]
    fn native_email_wins_over_label() {
        let c = input("email", "contact", "Your phone number");
        assert_eq!(classify(&c, "Your phone number"), Some(FieldType::Email));
    }

    #[test]
    fn generic_text_uses_label_keywords() {
        let c = input("text", "q1", "Phone");
        assert_eq!(classify(&c, "Phone"), Some(FieldType::Phone));
        assert_eq!(classify(&c, "LinkedIn Profile"), Some(FieldType::Url));
        assert_eq!(classify(&c, "Email or phone"), Some(FieldType::Email));
        assert_eq!(classify(&c, "Earliest start date"), Some(FieldType::Date));
        assert_eq!(classify(&c, "First Name"), Some(FieldType::Text));
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert_eq!(infer_from_label("Candidate summary"), None);
        assert_eq!(infer_from_label("Telephony experience"), None);
        assert_eq!(infer_from_label("E-mail address"), Some(FieldType::Email));
    }

    #[test]
    fn unsupported_native_types_are_rejected() {
        assert_eq!(classify(&input("password", "pw", "Password"), "Password"), None);
        assert_eq!(classify(&input("range", "r", "Salary"), "Salary"), None);
        let number = input("number", "years", "Phone");
        assert_eq!(classify(&number, "Phone"), Some(FieldType::Text));
    }

    #[test]
    fn required_from_any_signal() {
        let plain = input("text", "a", "First Name");
        assert!(!is_required(&plain));
        assert!(is_required(&RawControl { required_attr: true, ..plain.clone() }));
        assert!(is_required(&RawControl { aria_required: true, ..plain.clone() }));
        assert!(is_required(&input("text", "a", "First Name*")));
    }

    #[test]
    fn label_sources_follow_preference_order() {
        let c = RawControl {
            aria_label: "Aria".into(),
            preceding_text: "Preceding".into(),
            placeholder: "Placeholder".into(),
            ..input("text", "n", "")
        };
        assert_eq!(c.raw_question(), "Aria");
        let c = RawControl { aria_label: String::new(), ..c };
        assert_eq!(c.raw_question(), "Preceding");
        let c = RawControl { preceding_text: "  ".into(), ..c };
        assert_eq!(c.raw_question(), "Placeholder");
    }

    #[test]
    fn clean_question_strips_markers() {
        assert_eq!(clean_question("  First   Name * :"), "First Name");
        assert_eq!(clean_question("Resume/CV*"), "Resume/CV");
        assert_eq!(clean_question("Middle * name"), "Middle name");
    }

    #[test]
    fn options_drop_placeholder_and_duplicates() {
        let options = vec![
            RawOption { text: "Select...".into(), value: "".into(), disabled: false },
            RawOption { text: "Yes".into(), value: "1".into(), disabled: false },
            RawOption { text: "No".into(), value: "0".into(), disabled: false },
            RawOption { text: "Yes".into(), value: "2".into(), disabled: false },
        ];
        assert_eq!(clean_options(&options), vec!["Yes", "No"]);
    }

    #[test]
    fn disabled_options_are_not_offered() {
        let options = vec![
            RawOption { text: "Choose an office".into(), value: "none".into(), disabled: true },
            RawOption { text: "Lisbon".into(), value: "lis".into(), disabled: false },
            RawOption { text: "Porto (closed)".into(), value: "opo".into(), disabled: true },
            RawOption { text: "Remote".into(), value: "rem".into(), disabled: false },
        ];
        assert_eq!(clean_options(&options), vec!["Lisbon", "Remote"]);
    }

    #[test]
    fn radios_collapse_into_one_field() {
        let controls = vec![
            input("text", "first_name", "First Name*"),
            radio("sponsor", "Need sponsorship?*", "Yes"),
            radio("sponsor", "Need sponsorship?*", "No"),
        ];
        let fields = build_fields(&controls);
        assert_eq!(fields.len(), 2);
        let sponsor = &fields[1];
        assert_eq!(sponsor.field_type, FieldType::Radio);
        assert_eq!(sponsor.question, "Need sponsorship?");
        assert_eq!(sponsor.options, vec!["Yes", "No"]);
        assert!(sponsor.required);
        assert_eq!(
            sponsor.locator_hints[0],
            LocatorHint::Css { selector: "input[type=\"radio\"][name=\"sponsor\"]".into() }
        );
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let controls = vec![
            input("checkbox", "consent", "I agree"),
            input("checkbox", "consent", "Send me updates"),
            RawControl { tag: "textarea".into(), label: "Cover letter".into(), ..Default::default() },
        ];
        let fields = build_fields(&controls);
        assert_eq!(fields[0].id, "consent");
        assert_eq!(fields[1].id, "consent_2");
        assert!(fields[2].id.starts_with("q_"));
        assert_eq!(build_fields(&controls), fields);
    }

    #[test]
    fn hints_are_ranked_most_specific_first() {
        let c = RawControl {
            dom_id: "email-1".into(),
            ..input("email", "job[email]", "Email *")
        };
        let fields = build_fields(&[c]);
        let strategies: Vec<_> = fields[0].locator_hints.iter().map(LocatorHint::strategy).collect();
        assert_eq!(strategies, vec!["css", "css", "label", "position"]);
        assert_eq!(
            fields[0].locator_hints[0],
            LocatorHint::Css { selector: "input[name=\"job[email]\"]".into() }
        );
    }

    #[test]
    fn unlabelled_control_falls_back_to_name_without_label_hint() {
        let fields = build_fields(&[input("text", "email_address", "")]);
        assert_eq!(fields[0].question, "email address");
        assert_eq!(fields[0].field_type, FieldType::Email);
        assert!(fields[0].locator_hints.iter().all(|h| h.strategy() != "label"));
    }

    #[test]
    fn select_without_options_is_skipped() {
        let c = RawControl { tag: "select".into(), label: "Country".into(), ..Default::default() };
        assert!(build_fields(&[c]).is_empty());
    }
}
