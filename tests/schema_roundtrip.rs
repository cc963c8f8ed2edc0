use std::collections::HashMap;

use ats_autofill::extract::classify::{build_fields, RawControl, RawOption};
use ats_autofill::{FieldType, FormContext, FormDescriptor, WaitStrategy};

fn control(tag: &str, input_type: &str, name: &str, label: &str, path: &str) -> RawControl {
    RawControl {
        tag: tag.into(),
        input_type: input_type.into(),
        name: name.into(),
        label: label.into(),
        dom_path: path.into(),
        ..Default::default()
    }
}

fn sample_controls() -> Vec<RawControl> {
    let mut email = control("input", "email", "email", "Email *", "body > form:nth-of-type(1) > input:nth-of-type(2)");
    email.required_attr = true;
    let mut country = control("select", "", "country", "Country", "body > form:nth-of-type(1) > select:nth-of-type(1)");
    country.options = vec![
        RawOption { text: "Select...".into(), value: "".into(), disabled: false },
        RawOption { text: "Portugal".into(), value: "pt".into(), disabled: false },
        RawOption { text: "Spain".into(), value: "es".into(), disabled: false },
    ];
    let mut yes = control("input", "radio", "relocate", "Yes", "body > form:nth-of-type(1) > input:nth-of-type(4)");
    yes.group_label = "Willing to relocate?".into();
    let mut no = control("input", "radio", "relocate", "No", "body > form:nth-of-type(1) > input:nth-of-type(5)");
    no.group_label = "Willing to relocate?".into();

    vec![
        control("input", "text", "first_name", "First Name", "body > form:nth-of-type(1) > input:nth-of-type(1)"),
        email,
        country,
        control("input", "file", "resume", "Resume/CV", "body > form:nth-of-type(1) > input:nth-of-type(3)"),
        yes,
        no,
    ]
}

fn sample_descriptor() -> FormDescriptor {
    let context = FormContext::top_level(WaitStrategy::Load, 15_000);
    FormDescriptor::new(
        "https://jobs.lever.co/acme/42/apply",
        context,
        build_fields(&sample_controls()),
        "Acme",
        "Platform Engineer",
    )
}

#[test]
fn descriptor_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = sample_descriptor();
    assert_eq!(descriptor.total_fields, 5);
    assert_eq!(descriptor.required_fields, 1);

    let path = descriptor.save_in(dir.path()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("form_acme_"), "{name}");
    assert!(name.ends_with(".json"));

    let loaded = FormDescriptor::load(&path).unwrap();
    assert_eq!(loaded, descriptor);
}

#[test]
fn populated_values_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let values = HashMap::from([
        ("first_name".to_string(), "Ada".to_string()),
        ("country".to_string(), "Portugal".to_string()),
        ("relocate".to_string(), "Yes".to_string()),
    ]);
    let descriptor = sample_descriptor().with_values(&values).unwrap();
    let path = descriptor.save_in(dir.path()).unwrap();

    let loaded = FormDescriptor::load(&path).unwrap();
    assert_eq!(loaded.field("first_name").unwrap().value, "Ada");
    assert_eq!(loaded.field("relocate").unwrap().field_type, FieldType::Radio);
    assert_eq!(loaded.field("relocate").unwrap().options, vec!["Yes", "No"]);
    assert_eq!(loaded.field("country").unwrap().options, vec!["Portugal", "Spain"]);
    assert_eq!(loaded.field("email").unwrap().value, "");
}

#[test]
fn empty_form_is_a_valid_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = FormDescriptor::empty("https://example.com/careers", FormContext::default());
    assert!(descriptor.is_empty());
    assert_eq!(descriptor.total_fields, 0);
    assert_eq!(descriptor.required_fields, 0);

    let path = descriptor.save_in(dir.path()).unwrap();
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("form_example_com_"));
    let loaded = FormDescriptor::load(&path).unwrap();
    assert!(loaded.fields.is_empty());
    assert!(!loaded.form_context.is_iframe);
}

#[test]
fn json_uses_camel_case_contract() {
    let json: serde_json::Value = serde_json::from_str(&sample_descriptor().to_json().unwrap()).unwrap();
    assert_eq!(json["sourceUrl"], "https://jobs.lever.co/acme/42/apply");
    assert_eq!(json["formContext"]["isIframe"], false);
    assert_eq!(json["formContext"]["waitStrategy"], "load");
    assert_eq!(json["formContext"]["loadTimeoutMs"], 15_000);
    assert_eq!(json["totalFields"], 5);
    assert_eq!(json["fields"][0]["fieldType"], "text");
    assert_eq!(json["fields"][0]["locatorHints"][0]["strategy"], "css");
}

#[test]
fn tampered_counts_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_descriptor().save_in(dir.path()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("\"totalFields\": 5", "\"totalFields\": 6")).unwrap();
    assert!(FormDescriptor::load(&path).is_err());
}

#[test]
fn building_fields_is_idempotent() {
    let controls = sample_controls();
    assert_eq!(build_fields(&controls), build_fields(&controls));
}
