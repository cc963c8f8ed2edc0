//! Live-browser tests. They need a local Chrome: `cargo test -- --ignored`.

use std::time::Duration;

use ats_autofill::{
    BrowserBuilder, BrowserConfig, FieldReason, FieldStatus, FieldType, FormExtractor, FormFiller, WaitStrategy,
};

const APPLICATION: &str = r#"<html><head><title>Backend Engineer - Acme</title></head><body>
<h1>Backend Engineer</h1>
<form>
  <label for="fn">First Name *</label><input id="fn" name="first_name" type="text">
  <label for="em">Email</label><input id="em" name="email" type="email" required>
  <label for="ph">Mobile phone</label><input id="ph" name="phone" type="text">
  <label for="co">Country</label>
  <select id="co" name="country"><option value="">Select...</option><option value="pt">Portugal</option><option value="es">Spain</option></select>
  <fieldset><legend>Willing to relocate?</legend>
    <label><input type="radio" name="relocate" value="y"> Yes</label>
    <label><input type="radio" name="relocate" value="n"> No</label>
  </fieldset>
  <label><input type="checkbox" name="privacy"> I accept the privacy policy</label>
  <label for="cl">Why Acme?</label><textarea id="cl" name="why"></textarea>
  <input type="hidden" name="token" value="x">
  <button type="submit">Submit application</button>
</form></body></html>"#;

const REVEAL: &str = r#"<html><body><h1>Data Engineer</h1>
<button type="button" onclick="document.getElementById('f').innerHTML = '<label for=a>Full name</label><input id=a name=full_name><label for=b>Email</label><input id=b name=email type=email>'">Apply now</button>
<form id="f"></form></body></html>"#;

const EMBEDDED: &str = r#"<html><body><h1>Site Reliability Engineer</h1>
<iframe id="apply" width="640" height="480" srcdoc="<form>
  <label for='n'>Full name</label><input id='n' name='full_name'>
  <label for='e'>Email</label><input id='e' name='email' type='email' required>
  <label for='c'>Current company</label><input id='c' name='company'>
</form>"></iframe>
</body></html>"#;

const UNLABELLED: &str = r#"<html><body><h1>Analyst</h1><form>
  <input name="full_name" aria-label="Full legal name" aria-required="true">
  <span id="city-q">City of residence</span><input name="city" aria-labelledby="city-q">
  <div>Years of experience <input name="years"></div>
  <input name="profile" placeholder="LinkedIn profile">
</form></body></html>"#;

// With `#strip` the page drops every name attribute and hides the referral
// input, so only label and position hints can find the controls.
const STRIPPED: &str = r#"<html><body><h1>Designer</h1><form>
  <label>First name <input name="first_name"></label>
  <label>Middle * name <input name="middle_name"></label>
  <div><input name="nickname"></div>
  <label for="ref">Referral code</label><input id="ref" name="referral">
  <label for="pref">Preferred name</label><input id="pref" name="preferred" onfocus="this.blur()">
</form>
<script>
  if (location.hash === '#strip') {
    document.querySelectorAll('form [name]').forEach((el) => el.removeAttribute('name'));
    document.getElementById('ref').style.display = 'none';
  }
</script></body></html>"#;

fn data_url(html: &str) -> String {
    let encoded: String = html
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect();
    format!("data:text/html;charset=utf-8,{encoded}")
}

fn config() -> BrowserConfig {
    BrowserBuilder::new()
        .headless(true)
        .typing_delay_ms(0, 0)
        .wait_strategy(WaitStrategy::Load)
        .load_timeout(Duration::from_secs(20))
        .build_config()
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_extract_application_form() {
    let descriptor = FormExtractor::new(config())
        .extract(&data_url(APPLICATION))
        .await
        .expect("Failed to extract");

    assert_eq!(descriptor.total_fields, 7, "{:#?}", descriptor.fields);
    assert_eq!(descriptor.job_title, "Backend Engineer");
    assert!(!descriptor.form_context.is_iframe);

    let first = descriptor.field("first_name").expect("first_name");
    assert_eq!(first.question, "First Name");
    assert!(first.required);
    assert!(descriptor.field("email").unwrap().required);
    assert_eq!(descriptor.field("phone").unwrap().field_type, FieldType::Phone);
    assert_eq!(descriptor.field("country").unwrap().options, vec!["Portugal", "Spain"]);
    let relocate = descriptor.field("relocate").unwrap();
    assert_eq!(relocate.field_type, FieldType::Radio);
    assert_eq!(relocate.question, "Willing to relocate?");
    assert_eq!(relocate.options, vec!["Yes", "No"]);
    assert_eq!(descriptor.field("why").unwrap().field_type, FieldType::Textarea);
    assert!(descriptor.field("token").is_none());
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_page_without_form_is_empty() {
    let descriptor = FormExtractor::new(config())
        .extract(&data_url("<html><body><h1>About us</h1><p>No openings.</p></body></html>"))
        .await
        .expect("Failed to extract");

    assert!(descriptor.is_empty());
    assert_eq!(descriptor.required_fields, 0);
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_apply_button_reveals_form() {
    let descriptor = FormExtractor::new(config())
        .extract(&data_url(REVEAL))
        .await
        .expect("Failed to extract");

    assert_eq!(descriptor.total_fields, 2);
    assert_eq!(descriptor.form_context.reveal_text.as_deref(), Some("Apply now"));
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_fill_and_verify() {
    let mut descriptor = FormExtractor::new(config())
        .extract(&data_url(APPLICATION))
        .await
        .expect("Failed to extract");

    descriptor.set_value("first_name", "Ada").unwrap();
    descriptor.set_value("email", "ada@example.com").unwrap();
    descriptor.set_value("phone", "+351 910 000 000").unwrap();
    descriptor.set_value("country", "spain").unwrap();
    descriptor.set_value("relocate", "No").unwrap();
    descriptor.set_value("privacy", "yes").unwrap();
    descriptor.set_value("why", "I like building   reliable systems.").unwrap();

    let filled = FormFiller::new(config()).fill(&descriptor).await.expect("Failed to fill");
    let result = filled.close().await;

    assert!(result.success, "{:#?}", result.per_field_status);
    assert_eq!(result.count(FieldStatus::Applied), 7, "{:#?}", result.per_field_status);
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_revealed_form_is_filled_after_replaying_click() {
    let mut descriptor = FormExtractor::new(config())
        .extract(&data_url(REVEAL))
        .await
        .expect("Failed to extract");
    descriptor.set_value("full_name", "Ada Lovelace").unwrap();
    descriptor.set_value("email", "ada@example.com").unwrap();

    let filled = FormFiller::new(config()).fill(&descriptor).await.expect("Failed to fill");
    assert_eq!(filled.result().count(FieldStatus::Applied), 2);
    filled.close().await;
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_form_inside_srcdoc_iframe() {
    let mut descriptor = FormExtractor::new(config())
        .extract(&data_url(EMBEDDED))
        .await
        .expect("Failed to extract");

    assert_eq!(descriptor.total_fields, 3, "{:#?}", descriptor.fields);
    assert!(descriptor.form_context.is_iframe);
    assert!(descriptor.form_context.frame_accessible);
    assert_eq!(descriptor.form_context.frame_selector.as_deref(), Some(r#"iframe[id="apply"]"#));
    assert!(descriptor.field("email").unwrap().required);

    descriptor.set_value("full_name", "Grace Hopper").unwrap();
    descriptor.set_value("email", "grace@example.com").unwrap();
    descriptor.set_value("company", "Navy").unwrap();

    let filled = FormFiller::new(config()).fill(&descriptor).await.expect("Failed to fill");
    let result = filled.close().await;
    assert!(result.success, "{:#?}", result.per_field_status);
    assert_eq!(result.count(FieldStatus::Applied), 3, "{:#?}", result.per_field_status);
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_questions_from_aria_preceding_text_and_placeholder() {
    let descriptor = FormExtractor::new(config())
        .extract(&data_url(UNLABELLED))
        .await
        .expect("Failed to extract");

    assert_eq!(descriptor.total_fields, 4, "{:#?}", descriptor.fields);
    let name = descriptor.field("full_name").unwrap();
    assert_eq!(name.question, "Full legal name");
    assert!(name.required);
    let city = descriptor.field("city").unwrap();
    assert_eq!(city.question, "City of residence");
    assert!(!city.required);
    assert_eq!(descriptor.field("years").unwrap().question, "Years of experience");
    let profile = descriptor.field("profile").unwrap();
    assert_eq!(profile.question, "LinkedIn profile");
    assert_eq!(profile.field_type, FieldType::Url);
    assert_eq!(descriptor.required_fields, 1);
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_fill_falls_back_to_label_and_position_hints() {
    let mut descriptor = FormExtractor::new(config())
        .extract(&data_url(STRIPPED))
        .await
        .expect("Failed to extract");

    assert_eq!(descriptor.total_fields, 5, "{:#?}", descriptor.fields);
    let middle = descriptor.field("middle_name").unwrap();
    assert_eq!(middle.question, "Middle name");
    assert!(middle.required);

    for (id, value) in [
        ("first_name", "Ada"),
        ("middle_name", "Augusta"),
        ("nickname", "Countess"),
        ("referral", "ABC-123"),
        ("preferred", "Ada"),
    ] {
        descriptor.set_value(id, value).unwrap();
    }
    descriptor.source_url.push_str("#strip");

    let filled = FormFiller::new(config()).fill(&descriptor).await.expect("Failed to fill");
    let result = filled.close().await;
    let status = |id: &str| result.status(id).unwrap().clone();

    assert_eq!(status("first_name").status, FieldStatus::Applied);
    assert_eq!(status("middle_name").status, FieldStatus::Applied);
    assert_eq!(status("nickname").status, FieldStatus::Applied, "{:#?}", result.per_field_status);

    let referral = status("referral");
    assert_eq!(referral.status, FieldStatus::Skipped);
    assert_eq!(referral.reason, Some(FieldReason::Unresolvable));

    let preferred = status("preferred");
    assert_eq!(preferred.status, FieldStatus::Failed);
    assert_eq!(preferred.reason, Some(FieldReason::InteractionError));
    assert!(preferred.detail.unwrap().contains("did not take focus"));

    assert!(result.success, "{:#?}", result.per_field_status);
}
