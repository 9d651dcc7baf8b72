//! End-to-end derivation behavior: placeholders, overrides, chains and labels

use metacard_engine::{EngineConfig, OverrideState};
use metacard_model::PropertyValue;
use metacard_rules::RuleId;
use metacard_test_utils::{classes, engine, engine_with_config, open, props::*, text, value_of};
use pretty_assertions::assert_eq;

const FAMOUS_CITY: &str = r#"
rules:
  - name: USA city
    scope: { class: CL.Customer }
    when: [{ property: PD.Country, value: USA }]
    effects:
      - { type: set_value, property: PD.City, template: "Famous city of {PD.Country} is Florida" }
"#;

#[test]
fn placeholder_follows_source_until_user_takes_over() {
    let engine = engine(FAMOUS_CITY);
    let mut card = open(&engine, classes::CUSTOMER);

    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(value_of(&card, CITY), "Famous city of USA is Florida");

    // The rule no longer matches but the derived value keeps following.
    let report = engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert_eq!(report.deactivated, vec![RuleId(0)]);
    assert_eq!(value_of(&card, CITY), "Famous city of Canada is Florida");

    engine.user_edit(&mut card, CITY, "").unwrap();
    assert_eq!(value_of(&card, CITY), "");
    assert!(card.property(CITY).unwrap().is_touched());

    // Empty user values stay eligible for derivation.
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(value_of(&card, CITY), "Famous city of USA is Florida");
    assert_eq!(card.property(CITY).unwrap().derived_by(), Some(RuleId(0)));
}

#[test]
fn advisory_rule_keeps_user_value() {
    let engine = engine(FAMOUS_CITY);
    let mut card = open(&engine, classes::CUSTOMER);

    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    engine.user_edit(&mut card, CITY, "Miami").unwrap();

    engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert_eq!(value_of(&card, CITY), "Miami");

    let report = engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(report.fired, vec![RuleId(0)]);
    assert_eq!(report.changed, vec![COUNTRY]);
    assert_eq!(value_of(&card, CITY), "Miami");
    assert_eq!(card.property(CITY).unwrap().state(), OverrideState::UserOverridden);
}

#[test]
fn different_rule_claims_user_value() {
    let engine = engine(
        r#"
rules:
  - name: USA city
    when: [{ property: PD.Country, value: USA }]
    effects:
      - { type: set_value, property: PD.City, template: "{PD.Country} city" }
  - name: tagged city
    when: [{ property: PD.Tags, value: B }]
    effects:
      - { type: set_value, property: PD.City, value: Tagged }
"#,
    );
    let mut card = open(&engine, classes::CUSTOMER);
    engine.add_property(&mut card, TAGS).unwrap();
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    engine.user_edit(&mut card, CITY, "Mine").unwrap();

    let report = engine
        .user_edit(&mut card, TAGS, PropertyValue::multi(["B"]))
        .unwrap();
    assert_eq!(report.fired, vec![RuleId(1)]);
    assert_eq!(value_of(&card, CITY), "Tagged");
    assert_eq!(card.property(CITY).unwrap().derived_by(), Some(RuleId(1)));

    // Only the rule whose value the user replaced is held off.
    engine.user_edit(&mut card, CITY, "Mine again").unwrap();
    engine.user_edit(&mut card, TAGS, PropertyValue::Empty).unwrap();
    engine.user_edit(&mut card, TAGS, PropertyValue::multi(["B"])).unwrap();
    assert_eq!(value_of(&card, CITY), "Mine again");

    engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(value_of(&card, CITY), "USA city");
    assert_eq!(card.property(CITY).unwrap().derived_by(), Some(RuleId(0)));
}

#[test]
fn stored_values_are_not_overwritten_on_open() {
    let engine = engine(FAMOUS_CITY);
    let (card, report) = engine
        .open_card(
            metacard_test_utils::DOCUMENT,
            Some(classes::CUSTOMER),
            [(COUNTRY, text("USA")), (CITY, text("Orlando"))],
        )
        .unwrap();

    assert_eq!(report.fired, vec![RuleId(0)]);
    assert_eq!(value_of(&card, CITY), "Orlando");
}

#[test]
fn forced_rule_overwrites_user_value() {
    let engine = engine(
        r#"
rules:
  - name: forced city
    forced: true
    when: [{ property: PD.Country, values: [USA, Canada] }]
    effects:
      - { type: set_value, property: PD.City, template: "Capital region of {PD.Country}" }
"#,
    );
    let mut card = open(&engine, classes::CUSTOMER);

    engine.user_edit(&mut card, CITY, "Mine").unwrap();
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(value_of(&card, CITY), "Capital region of USA");

    engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert_eq!(value_of(&card, CITY), "Capital region of Canada");

    engine.user_edit(&mut card, CITY, "Mine again").unwrap();
    assert_eq!(value_of(&card, CITY), "Capital region of Canada");
    assert_eq!(card.property(CITY).unwrap().derived_by(), Some(RuleId(0)));
}

#[test]
fn highest_priority_forced_rule_wins() {
    let engine = engine(
        r"
rules:
  - name: low
    forced: true
    priority: 1
    when: [{ property: PD.Country, value: USA }]
    effects: [{ type: set_value, property: PD.City, value: Low }]
  - name: high
    forced: true
    priority: 9
    when: [{ property: PD.Country, value: USA }]
    effects: [{ type: set_value, property: PD.City, value: High }]
",
    );
    let mut card = open(&engine, classes::CUSTOMER);

    let report = engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(report.fired, vec![RuleId(0), RuleId(1)]);
    assert_eq!(value_of(&card, CITY), "High");
    assert_eq!(card.property(CITY).unwrap().derived_by(), Some(RuleId(1)));

    let report = engine.reevaluate(&mut card).unwrap();
    assert!(report.is_quiet());
}

#[test]
fn chain_settles_in_one_call() {
    let engine = engine(
        r#"
rules:
  - name: show chain
    scope: { class: CL.Customer }
    effects:
      - { type: add_property, property: PD.State }
      - { type: add_property, property: PD.Region }
  - name: state from country
    when: [{ property: PD.Country, operator: is_not_empty }]
    effects: [{ type: set_value, property: PD.State, template: "{PD.Country} state" }]
  - name: region from state
    when: [{ property: PD.State, operator: is_not_empty }]
    effects: [{ type: set_value, property: PD.Region, template: "{PD.State} region" }]
  - name: city from region
    when: [{ property: PD.Region, operator: is_not_empty }]
    effects: [{ type: set_value, property: PD.City, template: "{PD.Region} city" }]
"#,
    );
    let mut card = open(&engine, classes::CUSTOMER);
    assert!(card.contains(STATE));
    assert!(card.contains(REGION));

    let report = engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(report.fired, vec![RuleId(1), RuleId(2), RuleId(3)]);
    assert_eq!(value_of(&card, CITY), "USA state region city");

    let report = engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert_eq!(report.changed, vec![COUNTRY, STATE, REGION, CITY]);
    assert_eq!(value_of(&card, STATE), "Canada state");
    assert_eq!(value_of(&card, REGION), "Canada state region");
    assert_eq!(value_of(&card, CITY), "Canada state region city");
}

#[test]
fn label_comes_from_the_winning_rule() {
    let engine = engine(
        r#"
rules:
  - name: us label
    when: [{ property: PD.Country, value: USA }]
    effects: [{ type: set_label, property: PD.City, label: US city }]
  - name: canadian label
    when: [{ property: PD.Country, value: Canada }]
    effects: [{ type: set_label, property: PD.City, label: Canadian city }]
  - name: filled label
    when: [{ property: PD.City, operator: is_not_empty }]
    effects: [{ type: set_label, property: PD.City, label: "City ({PD.Country})" }]
"#,
    );
    let mut card = open(&engine, classes::CUSTOMER);
    assert_eq!(card.label(CITY), Some("City"));

    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    assert_eq!(card.label(CITY), Some("US city"));

    engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert_eq!(card.label(CITY), Some("Canadian city"));

    // Same priority: the most recently activated rule wins.
    engine.user_edit(&mut card, CITY, "Toronto").unwrap();
    assert_eq!(card.label(CITY), Some("City (Canada)"));

    engine.user_edit(&mut card, CITY, "").unwrap();
    assert_eq!(card.label(CITY), Some("Canadian city"));

    engine.user_edit(&mut card, COUNTRY, "Mexico").unwrap();
    assert_eq!(card.label(CITY), Some("City"));
}

#[test]
fn activating_edit_mode_does_not_take_ownership() {
    let engine = engine(FAMOUS_CITY);
    let mut card = open(&engine, classes::CUSTOMER);
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();

    engine.activate_edit(&mut card, CITY).unwrap();
    assert_eq!(card.editing(), Some(CITY));
    assert!(!card.property(CITY).unwrap().is_touched());

    let report = engine
        .user_edit(&mut card, CITY, "Famous city of USA is Florida")
        .unwrap();
    assert!(report.is_quiet());

    engine.user_edit(&mut card, COUNTRY, "Mexico").unwrap();
    assert_eq!(value_of(&card, CITY), "Famous city of Mexico is Florida");
}

#[test]
fn unchanged_write_can_count_as_edit() {
    let engine = engine_with_config(
        FAMOUS_CITY,
        EngineConfig::default().with_unchanged_write_as_edit(true),
    );
    let mut card = open(&engine, classes::CUSTOMER);
    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();

    engine
        .user_edit(&mut card, CITY, "Famous city of USA is Florida")
        .unwrap();
    assert!(card.property(CITY).unwrap().is_touched());

    engine.user_edit(&mut card, COUNTRY, "Mexico").unwrap();
    assert_eq!(value_of(&card, CITY), "Famous city of USA is Florida");
}

#[test]
fn multi_value_source_uses_rule_delimiter() {
    let engine = engine(
        r#"
rules:
  - name: tags summary
    scope: { class: CL.Contract }
    when: [{ property: PD.Department, value: Sales }]
    delimiter: " + "
    effects:
      - { type: add_property, property: PD.Tags }
      - { type: set_value, property: PD.Summary, template: "Tags: {PD.Tags}" }
"#,
    );
    let mut card = open(&engine, classes::CONTRACT);

    let report = engine.user_edit(&mut card, DEPARTMENT, "Sales").unwrap();
    assert_eq!(report.added, vec![TAGS]);
    assert_eq!(value_of(&card, SUMMARY), "Tags: ");

    engine
        .user_edit(&mut card, TAGS, PropertyValue::multi(["A", "C"]))
        .unwrap();
    assert_eq!(value_of(&card, SUMMARY), "Tags: A + C");
}

#[test]
fn literal_items_join_with_rule_delimiter() {
    let engine = engine(
        r#"
rules:
  - name: summary from list
    delimiter: " / "
    when: [{ property: PD.Department, value: Legal }]
    effects:
      - { type: set_value, property: PD.Summary, value: [one, two] }
"#,
    );
    let mut card = open(&engine, classes::CONTRACT);

    engine.user_edit(&mut card, DEPARTMENT, "Legal").unwrap();
    assert_eq!(card.value(SUMMARY), Some(&text("one / two")));

    // User writes have no rule, so they use the engine default.
    engine
        .user_edit(&mut card, SUMMARY, PropertyValue::multi(["x", "y"]))
        .unwrap();
    assert_eq!(card.value(SUMMARY), Some(&text("x; y")));
}

#[test]
fn required_and_description_follow_matching_rules() {
    let engine = engine(
        r#"
rules:
  - name: zip needed in USA
    scope: { class: CL.Invoice }
    when: [{ property: PD.Country, value: USA }]
    effects:
      - { type: set_required, property: PD.Zip }
      - { type: set_description, property: PD.Zip, text: "Five digit code for {PD.Country}" }
"#,
    );
    let mut card = open(&engine, classes::INVOICE);
    let zip = card.property(ZIP).unwrap();
    assert!(!zip.is_required());
    assert_eq!(zip.description(), None);

    engine.user_edit(&mut card, COUNTRY, "USA").unwrap();
    let zip = card.property(ZIP).unwrap();
    assert!(zip.is_required());
    assert_eq!(zip.description(), Some("Five digit code for USA"));

    engine.user_edit(&mut card, COUNTRY, "Canada").unwrap();
    assert!(!card.property(ZIP).unwrap().is_required());
}

#[test]
fn class_scope_accepts_guid_selector() {
    let engine = engine(
        r"
rules:
  - name: by guid
    scope: { class: '{5D0C3C8E-6A43-4B8F-9A55-0D6C3F2B7A11}' }
    effects: [{ type: set_label, property: PD.City, label: Town }]
",
    );
    let card = open(&engine, classes::CUSTOMER);
    assert_eq!(card.label(CITY), Some("Town"));

    let card = open(&engine, classes::INVOICE);
    assert!(card.active_rules().next().is_none());
}
