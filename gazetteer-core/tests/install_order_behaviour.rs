//! Behavioural tests for ordering sources by view dependency.

use gazetteer_core::{GazetteerConfig, ResolveError, resolve_order};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

fn source(name: &str, joins: Option<&str>) -> String {
    let mut yaml = format!(
        r#"
  - name: {name}
    path: {name}.csv
    file: {name}.csv
    type: tabular
    separator: ","
    attributes:
      original:
        - {{ name: id, type: INTEGER }}
        - {{ name: code, type: TEXT }}
"#
    );
    if let Some(other) = joins {
        yaml.push_str(&format!(
            r#"    view:
      select:
        - {{ source: {name}, column: id }}
        - {{ source: {other}, column: code, alias: {other}_code }}
      join:
        - type: JOIN
          source: {other}
          condition: {name}.code = {other}.code
"#
        ));
    }
    yaml
}

fn gazetteer(sources: &[String]) -> GazetteerConfig {
    let document = format!("name: behaviour\nsources:{}", sources.concat());
    GazetteerConfig::from_yaml_str(&document).expect("scenario configuration is valid")
}

#[fixture]
fn config() -> RefCell<Option<GazetteerConfig>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> RefCell<Option<Result<Vec<String>, ResolveError>>> {
    RefCell::new(None)
}

#[given("a gazetteer where \"cities\" joins \"countries\"")]
fn given_dependent(#[from(config)] config: &RefCell<Option<GazetteerConfig>>) {
    *config.borrow_mut() = Some(gazetteer(&[
        source("cities", Some("countries")),
        source("countries", None),
    ]));
}

#[given("a gazetteer with independent sources \"rivers\", \"lakes\" and \"peaks\"")]
fn given_independent(#[from(config)] config: &RefCell<Option<GazetteerConfig>>) {
    *config.borrow_mut() = Some(gazetteer(&[
        source("rivers", None),
        source("lakes", None),
        source("peaks", None),
    ]));
}

#[given("a gazetteer where \"cities\" and \"countries\" join each other")]
fn given_cycle(#[from(config)] config: &RefCell<Option<GazetteerConfig>>) {
    *config.borrow_mut() = Some(gazetteer(&[
        source("cities", Some("countries")),
        source("countries", Some("cities")),
    ]));
}

#[when("I resolve the install order")]
fn when_resolve(
    #[from(config)] config: &RefCell<Option<GazetteerConfig>>,
    #[from(outcome)] outcome: &RefCell<Option<Result<Vec<String>, ResolveError>>>,
) {
    let config = config.borrow();
    let config = config.as_ref().expect("gazetteer configured");
    let resolved = resolve_order(config.sources()).map(|order| {
        order
            .into_iter()
            .map(|source| source.name().to_owned())
            .collect()
    });
    *outcome.borrow_mut() = Some(resolved);
}

#[then("the order is \"countries, cities\"")]
fn then_dependency_first(
    #[from(outcome)] outcome: &RefCell<Option<Result<Vec<String>, ResolveError>>>,
) {
    let outcome = outcome.borrow();
    let order = outcome
        .as_ref()
        .expect("order resolved")
        .as_ref()
        .expect("no cycle");
    assert_eq!(order, &["countries", "cities"]);
}

#[then("the order is \"lakes, peaks, rivers\"")]
fn then_sorted(#[from(outcome)] outcome: &RefCell<Option<Result<Vec<String>, ResolveError>>>) {
    let outcome = outcome.borrow();
    let order = outcome
        .as_ref()
        .expect("order resolved")
        .as_ref()
        .expect("no cycle");
    assert_eq!(order, &["lakes", "peaks", "rivers"]);
}

#[then("a circular dependency naming \"cities, countries\" is reported")]
fn then_cycle(#[from(outcome)] outcome: &RefCell<Option<Result<Vec<String>, ResolveError>>>) {
    let outcome = outcome.borrow();
    let err = outcome
        .as_ref()
        .expect("order resolved")
        .as_ref()
        .expect_err("cycle rejected");
    assert_eq!(
        err,
        &ResolveError::CircularDependency {
            sources: vec!["cities".to_owned(), "countries".to_owned()],
        }
    );
}

#[scenario(path = "tests/features/install_order.feature", index = 0)]
fn scenario_dependency_first(
    config: RefCell<Option<GazetteerConfig>>,
    outcome: RefCell<Option<Result<Vec<String>, ResolveError>>>,
) {
    let _ = (config, outcome);
}

#[scenario(path = "tests/features/install_order.feature", index = 1)]
fn scenario_name_order(
    config: RefCell<Option<GazetteerConfig>>,
    outcome: RefCell<Option<Result<Vec<String>, ResolveError>>>,
) {
    let _ = (config, outcome);
}

#[scenario(path = "tests/features/install_order.feature", index = 2)]
fn scenario_cycle(
    config: RefCell<Option<GazetteerConfig>>,
    outcome: RefCell<Option<Result<Vec<String>, ResolveError>>>,
) {
    let _ = (config, outcome);
}
