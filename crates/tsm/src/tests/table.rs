use super::{Input, Light};
use crate::error::TableError;
use crate::symbol::Symbol;
use crate::table::StateTable;

#[test]
fn symbols_expose_names_and_all_values() {
    assert_eq!(Light::Off.name(), "Off");
    assert_eq!(Input::Smash.to_string(), "Smash");
    assert_eq!(Light::ALL, &[Light::Off, Light::On, Light::Broken]);
}

#[test]
fn find_returns_first_matching_row() {
    let table = StateTable::<Light, Input>::builder(Light::Off)
        .transition(Light::Off, Input::Toggle, Light::On)
        .transition(Light::Off, Input::Toggle, Light::Broken)
        .transition(Light::On, Input::Toggle, Light::Off)
        .build()
        .unwrap();

    let row = table.find(Light::Off, Input::Toggle).unwrap();
    assert_eq!(row.to, Light::On);
    assert_eq!(table.rows().len(), 3);
    assert!(table.handles(Light::On, Input::Toggle));
    assert!(!table.handles(Light::Broken, Input::Toggle));
    assert!(table.find(Light::On, Input::Ignored).is_none());
}

#[test]
fn initial_state_is_kept() {
    let table = StateTable::<Light, Input>::builder(Light::Broken).build().unwrap();
    assert_eq!(table.initial(), Light::Broken);
    assert!(table.rows().is_empty());
}

#[test]
fn hooks_are_looked_up_per_state() {
    let table = StateTable::<Light, Input>::builder(Light::Off)
        .on_enter(Light::On, |_| Ok(()))
        .on_exit_all(Light::ALL, |_| Ok(()))
        .build()
        .unwrap();

    assert!(table.enter_hook(Light::On).is_some());
    assert!(table.enter_hook(Light::Off).is_none());
    assert!(Light::ALL
        .iter()
        .all(|&state| table.exit_hook(state).is_some()));
}

#[test]
fn second_enter_hook_for_a_state_is_rejected() {
    let result = StateTable::<Light, Input>::builder(Light::Off)
        .on_enter_all(Light::ALL, |_| Ok(()))
        .on_enter(Light::On, |_| Ok(()))
        .build();

    assert_eq!(
        result.unwrap_err(),
        TableError::DuplicateEnterHook { state: "On" }
    );
}

#[test]
fn second_exit_hook_for_a_state_is_rejected() {
    let result = StateTable::<Light, Input>::builder(Light::Off)
        .on_exit(Light::Broken, |_| Ok(()))
        .on_exit(Light::Broken, |_| Ok(()))
        .build();

    assert_eq!(
        result.unwrap_err(),
        TableError::DuplicateExitHook { state: "Broken" }
    );
}

#[test]
fn self_transition_rows_are_recognised() {
    let table = StateTable::<Light, Input>::builder(Light::On)
        .transition(Light::On, Input::Tap, Light::On)
        .transition(Light::On, Input::Toggle, Light::Off)
        .build()
        .unwrap();

    assert!(table.find(Light::On, Input::Tap).unwrap().is_self_transition());
    assert!(!table.find(Light::On, Input::Toggle).unwrap().is_self_transition());
}
