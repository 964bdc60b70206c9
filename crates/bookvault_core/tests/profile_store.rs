//! Integration tests for the profile store.

use bookvault_core::collab::AccountCredentials;
use bookvault_core::events::{AccountEvent, ProfileEvent};
use bookvault_core::profile::{ProfilePreferences, PROFILE_FILE};
use bookvault_core::{AccountLoginState, ErrorKind, InvariantViolation, ProfileId};
use bookvault_testkit::prelude::*;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

#[test]
fn legacy_profile_directory_is_migrated_and_populated() {
    let env = TestEnvironment::new();
    let root = env.profiles_root();
    plant_profile(&root, "0", "Kim");

    let id = {
        let store = env.open_profile_store();
        let names = directory_names(&root);
        assert_eq!(names.len(), 1);
        let id: ProfileId = names[0].parse().expect("migrated name is a uuid");
        let profile = store.profile(id).unwrap();
        assert_eq!(profile.display_name(), "Kim");
        assert!(profile.accounts_by_provider().contains_key(&provider_x()));
        id
    };

    let store = env.open_profile_store();
    assert_eq!(store.profile(id).unwrap().accounts().len(), 1);
}

#[test]
fn legacy_account_directories_inside_profiles_are_migrated() {
    let env = TestEnvironment::new();
    let root = env.profiles_root();
    let profile_dir = plant_profile(&root, &Uuid::new_v4().to_string(), "Kim");
    plant_account_for(&profile_dir.join("accounts"), "1", &provider_y());

    let store = env.open_profile_store();
    let profile = store.find_profile_with_display_name("Kim").unwrap();

    assert_eq!(profile.accounts().len(), 1);
    assert!(profile.accounts_by_provider().contains_key(&provider_y()));
    assert!(!profile_dir.join("accounts").join("1").exists());
}

#[test]
fn duplicate_display_names_are_tolerated_at_scan() {
    let env = TestEnvironment::new();
    let root = env.profiles_root();
    let mut ids = [Uuid::new_v4(), Uuid::new_v4()];
    ids.sort();
    plant_profile(&root, &ids[0].to_string(), "Kim");
    plant_profile(&root, &ids[1].to_string(), "Kim");

    let store = env.open_profile_store();

    assert_eq!(store.len(), 2);
    let by_name = store.profiles_by_display_name();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name["Kim"].id(), ProfileId::from_uuid(ids[0]));
}

#[test]
fn broken_profiles_are_all_reported() {
    let env = TestEnvironment::new();
    let root = env.profiles_root();
    plant_profile(&root, &Uuid::new_v4().to_string(), "Kim");
    let broken = root.join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("profile.json"), br#"{"displayName": "#).unwrap();
    let unknown = plant_profile(&root, &Uuid::new_v4().to_string(), "Ana");
    plant_account(
        &unknown.join("accounts"),
        &Uuid::new_v4().to_string(),
        r#"{"provider":"urn:provider:gone"}"#,
    );

    let err = env.try_open_profile_store().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Multiple);
    let causes = err.causes();
    assert_eq!(causes.len(), 2);
    assert!(causes.iter().any(|c| c.kind() == ErrorKind::Parse));
    assert!(causes.iter().any(|c| c.kind() == ErrorKind::Multiple));
}

#[test]
fn delete_profile_removes_accounts_and_credentials() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    store.create_profile(&provider_x(), "Kim").unwrap();
    let ana = store.create_profile(&provider_auth(), "Ana").unwrap();
    let account = ana.most_recent_account().unwrap();
    account
        .set_login_state(AccountLoginState::LoggedIn {
            credentials: AccountCredentials::new("ana", "pin"),
        })
        .unwrap();
    assert_eq!(env.credentials.len(), 1);

    let profile_events = store.subscribe();
    let account_events = store.account_events().subscribe();
    store.delete_profile(ana.id()).unwrap();

    assert!(env.credentials.is_empty());
    assert!(!ana.directory().exists());
    assert_eq!(profile_events.drain(), vec![ProfileEvent::Deleted(ana.id())]);
    assert!(matches!(
        account_events.drain().as_slice(),
        [AccountEvent::Deleted { account: deleted, .. }] if *deleted == account.id()
    ));
}

#[test]
fn delete_profile_reports_collaborator_failures() {
    let factory = Arc::new(FailingBookDatabaseFactory::new());
    let env = TestEnvironment::new().with_book_databases(factory.clone());
    let store = env.open_profile_store();
    store.create_profile(&provider_x(), "Kim").unwrap();
    let ana = store.create_profile(&provider_x(), "Ana").unwrap();
    ana.create_account(&provider_y()).unwrap();

    factory.fail_delete.set(true);
    let err = store.delete_profile(ana.id()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Multiple);
    assert_eq!(err.causes().len(), 2);
    assert!(store.profile(ana.id()).is_none());
    assert!(!ana.directory().exists());
}

#[test]
fn account_events_carry_the_owning_profile() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    let events = store.account_events().subscribe();

    let kim = store.create_profile(&provider_x(), "Kim").unwrap();
    let account = kim.create_account(&provider_auth()).unwrap();
    account.set_login_state(AccountLoginState::NotLoggedIn).unwrap();

    let events = events.drain();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], AccountEvent::Created { profile, .. } if *profile == kim.id()));
    assert_eq!(
        events[1],
        AccountEvent::Created {
            profile: kim.id(),
            account: account.id(),
            provider: provider_auth(),
        }
    );
    assert_eq!(
        events[2],
        AccountEvent::LoginStateChanged {
            account: account.id(),
            state: AccountLoginState::NotLoggedIn,
        }
    );
}

#[test]
fn profile_preferences_survive_reopen() {
    let env = TestEnvironment::new();
    let birthday = NaiveDate::from_ymd_opt(2010, 5, 17).unwrap();
    let id = {
        let store = env.open_profile_store();
        let kim = store.create_profile(&provider_x(), "Kim").unwrap();
        kim.set_preferences(ProfilePreferences {
            date_of_birth: Some(birthday),
            show_testing_libraries: true,
            ..ProfilePreferences::default()
        })
        .unwrap();
        kim.id()
    };

    let store = env.open_profile_store();
    let preferences = store.profile(id).unwrap().preferences();
    assert_eq!(preferences.date_of_birth, Some(birthday));
    assert!(preferences.show_testing_libraries);
}

#[test]
fn renaming_requires_an_existing_profile() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    let err = store.set_display_name(ProfileId::random(), "Kim").unwrap_err();
    assert!(matches!(
        err.invariant(),
        Some(InvariantViolation::NoSuchProfile(_))
    ));
}

#[test]
fn anonymous_store_creates_its_profile_once() {
    let env = TestEnvironment::new();
    let env = {
        let config = env.config.clone().anonymous(true);
        env.with_config(config)
    };

    let first = env.open_profile_store().current_profile().unwrap().id();
    let second = env.open_profile_store().current_profile().unwrap().id();

    assert_eq!(first, second);
    assert_eq!(directory_names(&env.profiles_root()).len(), 1);
}

#[test]
fn deleting_the_selected_account_clears_the_selection() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    let kim = store.create_profile(&provider_x(), "Kim").unwrap();
    let first = kim.account_store().account_for_provider(&provider_x()).unwrap();
    let second = kim.create_account(&provider_y()).unwrap();
    kim.select_account(&provider_y()).unwrap();
    let events = store.subscribe();

    assert_eq!(kim.delete_account_by_provider(&provider_y()).unwrap(), second.id());

    assert_eq!(kim.preferences().most_recent_account, None);
    assert_eq!(kim.most_recent_account().unwrap().id(), first.id());
    assert_eq!(events.drain(), vec![ProfileEvent::Updated(kim.id())]);
}

#[test]
fn deleting_another_account_keeps_the_selection() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    let kim = store.create_profile(&provider_x(), "Kim").unwrap();
    kim.create_account(&provider_y()).unwrap();
    let selected = kim.select_account(&provider_x()).unwrap();
    let events = store.subscribe();

    kim.delete_account_by_provider(&provider_y()).unwrap();

    assert_eq!(kim.preferences().most_recent_account, Some(selected.id()));
    assert!(events.drain().is_empty());
}

#[test]
fn failing_to_clear_the_selection_does_not_fail_the_delete() {
    let env = TestEnvironment::new();
    let store = env.open_profile_store();
    let kim = store.create_profile(&provider_x(), "Kim").unwrap();
    let first = kim.account_store().account_for_provider(&provider_x()).unwrap();
    let second = kim.create_account(&provider_y()).unwrap();
    kim.select_account(&provider_y()).unwrap();

    // A directory in place of the description makes the rename fail.
    let description = kim.directory().join(PROFILE_FILE);
    std::fs::remove_file(&description).unwrap();
    std::fs::create_dir(&description).unwrap();
    std::fs::write(description.join("blocker"), b"").unwrap();

    assert_eq!(kim.delete_account_by_provider(&provider_y()).unwrap(), second.id());

    assert!(kim.account(second.id()).is_none());
    assert!(!second.directory().exists());
    assert_eq!(kim.most_recent_account().unwrap().id(), first.id());
}
