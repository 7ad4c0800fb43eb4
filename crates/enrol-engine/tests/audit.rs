mod common;

use std::sync::Arc;

use common::{Harness, START, Toggle, learner, registry_with};
use enrol_config::EnrolConfig;
use enrol_core::enums::PublishState;
use enrol_core::journal::HistoryEntry;
use enrol_engine::keys;
use enrol_engine::store::{Collaborators, FileSite, LearnerAssociations, MetaScope, MetaStore};
use enrol_engine::{EnrolmentManager, ProviderRegistry};
use pretty_assertions::assert_eq;

#[test]
fn snapshot_reconstructs_status_over_time() {
    let h = Harness::journaled(ProviderRegistry::with_defaults());
    let course = h.published(1);
    let learner = learner(10);

    h.manager.enrol(learner, course).unwrap();
    let t1 = START;
    h.clock.advance(1_000);
    h.manager.withdraw(learner, course).unwrap();
    let t2 = START + 1_000;
    h.manager.flush().unwrap();

    let before = h.manager.get_enrolment_snapshot(learner, course, Some(t1 - 1)).unwrap();
    assert!(before.is_empty());
    let first = h.manager.get_enrolment_snapshot(learner, course, Some(t1 + 1)).unwrap();
    assert_eq!(first.get("manual"), Some(&Some(true)));
    let second = h.manager.get_enrolment_snapshot(learner, course, Some(t2 + 1)).unwrap();
    assert_eq!(second.get("manual"), Some(&Some(false)));
    let now = h.manager.get_enrolment_snapshot(learner, course, None).unwrap();
    assert_eq!(now.get("manual"), Some(&Some(false)));
}

#[test]
fn history_only_records_transitions_newest_first() {
    let h = Harness::journaled(ProviderRegistry::with_defaults());
    let course = h.published(1);
    let learner = learner(10);

    h.manager.is_enrolled(learner, course, false).unwrap();
    h.clock.advance(10);
    h.manager.is_enrolled(learner, course, false).unwrap();
    h.clock.advance(10);
    h.manager.enrol(learner, course).unwrap();
    h.manager.flush().unwrap();

    assert_eq!(
        h.manager.get_provider_history("manual", learner, course).unwrap(),
        vec![
            HistoryEntry { at: START + 20, status: Some(true) },
            HistoryEntry { at: START, status: Some(false) },
        ]
    );
}

#[test]
fn journal_is_persisted_only_for_enrolled_courses() {
    let h = Harness::journaled(ProviderRegistry::with_defaults());
    let enrolled = h.published(1);
    let never = h.published(2);
    let learner = learner(10);

    h.manager.is_enrolled(learner, never, false).unwrap();
    h.manager.flush().unwrap();
    assert_eq!(
        h.site.get(MetaScope::Learner(learner), keys::PROVIDER_JOURNAL).unwrap(),
        None
    );

    h.manager.is_enrolled(learner, never, false).unwrap();
    h.manager.enrol(learner, enrolled).unwrap();
    h.manager.flush().unwrap();
    let blob = h
        .site
        .get(MetaScope::Learner(learner), keys::PROVIDER_JOURNAL)
        .unwrap()
        .unwrap();
    assert!(blob.starts_with(r#"{"1":{"manual":{"h":[{"t":"#), "{blob}");
    assert!(!blob.contains(r#""2":"#), "{blob}");
}

#[test]
fn removed_provider_is_journaled_as_unknown() {
    let membership = Toggle::new("membership", true);
    let h = Harness::journaled(registry_with(&[membership.clone()]));
    let course = h.published(1);
    let learner = learner(10);
    h.manager.is_enrolled(learner, course, false).unwrap();
    h.manager.flush().unwrap();

    h.clock.advance(5);
    let mut config = EnrolConfig::default();
    config.journal.enabled = true;
    let without = EnrolmentManager::with_clock(
        ProviderRegistry::with_defaults(),
        Collaborators::from_backend(&h.site),
        config,
        h.clock.clone(),
    );
    without.is_enrolled(learner, course, true).unwrap();
    without.flush().unwrap();

    let history = without.get_provider_history("membership", learner, course).unwrap();
    assert_eq!(history[0], HistoryEntry { at: START + 5, status: None });
    assert_eq!(history[1].status, Some(true));
}

#[test]
fn undecided_provider_keeps_its_last_journaled_status() {
    let membership = Toggle::new("membership", true);
    let h = Harness::journaled(registry_with(&[membership.clone()]));
    let course = h.published(1);
    let learner = learner(10);
    h.manager.is_enrolled(learner, course, false).unwrap();

    h.clock.advance(5);
    membership.set_undecided(true);
    assert!(!h.manager.is_enrolled(learner, course, false).unwrap());
    h.manager.flush().unwrap();

    assert_eq!(
        h.manager.get_provider_history("membership", learner, course).unwrap(),
        vec![HistoryEntry { at: START, status: Some(true) }]
    );
    let logs = h.manager.journal().get_provider_logs("membership", learner, course).unwrap();
    assert_eq!(logs[0].at, START + 5);
    assert!(logs[0].message.contains("catalogue lookup timed out"), "{logs:?}");
}

#[test]
fn debug_report_never_writes() {
    let membership = Toggle::new("membership", true);
    let h = Harness::new(registry_with(&[membership.clone()]));
    let course = h.published(1);
    let learner = learner(10);
    h.manager.is_enrolled(learner, course, true).unwrap();
    let before = h.site.snapshot();

    membership.set(false);
    let report = h.manager.debug_learner(learner, course).unwrap();
    assert!(report.cache_fresh);
    assert_eq!(report.cached.as_ref().and_then(|r| r.provider_result("membership")), Some(true));

    let live: Vec<_> = report
        .providers
        .iter()
        .map(|p| (p.id.as_str(), p.handles, p.enrolled))
        .collect();
    assert_eq!(
        live,
        vec![
            ("manual", Some(true), Some(false)),
            ("membership", Some(true), Some(false)),
        ]
    );
    assert_eq!(h.site.snapshot(), before);
}

#[test]
fn deleting_learner_data_clears_everything() {
    let h = Harness::journaled(ProviderRegistry::with_defaults());
    let course = h.published(1);
    let other = h.published(2);
    let learner = learner(10);
    h.manager.enrol(learner, course).unwrap();
    h.manager.remove_learner(learner, other).unwrap();
    h.manager.recalculate_enrolments(learner).unwrap();
    h.manager.flush().unwrap();

    h.manager.delete_learner_data(learner).unwrap();
    assert!(h.site.snapshot().learner_meta.get(&learner).is_none_or(|m| m.is_empty()));
    assert!(h.site.associated_courses(learner).unwrap().is_empty());
    assert!(!h.manager.is_learner_removed(learner, other).unwrap());
}

#[test]
fn file_backed_site_keeps_enrolments_across_managers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.json");
    let course = common::course(1);
    let learner = learner(10);

    {
        let site = Arc::new(FileSite::open(&path).unwrap());
        site.put_course(course, PublishState::Published).unwrap();
        let manager = EnrolmentManager::new(
            ProviderRegistry::with_defaults(),
            Collaborators::from_backend(&site),
            EnrolConfig::default(),
        );
        manager.enrol(learner, course).unwrap();
    }

    let site = Arc::new(FileSite::open(&path).unwrap());
    let manager = EnrolmentManager::new(
        ProviderRegistry::with_defaults(),
        Collaborators::from_backend(&site),
        EnrolConfig::default(),
    );
    assert_eq!(manager.get_enrolled_user_ids(course).unwrap(), vec![learner]);
    assert!(manager.is_enrolled(learner, course, true).unwrap());
}
