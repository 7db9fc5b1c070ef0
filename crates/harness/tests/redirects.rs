use std::sync::Arc;

use entmerge_core::{EditFlags, EntityId, EntityRedirect, EntitySnapshot};
use entmerge_engine::{AllowAll, EntityServices, ErrorKind, RedirectCreator, RightsEvaluator};
use entmerge_harness::{init_tracing, RecordingReader, RecordingWriter, RejectingFilter, TestRepo};
use entmerge_storage::EntityLookup;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A creator whose reads and writes go through recording doubles.
fn recorded_creator(
    repo: &TestRepo,
) -> (RedirectCreator, Arc<RecordingReader>, Arc<RecordingWriter>) {
    let reader = Arc::new(RecordingReader::new(repo.store.clone()));
    let writer = Arc::new(RecordingWriter::new(repo.store.clone()));
    let services = EntityServices::new(
        reader.clone(),
        writer.clone(),
        Arc::new(RightsEvaluator::new()),
        Arc::new(AllowAll),
    );
    let creator = RedirectCreator::new(services, repo.admin.clone(), repo.config.clone());
    (creator, reader, writer)
}

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn empty_item_becomes_redirect() -> TestResult {
    init_tracing();
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;

    let redirect = repo.redirect_creator(&repo.admin).create_redirect(source, target, false)?;
    assert_eq!(redirect, EntityRedirect::new(source, target)?);

    match repo.lookup(source)? {
        EntityLookup::Redirect { redirect, .. } => assert_eq!(redirect.to_id(), target),
        other => panic!("expected a redirect, got {other:?}"),
    }

    let history = repo.store.history(source)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, "redirect");
    assert_eq!(history[0].summary, "/* wbcreateredirect:0||Q1|Q2 */");
    assert!(history[0].flags.contains(EditFlags::UPDATE));
    assert!(!history[0].flags.contains(EditFlags::FORCE_BOT));
    Ok(())
}

#[test]
fn redirect_twice_is_idempotent() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let creator = repo.redirect_creator(&repo.admin);

    let first = creator.create_redirect(source, target, false)?;
    let second = creator.create_redirect(source, target, false)?;
    assert_eq!(first, second);
    assert_eq!(second.from_id(), source);
    assert_eq!(second.to_id(), target);
    assert!(repo.lookup(source)?.is_redirect());
    Ok(())
}

#[test]
fn existing_redirect_can_be_retargeted() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let first = repo.create_item(|e| e.with_label("en", "one"))?;
    let second = repo.create_item(|e| e.with_label("en", "two"))?;
    let creator = repo.redirect_creator(&repo.admin);

    creator.create_redirect(source, first, false)?;
    creator.create_redirect(source, second, false)?;

    match repo.lookup(source)? {
        EntityLookup::Redirect { redirect, .. } => assert_eq!(redirect.to_id(), second),
        other => panic!("expected a redirect, got {other:?}"),
    }
    Ok(())
}

#[test]
fn properties_redirect_to_properties() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_property(|e| e)?;
    let target = repo.create_property(|e| e.with_label("en", "instance of"))?;

    repo.redirect_creator(&repo.admin).create_redirect(source, target, false)?;
    assert!(repo.lookup(source)?.is_redirect());
    Ok(())
}

#[test]
fn bot_flag_is_recorded() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;

    repo.redirect_creator(&repo.admin).create_redirect(source, target, true)?;
    let history = repo.store.history(source)?;
    assert!(history[0].flags.contains(EditFlags::FORCE_BOT));
    Ok(())
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn incompatible_types_fail_without_reads() -> TestResult {
    let repo = TestRepo::new()?;
    let (creator, reader, writer) = recorded_creator(&repo);

    let err = creator
        .create_redirect(EntityId::item(1), EntityId::property(1), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetIsIncompatible);
    assert_eq!(err.code(), "target-is-incompatible");
    assert_eq!(reader.calls(), 0);
    assert_eq!(writer.attempts(), 0);
    Ok(())
}

#[test]
fn redirect_to_self_is_incompatible() -> TestResult {
    let repo = TestRepo::new()?;
    let id = repo.create_empty_item()?;
    let (creator, reader, _) = recorded_creator(&repo);

    let err = creator.create_redirect(id, id, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetIsIncompatible);
    assert_eq!(reader.calls(), 0);
    Ok(())
}

#[test]
fn source_with_content_is_rejected_until_emptied() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin, Germany"))?;
    let creator = repo.redirect_creator(&repo.admin);

    let err = creator.create_redirect(source, target, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetNotEmpty);
    assert!(!repo.lookup(source)?.is_redirect());

    repo.replace(&EntitySnapshot::new(source))?;
    creator.create_redirect(source, target, false)?;
    assert!(repo.lookup(source)?.is_redirect());
    Ok(())
}

#[test]
fn missing_entities_are_reported() -> TestResult {
    let repo = TestRepo::new()?;
    let existing = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let creator = repo.redirect_creator(&repo.admin);

    let err = creator.create_redirect(existing, EntityId::item(99), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchEntity);

    let err = creator.create_redirect(EntityId::item(98), existing, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchEntity);
    Ok(())
}

#[test]
fn redirect_onto_redirect_is_rejected() -> TestResult {
    let repo = TestRepo::new()?;
    let hop = repo.create_empty_item()?;
    let end = repo.create_item(|e| e.with_label("en", "end"))?;
    let source = repo.create_empty_item()?;
    let creator = repo.redirect_creator(&repo.admin);
    creator.create_redirect(hop, end, false)?;

    let err = creator.create_redirect(source, hop, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetIsRedirect);
    assert!(!repo.lookup(source)?.is_redirect());
    Ok(())
}

#[test]
fn empty_target_is_incompatible() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_empty_item()?;

    let err = repo
        .redirect_creator(&repo.admin)
        .create_redirect(source, target, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetIsIncompatible);
    Ok(())
}

#[test]
fn missing_rights_deny_before_writing() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let editor = repo.user("Editor", &["edit"]);

    let err = repo.redirect_creator(&editor).create_redirect(source, target, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.code(), "permissiondenied");
    assert_eq!(repo.revision_count(source)?, 1);
    Ok(())
}

#[test]
fn protected_source_needs_editprotected() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let repo = repo.with_permissions(Arc::new(RightsEvaluator::new().with_protected([source])));

    let err = repo
        .redirect_creator(&repo.admin)
        .create_redirect(source, target, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let mut admin = repo.admin.clone();
    admin.grant("editprotected");
    repo.redirect_creator(&admin).create_redirect(source, target, false)?;
    Ok(())
}

#[test]
fn filter_rejection_is_cant_redirect() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let services = repo
        .services()
        .with_filter(Arc::new(RejectingFilter("abuse filter 12".into())));
    let creator = RedirectCreator::new(services, repo.admin.clone(), repo.config.clone());

    let err = creator.create_redirect(source, target, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CantRedirect);
    assert!(!err.message().contains("abuse filter"));
    assert!(!repo.lookup(source)?.is_redirect());
    Ok(())
}

#[test]
fn failed_write_is_cant_redirect() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let writer = Arc::new(RecordingWriter::new(repo.store.clone()).failing_on(1));
    let services = EntityServices::new(
        repo.store.clone(),
        writer.clone(),
        Arc::new(RightsEvaluator::new()),
        Arc::new(AllowAll),
    );
    let creator = RedirectCreator::new(services, repo.admin.clone(), repo.config.clone());

    let err = creator.create_redirect(source, target, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CantRedirect);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(writer.attempts(), 1);
    Ok(())
}

#[test]
fn read_failure_is_cant_load() -> TestResult {
    let repo = TestRepo::new()?;
    let source = repo.create_empty_item()?;
    let target = repo.create_item(|e| e.with_label("en", "Berlin"))?;
    let (creator, reader, writer) = recorded_creator(&repo);
    reader.fail_for(target);

    let err = creator.create_redirect(source, target, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CantLoadEntityContent);
    assert_eq!(writer.attempts(), 0);
    Ok(())
}
