//! Behaviour every [`Cache`] backend must share.
//!
//! Backends call [`run_all`] from their own test modules.

use crate::{Cache, CacheError};

const PK: &str = "pointer.contract.0000";
const SK: &str = "operation";

pub(crate) async fn run_all(cache: &dyn Cache) {
    get_absent_is_none(cache).await;
    unconditional_set_overwrites(cache).await;
    not_set_fails_iff_key_exists(cache).await;
    constraint_set_fails_iff_value_differs(cache).await;
    constraint_set_on_absent_key_fails(cache).await;
    both_preconditions_rejected(cache).await;
    delete_semantics(cache).await;
    keys_are_independent(cache).await;
}

async fn reset(cache: &dyn Cache) {
    cache.delete(PK, SK, None).await.unwrap();
    cache.delete(PK, "other", None).await.unwrap();
    cache.delete("pointer.contract.1111", SK, None).await.unwrap();
}

async fn get_absent_is_none(cache: &dyn Cache) {
    reset(cache).await;
    assert_eq!(cache.get(PK, SK).await.unwrap(), None);
}

async fn unconditional_set_overwrites(cache: &dyn Cache) {
    reset(cache).await;
    cache.set(PK, SK, "one", false, None).await.unwrap();
    cache.set(PK, SK, "two", false, None).await.unwrap();
    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("two"));
}

async fn not_set_fails_iff_key_exists(cache: &dyn Cache) {
    reset(cache).await;
    cache.set(PK, SK, "first", true, None).await.unwrap();

    let err = cache.set(PK, SK, "second", true, None).await.unwrap_err();
    assert!(matches!(err, CacheError::ConstraintFailed { .. }));
    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("first"));
}

async fn constraint_set_fails_iff_value_differs(cache: &dyn Cache) {
    reset(cache).await;
    cache.set(PK, SK, "a", false, None).await.unwrap();

    let err = cache.set(PK, SK, "b", false, Some("x")).await.unwrap_err();
    assert!(err.is_constraint_failed());
    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("a"));

    cache.set(PK, SK, "b", false, Some("a")).await.unwrap();
    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("b"));
}

async fn constraint_set_on_absent_key_fails(cache: &dyn Cache) {
    reset(cache).await;
    let err = cache.set(PK, SK, "a", false, Some("a")).await.unwrap_err();
    assert!(err.is_constraint_failed());
    assert_eq!(cache.get(PK, SK).await.unwrap(), None);
}

async fn both_preconditions_rejected(cache: &dyn Cache) {
    reset(cache).await;
    let err = cache.set(PK, SK, "a", true, Some("a")).await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidArguments(_)));
    assert_eq!(cache.get(PK, SK).await.unwrap(), None);
}

async fn delete_semantics(cache: &dyn Cache) {
    reset(cache).await;

    // Absent key: unconditional delete succeeds, constrained delete fails
    cache.delete(PK, SK, None).await.unwrap();
    assert!(cache
        .delete(PK, SK, Some("a"))
        .await
        .unwrap_err()
        .is_constraint_failed());

    cache.set(PK, SK, "a", false, None).await.unwrap();
    assert!(cache
        .delete(PK, SK, Some("b"))
        .await
        .unwrap_err()
        .is_constraint_failed());
    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("a"));

    cache.delete(PK, SK, Some("a")).await.unwrap();
    assert_eq!(cache.get(PK, SK).await.unwrap(), None);

    cache.set(PK, SK, "c", false, None).await.unwrap();
    cache.delete(PK, SK, None).await.unwrap();
    assert_eq!(cache.get(PK, SK).await.unwrap(), None);
}

async fn keys_are_independent(cache: &dyn Cache) {
    reset(cache).await;
    cache.set(PK, SK, "a", false, None).await.unwrap();
    cache.set(PK, "other", "b", false, None).await.unwrap();
    cache
        .set("pointer.contract.1111", SK, "c", false, None)
        .await
        .unwrap();

    assert_eq!(cache.get(PK, SK).await.unwrap().as_deref(), Some("a"));
    assert_eq!(cache.get(PK, "other").await.unwrap().as_deref(), Some("b"));
    assert_eq!(
        cache
            .get("pointer.contract.1111", SK)
            .await
            .unwrap()
            .as_deref(),
        Some("c")
    );
    reset(cache).await;
}
