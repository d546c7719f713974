use asset_gallery::gateway::{AssetField, GatewayError, MediaField, RemoteGateway};
use asset_gallery::models::{
    Asset, AssetKind, Classification, LinkInfo, Media, MediaItem, Principal, Profile,
};
use asset_gallery::status::{ModerationStatus, PreferenceStatus};
use asset_gallery::store::{AssociationStore, Mutation, MutationTarget};
use asset_gallery::sync::{
    ConflictPolicy, DeleteTarget, MutationPhase, StateEvent, StatusChange, SyncEngine, SyncError,
    SyncOptions,
};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

const OWNER: &str = "owner";

/// In-memory backend. Successful writes are applied to the canonical copy
/// so later fetches observe them.
struct MockGateway {
    canonical: Mutex<AssociationStore>,
    profiles: Mutex<HashMap<String, Profile>>,
    calls: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    hold_writes: AtomicBool,
    release: Semaphore,
    profile_lookups: AtomicUsize,
}

impl MockGateway {
    fn new(store: AssociationStore) -> Arc<Self> {
        Arc::new(Self {
            canonical: Mutex::new(store),
            profiles: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            hold_writes: AtomicBool::new(false),
            release: Semaphore::new(0),
            profile_lookups: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn canonical(&self) -> AssociationStore {
        self.canonical.lock().unwrap().clone()
    }

    /// Changes the backend behind every engine's back.
    fn apply_external(&self, mutation: Mutation) {
        self.canonical.lock().unwrap().apply(&mutation).unwrap();
    }

    async fn write(&self, label: String, mutation: Mutation) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(label);
        if self.hold_writes.load(Ordering::SeqCst) {
            self.release.acquire().await.unwrap().forget();
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        let mut canonical = self.canonical.lock().unwrap();
        canonical
            .apply(&mutation)
            .map(|_| ())
            .map_err(|e| GatewayError::NotFound(e.to_string()))
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn get_asset(&self, id: &str) -> Result<Asset, GatewayError> {
        let canonical = self.canonical.lock().unwrap();
        if canonical.is_deleted() || canonical.asset().id != id {
            return Err(GatewayError::NotFound(format!("asset {id}")));
        }
        Ok(canonical.asset().clone())
    }

    async fn get_associations(&self, asset_id: &str) -> Result<Vec<MediaItem>, GatewayError> {
        let canonical = self.canonical.lock().unwrap();
        if canonical.is_deleted() {
            return Err(GatewayError::NotFound(format!("asset {asset_id}")));
        }
        Ok(canonical.items().to_vec())
    }

    async fn update_asset_field(&self, _id: &str, field: AssetField) -> Result<(), GatewayError> {
        let (label, mutation) = match field {
            AssetField::ModerationStatus(s) => {
                (format!("asset:moderation:{s}"), Mutation::AssetModeration(s))
            }
            AssetField::PreferenceStatus(s) => {
                (format!("asset:preference:{s}"), Mutation::AssetPreference(s))
            }
            AssetField::PrimaryMediaId(media_id) => (
                format!("asset:primary:{media_id}"),
                Mutation::SetPrimary { media_id },
            ),
        };
        self.write(label, mutation).await
    }

    async fn update_media_field(&self, id: &str, field: MediaField) -> Result<(), GatewayError> {
        let media_id = id.to_string();
        let (label, mutation) = match field {
            MediaField::ModerationStatus(status) => (
                format!("media:{id}:moderation:{status}"),
                Mutation::MediaModeration { media_id, status },
            ),
            MediaField::PreferenceStatus(status) => (
                format!("media:{id}:preference:{status}"),
                Mutation::MediaPreference { media_id, status },
            ),
        };
        self.write(label, mutation).await
    }

    async fn update_association_status(
        &self,
        _asset_id: &str,
        media_id: &str,
        status: PreferenceStatus,
    ) -> Result<(), GatewayError> {
        self.write(
            format!("link:{media_id}:{status}"),
            Mutation::LinkStatus {
                media_id: media_id.to_string(),
                status,
            },
        )
        .await
    }

    async fn delete_asset(&self, id: &str) -> Result<(), GatewayError> {
        self.write(format!("delete:asset:{id}"), Mutation::DeleteAsset)
            .await
    }

    async fn delete_media(&self, id: &str) -> Result<(), GatewayError> {
        self.write(
            format!("delete:media:{id}"),
            Mutation::DeleteMedia {
                media_id: id.to_string(),
            },
        )
        .await
    }

    async fn resolve_playable_url(&self, locator: &str) -> Result<String, GatewayError> {
        Ok(format!("https://cdn.example.com/{locator}"))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))
    }
}

fn media(id: &str, minutes: i64, classification: Classification) -> MediaItem {
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    MediaItem::linked(
        Media {
            id: id.to_string(),
            locator: format!("videos/{id}.mp4"),
            title: Some(format!("Clip {id}")),
            description: None,
            creator: None,
            user_id: None,
            created_at: base + Duration::minutes(minutes),
            moderation_status: ModerationStatus::Listed,
            preference_status: PreferenceStatus::Listed,
            classification,
            metadata: serde_json::json!({}),
        },
        LinkInfo::default(),
    )
}

/// Asset "a1" owned by [`OWNER`] with `gens` generations (g1 oldest) and
/// `arts` artworks.
fn fixture(gens: usize, arts: usize) -> AssociationStore {
    let asset = Asset {
        id: "a1".to_string(),
        name: "Wan Motion".to_string(),
        description: None,
        creator: Some("wan_fan".to_string()),
        kind: AssetKind::Lora,
        user_id: Some(OWNER.to_string()),
        curator_id: None,
        created_at: Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
        moderation_status: ModerationStatus::Listed,
        preference_status: PreferenceStatus::Listed,
        primary_media_id: None,
        admin_reviewed: false,
    };
    let mut items = Vec::new();
    for i in 1..=gens {
        items.push(media(&format!("g{i}"), i as i64, Classification::Generation));
    }
    for i in 1..=arts {
        items.push(media(&format!("r{i}"), i as i64, Classification::Artwork));
    }
    AssociationStore::new(asset, items)
}

fn options(page_size: usize, conflict_policy: ConflictPolicy) -> SyncOptions {
    SyncOptions {
        page_size,
        refetch_after_commit: false,
        conflict_policy,
    }
}

async fn open(mock: &Arc<MockGateway>, principal: Principal, opts: SyncOptions) -> SyncEngine {
    let gateway: Arc<dyn RemoteGateway> = mock.clone();
    SyncEngine::open(gateway, principal, "a1", opts)
        .await
        .unwrap()
}

fn gen_ids(engine: &SyncEngine) -> Vec<String> {
    engine
        .ordered_visible_items()
        .section(Classification::Generation)
        .unwrap()
        .items
        .iter()
        .map(|item| item.id().to_string())
        .collect()
}

async fn wait_for_pending(engine: &SyncEngine, count: usize) {
    for _ in 0..1000 {
        if engine.pending_count() >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("mutation never became pending");
}

#[tokio::test]
async fn test_hidden_link_moves_back_for_owner_and_disappears_for_public() {
    let mock = MockGateway::new(fixture(3, 0));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    assert_eq!(gen_ids(&owner), vec!["g3", "g2", "g1"]);

    owner
        .request_status_change(StatusChange::LinkStatus {
            media_id: "g3".to_string(),
            status: PreferenceStatus::Hidden,
        })
        .await
        .unwrap();

    assert_eq!(gen_ids(&owner), vec!["g2", "g1", "g3"]);
    assert_eq!(mock.calls(), vec!["link:g3:hidden"]);

    let public = open(&mock, Principal::anonymous(), options(0, ConflictPolicy::Queue)).await;
    assert_eq!(gen_ids(&public), vec!["g2", "g1"]);
}

#[tokio::test]
async fn test_failed_delete_rolls_back_and_leaves_other_views_alone() {
    let mock = MockGateway::new(fixture(4, 1));
    let admin = open(&mock, Principal::admin("root"), options(0, ConflictPolicy::Queue)).await;
    let viewer = open(&mock, Principal::anonymous(), options(0, ConflictPolicy::Queue)).await;
    let before = gen_ids(&admin);

    mock.fail_writes.store(true, Ordering::SeqCst);
    let err = admin
        .request_delete(DeleteTarget::Media("g2".to_string()))
        .await
        .unwrap_err();

    assert!(err.is_rollback());
    assert!(err.to_string().starts_with("Could not delete video g2"));
    assert_eq!(gen_ids(&admin), before);
    assert_eq!(admin.pending_count(), 0);

    viewer.refresh().await.unwrap();
    assert!(gen_ids(&viewer).contains(&"g2".to_string()));
    assert!(mock.canonical().contains("g2"));
}

#[tokio::test]
async fn test_delete_clamps_page_cursor() {
    let mock = MockGateway::new(fixture(5, 0));
    let admin = open(&mock, Principal::admin("root"), options(2, ConflictPolicy::Queue)).await;

    assert_eq!(admin.set_page(Classification::Generation, 3), 3);
    let section = admin.ordered_visible_items();
    let gens = section.section(Classification::Generation).unwrap();
    assert_eq!(gens.total_pages, 3);
    assert_eq!(gens.items.len(), 1);

    admin
        .request_delete(DeleteTarget::Media("g1".to_string()))
        .await
        .unwrap();

    let view = admin.ordered_visible_items();
    let gens = view.section(Classification::Generation).unwrap();
    assert_eq!(gens.total_pages, 2);
    assert_eq!(gens.page, 2);
    assert_eq!(gens.items.len(), 2);
    assert_eq!(admin.page(Classification::Generation), 2);
}

#[tokio::test]
async fn test_refresh_clamps_page_cursor() {
    let mock = MockGateway::new(fixture(6, 2));
    let owner = open(&mock, Principal::member(OWNER), options(2, ConflictPolicy::Queue)).await;
    assert_eq!(owner.set_page(Classification::Generation, 3), 3);
    assert_eq!(owner.set_page(Classification::Generation, 9), 3);

    for id in ["g1", "g2", "g3", "g4"] {
        mock.apply_external(Mutation::DeleteMedia {
            media_id: id.to_string(),
        });
    }
    owner.refresh().await.unwrap();

    assert_eq!(owner.page(Classification::Generation), 1);
    assert_eq!(gen_ids(&owner), vec!["g6", "g5"]);
    let view = owner.ordered_visible_items();
    assert_eq!(view.section(Classification::Artwork).unwrap().total_items, 2);
}

#[tokio::test]
async fn test_set_primary_keeps_single_flag_and_rolls_back() {
    let mock = MockGateway::new(fixture(3, 0));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    owner.request_set_primary("g1").await.unwrap();
    let store = owner.store();
    assert_eq!(store.asset().primary_media_id.as_deref(), Some("g1"));
    assert_eq!(store.items().iter().filter(|i| i.is_primary()).count(), 1);
    assert_eq!(gen_ids(&owner)[0], "g1");

    mock.fail_writes.store(true, Ordering::SeqCst);
    let err = owner.request_set_primary("g2").await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteFailure { .. }));

    let store = owner.store();
    assert_eq!(store.asset().primary_media_id.as_deref(), Some("g1"));
    let primaries: Vec<&str> = store
        .items()
        .iter()
        .filter(|i| i.is_primary())
        .map(|i| i.id())
        .collect();
    assert_eq!(primaries, vec!["g1"]);
}

#[tokio::test]
async fn test_set_primary_on_unknown_media_is_a_validation_error() {
    let mock = MockGateway::new(fixture(2, 0));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    let err = owner.request_set_primary("nope").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_unauthorized_requests_never_reach_the_gateway() {
    let mock = MockGateway::new(fixture(2, 0));
    let stranger = open(&mock, Principal::member("stranger"), options(0, ConflictPolicy::Queue)).await;
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;
    let before = stranger.store();

    let err = stranger
        .request_status_change(StatusChange::AssetModeration(ModerationStatus::Featured))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));

    let err = stranger
        .request_delete(DeleteTarget::Asset)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));

    // Owners cannot moderate their own asset either.
    let err = owner
        .request_status_change(StatusChange::AssetModeration(ModerationStatus::Featured))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));

    assert!(mock.calls().is_empty());
    assert_eq!(stranger.store(), before);
}

#[tokio::test]
async fn test_admin_moderation_marks_asset_reviewed() {
    let mock = MockGateway::new(fixture(1, 0));
    let admin = open(&mock, Principal::admin("root"), options(0, ConflictPolicy::Queue)).await;

    admin
        .request_status_change(StatusChange::AssetModeration(ModerationStatus::Curated))
        .await
        .unwrap();

    let asset = admin.asset();
    assert_eq!(asset.moderation_status, ModerationStatus::Curated);
    assert!(asset.admin_reviewed);
    assert!(mock.canonical().asset().admin_reviewed);
}

#[tokio::test]
async fn test_reject_policy_reports_busy_while_pending() {
    let mock = MockGateway::new(fixture(2, 0));
    mock.hold_writes.store(true, Ordering::SeqCst);
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Reject)).await;

    let first = {
        let owner = owner.clone();
        tokio::spawn(async move {
            owner
                .request_status_change(StatusChange::LinkStatus {
                    media_id: "g1".to_string(),
                    status: PreferenceStatus::Hidden,
                })
                .await
        })
    };
    wait_for_pending(&owner, 1).await;
    assert_eq!(
        owner.phase(&MutationTarget::LinkStatus("g1".to_string())),
        MutationPhase::Pending
    );

    let err = owner
        .request_status_change(StatusChange::LinkStatus {
            media_id: "g1".to_string(),
            status: PreferenceStatus::Pinned,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Busy(_)));

    // A different field is not blocked.
    let other = {
        let owner = owner.clone();
        tokio::spawn(async move {
            owner
                .request_status_change(StatusChange::LinkStatus {
                    media_id: "g2".to_string(),
                    status: PreferenceStatus::Pinned,
                })
                .await
        })
    };
    wait_for_pending(&owner, 2).await;

    mock.release.add_permits(2);
    first.await.unwrap().unwrap();
    other.await.unwrap().unwrap();

    assert_eq!(
        owner.phase(&MutationTarget::LinkStatus("g1".to_string())),
        MutationPhase::Idle
    );
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_queue_policy_applies_writes_in_order() {
    let mock = MockGateway::new(fixture(2, 0));
    mock.hold_writes.store(true, Ordering::SeqCst);
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    let spawn_change = |status: PreferenceStatus| {
        let owner = owner.clone();
        tokio::spawn(async move {
            owner
                .request_status_change(StatusChange::LinkStatus {
                    media_id: "g1".to_string(),
                    status,
                })
                .await
        })
    };

    let first = spawn_change(PreferenceStatus::Hidden);
    wait_for_pending(&owner, 1).await;
    let second = spawn_change(PreferenceStatus::Pinned);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The second write waits for the first instead of applying.
    assert_eq!(owner.pending_count(), 1);

    mock.release.add_permits(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(mock.calls(), vec!["link:g1:hidden", "link:g1:pinned"]);
    let item = owner.store().item("g1").cloned().unwrap();
    assert_eq!(item.effective_status(), PreferenceStatus::Pinned);
}

#[tokio::test]
async fn test_closed_engine_discards_late_results() {
    let mock = MockGateway::new(fixture(2, 0));
    mock.hold_writes.store(true, Ordering::SeqCst);
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    owner.on_state_changed(move |event| {
        if let Some(phase) = event.phase() {
            sink.lock().unwrap().push(phase);
        }
    });

    let task = {
        let owner = owner.clone();
        tokio::spawn(async move {
            owner
                .request_delete(DeleteTarget::Media("g1".to_string()))
                .await
        })
    };
    wait_for_pending(&owner, 1).await;

    owner.close();
    mock.release.add_permits(1);

    assert_eq!(task.await.unwrap(), Err(SyncError::Closed));
    assert_eq!(*events.lock().unwrap(), vec![MutationPhase::Pending]);
    assert_eq!(
        owner
            .request_delete(DeleteTarget::Media("g2".to_string()))
            .await,
        Err(SyncError::Closed)
    );
    assert!(!owner.is_alive());
}

#[tokio::test]
async fn test_remote_not_found_rolls_back_then_refreshes() {
    let mock = MockGateway::new(fixture(3, 0));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    mock.apply_external(Mutation::DeleteMedia {
        media_id: "g2".to_string(),
    });
    assert!(owner.store().contains("g2"));

    let err = owner
        .request_status_change(StatusChange::LinkStatus {
            media_id: "g2".to_string(),
            status: PreferenceStatus::Pinned,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::RemoteFailure {
            source: GatewayError::NotFound(_),
            ..
        }
    ));
    assert!(!owner.store().contains("g2"));
    assert_eq!(gen_ids(&owner), vec!["g3", "g1"]);
}

#[tokio::test]
async fn test_subscribers_see_pending_then_outcome() {
    let mock = MockGateway::new(fixture(2, 0));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    let events: Arc<Mutex<Vec<StateEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let id = owner.on_state_changed(move |event| sink.lock().unwrap().push(event.clone()));

    owner
        .request_status_change(StatusChange::AssetPreference(PreferenceStatus::Pinned))
        .await
        .unwrap();
    mock.fail_writes.store(true, Ordering::SeqCst);
    let _ = owner
        .request_status_change(StatusChange::AssetPreference(PreferenceStatus::Hidden))
        .await;

    let phases: Vec<MutationPhase> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.phase())
        .collect();
    assert_eq!(
        phases,
        vec![
            MutationPhase::Pending,
            MutationPhase::Committed,
            MutationPhase::Pending,
            MutationPhase::RolledBack,
        ]
    );
    let last = events.lock().unwrap().last().cloned().unwrap();
    assert!(last.message().unwrap().contains("Could not"));
    assert_eq!(owner.asset().preference_status, PreferenceStatus::Pinned);

    assert!(owner.unsubscribe(id));
    let _ = owner.refresh().await;
    assert_eq!(events.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_deleted_asset_empties_the_view() {
    let mock = MockGateway::new(fixture(2, 1));
    let owner = open(&mock, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;

    owner.request_delete(DeleteTarget::Asset).await.unwrap();

    let view = owner.ordered_visible_items();
    assert!(view.asset.is_none());
    assert!(view.sections.iter().all(|s| s.items.is_empty()));

    let err = owner
        .request_status_change(StatusChange::AssetPreference(PreferenceStatus::Pinned))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
    assert_eq!(mock.calls(), vec!["delete:asset:a1"]);
}

#[tokio::test]
async fn test_creator_name_prefers_profile_and_caches_it() {
    let mock = MockGateway::new(fixture(1, 0));
    let owner = open(&mock, Principal::anonymous(), options(0, ConflictPolicy::Queue)).await;

    // Unknown profile: fall back to the free-text label.
    assert_eq!(owner.creator_name().await.as_deref(), Some("wan_fan"));

    mock.profiles.lock().unwrap().insert(
        OWNER.to_string(),
        Profile {
            id: OWNER.to_string(),
            username: "owner".to_string(),
            display_name: Some("The Owner".to_string()),
        },
    );
    assert_eq!(owner.creator_name().await.as_deref(), Some("The Owner"));
    assert_eq!(owner.creator_name().await.as_deref(), Some("The Owner"));
    assert_eq!(mock.profile_lookups.load(Ordering::SeqCst), 2);
    assert_eq!(owner.cached_profiles(), 1);
}

#[tokio::test]
async fn test_playable_url_goes_through_the_gateway() {
    let mock = MockGateway::new(fixture(1, 0));
    let viewer = open(&mock, Principal::anonymous(), options(0, ConflictPolicy::Queue)).await;

    assert_eq!(
        viewer.playable_url("g1").await.unwrap(),
        "https://cdn.example.com/videos/g1.mp4"
    );
    assert!(matches!(
        viewer.playable_url("missing").await,
        Err(SyncError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_refetch_after_commit_picks_up_remote_changes() {
    let mock = MockGateway::new(fixture(3, 0));
    let opts = SyncOptions {
        refetch_after_commit: true,
        ..options(0, ConflictPolicy::Queue)
    };
    let admin = open(&mock, Principal::admin("root"), opts).await;

    let refreshed = Arc::new(AtomicBool::new(false));
    let flag = refreshed.clone();
    admin.on_state_changed(move |event| {
        if matches!(event, StateEvent::Refreshed) {
            flag.store(true, Ordering::SeqCst);
        }
    });

    // Someone else removes g3 while our delete of g1 is committing.
    mock.apply_external(Mutation::DeleteMedia {
        media_id: "g3".to_string(),
    });
    admin
        .request_delete(DeleteTarget::Media("g1".to_string()))
        .await
        .unwrap();

    for _ in 0..1000 {
        if refreshed.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    assert!(refreshed.load(Ordering::SeqCst));
    assert_eq!(gen_ids(&admin), vec!["g2"]);
}

#[tokio::test]
async fn test_failed_primary_change_after_deleting_old_primary() {
    let mock = MockGateway::new(fixture(3, 0));
    let admin = open(&mock, Principal::admin("root"), options(0, ConflictPolicy::Queue)).await;
    admin.request_set_primary("g1").await.unwrap();

    mock.hold_writes.store(true, Ordering::SeqCst);
    let pending_primary = {
        let admin = admin.clone();
        tokio::spawn(async move { admin.request_set_primary("g2").await })
    };
    wait_for_pending(&admin, 1).await;

    // The old primary goes away while the new choice is still in flight.
    mock.hold_writes.store(false, Ordering::SeqCst);
    admin
        .request_delete(DeleteTarget::Media("g1".to_string()))
        .await
        .unwrap();

    mock.fail_writes.store(true, Ordering::SeqCst);
    mock.release.add_permits(1);
    let err = pending_primary.await.unwrap().unwrap_err();
    assert!(err.is_rollback());

    let store = admin.store();
    assert!(!store.contains("g1"));
    assert!(store.asset().primary_media_id.is_none());
    assert!(store.primary().is_none());
    assert!(store.items().iter().all(|i| !i.is_primary()));
    assert_eq!(
        store.asset().primary_media_id,
        mock.canonical().asset().primary_media_id
    );
}

#[tokio::test]
async fn test_retry_after_rollback_matches_first_attempt() {
    let change = || StatusChange::LinkStatus {
        media_id: "g1".to_string(),
        status: PreferenceStatus::Hidden,
    };

    let retried = MockGateway::new(fixture(3, 0));
    let owner = open(&retried, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;
    retried.fail_writes.store(true, Ordering::SeqCst);
    let before = owner.store();
    assert!(owner.request_status_change(change()).await.unwrap_err().is_rollback());
    assert_eq!(owner.store(), before);

    retried.fail_writes.store(false, Ordering::SeqCst);
    owner.request_status_change(change()).await.unwrap();

    let fresh = MockGateway::new(fixture(3, 0));
    let first_time =
        open(&fresh, Principal::member(OWNER), options(0, ConflictPolicy::Queue)).await;
    first_time.request_status_change(change()).await.unwrap();

    assert_eq!(owner.store(), first_time.store());
    assert_eq!(retried.canonical(), fresh.canonical());
    assert_eq!(retried.calls(), vec!["link:g1:hidden", "link:g1:hidden"]);
    assert_eq!(fresh.calls(), vec!["link:g1:hidden"]);
    assert_eq!(owner.pending_count(), 0);
}

#[tokio::test]
async fn test_moderation_hides_items_and_viewer_page_clamps() {
    let mock = MockGateway::new(fixture(9, 0));
    let viewer = open(&mock, Principal::member("viewer"), options(4, ConflictPolicy::Queue)).await;

    assert_eq!(viewer.set_page(Classification::Generation, 3), 3);
    let view = viewer.ordered_visible_items();
    let gens = view.section(Classification::Generation).unwrap();
    assert_eq!(gens.total_pages, 3);
    assert_eq!(gens.items.len(), 1);

    for id in ["g2", "g5", "g8"] {
        mock.apply_external(Mutation::MediaModeration {
            media_id: id.to_string(),
            status: ModerationStatus::Hidden,
        });
    }
    viewer.refresh().await.unwrap();

    let view = viewer.ordered_visible_items();
    let gens = view.section(Classification::Generation).unwrap();
    assert_eq!(gens.total_items, 6);
    assert_eq!(gens.total_pages, 2);
    assert_eq!(gens.page, 2);
    assert_eq!(gens.items.len(), 2);
    assert_eq!(viewer.page(Classification::Generation), 2);
}
