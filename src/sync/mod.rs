//! Optimistic synchronization of one asset view against a [`RemoteGateway`].
//!
//! Every intent runs through the same protocol:
//!
//! 1. preconditions (existence, authorization, validation) are checked on the
//!    local copy; failures return immediately and touch nothing;
//! 2. the per-target guard is taken, so writes to the same field never race;
//! 3. the change is applied to the store (Pending) and subscribers notified;
//! 4. the gateway call runs; on success the change is kept (Committed), on
//!    failure the snapshot is restored (RolledBack).
//!
//! The state lock is never held across an `.await`.

pub mod error;
pub mod events;
pub mod profiles;

use crate::gateway::{AssetField, GatewayError, MediaField, RemoteGateway};
use crate::models::{Asset, Classification, MediaItem, Principal};
use crate::status::{ModerationStatus, PreferenceStatus};
use crate::store::{
    self, AssociationStore, Mutation, MutationTarget, Snapshot, StoreError,
};
use crate::utils::keyed_mutex::KeyedMutex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub use error::SyncError;
pub use events::{MutationPhase, StateEvent, SubscriptionId};
pub use profiles::ProfileCache;

/// What to do with a second intent on a target that is still pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Wait for the earlier write, then run. Order is preserved.
    #[default]
    Queue,
    /// Fail fast with [`SyncError::Busy`].
    Reject,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Items per page for each classification; 0 disables pagination.
    pub page_size: usize,
    /// Spawn a full re-fetch after a committed membership change.
    pub refetch_after_commit: bool,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 12,
            refetch_after_commit: true,
            conflict_policy: ConflictPolicy::Queue,
        }
    }
}

/// A status edit requested by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    AssetModeration(ModerationStatus),
    AssetPreference(PreferenceStatus),
    MediaModeration {
        media_id: String,
        status: ModerationStatus,
    },
    MediaPreference {
        media_id: String,
        status: PreferenceStatus,
    },
    LinkStatus {
        media_id: String,
        status: PreferenceStatus,
    },
}

impl From<StatusChange> for Mutation {
    fn from(change: StatusChange) -> Self {
        match change {
            StatusChange::AssetModeration(status) => Mutation::AssetModeration(status),
            StatusChange::AssetPreference(status) => Mutation::AssetPreference(status),
            StatusChange::MediaModeration { media_id, status } => {
                Mutation::MediaModeration { media_id, status }
            }
            StatusChange::MediaPreference { media_id, status } => {
                Mutation::MediaPreference { media_id, status }
            }
            StatusChange::LinkStatus { media_id, status } => {
                Mutation::LinkStatus { media_id, status }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Asset,
    Media(String),
}

/// One page of one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedPage {
    pub classification: Classification,
    pub items: Vec<MediaItem>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Everything the view renders for the current viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryView {
    /// `None` when the asset is deleted or not visible to the viewer.
    pub asset: Option<Asset>,
    pub sections: Vec<ClassifiedPage>,
}

impl GalleryView {
    pub fn section(&self, classification: Classification) -> Option<&ClassifiedPage> {
        self.sections
            .iter()
            .find(|s| s.classification == classification)
    }
}

struct EngineState {
    store: AssociationStore,
    cursors: BTreeMap<Classification, usize>,
    pending: BTreeMap<u64, Mutation>,
}

struct Inner {
    asset_id: String,
    principal: Principal,
    gateway: Arc<dyn RemoteGateway>,
    options: SyncOptions,
    state: Mutex<EngineState>,
    guards: KeyedMutex,
    alive: AtomicBool,
    next_mutation: AtomicU64,
    subscribers: events::Subscribers,
    profiles: Mutex<ProfileCache>,
}

/// Owns the association store of one open asset view. Cheap to clone; all
/// clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Fetches the asset and its associations and builds an engine for them.
    pub async fn open(
        gateway: Arc<dyn RemoteGateway>,
        principal: Principal,
        asset_id: &str,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        let (asset, items) = tokio::join!(
            gateway.get_asset(asset_id),
            gateway.get_associations(asset_id)
        );
        let asset = asset.map_err(|e| fetch_error(asset_id, e))?;
        let items = items.map_err(|e| fetch_error(asset_id, e))?;
        info!(
            "📂 Opened asset {} with {} media item(s)",
            asset_id,
            items.len()
        );
        Ok(Self::from_store(
            gateway,
            principal,
            AssociationStore::new(asset, items),
            options,
        ))
    }

    /// Builds an engine over an already loaded store.
    pub fn from_store(
        gateway: Arc<dyn RemoteGateway>,
        principal: Principal,
        store: AssociationStore,
        options: SyncOptions,
    ) -> Self {
        let engine = Self {
            inner: Arc::new(Inner {
                asset_id: store.asset().id.clone(),
                principal,
                gateway,
                options,
                state: Mutex::new(EngineState {
                    store,
                    cursors: BTreeMap::new(),
                    pending: BTreeMap::new(),
                }),
                guards: KeyedMutex::new(),
                alive: AtomicBool::new(true),
                next_mutation: AtomicU64::new(1),
                subscribers: events::Subscribers::default(),
                profiles: Mutex::new(ProfileCache::default()),
            }),
        };
        {
            let mut state = engine.state();
            engine.clamp_cursors(&mut state);
        }
        engine
    }

    pub fn asset_id(&self) -> &str {
        &self.inner.asset_id
    }

    pub fn principal(&self) -> &Principal {
        &self.inner.principal
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Tears the view down. Results of calls still in flight are discarded.
    pub fn close(&self) {
        if self.inner.alive.swap(false, Ordering::SeqCst) {
            debug!("Closing sync engine for asset {}", self.inner.asset_id);
            self.inner.subscribers.clear();
        }
    }

    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    /// Copy of the current (optimistic) store.
    pub fn store(&self) -> AssociationStore {
        self.state().store.clone()
    }

    pub fn asset(&self) -> Asset {
        self.state().store.asset().clone()
    }

    /// Pending if a write to `target` is in flight, Idle otherwise.
    pub fn phase(&self, target: &MutationTarget) -> MutationPhase {
        let state = self.state();
        if state.pending.values().any(|m| m.target() == *target) {
            MutationPhase::Pending
        } else {
            MutationPhase::Idle
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// All items visible to the engine's principal, in display order.
    pub fn visible_items(&self) -> Vec<MediaItem> {
        self.state().store.visible_items(&self.inner.principal)
    }

    /// Current page of every classification for the engine's principal.
    pub fn ordered_visible_items(&self) -> GalleryView {
        let state = self.state();
        let principal = &self.inner.principal;
        let current = &state.store;
        let asset_role = principal.role_for(current.asset().user_id.as_deref());
        let asset = (!current.is_deleted() && current.asset().is_visible_to(asset_role))
            .then(|| current.asset().clone());

        let page_size = self.inner.options.page_size;
        let sections = current
            .visible_by_classification(principal)
            .into_iter()
            .map(|(classification, items)| {
                let total_pages = store::total_pages(items.len(), page_size);
                let page = state.cursors.get(&classification).copied().unwrap_or(1);
                ClassifiedPage {
                    classification,
                    items: store::paginate(&items, page, page_size).to_vec(),
                    page,
                    total_pages,
                    total_items: items.len(),
                }
            })
            .collect();

        GalleryView { asset, sections }
    }

    pub fn page(&self, classification: Classification) -> usize {
        self.state()
            .cursors
            .get(&classification)
            .copied()
            .unwrap_or(1)
    }

    /// Moves the cursor of one classification; returns the clamped page.
    pub fn set_page(&self, classification: Classification, page: usize) -> usize {
        let mut state = self.state();
        let count = state
            .store
            .visible_by_classification(&self.inner.principal)
            .get(&classification)
            .map_or(0, Vec::len);
        let total = store::total_pages(count, self.inner.options.page_size);
        let clamped = store::clamp_page(page, total);
        state.cursors.insert(classification, clamped);
        clamped
    }

    pub async fn request_status_change(&self, change: StatusChange) -> Result<(), SyncError> {
        self.run(change.into()).await
    }

    pub async fn request_delete(&self, target: DeleteTarget) -> Result<(), SyncError> {
        let mutation = match target {
            DeleteTarget::Asset => Mutation::DeleteAsset,
            DeleteTarget::Media(media_id) => Mutation::DeleteMedia { media_id },
        };
        self.run(mutation).await
    }

    pub async fn request_set_primary(&self, media_id: &str) -> Result<(), SyncError> {
        self.run(Mutation::SetPrimary {
            media_id: media_id.to_string(),
        })
        .await
    }

    /// Replaces the local copy with canonical state. Mutations still in
    /// flight are replayed on top of the fetched data.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.ensure_alive()?;
        let asset_id = self.inner.asset_id.clone();
        let (asset, items) = tokio::join!(
            self.inner.gateway.get_asset(&asset_id),
            self.inner.gateway.get_associations(&asset_id)
        );
        self.ensure_alive()?;

        let fetched = match (asset, items) {
            (Ok(asset), Ok(items)) => AssociationStore::new(asset, items),
            (Err(GatewayError::NotFound(_)), _) => {
                info!("🗑️  Asset {} no longer exists", asset_id);
                {
                    let mut state = self.state();
                    if !state.store.is_deleted()
                        && let Err(e) = state.store.apply(&Mutation::DeleteAsset)
                    {
                        debug!("Local delete of asset {} skipped: {}", asset_id, e);
                    }
                    self.clamp_cursors(&mut state);
                }
                self.notify(&StateEvent::Refreshed);
                return Err(SyncError::NotFound(format!("asset {asset_id}")));
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Refresh of asset {} failed: {}", asset_id, e);
                return Err(SyncError::RemoteFailure {
                    action: "refresh asset".to_string(),
                    source: e,
                });
            }
        };

        let previous_owner = {
            let mut state = self.state();
            let previous_owner = state.store.asset().user_id.clone();
            let mut store = fetched;
            for mutation in state.pending.values() {
                if let Err(e) = store.apply(mutation) {
                    debug!("Pending {:?} no longer applies after refresh: {}", mutation, e);
                }
            }
            let owner_changed = previous_owner != store.asset().user_id;
            state.store = store;
            self.clamp_cursors(&mut state);
            previous_owner.filter(|_| owner_changed)
        };

        if let Some(old_owner) = previous_owner {
            self.profiles().invalidate(&old_owner);
        }
        debug!("🔄 Refreshed asset {}", asset_id);
        self.notify(&StateEvent::Refreshed);
        Ok(())
    }

    /// Playable URL of one media item of this asset.
    pub async fn playable_url(&self, media_id: &str) -> Result<String, SyncError> {
        let locator = self
            .state()
            .store
            .item(media_id)
            .map(|item| item.media.locator.clone())
            .ok_or_else(|| SyncError::NotFound(format!("media {media_id}")))?;
        self.inner
            .gateway
            .resolve_playable_url(&locator)
            .await
            .map_err(|source| SyncError::RemoteFailure {
                action: format!("resolve video {media_id}"),
                source,
            })
    }

    /// Creator attribution for the asset. The owning profile is looked up
    /// once and cached; the free-text label is the fallback.
    pub async fn creator_name(&self) -> Option<String> {
        let asset = self.asset();
        let Some(user_id) = asset.user_id.clone() else {
            return asset.creator_display(None);
        };

        let cached = self.profiles().get(&user_id).cloned();
        let profile = match cached {
            Some(profile) => Some(profile),
            None => match self.inner.gateway.get_profile(&user_id).await {
                Ok(profile) => {
                    if self.is_alive() {
                        self.profiles().insert(profile.clone());
                    }
                    Some(profile)
                }
                Err(e) => {
                    warn!("Profile lookup for {} failed: {}", user_id, e);
                    None
                }
            },
        };
        asset.creator_display(profile.as_ref())
    }

    pub fn cached_profiles(&self) -> usize {
        self.profiles().len()
    }

    async fn run(&self, mutation: Mutation) -> Result<(), SyncError> {
        self.ensure_alive()?;
        let target = mutation.target();

        if let Err(err) = self.check_preconditions(&mutation) {
            return Err(self.precondition_failed(&target, err).await);
        }

        let key = target.to_string();
        let guard = match self.inner.options.conflict_policy {
            ConflictPolicy::Queue => self.inner.guards.lock(&key).await,
            ConflictPolicy::Reject => match self.inner.guards.try_lock(&key) {
                Some(guard) => guard,
                None => {
                    let err = SyncError::Busy(describe(&mutation));
                    self.notify(&StateEvent::Failed {
                        target: Some(target),
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            },
        };

        let result = self.run_guarded(mutation, target).await;
        drop(guard);
        self.inner.guards.cleanup();
        result
    }

    async fn run_guarded(
        &self,
        mutation: Mutation,
        target: MutationTarget,
    ) -> Result<(), SyncError> {
        // The state may have moved on while this intent was queued.
        self.ensure_alive()?;
        if let Err(err) = self.check_preconditions(&mutation) {
            return Err(self.precondition_failed(&target, err).await);
        }

        // Idle -> Pending
        let id = self.inner.next_mutation.fetch_add(1, Ordering::Relaxed);
        let applied = {
            let mut state = self.state();
            let applied = state.store.apply(&mutation);
            if applied.is_ok() {
                state.pending.insert(id, mutation.clone());
                self.clamp_cursors(&mut state);
            }
            applied
        };
        let snapshot = match applied {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = store_error(&mutation, e);
                return Err(self.precondition_failed(&target, err).await);
            }
        };
        debug!("⏳ {} pending", target);
        self.notify(&StateEvent::Pending {
            target: target.clone(),
        });

        let result = self.dispatch(&mutation).await;

        if !self.is_alive() {
            debug!("Discarding result for {}: view closed", target);
            return Err(SyncError::Closed);
        }

        match result {
            Ok(()) => {
                self.commit(id, &mutation, target);
                Ok(())
            }
            Err(source) => {
                let err = SyncError::RemoteFailure {
                    action: describe(&mutation),
                    source,
                };
                self.roll_back(id, snapshot, target, &err);
                if let SyncError::RemoteFailure {
                    source: GatewayError::NotFound(_),
                    ..
                } = err
                {
                    self.refresh_logged().await;
                }
                Err(err)
            }
        }
    }

    fn commit(&self, id: u64, mutation: &Mutation, target: MutationTarget) {
        {
            let mut state = self.state();
            state.pending.remove(&id);
            self.clamp_cursors(&mut state);
        }
        info!("✅ {} committed", target);
        self.notify(&StateEvent::Committed { target });

        if mutation.changes_membership()
            && self.inner.options.refetch_after_commit
            && !matches!(mutation, Mutation::DeleteAsset)
        {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.refresh_logged().await;
            });
        }
    }

    fn roll_back(&self, id: u64, snapshot: Snapshot, target: MutationTarget, err: &SyncError) {
        {
            let mut state = self.state();
            state.pending.remove(&id);
            state.store.restore(snapshot);
            self.clamp_cursors(&mut state);
        }
        warn!("↩️  {} rolled back: {}", target, err);
        self.notify(&StateEvent::RolledBack {
            target,
            message: err.to_string(),
        });
    }

    async fn refresh_logged(&self) {
        match self.refresh().await {
            Ok(()) | Err(SyncError::Closed) => {}
            Err(e) => warn!("Background refresh failed: {}", e),
        }
    }

    /// Reports a failed precondition. A missing target means the local copy
    /// is stale, so it is re-fetched before returning.
    async fn precondition_failed(&self, target: &MutationTarget, err: SyncError) -> SyncError {
        warn!("Rejected {}: {}", target, err);
        if matches!(err, SyncError::NotFound(_)) {
            self.refresh_logged().await;
        }
        self.notify(&StateEvent::Failed {
            target: Some(target.clone()),
            message: err.to_string(),
        });
        err
    }

    fn check_preconditions(&self, mutation: &Mutation) -> Result<(), SyncError> {
        let state = self.state();
        let store = &state.store;
        let principal = &self.inner.principal;

        if store.is_deleted() {
            return Err(SyncError::NotFound(format!(
                "asset {}",
                self.inner.asset_id
            )));
        }

        let owns_asset = principal.owns(store.asset().user_id.as_deref());
        let item = match mutation.media_id() {
            Some(media_id) => match store.item(media_id) {
                Some(item) => Some(item),
                None if matches!(mutation, Mutation::SetPrimary { .. }) => {
                    return Err(SyncError::Validation(format!(
                        "media {media_id} is not associated with this asset"
                    )));
                }
                None => return Err(SyncError::NotFound(format!("media {media_id}"))),
            },
            None => None,
        };
        let owns_item = item.is_some_and(|i| principal.owns(i.media.user_id.as_deref()));

        let allowed = match mutation {
            Mutation::AssetModeration(_) | Mutation::MediaModeration { .. } => principal.is_admin,
            Mutation::AssetPreference(_) => owns_asset,
            Mutation::MediaPreference { .. } => owns_item,
            Mutation::LinkStatus { .. } | Mutation::SetPrimary { .. } | Mutation::DeleteAsset => {
                owns_asset || principal.is_admin
            }
            Mutation::DeleteMedia { .. } => owns_item || principal.is_admin,
        };
        if !allowed {
            return Err(SyncError::Unauthorized(format!(
                "not allowed to {}",
                describe(mutation)
            )));
        }

        if let (Mutation::LinkStatus { media_id, .. } | Mutation::SetPrimary { media_id }, Some(i)) =
            (mutation, item)
            && i.link.is_none()
        {
            return Err(SyncError::Validation(format!(
                "media {media_id} is not associated with this asset"
            )));
        }

        Ok(())
    }

    async fn dispatch(&self, mutation: &Mutation) -> Result<(), GatewayError> {
        let gateway = &self.inner.gateway;
        let asset_id = self.inner.asset_id.as_str();
        match mutation {
            Mutation::AssetModeration(status) => {
                gateway
                    .update_asset_field(asset_id, AssetField::ModerationStatus(*status))
                    .await
            }
            Mutation::AssetPreference(status) => {
                gateway
                    .update_asset_field(asset_id, AssetField::PreferenceStatus(*status))
                    .await
            }
            Mutation::MediaModeration { media_id, status } => {
                gateway
                    .update_media_field(media_id, MediaField::ModerationStatus(*status))
                    .await
            }
            Mutation::MediaPreference { media_id, status } => {
                gateway
                    .update_media_field(media_id, MediaField::PreferenceStatus(*status))
                    .await
            }
            Mutation::LinkStatus { media_id, status } => {
                gateway
                    .update_association_status(asset_id, media_id, *status)
                    .await
            }
            Mutation::SetPrimary { media_id } => {
                gateway
                    .update_asset_field(asset_id, AssetField::PrimaryMediaId(media_id.clone()))
                    .await
            }
            Mutation::DeleteMedia { media_id } => gateway.delete_media(media_id).await,
            Mutation::DeleteAsset => gateway.delete_asset(asset_id).await,
        }
    }

    /// Clamps every page cursor to the current number of visible pages. Runs
    /// under the same lock as the change that moved the counts.
    fn clamp_cursors(&self, state: &mut EngineState) {
        let page_size = self.inner.options.page_size;
        let groups = state.store.visible_by_classification(&self.inner.principal);
        for (classification, items) in groups {
            let total = store::total_pages(items.len(), page_size);
            let cursor = state.cursors.entry(classification).or_insert(1);
            let clamped = store::clamp_page(*cursor, total);
            if clamped != *cursor {
                debug!(
                    "📄 Clamping {:?} page {} -> {} ({} item(s))",
                    classification,
                    cursor,
                    clamped,
                    items.len()
                );
                *cursor = clamped;
            }
        }
    }

    fn ensure_alive(&self) -> Result<(), SyncError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SyncError::Closed)
        }
    }

    fn notify(&self, event: &StateEvent) {
        if self.is_alive() {
            self.inner.subscribers.notify(event);
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn profiles(&self) -> MutexGuard<'_, ProfileCache> {
        self.inner
            .profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn fetch_error(asset_id: &str, err: GatewayError) -> SyncError {
    match err {
        GatewayError::NotFound(_) => SyncError::NotFound(format!("asset {asset_id}")),
        source => SyncError::RemoteFailure {
            action: format!("load asset {asset_id}"),
            source,
        },
    }
}

fn store_error(mutation: &Mutation, err: StoreError) -> SyncError {
    match (mutation, err) {
        (Mutation::SetPrimary { .. }, StoreError::MediaNotFound(id) | StoreError::NotLinked(id))
        | (_, StoreError::NotLinked(id)) => {
            SyncError::Validation(format!("media {id} is not associated with this asset"))
        }
        (_, StoreError::MediaNotFound(id)) => SyncError::NotFound(format!("media {id}")),
        (_, StoreError::AssetDeleted) => SyncError::NotFound("asset".to_string()),
    }
}

/// Short description used in log lines and user notifications.
fn describe(mutation: &Mutation) -> String {
    match mutation {
        Mutation::AssetModeration(status) => format!("set asset moderation to {status}"),
        Mutation::AssetPreference(status) => format!("set asset visibility to {status}"),
        Mutation::MediaModeration { media_id, status } => {
            format!("set moderation of video {media_id} to {status}")
        }
        Mutation::MediaPreference { media_id, status } => {
            format!("set visibility of video {media_id} to {status}")
        }
        Mutation::LinkStatus { media_id, status } => {
            format!("set display status of video {media_id} to {status}")
        }
        Mutation::SetPrimary { media_id } => format!("make video {media_id} the primary video"),
        Mutation::DeleteMedia { media_id } => format!("delete video {media_id}"),
        Mutation::DeleteAsset => "delete asset".to_string(),
    }
}
