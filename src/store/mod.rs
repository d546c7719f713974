//! In-memory view of one asset and its associated media.
//!
//! The free functions are pure and total; [`AssociationStore`] keeps its items
//! in display order and is only mutated by the sync engine through
//! [`AssociationStore::apply`] / [`AssociationStore::restore`].

pub mod mutation;

use crate::models::{Asset, Classification, MediaItem, Principal, ViewerRole};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use thiserror::Error;

pub use mutation::{Mutation, MutationTarget, Snapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("media {0} is not part of this asset")]
    MediaNotFound(String),

    #[error("media {0} is not linked to this asset")]
    NotLinked(String),

    #[error("asset has been deleted")]
    AssetDeleted,
}

/// Primary first, then ascending rank of the effective status, then newest
/// first. Ties keep their input order.
pub fn sort_for_display(items: &[MediaItem], primary_media_id: Option<&str>) -> Vec<MediaItem> {
    let mut ordered = items.to_vec();
    sort_in_place(&mut ordered, primary_media_id);
    ordered
}

pub(crate) fn sort_in_place(items: &mut [MediaItem], primary_media_id: Option<&str>) {
    // slice::sort_by is stable
    items.sort_by(|a, b| compare_for_display(a, b, primary_media_id));
}

fn compare_for_display(a: &MediaItem, b: &MediaItem, primary: Option<&str>) -> Ordering {
    let key = |item: &MediaItem| {
        (
            primary != Some(item.id()),
            item.effective_status().sort_rank(),
            Reverse(item.media.created_at),
        )
    };
    key(a).cmp(&key(b))
}

/// Whether `item` may be shown to a viewer holding `role` for it.
pub fn is_item_visible(item: &MediaItem, role: ViewerRole) -> bool {
    role.is_privileged()
        || (item.media.moderation_status.is_public() && !item.effective_status().is_hidden())
}

pub fn filter_visible(items: &[MediaItem], viewer: ViewerRole) -> Vec<MediaItem> {
    items
        .iter()
        .filter(|item| is_item_visible(item, viewer))
        .cloned()
        .collect()
}

/// 1-indexed page of `items`. Out-of-range pages are empty; callers clamp.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 {
        return &[];
    }
    if page_size == 0 || items.len() <= page_size {
        return if page == 1 { items } else { &[] };
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Always at least one page, even when empty.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 || count <= page_size {
        1
    } else {
        count.div_ceil(page_size)
    }
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

pub fn classification_counts(items: &[MediaItem]) -> BTreeMap<Classification, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item.classification()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationStore {
    asset: Asset,
    items: Vec<MediaItem>,
    deleted: bool,
}

impl AssociationStore {
    pub fn new(asset: Asset, items: Vec<MediaItem>) -> Self {
        let mut store = Self {
            asset,
            items,
            deleted: false,
        };
        store.resort();
        store
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// All items in display order, regardless of visibility.
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn item(&self, media_id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|i| i.id() == media_id)
    }

    pub fn contains(&self, media_id: &str) -> bool {
        self.item(media_id).is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn primary(&self) -> Option<&MediaItem> {
        self.asset
            .primary_media_id
            .as_deref()
            .and_then(|id| self.item(id))
    }

    /// Role of `principal` for one item: owning the asset or the media item
    /// makes the viewer an owner of that item.
    pub fn role_for_item(&self, principal: &Principal, item: &MediaItem) -> ViewerRole {
        match principal.role_for(self.asset.user_id.as_deref()) {
            ViewerRole::Owner => ViewerRole::Owner,
            _ if principal.owns(item.media.user_id.as_deref()) => ViewerRole::Owner,
            role => role,
        }
    }

    /// Items `principal` may see, in display order. Empty when the asset
    /// itself is deleted or invisible to them.
    pub fn visible_items(&self, principal: &Principal) -> Vec<MediaItem> {
        let asset_role = principal.role_for(self.asset.user_id.as_deref());
        if self.deleted || !self.asset.is_visible_to(asset_role) {
            return Vec::new();
        }
        self.items
            .iter()
            .filter(|item| is_item_visible(item, self.role_for_item(principal, item)))
            .cloned()
            .collect()
    }

    /// Visible items grouped by classification; every classification has an
    /// entry, possibly empty.
    pub fn visible_by_classification(
        &self,
        principal: &Principal,
    ) -> BTreeMap<Classification, Vec<MediaItem>> {
        let mut groups: BTreeMap<Classification, Vec<MediaItem>> = [
            (Classification::Generation, Vec::new()),
            (Classification::Artwork, Vec::new()),
        ]
        .into_iter()
        .collect();
        for item in self.visible_items(principal) {
            groups.entry(item.classification()).or_default().push(item);
        }
        groups
    }

    pub(crate) fn resort(&mut self) {
        let primary = self.asset.primary_media_id.clone();
        sort_in_place(&mut self.items, primary.as_deref());
    }

    fn item_mut(&mut self, media_id: &str) -> Result<&mut MediaItem, StoreError> {
        self.items
            .iter_mut()
            .find(|i| i.id() == media_id)
            .ok_or_else(|| StoreError::MediaNotFound(media_id.to_string()))
    }
}
