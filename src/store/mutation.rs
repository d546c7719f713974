use super::{AssociationStore, StoreError};
use crate::models::{Asset, MediaItem};
use crate::status::{ModerationStatus, PreferenceStatus};
use std::fmt;

/// A state change the engine applies optimistically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
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
    SetPrimary {
        media_id: String,
    },
    DeleteMedia {
        media_id: String,
    },
    DeleteAsset,
}

/// The field a mutation writes. Two mutations with the same target never
/// run at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    AssetModeration,
    AssetPreference,
    AssetPrimary,
    AssetDeletion,
    MediaModeration(String),
    MediaPreference(String),
    LinkStatus(String),
    MediaDeletion(String),
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AssetModeration => write!(f, "asset:moderation"),
            Self::AssetPreference => write!(f, "asset:preference"),
            Self::AssetPrimary => write!(f, "asset:primary"),
            Self::AssetDeletion => write!(f, "asset:delete"),
            Self::MediaModeration(id) => write!(f, "media:{id}:moderation"),
            Self::MediaPreference(id) => write!(f, "media:{id}:preference"),
            Self::LinkStatus(id) => write!(f, "link:{id}:status"),
            Self::MediaDeletion(id) => write!(f, "media:{id}:delete"),
        }
    }
}

impl Mutation {
    pub fn target(&self) -> MutationTarget {
        match self {
            Self::AssetModeration(_) => MutationTarget::AssetModeration,
            Self::AssetPreference(_) => MutationTarget::AssetPreference,
            Self::MediaModeration { media_id, .. } => {
                MutationTarget::MediaModeration(media_id.clone())
            }
            Self::MediaPreference { media_id, .. } => {
                MutationTarget::MediaPreference(media_id.clone())
            }
            Self::LinkStatus { media_id, .. } => MutationTarget::LinkStatus(media_id.clone()),
            Self::SetPrimary { .. } => MutationTarget::AssetPrimary,
            Self::DeleteMedia { media_id } => MutationTarget::MediaDeletion(media_id.clone()),
            Self::DeleteAsset => MutationTarget::AssetDeletion,
        }
    }

    /// Whether the mutation changes which items exist or which one leads.
    pub fn changes_membership(&self) -> bool {
        matches!(
            self,
            Self::SetPrimary { .. } | Self::DeleteMedia { .. } | Self::DeleteAsset
        )
    }

    pub fn media_id(&self) -> Option<&str> {
        match self {
            Self::MediaModeration { media_id, .. }
            | Self::MediaPreference { media_id, .. }
            | Self::LinkStatus { media_id, .. }
            | Self::SetPrimary { media_id }
            | Self::DeleteMedia { media_id } => Some(media_id),
            Self::AssetModeration(_) | Self::AssetPreference(_) | Self::DeleteAsset => None,
        }
    }
}

/// Undo record for exactly the fields one [`Mutation`] touched.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    AssetModeration {
        status: ModerationStatus,
        admin_reviewed: bool,
    },
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
    Primary {
        primary_media_id: Option<String>,
        flags: Vec<(String, bool)>,
    },
    RemovedMedia {
        index: usize,
        item: Box<MediaItem>,
        was_primary: bool,
    },
    RemovedAsset {
        asset: Box<Asset>,
        items: Vec<MediaItem>,
    },
}

impl AssociationStore {
    /// Applies `mutation` and returns what is needed to revert it. On error
    /// the store is left untouched.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<Snapshot, StoreError> {
        if self.deleted {
            return Err(StoreError::AssetDeleted);
        }

        let snapshot = match mutation {
            Mutation::AssetModeration(status) => {
                let snapshot = Snapshot::AssetModeration {
                    status: self.asset.moderation_status,
                    admin_reviewed: self.asset.admin_reviewed,
                };
                self.asset.moderation_status = *status;
                self.asset.admin_reviewed = true;
                snapshot
            }
            Mutation::AssetPreference(status) => {
                let snapshot = Snapshot::AssetPreference(self.asset.preference_status);
                self.asset.preference_status = *status;
                snapshot
            }
            Mutation::MediaModeration { media_id, status } => {
                let item = self.item_mut(media_id)?;
                let snapshot = Snapshot::MediaModeration {
                    media_id: media_id.clone(),
                    status: item.media.moderation_status,
                };
                item.media.moderation_status = *status;
                snapshot
            }
            Mutation::MediaPreference { media_id, status } => {
                let item = self.item_mut(media_id)?;
                let snapshot = Snapshot::MediaPreference {
                    media_id: media_id.clone(),
                    status: item.media.preference_status,
                };
                item.media.preference_status = *status;
                snapshot
            }
            Mutation::LinkStatus { media_id, status } => {
                let item = self.item_mut(media_id)?;
                let link = item
                    .link
                    .as_mut()
                    .ok_or_else(|| StoreError::NotLinked(media_id.clone()))?;
                let snapshot = Snapshot::LinkStatus {
                    media_id: media_id.clone(),
                    status: link.status,
                };
                link.status = *status;
                snapshot
            }
            Mutation::SetPrimary { media_id } => {
                match self.item(media_id) {
                    None => return Err(StoreError::MediaNotFound(media_id.clone())),
                    Some(item) if item.link.is_none() => {
                        return Err(StoreError::NotLinked(media_id.clone()));
                    }
                    Some(_) => {}
                }
                let snapshot = Snapshot::Primary {
                    primary_media_id: self.asset.primary_media_id.clone(),
                    flags: self
                        .items
                        .iter()
                        .map(|i| (i.id().to_string(), i.is_primary()))
                        .collect(),
                };
                self.asset.primary_media_id = Some(media_id.clone());
                for item in &mut self.items {
                    let is_primary = item.media.id == *media_id;
                    if let Some(link) = item.link.as_mut() {
                        link.is_primary = is_primary;
                    }
                }
                snapshot
            }
            Mutation::DeleteMedia { media_id } => {
                let index = self
                    .items
                    .iter()
                    .position(|i| i.id() == media_id)
                    .ok_or_else(|| StoreError::MediaNotFound(media_id.clone()))?;
                let item = self.items.remove(index);
                let was_primary = self.asset.primary_media_id.as_deref() == Some(media_id);
                if was_primary {
                    self.asset.primary_media_id = None;
                }
                Snapshot::RemovedMedia {
                    index,
                    item: Box::new(item),
                    was_primary,
                }
            }
            Mutation::DeleteAsset => {
                self.deleted = true;
                Snapshot::RemovedAsset {
                    asset: Box::new(self.asset.clone()),
                    items: std::mem::take(&mut self.items),
                }
            }
        };

        self.resort();
        Ok(snapshot)
    }

    /// Reverts a snapshot taken by [`apply`](Self::apply). Items that have
    /// disappeared in the meantime are skipped.
    pub fn restore(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::AssetModeration {
                status,
                admin_reviewed,
            } => {
                self.asset.moderation_status = status;
                self.asset.admin_reviewed = admin_reviewed;
            }
            Snapshot::AssetPreference(status) => self.asset.preference_status = status,
            Snapshot::MediaModeration { media_id, status } => {
                if let Ok(item) = self.item_mut(&media_id) {
                    item.media.moderation_status = status;
                }
            }
            Snapshot::MediaPreference { media_id, status } => {
                if let Ok(item) = self.item_mut(&media_id) {
                    item.media.preference_status = status;
                }
            }
            Snapshot::LinkStatus { media_id, status } => {
                if let Ok(item) = self.item_mut(&media_id)
                    && let Some(link) = item.link.as_mut()
                {
                    link.status = status;
                }
            }
            Snapshot::Primary {
                primary_media_id,
                flags,
            } => {
                // The previous primary may have been deleted while this
                // change was in flight.
                self.asset.primary_media_id = primary_media_id.filter(|id| self.contains(id));
                for (media_id, was_primary) in flags {
                    if let Ok(item) = self.item_mut(&media_id)
                        && let Some(link) = item.link.as_mut()
                    {
                        link.is_primary = was_primary;
                    }
                }
            }
            Snapshot::RemovedMedia {
                index,
                item,
                was_primary,
            } => {
                if !self.contains(item.id()) {
                    if was_primary && self.asset.primary_media_id.is_none() {
                        self.asset.primary_media_id = Some(item.media.id.clone());
                    }
                    let index = index.min(self.items.len());
                    self.items.insert(index, *item);
                }
            }
            Snapshot::RemovedAsset { asset, items } => {
                self.asset = *asset;
                self.items = items;
                self.deleted = false;
            }
        }
        self.resort();
    }
}
