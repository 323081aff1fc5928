// ── Confirmed mutations ──
//
// Create, update, chapter and delete operations. The listing only changes
// after the server confirms; a background load then re-syncs the page so
// server-side ordering and counts win eventually.

use std::sync::Arc;

use tracing::{info, warn};

use toonsync_api::{Webtoon, WebtoonPatch, WebtoonPayload};

use super::{LoadRequest, ListingState, SyncEngine, lock};
use crate::error::{CoreError, NO_FEATURE_MESSAGE, SESSION_EXPIRED_MESSAGE, SIGN_IN_MESSAGE};
use crate::model::OwnerId;
use crate::store::CachePatch;
use crate::store::merge::{prepend, remove_by_id, replace_by_id};

const SIGN_IN_NOTICE: &str = "Sign in to manage your webtoons.";
const NO_FEATURE_NOTICE: &str = "You do not have the rights required to manage webtoons.";

const CREATED: &str = "Webtoon added.";
const CREATE_FAILED: &str = "Adding the webtoon failed. Please try again.";
const UPDATED: &str = "Webtoon updated.";
const UPDATE_FAILED: &str = "Updating the webtoon failed. Please try again.";
const DELETED: &str = "Webtoon deleted.";
const DELETE_FAILED: &str = "Deleting the webtoon failed.";
const CHAPTER_FAILED: &str = "Could not update the chapter.";

/// Chapter after applying `delta`, never below 1.
fn next_chapter(chapter: u32, delta: i32) -> u32 {
    chapter.saturating_add_signed(delta).max(1)
}

impl SyncEngine {
    /// Add a webtoon and put it at the top of page 1.
    pub async fn create(&self, payload: &WebtoonPayload) -> Result<Webtoon, CoreError> {
        let owner = self.ensure_authorized()?;
        let cancel = self.owner_token();

        let created = self
            .inner
            .api
            .create_webtoon(payload, &cancel)
            .await
            .map_err(|e| self.mutation_failed(e.into(), CREATE_FAILED))?;
        info!(id = created.id, title = %created.title, "webtoon created");

        self.commit(owner, true, |s| {
            s.items = Arc::new(prepend(&s.items, created.clone()));
            s.total_count = s.total_count.saturating_add(1);
            s.current_page = 1;
        });
        self.inner.bus.success(CREATED);
        self.spawn_load(LoadRequest::background(1));
        Ok(created)
    }

    /// Replace every editable field of webtoon `id`.
    pub async fn update(&self, id: u64, payload: &WebtoonPayload) -> Result<Webtoon, CoreError> {
        let owner = self.ensure_authorized()?;
        let cancel = self.owner_token();

        let updated = self
            .inner
            .api
            .update_webtoon(id, payload, &cancel)
            .await
            .map_err(|e| self.mutation_failed(e.into(), UPDATE_FAILED))?;
        info!(id, "webtoon updated");

        self.commit(owner, false, |s| {
            s.items = Arc::new(replace_by_id(&s.items, &updated));
        });
        self.inner.bus.success(UPDATED);
        let page = self.inner.state.borrow().current_page;
        self.spawn_load(LoadRequest::background(page));
        Ok(updated)
    }

    /// Move the chapter of webtoon `id` by `delta`, clamped to 1.
    ///
    /// Sends only the chapter field. A change that clamps to the current
    /// chapter sends nothing and returns the webtoon as is. No re-sync.
    pub async fn adjust_chapter(&self, id: u64, delta: i32) -> Result<Webtoon, CoreError> {
        let owner = self.ensure_authorized()?;
        let cancel = self.owner_token();

        let listed = self
            .inner
            .state
            .borrow()
            .items
            .iter()
            .find(|w| w.id == id)
            .cloned();
        let current = match listed {
            Some(webtoon) => webtoon,
            None => self
                .inner
                .api
                .get_webtoon(id, &cancel)
                .await
                .map_err(|e| self.mutation_failed(e.into(), CHAPTER_FAILED))?,
        };

        let chapter = next_chapter(current.chapter, delta);
        if chapter == current.chapter {
            return Ok(current);
        }

        let updated = self
            .inner
            .api
            .patch_webtoon(id, &WebtoonPatch::chapter(chapter), &cancel)
            .await
            .map_err(|e| self.mutation_failed(e.into(), CHAPTER_FAILED))?;
        info!(id, chapter, "chapter updated");

        self.commit(owner, false, |s| {
            s.items = Arc::new(replace_by_id(&s.items, &updated));
        });
        Ok(updated)
    }

    /// Delete webtoon `id`. Deleting the last item of a page past the first
    /// steps back one page before re-syncing.
    pub async fn delete(&self, id: u64) -> Result<(), CoreError> {
        let owner = self.ensure_authorized()?;
        let cancel = self.owner_token();

        self.inner
            .api
            .delete_webtoon(id, &cancel)
            .await
            .map_err(|e| self.mutation_failed(e.into(), DELETE_FAILED))?;
        info!(id, "webtoon deleted");

        let mut resync_page = None;
        self.commit(owner, true, |s| {
            let remaining = remove_by_id(&s.items, &id);
            s.total_count = s.total_count.saturating_sub(1);
            if remaining.is_empty() {
                s.has_more = false;
                if s.current_page > 1 {
                    s.current_page -= 1;
                }
            }
            s.items = Arc::new(remaining);
            resync_page = Some(s.current_page);
        });
        self.inner.bus.info(DELETED);

        if let Some(page) = resync_page {
            self.spawn_load(LoadRequest::background(page));
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────

    /// Owner allowed to mutate. Otherwise records why on the listing and
    /// posts a warning notice.
    fn ensure_authorized(&self) -> Result<OwnerId, CoreError> {
        let session = self.inner.api.session();
        let owner = session.owner_id().filter(|_| session.is_authenticated());

        let Some(owner) = owner else {
            self.inner.state.send_modify(|s| {
                s.error = Some(SIGN_IN_MESSAGE.to_owned());
                s.auth_required = true;
            });
            self.inner.bus.warning(SIGN_IN_NOTICE);
            return Err(CoreError::NotAuthenticated);
        };

        if !session.has_feature(&self.inner.config.management_feature) {
            self.inner.state.send_modify(|s| {
                s.error = Some(NO_FEATURE_MESSAGE.to_owned());
            });
            self.inner.bus.warning(NO_FEATURE_NOTICE);
            return Err(CoreError::PermissionDenied {
                message: NO_FEATURE_MESSAGE.to_owned(),
            });
        }

        self.sync_owner();
        Ok(owner)
    }

    /// Apply a confirmed change to the listing and write it through to the
    /// cache. Skipped when the owner changed while the request was out.
    fn commit(
        &self,
        owner: OwnerId,
        moves_page: bool,
        edit: impl FnOnce(&mut ListingState),
    ) -> bool {
        let _slots = lock(&self.inner.queries);
        let mut patch = None;
        self.inner.state.send_if_modified(|s| {
            if s.owner != Some(owner) {
                return false;
            }
            edit(s);
            let mut update = CachePatch::new()
                .items(Arc::clone(&s.items))
                .total_count(s.total_count)
                .has_more(s.has_more);
            if moves_page {
                update = update.current_page(s.current_page);
            }
            patch = Some(update);
            true
        });

        match patch {
            Some(update) => {
                self.inner.cache.put(owner, update);
                true
            }
            None => false,
        }
    }

    fn mutation_failed(&self, err: CoreError, fallback: &str) -> CoreError {
        if err.is_cancelled() {
            return err;
        }

        let message = match &err {
            CoreError::ValidationFailed { message } => message.clone(),
            CoreError::SessionExpired => SESSION_EXPIRED_MESSAGE.to_owned(),
            CoreError::NetworkUnreachable { .. } => err.user_message(),
            _ => fallback.to_owned(),
        };
        warn!(error = %err, "mutation failed");

        let auth_required = err.requires_reauth();
        self.inner.state.send_modify(|s| {
            s.error = Some(message.clone());
            s.auth_required |= auth_required;
        });
        self.publish_failure(message, auth_required);
        err
    }
}
