// Webtoon collection endpoints.
//
// All paths are relative to the API base and keep the server's trailing
// slash. Every call takes the caller's cancellation token so the engine can
// supersede it.

use tokio_util::sync::CancellationToken;

use crate::client::{ApiClient, ApiRequest};
use crate::error::Error;
use crate::models::{ListQuery, Page, Webtoon, WebtoonPatch, WebtoonPayload};

fn item_path(id: u64) -> String {
    format!("webtoons/{id}/")
}

impl ApiClient {
    /// `GET webtoons/?page=&search=&ordering=`
    pub async fn list_webtoons(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<Page<Webtoon>, Error> {
        let req = ApiRequest::get("webtoons/").with_query(query.to_params());
        self.execute(&req, cancel).await
    }

    pub async fn get_webtoon(&self, id: u64, cancel: &CancellationToken) -> Result<Webtoon, Error> {
        self.execute(&ApiRequest::get(item_path(id)), cancel).await
    }

    pub async fn create_webtoon(
        &self,
        payload: &WebtoonPayload,
        cancel: &CancellationToken,
    ) -> Result<Webtoon, Error> {
        let req = ApiRequest::post("webtoons/").json(payload)?;
        self.execute(&req, cancel).await
    }

    /// Full update (`PUT`).
    pub async fn update_webtoon(
        &self,
        id: u64,
        payload: &WebtoonPayload,
        cancel: &CancellationToken,
    ) -> Result<Webtoon, Error> {
        let req = ApiRequest::put(item_path(id)).json(payload)?;
        self.execute(&req, cancel).await
    }

    /// Sparse update (`PATCH`); only the fields set on `patch` are sent.
    pub async fn patch_webtoon(
        &self,
        id: u64,
        patch: &WebtoonPatch,
        cancel: &CancellationToken,
    ) -> Result<Webtoon, Error> {
        let req = ApiRequest::patch(item_path(id)).json(patch)?;
        self.execute(&req, cancel).await
    }

    pub async fn delete_webtoon(&self, id: u64, cancel: &CancellationToken) -> Result<(), Error> {
        self.execute_empty(&ApiRequest::delete(item_path(id)), cancel)
            .await
    }
}
