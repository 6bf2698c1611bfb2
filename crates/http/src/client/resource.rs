//! Generic CRUD access to one REST collection

use super::{ApiClient, ClientError, Page, QueryParams};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::marker::PhantomData;

/// A REST collection such as `/animals/` whose items decode as `T`.
///
/// Every call goes through the authenticated gateway of the owning client.
pub struct Resource<T> {
    client: ApiClient,
    path: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _item: PhantomData,
        }
    }
}

impl ApiClient {
    /// Handle on the collection at `path`
    pub fn resource<T: DeserializeOwned>(&self, path: &str) -> Resource<T> {
        Resource::new(self.clone(), path)
    }
}

impl<T: DeserializeOwned> Resource<T> {
    pub fn new(client: ApiClient, path: &str) -> Self {
        let trimmed = path.trim_matches('/');
        Self {
            client,
            path: format!("/{trimmed}/"),
            _item: PhantomData,
        }
    }

    /// Collection path, always with leading and trailing slashes
    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, id: impl Display) -> String {
        format!("{}{id}/", self.path)
    }

    /// List one page of the collection
    pub async fn list(&self, params: &QueryParams) -> Result<Page<T>, ClientError> {
        let mut request = self.client.get(&self.path);
        if !params.is_empty() {
            request = request.query(params);
        }
        self.client.execute_enveloped(request).await
    }

    pub async fn get(&self, id: impl Display) -> Result<T, ClientError> {
        let request = self.client.get(&self.item_path(id));
        self.client.execute_enveloped(request).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<T, ClientError> {
        let request = self.client.post(&self.path, body);
        self.client.execute_enveloped(request).await
    }

    /// Partial update (PATCH)
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.client.patch(&self.item_path(id), body);
        self.client.execute_enveloped(request).await
    }

    /// Full replacement (PUT)
    pub async fn replace<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.client.put(&self.item_path(id), body);
        self.client.execute_enveloped(request).await
    }

    pub async fn delete(&self, id: impl Display) -> Result<(), ClientError> {
        let request = self.client.delete(&self.item_path(id));
        self.client.execute_empty(request).await
    }
}
