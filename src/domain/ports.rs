use crate::domain::model::{Document, Identifier};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Resolver: Send + Sync {
    /// DTID → current hosting location, one round trip bounded by `timeout`.
    async fn resolve(&self, identifier: &str, timeout: Duration) -> Result<String>;
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, hosting_location: &str, timeout: Duration) -> Result<Document>;
}

pub trait TwinClient: Resolver + DocumentFetcher {}

impl<T: Resolver + DocumentFetcher> TwinClient for T {}

pub trait ConfigProvider: Send + Sync {
    fn identifiers(&self) -> &[Identifier];
    fn resolve_timeout(&self) -> Duration;
    fn fetch_timeout(&self) -> Duration;
    fn samples(&self) -> u32;
}
