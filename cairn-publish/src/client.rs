//! Seams between the fan-out coordinator and a cloud provider.
//!
//! A factory turns a region name into a client scoped to that region; the
//! client makes one image publicly launchable. Both calls are blocking and run
//! on tokio's blocking pool.

use crate::error::PublishError;

/// Builds region-scoped clients. Credentials are held by the factory.
pub trait RegionClientFactory: Send + Sync + 'static {
    type Client: RegionClient;

    fn new_region_client(&self, region: &str) -> Result<Self::Client, PublishError>;
}

/// One region's publish endpoint.
pub trait RegionClient: Send + 'static {
    fn publish(&self, image_id: &str) -> Result<(), PublishError>;
}
