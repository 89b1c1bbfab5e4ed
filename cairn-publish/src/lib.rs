//! Publication fan-out for cairn: makes a release's cloud images public in
//! every region the manifest lists.

pub mod aws_cli;
pub mod client;
mod error;
pub mod fanout;

pub use aws_cli::{AwsCliClient, AwsCliFactory};
pub use client::{RegionClient, RegionClientFactory};
pub use error::PublishError;
pub use fanout::{
    classify, plan_units, publish, publish_blocking, FailureStage, FanoutConfig, PublishOutcome,
    PublishReport, PublishUnit, UnitReport, UnitStatus,
};
