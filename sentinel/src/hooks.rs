//! External collaborator interfaces. Everything the pipeline acts through
//! lives behind these traits; the engine adapter supplies real
//! implementations, the `Noop*` ones run the service with moderation
//! disabled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use image::RgbImage;
use uuid::Uuid;

use common::{Analysis, Block, LogicImage};

/// Stable player identity as the engine reports it.
pub type PlayerUuid = String;

/// Device kinds the placement history distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Display,
    Canvas,
    Processor,
}

/// Latest recorded placement at a coordinate.
#[derive(Debug, Clone)]
pub struct Placement {
    pub author: PlayerUuid,
    pub kind: DeviceKind,
}

/// Who last placed a device at a coordinate.
pub trait PlacementHistory: Send + Sync {
    fn latest_place(&self, x: i32, y: i32) -> Option<Placement>;
}

/// Turns a cluster snapshot into a bitmap. Pure, possibly slow.
pub trait ClusterRenderer: Send + Sync {
    fn render(&self, blocks: &[Block<LogicImage>]) -> RgbImage;
}

/// Unsafe-content classifier. `Err` carries the failure message.
pub trait ImageAnalysis: Send + Sync {
    fn is_unsafe<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<Analysis>>;
}

/// Durable user record resolved from a player uuid.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub uuid: PlayerUuid,
}

pub trait UserDirectory: Send + Sync {
    fn find_by_uuid<'a>(&'a self, uuid: &'a str) -> BoxFuture<'a, Option<User>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunishmentKind {
    Ban,
}

#[derive(Debug, Clone)]
pub struct PunishmentRecord {
    pub id: Uuid,
    pub target: u64,
    pub kind: PunishmentKind,
    pub reason: String,
    pub duration: Duration,
}

pub trait PunishmentIssuer: Send + Sync {
    fn punish<'a>(
        &'a self,
        issuer: &'a str,
        target: u64,
        reason: &'a str,
        kind: PunishmentKind,
        duration: Duration,
    ) -> BoxFuture<'a, Result<PunishmentRecord>>;
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub description: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Outbound moderation alerts.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, message: AlertMessage) -> BoxFuture<'a, Result<()>>;
}

/// Handle onto the game world. Implementations must marshal both calls onto
/// the engine's single execution context.
pub trait WorldHandle: Send + Sync {
    fn remove_block<'a>(&'a self, x: i32, y: i32) -> BoxFuture<'a, ()>;

    /// Draw a transient on-screen label for one observer.
    fn draw_label<'a>(
        &'a self,
        observer: &'a str,
        text: String,
        color: [u8; 3],
        x: f32,
        y: f32,
    ) -> BoxFuture<'a, ()>;
}

/// Every collaborator the pipeline acts through, injected once at startup.
#[derive(Clone)]
pub struct ModerationContext {
    pub renderer: Arc<dyn ClusterRenderer>,
    pub analysis: Arc<dyn ImageAnalysis>,
    pub history: Arc<dyn PlacementHistory>,
    pub users: Arc<dyn UserDirectory>,
    pub punishments: Arc<dyn PunishmentIssuer>,
    pub notifier: Arc<dyn Notifier>,
    pub world: Arc<dyn WorldHandle>,
    /// Identity punishments are issued under.
    pub issuer: String,
}

impl ModerationContext {
    /// Moderation-disabled wiring: the classifier rates everything safe and
    /// every side effect is a no-op.
    pub fn disabled(issuer: &str) -> Self {
        Self {
            renderer: Arc::new(NoopRenderer),
            analysis: Arc::new(NoopAnalysis),
            history: Arc::new(NoopHistory),
            users: Arc::new(NoopUsers),
            punishments: Arc::new(NoopPunishments),
            notifier: Arc::new(NoopNotifier),
            world: Arc::new(NoopWorld),
            issuer: issuer.to_string(),
        }
    }
}

/// Classifier used when moderation is disabled: every input is safe.
pub struct NoopAnalysis;

impl ImageAnalysis for NoopAnalysis {
    fn is_unsafe<'a>(&'a self, _image: &'a RgbImage) -> BoxFuture<'a, Result<Analysis>> {
        Box::pin(async { Ok(Analysis::safe()) })
    }
}

pub struct NoopRenderer;

impl ClusterRenderer for NoopRenderer {
    fn render(&self, _blocks: &[Block<LogicImage>]) -> RgbImage {
        RgbImage::new(1, 1)
    }
}

pub struct NoopHistory;

impl PlacementHistory for NoopHistory {
    fn latest_place(&self, _x: i32, _y: i32) -> Option<Placement> {
        None
    }
}

pub struct NoopUsers;

impl UserDirectory for NoopUsers {
    fn find_by_uuid<'a>(&'a self, _uuid: &'a str) -> BoxFuture<'a, Option<User>> {
        Box::pin(async { None })
    }
}

pub struct NoopPunishments;

impl PunishmentIssuer for NoopPunishments {
    fn punish<'a>(
        &'a self,
        _issuer: &'a str,
        target: u64,
        reason: &'a str,
        kind: PunishmentKind,
        duration: Duration,
    ) -> BoxFuture<'a, Result<PunishmentRecord>> {
        let record = PunishmentRecord {
            id: Uuid::new_v4(),
            target,
            kind,
            reason: reason.to_string(),
            duration,
        };
        Box::pin(async move { Ok(record) })
    }
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send<'a>(&'a self, _message: AlertMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

pub struct NoopWorld;

impl WorldHandle for NoopWorld {
    fn remove_block<'a>(&'a self, _x: i32, _y: i32) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn draw_label<'a>(
        &'a self,
        _observer: &'a str,
        _text: String,
        _color: [u8; 3],
        _x: f32,
        _y: f32,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Rating;

    #[tokio::test]
    async fn noop_analysis_always_passes() {
        let image = RgbImage::new(4, 4);
        let analysis = NoopAnalysis.is_unsafe(&image).await.unwrap();
        assert_eq!(analysis.rating, Rating::None);
        assert!(analysis.details.is_empty());
    }
}
