//! Maps a classification verdict to its moderation action: nothing, an alert
//! to moderators, or destruction plus punishment.

use std::io::Cursor;

use image::RgbImage;

use common::content::ClusterContent;
use common::{Analysis, Rating};

use crate::config::Config;
use crate::hooks::{AlertMessage, Attachment, ModerationContext, PunishmentKind};
use crate::monitor::Pipeline;
use crate::queue::QueueEntry;

pub async fn apply<T: ClusterContent>(
    pipeline: &Pipeline<T>,
    ctx: &ModerationContext,
    config: &Config,
    entry: &QueueEntry<T>,
    image: &RgbImage,
    analysis: Analysis,
) {
    let cluster = &entry.cluster;
    match analysis.rating {
        Rating::None => {
            tracing::debug!("Cluster ({}, {}) is safe", cluster.x(), cluster.y());
        }
        Rating::Warning => {
            tracing::debug!("Cluster ({}, {}) is possibly unsafe", cluster.x(), cluster.y());
            let content = format!(
                "**Possible NSFW image detected**\nLocated at {}, {}\n{}",
                cluster.x(),
                cluster.y(),
                format_details(&analysis)
            );
            send_alert(ctx, content, image).await;
        }
        Rating::Trigger => {
            tracing::debug!("Cluster ({}, {}) is unsafe. Destroying.", cluster.x(), cluster.y());
            destroy_cluster(pipeline, ctx, entry).await;

            // Content removal never waits on attribution; a missing durable
            // user only skips the punishment.
            let Some(user) = ctx.users.find_by_uuid(&entry.author).await else {
                tracing::warn!("Could not find player with UUID {}", entry.author);
                return;
            };
            match ctx
                .punishments
                .punish(
                    &ctx.issuer,
                    user.id,
                    "Placing NSFW image",
                    PunishmentKind::Ban,
                    config.punishment_duration,
                )
                .await
            {
                Err(e) => tracing::error!("Failed to punish {}: {e:#}", entry.author),
                Ok(punishment) => {
                    let content = format!(
                        "**NSFW image detected**\nRelated to punishment {}\n{}",
                        punishment.id,
                        format_details(&analysis)
                    );
                    send_alert(ctx, content, image).await;
                }
            }
        }
    }
}

/// Remove every snapshot block, and the companion devices bound to it, from
/// the world; mirror the removals into the live tracker.
async fn destroy_cluster<T: ClusterContent>(
    pipeline: &Pipeline<T>,
    ctx: &ModerationContext,
    entry: &QueueEntry<T>,
) {
    for block in entry.cluster.blocks() {
        ctx.world.remove_block(block.x, block.y).await;
        for (px, py) in block.data.linked_devices() {
            ctx.world.remove_block(px, py).await;
        }
        pipeline.remove_element(block.x, block.y);
    }
}

fn format_details(analysis: &Analysis) -> String {
    let mut out = String::new();
    for (category, score) in &analysis.details {
        out.push_str(&format!("- {}: {:.1} %\n", category.name(), score * 100.0));
    }
    out
}

async fn send_alert(ctx: &ModerationContext, content: String, image: &RgbImage) {
    let mut attachments = Vec::new();
    match encode_jpeg(image) {
        Ok(bytes) => attachments.push(Attachment {
            filename: "SPOILER_image.jpg".to_string(),
            description: "NSFW image".to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes,
        }),
        Err(e) => tracing::error!("Failed to encode alert attachment: {e:#}"),
    }
    if let Err(e) = ctx.notifier.send(AlertMessage { content, attachments }).await {
        tracing::error!("Failed to send moderation alert: {e:#}");
    }
}

fn encode_jpeg(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Category;
    use std::collections::HashMap;

    #[test]
    fn details_format_as_percentages() {
        let analysis = Analysis {
            rating: Rating::Warning,
            details: HashMap::from([(Category::Gore, 0.4f32)]),
        };
        assert_eq!(format_details(&analysis), "- gore: 40.0 %\n");
    }

    #[test]
    fn jpeg_encoding_produces_bytes() {
        let image = RgbImage::new(8, 8);
        let bytes = encode_jpeg(&image).unwrap();
        assert!(!bytes.is_empty());
    }
}
