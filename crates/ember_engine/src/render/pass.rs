//! Render passes, render targets, and attachments
//!
//! A pass owns one render target per swapchain image (or a single target
//! for off-screen passes). Each target is a set of attachments: either
//! swapchain images fetched from the backend or textures owned by a view
//! (e.g. an off-screen picking buffer).

use crate::foundation::math::Vec4;
use crate::render::backend::{RenderTargetId, TextureInternalId};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which buffers a pass clears when it begins
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        /// Clear the colour buffer
        const COLOUR = 0b001;
        /// Clear the depth buffer
        const DEPTH = 0b010;
        /// Clear the stencil buffer
        const STENCIL = 0b100;
    }
}

/// Attachment role within a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// Colour output
    Colour,
    /// Depth/stencil output
    Depth,
}

/// Where an attachment's texture comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentSource {
    /// Re-fetched from the window swapchain on every regeneration
    Window,
    /// Owned by the view, which recreates it on resize
    View,
}

/// Configuration for a single attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// Attachment role
    pub kind: AttachmentKind,
    /// Texture source
    pub source: AttachmentSource,
}

/// Configuration for a render target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderTargetConfig {
    /// Attachments composing the target, in binding order
    pub attachments: Vec<AttachmentConfig>,
}

/// Configuration for a render pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPassConfig {
    /// Pass name, unique within a view
    pub name: String,
    /// Normalized render area (x, y, width, height)
    pub render_area: [f32; 4],
    /// Clear colour applied when `COLOUR` is in `clear_flags`
    pub clear_colour: [f32; 4],
    /// Buffers cleared at pass begin (bit union of [`ClearFlags`])
    pub clear_flags: u8,
    /// One target per swapchain image when any attachment is
    /// window-sourced; a single target otherwise
    pub target: RenderTargetConfig,
}

/// A live attachment: its configuration plus the backend texture bound to it
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Attachment role
    pub kind: AttachmentKind,
    /// Texture source
    pub source: AttachmentSource,
    /// Backend texture currently bound; `None` until first regeneration
    pub texture: Option<TextureInternalId>,
}

/// A live render target: attachments plus the backend framebuffer over them
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    /// Attachments in binding order
    pub attachments: Vec<Attachment>,
    /// Whether this target follows the window size on resize
    pub sync_to_window_size: bool,
    /// Backend framebuffer; recreated whenever attachments change
    pub internal: Option<RenderTargetId>,
}

/// A live render pass owned by a view
#[derive(Debug, Clone)]
pub struct RenderPass {
    /// Pass id, unique within the owning view
    pub id: u16,
    /// Pass name from configuration
    pub name: String,
    /// Normalized render area (x, y, width, height)
    pub render_area: Vec4,
    /// Clear colour
    pub clear_colour: Vec4,
    /// Buffers cleared at pass begin
    pub clear_flags: ClearFlags,
    /// Targets, one per swapchain image for window-synced passes
    pub targets: Vec<RenderTarget>,
}

impl RenderPass {
    /// Build a live pass from its configuration
    ///
    /// Targets start empty; attachments and framebuffers are filled in by
    /// the first regeneration. `target_count` is the swapchain image count
    /// for window-synced passes, 1 otherwise.
    pub fn from_config(id: u16, config: &RenderPassConfig, target_count: usize) -> Self {
        let sync_to_window_size = config
            .target
            .attachments
            .iter()
            .any(|a| a.source == AttachmentSource::Window);
        let targets = (0..target_count)
            .map(|_| RenderTarget {
                attachments: config
                    .target
                    .attachments
                    .iter()
                    .map(|a| Attachment {
                        kind: a.kind,
                        source: a.source,
                        texture: None,
                    })
                    .collect(),
                sync_to_window_size,
                internal: None,
            })
            .collect();

        Self {
            id,
            name: config.name.clone(),
            render_area: Vec4::new(
                config.render_area[0],
                config.render_area[1],
                config.render_area[2],
                config.render_area[3],
            ),
            clear_colour: Vec4::new(
                config.clear_colour[0],
                config.clear_colour[1],
                config.clear_colour[2],
                config.clear_colour[3],
            ),
            clear_flags: ClearFlags::from_bits_truncate(config.clear_flags),
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_config() -> RenderPassConfig {
        RenderPassConfig {
            name: "world".to_string(),
            render_area: [0.0, 0.0, 1280.0, 720.0],
            clear_colour: [0.0, 0.0, 0.2, 1.0],
            clear_flags: (ClearFlags::COLOUR | ClearFlags::DEPTH).bits(),
            target: RenderTargetConfig {
                attachments: vec![
                    AttachmentConfig {
                        kind: AttachmentKind::Colour,
                        source: AttachmentSource::Window,
                    },
                    AttachmentConfig {
                        kind: AttachmentKind::Depth,
                        source: AttachmentSource::Window,
                    },
                ],
            },
        }
    }

    #[test]
    fn test_pass_from_config_builds_one_target_per_image() {
        let pass = RenderPass::from_config(0, &pass_config(), 3);
        assert_eq!(pass.targets.len(), 3);
        assert!(pass.targets.iter().all(|t| t.sync_to_window_size));
        assert!(pass.clear_flags.contains(ClearFlags::COLOUR | ClearFlags::DEPTH));
        assert!(!pass.clear_flags.contains(ClearFlags::STENCIL));
    }

    #[test]
    fn test_view_sourced_target_does_not_sync_to_window() {
        let mut config = pass_config();
        for attachment in &mut config.target.attachments {
            attachment.source = AttachmentSource::View;
        }
        let pass = RenderPass::from_config(0, &config, 1);
        assert_eq!(pass.targets.len(), 1);
        assert!(!pass.targets[0].sync_to_window_size);
    }
}
