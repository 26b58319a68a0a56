//! # Image Skill
//!
//! Fuses zero or more attached images into one textual description that later
//! stages treat as plain context. A backend failure here is terminal for the
//! request, so it is reported as a value rather than an error.

use crate::completion::{image_marker, CompletionClient, ImagePayload};
use crate::skills::prompts::{self, render};

/// Outcome of image fusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAnalysis {
    /// Description of the images; empty when none were attached
    Described(String),
    /// The vision backend failed; carries the original error detail
    Failed(String),
}

impl ImageAnalysis {
    pub fn is_failed(&self) -> bool {
        matches!(self, ImageAnalysis::Failed(_))
    }
}

pub struct ImageSkill;

impl ImageSkill {
    /// Describe `images` with at most one backend call.
    pub async fn run(client: &dyn CompletionClient, images: &[ImagePayload]) -> ImageAnalysis {
        let result = match images {
            [] => return ImageAnalysis::Described(String::new()),
            [single] => client.describe_image(prompts::IMAGE_SINGLE.trim(), single).await,
            many => {
                let prompt = multi_image_prompt(many.len());
                client.describe_images(&prompt, many).await
            }
        };

        match result {
            Ok(description) => {
                tracing::debug!(
                    images = images.len(),
                    chars = description.len(),
                    "Image description ready"
                );
                ImageAnalysis::Described(description.trim().to_string())
            }
            Err(e) => {
                tracing::warn!(images = images.len(), "Image analysis failed: {}", e);
                ImageAnalysis::Failed(e.to_string())
            }
        }
    }
}

fn multi_image_prompt(count: usize) -> String {
    let markers = (0..count)
        .map(image_marker)
        .collect::<Vec<_>>()
        .join(", ");
    render(
        prompts::IMAGE_MULTI,
        &[("count", &count.to_string()), ("markers", &markers)],
    )
}
