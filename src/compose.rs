use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tracing::{error, info, warn};

use crate::caption::{self, CaptionStyle};
use crate::config::{PlaceholderStyle, Settings};
use crate::decode::decode_all;
use crate::gemini::{GeneratedImage, ImageGenerator, RemoteError};
use crate::layout::{self, CompositeError, CANVAS_SIZE};
use crate::profile::{self, Mode};

pub const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Remote,
    Describe,
    Composite,
    Placeholder,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Remote => "remote",
            Tier::Describe => "describe",
            Tier::Composite => "composite",
            Tier::Placeholder => "placeholder",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOutcome {
    pub tier: Tier,
    pub image_data: String,
    pub mime_type: String,
}

impl ComposeOutcome {
    fn png(tier: Tier, image_data: String) -> Self {
        Self { tier, image_data, mime_type: PNG_MIME.to_string() }
    }

    fn remote(tier: Tier, generated: GeneratedImage) -> Self {
        Self { tier, image_data: generated.data, mime_type: generated.mime_type }
    }
}

pub struct Composer {
    generator: Arc<dyn ImageGenerator>,
    remote_timeout: Duration,
    describe_fallback: bool,
    placeholder_style: PlaceholderStyle,
}

impl Composer {
    pub fn new(generator: Arc<dyn ImageGenerator>, settings: &Settings) -> Self {
        Self {
            generator,
            remote_timeout: settings.remote_timeout,
            describe_fallback: settings.describe_fallback,
            placeholder_style: settings.placeholder_style,
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<GeneratedImage, RemoteError>
    where
        F: Future<Output = Result<GeneratedImage, RemoteError>>,
    {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .unwrap_or(Err(RemoteError::Timeout(self.remote_timeout)))
    }

    /// Runs the fallback chain. Never fails: the placeholder tier always has bytes.
    pub async fn compose(&self, images: Vec<String>, mode_name: &str) -> ComposeOutcome {
        let mode = Mode::parse(mode_name);
        if mode.is_none() {
            warn!("⚠️ Unrecognized mode '{}', using tryOn defaults with collage layout", mode_name);
        }

        let mut caption = match self.bounded(self.generator.generate(&images, mode, mode_name)).await {
            Ok(generated) => {
                info!("✅ Generated image from remote model");
                if let Some(text) = &generated.text {
                    info!("📝 Remote model also said: {}", text);
                }
                return ComposeOutcome::remote(Tier::Remote, generated);
            }
            Err(e) => {
                warn!("❌ Remote generation failed: {}", e);
                e.caption()
            }
        };

        if self.describe_fallback && self.generator.has_credential() {
            match self.bounded(self.generator.describe(&images, mode, mode_name)).await {
                Ok(generated) => {
                    info!("✅ Description call returned an image");
                    return ComposeOutcome::remote(Tier::Describe, generated);
                }
                Err(e) => {
                    info!("ℹ️ No image from description call ({}), creating composite image", e);
                    caption = e.caption().or(caption);
                }
            }
        }

        let card_text = caption.clone();
        let rendered = tokio::task::spawn_blocking(move || render_composite(&images, mode, caption.as_deref()))
            .await
            .map_err(|e| CompositeError::Worker(e.to_string()))
            .and_then(|r| r);
        match rendered {
            Ok(Some(image_data)) => {
                info!("🎨 Local composite rendered");
                return ComposeOutcome::png(Tier::Composite, image_data);
            }
            Ok(None) => warn!("⚠️ No images could be decoded, using placeholder"),
            Err(e) => error!("❌ Composite image creation error: {}", e),
        }

        self.placeholder(mode, mode_name, card_text).await
    }

    async fn placeholder(&self, mode: Option<Mode>, mode_name: &str, text: Option<String>) -> ComposeOutcome {
        if self.placeholder_style == PlaceholderStyle::Card {
            let name = mode_name.to_string();
            let card = tokio::task::spawn_blocking(move || render_placeholder_card(mode, &name, text.as_deref()))
                .await
                .map_err(|e| CompositeError::Worker(e.to_string()))
                .and_then(|r| r);
            match card {
                Ok(image_data) => return ComposeOutcome::png(Tier::Placeholder, image_data),
                Err(e) => error!("❌ Placeholder card failed, using static bitmap: {}", e),
            }
        }
        ComposeOutcome::png(Tier::Placeholder, profile::placeholder(mode).to_string())
    }
}

pub fn render_composite(images: &[String], mode: Option<Mode>, caption_text: Option<&str>) -> Result<Option<String>, CompositeError> {
    let decoded = decode_all(images);
    if decoded.is_empty() {
        return Ok(None);
    }
    let mut canvas = layout::compose(mode, &decoded, CANVAS_SIZE);
    caption::overlay(&mut canvas, caption_text, CaptionStyle::Banner);
    let png = layout::encode_png(&canvas)?;
    Ok(Some(base64::engine::general_purpose::STANDARD.encode(png)))
}

fn render_placeholder_card(mode: Option<Mode>, mode_name: &str, text: Option<&str>) -> Result<String, CompositeError> {
    let canvas = caption::render_card(mode_name, profile::profile(mode).gradient, text, CANVAS_SIZE);
    let png = layout::encode_png(&canvas)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}
