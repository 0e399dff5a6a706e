use crate::{
    config::HealthStrategy,
    counters::{ProcessedCounters, ProcessedSnapshot},
    handler::UploadHandler,
    validation::UploadRequest,
};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use std::{io::Cursor, path::Path, time::Instant};

pub const API_VERSION: u32 = 1;

const SYNTHETIC_PROBE_FILENAME: &str = "health_probe.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub uptime: f64,
    pub processed: ProcessedSnapshot,
    pub health: Health,
    pub api_version: u32,
}

/// Known-good image classified by the self-test.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    filename: String,
    image: Bytes,
}

impl HealthProbe {
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let image = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| SYNTHETIC_PROBE_FILENAME.to_string());
        Ok(Self {
            filename,
            image: Bytes::from(image),
        })
    }

    /// A small gradient PNG, used when no probe image is configured.
    pub fn synthetic() -> Result<Self, image::ImageError> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut cursor, ImageFormat::Png)?;
        Ok(Self {
            filename: SYNTHETIC_PROBE_FILENAME.to_string(),
            image: Bytes::from(cursor.into_inner()),
        })
    }

    fn upload(&self) -> UploadRequest {
        UploadRequest {
            filename: self.filename.clone(),
            content: self.image.clone(),
            content_type: None,
        }
    }
}

pub struct StatusReporter {
    started: Instant,
    strategy: HealthStrategy,
    probe: HealthProbe,
}

impl StatusReporter {
    /// `started` is the instant uptime counts from, normally taken first
    /// thing in `main`.
    pub fn new(strategy: HealthStrategy, probe: HealthProbe, started: Instant) -> Self {
        Self {
            started,
            strategy,
            probe,
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 100.0).round() / 100.0
    }

    /// Builds the status report. Never changes `counters`.
    pub async fn snapshot(
        &self,
        handler: &UploadHandler,
        counters: &ProcessedCounters,
    ) -> StatusSnapshot {
        let health = match self.strategy {
            HealthStrategy::SelfTest => self.self_test(handler).await,
            HealthStrategy::FailureFlag => {
                if counters.snapshot().fail == 0 {
                    Health::Ok
                } else {
                    Health::Error
                }
            }
        };

        StatusSnapshot {
            uptime: self.uptime_seconds(),
            processed: counters.snapshot(),
            health,
            api_version: API_VERSION,
        }
    }

    async fn self_test(&self, handler: &UploadHandler) -> Health {
        // The probe is tallied on its own counters so it never shows up in
        // the public numbers. Its filename is ours, not the client's, so the
        // extension allow-list does not apply.
        let scratch = ProcessedCounters::new();
        match handler
            .without_extension_filter()
            .handle(Some(self.probe.upload()), &scratch).await {
            Ok(_) => Health::Ok,
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                Health::Error
            }
        }
    }
}
