//! Adsmith Core Integration Tests
//!
//! The network clients are swapped for in-process fakes at the
//! `TextGenerator` / `BackgroundGenerator` seams.

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adsmith_core::{
    Error, Result,
    archive::{build_archive, captions_text, write_archive},
    background::{BackgroundGenerator, BackgroundRequest, ImageResponse},
    campaign::{Campaign, CampaignRequest, Progress},
    composite::encode_png,
    config::Config,
    llm::TextGenerator,
};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

struct Copywriter;

#[async_trait]
impl TextGenerator for Copywriter {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.contains("creative director") {
            Ok("Sure!\n\
                1. **A sunlit Scandinavian kitchen with oak shelves**\n\
                2. A misty mountain cabin porch at sunrise\n\
                3. A terracotta rooftop cafe in late afternoon"
                .to_string())
        } else {
            Ok("1. Mornings, upgraded. #Coffee #Ceramics\n\
                2. Hand-made for slow sips. #SlowLiving #Mug"
                .to_string())
        }
    }
}

struct Offline;

#[async_trait]
impl TextGenerator for Offline {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::TextApiKeyMissing)
    }
}

/// Renders flat backgrounds, failing on scripted call numbers
struct Painter {
    calls: AtomicUsize,
    flaky: Vec<usize>,
    out_of_credits_at: Option<usize>,
}

impl Painter {
    fn reliable() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            flaky: Vec::new(),
            out_of_credits_at: None,
        }
    }
}

#[async_trait]
impl BackgroundGenerator for Painter {
    async fn generate(&self, request: &BackgroundRequest) -> Result<ImageResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.out_of_credits_at == Some(call) {
            return Err(Error::CreditsExhausted("stable-diffusion-xl-1024-v1-0".to_string()));
        }
        if self.flaky.contains(&call) {
            return Err(Error::RateLimited(10));
        }
        let background = RgbaImage::from_pixel(128, 128, Rgba([30, 60, 90, 255]));
        Ok(ImageResponse::new(
            encode_png(&background)?,
            "fake-engine",
            request.seed,
            3,
        ))
    }
}

fn mug_request(variations: usize) -> CampaignRequest {
    let product = encode_png(&RgbaImage::from_pixel(20, 40, Rgba([200, 10, 10, 255]))).unwrap();
    let logo = encode_png(&RgbaImage::from_pixel(30, 10, Rgba([10, 200, 10, 255]))).unwrap();
    CampaignRequest::from_bytes(
        &product,
        &logo,
        "A hand-thrown ceramic coffee mug with a speckled glaze",
        variations,
    )
    .unwrap()
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut buf).unwrap();
    buf
}

#[tokio::test(start_paused = true)]
async fn test_full_campaign_to_archive() {
    let campaign = Campaign::new(Copywriter, Painter::reliable(), &Config::default());

    let started = tokio::time::Instant::now();
    let mut progress = Vec::new();
    let output = campaign
        .run(&mug_request(5), |p| progress.push(p))
        .await
        .unwrap();

    // default 500 ms pause between the five background requests
    assert!(started.elapsed() >= Duration::from_millis(2000));

    assert_eq!(output.assets.len(), 5);
    assert_eq!(
        output.scenes[0].as_str(),
        "A sunlit Scandinavian kitchen with oak shelves"
    );
    assert_eq!(
        output.scenes[3].as_str(),
        "A sunlit Scandinavian kitchen with oak shelves, variation 1"
    );
    assert_eq!(output.captions[2], "Mornings, upgraded. #NewCoffee #NewCeramics");
    assert_eq!(
        progress.iter().filter(|p| matches!(p, Progress::Variation { .. })).count(),
        5
    );

    let bytes = build_archive(&output).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(archive.len(), 6);

    let captions = String::from_utf8(read_entry(&mut archive, "captions.txt")).unwrap();
    assert_eq!(captions, captions_text(&output));
    assert!(captions.starts_with(
        "Variation 1:\nMornings, upgraded. #Coffee #Ceramics\n\nVariation 2:"
    ));

    let png = read_entry(&mut archive, "ad_variation_5.png");
    let composite = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(composite.dimensions(), (128, 128));
    // background shows in the top-left corner
    assert_eq!(composite.get_pixel(1, 1), &Rgba([30, 60, 90, 255]));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("ad_creatives.zip");
    write_archive(&path, &bytes).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_offline_language_model_uses_fallbacks() {
    let campaign = Campaign::new(Offline, Painter::reliable(), &Config::default())
        .with_request_delay(Duration::ZERO);

    let output = campaign.run(&mug_request(10), |_| {}).await.unwrap();

    assert_eq!(output.assets.len(), 10);
    assert_eq!(output.captions.len(), 10);
    assert!(output.scenes[0].as_str().starts_with("A modern minimalist studio"));
    assert!(output.assets.iter().all(|a| !a.caption.is_empty()));
}

#[tokio::test]
async fn test_partial_failure_still_packages() {
    let painter = Painter {
        calls: AtomicUsize::new(0),
        flaky: vec![0, 4],
        out_of_credits_at: None,
    };
    let campaign =
        Campaign::new(Copywriter, painter, &Config::default()).with_request_delay(Duration::ZERO);

    let output = campaign.run(&mug_request(6), |_| {}).await.unwrap();
    assert_eq!(output.assets.len(), 4);
    assert_eq!(output.failed.len(), 2);
    assert_eq!(output.failed[0].variation, 1);
    assert_eq!(output.failed[1].variation, 5);

    let bytes = build_archive(&output).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "ad_variation_2.png",
            "ad_variation_3.png",
            "ad_variation_4.png",
            "ad_variation_6.png",
            "captions.txt",
        ]
    );
}

#[tokio::test]
async fn test_exhausted_credits_abort_the_run() {
    let painter = Painter {
        calls: AtomicUsize::new(0),
        flaky: Vec::new(),
        out_of_credits_at: Some(2),
    };
    let campaign =
        Campaign::new(Copywriter, painter, &Config::default()).with_request_delay(Duration::ZERO);

    let err = campaign.run(&mug_request(5), |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::CreditsExhausted(_)));
    assert_eq!(err.code(), "E200");
    assert!(err.suggestion().is_some());
}

#[tokio::test]
async fn test_short_description_rejected_before_any_call() {
    let painter = Painter::reliable();
    let mut request = mug_request(5);
    request.description = "mug".to_string();

    let campaign = Campaign::new(Copywriter, painter, &Config::default());
    let err = campaign.run(&request, |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
