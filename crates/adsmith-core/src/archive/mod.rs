//! Output packaging
//!
//! A campaign is delivered as one zip file holding a PNG per variation and a
//! `captions.txt` with the matching ad copy.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::campaign::CampaignOutput;
use crate::composite::encode_png;
use crate::error::Result;

/// Name of the captions entry inside the archive
pub const CAPTIONS_FILE: &str = "captions.txt";

/// File name of the image for variation `n`
pub fn variation_file_name(n: usize) -> String {
    format!("ad_variation_{}.png", n)
}

/// Captions for every produced variation, one block each
pub fn captions_text(output: &CampaignOutput) -> String {
    output
        .assets
        .iter()
        .map(|asset| format!("Variation {}:\n{}", asset.variation, asset.caption))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Zip the composites and captions in memory
pub fn build_archive(output: &CampaignOutput) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for asset in &output.assets {
        zip.start_file(variation_file_name(asset.variation), options)?;
        zip.write_all(&encode_png(&asset.image)?)?;
    }

    zip.start_file(CAPTIONS_FILE, options)?;
    zip.write_all(captions_text(output).as_bytes())?;

    let bytes = zip.finish()?.into_inner();
    info!(
        images = output.assets.len(),
        size_bytes = bytes.len(),
        "Archive built"
    );
    Ok(bytes)
}

/// Write archive bytes to disk, creating parent directories
pub fn write_archive(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{CompositeAsset, VariationFailure};
    use crate::ideation::SceneIdea;
    use image::{Rgba, RgbaImage};
    use std::io::Read;
    use tempfile::TempDir;

    fn asset(variation: usize, caption: &str) -> CompositeAsset {
        CompositeAsset {
            variation,
            scene: SceneIdea::new(format!("scene {}", variation)),
            image: RgbaImage::from_pixel(4, 4, Rgba([variation as u8, 0, 0, 255])),
            caption: caption.to_string(),
        }
    }

    fn output() -> CampaignOutput {
        CampaignOutput {
            assets: vec![asset(1, "First! #One"), asset(3, "Third ☕ #Three")],
            failed: vec![VariationFailure {
                variation: 2,
                scene: SceneIdea::new("scene 2"),
                code: "E201",
                error: "flaky".to_string(),
            }],
            scenes: (1..=3).map(|i| SceneIdea::new(format!("scene {}", i))).collect(),
            captions: vec!["First! #One".into(), "Second #Two".into(), "Third ☕ #Three".into()],
        }
    }

    #[test]
    fn test_captions_text() {
        assert_eq!(
            captions_text(&output()),
            "Variation 1:\nFirst! #One\n\nVariation 3:\nThird ☕ #Three"
        );
    }

    #[test]
    fn test_archive_contents() {
        let bytes = build_archive(&output()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["ad_variation_1.png", "ad_variation_3.png", "captions.txt"]);

        let mut captions = String::new();
        archive
            .by_name(CAPTIONS_FILE)
            .unwrap()
            .read_to_string(&mut captions)
            .unwrap();
        assert!(captions.contains("Variation 3:\nThird ☕ #Three"));

        let mut png = Vec::new();
        archive
            .by_name("ad_variation_3.png")
            .unwrap()
            .read_to_end(&mut png)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([3, 0, 0, 255]));
    }

    #[test]
    fn test_write_archive_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/ad_creatives.zip");
        write_archive(&path, b"PK").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"PK");
    }
}
