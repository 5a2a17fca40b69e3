//! Scene ideas and ad copy from a product description
//!
//! Both lists come from one language model call each. The model is asked for
//! a numbered list; whatever comes back is cleaned up, padded or truncated so
//! the caller always receives exactly the number of entries it asked for.

use std::fmt;

use tracing::{debug, warn};

use crate::llm::TextGenerator;

/// Scenes shorter than this are treated as noise
pub const MIN_SCENE_LEN: usize = 10;

/// Captions shorter than this are treated as noise
pub const MIN_CAPTION_LEN: usize = 5;

/// A background scene description, one per ad variation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneIdea(String);

impl SceneIdea {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SceneIdea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SceneIdea {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Prompt asking for `n` background scenes suitable for the product
pub fn scene_prompt(description: &str, n: usize) -> String {
    format!(
        r#"You are a creative director for advertising. Based on this product description: "{description}"

Generate {n} distinct, visually appealing background scene prompts for Stable Diffusion. Each prompt should:
1. Describe a unique environment/scene suitable for showcasing this product
2. Be vivid and detailed (e.g., "A sunlit modern kitchen with marble countertops and natural lighting")
3. NOT include the product itself or any text/logos
4. Focus on atmosphere, mood, and setting
5. Be suitable for placing a product image in the foreground

Return ONLY a numbered list of {n} prompts, one per line, without any additional text or explanation.
Example format:
1. A minimalist white studio with soft natural lighting
2. A vibrant urban street scene at golden hour
3. A luxurious spa setting with marble and plants
"#
    )
}

/// Prompt asking for `n` short social media captions with hashtags
pub fn caption_prompt(description: &str, n: usize) -> String {
    format!(
        r#"You are a professional copywriter. Based on this product description: "{description}"

Generate {n} catchy, engaging marketing captions for social media ads. Each caption should:
1. Be concise (under 100 characters)
2. Be attention-grabbing and compelling
3. Include relevant hashtags (2-3 per caption)
4. Highlight key benefits or features
5. Be suitable for Instagram/Facebook ads

Return ONLY a numbered list of {n} captions, one per line, without any additional text or explanation.
Example format:
1. Transform your space with premium quality! #PremiumDesign #HomeDecor
2. Elevate your lifestyle today. #ModernLiving #QualityFirst
3. Discover the difference. #Innovation #Style
"#
    )
}

/// Split a model reply into list items.
///
/// Leading list markers (`1.`, `2)`, `-`, `*`, `•`) and markdown emphasis or
/// headings are removed. Items of `min_len` characters or fewer are dropped.
pub fn parse_numbered_list(text: &str, min_len: usize) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let cleaned = strip_markdown(strip_list_marker(line.trim())).trim();
            (cleaned.chars().count() > min_len).then(|| cleaned.to_string())
        })
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let after_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if after_digits.len() != line.len() {
        if let Some(rest) = after_digits
            .strip_prefix('.')
            .or_else(|| after_digits.strip_prefix(')'))
        {
            return rest.trim_start();
        }
        return line;
    }

    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }
    line
}

fn strip_markdown(line: &str) -> &str {
    let line = if let Some(rest) = line.strip_prefix("**") {
        rest
    } else if let Some(rest) = line.strip_prefix('*') {
        rest
    } else if line.starts_with('#') {
        line.trim_start_matches('#').trim_start()
    } else {
        line
    };
    line.strip_suffix("**").unwrap_or(line)
}

/// Cycle over `items` (or `defaults` when empty) until there are `n`,
/// transforming every entry added after the base list is used up.
fn pad_with(
    mut items: Vec<String>,
    n: usize,
    defaults: Vec<String>,
    vary: impl Fn(&str, usize) -> String,
) -> Vec<String> {
    let base = if items.is_empty() { defaults } else { items.clone() };
    if base.is_empty() {
        return items;
    }

    while items.len() < n {
        let idx = items.len() % base.len();
        let entry = if items.len() >= base.len() {
            vary(&base[idx], items.len() - base.len() + 1)
        } else {
            base[idx].clone()
        };
        items.push(entry);
    }
    items.truncate(n);
    items
}

fn vary_scene(scene: &str, k: usize) -> String {
    format!("{}, variation {}", scene, k)
}

fn vary_caption(caption: &str, _k: usize) -> String {
    caption.replace('#', "#New")
}

/// Bring a parsed scene list to exactly `n` entries
pub fn pad_scenes(scenes: Vec<String>, description: &str, n: usize) -> Vec<String> {
    let defaults = vec![
        format!("A professional setting showcasing {}", description),
        format!("A modern environment featuring {}", description),
        format!("An elegant backdrop for {}", description),
    ];
    pad_with(scenes, n, defaults, vary_scene)
}

/// Bring a parsed caption list to exactly `n` entries
pub fn pad_captions(captions: Vec<String>, description: &str, n: usize) -> Vec<String> {
    let defaults = vec![
        format!("Discover {}! #Quality #Innovation", description),
        format!("Elevate your experience. {} #Premium #Style", description),
    ];
    pad_with(captions, n, defaults, vary_caption)
}

/// Scenes used when the language model is unavailable
pub fn fallback_scenes(description: &str, n: usize) -> Vec<String> {
    let templates = vec![
        format!(
            "A modern minimalist studio with soft lighting, perfect for showcasing {}",
            description
        ),
        format!(
            "A vibrant contemporary setting with natural elements, ideal for {}",
            description
        ),
        format!(
            "A luxurious elegant environment with sophisticated lighting, showcasing {}",
            description
        ),
        format!(
            "A dynamic urban backdrop with modern aesthetics, featuring {}",
            description
        ),
        format!(
            "A serene natural setting with professional lighting, highlighting {}",
            description
        ),
    ];
    pad_with(Vec::new(), n, templates, vary_scene)
}

/// Captions used when the language model is unavailable
pub fn fallback_captions(description: &str, n: usize) -> Vec<String> {
    let templates = vec![
        format!("Discover {}! #Quality #Innovation", description),
        format!(
            "Elevate your experience with {}. #Premium #Style",
            description
        ),
        format!("Transform your world. {} #Modern #Design", description),
        format!(
            "Experience the difference. {} #Excellence #Luxury",
            description
        ),
        format!("Your new favorite. {} #Trending #MustHave", description),
    ];
    pad_with(Vec::new(), n, templates, vary_caption)
}

/// Writes scene ideas and captions with a language model
pub struct SceneWriter<T> {
    generator: T,
}

impl<T: TextGenerator> SceneWriter<T> {
    pub fn new(generator: T) -> Self {
        Self { generator }
    }

    /// Exactly `n` background scenes for the product
    pub async fn scene_ideas(&self, description: &str, n: usize) -> Vec<SceneIdea> {
        let scenes = match self.generator.generate(&scene_prompt(description, n)).await {
            Ok(text) => {
                let parsed = parse_numbered_list(&text, MIN_SCENE_LEN);
                debug!(requested = n, parsed = parsed.len(), "Parsed scene ideas");
                pad_scenes(parsed, description, n)
            }
            Err(e) => {
                warn!(error = %e, "Scene ideation failed, using fallback scenes");
                fallback_scenes(description, n)
            }
        };
        scenes.into_iter().map(SceneIdea::from).collect()
    }

    /// Exactly `n` ad captions for the product
    pub async fn captions(&self, description: &str, n: usize) -> Vec<String> {
        match self.generator.generate(&caption_prompt(description, n)).await {
            Ok(text) => {
                let parsed = parse_numbered_list(&text, MIN_CAPTION_LEN);
                debug!(requested = n, parsed = parsed.len(), "Parsed captions");
                pad_captions(parsed, description, n)
            }
            Err(e) => {
                warn!(error = %e, "Caption generation failed, using fallback captions");
                fallback_captions(description, n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(Error::LlmError("boom".to_string())),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::LlmError(e.to_string())),
            }
        }
    }

    #[test]
    fn test_prompts_mention_count_and_description() {
        let p = scene_prompt("a ceramic mug", 7);
        assert!(p.contains("\"a ceramic mug\""));
        assert!(p.contains("Generate 7 distinct"));
        assert!(p.contains("NOT include the product"));

        let c = caption_prompt("a ceramic mug", 6);
        assert!(c.contains("Generate 6 catchy"));
        assert!(c.contains("hashtags"));
    }

    #[test]
    fn test_parse_strips_markers() {
        let text = "1. A sunlit kitchen with marble\n\
                    2) A foggy pine forest at dawn\n\
                    - A rooftop garden at dusk\n\
                    * A quiet library corner\n\
                    • A beach boardwalk at noon\n\
                    10. A neon arcade full of glow";
        let items = parse_numbered_list(text, MIN_SCENE_LEN);
        assert_eq!(
            items,
            vec![
                "A sunlit kitchen with marble",
                "A foggy pine forest at dawn",
                "A rooftop garden at dusk",
                "A quiet library corner",
                "A beach boardwalk at noon",
                "A neon arcade full of glow",
            ]
        );
    }

    #[test]
    fn test_parse_strips_markdown() {
        let text = "1. **Sunlit kitchen at breakfast**\n## Misty harbour with boats\n*Soft studio backdrop";
        let items = parse_numbered_list(text, MIN_SCENE_LEN);
        assert_eq!(
            items,
            vec![
                "Sunlit kitchen at breakfast",
                "Misty harbour with boats",
                "Soft studio backdrop",
            ]
        );
    }

    #[test]
    fn test_parse_drops_short_and_blank_lines() {
        let text = "\n\n1. Short\n\n2. Long enough caption #Yes\n3. tiny!\n";
        assert_eq!(
            parse_numbered_list(text, MIN_CAPTION_LEN),
            vec!["Long enough caption #Yes"]
        );
        assert_eq!(
            parse_numbered_list("1. exactly10c", 10),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_parse_keeps_leading_numbers_without_delimiter() {
        let items = parse_numbered_list("3D printed studio with lasers", MIN_SCENE_LEN);
        assert_eq!(items, vec!["3D printed studio with lasers"]);
    }

    #[test]
    fn test_pad_scenes_from_parsed() {
        let padded = pad_scenes(vec!["Scene A".into(), "Scene B".into()], "mug", 5);
        assert_eq!(
            padded,
            vec![
                "Scene A",
                "Scene B",
                "Scene A, variation 1",
                "Scene B, variation 2",
                "Scene A, variation 3",
            ]
        );
    }

    #[test]
    fn test_pad_scenes_from_defaults() {
        let padded = pad_scenes(Vec::new(), "mug", 5);
        assert_eq!(padded[0], "A professional setting showcasing mug");
        assert_eq!(padded[2], "An elegant backdrop for mug");
        assert_eq!(padded[3], "A professional setting showcasing mug, variation 1");
        assert_eq!(padded[4], "A modern environment featuring mug, variation 2");
    }

    #[test]
    fn test_pad_truncates() {
        let many: Vec<String> = (0..8).map(|i| format!("scene number {}", i)).collect();
        assert_eq!(pad_scenes(many, "mug", 5).len(), 5);
    }

    #[test]
    fn test_pad_captions_marks_repeats() {
        let padded = pad_captions(vec!["Buy now #Mug".into()], "mug", 3);
        assert_eq!(padded, vec!["Buy now #Mug", "Buy now #NewMug", "Buy now #NewMug"]);
    }

    #[test]
    fn test_fallbacks_cycle_to_n() {
        let scenes = fallback_scenes("mug", 7);
        assert_eq!(scenes.len(), 7);
        assert!(scenes[4].ends_with("highlighting mug"));
        assert!(scenes[5].ends_with(", variation 1"));

        let captions = fallback_captions("mug", 6);
        assert_eq!(captions.len(), 6);
        assert_eq!(captions[5], "Discover mug! #NewQuality #NewInnovation");

        assert_eq!(fallback_scenes("mug", 3).len(), 3);
    }

    #[tokio::test]
    async fn test_writer_parses_model_reply() {
        let generator = Scripted::ok(
            "1. A sunlit kitchen with marble\n2. A foggy pine forest at dawn\n3. A rooftop garden at dusk\n4. A quiet library corner\n5. A beach boardwalk at noon",
        );
        let writer = SceneWriter::new(generator);
        let scenes = writer.scene_ideas("a ceramic mug", 5).await;

        assert_eq!(scenes.len(), 5);
        assert_eq!(scenes[1].as_str(), "A foggy pine forest at dawn");
        assert_eq!(writer.generator.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writer_falls_back_on_error() {
        let writer = SceneWriter::new(Scripted::failing());

        let scenes = writer.scene_ideas("a ceramic mug", 6).await;
        assert_eq!(scenes.len(), 6);
        assert!(scenes[0].as_str().contains("minimalist studio"));

        let captions = writer.captions("a ceramic mug", 5).await;
        assert_eq!(captions.len(), 5);
        assert!(captions[4].starts_with("Your new favorite."));
    }

    #[tokio::test]
    async fn test_writer_pads_short_caption_reply() {
        let writer = SceneWriter::new(Scripted::ok("1. Sip in style. #Mug #Coffee"));
        let captions = writer.captions("a ceramic mug", 5).await;
        assert_eq!(captions.len(), 5);
        assert_eq!(captions[0], "Sip in style. #Mug #Coffee");
        assert_eq!(captions[1], "Sip in style. #NewMug #NewCoffee");
    }
}
