//! Image URL resolution for display.
//!
//! Stored `image_url` values come in three shapes across the lifetime of the
//! data set: absolute URLs (some still pointing at the template placeholder
//! host), bare object filenames, or nothing at all. The resolver always
//! produces something a browser can load.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Host left behind by the project template in older rows.
pub const PLACEHOLDER_HOST: &str = "your-project.supabase.co";
pub const DEFAULT_POLLINATIONS_BASE: &str = "https://image.pollinations.ai/prompt/";
pub const IMAGE_BUCKET: &str = "blog-images";

const FALLBACK_PROMPT: &str = "static noise glitch transmission";
const TITLE_STYLE_PREFIX: &str = "glitch art editorial illustration, scanlines, muted palette:";
const FALLBACK_WIDTH: u32 = 1280;
const FALLBACK_HEIGHT: u32 = 720;
const FALLBACK_MODEL: &str = "flux";

static BARE_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Za-z0-9._-]+\.(png|jpe?g|webp)$").expect("filename pattern must compile")
});

/// The two fields of a post the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource<'a> {
    pub title: &'a str,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ImageResolver {
    storage_base: Option<String>,
    pollinations_base: String,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(None, DEFAULT_POLLINATIONS_BASE)
    }
}

impl ImageResolver {
    /// `storage_base` is ignored unless it is a real (non-placeholder) URL.
    pub fn new(storage_base: Option<&str>, pollinations_base: &str) -> Self {
        let storage_base = storage_base
            .map(|base| base.trim().trim_end_matches('/'))
            .filter(|base| !base.is_empty() && !base.contains(PLACEHOLDER_HOST))
            .map(str::to_string);
        let pollinations_base = match pollinations_base.trim() {
            "" => DEFAULT_POLLINATIONS_BASE.to_string(),
            base => format!("{}/", base.trim_end_matches('/')),
        };
        Self {
            storage_base,
            pollinations_base,
        }
    }

    pub fn storage_base(&self) -> Option<&str> {
        self.storage_base.as_deref()
    }

    /// Resolve the display URL for a post, or the generic fallback when there
    /// is no post. Never returns an empty string.
    pub fn resolve(&self, source: Option<ImageSource<'_>>) -> String {
        let Some(source) = source else {
            return self.pollinations_url(FALLBACK_PROMPT);
        };

        if let Some(stored) = source
            .image_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let stored = self.replace_placeholder_host(stored);

            if stored.starts_with("http://") || stored.starts_with("https://") {
                return stored;
            }

            if BARE_FILENAME_RE.is_match(&stored)
                && let Some(base) = self.storage_base.as_deref()
            {
                return public_object_url(base, &stored);
            }
        }

        let title = source.title.trim();
        if title.is_empty() {
            self.pollinations_url(FALLBACK_PROMPT)
        } else {
            self.pollinations_url(&format!("{TITLE_STYLE_PREFIX} {title}"))
        }
    }

    fn replace_placeholder_host(&self, stored: &str) -> String {
        match (self.storage_base.as_deref(), stored.contains(PLACEHOLDER_HOST)) {
            (Some(base), true) => match real_authority(base) {
                Some(authority) => stored.replace(PLACEHOLDER_HOST, &authority),
                None => stored.to_string(),
            },
            _ => stored.to_string(),
        }
    }

    fn pollinations_url(&self, prompt: &str) -> String {
        pollinations_image_url(
            &self.pollinations_base,
            prompt,
            FALLBACK_WIDTH,
            FALLBACK_HEIGHT,
            FALLBACK_MODEL,
        )
    }
}

/// Public URL of an object in the image bucket.
pub fn public_object_url(storage_base: &str, name: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{IMAGE_BUCKET}/{name}",
        storage_base.trim_end_matches('/')
    )
}

/// Build a Pollinations image URL with the prompt percent-encoded as a path
/// segment.
pub fn pollinations_image_url(
    base: &str,
    prompt: &str,
    width: u32,
    height: u32,
    model: &str,
) -> String {
    let fallback = || {
        format!(
            "{DEFAULT_POLLINATIONS_BASE}{}?width={width}&height={height}&model={model}&nologo=true",
            prompt.replace(' ', "%20")
        )
    };

    let Ok(mut url) = Url::parse(base) else {
        return fallback();
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push(prompt);
        }
        Err(()) => return fallback(),
    }
    url.query_pairs_mut()
        .append_pair("width", &width.to_string())
        .append_pair("height", &height.to_string())
        .append_pair("model", model)
        .append_pair("nologo", "true");
    url.to_string()
}

fn real_authority(base: &str) -> Option<String> {
    let url = Url::parse(base).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://abcd.supabase.co";

    fn resolver() -> ImageResolver {
        ImageResolver::new(Some(BASE), DEFAULT_POLLINATIONS_BASE)
    }

    fn source<'a>(title: &'a str, image_url: Option<&'a str>) -> ImageSource<'a> {
        ImageSource { title, image_url }
    }

    #[test]
    fn missing_post_uses_generic_fallback() {
        let url = resolver().resolve(None);
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/static%20noise%20glitch%20transmission?width=1280&height=720&model=flux&nologo=true"
        );
    }

    #[test]
    fn absolute_url_is_returned_verbatim() {
        let url = resolver().resolve(Some(source("T", Some("https://cdn.example.com/a.png"))));
        assert_eq!(url, "https://cdn.example.com/a.png");
    }

    #[test]
    fn placeholder_host_is_rewritten() {
        let url = resolver().resolve(Some(source(
            "T",
            Some("https://your-project.supabase.co/storage/v1/object/public/blog-images/x.png"),
        )));
        assert_eq!(
            url,
            "https://abcd.supabase.co/storage/v1/object/public/blog-images/x.png"
        );
    }

    #[test]
    fn placeholder_kept_without_real_base() {
        let resolver = ImageResolver::new(Some("https://your-project.supabase.co"), "");
        assert!(resolver.storage_base().is_none());
        let stored = "https://your-project.supabase.co/storage/v1/object/public/blog-images/x.png";
        assert_eq!(resolver.resolve(Some(source("T", Some(stored)))), stored);
    }

    #[test]
    fn bare_filename_maps_to_public_bucket() {
        let url = resolver().resolve(Some(source("T", Some("signal-123.JPEG"))));
        assert_eq!(
            url,
            "https://abcd.supabase.co/storage/v1/object/public/blog-images/signal-123.JPEG"
        );

        let trailing = ImageResolver::new(Some("https://abcd.supabase.co///"), "");
        assert_eq!(
            trailing.resolve(Some(source("T", Some("a.webp")))),
            "https://abcd.supabase.co/storage/v1/object/public/blog-images/a.webp"
        );
    }

    #[test]
    fn bare_filename_without_base_falls_back_to_title() {
        let url = ImageResolver::default().resolve(Some(source("Dead Air", Some("a.png"))));
        assert!(url.starts_with("https://image.pollinations.ai/prompt/"));
        assert!(url.contains("Dead%20Air"));
        assert!(url.ends_with("width=1280&height=720&model=flux&nologo=true"));
    }

    #[test]
    fn unrecognised_values_fall_back_to_title() {
        for stored in [None, Some(""), Some("   "), Some("not an image.gif")] {
            let url = resolver().resolve(Some(source("Dead Air", stored)));
            assert!(url.contains("Dead%20Air"), "{stored:?} -> {url}");
        }
    }

    #[test]
    fn never_empty() {
        assert!(!resolver().resolve(Some(source("", None))).is_empty());
    }
}
