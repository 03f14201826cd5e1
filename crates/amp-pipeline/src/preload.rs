//! Preload hints for priority requests
//!
//! A [`PreloadRegistry`] is the set of high-priority fetch hints a rendering
//! surface should emit (for example as `<link rel="preload">` tags). Each
//! hint is owned by a [`PreloadGuard`]; dropping the guard deregisters the
//! hint whether or not the resource finished loading.

use amp_types::{MediaRequest, ResolvedMedia};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One high-priority fetch hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadHint {
    /// Primary locator
    pub url: String,
    /// `srcset` attribute value, possibly empty
    pub srcset: String,
    /// `sizes` attribute value
    pub sizes: String,
}

impl PreloadHint {
    /// Hint for a resolved request
    #[must_use]
    pub fn for_resolved(resolved: &ResolvedMedia) -> Self {
        Self {
            url: resolved.primary_url.clone(),
            srcset: resolved.srcset_attribute(),
            sizes: resolved.sizes_attribute.clone(),
        }
    }

    /// Render as an HTML `<link>` element
    #[must_use]
    pub fn to_link_tag(&self) -> String {
        let mut tag = format!(
            r#"<link rel="preload" as="image" fetchpriority="high" href="{}""#,
            escape_attr(&self.url)
        );
        if !self.srcset.is_empty() {
            tag.push_str(&format!(
                r#" imagesrcset="{}" imagesizes="{}""#,
                escape_attr(&self.srcset),
                escape_attr(&self.sizes)
            ));
        }
        tag.push('>');
        tag
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Shared set of active preload hints
#[derive(Debug, Clone, Default)]
pub struct PreloadRegistry {
    hints: Arc<DashMap<Uuid, PreloadHint>>,
}

impl PreloadRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hint`; it stays active until the guard drops
    #[must_use = "dropping the guard deregisters the hint immediately"]
    pub fn register(&self, hint: PreloadHint) -> PreloadGuard {
        let id = Uuid::new_v4();
        tracing::debug!(url = %hint.url, "preload hint registered");
        self.hints.insert(id, hint);
        PreloadGuard {
            id,
            registry: self.clone(),
        }
    }

    /// Snapshot of active hints
    #[must_use]
    pub fn hints(&self) -> Vec<PreloadHint> {
        self.hints.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Check if a hint for `url` is active
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.hints.iter().any(|entry| entry.value().url == url)
    }

    /// Number of active hints
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Check if no hints are active
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

/// Keeps one hint registered
#[derive(Debug)]
pub struct PreloadGuard {
    id: Uuid,
    registry: PreloadRegistry,
}

impl PreloadGuard {
    /// The registered hint, if still present
    #[must_use]
    pub fn hint(&self) -> Option<PreloadHint> {
        self.registry.hints.get(&self.id).map(|h| h.value().clone())
    }
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        if let Some((_, hint)) = self.registry.hints.remove(&self.id) {
            tracing::debug!(url = %hint.url, "preload hint deregistered");
        }
    }
}

/// Registers hints for priority requests only
#[derive(Debug, Clone, Default)]
pub struct PreloadController {
    registry: PreloadRegistry,
}

impl PreloadController {
    /// Create controller over `registry`
    #[inline]
    #[must_use]
    pub fn new(registry: PreloadRegistry) -> Self {
        Self { registry }
    }

    /// Registry this controller writes to
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &PreloadRegistry {
        &self.registry
    }

    /// Register a hint for `resolved` if `request` is priority
    #[must_use]
    pub fn preload(&self, request: &MediaRequest, resolved: &ResolvedMedia) -> Option<PreloadGuard> {
        request
            .priority
            .then(|| self.registry.register(PreloadHint::for_resolved(resolved)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_types::SrcSetEntry;
    use pretty_assertions::assert_eq;

    fn resolved() -> ResolvedMedia {
        ResolvedMedia {
            primary_url: "https://cdn/a.jpg".to_string(),
            src_set: vec![SrcSetEntry {
                url: "https://cdn/a-640.jpg".to_string(),
                width: 640,
            }],
            sizes_attribute: "(max-width: 600px) 100vw, 50vw".to_string(),
            placeholder_url: String::new(),
            metrics: None,
        }
    }

    #[test]
    fn guard_drop_deregisters() {
        let registry = PreloadRegistry::new();
        let guard = registry.register(PreloadHint::for_resolved(&resolved()));
        assert!(registry.contains("https://cdn/a.jpg"));
        assert_eq!(guard.hint().map(|h| h.url), Some("https://cdn/a.jpg".to_string()));

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn only_priority_requests_preload() {
        let controller = PreloadController::default();
        let request = MediaRequest::new("https://cdn/a.jpg");

        assert!(controller.preload(&request, &resolved()).is_none());
        let guard = controller.preload(&request.with_priority(true), &resolved());
        assert!(guard.is_some());
        assert_eq!(controller.registry().len(), 1);
    }

    #[test]
    fn link_tag_rendering() {
        let hint = PreloadHint::for_resolved(&resolved());
        assert_eq!(
            hint.to_link_tag(),
            r#"<link rel="preload" as="image" fetchpriority="high" href="https://cdn/a.jpg" imagesrcset="https://cdn/a-640.jpg 640w" imagesizes="(max-width: 600px) 100vw, 50vw">"#
        );

        let bare = PreloadHint {
            url: "https://x/?a=1&b=2".to_string(),
            srcset: String::new(),
            sizes: "100vw".to_string(),
        };
        assert_eq!(
            bare.to_link_tag(),
            r#"<link rel="preload" as="image" fetchpriority="high" href="https://x/?a=1&amp;b=2">"#
        );
    }
}
