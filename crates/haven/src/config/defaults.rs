use serde_json::json;

use super::{CacheGroupSpec, CacheGroups, ConfigDocument, DEFAULT_VERSION, NetworkSettings};
use crate::strategy::StrategyKind;

/// The document used whenever the configuration endpoint cannot be used
pub(crate) fn default_document() -> ConfigDocument {
    let cache = CacheGroups::new()
        .with(
            "static",
            CacheGroupSpec::new(StrategyKind::CacheFirst, &[r"\.(?:css|js|woff2?)$"])
                .with_max_age(86400),
        )
        .with(
            "images",
            CacheGroupSpec::new(
                StrategyKind::CacheFirst,
                &[r"\.(?:png|jpg|jpeg|gif|webp|svg|ico)$"],
            )
            .with_max_age(604800),
        )
        .with(
            "pages",
            CacheGroupSpec::new(
                StrategyKind::NetworkFirst,
                &["^/$", "^/terms$", "^/privacy_policy$"],
            )
            .with_timeout(3000),
        )
        .with(
            "api",
            CacheGroupSpec::new(StrategyKind::NetworkOnly, &["^/api/", "^/operator/"]),
        );

    ConfigDocument {
        version: DEFAULT_VERSION.to_owned(),
        cache,
        network: NetworkSettings {
            timeout: 3000,
            retries: 1,
        },
        precache: Vec::new(),
        manifest: Some(json!({
            "theme_color": "#0d6efd",
            "background_color": "#ffffff"
        })),
        features: Some(json!({
            "install_prompt": true,
            "push_notifications": false,
            "background_sync": false
        })),
        observability: None,
    }
}
