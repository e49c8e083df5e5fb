//! Case id to configuration derivation.
//!
//! A fixture's file name carries its options: `compress-regression.styl`
//! renders compressed, `prefix.classes.styl` renders with a class prefix.
//! Each convention is one [`ConfigRule`]. Rules are applied in table order to
//! a base configuration and every matching rule fires, so a later rule
//! overwrites any field an earlier one set (last-applied-wins).
//!
//! Derivation never touches the filesystem and depends on nothing but the
//! case id and the deriver's own base and rules.

use std::path::PathBuf;

use crate::configuration::{Builtin, Configuration, Function, SourceMapOptions, URL_FUNCTION};

/// Class prefix applied by the `prefix.` rule.
pub const PREFIX_MARKER: &str = "prefix-";

/// A substring predicate paired with a configuration mutation.
#[derive(Debug, Clone, Copy)]
pub struct ConfigRule {
    pub needle: &'static str,
    pub apply: fn(&mut Configuration),
}

impl ConfigRule {
    pub fn matches(&self, case_id: &str) -> bool {
        case_id.contains(self.needle)
    }
}

fn set_compress(config: &mut Configuration) {
    config.compress = true;
}

fn set_include_css(config: &mut Configuration) {
    config.include_css = true;
}

fn set_prefix(config: &mut Configuration) {
    config.prefix = Some(PREFIX_MARKER.to_string());
}

fn set_hoist_atrules(config: &mut Configuration) {
    config.hoist_atrules = true;
}

fn set_url_resolver(config: &mut Configuration) {
    config.resolve_url = true;
    config
        .functions
        .insert(URL_FUNCTION.to_string(), Function::Builtin(Builtin::UrlResolver));
}

fn set_inline_sourcemap(config: &mut Configuration) {
    match config.sourcemap.as_mut() {
        Some(options) => options.inline = true,
        None => {
            config.sourcemap = Some(SourceMapOptions {
                inline: true,
                source_root: "/".to_string(),
                base_path: String::new(),
            })
        }
    }
}

/// Naming conventions of the integration suite, in application order.
pub const INTEGRATION_RULES: &[ConfigRule] = &[
    ConfigRule {
        needle: "compress",
        apply: set_compress,
    },
    ConfigRule {
        needle: "include",
        apply: set_include_css,
    },
    ConfigRule {
        needle: "prefix.",
        apply: set_prefix,
    },
    ConfigRule {
        needle: "hoist.",
        apply: set_hoist_atrules,
    },
    ConfigRule {
        needle: "resolver",
        apply: set_url_resolver,
    },
];

/// Naming conventions of the sourcemap suite.
pub const SOURCEMAP_RULES: &[ConfigRule] = &[ConfigRule {
    needle: "inline",
    apply: set_inline_sourcemap,
}];

/// Applies `rules` in order to a default configuration.
pub fn derive_configuration(case_id: &str, rules: &[ConfigRule]) -> Configuration {
    ConfigDeriver::new(Configuration::default(), rules.to_vec()).derive(case_id)
}

/// A base configuration plus an ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct ConfigDeriver {
    base: Configuration,
    rules: Vec<ConfigRule>,
}

impl ConfigDeriver {
    pub fn new(base: Configuration, rules: Vec<ConfigRule>) -> Self {
        Self { base, rules }
    }

    /// Integration suite: image and import search paths, `url` bound to the
    /// embedding builtin, and the integration naming rules.
    pub fn integration(images_dir: PathBuf, import_dir: PathBuf) -> Self {
        let base = Configuration {
            include_paths: vec![images_dir, import_dir],
            ..Configuration::default()
        }
        .with_function(URL_FUNCTION, Function::Builtin(Builtin::Url));
        Self::new(base, INTEGRATION_RULES.to_vec())
    }

    /// Sourcemap suite: external maps rooted at `/`, inline when the id says so.
    pub fn sourcemap(base_path: impl Into<String>) -> Self {
        let base = Configuration {
            sourcemap: Some(SourceMapOptions {
                inline: false,
                source_root: "/".to_string(),
                base_path: base_path.into(),
            }),
            ..Configuration::default()
        };
        Self::new(base, SOURCEMAP_RULES.to_vec())
    }

    pub fn rules(&self) -> &[ConfigRule] {
        &self.rules
    }

    pub fn derive(&self, case_id: &str) -> Configuration {
        let mut config = self.base.clone();
        for rule in self.rules.iter().filter(|rule| rule.matches(case_id)) {
            (rule.apply)(&mut config);
        }
        config
    }
}
