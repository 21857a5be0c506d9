// src/recipe/features.rs

//! Feature flags and their configure-time argument tokens
//!
//! Every declared flag renders to exactly one token, independently of every
//! other flag. Flags a recipe does not declare never produce a token and read
//! as disabled.

use crate::error::{Error, Result};
use crate::recipe::format::FlagStyle;
use std::collections::BTreeMap;

impl FlagStyle {
    /// Render one flag as a single argument token
    pub fn render(&self, name: &str, enabled: bool) -> String {
        match (self, enabled) {
            (FlagStyle::Cmake, true) => format!("-D{}=ON", name),
            (FlagStyle::Cmake, false) => format!("-D{}=OFF", name),
            (FlagStyle::Autotools, true) => format!("--enable-{}", name),
            (FlagStyle::Autotools, false) => format!("--disable-{}", name),
            (FlagStyle::Meson, true) => format!("-D{}=enabled", name),
            (FlagStyle::Meson, false) => format!("-D{}=disabled", name),
        }
    }
}

/// Declared flags of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSet {
    style: FlagStyle,
    flags: BTreeMap<String, bool>,
}

impl FeatureSet {
    pub(crate) fn new(style: FlagStyle, flags: BTreeMap<String, bool>) -> Self {
        Self { style, flags }
    }

    /// Rendering style
    pub fn style(&self) -> FlagStyle {
        self.style
    }

    /// Declared flags with their recipe defaults
    pub fn declared(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    /// Whether `name` is declared by the recipe
    pub fn is_declared(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Merge operator overrides over the declared defaults
    ///
    /// Fails with [`Error::UnknownFeature`] if an override names a flag the
    /// recipe does not declare.
    pub fn effective(&self, overrides: &FeatureOverrides) -> Result<BTreeMap<String, bool>> {
        if let Some(unknown) = overrides.names().find(|name| !self.is_declared(name)) {
            return Err(Error::UnknownFeature(unknown.to_string()));
        }

        Ok(self
            .flags
            .iter()
            .map(|(name, default)| {
                let value = overrides.get(name).unwrap_or(*default);
                (name.clone(), value)
            })
            .collect())
    }

    /// The configure argument vector, one token per declared flag
    pub fn args(&self, overrides: &FeatureOverrides) -> Result<Vec<String>> {
        Ok(self
            .effective(overrides)?
            .into_iter()
            .map(|(name, enabled)| self.style.render(&name, enabled))
            .collect())
    }
}

/// Operator-supplied flag values that replace recipe defaults for one cook
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureOverrides {
    values: BTreeMap<String, bool>,
}

impl FeatureOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a flag on
    pub fn enable(mut self, name: impl Into<String>) -> Self {
        self.values.insert(name.into(), true);
        self
    }

    /// Force a flag off
    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.values.insert(name.into(), false);
        self
    }

    /// Build from `--with` / `--without` lists; later `--without` wins
    pub fn from_lists(with: &[String], without: &[String]) -> Self {
        let mut overrides = Self::new();
        for name in with {
            overrides = overrides.enable(name.as_str());
        }
        for name in without {
            overrides = overrides.disable(name.as_str());
        }
        overrides
    }

    /// Override value for `name`, if any
    pub fn get(&self, name: &str) -> Option<bool> {
        self.values.get(name).copied()
    }

    /// Names with an override
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// True when nothing is overridden
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
