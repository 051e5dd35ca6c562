//! Material variants
//!
//! Each variant maps to its own scattering routine in the generated shader. Scene text names
//! materials by tag; unknown tags are rejected here so later stages only ever see a valid
//! [`Material`].

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    #[error("unknown material variant `{0}` (expected one of lambert, fuzzy-metal, shiny-metal, glass, light)")]
    UnknownMaterialVariant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    /// Diffuse surface
    Lambert,
    /// Reflective surface with roughness
    FuzzyMetal,
    /// Near mirror
    ShinyMetal,
    /// Dielectric with a fixed index of refraction
    Glass,
    /// Emits its color as constant radiance
    Light,
}

impl Material {
    pub const ALL: [Material; 5] = [
        Material::Lambert,
        Material::FuzzyMetal,
        Material::ShinyMetal,
        Material::Glass,
        Material::Light,
    ];

    /// Canonical tag used in scene text
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Material::Lambert => "lambert",
            Material::FuzzyMetal => "fuzzy-metal",
            Material::ShinyMetal => "shiny-metal",
            Material::Glass => "glass",
            Material::Light => "light",
        }
    }

    #[must_use]
    pub fn is_emissive(self) -> bool {
        matches!(self, Material::Light)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Material {
    type Err = MaterialError;

    /// Accepts kebab, snake and Pascal case spellings (`fuzzy-metal`, `FuzzyMetal`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "lambert" => Ok(Material::Lambert),
            "fuzzymetal" => Ok(Material::FuzzyMetal),
            "shinymetal" => Ok(Material::ShinyMetal),
            "glass" => Ok(Material::Glass),
            "light" => Ok(Material::Light),
            _ => Err(MaterialError::UnknownMaterialVariant(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Material {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for material in Material::ALL {
            assert_eq!(material.tag().parse::<Material>(), Ok(material));
        }
    }

    #[test]
    fn pascal_case_tags_are_accepted() {
        assert_eq!("FuzzyMetal".parse(), Ok(Material::FuzzyMetal));
        assert_eq!("shiny_metal".parse(), Ok(Material::ShinyMetal));
        assert_eq!("Lambert".parse(), Ok(Material::Lambert));
    }

    #[test]
    fn unknown_tag_is_reported() {
        assert_eq!(
            "velvet".parse::<Material>(),
            Err(MaterialError::UnknownMaterialVariant("velvet".into()))
        );
    }
}
