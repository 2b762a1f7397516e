//! Sound catalog
//!
//! Immutable registry of the ambient tracks the engine can play, plus the
//! closed set of screen contexts that select a track automatically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ambient track identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundId {
    CosmicDrift,
    StellarWinds,
    NebulaHum,
    LunarTide,
    ForestWhispers,
    OceanWaves,
    GentleRain,
    SingingBowls,
    TempleBells,
    DeepStillness,
}

/// Broad flavour of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundCategory {
    Cosmic,
    Nature,
    Meditative,
}

/// Catalog entry for one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundDefinition {
    pub id: SoundId,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Per-track loudness trim (0.0-1.0), multiplied by the master volume
    pub base_gain: f32,
    pub category: SoundCategory,
    /// Asset path relative to the backend's asset root. `None` means the
    /// track has not been bundled and playback takes the simulate path.
    pub asset: Option<&'static str>,
}

impl SoundDefinition {
    /// Effective gain for this track at the given master volume
    pub fn effective_gain(&self, master_volume: f32) -> f32 {
        effective_gain(self.base_gain, master_volume)
    }
}

/// Product of base gain and master volume, each clamped to 0.0-1.0
pub fn effective_gain(base_gain: f32, master_volume: f32) -> f32 {
    (base_gain.clamp(0.0, 1.0) * master_volume.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

static CATALOG: [SoundDefinition; 10] = [
    SoundDefinition {
        id: SoundId::CosmicDrift,
        display_name: "Cosmic Drift",
        description: "Slow evolving pads drifting through deep space",
        base_gain: 0.35,
        category: SoundCategory::Cosmic,
        asset: Some("sounds/cosmic-drift.mp3"),
    },
    SoundDefinition {
        id: SoundId::StellarWinds,
        display_name: "Stellar Winds",
        description: "Airy shimmer carried on solar wind",
        base_gain: 0.3,
        category: SoundCategory::Cosmic,
        asset: Some("sounds/stellar-winds.mp3"),
    },
    SoundDefinition {
        id: SoundId::NebulaHum,
        display_name: "Nebula Hum",
        description: "Low resonant drone with distant sparkles",
        base_gain: 0.25,
        category: SoundCategory::Cosmic,
        asset: Some("sounds/nebula-hum.mp3"),
    },
    SoundDefinition {
        id: SoundId::LunarTide,
        display_name: "Lunar Tide",
        description: "Gentle swells pulled by the moon",
        base_gain: 0.3,
        category: SoundCategory::Cosmic,
        asset: Some("sounds/lunar-tide.mp3"),
    },
    SoundDefinition {
        id: SoundId::ForestWhispers,
        display_name: "Forest Whispers",
        description: "Rustling leaves and far-off birdsong",
        base_gain: 0.3,
        category: SoundCategory::Nature,
        asset: Some("sounds/forest-whispers.mp3"),
    },
    SoundDefinition {
        id: SoundId::OceanWaves,
        display_name: "Ocean Waves",
        description: "Waves rolling onto a quiet shore",
        base_gain: 0.4,
        category: SoundCategory::Nature,
        asset: Some("sounds/ocean-waves.mp3"),
    },
    SoundDefinition {
        id: SoundId::GentleRain,
        display_name: "Gentle Rain",
        description: "Soft rain on a window pane",
        base_gain: 0.35,
        category: SoundCategory::Nature,
        asset: Some("sounds/gentle-rain.mp3"),
    },
    SoundDefinition {
        id: SoundId::SingingBowls,
        display_name: "Singing Bowls",
        description: "Tibetan bowls ringing into silence",
        base_gain: 0.25,
        category: SoundCategory::Meditative,
        asset: Some("sounds/singing-bowls.mp3"),
    },
    SoundDefinition {
        id: SoundId::TempleBells,
        display_name: "Temple Bells",
        description: "Sparse bells echoing across a courtyard",
        base_gain: 0.2,
        category: SoundCategory::Meditative,
        asset: None,
    },
    SoundDefinition {
        id: SoundId::DeepStillness,
        display_name: "Deep Stillness",
        description: "Near-silent room tone for focused reflection",
        base_gain: 0.5,
        category: SoundCategory::Meditative,
        asset: None,
    },
];

/// Look up the definition for a track. Total: every id has an entry.
pub fn lookup(id: SoundId) -> &'static SoundDefinition {
    &CATALOG[id as usize]
}

/// All definitions in a category, in catalog order
pub fn by_category(category: SoundCategory) -> impl Iterator<Item = &'static SoundDefinition> {
    CATALOG.iter().filter(move |def| def.category == category)
}

impl SoundId {
    /// Every track, in catalog order
    pub fn all() -> impl Iterator<Item = SoundId> {
        CATALOG.iter().map(|def| def.id)
    }

    /// Stable kebab-case identifier (matches the persisted form)
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundId::CosmicDrift => "cosmic-drift",
            SoundId::StellarWinds => "stellar-winds",
            SoundId::NebulaHum => "nebula-hum",
            SoundId::LunarTide => "lunar-tide",
            SoundId::ForestWhispers => "forest-whispers",
            SoundId::OceanWaves => "ocean-waves",
            SoundId::GentleRain => "gentle-rain",
            SoundId::SingingBowls => "singing-bowls",
            SoundId::TempleBells => "temple-bells",
            SoundId::DeepStillness => "deep-stillness",
        }
    }

    pub fn definition(&self) -> &'static SoundDefinition {
        lookup(*self)
    }

    pub fn category(&self) -> SoundCategory {
        lookup(*self).category
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown track identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSound(pub String);

impl fmt::Display for UnknownSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sound id: {}", self.0)
    }
}

impl std::error::Error for UnknownSound {}

impl FromStr for SoundId {
    type Err = UnknownSound;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundId::all()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownSound(s.to_string()))
    }
}

impl fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundCategory::Cosmic => write!(f, "Cosmic"),
            SoundCategory::Nature => write!(f, "Nature"),
            SoundCategory::Meditative => write!(f, "Meditative"),
        }
    }
}

/// Screens that pick an ambient track when entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Context {
    CardDraw,
    Reflection,
    Onboarding,
    Compatibility,
    Astrology,
}

impl Context {
    pub const ALL: [Context; 5] = [
        Context::CardDraw,
        Context::Reflection,
        Context::Onboarding,
        Context::Compatibility,
        Context::Astrology,
    ];
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::CardDraw => write!(f, "cardDraw"),
            Context::Reflection => write!(f, "reflection"),
            Context::Onboarding => write!(f, "onboarding"),
            Context::Compatibility => write!(f, "compatibility"),
            Context::Astrology => write!(f, "astrology"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_has_its_own_entry() {
        for id in SoundId::all() {
            assert_eq!(lookup(id).id, id);
        }
        assert_eq!(SoundId::all().count(), 10);
    }

    #[test]
    fn test_base_gains_in_range() {
        for def in CATALOG.iter() {
            assert!((0.0..=1.0).contains(&def.base_gain), "{}", def.id);
        }
    }

    #[test]
    fn test_effective_gain() {
        let forest = lookup(SoundId::ForestWhispers);
        assert!((forest.effective_gain(0.3) - 0.09).abs() < 1e-6);
        assert!((forest.effective_gain(0.6) - 0.18).abs() < 1e-6);

        // Out-of-range inputs are clamped before multiplying
        assert_eq!(effective_gain(1.5, 2.0), 1.0);
        assert_eq!(effective_gain(0.5, -1.0), 0.0);
    }

    #[test]
    fn test_sound_id_string_forms() {
        assert_eq!(SoundId::ForestWhispers.to_string(), "forest-whispers");
        assert_eq!("ocean-waves".parse::<SoundId>(), Ok(SoundId::OceanWaves));
        assert!("elevator-music".parse::<SoundId>().is_err());

        let json = serde_json::to_string(&SoundId::DeepStillness).unwrap();
        assert_eq!(json, "\"deep-stillness\"");
    }

    #[test]
    fn test_by_category() {
        let nature: Vec<_> = by_category(SoundCategory::Nature).map(|d| d.id).collect();
        assert_eq!(
            nature,
            vec![SoundId::ForestWhispers, SoundId::OceanWaves, SoundId::GentleRain]
        );
        assert_eq!(SoundId::NebulaHum.category(), SoundCategory::Cosmic);
    }

    #[test]
    fn test_context_serialization() {
        let json = serde_json::to_string(&Context::CardDraw).unwrap();
        assert_eq!(json, "\"cardDraw\"");
        assert_eq!(Context::Astrology.to_string(), "astrology");
    }
}
