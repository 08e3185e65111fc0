//! VPK file naming
//!
//! Directory and pack files follow a fixed suffix grammar:
//!
//! - `<locale?><stem>_dir.vpk` for the directory file
//! - `<stem>_<NNN>.vpk` for pack file `NNN`
//!
//! Respawn stores use `<target>_<level>.bsp.pak000` as the stem, with the
//! locale only on the directory file (`englishclient_mp_rr_box.bsp.pak000_dir.vpk`
//! pairs with `client_mp_rr_box.bsp.pak000_000.vpk`).

use super::PACKFILEPATCH_MAX;

/// Locales a directory file name may be prefixed with
pub const LANGUAGE_NAMES: [&str; 11] = [
    "english", "french", "german", "italian", "japanese", "polish", "russian", "spanish",
    "schinese", "tchinese", "korean",
];

/// Game DLL targets a store can be built for
pub const STORE_TARGETS: [&str; 2] = ["server", "client"];

/// Suffix of the level part of a Respawn stem
const LEVEL_SUFFIX: &str = ".bsp.pak000";

/// Whether a parsed name refers to the directory file or a pack file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpkFileKind {
    Directory,
    Pack(u16),
}

/// A parsed VPK file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpkFileName {
    /// Locale prefix (directory files only)
    pub locale: Option<String>,
    /// Everything between the locale and the `_dir` / `_NNN` suffix
    pub stem: String,
    pub kind: VpkFileKind,
}

impl VpkFileName {
    /// Parse an unqualified file name, or the file name part of a path
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let file_name = file_name.rsplit(['/', '\\']).next()?;
        let rest = file_name.strip_suffix(".vpk")?;

        let (stem, kind) = if let Some(stem) = rest.strip_suffix("_dir") {
            (stem, VpkFileKind::Directory)
        } else {
            let (stem, index) = rest.rsplit_once('_')?;
            if index.len() != 3 || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let index: u16 = index.parse().ok()?;
            (stem, VpkFileKind::Pack(index))
        };

        if stem.is_empty() {
            return None;
        }

        let (locale, stem) = match split_locale(stem) {
            Some((locale, stem)) => (Some(locale.to_string()), stem),
            None => (None, stem),
        };

        Some(Self {
            locale,
            stem: stem.to_string(),
            kind,
        })
    }

    /// Directory file name for this store, keeping the locale if there is one
    #[must_use]
    pub fn dir_file_name(&self) -> String {
        format!("{}{}_dir.vpk", self.locale.as_deref().unwrap_or(""), self.stem)
    }

    /// Directory file name for this store in the given locale
    #[must_use]
    pub fn dir_file_name_for_locale(&self, locale: &str) -> String {
        format!("{locale}{}_dir.vpk", self.stem)
    }

    /// Pack file name for the given index (pack files never carry a locale)
    #[must_use]
    pub fn pack_file_name(&self, index: u16) -> String {
        format!("{}_{index:03}.vpk", self.stem)
    }

    /// Name identifying the store, e.g. `englishclient_mp_rr_box`
    #[must_use]
    pub fn base_name(&self) -> String {
        let stem = self.stem.strip_suffix(LEVEL_SUFFIX).unwrap_or(&self.stem);
        format!("{}{stem}", self.locale.as_deref().unwrap_or(""))
    }
}

/// Split a known locale off the front of a stem. The locale only counts when
/// it is directly followed by a known target.
fn split_locale(stem: &str) -> Option<(&str, &str)> {
    LANGUAGE_NAMES.into_iter().find_map(|locale| {
        let rest = stem.strip_prefix(locale)?;
        STORE_TARGETS
            .iter()
            .any(|target| rest.starts_with(target))
            .then_some((locale, rest))
    })
}

/// Directory and pack file names for a store being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpkPair {
    pub pack_name: String,
    pub dir_name: String,
    pub locale: String,
    pub target: String,
    pub level: String,
    /// Pack file index the store gets written to
    pub patch: u16,
}

impl VpkPair {
    /// Build the file names for a store. Unsupported locales and targets fall
    /// back to the defaults; the patch index is clamped below
    /// [`PACKFILEPATCH_MAX`].
    #[must_use]
    pub fn new(locale: &str, target: &str, level: &str, patch: u16) -> Self {
        let locale = if LANGUAGE_NAMES.contains(&locale) {
            locale
        } else {
            tracing::warn!(
                "Locale '{locale}' not supported; using default '{}'",
                LANGUAGE_NAMES[0]
            );
            LANGUAGE_NAMES[0]
        };

        let target = if STORE_TARGETS.contains(&target) {
            target
        } else {
            tracing::warn!(
                "Target '{target}' not supported; using default '{}'",
                STORE_TARGETS[0]
            );
            STORE_TARGETS[0]
        };

        let patch = if patch < PACKFILEPATCH_MAX {
            patch
        } else {
            tracing::warn!(
                "Patch index {patch} out of range; using {}",
                PACKFILEPATCH_MAX - 1
            );
            PACKFILEPATCH_MAX - 1
        };

        Self {
            pack_name: format!("{target}_{level}{LEVEL_SUFFIX}_{patch:03}.vpk"),
            dir_name: format!("{locale}{target}_{level}{LEVEL_SUFFIX}_dir.vpk"),
            locale: locale.to_string(),
            target: target.to_string(),
            level: level.to_string(),
            patch,
        }
    }

    /// Name identifying the store, e.g. `englishclient_mp_rr_box`
    #[must_use]
    pub fn base_name(&self) -> String {
        format!("{}{}_{}", self.locale, self.target, self.level)
    }
}
