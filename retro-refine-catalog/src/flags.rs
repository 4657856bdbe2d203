//! Release-status flag detection.
//!
//! Each [`FlagRule`] is an independent predicate over the *whole* file name.
//! [`detect_flags`] evaluates them in [`FlagRule::ORDERED`] order:
//!
//! 1. `Bios`: `[BIOS]`, `(BIOS)`, or a leading `_` (metadata files)
//! 2. `Status(Beta)`: `(Beta…)`
//! 3. `Status(Proto)`: `(Proto…)`, `(Prototype)`
//! 4. `Status(Demo)`: demo, sample, kiosk and promo wording
//! 5. `Rerelease`: virtual-console, mini-console, anniversary and
//!    collection re-releases
//! 6. `Compilation`: `N-in-1`, multi-packs, `A + B + C`, `1 & 2`, lock-on
//! 7. `Unlicensed`: `(Unl)`, `(Pirate)`, `(Aftermarket)`, `(Homebrew)`
//! 8. `Translation`: translation credits such as `[T-En by X]`
//! 9. `Hack`: hack and patch wording
//!
//! Alternations list longer words first so `Prototype` is consumed before
//! `Proto` can match a prefix of it.

use std::sync::LazyLock;

use regex::Regex;
use retro_refine_core::{OriginKind, ReleaseFlags};

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($regex).expect("invalid flag pattern"));
    };
}

regex!(BIOS_RE, r"(?i)^_|\[BIOS\]|\(BIOS\)");
regex!(BETA_RE, r"(?i)\(Beta\b[^)]*\)");
regex!(PROTO_RE, r"(?i)\((?:Prototype|Proto)\b[^)]*\)");
regex!(
    DEMO_RE,
    r"(?i)\((?:Movie Promo|Demo|Sample|Kiosk|Promo)\b[^)]*\)|Taikenban|Caravan|Present Campaign|Senyou Cartridge"
);
regex!(
    RERELEASE_RE,
    r"(?i)Wii Virtual Console|Virtual Console|Switch Online|Classic Mini|Mega Drive Mini|Genesis Mini|Sega Channel|SegaNet|Sega 3D Classics|Sega Smash Pack|Sega Game Toshokan|Game no Kanzume|Anniversary Collection|Anniversary\)|Collection\)|Konami Collector|Retro-Bit|Evercade|iam8bit|Capcom Town|Arcade Legends|GameCube Edition|GameCube\)|\(LodgeNet\)|\(Arcade\)|\(NP\)|\(e-Reader\)|\(FamicomBox\)"
);
regex!(
    COMPILATION_RE,
    r"(?i)\b\d+[ -]?in[ -]?1\b|\d+ Super Jogos|^\d+-Pak|^2 Games in (?:1|One)|^Combo Pack|^2 Game Pack|Double Pack|Twin Pack|Compilation|Competition Cartridge|Classics\)|Lock-on Combination|\+ .+ \+|\+ [^(]+\(|\b\d & \d\b"
);
regex!(UNLICENSED_RE, r"(?i)\((?:Unlicensed|Unl|Pirate|Aftermarket|Homebrew)\)");
regex!(
    TRANSLATION_RE,
    r"(?i)\[T[-+]En[^\]]*\]|\(Translated En[^)]*\)"
);
regex!(
    HACK_RE,
    r"(?i)\[Hack\b[^\]]*\]|\[Add by|\[FastROM|\[Bugfix|patch\]|Edition\]|\[Retranslated\]|GBA Script"
);

/// The status markers that share the `Status` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Beta,
    Proto,
    Demo,
}

/// One flag predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagRule {
    Bios,
    Status(Status),
    Rerelease,
    Compilation,
    Unlicensed,
    Translation,
    Hack,
}

impl FlagRule {
    /// Evaluation order used by [`detect_flags`].
    pub const ORDERED: [FlagRule; 9] = [
        FlagRule::Bios,
        FlagRule::Status(Status::Beta),
        FlagRule::Status(Status::Proto),
        FlagRule::Status(Status::Demo),
        FlagRule::Rerelease,
        FlagRule::Compilation,
        FlagRule::Unlicensed,
        FlagRule::Translation,
        FlagRule::Hack,
    ];

    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Bios => &BIOS_RE,
            Self::Status(Status::Beta) => &BETA_RE,
            Self::Status(Status::Proto) => &PROTO_RE,
            Self::Status(Status::Demo) => &DEMO_RE,
            Self::Rerelease => &RERELEASE_RE,
            Self::Compilation => &COMPILATION_RE,
            Self::Unlicensed => &UNLICENSED_RE,
            Self::Translation => &TRANSLATION_RE,
            Self::Hack => &HACK_RE,
        }
    }

    /// Whether this rule fires for a whole file name.
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern().is_match(file_name)
    }

    fn set(&self, flags: &mut ReleaseFlags) {
        match self {
            Self::Bios => flags.bios = true,
            Self::Status(Status::Beta) => flags.beta = true,
            Self::Status(Status::Proto) => flags.proto = true,
            Self::Status(Status::Demo) => flags.demo = true,
            Self::Rerelease => flags.rerelease = true,
            Self::Compilation => flags.compilation = true,
            Self::Unlicensed => flags.unlicensed = true,
            Self::Translation => flags.translation = true,
            Self::Hack => flags.hack = true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bios => "bios",
            Self::Status(Status::Beta) => "beta",
            Self::Status(Status::Proto) => "prototype",
            Self::Status(Status::Demo) => "demo",
            Self::Rerelease => "rerelease",
            Self::Compilation => "compilation",
            Self::Unlicensed => "unlicensed",
            Self::Translation => "translation",
            Self::Hack => "hack",
        }
    }
}

/// Run every rule against `file_name`.
///
/// Candidates that come from a fan-translation source are translations even
/// when their name carries no credit tag.
pub fn detect_flags(file_name: &str, origin: OriginKind) -> ReleaseFlags {
    let mut flags = ReleaseFlags::default();
    for rule in FlagRule::ORDERED {
        if rule.matches(file_name) {
            rule.set(&mut flags);
        }
    }
    if origin == OriginKind::FanTranslation {
        flags.translation = true;
    }
    flags
}

#[cfg(test)]
#[path = "tests/flags_tests.rs"]
mod tests;
