//! Particle-identity hypotheses
//!
//! A hypothesis fixes the mass and the charge sign used to seed one swim and
//! selects the probability tables used to score it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Long-lived charged particle species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticleKind {
    /// e
    Electron,
    /// μ
    Muon,
    /// π
    Pion,
    /// K
    Kaon,
    /// p
    Proton,
    /// d
    Deuteron,
}

impl ParticleKind {
    /// Every species, lightest first
    pub const ALL: [ParticleKind; 6] = [
        ParticleKind::Electron,
        ParticleKind::Muon,
        ParticleKind::Pion,
        ParticleKind::Kaon,
        ParticleKind::Proton,
        ParticleKind::Deuteron,
    ];

    /// Rest mass (GeV/c²)
    pub fn mass(self) -> f64 {
        match self {
            ParticleKind::Electron => 0.000_510_998_95,
            ParticleKind::Muon => 0.105_658_375_5,
            ParticleKind::Pion => 0.139_570_39,
            ParticleKind::Kaon => 0.493_677,
            ParticleKind::Proton => 0.938_272_088,
            ParticleKind::Deuteron => 1.875_612_94,
        }
    }

    /// Unsigned PDG code of the particle
    pub fn pdg_code(self) -> i32 {
        match self {
            ParticleKind::Electron => 11,
            ParticleKind::Muon => 13,
            ParticleKind::Pion => 211,
            ParticleKind::Kaon => 321,
            ParticleKind::Proton => 2212,
            ParticleKind::Deuteron => 1_000_010_020,
        }
    }

    /// Whether the positive PDG code denotes the negative particle
    fn is_lepton(self) -> bool {
        matches!(self, ParticleKind::Electron | ParticleKind::Muon)
    }

    /// Short lowercase name, used as the key of PDF tables
    pub fn name(self) -> &'static str {
        match self {
            ParticleKind::Electron => "electron",
            ParticleKind::Muon => "muon",
            ParticleKind::Pion => "pion",
            ParticleKind::Kaon => "kaon",
            ParticleKind::Proton => "proton",
            ParticleKind::Deuteron => "deuteron",
        }
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One identity assumption for a track: species and charge sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Assumed species
    pub kind: ParticleKind,
    /// Charge in units of e (±1)
    pub charge: i8,
}

impl Hypothesis {
    /// Create a new hypothesis
    pub fn new(kind: ParticleKind, charge: i8) -> Self {
        Self { kind, charge }
    }

    /// All species with the given charge
    pub fn all_with_charge(charge: i8) -> Vec<Hypothesis> {
        ParticleKind::ALL
            .iter()
            .map(|&kind| Hypothesis::new(kind, charge))
            .collect()
    }

    /// Rest mass (GeV/c²)
    #[inline]
    pub fn mass(&self) -> f64 {
        self.kind.mass()
    }

    /// Signed PDG code (negative leptons carry the positive code)
    pub fn pdg_code(&self) -> i32 {
        let code = self.kind.pdg_code() * i32::from(self.charge.signum());
        if self.kind.is_lepton() {
            -code
        } else {
            code
        }
    }

    /// Whether this hypothesis has the same charge sign as `charge`
    #[inline]
    pub fn matches_charge(&self, charge: i8) -> bool {
        self.charge.signum() == charge.signum() && charge != 0
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.charge >= 0 { '+' } else { '-' };
        write!(f, "{}{}", self.kind, sign)
    }
}
