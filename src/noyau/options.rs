// src/noyau/options.rs
//
// Réglages d’un calcul : impression (rendu texte) et évaluation (précision, échéance).
// Valeurs par défaut et bornes dures en constantes.

use std::time::Duration;

use super::echeance::Echeance;
use super::nombre::{CHIFFRES_GARDE, PRECISION_MAX};

/// Chiffres significatifs affichés par défaut.
pub const PRECISION_DEFAUT: usize = 12;

/// Délai d’évaluation par défaut (millisecondes).
pub const DELAI_DEFAUT_MS: u64 = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StyleSignes {
    Ascii,
    #[default]
    Etendu,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModeFraction {
    /// Décimal si le développement est fini ; sinon décimal marqué (ou fraction si non marqué).
    #[default]
    Auto,
    ForcerFraction,
    ForcerDecimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModeApproximation {
    /// Les sous-arbres numériques non rationnels (√2, π, ln 3) sont approchés.
    #[default]
    Auto,
    /// Tout reste exact et symbolique.
    Desactive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionsImpression {
    pub indiquer_serie_infinie: bool,
    pub autoriser_non_utilisable: bool,
    pub style_signes: StyleSignes,
    pub point_decimal: char,
    pub mode_fraction: ModeFraction,
    pub mode_approximation: ModeApproximation,
    pub indiquer_approximation: bool,
    /// Chiffres significatifs ; lue bornée à [1, PRECISION_MAX] via `precision()`.
    pub precision: usize,
}

impl Default for OptionsImpression {
    fn default() -> Self {
        Self {
            indiquer_serie_infinie: true,
            autoriser_non_utilisable: true,
            style_signes: StyleSignes::Etendu,
            point_decimal: '.',
            mode_fraction: ModeFraction::Auto,
            mode_approximation: ModeApproximation::Auto,
            indiquer_approximation: true,
            precision: PRECISION_DEFAUT,
        }
    }
}

impl OptionsImpression {
    pub fn ascii() -> Self {
        Self {
            style_signes: StyleSignes::Ascii,
            ..Self::default()
        }
    }

    pub fn precision(&self) -> usize {
        self.precision.clamp(1, PRECISION_MAX)
    }

    /// Bornée à [1, PRECISION_MAX].
    pub fn avec_precision(mut self, chiffres: usize) -> Self {
        self.precision = chiffres.clamp(1, PRECISION_MAX);
        self
    }
}

/// Réglages de l’évaluateur, dérivés des options d’impression + délai.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionsEvaluation {
    /// Chiffres de travail (précision affichée + garde).
    pub chiffres: usize,
    pub mode_approximation: ModeApproximation,
    pub delai: Duration,
    /// Budget de pas déterministe (tests) ; None = temps seul.
    pub pas_max: Option<u64>,
}

impl Default for OptionsEvaluation {
    fn default() -> Self {
        Self::depuis_impression(&OptionsImpression::default(), DELAI_DEFAUT_MS)
    }
}

impl OptionsEvaluation {
    pub fn depuis_impression(o: &OptionsImpression, delai_ms: u64) -> Self {
        Self {
            chiffres: (o.precision() + CHIFFRES_GARDE).min(PRECISION_MAX),
            mode_approximation: o.mode_approximation,
            delai: Duration::from_millis(delai_ms),
            pas_max: None,
        }
    }

    pub fn avec_pas_max(mut self, pas_max: u64) -> Self {
        self.pas_max = Some(pas_max);
        self
    }

    pub fn echeance(&self) -> Echeance {
        Echeance::nouvelle(self.delai).avec_pas_max(self.pas_max)
    }
}
