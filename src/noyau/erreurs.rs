// src/noyau/erreurs.rs
//
// Taxonomie des erreurs du noyau.
// - Fatales (canal distinct) : ErreurSyntaxe, ErreurInitialisation
// - Locales (jamais fatales) : ErreurNombre, ErreurUnite -> deviennent des Avertissement
//   attachés au résultat (le moteur préfère toujours rendre *quelque chose*).

use std::fmt;

use thiserror::Error;

/// Entrée mal formée. `position` = index (en caractères) du jeton fautif.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("erreur de syntaxe (position {position}) : {message}")]
pub struct ErreurSyntaxe {
    pub position: usize,
    pub message: String,
}

impl ErreurSyntaxe {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErreurNombre {
    #[error("division par zéro")]
    DivisionParZero,

    #[error("hors domaine : {0}")]
    HorsDomaine(&'static str),

    #[error("résultat trop grand")]
    Depassement,

    /// Intervalle trop large pour trancher (ex: diviseur approché qui contient 0).
    #[error("précision insuffisante")]
    Imprecis,

    #[error("calcul interrompu (délai dépassé)")]
    Interrompu,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErreurUnite {
    #[error("dimensions incompatibles : {de} et {vers}")]
    DimensionIncompatible { de: String, vers: String },

    #[error("unité inconnue : {0}")]
    UniteInconnue(String),

    /// Exposant d’unité démesuré, ou échéance atteinte pendant le calcul du facteur.
    #[error(transparent)]
    Calcul(#[from] ErreurNombre),
}

#[derive(Debug, Error)]
pub enum ErreurInitialisation {
    #[error("données de base indisponibles : {0}")]
    DonneesManquantes(String),

    #[error("taux de change invalide pour {0}")]
    TauxInvalide(String),

    #[error("définition invalide `{nom}`")]
    DefinitionInvalide {
        nom: String,
        #[source]
        source: ErreurSyntaxe,
    },
}

/// Le résultat ne peut pas être rendu (ex: indéfini avec `autoriser_non_utilisable = false`).
/// L’appelant substitue son propre texte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("résultat non imprimable")]
pub struct NonImprimable;

/// Avertissements accumulés pendant un calcul (annotations, jamais des échecs).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Avertissement {
    EcheanceDepassee,
    DivisionParZero,
    DimensionIncompatible(String),
    NonUtilisable(String),
    Approximation,
    SerieInfinie,
    TauxPerimes,
    SimplificationBornee,
}

impl Avertissement {
    /// Annotation visible dans le texte rendu.
    /// Approximation / série infinie sont déjà visibles dans le nombre lui-même.
    pub fn est_annotation(&self) -> bool {
        !matches!(self, Avertissement::Approximation | Avertissement::SerieInfinie)
    }
}

impl fmt::Display for Avertissement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Avertissement::EcheanceDepassee => write!(f, "délai dépassé, résultat partiel"),
            Avertissement::DivisionParZero => write!(f, "division par zéro"),
            Avertissement::DimensionIncompatible(m) => write!(f, "dimensions incompatibles ({m})"),
            Avertissement::NonUtilisable(m) => write!(f, "non utilisable ({m})"),
            Avertissement::Approximation => write!(f, "arithmétique approchée"),
            Avertissement::SerieInfinie => write!(f, "développement décimal infini"),
            Avertissement::TauxPerimes => write!(f, "taux de change périmés"),
            Avertissement::SimplificationBornee => write!(f, "simplification bornée"),
        }
    }
}

/// Journal d’un calcul : avertissements (dédupliqués, ordre d’arrivée conservé)
/// et preuves des réécritures remarquables (ex: "sin(π/6) = 1/2").
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entrees: Vec<Avertissement>,
    preuves: Vec<String>,
}

impl Journal {
    pub fn signaler(&mut self, a: Avertissement) {
        if !self.entrees.contains(&a) {
            self.entrees.push(a);
        }
    }

    pub fn contient(&self, a: &Avertissement) -> bool {
        self.entrees.contains(a)
    }

    pub fn entrees(&self) -> &[Avertissement] {
        &self.entrees
    }

    pub fn into_vec(self) -> Vec<Avertissement> {
        self.entrees
    }

    pub fn noter_preuve(&mut self, p: String) {
        if !self.preuves.contains(&p) {
            self.preuves.push(p);
        }
    }

    pub fn preuves(&self) -> &[String] {
        &self.preuves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_deduplique() {
        let mut j = Journal::default();
        j.signaler(Avertissement::TauxPerimes);
        j.signaler(Avertissement::DivisionParZero);
        j.signaler(Avertissement::TauxPerimes);
        assert_eq!(
            j.entrees(),
            &[Avertissement::TauxPerimes, Avertissement::DivisionParZero]
        );
        j.noter_preuve("sin(π/6) = 1/2".into());
        j.noter_preuve("sin(π/6) = 1/2".into());
        assert_eq!(j.preuves().len(), 1);
    }

    #[test]
    fn annotations_visibles() {
        assert!(Avertissement::EcheanceDepassee.est_annotation());
        assert!(!Avertissement::Approximation.est_annotation());
        assert_eq!(
            Avertissement::NonUtilisable("tan(π/2)".into()).to_string(),
            "non utilisable (tan(π/2))"
        );
    }
}
