//! Noyau exact Q-pur
//!
//! Organisation interne :
//! - jetons.rs   : tokenisation (positions en caractères)
//! - rpn.rs      : shunting-yard + construction Expr
//! - expr.rs     : arbre (Somme/Produit/Puissance/Conversion, fonctions, unités)
//! - nombre.rs   : Nombre exact (Q) ou approché (intervalle certifié)
//! - lecture.rs  : noyaux approchés (π, √, exp, ln, trig) en virgule fixe
//! - canon.rs    : simplify (point fixe borné, ordre déterministe)
//! - trig.rs     : angles spéciaux + indéfini
//! - unites.rs   : dimensions, catalogue, taux de change (instantanés)
//! - echeance.rs : délai coopératif
//! - eval.rs     : pipeline complet
//! - format.rs   : rendu texte selon les options
//! - options.rs  : options d’impression / d’évaluation
//! - erreurs.rs  : erreurs typées + avertissements

pub mod canon;
pub mod echeance;
pub mod erreurs;
pub mod eval;
pub mod expr;
pub mod format;
pub mod jetons;
pub mod lecture;
pub mod nombre;
pub mod options;
pub mod rpn;
pub mod trig;
pub mod unites;

#[cfg(test)]
mod tests_scientifiques;

#[cfg(test)]
mod tests_fuzz_safe;

#[cfg(test)]
mod proptests;

// API publique minimale
pub use canon::simplify;
pub use erreurs::{
    Avertissement, ErreurInitialisation, ErreurNombre, ErreurSyntaxe, ErreurUnite, NonImprimable,
};
pub use eval::{calculer, evaluer, Calcul, Contexte, Demarche};
pub use expr::{Constante, Expr, Fonction, Operateur};
pub use format::formater;
pub use nombre::{Intervalle, Nombre};
pub use options::{
    ModeApproximation, ModeFraction, OptionsEvaluation, OptionsImpression, StyleSignes,
};
pub use rpn::parse;
pub use unites::{Dimension, Registre, TableTaux, VueRegistre};
