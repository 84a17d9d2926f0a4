// src/lib.rs
//
// Calculatrice Q-pur : moteur
// ----------------------------
// Bibliothèque : texte -> résultat exact (rationnels), symbolique ou approché certifié,
// avec unités et devises.
//
// - noyau        : lecture, simplification, évaluation, rendu
// - moteur       : poignée explicite (registre d’unités/taux + définitions globales)
// - calculatrice : enveloppe asynchrone (sémaphore + délai dur)

pub mod calculatrice;
pub mod moteur;
pub mod noyau;

pub use calculatrice::Calculatrice;
pub use moteur::{Moteur, SourceDonnees, SourceStatique};
pub use noyau::{
    Avertissement, Calcul, ErreurInitialisation, ErreurSyntaxe, Expr, ModeApproximation,
    ModeFraction, OptionsEvaluation, OptionsImpression, StyleSignes, TableTaux,
};

#[cfg(test)]
pub(crate) mod test_utils {
    /// Journal visible dans les tests : `RUST_LOG=debug cargo test`.
    pub fn init_journal() {
        use tracing_subscriber::{fmt, EnvFilter};

        // déjà initialisé par un autre test : on ignore
        let _ = fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    }
}
