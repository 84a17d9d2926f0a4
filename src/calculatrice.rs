// src/calculatrice.rs
//
// Enveloppe asynchrone du moteur.
// - un sémaphore borne le nombre d’évaluations simultanées
// - le travail (CPU pur) tourne sur spawn_blocking
// - délai dur : échéance coopérative + marge, au-delà on abandonne la tâche
//
// Le résultat est TOUJOURS un texte ; une erreur de syntaxe commence par "erreur: ".

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::moteur::Moteur;
use crate::noyau::options::{OptionsImpression, DELAI_DEFAUT_MS};

/// Marge laissée à l’échéance coopérative avant l’abandon dur.
const MARGE_MS: u64 = 500;

/// Préfixe des erreurs (jamais confondu avec une valeur).
pub const PREFIXE_ERREUR: &str = "erreur: ";

pub struct Calculatrice {
    moteur: Arc<Moteur>,
    permis: Semaphore,
    options: OptionsImpression,
    delai_ms: u64,
}

impl Calculatrice {
    pub fn nouvelle(moteur: Arc<Moteur>, max_simultanes: usize) -> Self {
        Self {
            moteur,
            permis: Semaphore::new(max_simultanes.max(1)),
            options: OptionsImpression::default(),
            delai_ms: DELAI_DEFAUT_MS,
        }
    }

    pub fn avec_options(mut self, options: OptionsImpression, delai_ms: u64) -> Self {
        self.options = options;
        self.delai_ms = delai_ms;
        self
    }

    pub fn moteur(&self) -> &Arc<Moteur> {
        &self.moteur
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn calculer(&self, requete: String) -> String {
        let Ok(_permis) = self.permis.acquire().await else {
            return format!("{PREFIXE_ERREUR}calculatrice fermée");
        };

        let moteur = Arc::clone(&self.moteur);
        let options = self.options.clone();
        let delai_ms = self.delai_ms;
        let tache = tokio::task::spawn_blocking(move || moteur.evaluer(&requete, &options, delai_ms));

        let dur = Duration::from_millis(delai_ms.saturating_add(MARGE_MS));
        match tokio::time::timeout(dur, tache).await {
            Ok(Ok(Ok(texte))) => texte,
            Ok(Ok(Err(e))) => format!("{PREFIXE_ERREUR}{} (position {})", e.message, e.position),
            Ok(Err(e)) => {
                tracing::error!(erreur = %e, "tâche d’évaluation perdue");
                format!("{PREFIXE_ERREUR}évaluation interrompue")
            }
            Err(_) => {
                // la tâche bloquante continue seule ; son résultat sera ignoré
                tracing::warn!(delai_ms, "délai dur dépassé, tâche abandonnée");
                format!("{PREFIXE_ERREUR}délai dépassé")
            }
        }
    }

    /// Permis libres (tests, supervision).
    pub fn permis_disponibles(&self) -> usize {
        self.permis.available_permits()
    }

    /// Plus aucune requête acceptée ; celles en cours terminent.
    pub fn fermer(&self) {
        self.permis.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moteur::SourceStatique;
    use crate::noyau::unites::TableTaux;
    use num_bigint::BigInt;
    use num_rational::BigRational;
    use pretty_assertions::assert_eq;
    use std::time::SystemTime;

    fn calculatrice(max: usize) -> Calculatrice {
        let taux = TableTaux::nouvelle("EUR", SystemTime::now())
            .avec("USD", BigRational::new(BigInt::from(108), BigInt::from(100)));
        let moteur = Moteur::initialiser(&SourceStatique::nouvelle(taux)).unwrap();
        Calculatrice::nouvelle(Arc::new(moteur), max)
    }

    #[tokio::test]
    async fn requetes_simples() {
        let c = calculatrice(1);
        assert_eq!(c.calculer("2 + 2".into()).await, "4");
        assert_eq!(c.calculer("1/3".into()).await, "0.333333333333…");
        assert_eq!(c.permis_disponibles(), 1);
    }

    #[tokio::test]
    async fn erreur_prefixee() {
        let c = calculatrice(1);
        let t = c.calculer("2 + * 3".into()).await;
        assert!(t.starts_with(PREFIXE_ERREUR), "{t}");
        assert!(t.contains("position 4"), "{t}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrence_bornee() {
        let c = Arc::new(calculatrice(2));
        let mut taches = Vec::new();
        for k in 0..8 {
            let c = Arc::clone(&c);
            taches.push(tokio::spawn(async move {
                c.calculer(format!("{k} + 1")).await
            }));
        }
        for (k, t) in taches.into_iter().enumerate() {
            assert_eq!(t.await.unwrap(), (k + 1).to_string());
        }
        assert_eq!(c.permis_disponibles(), 2);
    }

    #[tokio::test]
    async fn echeance_cooperative() {
        crate::test_utils::init_journal();
        let c = calculatrice(1).avec_options(OptionsImpression::default(), 5);
        let t = c.calculer("fact(200000) + 1".into()).await;
        assert!(t.contains("délai dépassé"), "{t}");
    }

    #[tokio::test]
    async fn delai_court_sans_abandon_dur() {
        let delai_ms = 50;
        let c = calculatrice(1).avec_options(OptionsImpression::default(), delai_ms);
        for requete in [
            "root(2, 300000)",
            "2^(10^7)",
            "1 km^3000000 to m^3000000",
            "1 N^1500000000 to N^1500000000",
        ] {
            let t0 = std::time::Instant::now();
            let t = c.calculer(requete.into()).await;
            assert!(!t.starts_with(PREFIXE_ERREUR), "{requete}: {t}");
            assert!(
                t0.elapsed() < Duration::from_millis(delai_ms + MARGE_MS),
                "{requete}: {:?}",
                t0.elapsed()
            );
        }
    }

    #[tokio::test]
    async fn fermeture() {
        let c = calculatrice(1);
        c.fermer();
        assert_eq!(c.calculer("1".into()).await, "erreur: calculatrice fermée");
    }
}
