// src/noyau/echeance.rs
//
// Échéance coopérative : l’évaluateur la sonde (un appel = un pas),
// rien n’est préempté. Une fois dépassée, elle le reste.

use std::cell::Cell;
use std::time::{Duration, Instant};

use super::erreurs::ErreurNombre;

#[derive(Debug)]
pub struct Echeance {
    debut: Instant,
    limite: Option<Instant>,
    pas: Cell<u64>,
    pas_max: Option<u64>,
    depassee: Cell<bool>,
}

impl Echeance {
    pub fn nouvelle(delai: Duration) -> Self {
        let debut = Instant::now();
        Self {
            debut,
            limite: debut.checked_add(delai),
            pas: Cell::new(0),
            pas_max: None,
            depassee: Cell::new(false),
        }
    }

    pub fn illimitee() -> Self {
        Self {
            debut: Instant::now(),
            limite: None,
            pas: Cell::new(0),
            pas_max: None,
            depassee: Cell::new(false),
        }
    }

    /// Budget de pas déterministe (en plus du temps).
    pub fn avec_pas_max(mut self, pas_max: Option<u64>) -> Self {
        self.pas_max = pas_max;
        self
    }

    /// Un point de sondage.
    pub fn verifier(&self) -> Result<(), ErreurNombre> {
        if self.depassee.get() {
            return Err(ErreurNombre::Interrompu);
        }

        let n = self.pas.get() + 1;
        self.pas.set(n);

        let hors_pas = self.pas_max.is_some_and(|max| n > max);
        let hors_temps = self.limite.is_some_and(|l| Instant::now() >= l);

        if hors_pas || hors_temps {
            tracing::debug!(pas = n, ecoule = ?self.debut.elapsed(), "échéance atteinte");
            self.depassee.set(true);
            return Err(ErreurNombre::Interrompu);
        }
        Ok(())
    }

    pub fn depassee(&self) -> bool {
        self.depassee.get()
    }

    pub fn pas(&self) -> u64 {
        self.pas.get()
    }

    pub fn ecoule(&self) -> Duration {
        self.debut.elapsed()
    }
}
