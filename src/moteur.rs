// src/moteur.rs
//
// Poignée explicite du moteur (pas d’état global).
// - initialiser : catalogue d’unités + taux + définitions globales, depuis une SourceDonnees
// - evaluer     : texte -> texte annoté (seules les erreurs de syntaxe échouent)
// - refresh_rates : échange atomique des taux, sûr pendant les évaluations
//
// Partagé entre threads (Arc<Moteur>) : chaque évaluation capture son propre instantané.

use std::collections::HashMap;

use crate::noyau::erreurs::{ErreurInitialisation, ErreurSyntaxe, Journal};
use crate::noyau::eval::{self, Calcul, Contexte};
use crate::noyau::expr::Expr;
use crate::noyau::format::formater_avec;
use crate::noyau::options::{OptionsEvaluation, OptionsImpression};
use crate::noyau::rpn::{parse, Noms};
use crate::noyau::unites::{Registre, TableTaux, VueRegistre};

/// Fournisseur des données de base (taux de change, définitions globales).
/// Les implémentations peuvent faire des E/S ; le moteur n’en fait aucune ensuite.
pub trait SourceDonnees {
    fn taux(&self) -> Result<TableTaux, ErreurInitialisation>;

    /// Définitions `nom = expression` (texte), visibles de toutes les évaluations.
    fn definitions(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Source en mémoire (tests, configurations figées).
#[derive(Clone, Debug, Default)]
pub struct SourceStatique {
    taux: Option<TableTaux>,
    definitions: Vec<(String, String)>,
}

impl SourceStatique {
    pub fn nouvelle(taux: TableTaux) -> Self {
        Self {
            taux: Some(taux),
            definitions: Vec::new(),
        }
    }

    pub fn avec_definition(mut self, nom: impl Into<String>, texte: impl Into<String>) -> Self {
        self.definitions.push((nom.into(), texte.into()));
        self
    }
}

impl SourceDonnees for SourceStatique {
    fn taux(&self) -> Result<TableTaux, ErreurInitialisation> {
        self.taux
            .clone()
            .ok_or_else(|| ErreurInitialisation::DonneesManquantes("taux de change".into()))
    }

    fn definitions(&self) -> Vec<(String, String)> {
        self.definitions.clone()
    }
}

/// Noms visibles pendant la lecture des définitions globales.
struct NomsGlobaux<'a> {
    vue: &'a VueRegistre<'a>,
    globales: &'a HashMap<String, Expr>,
}

impl Noms for NomsGlobaux<'_> {
    fn est_variable(&self, nom: &str) -> bool {
        self.globales.contains_key(nom)
    }

    fn est_unite(&self, nom: &str) -> bool {
        self.vue.est_unite(nom)
    }
}

fn nom_valide(nom: &str) -> bool {
    let mut c = nom.chars();
    c.next().is_some_and(|p| p.is_alphabetic() || p == '_')
        && c.all(|x| x.is_alphanumeric() || x == '_')
}

#[derive(Debug)]
pub struct Moteur {
    registre: Registre,
    globales: HashMap<String, Expr>,
}

impl Moteur {
    #[tracing::instrument(level = "info", skip(source))]
    pub fn initialiser(source: &dyn SourceDonnees) -> Result<Self, ErreurInitialisation> {
        let registre = Registre::nouveau(source.taux()?)?;
        let mut globales = HashMap::new();

        for (nom, texte) in source.definitions() {
            if !nom_valide(&nom) {
                return Err(ErreurInitialisation::DefinitionInvalide {
                    source: ErreurSyntaxe::new(0, format!("nom invalide: {nom}")),
                    nom,
                });
            }
            let vue = registre.vue();
            let noms = NomsGlobaux {
                vue: &vue,
                globales: &globales,
            };
            let expr = match parse(&texte, &noms) {
                Ok(e) => e,
                Err(source) => return Err(ErreurInitialisation::DefinitionInvalide { nom, source }),
            };
            tracing::debug!(nom = %nom, expr = %expr, "définition globale");
            globales.insert(nom, expr);
        }

        tracing::info!(definitions = globales.len(), "moteur initialisé");
        Ok(Self { registre, globales })
    }

    /// Contexte neuf pour UNE évaluation (instantané des taux capturé ici).
    pub fn contexte(&self, options: OptionsEvaluation) -> Contexte<'_> {
        Contexte::nouveau(self.registre.vue(), &self.globales, options)
    }

    /// Lecture seule (aucune évaluation).
    pub fn parse(&self, texte: &str) -> Result<Expr, ErreurSyntaxe> {
        let vue = self.registre.vue();
        let noms = NomsGlobaux {
            vue: &vue,
            globales: &self.globales,
        };
        parse(texte, &noms)
    }

    pub fn calculer(
        &self,
        texte: &str,
        options: OptionsEvaluation,
    ) -> Result<Calcul, ErreurSyntaxe> {
        let mut ctx = self.contexte(options);
        eval::calculer(texte, &mut ctx)
    }

    /// Texte -> texte. Les avertissements visibles sont ajoutés entre crochets.
    #[tracing::instrument(level = "debug", skip(self, options))]
    pub fn evaluer(
        &self,
        texte: &str,
        options: &OptionsImpression,
        delai_ms: u64,
    ) -> Result<String, ErreurSyntaxe> {
        let calcul = self.calculer(texte, OptionsEvaluation::depuis_impression(options, delai_ms))?;
        Ok(Self::rendre(&calcul, options))
    }

    /// Rendu d’un calcul + annotations : "indéfini [division par zéro]".
    pub fn rendre(calcul: &Calcul, options: &OptionsImpression) -> String {
        let mut journal = Journal::default();
        for a in &calcul.avertissements {
            journal.signaler(a.clone());
        }

        let texte = formater_avec(&calcul.expr, options, &mut journal);
        let notes: Vec<String> = journal
            .entrees()
            .iter()
            .filter(|a| a.est_annotation())
            .map(ToString::to_string)
            .collect();

        match (texte, notes.is_empty()) {
            (Ok(t), true) => t,
            (Ok(t), false) => format!("{t} [{}]", notes.join("; ")),
            (Err(e), true) => e.to_string(),
            // non imprimable : seules les annotations restent
            (Err(_), false) => format!("[{}]", notes.join("; ")),
        }
    }

    pub fn refresh_rates(&self, taux: TableTaux) -> Result<(), ErreurInitialisation> {
        self.registre.refresh_rates(taux)
    }

    pub fn registre(&self) -> &Registre {
        &self.registre
    }
}
