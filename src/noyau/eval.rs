//! Noyau : évaluation (pipeline réel)
//!
//! texte -> jetons -> RPN -> Expr (rpn.rs), puis ici :
//!   substitution des variables -> simplify -> unités (sommes, conversions `to`)
//!   -> re-simplify -> approximation des sous-arbres non exacts (mode Auto) -> re-simplify
//!
//! L’échéance est sondée à chaque noeud visité (et dans les boucles longues) ;
//! à expiration, on rend l’arbre partiel, marqué `EcheanceDepassee`. Jamais d’échec dur.

use std::collections::HashMap;

use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::canon::{reconstruire, simplifier_avec};
use super::echeance::Echeance;
use super::erreurs::{Avertissement, ErreurNombre, ErreurSyntaxe, ErreurUnite, Journal};
use super::expr::{Constante, Expr, Fonction, Operateur};
use super::jetons::{format_tokens, Jeton, Tok};
use super::lecture;
use super::nombre::{Intervalle, Nombre};
use super::options::{ModeApproximation, OptionsEvaluation};
use super::rpn::{analyser, Noms};
use super::unites::VueRegistre;

/// Profondeur maximale de substitution (définitions qui se citent).
const PROFONDEUR_MAX: usize = 16;

/// Étapes lisibles d’un calcul.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Demarche {
    pub jetons: String,
    pub rpn: String,
    pub avant: String,
    pub apres: String,
    pub preuves: Vec<String>,
}

/// Résultat d’un calcul : arbre final + avertissements + démarche.
#[derive(Clone, Debug)]
pub struct Calcul {
    pub expr: Expr,
    pub avertissements: Vec<Avertissement>,
    pub demarche: Demarche,
}

/// État d’UNE évaluation : vue figée du registre, définitions globales (lecture seule),
/// liaisons locales, échéance et journal.
pub struct Contexte<'a> {
    registre: VueRegistre<'a>,
    globales: &'a HashMap<String, Expr>,
    liaisons: HashMap<String, Expr>,
    options: OptionsEvaluation,
    echeance: Echeance,
    journal: Journal,
}

impl<'a> Contexte<'a> {
    /// L’échéance démarre ici.
    pub fn nouveau(
        registre: VueRegistre<'a>,
        globales: &'a HashMap<String, Expr>,
        options: OptionsEvaluation,
    ) -> Self {
        let echeance = options.echeance();
        Self {
            registre,
            globales,
            liaisons: HashMap::new(),
            options,
            echeance,
            journal: Journal::default(),
        }
    }

    /// Liaison locale (prioritaire sur les définitions globales).
    pub fn lier(&mut self, nom: impl Into<String>, valeur: Expr) {
        self.liaisons.insert(nom.into(), valeur);
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn echeance(&self) -> &Echeance {
        &self.echeance
    }

    pub fn registre(&self) -> &VueRegistre<'a> {
        &self.registre
    }

    fn valeur(&self, nom: &str) -> Option<&Expr> {
        self.liaisons.get(nom).or_else(|| self.globales.get(nom))
    }

    fn noter_devise(&mut self, nom: &str) {
        let devise = self.registre.resoudre(nom).is_some_and(|u| u.monnaie);
        if devise
            && !self.journal.contient(&Avertissement::TauxPerimes)
            && self.registre.taux_perimes()
        {
            tracing::warn!(devise = nom, "taux de change périmés");
            self.journal.signaler(Avertissement::TauxPerimes);
        }
    }
}

impl Noms for Contexte<'_> {
    fn est_variable(&self, nom: &str) -> bool {
        self.valeur(nom).is_some()
    }

    fn est_unite(&self, nom: &str) -> bool {
        self.registre.est_unite(nom)
    }
}

/* ------------------------ Pipeline ------------------------ */

fn toks(jetons: &[Jeton]) -> String {
    let t: Vec<Tok> = jetons.iter().map(|j| j.tok.clone()).collect();
    format_tokens(&t)
}

/// Lecture + évaluation. Seule une erreur de syntaxe échoue ;
/// tout le reste (domaine, unités, délai) devient avertissement.
#[tracing::instrument(level = "debug", skip(ctx))]
pub fn calculer(texte: &str, ctx: &mut Contexte<'_>) -> Result<Calcul, ErreurSyntaxe> {
    if texte.trim().is_empty() {
        return Err(ErreurSyntaxe::new(0, "entrée vide"));
    }

    let analyse = analyser(texte, &*ctx)?;
    let jetons = toks(&analyse.jetons);
    let rpn = toks(&analyse.rpn);
    let avant = analyse.expr.to_string();

    let expr = evaluer(analyse.expr, ctx);

    tracing::debug!(
        pas = ctx.echeance.pas(),
        ecoule = ?ctx.echeance.ecoule(),
        resultat = %expr,
        "calcul terminé"
    );

    let demarche = Demarche {
        jetons,
        rpn,
        avant,
        apres: expr.to_string(),
        preuves: ctx.journal.preuves().to_vec(),
    };

    Ok(Calcul {
        expr,
        avertissements: ctx.journal.entrees().to_vec(),
        demarche,
    })
}

/// Évalue un arbre déjà lu. Les avertissements vont dans le journal du contexte.
pub fn evaluer(expr: Expr, ctx: &mut Contexte<'_>) -> Expr {
    let e = substituer(expr, ctx, 0);
    let e = simplifier_avec(e, &mut ctx.journal, &ctx.echeance);
    let e = unites(e, ctx);
    let mut e = simplifier_avec(e, &mut ctx.journal, &ctx.echeance);

    if ctx.options.mode_approximation == ModeApproximation::Auto && !ctx.echeance.depassee() {
        let a = approcher(e, ctx);
        e = simplifier_avec(a, &mut ctx.journal, &ctx.echeance);
    }

    if ctx.echeance.depassee() {
        tracing::warn!(
            pas = ctx.echeance.pas(),
            ecoule = ?ctx.echeance.ecoule(),
            "délai dépassé, résultat partiel"
        );
        ctx.journal.signaler(Avertissement::EcheanceDepassee);
    }
    e
}

/* ------------------------ Variables ------------------------ */

fn substituer(e: Expr, ctx: &mut Contexte<'_>, profondeur: usize) -> Expr {
    if ctx.echeance.verifier().is_err() {
        return e;
    }
    match e {
        Expr::Var(nom) => {
            let Some(v) = ctx.valeur(&nom).cloned() else {
                return Expr::Var(nom);
            };
            if profondeur >= PROFONDEUR_MAX {
                ctx.journal.signaler(Avertissement::NonUtilisable(format!(
                    "définition récursive de {nom}"
                )));
                return Expr::Var(nom);
            }
            substituer(v, ctx, profondeur + 1)
        }
        Expr::Fonction(f, args, c) => {
            let args = args
                .into_iter()
                .map(|a| substituer(a, ctx, profondeur))
                .collect();
            Expr::Fonction(f, args, c)
        }
        Expr::Op(op, xs, c) => {
            let xs = xs
                .into_iter()
                .map(|x| substituer(x, ctx, profondeur))
                .collect();
            Expr::Op(op, xs, c)
        }
        feuille => feuille,
    }
}

/* ------------------------ Unités ------------------------ */

/// valeur · Π unité^k
struct Grandeur {
    valeur: Expr,
    unites: Vec<(String, i32)>,
}

pub(crate) fn unite_simple(e: &Expr) -> Option<(String, i32)> {
    match e {
        Expr::Unite(u) => Some((u.clone(), 1)),
        Expr::Op(Operateur::Puissance, v, _) if v.len() == 2 => match (&v[0], v[1].as_rat()) {
            (Expr::Unite(u), Some(k)) if k.is_integer() => Some((u.clone(), k.numer().to_i32()?)),
            _ => None,
        },
        _ => None,
    }
}

/// None si des unités restent enfouies ailleurs (dans une fonction, une somme…).
fn grandeur(e: &Expr) -> Option<Grandeur> {
    let (valeur, unites) = match e {
        Expr::Op(Operateur::Produit, fs, _) => {
            let mut valeur = Vec::new();
            let mut unites = Vec::new();
            for f in fs {
                match unite_simple(f) {
                    Some(u) => unites.push(u),
                    None => valeur.push(f.clone()),
                }
            }
            (reconstruire(Operateur::Produit, valeur), unites)
        }
        _ => match unite_simple(e) {
            Some(u) => (Expr::entier(1), vec![u]),
            None => (e.clone(), Vec::new()),
        },
    };
    (!valeur.contient_unite()).then_some(Grandeur { valeur, unites })
}

fn unites_expr(unites: &[(String, i32)]) -> Vec<Expr> {
    unites
        .iter()
        .map(|(u, k)| {
            if *k == 1 {
                Expr::Unite(u.clone())
            } else {
                Expr::puissance(Expr::Unite(u.clone()), Expr::entier(i64::from(*k)))
            }
        })
        .collect()
}

fn unites(e: Expr, ctx: &mut Contexte<'_>) -> Expr {
    if ctx.echeance.verifier().is_err() {
        return e;
    }
    match e {
        Expr::Unite(nom) => {
            ctx.noter_devise(&nom);
            Expr::Unite(nom)
        }
        Expr::Fonction(f, args, c) => {
            let args = args.into_iter().map(|a| unites(a, ctx)).collect();
            Expr::Fonction(f, args, c)
        }
        Expr::Op(op, xs, c) => {
            let xs: Vec<Expr> = xs.into_iter().map(|x| unites(x, ctx)).collect();
            match op {
                Operateur::Somme if xs.iter().any(Expr::contient_unite) => sommer(xs, ctx),
                Operateur::Conversion => match <[Expr; 2]>::try_from(xs) {
                    Ok([a, cible]) => convertir(a, cible, ctx),
                    Err(xs) => Expr::Op(op, xs, c),
                },
                _ => Expr::Op(op, xs, c),
            }
        }
        feuille => feuille,
    }
}

/// Somme de grandeurs : tout est ramené à la plus grande unité présente
/// (1 m + 50 cm -> 1.5 m), indépendamment de l’ordre canonique des termes.
fn sommer(xs: Vec<Expr>, ctx: &mut Contexte<'_>) -> Expr {
    let Some(grandeurs) = xs.iter().map(grandeur).collect::<Option<Vec<_>>>() else {
        return Expr::somme(xs);
    };

    let mut facteurs = Vec::with_capacity(grandeurs.len());
    for g in &grandeurs {
        match ctx.registre.facteur_compose(&g.unites, &ctx.echeance) {
            Ok((dim, f, _)) => facteurs.push((dim, f)),
            Err(ErreurUnite::Calcul(ErreurNombre::Interrompu)) => return Expr::somme(xs),
            Err(e) => {
                ctx.journal.signaler(Avertissement::NonUtilisable(e.to_string()));
                return Expr::somme(xs);
            }
        }
    }

    let Some((d0, _)) = facteurs.first() else {
        return Expr::somme(xs);
    };
    if let Some((d, _)) = facteurs.iter().find(|(d, _)| d != d0) {
        ctx.journal
            .signaler(Avertissement::DimensionIncompatible(format!("{d0} et {d}")));
        return Expr::somme(xs);
    }

    let mut reference = 0;
    for (k, (_, f)) in facteurs.iter().enumerate() {
        if *f > facteurs[reference].1 {
            reference = k;
        }
    }
    let f_ref = facteurs[reference].1.clone();

    let termes = grandeurs
        .iter()
        .zip(&facteurs)
        .map(|(g, (_, f))| Expr::produit(vec![g.valeur.clone(), Expr::rat(f / &f_ref)]))
        .collect();

    let mut v = vec![Expr::somme(termes)];
    v.extend(unites_expr(&grandeurs[reference].unites));
    Expr::produit(v)
}

/// a to cible : la cible doit être une expression d’unités pure (ft, km/h, m²).
fn convertir(a: Expr, cible: Expr, ctx: &mut Contexte<'_>) -> Expr {
    let cible_unites = match grandeur(&cible) {
        Some(g) if g.valeur.est_rat(1) && !g.unites.is_empty() => g.unites,
        _ => {
            ctx.journal.signaler(Avertissement::NonUtilisable(
                "la cible de conversion n’est pas une unité".into(),
            ));
            return a;
        }
    };
    let Some(source) = grandeur(&a) else {
        ctx.journal.signaler(Avertissement::NonUtilisable(
            "conversion d’une expression composée".into(),
        ));
        return a;
    };

    let registre = &ctx.registre;
    let echeance = &ctx.echeance;
    let facteur = registre.facteur_compose(&source.unites, echeance).and_then(|(da, fa, _)| {
        let (dc, fc, _) = registre.facteur_compose(&cible_unites, echeance)?;
        if da != dc {
            return Err(ErreurUnite::DimensionIncompatible {
                de: da.to_string(),
                vers: dc.to_string(),
            });
        }
        Ok(fa / fc)
    });

    match facteur {
        Ok(k) => {
            tracing::trace!(facteur = %k, "conversion");
            let mut v = vec![source.valeur, Expr::rat(k)];
            v.extend(unites_expr(&cible_unites));
            Expr::produit(v)
        }
        Err(ErreurUnite::DimensionIncompatible { de, vers }) => {
            ctx.journal
                .signaler(Avertissement::DimensionIncompatible(format!("{de} et {vers}")));
            a
        }
        // l’échéance est signalée à la sortie de calculer
        Err(ErreurUnite::Calcul(ErreurNombre::Interrompu)) => a,
        Err(e) => {
            ctx.journal.signaler(Avertissement::NonUtilisable(e.to_string()));
            a
        }
    }
}

/* ------------------------ Approximation ------------------------ */

/// Remplace chaque sous-arbre numérique maximal non rationnel par un intervalle.
fn approcher(e: Expr, ctx: &mut Contexte<'_>) -> Expr {
    if ctx.echeance.verifier().is_err() {
        return e;
    }
    match e {
        Expr::Num(_) | Expr::Var(_) | Expr::Unite(_) | Expr::Indefini => e,
        _ if e.est_numerique() => approcher_numerique(e, ctx),
        Expr::Fonction(f, args, c) => {
            let args = args.into_iter().map(|a| approcher(a, ctx)).collect();
            Expr::Fonction(f, args, c)
        }
        Expr::Op(op, xs, c) => {
            let xs = xs.into_iter().map(|x| approcher(x, ctx)).collect();
            Expr::Op(op, xs, c)
        }
        Expr::Constante(_) => e,
    }
}

fn approcher_numerique(e: Expr, ctx: &mut Contexte<'_>) -> Expr {
    match intervalle(&e, ctx.options.chiffres, &ctx.echeance) {
        Ok(i) => {
            ctx.journal.signaler(Avertissement::Approximation);
            Expr::Num(Nombre::Approx(i))
        }
        Err(ErreurNombre::DivisionParZero) => {
            ctx.journal.signaler(Avertissement::DivisionParZero);
            Expr::Indefini
        }
        Err(ErreurNombre::HorsDomaine(m)) => {
            ctx.journal.signaler(Avertissement::NonUtilisable(m.to_string()));
            Expr::Indefini
        }
        Err(ErreurNombre::Depassement) => {
            ctx.journal
                .signaler(Avertissement::NonUtilisable("résultat trop grand".into()));
            e
        }
        // reste exact et symbolique
        Err(ErreurNombre::Imprecis | ErreurNombre::Interrompu) => e,
    }
}

/// Encadrement d’un sous-arbre numérique (mémorisé dans le cache du noeud).
pub fn intervalle(e: &Expr, chiffres: usize, echeance: &Echeance) -> Result<Intervalle, ErreurNombre> {
    echeance.verifier()?;
    if let Some(i) = e.cache().and_then(|c| c.lire(chiffres)) {
        return Ok(i);
    }

    let i = match e {
        Expr::Num(n) => return Ok(n.intervalle(chiffres)),
        Expr::Constante(Constante::Pi) => lecture::pi(chiffres, Some(echeance))?,
        Expr::Constante(Constante::E) => lecture::exp(
            &Intervalle::point(BigRational::one(), chiffres),
            Some(echeance),
        )?,

        Expr::Op(Operateur::Somme, xs, _) => {
            let mut acc = Intervalle::point(BigRational::zero(), chiffres);
            for x in xs {
                acc = acc.add(&intervalle(x, chiffres, echeance)?);
            }
            acc
        }
        Expr::Op(Operateur::Produit, xs, _) => {
            let mut acc = Intervalle::point(BigRational::one(), chiffres);
            for x in xs {
                acc = acc.mul(&intervalle(x, chiffres, echeance)?);
            }
            acc
        }
        Expr::Op(Operateur::Puissance, v, _) if v.len() == 2 => {
            puissance(&v[0], &v[1], chiffres, echeance)?
        }

        Expr::Fonction(f, args, _) => {
            let xs = args
                .iter()
                .map(|a| intervalle(a, chiffres, echeance))
                .collect::<Result<Vec<_>, _>>()?;
            appliquer(*f, &xs, args, chiffres, echeance)?
        }

        _ => return Err(ErreurNombre::HorsDomaine("expression non numérique")),
    };

    if let Some(c) = e.cache() {
        c.ecrire(chiffres, i.clone());
    }
    Ok(i)
}

fn puissance(
    b: &Expr,
    x: &Expr,
    chiffres: usize,
    echeance: &Echeance,
) -> Result<Intervalle, ErreurNombre> {
    let base = intervalle(b, chiffres, echeance)?;
    match x.as_rat() {
        Some(r) if r.is_integer() => base.pow_entier(r.numer(), echeance),
        Some(r) => {
            let q = r.denom().to_u32().ok_or(ErreurNombre::Depassement)?;
            lecture::racine(&base, q, Some(echeance))?.pow_entier(r.numer(), echeance)
        }
        None => {
            let y = intervalle(x, chiffres, echeance)?;
            let n = Nombre::Approx(base).pow(&Nombre::Approx(y), chiffres, echeance)?;
            Ok(n.intervalle(chiffres))
        }
    }
}

/// Table de dispatch des fonctions sur intervalles.
fn appliquer(
    f: Fonction,
    xs: &[Intervalle],
    args: &[Expr],
    chiffres: usize,
    echeance: &Echeance,
) -> Result<Intervalle, ErreurNombre> {
    use Fonction::*;

    let x = xs.first().ok_or(ErreurNombre::HorsDomaine("argument manquant"))?;
    let ech = Some(echeance);
    let ln_de = |v: i64| lecture::ln(&Intervalle::point(BigRational::from_integer(v.into()), chiffres), ech);

    match f {
        Sqrt => lecture::racine(x, 2, ech),
        Cbrt => lecture::racine(x, 3, ech),
        Root => {
            let n = args
                .get(1)
                .and_then(Expr::as_rat)
                .filter(|n| n.is_integer() && n.is_positive())
                .and_then(|n| n.numer().to_u32())
                .ok_or(ErreurNombre::HorsDomaine("indice de racine non entier positif"))?;
            lecture::racine(x, n, ech)
        }
        Exp => lecture::exp(x, ech),
        Ln => lecture::ln(x, ech),
        Log => match xs.get(1) {
            None => lecture::ln(x, ech),
            Some(b) => lecture::ln(x, ech)?.div(&lecture::ln(b, ech)?),
        },
        Log10 => lecture::ln(x, ech)?.div(&ln_de(10)?),
        Log2 => lecture::ln(x, ech)?.div(&ln_de(2)?),
        Sin => lecture::sin(x, ech),
        Cos => lecture::cos(x, ech),
        Tan => lecture::tan(x, ech),
        Atan => lecture::atan(x, ech),
        Abs => match Nombre::Approx(x.clone()).abs() {
            Nombre::Approx(i) => Ok(i),
            Nombre::Exact(r) => Ok(Intervalle::point(r, chiffres)),
        },
        Floor | Ceil | Round | Trunc => {
            let arrondi = |r: &BigRational| match f {
                Floor => r.floor(),
                Ceil => r.ceil(),
                Round => r.round(),
                _ => r.trunc(),
            };
            let (a, b) = (arrondi(x.bas()), arrondi(x.haut()));
            if a == b {
                Ok(Intervalle::point(a, chiffres))
            } else {
                Err(ErreurNombre::Imprecis)
            }
        }
        Min | Max => {
            // min/max bornes à bornes : encadrement exact de min/max
            let mut bas = x.bas().clone();
            let mut haut = x.haut().clone();
            for y in &xs[1..] {
                if f == Min {
                    bas = bas.min(y.bas().clone());
                    haut = haut.min(y.haut().clone());
                } else {
                    bas = bas.max(y.bas().clone());
                    haut = haut.max(y.haut().clone());
                }
            }
            Ok(Intervalle::new(bas, haut, chiffres))
        }
        // entier exact trop grand (sinon déjà calculé par simplify)
        Fact if args.first().and_then(Expr::as_rat).is_some_and(|r| r.is_integer() && !r.is_negative()) => {
            Err(ErreurNombre::Depassement)
        }
        Fact => Err(ErreurNombre::HorsDomaine("factorielle hors des entiers naturels")),
        Gcd | Lcm => Err(ErreurNombre::HorsDomaine("pgcd/ppcm d’un non-entier")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noyau::unites::{Registre, TableTaux};
    use num_bigint::BigInt;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime};

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn registre(mis_a_jour: SystemTime) -> Registre {
        let t = TableTaux::nouvelle("EUR", mis_a_jour).avec("USD", rat(108, 100));
        Registre::nouveau(t).unwrap()
    }

    fn calcul_avec(texte: &str, options: OptionsEvaluation) -> Calcul {
        let r = registre(SystemTime::now());
        let globales = HashMap::from([("g".to_string(), Expr::entier(2))]);
        let mut ctx = Contexte::nouveau(r.vue(), &globales, options);
        calculer(texte, &mut ctx).unwrap()
    }

    fn exact(texte: &str) -> Calcul {
        let o = OptionsEvaluation {
            mode_approximation: ModeApproximation::Desactive,
            ..OptionsEvaluation::default()
        };
        calcul_avec(texte, o)
    }

    fn ft() -> Expr {
        Expr::Unite("ft".into())
    }

    #[test]
    fn arithmetique_exacte() {
        assert_eq!(exact("2 + 2").expr, Expr::entier(4));
        assert_eq!(exact("1/3").expr, Expr::rat(rat(1, 3)));
        assert_eq!(exact("2^10 - 24").expr, Expr::entier(1000));
        assert_eq!(exact("5!").expr, Expr::entier(120));
        assert!(exact("2 + 2").avertissements.is_empty());
    }

    #[test]
    fn conversion_metre_pied() {
        let c = exact("1 m to ft");
        assert_eq!(
            c.expr,
            Expr::produit(vec![Expr::rat(rat(1250, 381)), ft()])
        );
    }

    #[test]
    fn somme_d_unites() {
        let c = exact("1 m + 1 ft");
        assert_eq!(
            c.expr,
            Expr::produit(vec![Expr::rat(rat(1631, 1250)), Expr::Unite("m".into())])
        );

        let c = exact("1 m + 1 s");
        assert!(matches!(
            c.avertissements.as_slice(),
            [Avertissement::DimensionIncompatible(_)]
        ));

        let c = exact("1 m to s");
        assert!(matches!(
            c.avertissements.as_slice(),
            [Avertissement::DimensionIncompatible(_)]
        ));
        assert_eq!(c.expr, Expr::Unite("m".into()));
    }

    #[test]
    fn vitesse_composee() {
        // 36 km/h = 10 m/s
        let c = exact("36 km/h to m/s");
        assert_eq!(
            c.expr,
            Expr::produit(vec![
                Expr::entier(10),
                Expr::Unite("m".into()),
                Expr::puissance(Expr::Unite("s".into()), Expr::entier(-1)),
            ])
        );
    }

    #[test]
    fn indefinis_annotes() {
        let c = exact("1/0 + 5");
        assert_eq!(c.expr, Expr::Indefini);
        assert_eq!(c.avertissements, vec![Avertissement::DivisionParZero]);

        let c = exact("sqrt(-1)");
        assert_eq!(c.expr, Expr::Indefini);
        assert!(matches!(
            c.avertissements.as_slice(),
            [Avertissement::NonUtilisable(_)]
        ));
    }

    #[test]
    fn variables_et_definitions() {
        let c = exact("g * 3");
        assert_eq!(c.expr, Expr::entier(6));

        let r = registre(SystemTime::now());
        let globales = HashMap::new();
        let mut ctx = Contexte::nouveau(r.vue(), &globales, OptionsEvaluation::default());
        ctx.lier("x", Expr::rat(rat(1, 2)));
        let c = calculer("x + 1/2", &mut ctx).unwrap();
        assert_eq!(c.expr, Expr::entier(1));

        // libre : reste symbolique
        let c = exact("y + 1 - 1");
        assert_eq!(c.expr, Expr::Var("y".into()));
    }

    #[test]
    fn approximation_auto() {
        let c = calcul_avec("sqrt(2)", OptionsEvaluation::default());
        let Expr::Num(Nombre::Approx(i)) = &c.expr else {
            panic!("attendu un approché: {:?}", c.expr)
        };
        assert!(*i.bas() <= rat(1_414_213_562_373, 1_000_000_000_000));
        assert!(*i.haut() >= rat(1_414_213_562_373, 1_000_000_000_000));
        assert!(c.avertissements.contains(&Avertissement::Approximation));

        // désactivée : reste exact
        let c = exact("sqrt(2)");
        assert_eq!(
            c.expr,
            Expr::puissance(Expr::entier(2), Expr::rat(rat(1, 2)))
        );
    }

    #[test]
    fn approximation_hors_domaine() {
        // sin(5) < 0 : ln indéfini, découvert à l’approximation
        let c = calcul_avec("ln(sin(5))", OptionsEvaluation::default());
        assert_eq!(c.expr, Expr::Indefini);
        assert!(matches!(
            c.avertissements.as_slice(),
            [Avertissement::NonUtilisable(_)]
        ));
    }

    #[test]
    fn echeance_par_pas() {
        let o = OptionsEvaluation::default().avec_pas_max(50);
        let c = calcul_avec("fact(200000)", o);
        assert_eq!(
            c.expr,
            Expr::fonction(Fonction::Fact, vec![Expr::entier(200_000)])
        );
        assert!(c.avertissements.contains(&Avertissement::EcheanceDepassee));
    }

    #[test]
    fn echeance_minuscule() {
        let o = OptionsEvaluation {
            delai: Duration::from_millis(1),
            ..OptionsEvaluation::default()
        };
        let c = calcul_avec("fact(200000) + 1", o);
        assert!(c.avertissements.contains(&Avertissement::EcheanceDepassee));
    }

    #[test]
    fn devises_et_peremption() {
        let r = registre(SystemTime::UNIX_EPOCH);
        let globales = HashMap::new();
        let o = OptionsEvaluation {
            mode_approximation: ModeApproximation::Desactive,
            ..OptionsEvaluation::default()
        };
        let mut ctx = Contexte::nouveau(r.vue(), &globales, o);
        let c = calculer("10 EUR to USD", &mut ctx).unwrap();
        assert_eq!(
            c.expr,
            Expr::produit(vec![Expr::rat(rat(54, 5)), Expr::Unite("USD".into())])
        );
        assert_eq!(c.avertissements, vec![Avertissement::TauxPerimes]);
    }

    #[test]
    fn demarche_et_preuves() {
        let c = exact("sin(pi/6)");
        assert_eq!(c.expr, Expr::rat(rat(1, 2)));
        assert_eq!(c.demarche.jetons, "sin ( pi / 6 )");
        assert_eq!(c.demarche.rpn, "pi 6 / sin/1");
        assert_eq!(c.demarche.preuves, vec!["sin(π/6) = 1/2".to_string()]);
    }

    #[test]
    fn syntaxe() {
        let r = registre(SystemTime::now());
        let globales = HashMap::new();
        let mut ctx = Contexte::nouveau(r.vue(), &globales, OptionsEvaluation::default());
        let e = calculer("2 + * 3", &mut ctx).unwrap_err();
        assert_eq!(e.position, 4);
        assert_eq!(calculer("   ", &mut ctx).unwrap_err().position, 0);
    }
}
