// src/noyau/expr.rs
//
// Arbre d’expression (sans flottants).
// - Num       : nombre exact ou approché (voir nombre.rs)
// - Constante : π, e (exacts, symboliques)
// - Var       : variable libre (ex: x)
// - Unite     : symbole d’unité ou de devise (ex: m, km, USD)
// - Fonction  : fonction fermée + arguments ordonnés
// - Op        : opérateur n-aire (Somme, Produit) ou binaire (Puissance, Conversion)
// - Indefini  : résultat exact indéfini (ex: tan(π/2), 1/0)
//
// Formes canoniques :
// - a - b  => Somme[a, Produit[-1, b]]
// - a / b  => Produit[a, Puissance[b, -1]]
// - √x     => Puissance[x, 1/2] (fait par canon.rs)
//
// IMPORTANT (SAFE):
// - l’arbre est strictement possédé (pas de sous-arbre partagé)
// - le cache d’approximation n’entre jamais dans l’égalité structurelle

use std::fmt;
use std::sync::OnceLock;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use super::nombre::{Intervalle, Nombre};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constante {
    Pi,
    E,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operateur {
    Somme,
    Produit,
    Puissance,
    Conversion,
}

/// Table fermée des fonctions intégrées.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fonction {
    Sqrt,
    Cbrt,
    Root,
    Exp,
    Ln,
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Atan,
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Fact,
    Min,
    Max,
    Gcd,
    Lcm,
}

/// (fonction, noms reconnus, arité min, arité max)
const TABLE_FONCTIONS: &[(Fonction, &[&str], usize, usize)] = &[
    (Fonction::Sqrt, &["sqrt", "racine"], 1, 1),
    (Fonction::Cbrt, &["cbrt"], 1, 1),
    (Fonction::Root, &["root"], 2, 2),
    (Fonction::Exp, &["exp"], 1, 1),
    (Fonction::Ln, &["ln"], 1, 1),
    (Fonction::Log, &["log"], 1, 2),
    (Fonction::Log10, &["log10"], 1, 1),
    (Fonction::Log2, &["log2"], 1, 1),
    (Fonction::Sin, &["sin"], 1, 1),
    (Fonction::Cos, &["cos"], 1, 1),
    (Fonction::Tan, &["tan"], 1, 1),
    (Fonction::Atan, &["atan", "arctan"], 1, 1),
    (Fonction::Abs, &["abs"], 1, 1),
    (Fonction::Floor, &["floor"], 1, 1),
    (Fonction::Ceil, &["ceil"], 1, 1),
    (Fonction::Round, &["round"], 1, 1),
    (Fonction::Trunc, &["trunc"], 1, 1),
    (Fonction::Fact, &["fact", "factorial"], 1, 1),
    (Fonction::Min, &["min"], 1, usize::MAX),
    (Fonction::Max, &["max"], 1, usize::MAX),
    (Fonction::Gcd, &["gcd", "pgcd"], 2, usize::MAX),
    (Fonction::Lcm, &["lcm", "ppcm"], 2, usize::MAX),
];

impl Fonction {
    /// Recherche insensible à la casse.
    pub fn depuis_nom(nom: &str) -> Option<Fonction> {
        let n = nom.to_lowercase();
        TABLE_FONCTIONS
            .iter()
            .find(|(_, noms, _, _)| noms.contains(&n.as_str()))
            .map(|(f, _, _, _)| *f)
    }

    fn entree(self) -> &'static (Fonction, &'static [&'static str], usize, usize) {
        // la table couvre toutes les variantes
        TABLE_FONCTIONS
            .iter()
            .find(|(f, _, _, _)| *f == self)
            .unwrap_or(&TABLE_FONCTIONS[0])
    }

    pub fn nom(self) -> &'static str {
        self.entree().1[0]
    }

    /// (min, max) d’arguments acceptés.
    pub fn arite(self) -> (usize, usize) {
        let e = self.entree();
        (e.2, e.3)
    }
}

/* ------------------------ Cache d’approximation ------------------------ */

/// Valeur approchée mémorisée d’un noeud (précision, intervalle).
/// Ignorée par l’égalité : deux arbres égaux restent égaux, cache rempli ou non.
#[derive(Clone, Debug, Default)]
pub struct CacheApprox(OnceLock<(usize, Intervalle)>);

impl CacheApprox {
    pub fn lire(&self, chiffres: usize) -> Option<Intervalle> {
        self.0
            .get()
            .filter(|(c, _)| *c >= chiffres)
            .map(|(_, i)| i.clone())
    }

    pub fn ecrire(&self, chiffres: usize, i: Intervalle) {
        // premier arrivé, premier servi
        let _ = self.0.set((chiffres, i));
    }
}

impl PartialEq for CacheApprox {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for CacheApprox {}

/* ------------------------ Arbre ------------------------ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Num(Nombre),
    Constante(Constante),
    Var(String),
    Unite(String),
    Fonction(Fonction, Vec<Expr>, CacheApprox),
    Op(Operateur, Vec<Expr>, CacheApprox),
    Indefini,
}

impl Expr {
    /* ---- constructeurs ---- */

    pub fn entier(n: i64) -> Expr {
        Expr::Num(Nombre::entier(n))
    }

    pub fn rat(r: BigRational) -> Expr {
        Expr::Num(Nombre::Exact(r))
    }

    pub fn nombre(n: Nombre) -> Expr {
        Expr::Num(n)
    }

    pub fn somme(termes: Vec<Expr>) -> Expr {
        Expr::Op(Operateur::Somme, termes, CacheApprox::default())
    }

    pub fn produit(facteurs: Vec<Expr>) -> Expr {
        Expr::Op(Operateur::Produit, facteurs, CacheApprox::default())
    }

    pub fn puissance(base: Expr, exposant: Expr) -> Expr {
        Expr::Op(
            Operateur::Puissance,
            vec![base, exposant],
            CacheApprox::default(),
        )
    }

    pub fn conversion(valeur: Expr, cible: Expr) -> Expr {
        Expr::Op(
            Operateur::Conversion,
            vec![valeur, cible],
            CacheApprox::default(),
        )
    }

    pub fn fonction(f: Fonction, args: Vec<Expr>) -> Expr {
        Expr::Fonction(f, args, CacheApprox::default())
    }

    pub fn neg(e: Expr) -> Expr {
        Expr::produit(vec![Expr::entier(-1), e])
    }

    pub fn inverse(e: Expr) -> Expr {
        Expr::puissance(e, Expr::entier(-1))
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::somme(vec![a, Expr::neg(b)])
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::produit(vec![a, Expr::inverse(b)])
    }

    /* ---- inspection ---- */

    pub fn as_nombre(&self) -> Option<&Nombre> {
        match self {
            Expr::Num(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_rat(&self) -> Option<&BigRational> {
        self.as_nombre().and_then(Nombre::as_rat)
    }

    pub fn est_rat(&self, n: i64) -> bool {
        matches!(self.as_rat(), Some(r) if *r == BigRational::from_integer(BigInt::from(n)))
    }

    pub fn est_indefini(&self) -> bool {
        matches!(self, Expr::Indefini)
    }

    pub fn enfants(&self) -> &[Expr] {
        match self {
            Expr::Fonction(_, a, _) | Expr::Op(_, a, _) => a,
            _ => &[],
        }
    }

    pub fn contient_var(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            _ => self.enfants().iter().any(Expr::contient_var),
        }
    }

    pub fn contient_unite(&self) -> bool {
        match self {
            Expr::Unite(_) => true,
            _ => self.enfants().iter().any(Expr::contient_unite),
        }
    }

    pub fn contient_indefini(&self) -> bool {
        match self {
            Expr::Indefini => true,
            _ => self.enfants().iter().any(Expr::contient_indefini),
        }
    }

    /// Sans variable, sans unité, sans indéfini : une valeur réelle calculable.
    pub fn est_numerique(&self) -> bool {
        match self {
            Expr::Num(_) | Expr::Constante(_) => true,
            Expr::Var(_) | Expr::Unite(_) | Expr::Indefini => false,
            Expr::Op(Operateur::Conversion, _, _) => false,
            _ => self.enfants().iter().all(Expr::est_numerique),
        }
    }

    pub fn contient_approche(&self) -> bool {
        match self {
            Expr::Num(n) => !n.est_exact(),
            _ => self.enfants().iter().any(Expr::contient_approche),
        }
    }

    pub fn cache(&self) -> Option<&CacheApprox> {
        match self {
            Expr::Fonction(_, _, c) | Expr::Op(_, _, c) => Some(c),
            _ => None,
        }
    }

    /// Nombre de noeuds (borne de taille pour les garde-fous).
    pub fn taille(&self) -> usize {
        1 + self.enfants().iter().map(Expr::taille).sum::<usize>()
    }

    /// Détecte un coeff·π (produits rationnels, sommes de multiples de π).
    ///
    /// SAFE: Var => None (on ne “devine” rien).
    pub fn as_coeff_pi(&self) -> Option<BigRational> {
        match self {
            Expr::Constante(Constante::Pi) => Some(BigRational::one()),
            Expr::Num(Nombre::Exact(r)) if r.is_zero() => Some(BigRational::zero()),

            Expr::Op(Operateur::Produit, fs, _) => {
                let mut coeff = BigRational::one();
                let mut pi_vu = false;
                for f in fs {
                    match f {
                        Expr::Num(Nombre::Exact(r)) => coeff *= r.clone(),
                        Expr::Constante(Constante::Pi) if !pi_vu => pi_vu = true,
                        _ => return None,
                    }
                }
                pi_vu.then_some(coeff)
            }

            Expr::Op(Operateur::Somme, ts, _) => {
                let mut total = BigRational::zero();
                for t in ts {
                    total += t.as_coeff_pi()?;
                }
                Some(total)
            }

            _ => None,
        }
    }
}

/* ------------------------ Modulo rationnel exact (sans flottants) ------------------------ */

/// Réduction modulo `periode` sur un coefficient rationnel (ex: periode=2 pour sin/cos, 1 pour tan).
/// Retourne un rationnel dans [0, periode).
///
/// Si coeff = n/d, alors coeff mod periode = (n mod (periode*d))/d.
pub(crate) fn mod_rationnel(coeff: &BigRational, periode: i64) -> BigRational {
    if periode <= 0 {
        return coeff.clone();
    }
    if coeff.is_zero() {
        return BigRational::zero();
    }

    let d = coeff.denom().clone();
    let n = coeff.numer().clone();

    let m = BigInt::from(periode) * &d;
    let mut r = &n % &m;
    if r.is_negative() {
        r += &m;
    }
    BigRational::new(r, d)
}

/* ------------------------ Affichage debug (pas “joli” final) ------------------------ */

impl fmt::Display for Constante {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constante::Pi => write!(f, "π"),
            Constante::E => write!(f, "e"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn liste(f: &mut fmt::Formatter<'_>, xs: &[Expr], sep: &str) -> fmt::Result {
            for (i, x) in xs.iter().enumerate() {
                if i > 0 {
                    write!(f, "{sep}")?;
                }
                write!(f, "{x}")?;
            }
            Ok(())
        }

        match self {
            Expr::Num(Nombre::Exact(r)) => {
                if r.denom().is_one() {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
            Expr::Num(Nombre::Approx(i)) => {
                let m = i.milieu();
                write!(f, "≈{}/{}", m.numer(), m.denom())
            }
            Expr::Constante(c) => write!(f, "{c}"),
            Expr::Var(s) | Expr::Unite(s) => write!(f, "{s}"),
            Expr::Indefini => write!(f, "indéfini"),
            Expr::Fonction(g, args, _) => {
                write!(f, "{}(", g.nom())?;
                liste(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::Op(op, xs, _) => {
                let sep = match op {
                    Operateur::Somme => "+",
                    Operateur::Produit => "*",
                    Operateur::Puissance => "^",
                    Operateur::Conversion => " to ",
                };
                write!(f, "(")?;
                liste(f, xs, sep)?;
                write!(f, ")")
            }
        }
    }
}
