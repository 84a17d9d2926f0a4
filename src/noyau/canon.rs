// src/noyau/canon.rs
//
// Canonicalisation forte (déterministe), par passes ascendantes jusqu’au point fixe :
// - aplatissement Somme / Produit
// - suppression neutres (x+0, x*1, x^1, x^0) et absorbant (x*0)
// - regroupement des nombres, des termes semblables (2x + 3x = 5x)
//   et des facteurs de même base (x·x² = x³, m·m⁻¹ = 1)
// - puissances exactes : 2^10, 8^(2/3) = 4, √12 = 2√3, 1/√3 = √3/3
// - angles remarquables (trig.rs), parité sin/cos/tan/atan, sin² + cos² = 1
// - fonctions exactes (ln 1, exp 0, log exact, floor, fact, pgcd…)
// - tri déterministe des termes/facteurs (ordre total)
//
// Note : on reste volontairement “local” (un noeud à la fois, enfants déjà canoniques).

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::echeance::Echeance;
use super::erreurs::{Avertissement, ErreurNombre, Journal};
use super::expr::{CacheApprox, Constante, Expr, Fonction, Operateur};
use super::nombre::{extrait_puissance_parfaite, rational_pow_int, Nombre, BITS_MAX};
use super::trig::{atan_special, trig_special, TrigFn, TrigOutcome};

/// Nombre maximal de passes complètes.
pub const ITERATIONS_MAX: usize = 32;

/// Garde-fous de l’extraction de puissances parfaites.
const BITS_EXTRACTION_MAX: u64 = 4096;
const INDICE_MAX: u32 = 64;

pub fn simplify(e: Expr) -> Expr {
    let mut journal = Journal::default();
    simplifier_avec(e, &mut journal, &Echeance::illimitee())
}

/// Passes jusqu’au point fixe (au plus ITERATIONS_MAX).
/// Les avertissements (division par zéro, domaine, borne atteinte) vont dans `journal`.
pub fn simplifier_avec(e: Expr, journal: &mut Journal, echeance: &Echeance) -> Expr {
    let mut courant = e;
    for _ in 0..ITERATIONS_MAX {
        let suivant = passe(courant.clone(), journal, echeance);
        if suivant == courant || echeance.depassee() {
            return suivant;
        }
        courant = suivant;
    }
    tracing::debug!(taille = courant.taille(), "simplification bornée");
    journal.signaler(Avertissement::SimplificationBornee);
    courant
}

fn passe(e: Expr, journal: &mut Journal, echeance: &Echeance) -> Expr {
    if echeance.verifier().is_err() {
        return e;
    }
    match e {
        Expr::Fonction(f, args, c) => {
            let args = args
                .into_iter()
                .map(|a| passe(a, journal, echeance))
                .collect();
            reduire_noeud(Expr::Fonction(f, args, c), journal, echeance)
        }
        Expr::Op(op, xs, c) => {
            let xs = xs
                .into_iter()
                .map(|x| passe(x, journal, echeance))
                .collect();
            reduire_noeud(Expr::Op(op, xs, c), journal, echeance)
        }
        feuille => feuille,
    }
}

/// Réécriture d’un seul noeud, enfants supposés déjà canoniques.
pub fn reduire_noeud(e: Expr, journal: &mut Journal, echeance: &Echeance) -> Expr {
    if e.enfants().iter().any(Expr::est_indefini) {
        return Expr::Indefini;
    }
    match e {
        Expr::Op(Operateur::Somme, xs, _) => reduire_somme(xs),
        Expr::Op(Operateur::Produit, xs, _) => reduire_produit(xs, journal, echeance),
        Expr::Op(Operateur::Puissance, xs, c) => match <[Expr; 2]>::try_from(xs) {
            Ok([b, x]) => reduire_puissance(b, x, journal, echeance),
            Err(xs) => Expr::Op(Operateur::Puissance, xs, c),
        },
        Expr::Fonction(f, args, c) => match reecrire_fonction(f, &args, journal, echeance) {
            Some(e) => e,
            None => Expr::Fonction(f, args, c),
        },
        autre => autre,
    }
}

/* ------------------------ utilitaires ------------------------ */

fn indefini(journal: &mut Journal, a: Avertissement) -> Expr {
    journal.signaler(a);
    Expr::Indefini
}

fn demi() -> BigRational {
    BigRational::new(BigInt::one(), BigInt::from(2))
}

pub(crate) fn reconstruire(op: Operateur, mut v: Vec<Expr>) -> Expr {
    if v.len() == 1 {
        if let Some(x) = v.pop() {
            return x;
        }
    }
    if v.is_empty() {
        return match op {
            Operateur::Produit => Expr::entier(1),
            _ => Expr::entier(0),
        };
    }
    Expr::Op(op, v, CacheApprox::default())
}

fn aplatir(op: Operateur, xs: Vec<Expr>, out: &mut Vec<Expr>) {
    for x in xs {
        match x {
            Expr::Op(o, ys, _) if o == op => aplatir(op, ys, out),
            autre => out.push(autre),
        }
    }
}

/// c·e avec e canonique (coefficient fusionné, placé en tête).
fn fois(c: Nombre, e: Expr) -> Expr {
    if c.est_un() {
        return e;
    }
    match e {
        Expr::Num(n) => Expr::Num(&c * &n),
        Expr::Op(Operateur::Produit, fs, _) => {
            let mut it = fs.into_iter().peekable();
            let mut v = Vec::new();
            match it.peek() {
                Some(Expr::Num(_)) => {
                    if let Some(Expr::Num(n)) = it.next() {
                        let k = &c * &n;
                        if !k.est_un() {
                            v.push(Expr::Num(k));
                        }
                    }
                }
                _ => v.push(Expr::Num(c)),
            }
            v.extend(it);
            reconstruire(Operateur::Produit, v)
        }
        autre => Expr::produit(vec![Expr::Num(c), autre]),
    }
}

/// -e si e porte un signe négatif visible (nombre ou coefficient).
fn negatif_de(e: &Expr) -> Option<Expr> {
    let negatif = |n: &Nombre| n.signe() == Some(Ordering::Less);
    match e {
        Expr::Num(n) if negatif(n) => Some(Expr::Num(-n)),
        Expr::Op(Operateur::Produit, fs, _) => match fs.first() {
            Some(Expr::Num(c)) if negatif(c) => {
                let c = -c;
                let mut v = Vec::with_capacity(fs.len());
                if !c.est_un() {
                    v.push(Expr::Num(c));
                }
                v.extend(fs[1..].iter().cloned());
                Some(reconstruire(Operateur::Produit, v))
            }
            _ => None,
        },
        _ => None,
    }
}

/* ------------------------ clef de tri déterministe ------------------------ */

fn rang(e: &Expr) -> u8 {
    match e {
        Expr::Num(_) => 0,
        Expr::Constante(_) => 2,
        Expr::Var(_) => 3,
        Expr::Op(Operateur::Puissance, v, _) => match v.first() {
            Some(Expr::Num(_)) => 1, // radicaux juste après le coefficient
            Some(b) => rang(b),
            None => 4,
        },
        Expr::Fonction(..) => 5,
        Expr::Op(Operateur::Produit, _, _) => 6,
        Expr::Op(Operateur::Somme, _, _) => 7,
        Expr::Unite(_) => 8, // les unités ferment le produit : 3 m/s
        Expr::Op(Operateur::Conversion, _, _) => 9,
        Expr::Indefini => 255,
    }
}

fn key_string(e: &Expr) -> String {
    fn liste(xs: &[Expr]) -> String {
        xs.iter().map(key_string).collect::<Vec<_>>().join(",")
    }

    match e {
        Expr::Num(Nombre::Exact(r)) => format!("R{}/{}", r.numer(), r.denom()),
        Expr::Num(Nombre::Approx(i)) => {
            let m = i.milieu();
            format!("A{}/{}", m.numer(), m.denom())
        }
        Expr::Constante(c) => format!("C({c})"),
        Expr::Var(s) => format!("VAR({s})"),
        Expr::Unite(s) => format!("U({s})"),
        Expr::Indefini => "INDEF".to_string(),
        Expr::Fonction(f, a, _) => format!("{}({})", f.nom().to_uppercase(), liste(a)),
        Expr::Op(op, a, _) => {
            let nom = match op {
                Operateur::Somme => "ADD",
                Operateur::Produit => "MUL",
                Operateur::Puissance => "POW",
                Operateur::Conversion => "TO",
            };
            format!("{nom}({})", liste(a))
        }
    }
}

fn cmp_expr(a: &Expr, b: &Expr) -> Ordering {
    rang(a)
        .cmp(&rang(b))
        .then_with(|| key_string(a).cmp(&key_string(b)))
}

/* ------------------------ Somme ------------------------ */

/// Sépare c·reste (c = 1 si pas de coefficient).
fn scinder_coefficient(e: Expr) -> (Nombre, Expr) {
    match e {
        Expr::Op(Operateur::Produit, fs, c) => {
            if matches!(fs.first(), Some(Expr::Num(_))) {
                let mut it = fs.into_iter();
                if let Some(Expr::Num(n)) = it.next() {
                    return (n, reconstruire(Operateur::Produit, it.collect()));
                }
                return (Nombre::un(), Expr::produit(Vec::new()));
            }
            (Nombre::un(), Expr::Op(Operateur::Produit, fs, c))
        }
        autre => (Nombre::un(), autre),
    }
}

fn carre_trig(e: &Expr) -> Option<(Fonction, &Expr)> {
    match e {
        Expr::Op(Operateur::Puissance, v, _) if v.len() == 2 && v[1].est_rat(2) => match &v[0] {
            Expr::Fonction(f @ (Fonction::Sin | Fonction::Cos), a, _) if a.len() == 1 => {
                Some((*f, &a[0]))
            }
            _ => None,
        },
        _ => None,
    }
}

/// c·sin(x)² + c·cos(x)² = c
fn pythagore(groupes: &mut Vec<(Nombre, Expr)>, constante: &mut Nombre) {
    let mut i = 0;
    while i < groupes.len() {
        let partenaire = match carre_trig(&groupes[i].1) {
            Some((Fonction::Sin, x)) => groupes.iter().position(|(c, r)| {
                *c == groupes[i].0 && matches!(carre_trig(r), Some((Fonction::Cos, y)) if y == x)
            }),
            _ => None,
        };
        match partenaire {
            Some(k) => {
                let c = groupes[i].0.clone();
                groupes.remove(i.max(k));
                groupes.remove(i.min(k));
                *constante = &*constante + &c;
                i = i.min(k);
            }
            None => i += 1,
        }
    }
}

fn reduire_somme(xs: Vec<Expr>) -> Expr {
    let mut plats = Vec::with_capacity(xs.len());
    aplatir(Operateur::Somme, xs, &mut plats);

    let mut constante = Nombre::zero();
    let mut groupes: Vec<(Nombre, Expr)> = Vec::new();

    for t in plats {
        match t {
            Expr::Num(n) => constante = &constante + &n,
            autre => {
                let (c, reste) = scinder_coefficient(autre);
                match groupes.iter_mut().find(|(_, r)| *r == reste) {
                    Some((acc, _)) => *acc = &*acc + &c,
                    None => groupes.push((c, reste)),
                }
            }
        }
    }

    pythagore(&mut groupes, &mut constante);

    let mut termes: Vec<Expr> = groupes
        .into_iter()
        .filter(|(c, _)| !c.est_zero())
        .map(|(c, r)| fois(c, r))
        .collect();

    if !constante.est_zero() || termes.is_empty() {
        termes.push(Expr::Num(constante));
    }

    termes.sort_by(cmp_expr);
    reconstruire(Operateur::Somme, termes)
}

/* ------------------------ Produit ------------------------ */

/// (base, exposant) ; x => (x, 1)
fn scinder_puissance(e: Expr) -> (Expr, Expr) {
    match e {
        Expr::Op(Operateur::Puissance, v, c) => match <[Expr; 2]>::try_from(v) {
            Ok([b, x]) => (b, x),
            Err(v) => (Expr::Op(Operateur::Puissance, v, c), Expr::entier(1)),
        },
        autre => (autre, Expr::entier(1)),
    }
}

/// √a, ∛a… : Puissance(rationnel > 0, exposant rationnel non entier)
fn radical(e: &Expr) -> Option<(&BigRational, &BigRational)> {
    match e {
        Expr::Op(Operateur::Puissance, v, _) if v.len() == 2 => {
            let b = v[0].as_rat()?;
            let x = v[1].as_rat()?;
            (b.is_positive() && !x.is_integer()).then_some((b, x))
        }
        _ => None,
    }
}

fn reduire_produit(xs: Vec<Expr>, journal: &mut Journal, echeance: &Echeance) -> Expr {
    let mut plats = Vec::with_capacity(xs.len());
    aplatir(Operateur::Produit, xs, &mut plats);

    let mut coeff = Nombre::un();
    let mut groupes: Vec<(Expr, Expr)> = Vec::new();

    for f in plats {
        match f {
            Expr::Num(n) => coeff = &coeff * &n,
            autre => {
                let (base, exposant) = scinder_puissance(autre);
                let cible = groupes.iter_mut().find(|(b, x)| {
                    *b == base && x.as_rat().is_some() && exposant.as_rat().is_some()
                });
                match cible {
                    Some((_, x)) => {
                        let s = match (x.as_rat(), exposant.as_rat()) {
                            (Some(a), Some(b)) => Some(a + b),
                            _ => None,
                        };
                        if let Some(s) = s {
                            *x = Expr::rat(s);
                        }
                    }
                    None => groupes.push((base, exposant)),
                }
            }
        }
    }

    // 0·x = 0, mais 0 m garde son unité
    if coeff.est_zero() {
        groupes.retain(|(b, _)| matches!(b, Expr::Unite(_)));
    }

    let mut facteurs = Vec::new();
    for (base, exposant) in groupes {
        let f = if exposant.est_rat(1) {
            base
        } else {
            reduire_puissance(base, exposant, journal, echeance)
        };
        absorber(f, &mut coeff, &mut facteurs);
    }

    // √a·√b = √(ab) (même exposant, bases rationnelles positives)
    let mut radicaux: Vec<(BigRational, BigRational)> = Vec::new();
    let mut autres = Vec::with_capacity(facteurs.len());
    for f in facteurs {
        match radical(&f) {
            Some((b, x)) => match radicaux.iter_mut().find(|(_, y)| y == x) {
                Some((acc, _)) => *acc *= b,
                None => radicaux.push((b.clone(), x.clone())),
            },
            None => autres.push(f),
        }
    }
    let mut facteurs = autres;
    for (b, x) in radicaux {
        let f = reduire_puissance(Expr::rat(b), Expr::rat(x), journal, echeance);
        absorber(f, &mut coeff, &mut facteurs);
    }

    if facteurs.iter().any(Expr::est_indefini) {
        return Expr::Indefini;
    }

    facteurs.sort_by(cmp_expr);
    if !coeff.est_un() || facteurs.is_empty() {
        facteurs.insert(0, Expr::Num(coeff));
    }
    reconstruire(Operateur::Produit, facteurs)
}

/// Range un facteur réduit : nombres dans le coefficient, produits aplatis.
fn absorber(f: Expr, coeff: &mut Nombre, facteurs: &mut Vec<Expr>) {
    match f {
        Expr::Num(n) => *coeff = &*coeff * &n,
        Expr::Op(Operateur::Produit, fs, _) => {
            for g in fs {
                absorber(g, coeff, facteurs);
            }
        }
        autre => facteurs.push(autre),
    }
}

/* ------------------------ Puissance ------------------------ */

fn reduire_puissance(base: Expr, exposant: Expr, journal: &mut Journal, echeance: &Echeance) -> Expr {
    if base.est_indefini() || exposant.est_indefini() {
        return Expr::Indefini;
    }
    if exposant.est_rat(0) {
        return Expr::entier(1);
    }
    if exposant.est_rat(1) {
        return base;
    }
    if base.est_rat(1) {
        return Expr::entier(1);
    }

    match (&base, &exposant) {
        (Expr::Num(Nombre::Exact(b)), Expr::Num(Nombre::Exact(x))) => {
            if x.is_integer() {
                return match rational_pow_int(b, x.numer(), echeance) {
                    Ok(r) => Expr::rat(r),
                    Err(ErreurNombre::DivisionParZero) => {
                        indefini(journal, Avertissement::DivisionParZero)
                    }
                    Err(_) => Expr::puissance(base, exposant),
                };
            }
            match puissance_rationnelle(b, x, journal, echeance) {
                Some(e) => e,
                None => Expr::puissance(base, exposant),
            }
        }

        (Expr::Num(b), Expr::Num(x)) => {
            let chiffres = b.chiffres().max(x.chiffres()).unwrap_or(1);
            match b.pow(x, chiffres, echeance) {
                Ok(n) => Expr::Num(n),
                Err(ErreurNombre::DivisionParZero) => {
                    indefini(journal, Avertissement::DivisionParZero)
                }
                Err(ErreurNombre::HorsDomaine(m)) => {
                    indefini(journal, Avertissement::NonUtilisable(m.to_string()))
                }
                Err(_) => Expr::puissance(base, exposant),
            }
        }

        // (x^a)^k = x^(a·k) pour k entier
        (Expr::Op(Operateur::Puissance, v, _), Expr::Num(Nombre::Exact(k)))
            if k.is_integer() && v.len() == 2 =>
        {
            let a = v[1].clone();
            let x = v[0].clone();
            let produit = match a.as_rat() {
                Some(a) => Expr::rat(a * k),
                None => fois(Nombre::Exact(k.clone()), a),
            };
            reduire_puissance(x, produit, journal, echeance)
        }

        // (ab)^k = a^k·b^k pour k entier
        (Expr::Op(Operateur::Produit, fs, _), Expr::Num(Nombre::Exact(k))) if k.is_integer() => {
            let fs = fs
                .iter()
                .map(|f| reduire_puissance(f.clone(), exposant.clone(), journal, echeance))
                .collect();
            reduire_produit(fs, journal, echeance)
        }

        _ => Expr::puissance(base, exposant),
    }
}

/// b^(p/q) exact, q > 1 :
/// b^(p/q) = b^k · b^(r/q) avec k = ⌊p/q⌋, 0 < r < q,
/// puis extraction des puissances q-ièmes parfaites du numérateur et du dénominateur
/// (le dénominateur est rendu rationnel : 3^(-1/2) = √3/3).
///
/// None si trop gros pour être tenté (reste symbolique).
fn puissance_rationnelle(
    b: &BigRational,
    x: &BigRational,
    journal: &mut Journal,
    echeance: &Echeance,
) -> Option<Expr> {
    if b.is_zero() {
        return Some(if x.is_positive() {
            Expr::entier(0)
        } else {
            indefini(journal, Avertissement::DivisionParZero)
        });
    }

    let q = x.denom().to_u32().filter(|q| *q <= INDICE_MAX)?;

    if b.is_negative() {
        if q % 2 == 0 {
            return Some(indefini(
                journal,
                Avertissement::NonUtilisable("racine paire d’un nombre négatif".into()),
            ));
        }
        let m = puissance_rationnelle(&-b.clone(), x, journal, echeance)?;
        return Some(if x.numer().is_odd() {
            fois(Nombre::entier(-1), m)
        } else {
            m
        });
    }

    if b.numer().bits() > BITS_EXTRACTION_MAX || b.denom().bits() > BITS_EXTRACTION_MAX {
        return None;
    }

    let qb = BigInt::from(q);
    let p = x.numer();
    let k = p.div_floor(&qb);
    let r = p - &k * &qb;
    let r32 = r.to_u32()?;

    let mut c = rational_pow_int(b, &k, echeance).ok()?;

    let (s, t) = extrait_puissance_parfaite(b.numer(), q);
    let (u, v) = extrait_puissance_parfaite(b.denom(), q);

    // n^(r/q) = s^r · t^(r/q) ; d^(-r/q) = u^(q-r) · v^((q-r)/q) / d
    c *= BigRational::from_integer(s.pow(r32));
    c *= BigRational::new(u.pow(q - r32), b.denom().clone());

    let mut facteurs = Vec::new();
    if !t.is_one() {
        facteurs.push(Expr::puissance(
            Expr::rat(BigRational::from_integer(t)),
            Expr::rat(BigRational::new(r.clone(), qb.clone())),
        ));
    }
    if !v.is_one() {
        facteurs.push(Expr::puissance(
            Expr::rat(BigRational::from_integer(v)),
            Expr::rat(BigRational::new(&qb - &r, qb)),
        ));
    }

    facteurs.sort_by(cmp_expr);
    if !c.is_one() || facteurs.is_empty() {
        facteurs.insert(0, Expr::rat(c));
    }
    Some(reconstruire(Operateur::Produit, facteurs))
}

/* ------------------------ Fonctions ------------------------ */

/// Réécriture exacte d’un appel ; None = inchangé.
fn reecrire_fonction(
    f: Fonction,
    args: &[Expr],
    journal: &mut Journal,
    echeance: &Echeance,
) -> Option<Expr> {
    use Fonction::*;

    let x = args.first()?;
    let rat = x.as_rat();

    match f {
        Sqrt => Some(reduire_puissance(x.clone(), Expr::rat(demi()), journal, echeance)),
        Cbrt => Some(reduire_puissance(
            x.clone(),
            Expr::rat(BigRational::new(BigInt::one(), BigInt::from(3))),
            journal,
            echeance,
        )),
        Root => {
            let n = args.get(1)?.as_rat()?;
            if !n.is_integer() || !n.is_positive() {
                return Some(indefini(
                    journal,
                    Avertissement::NonUtilisable("indice de racine non entier positif".into()),
                ));
            }
            Some(reduire_puissance(
                x.clone(),
                Expr::rat(n.recip()),
                journal,
                echeance,
            ))
        }

        Exp => match x {
            _ if x.est_rat(0) => Some(Expr::entier(1)),
            _ if x.est_rat(1) => Some(Expr::Constante(Constante::E)),
            Expr::Fonction(Ln, a, _) if a.len() == 1 => Some(a[0].clone()),
            _ => None,
        },

        Ln => match x {
            Expr::Constante(Constante::E) => Some(Expr::entier(1)),
            Expr::Op(Operateur::Puissance, v, _)
                if v.len() == 2 && v[0] == Expr::Constante(Constante::E) =>
            {
                Some(v[1].clone())
            }
            _ => match rat {
                Some(r) if !r.is_positive() => Some(indefini(
                    journal,
                    Avertissement::NonUtilisable("logarithme d’un nombre ≤ 0".into()),
                )),
                Some(r) if r.is_one() => Some(Expr::entier(0)),
                _ => None,
            },
        },

        Log => match args.get(1) {
            None => Some(Expr::fonction(Ln, vec![x.clone()])),
            Some(b) => logarithme(x, b.as_rat()?, journal),
        },
        Log10 => logarithme(x, &BigRational::from_integer(BigInt::from(10)), journal),
        Log2 => logarithme(x, &BigRational::from_integer(BigInt::from(2)), journal),

        Sin | Cos | Tan => {
            let tf = match f {
                Sin => TrigFn::Sin,
                Cos => TrigFn::Cos,
                _ => TrigFn::Tan,
            };
            match trig_special(x, tf) {
                Some(TrigOutcome::Valeur(e, preuve)) => {
                    journal.noter_preuve(preuve);
                    Some(e)
                }
                Some(TrigOutcome::Indefini(preuve)) => {
                    journal.noter_preuve(preuve.clone());
                    Some(indefini(journal, Avertissement::NonUtilisable(preuve)))
                }
                None => {
                    // parité : sin(-x) = -sin(x), cos(-x) = cos(x)
                    let oppose = negatif_de(x)?;
                    let g = Expr::fonction(f, vec![oppose]);
                    Some(if f == Cos {
                        g
                    } else {
                        fois(Nombre::entier(-1), g)
                    })
                }
            }
        }

        Atan => match atan_special(x) {
            Some(TrigOutcome::Valeur(e, preuve)) => {
                journal.noter_preuve(preuve);
                Some(e)
            }
            _ => {
                let oppose = negatif_de(x)?;
                Some(fois(Nombre::entier(-1), Expr::fonction(Atan, vec![oppose])))
            }
        },

        Abs => match x {
            Expr::Num(n) => Some(Expr::Num(n.abs())),
            Expr::Constante(_) => Some(x.clone()),
            _ => negatif_de(x).map(|o| Expr::fonction(Abs, vec![o])),
        },

        Floor | Ceil | Round | Trunc => {
            let arrondi = |r: &BigRational| match f {
                Floor => r.floor(),
                Ceil => r.ceil(),
                Round => r.round(),
                _ => r.trunc(),
            };
            match x {
                Expr::Num(Nombre::Exact(r)) => Some(Expr::rat(arrondi(r))),
                // approché : exact si les deux bornes tombent sur le même entier
                Expr::Num(Nombre::Approx(i)) => {
                    let (a, b) = (arrondi(i.bas()), arrondi(i.haut()));
                    (a == b).then(|| Expr::rat(a))
                }
                _ => None,
            }
        }

        Fact => {
            let r = rat?;
            if !r.is_integer() || r.is_negative() {
                return Some(indefini(
                    journal,
                    Avertissement::NonUtilisable("factorielle hors des entiers naturels".into()),
                ));
            }
            // n! a au plus n·bits(n) bits ; au-delà, reste symbolique
            let n = r
                .numer()
                .to_u64()
                .filter(|n| u64::from(64 - n.leading_zeros()).saturating_mul(*n) <= BITS_MAX)?;
            factorielle(n, echeance)
                .ok()
                .map(|v| Expr::rat(BigRational::from_integer(v)))
        }

        Min | Max => {
            let mut meilleur: Option<&Nombre> = None;
            for a in args {
                let n = a.as_nombre()?;
                meilleur = Some(match meilleur {
                    None => n,
                    Some(m) => {
                        let voulu = if f == Min {
                            Ordering::Less
                        } else {
                            Ordering::Greater
                        };
                        if n.comparer(m)? == voulu {
                            n
                        } else {
                            m
                        }
                    }
                });
            }
            meilleur.map(|n| Expr::Num(n.clone()))
        }

        Gcd | Lcm => {
            let mut acc: Option<BigInt> = None;
            for a in args {
                let r = a.as_rat()?;
                if !r.is_integer() {
                    return Some(indefini(
                        journal,
                        Avertissement::NonUtilisable(format!("{} d’un non-entier", f.nom())),
                    ));
                }
                let n = r.numer();
                acc = Some(match acc {
                    None => n.abs(),
                    Some(m) if f == Gcd => m.gcd(n),
                    Some(m) => m.lcm(n),
                });
            }
            acc.map(|n| Expr::rat(BigRational::from_integer(n)))
        }
    }
}

/// log_b(x) : exact si x = b^k (k entier), sinon inchangé.
fn logarithme(x: &Expr, b: &BigRational, journal: &mut Journal) -> Option<Expr> {
    if !b.is_positive() || b.is_one() {
        return Some(indefini(
            journal,
            Avertissement::NonUtilisable("base de logarithme invalide".into()),
        ));
    }
    let r = x.as_rat()?;
    if !r.is_positive() {
        return Some(indefini(
            journal,
            Avertissement::NonUtilisable("logarithme d’un nombre ≤ 0".into()),
        ));
    }
    log_exact(r, b).map(|k| Expr::rat(BigRational::from_integer(k)))
}

fn log_exact(x: &BigRational, b: &BigRational) -> Option<BigInt> {
    if x.is_one() {
        return Some(BigInt::zero());
    }
    if *b < BigRational::one() {
        return log_exact(x, &b.recip()).map(|k| -k);
    }
    if *x < BigRational::one() {
        return log_exact(&x.recip(), b).map(|k| -k);
    }

    let mut p = b.clone();
    let mut k: i64 = 1;
    while p < *x {
        if k >= 4096 || p.numer().bits() > BITS_EXTRACTION_MAX {
            return None;
        }
        p *= b;
        k += 1;
    }
    (p == *x).then(|| BigInt::from(k))
}

fn factorielle(n: u64, echeance: &Echeance) -> Result<BigInt, ErreurNombre> {
    let mut acc = BigInt::one();
    for k in 2..=n {
        if k % 64 == 0 {
            echeance.verifier()?;
        }
        acc *= k;
    }
    Ok(acc)
}
