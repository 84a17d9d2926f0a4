// src/noyau/nombre.rs
//
// Modèle de nombre : EXACT (rationnel BigRational) ou APPROCHÉ (intervalle rationnel).
//
// Invariants :
// - une opération purement exacte reste exacte (1/3 reste 1/3, jamais 0.333…)
// - l’approximation n’apparaît que si le résultat n’est pas représentable
//   (racine non parfaite, transcendante) ou si un opérande est déjà approché
// - un intervalle encadre TOUJOURS la vraie valeur (arrondi vers l’extérieur)

use std::cmp::Ordering;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::echeance::Echeance;
use super::erreurs::ErreurNombre;
use super::lecture;

/// Chiffres de garde ajoutés à la précision demandée pour les calculs approchés.
pub const CHIFFRES_GARDE: usize = 10;

/// Plafond dur de précision (chiffres significatifs).
pub const PRECISION_MAX: usize = 5000;

/// Taille maximale (en bits) d’un résultat exact de puissance.
pub const BITS_MAX: u64 = 1 << 22;

/// Essais de division bornés pour l’extraction des puissances parfaites.
const ESSAIS_MAX: u32 = 10_000;

/* ------------------------ Intervalle ------------------------ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intervalle {
    bas: BigRational,
    haut: BigRational,
    chiffres: usize,
}

fn bits_pour(chiffres: usize) -> u64 {
    (chiffres as u64) * 10 / 3 + 16
}

/// Arrondi à `bits` bits significatifs, vers -∞ (ou +∞ si `vers_haut`).
fn arrondir(x: &BigRational, bits: u64, vers_haut: bool) -> BigRational {
    let n = x.numer();
    let d = x.denom();
    if x.is_zero() || n.bits() + d.bits() <= 2 * bits {
        return x.clone();
    }

    let e = n.bits() as i64 - d.bits() as i64;
    let decal = bits as i64 - e;

    let (num, den) = if decal >= 0 {
        (n.clone() << decal as usize, d.clone())
    } else {
        (n.clone(), d.clone() << (-decal) as usize)
    };

    let q = if vers_haut {
        -((-num).div_floor(&den))
    } else {
        num.div_floor(&den)
    };

    if decal >= 0 {
        BigRational::new(q, BigInt::one() << decal as usize)
    } else {
        BigRational::from_integer(q << (-decal) as usize)
    }
}

impl Intervalle {
    pub fn new(bas: BigRational, haut: BigRational, chiffres: usize) -> Self {
        let (bas, haut) = if bas <= haut { (bas, haut) } else { (haut, bas) };
        let bits = bits_pour(chiffres);
        Self {
            bas: arrondir(&bas, bits, false),
            haut: arrondir(&haut, bits, true),
            chiffres,
        }
    }

    pub fn point(x: BigRational, chiffres: usize) -> Self {
        Self::new(x.clone(), x, chiffres)
    }

    pub fn bas(&self) -> &BigRational {
        &self.bas
    }

    pub fn haut(&self) -> &BigRational {
        &self.haut
    }

    pub fn chiffres(&self) -> usize {
        self.chiffres
    }

    pub fn est_ponctuel(&self) -> bool {
        self.bas == self.haut
    }

    pub fn milieu(&self) -> BigRational {
        (&self.bas + &self.haut) / BigRational::from_integer(BigInt::from(2))
    }

    pub fn rayon(&self) -> BigRational {
        (&self.haut - &self.bas) / BigRational::from_integer(BigInt::from(2))
    }

    pub fn contient_zero(&self) -> bool {
        !self.bas.is_positive() && !self.haut.is_negative()
    }

    /// Signe certain, ou None si l’intervalle chevauche 0 (sans être {0}).
    pub fn signe(&self) -> Option<Ordering> {
        if self.bas.is_positive() {
            Some(Ordering::Greater)
        } else if self.haut.is_negative() {
            Some(Ordering::Less)
        } else if self.bas.is_zero() && self.haut.is_zero() {
            Some(Ordering::Equal)
        } else {
            None
        }
    }

    pub fn elargir(&self, r: &BigRational) -> Self {
        Self::new(&self.bas - r, &self.haut + r, self.chiffres)
    }

    pub fn neg(&self) -> Self {
        Self::new(-self.haut.clone(), -self.bas.clone(), self.chiffres)
    }

    pub fn add(&self, o: &Self) -> Self {
        Self::new(
            &self.bas + &o.bas,
            &self.haut + &o.haut,
            self.chiffres.min(o.chiffres),
        )
    }

    pub fn sub(&self, o: &Self) -> Self {
        self.add(&o.neg())
    }

    pub fn mul(&self, o: &Self) -> Self {
        let produits = [
            &self.bas * &o.bas,
            &self.bas * &o.haut,
            &self.haut * &o.bas,
            &self.haut * &o.haut,
        ];
        let mut bas = produits[0].clone();
        let mut haut = produits[0].clone();
        for p in &produits[1..] {
            if p < &bas {
                bas = p.clone();
            }
            if p > &haut {
                haut = p.clone();
            }
        }
        Self::new(bas, haut, self.chiffres.min(o.chiffres))
    }

    pub fn inverse(&self) -> Result<Self, ErreurNombre> {
        if self.bas.is_zero() && self.haut.is_zero() {
            return Err(ErreurNombre::DivisionParZero);
        }
        if self.contient_zero() {
            return Err(ErreurNombre::Imprecis);
        }
        Ok(Self::new(self.haut.recip(), self.bas.recip(), self.chiffres))
    }

    pub fn div(&self, o: &Self) -> Result<Self, ErreurNombre> {
        Ok(self.mul(&o.inverse()?))
    }

    /// Puissance entière, monotone par morceaux (arrondi à chaque carré).
    pub fn pow_entier(&self, n: &BigInt, echeance: &Echeance) -> Result<Self, ErreurNombre> {
        if n.is_zero() {
            return Ok(Self::point(BigRational::one(), self.chiffres));
        }
        if n.is_negative() {
            return self.pow_entier(&-n, echeance)?.inverse();
        }

        let pair = n.is_even();
        let bits = bits_pour(self.chiffres);

        let (bas, haut) = if !self.bas.is_negative() {
            (
                pow_arrondie(&self.bas, n, bits, false, echeance)?,
                pow_arrondie(&self.haut, n, bits, true, echeance)?,
            )
        } else if !self.haut.is_positive() {
            let b = pow_arrondie(&-self.haut.clone(), n, bits, false, echeance)?;
            let h = pow_arrondie(&-self.bas.clone(), n, bits, true, echeance)?;
            if pair {
                (b, h)
            } else {
                (-h, -b)
            }
        } else {
            // chevauche 0
            let hb = pow_arrondie(&-self.bas.clone(), n, bits, true, echeance)?;
            let hh = pow_arrondie(&self.haut, n, bits, true, echeance)?;
            if pair {
                (BigRational::zero(), hb.max(hh))
            } else {
                (-hb, hh)
            }
        };
        Ok(Self::new(bas, haut, self.chiffres))
    }

    /// Intervalles disjoints => ordre certain.
    pub fn comparer(&self, o: &Self) -> Option<Ordering> {
        if self.haut < o.bas {
            Some(Ordering::Less)
        } else if self.bas > o.haut {
            Some(Ordering::Greater)
        } else if self.est_ponctuel() && o.est_ponctuel() && self.bas == o.bas {
            Some(Ordering::Equal)
        } else {
            None
        }
    }
}

/// x^n pour x ≥ 0, carrés successifs arrondis dans le sens demandé (monotone).
/// La mantisse reste bornée mais pas l’exposant binaire : Depassement au-delà de BITS_MAX.
fn pow_arrondie(
    x: &BigRational,
    n: &BigInt,
    bits: u64,
    vers_haut: bool,
    echeance: &Echeance,
) -> Result<BigRational, ErreurNombre> {
    let mut acc = BigRational::one();
    let mut b = x.clone();
    let mut e = n.clone();
    let deux = BigInt::from(2);

    while !e.is_zero() {
        echeance.verifier()?;
        if e.is_odd() {
            acc = arrondir(&(&acc * &b), bits, vers_haut);
        }
        e /= &deux;
        if !e.is_zero() {
            b = arrondir(&(&b * &b), bits, vers_haut);
        }
        if demesure(&acc) || demesure(&b) {
            return Err(ErreurNombre::Depassement);
        }
    }
    Ok(acc)
}

fn demesure(x: &BigRational) -> bool {
    x.numer().bits().max(x.denom().bits()) > BITS_MAX
}

/* ------------------------ Nombre ------------------------ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nombre {
    Exact(BigRational),
    Approx(Intervalle),
}

impl Nombre {
    pub fn entier(n: i64) -> Self {
        Nombre::Exact(BigRational::from_integer(BigInt::from(n)))
    }

    pub fn rationnel(n: i64, d: i64) -> Self {
        Nombre::Exact(BigRational::new(BigInt::from(n), BigInt::from(d)))
    }

    pub fn zero() -> Self {
        Nombre::Exact(BigRational::zero())
    }

    pub fn un() -> Self {
        Nombre::Exact(BigRational::one())
    }

    pub fn est_exact(&self) -> bool {
        matches!(self, Nombre::Exact(_))
    }

    pub fn as_rat(&self) -> Option<&BigRational> {
        match self {
            Nombre::Exact(r) => Some(r),
            Nombre::Approx(_) => None,
        }
    }

    /// Zéro exact seulement.
    pub fn est_zero(&self) -> bool {
        matches!(self, Nombre::Exact(r) if r.is_zero())
    }

    pub fn est_un(&self) -> bool {
        matches!(self, Nombre::Exact(r) if r.is_one())
    }

    pub fn est_entier(&self) -> bool {
        matches!(self, Nombre::Exact(r) if r.is_integer())
    }

    /// Précision portée (None pour un exact).
    pub fn chiffres(&self) -> Option<usize> {
        match self {
            Nombre::Exact(_) => None,
            Nombre::Approx(i) => Some(i.chiffres()),
        }
    }

    pub fn intervalle(&self, chiffres: usize) -> Intervalle {
        match self {
            Nombre::Exact(r) => Intervalle::point(r.clone(), chiffres),
            Nombre::Approx(i) => i.clone(),
        }
    }

    pub fn signe(&self) -> Option<Ordering> {
        match self {
            Nombre::Exact(r) => Some(r.cmp(&BigRational::zero())),
            Nombre::Approx(i) => i.signe(),
        }
    }

    /// Ordre certain, None si deux approchés se chevauchent.
    pub fn comparer(&self, o: &Nombre) -> Option<Ordering> {
        match (self, o) {
            (Nombre::Exact(a), Nombre::Exact(b)) => Some(a.cmp(b)),
            _ => {
                let c = chiffres_communs(self, o);
                self.intervalle(c).comparer(&o.intervalle(c))
            }
        }
    }

    pub fn abs(&self) -> Nombre {
        match self.signe() {
            Some(Ordering::Less) => -self,
            Some(_) => self.clone(),
            None => match self {
                Nombre::Exact(_) => self.clone(),
                Nombre::Approx(i) => {
                    let h = i.bas().abs().max(i.haut().abs());
                    Nombre::Approx(Intervalle::new(BigRational::zero(), h, i.chiffres()))
                }
            },
        }
    }

    pub fn inverse(&self) -> Result<Nombre, ErreurNombre> {
        match self {
            Nombre::Exact(r) if r.is_zero() => Err(ErreurNombre::DivisionParZero),
            Nombre::Exact(r) => Ok(Nombre::Exact(r.recip())),
            Nombre::Approx(i) => Ok(Nombre::Approx(i.inverse()?)),
        }
    }

    pub fn div(&self, o: &Nombre) -> Result<Nombre, ErreurNombre> {
        Ok(self * &o.inverse()?)
    }

    /// Puissance.
    /// - exact ^ entier : exact (borné par BITS_MAX)
    /// - exact ^ p/q : exact si racine q-ième parfaite, sinon approché à `chiffres`
    /// - approché : intervalle (exp(y·ln x) pour un exposant non entier)
    pub fn pow(
        &self,
        exposant: &Nombre,
        chiffres: usize,
        echeance: &Echeance,
    ) -> Result<Nombre, ErreurNombre> {
        match (self, exposant) {
            (Nombre::Exact(b), Nombre::Exact(x)) => pow_exacte(b, x, chiffres, echeance),

            (Nombre::Approx(i), Nombre::Exact(x)) if x.is_integer() => {
                Ok(Nombre::Approx(i.pow_entier(x.numer(), echeance)?))
            }

            _ => {
                let c = chiffres_communs(self, exposant).min(chiffres.max(1));
                let base = self.intervalle(c);
                let y = exposant.intervalle(c);
                if base.signe() == Some(Ordering::Equal) {
                    return match y.signe() {
                        Some(Ordering::Greater) => Ok(Nombre::zero()),
                        Some(Ordering::Less) => Err(ErreurNombre::DivisionParZero),
                        _ => Err(ErreurNombre::Imprecis),
                    };
                }
                let ln = lecture::ln(&base, Some(echeance))?;
                Ok(Nombre::Approx(lecture::exp(&ln.mul(&y), Some(echeance))?))
            }
        }
    }

    /// Racine n-ième réelle (exacte si parfaite).
    pub fn racine(
        &self,
        n: u32,
        chiffres: usize,
        echeance: &Echeance,
    ) -> Result<Nombre, ErreurNombre> {
        match self {
            Nombre::Exact(r) => {
                if let Some(x) = racine_exacte(r, n) {
                    return Ok(Nombre::Exact(x));
                }
                if r.is_negative() && n % 2 == 0 {
                    return Err(ErreurNombre::HorsDomaine("racine paire d’un nombre négatif"));
                }
                Ok(Nombre::Approx(lecture::racine(
                    &Intervalle::point(r.clone(), chiffres),
                    n,
                    Some(echeance),
                )?))
            }
            Nombre::Approx(i) => Ok(Nombre::Approx(lecture::racine(i, n, Some(echeance))?)),
        }
    }
}

fn chiffres_communs(a: &Nombre, b: &Nombre) -> usize {
    match (a.chiffres(), b.chiffres()) {
        (Some(x), Some(y)) => x.min(y),
        (Some(x), None) | (None, Some(x)) => x,
        (None, None) => PRECISION_MAX,
    }
}

fn pow_exacte(
    b: &BigRational,
    x: &BigRational,
    chiffres: usize,
    echeance: &Echeance,
) -> Result<Nombre, ErreurNombre> {
    if x.is_zero() {
        return Ok(Nombre::un());
    }
    if b.is_zero() {
        return if x.is_positive() {
            Ok(Nombre::zero())
        } else {
            Err(ErreurNombre::DivisionParZero)
        };
    }
    if b.is_one() {
        return Ok(Nombre::un());
    }

    let p = x.numer();
    let q = x.denom();

    if q.is_one() {
        return Ok(Nombre::Exact(rational_pow_int(b, p, echeance)?));
    }

    // exposant p/q : racine q-ième exacte ?
    let q32 = q.to_u32().ok_or(ErreurNombre::Depassement)?;
    if let Some(r) = racine_exacte(b, q32) {
        return Ok(Nombre::Exact(rational_pow_int(&r, p, echeance)?));
    }

    if b.is_negative() {
        if q.is_even() {
            return Err(ErreurNombre::HorsDomaine("racine paire d’un nombre négatif"));
        }
        // q impair : (-b)^(p/q) = ±|b|^(p/q)
        let m = pow_exacte(&-b.clone(), x, chiffres, echeance)?;
        return Ok(if p.is_odd() { -&m } else { m });
    }

    let base = Intervalle::point(b.clone(), chiffres);
    let y = Intervalle::point(x.clone(), chiffres);
    let ln = lecture::ln(&base, Some(echeance))?;
    Ok(Nombre::Approx(lecture::exp(&ln.mul(&y), Some(echeance))?))
}

/* ------------------------ Outils rationnels exacts ------------------------ */

/// base^exp exact, carré-multiplié, borné par BITS_MAX et sondé par l’échéance.
pub fn rational_pow_int(
    base: &BigRational,
    exp: &BigInt,
    echeance: &Echeance,
) -> Result<BigRational, ErreurNombre> {
    if exp.is_zero() {
        return Ok(BigRational::one());
    }
    if exp.is_negative() {
        if base.is_zero() {
            return Err(ErreurNombre::DivisionParZero);
        }
        return Ok(rational_pow_int(base, &-exp, echeance)?.recip());
    }

    let taille = base.numer().bits().max(base.denom().bits());
    let e = exp.to_u64().ok_or(ErreurNombre::Depassement)?;
    if taille > 1 && taille.saturating_mul(e) > BITS_MAX {
        return Err(ErreurNombre::Depassement);
    }

    // numérateur et dénominateur à part : des puissances de premiers entre eux
    // le restent, aucune réduction (pgcd) à refaire
    let mut e = e;
    let (mut n, mut d) = (BigInt::one(), BigInt::one());
    let (mut bn, mut bd) = (base.numer().clone(), base.denom().clone());

    while e > 0 {
        echeance.verifier()?;
        if (e & 1) == 1 {
            n *= &bn;
            d *= &bd;
        }
        e >>= 1;
        if e > 0 {
            bn = &bn * &bn;
            bd = &bd * &bd;
        }
    }
    Ok(BigRational::new_raw(n, d))
}

/// Produit exact ; deux entiers se multiplient sans passer par le pgcd.
fn produit_exact(a: &BigRational, b: &BigRational) -> BigRational {
    if a.is_integer() && b.is_integer() {
        BigRational::from_integer(a.numer() * b.numer())
    } else {
        a * b
    }
}

/// Somme exacte ; même raccourci pour deux entiers.
fn somme_exacte(a: &BigRational, b: &BigRational) -> BigRational {
    if a.is_integer() && b.is_integer() {
        BigRational::from_integer(a.numer() + b.numer())
    } else {
        a + b
    }
}

/// Racine n-ième exacte d’un rationnel (None si pas une puissance parfaite).
pub fn racine_exacte(r: &BigRational, n: u32) -> Option<BigRational> {
    if n == 0 {
        return None;
    }
    if r.is_negative() {
        if n % 2 == 0 {
            return None;
        }
        return racine_exacte(&-r.clone(), n).map(|x| -x);
    }
    let sn = int_racine_exacte(r.numer(), n)?;
    let sd = int_racine_exacte(r.denom(), n)?;
    Some(BigRational::new(sn, sd))
}

fn int_racine_exacte(x: &BigInt, n: u32) -> Option<BigInt> {
    let s = x.nth_root(n);
    if s.pow(n) == *x {
        Some(s)
    } else {
        None
    }
}

/// Décompose n > 0 en n = s^q · t, avec t sans facteur puissance q-ième (essais bornés).
pub fn extrait_puissance_parfaite(n: &BigInt, q: u32) -> (BigInt, BigInt) {
    if n.is_zero() || n.is_one() || q < 2 {
        return (BigInt::one(), n.clone());
    }

    let mut reste = n.clone();
    let mut s = BigInt::one();

    // reste entier parfait ?
    if let Some(r) = int_racine_exacte(&reste, q) {
        return (r, BigInt::one());
    }

    let mut p: u32 = 2;
    while p <= ESSAIS_MAX {
        let pb = BigInt::from(p);
        let pq = pb.pow(q);
        if pq > reste {
            break;
        }
        while (&reste % &pq).is_zero() {
            reste /= &pq;
            s *= &pb;
        }
        p = if p == 2 { 3 } else { p + 2 };
    }

    (s, reste)
}

/// Plus grand |exposant| développé à la lecture d’un littéral.
/// Au-delà, le littéral reste `chiffres · 10^e` et la puissance passe par BITS_MAX.
pub const EXPOSANT_LITTERAL_MAX: u64 = 100_000;

/// Littéral décimal décomposé en (chiffres, e) avec valeur = chiffres · 10^e :
/// "1.5e3" -> (15, 2), "0.25" -> (25, -2). Un exposant hors i64 est saturé.
pub fn decomposer_decimal(texte: &str) -> Option<(BigInt, i64)> {
    let (mantisse, exposant) = match texte.find(['e', 'E']) {
        Some(i) => (&texte[..i], exposant_sature(&texte[i + 1..])?),
        None => (texte, 0),
    };

    let (entiere, fraction) = match mantisse.split_once('.') {
        Some((a, b)) => (a, b),
        None => (mantisse, ""),
    };
    if entiere.is_empty() && fraction.is_empty() {
        return None;
    }
    if !entiere.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let chiffres = format!("{entiere}{fraction}");
    let n = BigInt::parse_bytes(chiffres.as_bytes(), 10)?;
    Some((n, exposant.saturating_sub(fraction.len() as i64)))
}

fn exposant_sature(texte: &str) -> Option<i64> {
    let (negatif, chiffres) = match texte.strip_prefix('-') {
        Some(c) => (true, c),
        None => (false, texte.strip_prefix('+').unwrap_or(texte)),
    };
    if chiffres.is_empty() || !chiffres.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let v = chiffres.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negatif { -v } else { v })
}

/// chiffres · 10^e en rationnel exact (e borné par l’appelant).
pub fn fois_puissance10(n: BigInt, e: i64) -> BigRational {
    let p = lecture::pow10(e.unsigned_abs() as usize);
    if e >= 0 {
        BigRational::from_integer(n * p)
    } else {
        BigRational::new(n, p)
    }
}

/// Littéral décimal exact : "12", "0.3048", ".5", "1.5e3", "2E-5".
/// None si mal formé ou si l’exposant dépasse EXPOSANT_LITTERAL_MAX.
pub fn rationnel_decimal(texte: &str) -> Option<BigRational> {
    let (n, e) = decomposer_decimal(texte)?;
    (e.unsigned_abs() <= EXPOSANT_LITTERAL_MAX).then(|| fois_puissance10(n, e))
}

/* ------------------------ Opérateurs ------------------------ */

impl Neg for &Nombre {
    type Output = Nombre;

    fn neg(self) -> Nombre {
        match self {
            Nombre::Exact(r) => Nombre::Exact(-r.clone()),
            Nombre::Approx(i) => Nombre::Approx(i.neg()),
        }
    }
}

impl Add for &Nombre {
    type Output = Nombre;

    fn add(self, o: &Nombre) -> Nombre {
        match (self, o) {
            (Nombre::Exact(a), Nombre::Exact(b)) => Nombre::Exact(somme_exacte(a, b)),
            _ => {
                let c = chiffres_communs(self, o);
                Nombre::Approx(self.intervalle(c).add(&o.intervalle(c)))
            }
        }
    }
}

impl Sub for &Nombre {
    type Output = Nombre;

    fn sub(self, o: &Nombre) -> Nombre {
        self + &(-o)
    }
}

impl Mul for &Nombre {
    type Output = Nombre;

    fn mul(self, o: &Nombre) -> Nombre {
        match (self, o) {
            (Nombre::Exact(a), Nombre::Exact(b)) => Nombre::Exact(produit_exact(a, b)),
            // 0 exact absorbe même un approché
            (Nombre::Exact(a), _) | (_, Nombre::Exact(a)) if a.is_zero() => Nombre::zero(),
            _ => {
                let c = chiffres_communs(self, o);
                Nombre::Approx(self.intervalle(c).mul(&o.intervalle(c)))
            }
        }
    }
}

impl From<BigRational> for Nombre {
    fn from(r: BigRational) -> Self {
        Nombre::Exact(r)
    }
}

impl From<i64> for Nombre {
    fn from(n: i64) -> Self {
        Nombre::entier(n)
    }
}
