// src/noyau/lecture.rs
//
// Noyaux approchés en virgule fixe (entiers “scalés” ×10^w), sans flottants.
// - π (Machin) + cache par précision
// - √ / racine n-ième (racine entière exacte de x·S^n)
// - exp (Taylor + carrés), ln (atanh), sin/cos (réduction mod 2π), atan (demi-angle)
//
// Chaque noyau rend un Intervalle qui ENCADRE la vraie valeur :
// valeur scalée ± marge, la marge couvrant les troncatures de la série.

use std::collections::HashMap;
use std::sync::OnceLock;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use parking_lot::Mutex;

use super::echeance::Echeance;
use super::erreurs::ErreurNombre;
use super::nombre::Intervalle;

/// |x| au-delà duquel exp(x) est refusé (résultat de plusieurs dizaines de milliers de chiffres).
const EXP_ARG_MAX: i64 = 100_000;

/* ------------------------ Virgule fixe ------------------------ */

pub(crate) fn pow10(n: usize) -> BigInt {
    BigInt::from(10).pow(n as u32)
}

/// Nombre de chiffres décimaux de n (au moins 1).
fn nb_chiffres(n: usize) -> usize {
    n.to_string().len()
}

/// Ordre de grandeur décimal approximatif de |x| (peut se tromper de ±1).
pub(crate) fn magnitude10(x: &BigRational) -> i64 {
    if x.is_zero() {
        return 0;
    }
    let e2 = x.numer().bits() as i64 - x.denom().bits() as i64;
    (e2 * 30103).div_euclid(100_000)
}

/// Précision de travail : échelle S = 10^w, avec w = chiffres + garde + extra.
struct Travail {
    w: usize,
    echelle: BigInt,
    nd: usize,
}

impl Travail {
    fn new(chiffres: usize, extra: usize) -> Self {
        let nd = nb_chiffres(chiffres);
        let w = chiffres + 12 + nd + extra;
        Self {
            w,
            echelle: pow10(w),
            nd,
        }
    }

    /// Marge d’erreur en ulps, élargie de 10^extra quand la réduction d’argument l’exige.
    fn marge(&self, extra: usize) -> BigInt {
        pow10(4 + self.nd + extra)
    }

    /// floor(x·S)
    fn fixe(&self, x: &BigRational) -> BigInt {
        (x.numer() * &self.echelle).div_floor(x.denom())
    }

    fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        (a * b) / &self.echelle
    }

    /// [v - m, v + m] / S, arrondi vers l’extérieur à `chiffres`.
    fn encadrer(&self, v: &BigInt, marge: &BigInt, chiffres: usize) -> Intervalle {
        let bas = BigRational::new(v - marge, self.echelle.clone());
        let haut = BigRational::new(v + marge, self.echelle.clone());
        Intervalle::new(bas, haut, chiffres)
    }
}

fn sonder(echeance: Option<&Echeance>) -> Result<(), ErreurNombre> {
    match echeance {
        Some(e) => e.verifier(),
        None => Ok(()),
    }
}

/* ------------------------ π (Machin) + cache ------------------------ */

/// arctan(1/q) en entier scalé (troncature) via série:
/// atan(z) = z - z^3/3 + z^5/5 - ...
fn arctan_inv_q_scaled(
    q: i64,
    scale: &BigInt,
    echeance: Option<&Echeance>,
) -> Result<BigInt, ErreurNombre> {
    let q = BigInt::from(q);
    let q2 = &q * &q;

    let mut k: usize = 0;
    let mut sign_pos = true;

    // q^(2k+1)
    let mut q_pow = q.clone();
    let mut sum = BigInt::zero();

    loop {
        sonder(echeance)?;

        let d = &q_pow * BigInt::from(2 * k + 1);
        let term = scale / &d;
        if term.is_zero() {
            break;
        }

        if sign_pos {
            sum += &term;
        } else {
            sum -= &term;
        }

        q_pow *= &q2;
        sign_pos = !sign_pos;
        k += 1;
    }

    Ok(sum)
}

fn pi_scaled_compute(digits: usize, echeance: Option<&Echeance>) -> Result<BigInt, ErreurNombre> {
    // extra pour amortir les erreurs de troncature
    let extra = 10usize;
    let scale = pow10(digits + extra);

    // Machin : π = 16*atan(1/5) - 4*atan(1/239)
    let a = arctan_inv_q_scaled(5, &scale, echeance)?;
    let b = arctan_inv_q_scaled(239, &scale, echeance)?;

    let pi = BigInt::from(16) * a - BigInt::from(4) * b;
    Ok(pi / pow10(extra))
}

static PI_CACHE: OnceLock<Mutex<HashMap<usize, BigInt>>> = OnceLock::new();

/// floor-ish(π·10^digits), erreur < 2 ulps. Un calcul interrompu n’est pas mis en cache.
fn pi_scaled_cached(digits: usize, echeance: Option<&Echeance>) -> Result<BigInt, ErreurNombre> {
    let m = PI_CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    if let Some(v) = m.lock().get(&digits) {
        return Ok(v.clone());
    }

    // hors verrou : deux calculs concurrents du même π sont acceptables
    let v = pi_scaled_compute(digits, echeance)?;
    m.lock().insert(digits, v.clone());
    Ok(v)
}

fn pi_fixe(t: &Travail, echeance: Option<&Echeance>) -> Result<BigInt, ErreurNombre> {
    pi_scaled_cached(t.w, echeance)
}

pub fn pi(chiffres: usize, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    let t = Travail::new(chiffres, 0);
    let p = pi_fixe(&t, echeance)?;
    Ok(t.encadrer(&p, &t.marge(0), chiffres))
}

/* ------------------------ Racines ------------------------ */

/// Au-delà, S^n serait démesuré : x^(1/n) passe par exp(ln(x)/n).
const INDICE_DIRECT_MAX: u32 = 64;

/// Racine n-ième d’un rationnel ≥ 0 : floor((x·S^n)^(1/n)) est exact, d’où [y, y+1]/S.
fn racine_point(
    x: &BigRational,
    n: u32,
    chiffres: usize,
    echeance: Option<&Echeance>,
) -> Result<Intervalle, ErreurNombre> {
    if let Some(e) = echeance {
        e.verifier()?;
    }
    if x.is_negative() {
        return Err(ErreurNombre::HorsDomaine("racine d’un nombre négatif"));
    }
    if x.is_zero() {
        return Ok(Intervalle::point(BigRational::zero(), chiffres));
    }
    if n > INDICE_DIRECT_MAX {
        let l = ln_point(x, chiffres, echeance)?;
        let q = BigRational::from_integer(BigInt::from(n));
        let y = Intervalle::new(l.bas() / &q, l.haut() / &q, chiffres);
        return exp(&y, echeance);
    }

    // petits nombres : on élargit l’échelle pour garder des chiffres significatifs
    let extra = (-magnitude10(x)).max(0) as usize / n as usize + 1;
    let t = Travail::new(chiffres, extra);

    let sn = t.echelle.pow(n);
    let cible = (x.numer() * sn).div_floor(x.denom());
    let y = cible.nth_root(n);

    let bas = BigRational::new(y.clone(), t.echelle.clone());
    let haut = BigRational::new(y + 1u32, t.echelle.clone());
    Ok(Intervalle::new(bas, haut, chiffres))
}

pub fn racine(
    x: &Intervalle,
    n: u32,
    echeance: Option<&Echeance>,
) -> Result<Intervalle, ErreurNombre> {
    if n == 0 {
        return Err(ErreurNombre::HorsDomaine("racine d’indice nul"));
    }
    if x.haut().is_negative() {
        if n % 2 == 1 {
            // racine impaire : impaire en x
            return Ok(racine(&x.neg(), n, echeance)?.neg());
        }
        return Err(ErreurNombre::HorsDomaine("racine paire d’un nombre négatif"));
    }
    if x.bas().is_negative() {
        if n % 2 == 1 {
            let bas = racine_point(&-x.bas().clone(), n, x.chiffres(), echeance)?.neg();
            let haut = racine_point(x.haut(), n, x.chiffres(), echeance)?;
            return Ok(Intervalle::new(
                bas.bas().clone(),
                haut.haut().clone(),
                x.chiffres(),
            ));
        }
        return Err(ErreurNombre::Imprecis);
    }
    let bas = racine_point(x.bas(), n, x.chiffres(), echeance)?;
    let haut = racine_point(x.haut(), n, x.chiffres(), echeance)?;
    Ok(Intervalle::new(
        bas.bas().clone(),
        haut.haut().clone(),
        x.chiffres(),
    ))
}

/* ------------------------ exp ------------------------ */

fn exp_point(
    x: &BigRational,
    chiffres: usize,
    echeance: Option<&Echeance>,
) -> Result<Intervalle, ErreurNombre> {
    if x.is_zero() {
        return Ok(Intervalle::point(BigRational::one(), chiffres));
    }
    if x.abs() > BigRational::from_integer(BigInt::from(EXP_ARG_MAX)) {
        return Err(ErreurNombre::Depassement);
    }
    if x.is_negative() {
        // exp(-x) = 1/exp(x) : garde la précision relative
        let e = exp_point(&-x.clone(), chiffres, echeance)?;
        return e.inverse();
    }

    // réduction : r = x / 2^m, |r| ≤ 1/2
    let e2 = x.numer().bits() as i64 - x.denom().bits() as i64;
    let m = (e2 + 2).max(0) as usize;
    let r = x / BigRational::from_integer(BigInt::one() << m);

    // chaque carré double l’erreur relative
    let extra = m * 30103 / 100_000 + 2;
    let t = Travail::new(chiffres, extra);
    let rf = t.fixe(&r);

    let mut somme = t.echelle.clone();
    let mut terme = t.echelle.clone();
    let mut k: u32 = 1;
    loop {
        sonder(echeance)?;
        terme = t.mul(&terme, &rf) / BigInt::from(k);
        if terme.is_zero() {
            break;
        }
        somme += &terme;
        k += 1;
    }

    for _ in 0..m {
        sonder(echeance)?;
        somme = t.mul(&somme, &somme);
    }

    // erreur relative ≤ marge·2^(m+1) / S
    let eps = BigRational::new(t.marge(0) << (m + 1), t.echelle.clone());
    let v = BigRational::new(somme, t.echelle.clone());
    let bas = &v * (BigRational::one() - &eps);
    let haut = &v * (BigRational::one() + &eps);
    Ok(Intervalle::new(bas, haut, chiffres))
}

pub fn exp(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    let bas = exp_point(x.bas(), x.chiffres(), echeance)?;
    if x.est_ponctuel() {
        return Ok(bas);
    }
    let haut = exp_point(x.haut(), x.chiffres(), echeance)?;
    Ok(Intervalle::new(
        bas.bas().clone(),
        haut.haut().clone(),
        x.chiffres(),
    ))
}

/* ------------------------ ln ------------------------ */

/// atanh(z) scalé, |z| ≤ 1/3 : z + z^3/3 + z^5/5 + ...
fn atanh_fixe(
    t: &Travail,
    z: &BigRational,
    echeance: Option<&Echeance>,
) -> Result<BigInt, ErreurNombre> {
    let zf = t.fixe(z);
    let z2 = t.mul(&zf, &zf);

    let mut puissance = zf;
    let mut somme = BigInt::zero();
    let mut j: u32 = 0;
    loop {
        sonder(echeance)?;
        let terme = &puissance / BigInt::from(2 * j + 1);
        if terme.is_zero() {
            break;
        }
        somme += terme;
        puissance = t.mul(&puissance, &z2);
        j += 1;
    }
    Ok(somme)
}

fn ln_point(
    x: &BigRational,
    chiffres: usize,
    echeance: Option<&Echeance>,
) -> Result<Intervalle, ErreurNombre> {
    if !x.is_positive() {
        return Err(ErreurNombre::HorsDomaine("logarithme d’un nombre non positif"));
    }
    if x.is_one() {
        return Ok(Intervalle::point(BigRational::zero(), chiffres));
    }

    // x = 2^k · m, m ∈ [1/2, 2]
    let k = x.numer().bits() as i64 - x.denom().bits() as i64;
    let deux_k = BigRational::from_integer(BigInt::one() << k.unsigned_abs() as usize);
    let m = if k >= 0 { x / &deux_k } else { x * &deux_k };

    let extra = nb_chiffres(k.unsigned_abs() as usize) + 2;
    let t = Travail::new(chiffres, extra);

    // ln(m) = 2·atanh((m-1)/(m+1))
    let z = (&m - BigRational::one()) / (&m + BigRational::one());
    let ln_m = atanh_fixe(&t, &z, echeance)? * BigInt::from(2);

    // ln 2 = 2·atanh(1/3)
    let tiers = BigRational::new(BigInt::one(), BigInt::from(3));
    let ln2 = atanh_fixe(&t, &tiers, echeance)? * BigInt::from(2);

    let v = ln2 * BigInt::from(k) + ln_m;
    Ok(t.encadrer(&v, &t.marge(extra), chiffres))
}

pub fn ln(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    if !x.bas().is_positive() {
        if x.haut().is_positive() {
            return Err(ErreurNombre::Imprecis);
        }
        return Err(ErreurNombre::HorsDomaine("logarithme d’un nombre non positif"));
    }
    let bas = ln_point(x.bas(), x.chiffres(), echeance)?;
    if x.est_ponctuel() {
        return Ok(bas);
    }
    let haut = ln_point(x.haut(), x.chiffres(), echeance)?;
    Ok(Intervalle::new(
        bas.bas().clone(),
        haut.haut().clone(),
        x.chiffres(),
    ))
}

/* ------------------------ sin / cos ------------------------ */

/// (sin(x), cos(x)) scalés, après réduction modulo 2π.
fn sin_cos_fixe(
    t: &Travail,
    x: &BigRational,
    echeance: Option<&Echeance>,
) -> Result<(BigInt, BigInt), ErreurNombre> {
    let xf = t.fixe(x);
    let p = pi_fixe(t, echeance)?;
    let deux_pi = &p * BigInt::from(2);

    // k = round(x / 2π), r = x - 2πk ∈ [-π, π]
    let k = (&xf + &p).div_floor(&deux_pi);
    let r = xf - k * &deux_pi;
    let r2 = t.mul(&r, &r);

    let mut sin = BigInt::zero();
    let mut terme = r;
    let mut n: u32 = 1;
    loop {
        sonder(echeance)?;
        if terme.is_zero() {
            break;
        }
        sin += &terme;
        terme = -t.mul(&terme, &r2) / BigInt::from((n + 1) * (n + 2));
        n += 2;
    }

    let mut cos = BigInt::zero();
    let mut terme = t.echelle.clone();
    let mut n: u32 = 0;
    loop {
        sonder(echeance)?;
        if terme.is_zero() {
            break;
        }
        cos += &terme;
        terme = -t.mul(&terme, &r2) / BigInt::from((n + 1) * (n + 2));
        n += 2;
    }

    Ok((sin, cos))
}

fn extra_reduction(x: &BigRational) -> usize {
    magnitude10(x).max(0) as usize + 2
}

fn borner_unite(i: Intervalle) -> Intervalle {
    let un = BigRational::one();
    let bas = i.bas().clone().max(-un.clone());
    let haut = i.haut().clone().min(un);
    Intervalle::new(bas, haut, i.chiffres())
}

/// f(milieu) ± rayon (|f'| ≤ 1 pour sin et cos).
fn sin_ou_cos(
    x: &Intervalle,
    echeance: Option<&Echeance>,
    sinus: bool,
) -> Result<Intervalle, ErreurNombre> {
    let milieu = x.milieu();
    if milieu.is_zero() && x.est_ponctuel() {
        let v = if sinus { BigRational::zero() } else { BigRational::one() };
        return Ok(Intervalle::point(v, x.chiffres()));
    }
    let extra = extra_reduction(&milieu);
    let t = Travail::new(x.chiffres(), extra);
    let (s, c) = sin_cos_fixe(&t, &milieu, echeance)?;
    let v = if sinus { s } else { c };
    let i = t.encadrer(&v, &t.marge(extra), x.chiffres());
    Ok(borner_unite(i.elargir(&x.rayon())))
}

pub fn sin(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    sin_ou_cos(x, echeance, true)
}

pub fn cos(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    sin_ou_cos(x, echeance, false)
}

pub fn tan(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    let s = sin(x, echeance)?;
    let c = cos(x, echeance)?;
    s.div(&c)
}

/* ------------------------ atan ------------------------ */

/// atan(y) scalé pour 0 ≤ y ≤ 1 : deux demi-angles puis Taylor.
fn atan_fixe(
    t: &Travail,
    y: &BigRational,
    echeance: Option<&Echeance>,
) -> Result<BigInt, ErreurNombre> {
    let s = &t.echelle;
    let mut yf = t.fixe(y);

    // y <- y / (1 + √(1+y²)) : atan(y) = 2·atan(y')
    for _ in 0..2 {
        let racine = (s * s + &yf * &yf).sqrt();
        yf = (&yf * s) / (s + racine);
    }

    let y2 = t.mul(&yf, &yf);
    let mut puissance = yf;
    let mut somme = BigInt::zero();
    let mut j: u32 = 0;
    loop {
        sonder(echeance)?;
        let terme = &puissance / BigInt::from(2 * j + 1);
        if terme.is_zero() {
            break;
        }
        if j % 2 == 0 {
            somme += terme;
        } else {
            somme -= terme;
        }
        puissance = t.mul(&puissance, &y2);
        j += 1;
    }
    Ok(somme * BigInt::from(4))
}

fn atan_point(
    x: &BigRational,
    chiffres: usize,
    echeance: Option<&Echeance>,
) -> Result<Intervalle, ErreurNombre> {
    if x.is_zero() {
        return Ok(Intervalle::point(BigRational::zero(), chiffres));
    }
    if x.is_negative() {
        return Ok(atan_point(&-x.clone(), chiffres, echeance)?.neg());
    }

    let extra = (-magnitude10(x)).max(0) as usize;
    let t = Travail::new(chiffres, extra);
    let marge = t.marge(0);

    if x > &BigRational::one() {
        // atan(x) = π/2 - atan(1/x)
        let p = pi_fixe(&t, echeance)?;
        let a = atan_fixe(&t, &x.recip(), echeance)?;
        return Ok(t.encadrer(&(p / BigInt::from(2) - a), &marge, chiffres));
    }
    let a = atan_fixe(&t, x, echeance)?;
    Ok(t.encadrer(&a, &marge, chiffres))
}

pub fn atan(x: &Intervalle, echeance: Option<&Echeance>) -> Result<Intervalle, ErreurNombre> {
    let bas = atan_point(x.bas(), x.chiffres(), echeance)?;
    if x.est_ponctuel() {
        return Ok(bas);
    }
    let haut = atan_point(x.haut(), x.chiffres(), echeance)?;
    Ok(Intervalle::new(
        bas.bas().clone(),
        haut.haut().clone(),
        x.chiffres(),
    ))
}

/* ------------------------ Divers ------------------------ */

/// Conversion SAFE vers i64 d’un entier rationnel.
pub(crate) fn rat_to_i64(r: &BigRational) -> Option<i64> {
    if !r.is_integer() {
        return None;
    }
    r.numer().to_i64()
}
