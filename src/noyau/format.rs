// src/noyau/format.rs
//
// Rendu texte d’un résultat (Expr finale) selon les OptionsImpression.
// - rationnels : fraction, décimal exact, ou décimal tronqué + marque de série infinie
// - approchés : milieu arrondi, uniquement les chiffres certifiés par l’intervalle
// - notation scientifique hors de [1E-7, 1E+21)
// - unités après une espace : "9.81 m/s²"
// - symbolique : √3/2, 3π/4, 1 − x

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::canon::reconstruire;
use super::erreurs::{Avertissement, Journal, NonImprimable};
use super::eval::unite_simple;
use super::expr::{Constante, Expr, Operateur};
use super::lecture::{magnitude10, pow10};
use super::nombre::{Intervalle, Nombre};
use super::options::{ModeFraction, OptionsImpression, StyleSignes};

/// Exposant décimal à partir duquel on passe en notation scientifique.
const SCI_MAX: i64 = 21;
/// En dessous de 10^SCI_MIN : notation scientifique.
const SCI_MIN: i64 = -7;

/* ------------------------ Glyphes ------------------------ */

struct Glyphes {
    moins: &'static str,
    fois: &'static str,
    fois_unites: &'static str,
    approx: &'static str,
    plus_moins: &'static str,
    serie: &'static str,
    indefini: &'static str,
    pi: &'static str,
    exposants: bool,
}

impl Glyphes {
    fn pour(style: StyleSignes) -> Self {
        match style {
            StyleSignes::Etendu => Self {
                moins: "−",
                fois: "×",
                fois_unites: "·",
                approx: "≈",
                plus_moins: "±",
                serie: "…",
                indefini: "indéfini",
                pi: "π",
                exposants: true,
            },
            StyleSignes::Ascii => Self {
                moins: "-",
                fois: "*",
                fois_unites: "*",
                approx: "~",
                plus_moins: "+/-",
                serie: "...",
                indefini: "indefini",
                pi: "pi",
                exposants: false,
            },
        }
    }
}

fn exposant_unicode(k: i64) -> String {
    k.to_string()
        .chars()
        .map(|c| match c {
            '-' => '⁻',
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            _ => '⁹',
        })
        .collect()
}

/* ------------------------ Décimaux ------------------------ */

fn puissance10(e: i64) -> BigRational {
    let p = BigRational::from_integer(pow10(e.unsigned_abs() as usize));
    if e >= 0 {
        p
    } else {
        p.recip()
    }
}

/// ⌊log10 |x|⌋, x ≠ 0.
fn exposant10(x: &BigRational) -> i64 {
    let x = x.abs();
    let mut e = magnitude10(&x);
    while puissance10(e) > x {
        e -= 1;
    }
    while puissance10(e + 1) <= x {
        e += 1;
    }
    e
}

/// |x| sur n chiffres significatifs (tronqués ou arrondis) -> (chiffres, exposant du premier).
fn significatifs(x: &BigRational, n: usize, arrondi: bool) -> (String, i64) {
    let x = x.abs();
    let mut e = exposant10(&x);
    let s = &x * puissance10(n as i64 - 1 - e);
    let mut m = if arrondi { s.round() } else { s.floor() }.to_integer();
    // 9.99… arrondi à 10.0
    if m == pow10(n) {
        m = pow10(n - 1);
        e += 1;
    }
    (m.to_string(), e)
}

/// Nombre de décimales d’un développement fini, None s’il est infini.
fn decimales_finies(r: &BigRational) -> Option<usize> {
    let mut d = r.denom().clone();
    let cinq = BigInt::from(5);
    let (mut deux, mut cinqs) = (0usize, 0usize);
    while d.is_even() {
        d /= 2;
        deux += 1;
    }
    while (&d % &cinq).is_zero() {
        d /= &cinq;
        cinqs += 1;
    }
    d.is_one().then_some(deux.max(cinqs))
}

/// Troncature de r à `decimales` chiffres après le point (toujours '.').
#[cfg(test)]
pub(crate) fn decimal_tronque(r: &BigRational, decimales: usize) -> String {
    let signe = if r.is_negative() { "-" } else { "" };
    let a = r.abs();
    let entier = a.floor().to_integer();
    if decimales == 0 {
        return format!("{signe}{entier}");
    }
    let frac = ((a - BigRational::from_integer(entier.clone()))
        * BigRational::from_integer(pow10(decimales)))
    .floor()
    .to_integer();
    format!("{signe}{entier}.{frac:0>decimales$}")
}

/* ------------------------ Imprimeur ------------------------ */

const NIV_SOMME: u8 = 1;
const NIV_PRODUIT: u8 = 2;
const NIV_PUISSANCE: u8 = 3;
const NIV_ATOME: u8 = 4;

struct Imprimeur<'a> {
    o: &'a OptionsImpression,
    g: Glyphes,
    journal: &'a mut Journal,
}

impl Imprimeur<'_> {
    /// Chiffres + exposant -> texte (point décimal substitué, zéros finaux retirés).
    fn placer(&self, chiffres: &str, e: i64) -> String {
        let d = chiffres.trim_end_matches('0');
        let d = if d.is_empty() { "0" } else { d };
        let p = self.o.point_decimal;

        if !(SCI_MIN..SCI_MAX).contains(&e) {
            let (tete, queue) = d.split_at(1);
            let signe = if e < 0 { '-' } else { '+' };
            return if queue.is_empty() {
                format!("{tete}E{signe}{}", e.abs())
            } else {
                format!("{tete}{p}{queue}E{signe}{}", e.abs())
            };
        }
        if e < 0 {
            return format!("0{p}{}{d}", "0".repeat((-e - 1) as usize));
        }
        let e = e as usize;
        if d.len() <= e + 1 {
            format!("{d}{}", "0".repeat(e + 1 - d.len()))
        } else {
            format!("{}{p}{}", &d[..=e], &d[e + 1..])
        }
    }

    fn fraction(&self, a: &BigRational) -> String {
        if a.is_integer() {
            a.numer().to_string()
        } else {
            format!("{}/{}", a.numer(), a.denom())
        }
    }

    fn rationnel(&mut self, r: &BigRational) -> String {
        let signe = if r.is_negative() { self.g.moins } else { "" };
        let a = r.abs();
        let corps = if a.is_zero() {
            "0".to_string()
        } else if self.o.mode_fraction == ModeFraction::ForcerFraction {
            self.fraction(&a)
        } else {
            self.decimal(&a)
        };
        format!("{signe}{corps}")
    }

    /// a > 0.
    fn decimal(&mut self, a: &BigRational) -> String {
        let p = self.o.precision();

        let Some(decimales) = decimales_finies(a) else {
            // développement infini
            if self.o.mode_fraction == ModeFraction::Auto && !self.o.indiquer_serie_infinie {
                return self.fraction(a);
            }
            let (c, e) = significatifs(a, p, false);
            let mut s = self.placer(&c, e);
            if self.o.indiquer_serie_infinie {
                s.push_str(self.g.serie);
                self.journal.signaler(Avertissement::SerieInfinie);
            }
            return s;
        };

        let e = exposant10(a);
        if a.is_integer() && e < SCI_MAX {
            return a.numer().to_string();
        }
        // exact : le développement est fini
        let m = a.numer() * pow10(decimales) / a.denom();
        let utiles = m.to_string().trim_end_matches('0').len().max(1);
        if utiles <= p {
            let (c, e) = significatifs(a, utiles, false);
            return self.placer(&c, e);
        }
        // fini mais trop long : arrondi
        let (c, e) = significatifs(a, p, true);
        let prefixe = if self.o.indiquer_approximation { self.g.approx } else { "" };
        format!("{prefixe}{}", self.placer(&c, e))
    }

    fn approche(&mut self, i: &Intervalle) -> String {
        let prefixe = if self.o.indiquer_approximation { self.g.approx } else { "" };
        let m = i.milieu();
        let r = i.rayon();
        if m.is_zero() {
            if r.is_zero() {
                return format!("{prefixe}0");
            }
            return self.avec_rayon(prefixe, &m, &r);
        }
        let p = self.o.precision() as i64;
        let e = exposant10(&m);
        let r2 = &r * BigRational::from_integer(2.into());
        // chiffres certifiés : 2·rayon < 10^(e − d + 1)
        let d = if r2.is_zero() {
            p
        } else {
            (e - exposant10(&r2)).min(p)
        };
        if d < 1 {
            if i.contient_zero() {
                return self.avec_rayon(prefixe, &m, &r);
            }
            tracing::trace!(milieu = %m, "intervalle large, un seul chiffre");
        }
        let signe = if m.is_negative() { self.g.moins } else { "" };
        let (c, e) = significatifs(&m, d.max(1) as usize, true);
        format!("{prefixe}{signe}{}", self.placer(&c, e))
    }

    /// Aucun chiffre certifié autour de 0 : "≈m ± r", r majoré sur un chiffre
    /// et m arrondi au même rang.
    fn avec_rayon(&self, prefixe: &str, m: &BigRational, r: &BigRational) -> String {
        let er = exposant10(r);
        let k = (r / puissance10(er)).ceil().to_integer();
        let (k, er) = if k >= BigInt::from(10) {
            (BigInt::one(), er + 1)
        } else {
            (k, er)
        };
        let u = puissance10(er);
        let mq = (m / &u).round() * &u;

        let centre = if mq.is_zero() {
            "0".to_string()
        } else {
            let signe = if mq.is_negative() { self.g.moins } else { "" };
            let n = (exposant10(&mq) - er + 1).max(1) as usize;
            let (c, e) = significatifs(&mq, n, true);
            format!("{signe}{}", self.placer(&c, e))
        };
        let rayon = self.placer(&k.to_string(), er);
        format!("{prefixe}{centre} {} {rayon}", self.g.plus_moins)
    }

    fn nombre(&mut self, n: &Nombre) -> String {
        match n {
            Nombre::Exact(r) => self.rationnel(r),
            Nombre::Approx(i) => self.approche(i),
        }
    }

    /* ---- arbre ---- */

    fn rendre(&mut self, e: &Expr) -> Result<(String, u8), NonImprimable> {
        let (s, niv) = self.rendre_brut(e)?;
        // un texte signé se protège comme une somme
        let niv = if s.starts_with(self.g.moins) { niv.min(NIV_SOMME) } else { niv };
        Ok((s, niv))
    }

    fn entre_parentheses(&mut self, e: &Expr, niv_min: u8) -> Result<String, NonImprimable> {
        let (s, niv) = self.rendre(e)?;
        Ok(if niv < niv_min { format!("({s})") } else { s })
    }

    fn rendre_brut(&mut self, e: &Expr) -> Result<(String, u8), NonImprimable> {
        Ok(match e {
            Expr::Num(n) => {
                let s = self.nombre(n);
                let niv = if s.contains('/') { NIV_PRODUIT } else { NIV_ATOME };
                (s, niv)
            }
            Expr::Constante(Constante::Pi) => (self.g.pi.to_string(), NIV_ATOME),
            Expr::Constante(Constante::E) => ("e".to_string(), NIV_ATOME),
            Expr::Var(s) | Expr::Unite(s) => (s.clone(), NIV_ATOME),
            Expr::Indefini => {
                if !self.o.autoriser_non_utilisable {
                    return Err(NonImprimable);
                }
                (self.g.indefini.to_string(), NIV_ATOME)
            }
            Expr::Fonction(f, args, _) => {
                let args = args
                    .iter()
                    .map(|a| self.rendre(a).map(|(s, _)| s))
                    .collect::<Result<Vec<_>, _>>()?;
                (format!("{}({})", f.nom(), args.join(", ")), NIV_ATOME)
            }
            Expr::Op(Operateur::Somme, xs, _) => (self.somme(xs)?, NIV_SOMME),
            Expr::Op(Operateur::Produit, xs, _) => self.produit(xs)?,
            Expr::Op(Operateur::Puissance, v, _) if v.len() == 2 => {
                if exposant_negatif(e).is_some() {
                    return self.produit(std::slice::from_ref(e));
                }
                (self.puissance(&v[0], &v[1])?, NIV_PUISSANCE)
            }
            Expr::Op(Operateur::Conversion, v, _) if v.len() == 2 => {
                let a = self.rendre(&v[0])?.0;
                let b = self.rendre(&v[1])?.0;
                (format!("{a} to {b}"), 0)
            }
            Expr::Op(_, xs, _) => {
                let xs = xs
                    .iter()
                    .map(|x| self.rendre(x).map(|(s, _)| s))
                    .collect::<Result<Vec<_>, _>>()?;
                (format!("({})", xs.join(", ")), NIV_ATOME)
            }
        })
    }

    /// Terme de somme : une unité seule s’écrit "1 m".
    fn terme(&mut self, t: &Expr) -> Result<String, NonImprimable> {
        if unite_simple(t).is_some() {
            return self.produit(std::slice::from_ref(t)).map(|(s, _)| s);
        }
        self.rendre(t).map(|(s, _)| s)
    }

    fn somme(&mut self, xs: &[Expr]) -> Result<String, NonImprimable> {
        let mut s = String::new();
        for (k, t) in xs.iter().enumerate() {
            if k == 0 {
                s.push_str(&self.terme(t)?);
                continue;
            }
            match oppose(t) {
                Some(m) => {
                    let txt = self.entre_parentheses(&m, NIV_PRODUIT)?;
                    s.push_str(&format!(" {} {txt}", self.g.moins));
                }
                None => {
                    let txt = self.terme(t)?;
                    s.push_str(&format!(" + {txt}"));
                }
            }
        }
        Ok(s)
    }

    fn puissance(&mut self, b: &Expr, x: &Expr) -> Result<String, NonImprimable> {
        let racine = x.as_rat().and_then(|r| {
            (r.numer().is_one() && (r.denom() == &BigInt::from(2) || r.denom() == &BigInt::from(3)))
                .then(|| r.denom().to_u32())
                .flatten()
        });
        match (racine, self.g.exposants) {
            (Some(2), true) => return Ok(format!("√{}", self.entre_parentheses(b, NIV_ATOME)?)),
            (Some(3), true) => return Ok(format!("∛{}", self.entre_parentheses(b, NIV_ATOME)?)),
            (Some(2), false) => return Ok(format!("sqrt({})", self.rendre(b)?.0)),
            (Some(_), false) => return Ok(format!("cbrt({})", self.rendre(b)?.0)),
            _ => {}
        }

        let base = self.entre_parentheses(b, NIV_ATOME)?;
        let k = x.as_rat().filter(|r| r.is_integer()).and_then(|r| r.numer().to_i64());
        match k {
            Some(k) if self.g.exposants => Ok(format!("{base}{}", exposant_unicode(k))),
            _ => {
                let ex = self.entre_parentheses(x, NIV_ATOME)?;
                Ok(format!("{base}^{ex}"))
            }
        }
    }

    fn unites(&self, u: &[(String, i32)]) -> String {
        u.iter()
            .map(|(nom, k)| match (*k, self.g.exposants) {
                (1, _) => nom.clone(),
                (k, true) => format!("{nom}{}", exposant_unicode(i64::from(k))),
                (k, false) => format!("{nom}^{k}"),
            })
            .collect::<Vec<_>>()
            .join(self.g.fois_unites)
    }

    /// coefficient · facteurs / dénominateur, puis unités.
    fn produit(&mut self, xs: &[Expr]) -> Result<(String, u8), NonImprimable> {
        let mut coeff: Option<&Nombre> = None;
        let mut num: Vec<&Expr> = Vec::new();
        let mut den: Vec<Expr> = Vec::new();
        let mut u_num = Vec::new();
        let mut u_den = Vec::new();

        for x in xs {
            if let (Expr::Num(n), None) = (x, coeff) {
                coeff = Some(n);
            } else if let Some((u, k)) = unite_simple(x) {
                if k > 0 {
                    u_num.push((u, k));
                } else {
                    u_den.push((u, -k));
                }
            } else if let Some(inv) = exposant_negatif(x) {
                den.push(inv);
            } else {
                num.push(x);
            }
        }

        let symbolique = !num.is_empty() || !den.is_empty();

        // p/q exact devant des facteurs symboliques : p en haut, q en bas (√3/2, 3π/4)
        let mut coeff_txt = String::new();
        let mut coeff_entier = true;
        let mut q: Option<BigInt> = None;
        match coeff {
            None => {}
            Some(Nombre::Exact(r))
                if symbolique && self.o.mode_fraction != ModeFraction::ForcerDecimal =>
            {
                if !r.denom().is_one() {
                    q = Some(r.denom().clone());
                }
                let p = r.numer();
                if p == &BigInt::from(-1) {
                    coeff_txt = self.g.moins.to_string();
                } else if !p.is_one() {
                    coeff_txt = self.rationnel(&BigRational::from_integer(p.clone()));
                }
            }
            Some(n) if n.est_un() && symbolique => {}
            Some(n) => {
                coeff_entier = n.est_exact() && n.est_entier();
                coeff_txt = self.nombre(n);
            }
        }

        let mut valeur = coeff_txt.clone();
        for (k, f) in num.iter().enumerate() {
            let s = self.entre_parentheses(f, NIV_PUISSANCE)?;
            let colle = k == 0 && (coeff_txt.is_empty() || coeff_txt == self.g.moins || coeff_entier);
            if !colle {
                valeur.push_str(self.g.fois);
            }
            valeur.push_str(&s);
        }

        let mut bas: Vec<String> = Vec::new();
        if let Some(q) = q {
            bas.push(q.to_string());
        }
        for d in &den {
            bas.push(self.entre_parentheses(d, NIV_PUISSANCE)?);
        }
        if !bas.is_empty() {
            if valeur.is_empty() || valeur == self.g.moins {
                valeur.push('1');
            }
            let b = bas.join(self.g.fois);
            if bas.len() > 1 {
                valeur = format!("{valeur}/({b})");
            } else {
                valeur = format!("{valeur}/{b}");
            }
        }

        if u_num.is_empty() && u_den.is_empty() {
            return Ok((valeur, NIV_PRODUIT));
        }

        if valeur.is_empty() {
            valeur.push('1');
        }
        let unites = match (u_num.is_empty(), u_den.len()) {
            (_, 0) => self.unites(&u_num),
            (true, _) => {
                let inv: Vec<_> = u_den.iter().map(|(u, k)| (u.clone(), -k)).collect();
                self.unites(&inv)
            }
            (false, 1) => format!("{}/{}", self.unites(&u_num), self.unites(&u_den)),
            (false, _) => format!("{}/({})", self.unites(&u_num), self.unites(&u_den)),
        };
        // "x + y" suivi d’unités : parenthèses
        let valeur = if symbolique && valeur.contains(' ') {
            format!("({valeur})")
        } else {
            valeur
        };
        Ok((format!("{valeur} {unites}"), NIV_PRODUIT))
    }
}

/// x^(−r) -> x^r (x si r = 1), pour les exposants rationnels exacts négatifs.
fn exposant_negatif(e: &Expr) -> Option<Expr> {
    let Expr::Op(Operateur::Puissance, v, _) = e else {
        return None;
    };
    let r = v.get(1)?.as_rat()?;
    if !r.is_negative() || unite_simple(e).is_some() {
        return None;
    }
    let b = v.first()?.clone();
    Some(if r == &-BigRational::one() {
        b
    } else {
        Expr::puissance(b, Expr::rat(-r))
    })
}

/// −t si t s’écrit naturellement avec un signe moins en tête.
fn oppose(t: &Expr) -> Option<Expr> {
    match t {
        Expr::Num(n) if n.signe() == Some(std::cmp::Ordering::Less) => Some(Expr::Num(-n)),
        Expr::Op(Operateur::Produit, v, _) => match v.first() {
            Some(Expr::Num(n)) if n.signe() == Some(std::cmp::Ordering::Less) => {
                let mut w = v.clone();
                let m = -n;
                if m.est_un() {
                    w.remove(0);
                } else {
                    w[0] = Expr::Num(m);
                }
                Some(reconstruire(Operateur::Produit, w))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Rend un résultat en texte. Indéfini refusé si `autoriser_non_utilisable` est faux.
pub fn formater(expr: &Expr, o: &OptionsImpression) -> Result<String, NonImprimable> {
    formater_avec(expr, o, &mut Journal::default())
}

/// Comme `formater`, en notant `SerieInfinie` dans le journal quand la marque est posée.
pub fn formater_avec(
    expr: &Expr,
    o: &OptionsImpression,
    journal: &mut Journal,
) -> Result<String, NonImprimable> {
    let mut imp = Imprimeur {
        o,
        g: Glyphes::pour(o.style_signes),
        journal,
    };
    // unité seule : "1 ft"
    if unite_simple(expr).is_some() {
        return imp.produit(std::slice::from_ref(expr)).map(|(s, _)| s);
    }
    imp.rendre(expr).map(|(s, _)| s)
}
