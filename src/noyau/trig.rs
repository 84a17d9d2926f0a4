// src/noyau/trig.rs
//
// Trig spéciale (angles “exactement reconnus”) pour sin/cos/tan
// -----------------------------------------------------------
// - Extraction coeff·π via as_coeff_pi()
// - Réduction modulo période via mod_rationnel() (sin/cos: 2 ; tan: 1)
// - Table angles spéciaux sur n ∈ {1,2,3,4,6}
// - Réciproque : atan(0), atan(±1), atan(±√3), atan(±√3/3)

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use super::expr::{mod_rationnel, Constante, Expr, Operateur};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrigFn {
    Sin,
    Cos,
    Tan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrigOutcome {
    Valeur(Expr, String),
    Indefini(String),
}

fn rat(a: i64, b: i64) -> Expr {
    Expr::rat(BigRational::new(BigInt::from(a), BigInt::from(b)))
}

/// √n sous forme canonique n^(1/2)
fn racine(n: i64) -> Expr {
    Expr::puissance(Expr::entier(n), rat(1, 2))
}

/// c·√n
fn fois_racine(c: (i64, i64), n: i64) -> Expr {
    if c == (1, 1) {
        return racine(n);
    }
    Expr::produit(vec![rat(c.0, c.1), racine(n)])
}

/// Reconnaît les angles spéciaux pour sin/cos/tan lorsque l’entrée est un multiple rationnel de π.
///
/// Retour:
/// - Some(Valeur(expr_exact, preuve)) si reconnu
/// - Some(Indefini(preuve)) si indéfini (tan(π/2), tan(3π/2))
/// - None si non reconnu
pub fn trig_special(x: &Expr, f: TrigFn) -> Option<TrigOutcome> {
    // 1) extraire coeff·π
    let coeff = x.as_coeff_pi()?;

    // 2) réduire modulo période
    let coeff_reduit = match f {
        TrigFn::Sin | TrigFn::Cos => mod_rationnel(&coeff, 2),
        TrigFn::Tan => mod_rationnel(&coeff, 1),
    };

    // 3) convertir en k/n "petit"
    let (k, n) = rational_to_small_kn(&coeff_reduit)?;

    // 4) tables codées sur [0,2π)
    let k_mod = k.rem_euclid(2 * n);

    let zero = || rat(0, 1);
    let one = || rat(1, 1);
    let neg_one = || rat(-1, 1);

    let angle_txt = format_angle_kn_pi(k_mod, n);
    let v = |e: Expr, txt: &str, nom: &str| {
        TrigOutcome::Valeur(e, format!("{nom}({angle_txt}) = {txt}"))
    };
    let a = (k_mod, n);

    let out = match f {
        TrigFn::Sin => match a {
            (0, _) | (1, 1) | (2, 1) => v(zero(), "0", "sin"),

            (1, 6) | (5, 6) => v(rat(1, 2), "1/2", "sin"),
            (7, 6) | (11, 6) => v(rat(-1, 2), "-1/2", "sin"),

            (1, 4) | (3, 4) => v(fois_racine((1, 2), 2), "√2/2", "sin"),
            (5, 4) | (7, 4) => v(fois_racine((-1, 2), 2), "-√2/2", "sin"),

            (1, 3) | (2, 3) => v(fois_racine((1, 2), 3), "√3/2", "sin"),
            (4, 3) | (5, 3) => v(fois_racine((-1, 2), 3), "-√3/2", "sin"),

            (1, 2) => v(one(), "1", "sin"),
            (3, 2) => v(neg_one(), "-1", "sin"),

            _ => return None,
        },

        TrigFn::Cos => match a {
            (0, _) | (2, 1) => v(one(), "1", "cos"),
            (1, 1) => v(neg_one(), "-1", "cos"),

            (1, 6) | (11, 6) => v(fois_racine((1, 2), 3), "√3/2", "cos"),
            (5, 6) | (7, 6) => v(fois_racine((-1, 2), 3), "-√3/2", "cos"),

            (1, 4) | (7, 4) => v(fois_racine((1, 2), 2), "√2/2", "cos"),
            (3, 4) | (5, 4) => v(fois_racine((-1, 2), 2), "-√2/2", "cos"),

            (1, 3) | (5, 3) => v(rat(1, 2), "1/2", "cos"),
            (2, 3) | (4, 3) => v(rat(-1, 2), "-1/2", "cos"),

            (1, 2) | (3, 2) => v(zero(), "0", "cos"),

            _ => return None,
        },

        TrigFn::Tan => match a {
            (0, _) | (1, 1) | (2, 1) => v(zero(), "0", "tan"),

            (1, 6) | (7, 6) => v(fois_racine((1, 3), 3), "√3/3", "tan"),
            (5, 6) | (11, 6) => v(fois_racine((-1, 3), 3), "-√3/3", "tan"),

            (1, 4) | (5, 4) => v(one(), "1", "tan"),
            (3, 4) | (7, 4) => v(neg_one(), "-1", "tan"),

            (1, 3) | (4, 3) => v(racine(3), "√3", "tan"),
            (2, 3) | (5, 3) => v(fois_racine((-1, 1), 3), "-√3", "tan"),

            (1, 2) | (3, 2) => TrigOutcome::Indefini(format!("tan({angle_txt}) = indéfini")),

            _ => return None,
        },
    };

    Some(out)
}

/// atan des valeurs remarquables (entrée déjà canonique).
pub fn atan_special(x: &Expr) -> Option<TrigOutcome> {
    let pi_sur = |n: i64, signe: i64| {
        Expr::produit(vec![rat(signe, n), Expr::Constante(Constante::Pi)])
    };

    // c, n tels que x = c·√n (n = 1 pour un rationnel)
    let (c, n) = match x {
        Expr::Num(_) => (x.as_rat()?.clone(), 1),
        Expr::Op(Operateur::Puissance, v, _) if est_racine_de(v, 3) => {
            (BigRational::from_integer(BigInt::from(1)), 3)
        }
        Expr::Op(Operateur::Produit, v, _) if v.len() == 2 => {
            let Expr::Op(Operateur::Puissance, w, _) = &v[1] else {
                return None;
            };
            if !est_racine_de(w, 3) {
                return None;
            }
            (v[0].as_rat()?.clone(), 3)
        }
        _ => return None,
    };

    if c.is_zero() {
        return Some(TrigOutcome::Valeur(rat(0, 1), "atan(0) = 0".into()));
    }
    let signe = if c.is_negative() { -1 } else { 1 };
    let c = c.abs();
    let un = BigRational::from_integer(BigInt::from(1));
    let tiers = BigRational::new(BigInt::from(1), BigInt::from(3));

    let (e, txt) = match n {
        1 if c == un => (pi_sur(4, signe), "π/4"),
        3 if c == un => (pi_sur(3, signe), "π/3"),
        3 if c == tiers => (pi_sur(6, signe), "π/6"),
        _ => return None,
    };
    let s = if signe < 0 { "-" } else { "" };
    Some(TrigOutcome::Valeur(e, format!("atan({x}) = {s}{txt}")))
}

fn est_racine_de(v: &[Expr], n: i64) -> bool {
    v.len() == 2
        && v[0].est_rat(n)
        && v[1].as_rat() == Some(&BigRational::new(BigInt::from(1), BigInt::from(2)))
}

/* ------------------------ Outils ------------------------ */

fn format_angle_kn_pi(k: i64, n: i64) -> String {
    if k == 0 {
        return "0".to_string();
    }
    if n == 1 {
        return match k {
            1 => "π".to_string(),
            _ => format!("{k}π"),
        };
    }
    if k == 1 {
        return format!("π/{n}");
    }
    format!("{k}π/{n}")
}

/// Convertit un rationnel en (k,n) i64 réduit.
/// Accepte seulement n ∈ {1,2,3,4,6}.
fn rational_to_small_kn(r: &BigRational) -> Option<(i64, i64)> {
    // BigRational est déjà réduit (pgcd = 1, dénominateur > 0)
    let k = r.numer().to_i64()?;
    let n = r.denom().to_i64()?;

    if [1, 2, 3, 4, 6].contains(&n) {
        Some((k, n))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pi_fois(a: i64, b: i64) -> Expr {
        Expr::produit(vec![rat(a, b), Expr::Constante(Constante::Pi)])
    }

    #[test]
    fn table_sinus() {
        let Some(TrigOutcome::Valeur(e, preuve)) = trig_special(&pi_fois(1, 6), TrigFn::Sin)
        else {
            panic!("π/6 non reconnu")
        };
        assert_eq!(e, rat(1, 2));
        assert_eq!(preuve, "sin(π/6) = 1/2");
    }

    #[test]
    fn periodicite_et_negatifs() {
        // 9π/4 ≡ π/4
        let r = trig_special(&pi_fois(9, 4), TrigFn::Cos);
        assert_eq!(
            r,
            Some(TrigOutcome::Valeur(
                fois_racine((1, 2), 2),
                "cos(π/4) = √2/2".into()
            ))
        );
        // -π/2 ≡ 3π/2
        let r = trig_special(&pi_fois(-1, 2), TrigFn::Sin);
        assert!(matches!(r, Some(TrigOutcome::Valeur(e, _)) if e == rat(-1, 1)));
    }

    #[test]
    fn tangente_indefinie() {
        assert_eq!(
            trig_special(&pi_fois(3, 2), TrigFn::Tan),
            Some(TrigOutcome::Indefini("tan(π/2) = indéfini".into()))
        );
    }

    #[test]
    fn angle_hors_table() {
        assert_eq!(trig_special(&pi_fois(1, 5), TrigFn::Sin), None);
        assert_eq!(trig_special(&Expr::entier(1), TrigFn::Sin), None);
    }

    #[test]
    fn atan_remarquables() {
        let r = atan_special(&Expr::entier(-1));
        assert!(matches!(r, Some(TrigOutcome::Valeur(e, _)) if e == pi_fois(-1, 4)));
        let r = atan_special(&fois_racine((1, 3), 3));
        assert!(matches!(r, Some(TrigOutcome::Valeur(e, _)) if e == pi_fois(1, 6)));
        assert_eq!(atan_special(&Expr::entier(2)), None);
    }
}
