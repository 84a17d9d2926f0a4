// src/noyau/jetons.rs

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use super::erreurs::ErreurSyntaxe;
use super::expr::Fonction;
use super::nombre::{decomposer_decimal, fois_puissance10, Intervalle, EXPOSANT_LITTERAL_MAX};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tok {
    Num(BigRational),
    Approche(Intervalle), // ≈1.41, 0.333…

    // Fonctions, constantes, unités, variables : tranché par rpn.rs (ordre de résolution)
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Caret, // ^
    Bang,  // ! postfixe
    Virgule,
    Vers, // to, ->, →

    LPar,
    RPar,

    // Produits par rpn.rs uniquement
    Neg,
    Prefixe(Fonction),      // √ ∛ sans parenthèses
    Appel(Fonction, usize), // fonction + nombre d’arguments
}

/// Jeton + position (index en caractères, pour les erreurs de syntaxe).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jeton {
    pub tok: Tok,
    pub pos: usize,
}

fn exposant_unicode(c: char) -> Option<u32> {
    match c {
        '⁰' => Some(0),
        '¹' => Some(1),
        '²' => Some(2),
        '³' => Some(3),
        '⁴' => Some(4),
        '⁵' => Some(5),
        '⁶' => Some(6),
        '⁷' => Some(7),
        '⁸' => Some(8),
        '⁹' => Some(9),
        _ => None,
    }
}

fn debut_ident(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == 'µ' || c == 'Ω'
}

fn suite_ident(c: char) -> bool {
    debut_ident(c) || c.is_ascii_digit()
}

/// Fin d’un littéral commencé en `i` : chiffres [. chiffres] [e|E [+-] chiffres].
/// Un "..." de série n’est pas pris pour le point décimal.
fn fin_nombre(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' && marque_serie(chars, i) == 0 {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    // exposant seulement s’il est suivi d’un chiffre (sinon "2e" = 2·e)
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Longueur de la marque de série infinie en `i` ("…" ou "..."), 0 sinon.
fn marque_serie(chars: &[char], i: usize) -> usize {
    match chars.get(i).copied() {
        Some('…') => 1,
        Some('.') if chars.get(i..i + 3) == Some(&['.', '.', '.'][..]) => 3,
        _ => 0,
    }
}

/// n · 10^e sans les zéros de queue de n.
fn sans_zeros_de_queue(mut n: BigInt, mut e: i64) -> (BigInt, i64) {
    let dix = BigInt::from(10);
    while !n.is_zero() && (&n % &dix).is_zero() {
        n /= &dix;
        e = e.saturating_add(1);
    }
    (n, e)
}

/// Après un littéral : "± r" ou "+/- r" -> index du début de r.
fn lire_plus_moins(chars: &[char], mut i: usize) -> Option<usize> {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    if chars.get(i) == Some(&'±') {
        i += 1;
    } else if chars.get(i..i + 3) == Some(&['+', '/', '-'][..]) {
        i += 3;
    } else {
        return None;
    }
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    let c = *chars.get(i)?;
    (c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)))
        .then_some(i)
}

/// (tete · 10^e) en jetons, pour un exposant trop grand pour un littéral exact :
/// l’évaluation borne alors la taille du résultat.
fn fois_dix_puissance(tete: Tok, e: i64) -> Vec<Tok> {
    let dix = Tok::Num(BigRational::from_integer(BigInt::from(10)));
    let k = Tok::Num(BigRational::from_integer(BigInt::from(e.unsigned_abs())));
    let mut v = vec![Tok::LPar, tete, Tok::Star, dix, Tok::Caret];
    if e < 0 {
        v.extend([Tok::LPar, Tok::Minus, k, Tok::RPar]);
    } else {
        v.push(k);
    }
    v.push(Tok::RPar);
    v
}

/// Tokenize une chaîne en jetons.
/// Supporte:
/// - entiers, décimaux, notation scientifique (12, 0.5, .5, 1.5e3, 2E-5) -> rationnels exacts
/// - valeurs approchées telles que rendues : ≈1.41, 0.333…, 12..., ≈0.001 ± 2E-3 -> intervalles
/// - opérateurs + - * / ^ ! et leurs variantes unicode (− × · ÷)
/// - exposants unicode (m², x³)
/// - parenthèses ( ), séparateur d’arguments , ou ;
/// - conversion : to, ->, →
/// - identifiants (lettres unicode, _, chiffres après la première lettre), casse conservée
/// - √ ∛ (racines préfixes), π, ° (degré)
pub fn tokenize(s: &str) -> Result<Vec<Jeton>, ErreurSyntaxe> {
    let mut out = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i: usize = 0;
    let mut approche: Option<usize> = None;

    let mut pousser = |tok: Tok, pos: usize| out.push(Jeton { tok, pos });

    while i < chars.len() {
        let c = chars[i];
        let pos = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // ≈ (ou ~) : le littéral qui suit est une valeur approchée
        if c == '≈' || c == '~' {
            if approche.is_some() {
                return Err(ErreurSyntaxe::new(pos, "approximation sans nombre"));
            }
            approche = Some(pos);
            i += 1;
            continue;
        }
        if let Some(p) = approche {
            if !(c.is_ascii_digit() || c == '.' || c == '-' || c == '−') {
                return Err(ErreurSyntaxe::new(p, "approximation sans nombre"));
            }
        }

        // Opérateurs et ponctuation (un caractère)
        let simple = match c {
            '(' => Some(Tok::LPar),
            ')' => Some(Tok::RPar),
            '+' => Some(Tok::Plus),
            '*' | '×' | '·' | '⋅' => Some(Tok::Star),
            '/' | '÷' => Some(Tok::Slash),
            '^' => Some(Tok::Caret),
            '!' => Some(Tok::Bang),
            ',' | ';' => Some(Tok::Virgule),
            '→' => Some(Tok::Vers),
            'π' => Some(Tok::Ident("π".to_string())),
            '°' => Some(Tok::Ident("°".to_string())),
            '√' => Some(Tok::Prefixe(Fonction::Sqrt)),
            '∛' => Some(Tok::Prefixe(Fonction::Cbrt)),
            _ => None,
        };
        if let Some(t) = simple {
            pousser(t, pos);
            i += 1;
            continue;
        }

        // Moins (ASCII ou unicode), ou flèche ->
        if c == '-' || c == '−' {
            if c == '-' && chars.get(i + 1) == Some(&'>') {
                pousser(Tok::Vers, pos);
                i += 2;
            } else {
                pousser(Tok::Minus, pos);
                i += 1;
            }
            continue;
        }

        // Exposant unicode : x² => x ^ 2
        if let Some(mut n) = exposant_unicode(c) {
            i += 1;
            while let Some(d) = chars.get(i).copied().and_then(exposant_unicode) {
                n = n.saturating_mul(10).saturating_add(d);
                i += 1;
            }
            pousser(Tok::Caret, pos);
            pousser(Tok::Num(BigRational::from_integer(n.into())), pos);
            continue;
        }

        // Identifiants
        if debut_ident(c) {
            let start = i;
            i += 1;
            while i < chars.len() && suite_ident(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();

            if word == "to" {
                pousser(Tok::Vers, pos);
            } else {
                pousser(Tok::Ident(word), pos);
            }
            continue;
        }

        // Nombre : chiffres [. chiffres] [e|E [+-] chiffres] [… | ...] [± rayon]
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i = fin_nombre(&chars, i);
            let texte: String = chars[start..i].iter().collect();
            let invalide = || ErreurSyntaxe::new(pos, format!("nombre invalide: {texte}"));
            let (n, e) = decomposer_decimal(&texte).ok_or_else(invalide)?;

            let serie = marque_serie(&chars, i) > 0;
            i += marque_serie(&chars, i);

            // rayon et rang de son dernier chiffre (le centre est arrondi à ce rang)
            let rayon = match lire_plus_moins(&chars, i) {
                Some(debut) => {
                    i = fin_nombre(&chars, debut);
                    let t: String = chars[debut..i].iter().collect();
                    let invalide = || ErreurSyntaxe::new(debut, format!("rayon invalide: {t}"));
                    let (nr, er) = decomposer_decimal(&t).ok_or_else(invalide)?;
                    let (nr, er) = if t.contains('.') {
                        (nr, er)
                    } else {
                        sans_zeros_de_queue(nr, er)
                    };
                    if er.unsigned_abs() > EXPOSANT_LITTERAL_MAX {
                        return Err(invalide());
                    }
                    Some((fois_puissance10(nr, er), er))
                }
                None => None,
            };

            let approx = approche.take().is_some();
            if !approx && !serie && rayon.is_none() {
                if e.unsigned_abs() <= EXPOSANT_LITTERAL_MAX {
                    pousser(Tok::Num(fois_puissance10(n, e)), pos);
                } else {
                    for t in fois_dix_puissance(Tok::Num(BigRational::from_integer(n)), e) {
                        pousser(t, pos);
                    }
                }
                continue;
            }

            // sans point décimal, les zéros de queue ne sont pas significatifs
            let (n, e) = if texte.contains('.') { (n, e) } else { sans_zeros_de_queue(n, e) };
            let chiffres = n.to_string().len();
            // en unités du dernier chiffre : ≈ arrondi à ±1, … tronqué vers 0
            let bas = if approx { &n - 1 } else { n.clone() };
            let haut = &n + 1;

            if e.unsigned_abs() > EXPOSANT_LITTERAL_MAX {
                if rayon.is_some() {
                    return Err(invalide());
                }
                let i_mantisse = Intervalle::new(
                    BigRational::from_integer(bas),
                    BigRational::from_integer(haut),
                    chiffres,
                );
                for t in fois_dix_puissance(Tok::Approche(i_mantisse), e) {
                    pousser(t, pos);
                }
                continue;
            }

            let (bas, haut) = match rayon {
                None => (fois_puissance10(bas, e), fois_puissance10(haut, e)),
                Some((r, er)) => {
                    let (bas, haut) = if serie {
                        (fois_puissance10(n.clone(), e), fois_puissance10(n + 1, e))
                    } else {
                        let v = fois_puissance10(n, e);
                        (v.clone(), v)
                    };
                    let marge = if approx {
                        r + fois_puissance10(BigInt::one(), er)
                    } else {
                        r
                    };
                    (bas - &marge, haut + marge)
                }
            };
            pousser(Tok::Approche(Intervalle::new(bas, haut, chiffres)), pos);
            continue;
        }

        return Err(ErreurSyntaxe::new(pos, format!("caractère inattendu: '{c}'")));
    }

    if let Some(p) = approche {
        return Err(ErreurSyntaxe::new(p, "approximation sans nombre"));
    }
    Ok(out)
}

/// Format utilitaire (debug/“démarche”) : liste de jetons en texte.
pub fn format_tokens(tokens: &[Tok]) -> String {
    fn format_rat(r: &BigRational) -> String {
        let n = r.numer();
        let d = r.denom();
        if d.is_one() {
            format!("{n}")
        } else {
            format!("{n}/{d}")
        }
    }

    let mut out = Vec::new();
    for t in tokens {
        let s = match t {
            Tok::Num(r) => format_rat(r),
            Tok::Approche(i) => format!("≈{}", format_rat(&i.milieu())),
            Tok::Ident(name) => name.clone(),

            Tok::Plus => "+".to_string(),
            Tok::Minus => "-".to_string(),
            Tok::Star => "*".to_string(),
            Tok::Slash => "/".to_string(),
            Tok::Caret => "^".to_string(),
            Tok::Bang => "!".to_string(),
            Tok::Virgule => ",".to_string(),
            Tok::Vers => "to".to_string(),

            Tok::LPar => "(".to_string(),
            Tok::RPar => ")".to_string(),

            Tok::Neg => "neg".to_string(),
            Tok::Prefixe(f) => f.nom().to_string(),
            Tok::Appel(f, n) => format!("{}/{n}", f.nom()),
        };
        out.push(s);
    }
    out.join(" ")
}
