// src/noyau/rpn.rs
//
// Shunting-yard -> RPN -> AST
// Objectif:
// - Convertir une suite de jetons en RPN (postfix), en résolvant les appels de fonction
// - Puis reconstruire Expr
//
// Règles:
// - précédences : to < + - < * / (et implicite) < moins unaire, √ < ^ (droite) < ! (postfixe)
// - multiplication implicite entre termes adjacents : 2x, 2(3), 2 m, (1)(2)
// - Ident(name), dans l’ordre :
//    - variable liée du contexte => Var
//    - constante (pi, π, e, deg, °)
//    - fonction si suivie de '(' (une unité n’est jamais “appelée”)
//    - unité / devise connue => Unite
//    - sinon => variable libre (Var), jamais une erreur
// - Toute erreur porte la position (index en caractères) du jeton fautif.

use num_bigint::BigInt;
use num_rational::BigRational;

use super::erreurs::ErreurSyntaxe;
use super::expr::{Constante, Expr, Fonction};
use super::jetons::{tokenize, Jeton, Tok};
use super::nombre::Nombre;
use super::unites::VueRegistre;

/// Espace de noms consulté pendant la lecture (lecture seule).
pub trait Noms {
    fn est_variable(&self, nom: &str) -> bool;
    fn est_unite(&self, nom: &str) -> bool;
}

impl Noms for VueRegistre<'_> {
    fn est_variable(&self, _nom: &str) -> bool {
        false
    }

    fn est_unite(&self, nom: &str) -> bool {
        VueRegistre::est_unite(self, nom)
    }
}

fn constante(nom: &str) -> Option<Expr> {
    match nom {
        "π" => Some(Expr::Constante(Constante::Pi)),
        "e" => Some(Expr::Constante(Constante::E)),
        "deg" | "°" => Some(Expr::produit(vec![
            Expr::Constante(Constante::Pi),
            Expr::rat(BigRational::new(BigInt::from(1), BigInt::from(180))),
        ])),
        _ if nom.eq_ignore_ascii_case("pi") => Some(Expr::Constante(Constante::Pi)),
        _ => None,
    }
}

fn fonction_appelee(nom: &str, noms: &dyn Noms, suivant: Option<&Tok>) -> Option<Fonction> {
    if !matches!(suivant, Some(Tok::LPar)) || noms.est_variable(nom) || constante(nom).is_some() {
        return None;
    }
    Fonction::depuis_nom(nom)
}

fn precedence(t: &Tok) -> i32 {
    match t {
        Tok::Vers => 1,
        Tok::Plus | Tok::Minus => 2,
        Tok::Star | Tok::Slash => 3,
        Tok::Neg | Tok::Prefixe(_) => 4,
        Tok::Caret => 5,
        _ => 0,
    }
}

fn is_right_associative(t: &Tok) -> bool {
    matches!(t, Tok::Caret)
}

fn est_binaire(t: &Tok) -> bool {
    matches!(
        t,
        Tok::Plus | Tok::Minus | Tok::Star | Tok::Slash | Tok::Caret | Tok::Vers
    )
}

/// Parenthèse ouverte : appel de fonction ou simple groupement.
struct Cadre {
    pos: usize,
    appel: bool,
    virgules: usize,
}

/// Dépile les opérateurs qui doivent sortir avant `tok`.
fn depiler_avant(tok: &Tok, ops: &mut Vec<Jeton>, out: &mut Vec<Jeton>) {
    while let Some(top) = ops.last() {
        if matches!(top.tok, Tok::LPar | Tok::Appel(..)) {
            break;
        }

        let p_top = precedence(&top.tok);
        let p_tok = precedence(tok);

        let doit_pop = if is_right_associative(tok) {
            p_top > p_tok
        } else {
            p_top >= p_tok
        };

        match (doit_pop, ops.pop()) {
            (true, Some(j)) => out.push(j),
            (false, Some(j)) => {
                ops.push(j);
                break;
            }
            (_, None) => break,
        }
    }
}

/// Convertit une suite de jetons en RPN (notation polonaise inversée).
///
/// Exemple:
///   jetons: [Ident("sin"), LPar, Ident("pi"), Slash, Num(2), RPar]
///   rpn:    [Ident("pi"), Num(2), Slash, Appel(Sin, 1)]
pub fn to_rpn(tokens: &[Jeton], noms: &dyn Noms) -> Result<Vec<Jeton>, ErreurSyntaxe> {
    let mut out: Vec<Jeton> = Vec::new();
    let mut ops: Vec<Jeton> = Vec::new();
    let mut cadres: Vec<Cadre> = Vec::new();

    // “valeur” = un atome ou une expression fermée.
    // Sert à détecter le moins unaire et la multiplication implicite.
    let mut prev_was_value = false;
    let mut appel_en_attente = false;

    let Some(dernier) = tokens.last() else {
        return Err(ErreurSyntaxe::new(0, "entrée vide"));
    };

    for (k, jeton) in tokens.iter().enumerate() {
        let pos = jeton.pos;
        let suivant = tokens.get(k + 1).map(|j| &j.tok);

        // multiplication implicite : une valeur commence juste après une valeur
        let commence_valeur = matches!(
            jeton.tok,
            Tok::Num(_) | Tok::Approche(_) | Tok::Ident(_) | Tok::LPar | Tok::Prefixe(_)
        );
        if commence_valeur && prev_was_value {
            depiler_avant(&Tok::Star, &mut ops, &mut out);
            ops.push(Jeton { tok: Tok::Star, pos });
            prev_was_value = false;
        }

        match &jeton.tok {
            Tok::Num(_) | Tok::Approche(_) => {
                out.push(jeton.clone());
                prev_was_value = true;
            }

            Tok::Ident(name) => {
                if let Some(f) = fonction_appelee(name, noms, suivant) {
                    // fonction : on la garde sur la pile (elle sortira après sa parenthèse)
                    ops.push(Jeton {
                        tok: Tok::Appel(f, 0),
                        pos,
                    });
                    appel_en_attente = true;
                    prev_was_value = false;
                } else {
                    out.push(jeton.clone());
                    prev_was_value = true;
                }
            }

            Tok::Prefixe(_) => {
                ops.push(jeton.clone());
                prev_was_value = false;
            }

            Tok::LPar => {
                cadres.push(Cadre {
                    pos,
                    appel: appel_en_attente,
                    virgules: 0,
                });
                appel_en_attente = false;
                ops.push(jeton.clone());
                prev_was_value = false;
            }

            Tok::Virgule => {
                if !prev_was_value {
                    return Err(ErreurSyntaxe::new(pos, "argument manquant"));
                }
                match cadres.last_mut() {
                    Some(c) if c.appel => c.virgules += 1,
                    _ => {
                        return Err(ErreurSyntaxe::new(
                            pos,
                            "virgule hors d’un appel de fonction",
                        ))
                    }
                }
                while let Some(top) = ops.pop() {
                    if matches!(top.tok, Tok::LPar) {
                        ops.push(top);
                        break;
                    }
                    out.push(top);
                }
                prev_was_value = false;
            }

            Tok::RPar => {
                let Some(cadre) = cadres.pop() else {
                    return Err(ErreurSyntaxe::new(pos, "parenthèse fermante inattendue"));
                };
                if !prev_was_value {
                    return Err(ErreurSyntaxe::new(pos, "expression vide ou incomplète"));
                }

                // dépile jusqu’à '('
                while let Some(top) = ops.pop() {
                    if matches!(top.tok, Tok::LPar) {
                        break;
                    }
                    out.push(top);
                }

                // si une fonction est au sommet, on la sort avec son nombre d’arguments
                if cadre.appel {
                    if let Some(Jeton {
                        tok: Tok::Appel(f, _),
                        pos: pos_f,
                    }) = ops.pop()
                    {
                        let n = cadre.virgules + 1;
                        let (min, max) = f.arite();
                        if n < min || n > max {
                            return Err(ErreurSyntaxe::new(
                                pos_f,
                                format!("{} : nombre d’arguments invalide ({n})", f.nom()),
                            ));
                        }
                        out.push(Jeton {
                            tok: Tok::Appel(f, n),
                            pos: pos_f,
                        });
                    }
                }

                prev_was_value = true;
            }

            Tok::Bang => {
                if !prev_was_value {
                    return Err(ErreurSyntaxe::new(pos, "factorielle sans argument"));
                }
                out.push(jeton.clone());
            }

            Tok::Minus if !prev_was_value => {
                // moins unaire
                ops.push(Jeton { tok: Tok::Neg, pos });
            }

            Tok::Plus if !prev_was_value => {
                // plus unaire : neutre
            }

            t if est_binaire(t) => {
                if !prev_was_value {
                    return Err(ErreurSyntaxe::new(pos, "opérateur inattendu"));
                }
                depiler_avant(t, &mut ops, &mut out);
                ops.push(jeton.clone());
                prev_was_value = false;
            }

            _ => return Err(ErreurSyntaxe::new(pos, "jeton inattendu")),
        }
    }

    if !prev_was_value {
        return Err(ErreurSyntaxe::new(dernier.pos, "expression incomplète"));
    }

    // vide la pile ops
    while let Some(op) = ops.pop() {
        if matches!(op.tok, Tok::LPar) {
            return Err(ErreurSyntaxe::new(op.pos, "parenthèse non fermée"));
        }
        out.push(op);
    }

    Ok(out)
}

fn resoudre_ident(name: &str, noms: &dyn Noms) -> Expr {
    if noms.est_variable(name) {
        return Expr::Var(name.to_string());
    }
    if let Some(c) = constante(name) {
        return c;
    }
    if noms.est_unite(name) {
        return Expr::Unite(name.to_string());
    }
    Expr::Var(name.to_string())
}

/// Construit une Expr à partir d’une RPN.
pub fn from_rpn(rpn: &[Jeton], noms: &dyn Noms) -> Result<Expr, ErreurSyntaxe> {
    let mut st: Vec<Expr> = Vec::new();

    for jeton in rpn {
        let pos = jeton.pos;
        let manque = || ErreurSyntaxe::new(pos, "opérande manquant");

        let e = match &jeton.tok {
            Tok::Num(r) => Expr::rat(r.clone()),
            Tok::Approche(i) => Expr::nombre(Nombre::Approx(i.clone())),
            Tok::Ident(name) => resoudre_ident(name, noms),

            Tok::Neg => match st.pop().ok_or_else(manque)? {
                // -3 reste un littéral
                Expr::Num(n) => Expr::Num(-&n),
                x => Expr::neg(x),
            },
            Tok::Prefixe(f) => Expr::fonction(*f, vec![st.pop().ok_or_else(manque)?]),
            Tok::Bang => Expr::fonction(Fonction::Fact, vec![st.pop().ok_or_else(manque)?]),

            Tok::Appel(f, n) => {
                if st.len() < *n {
                    return Err(manque());
                }
                let args = st.split_off(st.len() - n);
                Expr::fonction(*f, args)
            }

            t if est_binaire(t) => {
                let b = st.pop().ok_or_else(manque)?;
                let a = st.pop().ok_or_else(manque)?;
                match t {
                    Tok::Plus => Expr::somme(vec![a, b]),
                    Tok::Minus => Expr::sub(a, b),
                    Tok::Star => Expr::produit(vec![a, b]),
                    Tok::Slash => Expr::div(a, b),
                    Tok::Caret => Expr::puissance(a, b),
                    _ => Expr::conversion(a, b),
                }
            }

            _ => return Err(ErreurSyntaxe::new(pos, "jeton inattendu en RPN")),
        };
        st.push(e);
    }

    match (st.pop(), st.is_empty()) {
        (Some(e), true) => Ok(e),
        _ => Err(ErreurSyntaxe::new(0, "expression invalide")),
    }
}

/// Lecture complète, avec les étapes intermédiaires (pour la démarche).
#[derive(Clone, Debug)]
pub struct Analyse {
    pub jetons: Vec<Jeton>,
    pub rpn: Vec<Jeton>,
    pub expr: Expr,
}

pub fn analyser(texte: &str, noms: &dyn Noms) -> Result<Analyse, ErreurSyntaxe> {
    let jetons = tokenize(texte)?;
    let rpn = to_rpn(&jetons, noms)?;
    let expr = from_rpn(&rpn, noms)?;
    Ok(Analyse { jetons, rpn, expr })
}

/// text -> Expr (pur : ne modifie aucun registre).
pub fn parse(texte: &str, noms: &dyn Noms) -> Result<Expr, ErreurSyntaxe> {
    analyser(texte, noms).map(|a| a.expr)
}
