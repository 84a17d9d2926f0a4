//! Propriétés (proptest) : arithmétique exacte, rendu décimal, aller-retour
//! rendu/lecture (exact et approché), conversions inversibles, idempotence de simplify.

use std::sync::OnceLock;
use std::time::SystemTime;

use num_bigint::BigInt;
use num_rational::BigRational;
use proptest::prelude::*;

use crate::moteur::{Moteur, SourceStatique};
use crate::noyau::canon::simplify;
use crate::noyau::expr::{Constante, Expr, Fonction};
use crate::noyau::format::{decimal_tronque, formater};
use crate::noyau::nombre::Nombre;
use crate::noyau::options::{ModeApproximation, OptionsEvaluation, OptionsImpression};
use crate::noyau::unites::TableTaux;

fn rat(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

fn moteur() -> &'static Moteur {
    static MOTEUR: OnceLock<Moteur> = OnceLock::new();
    MOTEUR.get_or_init(|| {
        let taux = TableTaux::nouvelle("EUR", SystemTime::now()).avec("USD", rat(108, 100));
        Moteur::initialiser(&SourceStatique::nouvelle(taux))
            .unwrap_or_else(|e| panic!("initialisation: {e}"))
    })
}

fn exact() -> OptionsEvaluation {
    OptionsEvaluation {
        mode_approximation: ModeApproximation::Desactive,
        ..OptionsEvaluation::default()
    }
}

fn calcul(texte: &str) -> Expr {
    moteur()
        .calculer(texte, exact())
        .unwrap_or_else(|e| panic!("{texte:?}: {e}"))
        .expr
}

/// Texte lisible par la lecture (moins ASCII pour les littéraux).
fn litteral(r: &BigRational) -> String {
    format!("({}/{})", r.numer(), r.denom())
}

/* ---- stratégies ---- */

fn feuille() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (-20i64..20, 1i64..10).prop_map(|(n, d)| Expr::rat(rat(n, d))),
        Just(Expr::Var("x".into())),
        Just(Expr::Var("y".into())),
        Just(Expr::Constante(Constante::Pi)),
        (0i64..20).prop_map(|n| Expr::puissance(Expr::entier(n), Expr::rat(rat(1, 2)))),
    ]
}

fn arbre() -> impl Strategy<Value = Expr> {
    feuille().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::somme),
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::produit),
            (inner.clone(), -3i64..4).prop_map(|(b, k)| Expr::puissance(b, Expr::entier(k))),
            inner.clone().prop_map(|a| Expr::fonction(Fonction::Sin, vec![a])),
            inner.prop_map(|a| Expr::fonction(Fonction::Ln, vec![a])),
        ]
    })
}

const PAIRES_UNITES: &[(&str, &str)] = &[
    ("m", "ft"),
    ("km", "mi"),
    ("h", "s"),
    ("kg", "lb"),
    ("L", "gal"),
    ("km/h", "m/s"),
    ("EUR", "USD"),
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rationnels_exacts(
        a in -1000i64..1000, b in 1i64..1000,
        c in -1000i64..1000, d in 1i64..1000,
        op in 0usize..4,
    ) {
        prop_assume!(op != 3 || c != 0);
        let (x, y) = (rat(a, b), rat(c, d));
        let (signe, attendu) = match op {
            0 => ("+", &x + &y),
            1 => ("-", &x - &y),
            2 => ("*", &x * &y),
            _ => ("/", &x / &y),
        };
        let texte = format!("{} {signe} {}", litteral(&x), litteral(&y));
        prop_assert_eq!(calcul(&texte), Expr::rat(attendu));
    }

    #[test]
    fn prop_decimal_conforme_au_developpement(a in 1i64..1000, b in 1i64..1000) {
        let r = rat(a, b);
        let texte = formater(&Expr::rat(r.clone()), &OptionsImpression::default()).unwrap();
        let chiffres = texte.trim_end_matches('…');
        let reference = decimal_tronque(&r, 40);
        prop_assert!(
            reference.starts_with(chiffres),
            "{}/{} -> {} (référence {})", a, b, texte, reference
        );
    }

    #[test]
    fn prop_aller_retour_rendu_lecture(a in -100_000i64..100_000, b in 1i64..2000) {
        let r = rat(a, b);
        let o = OptionsImpression {
            indiquer_serie_infinie: false,
            indiquer_approximation: false,
            ..OptionsImpression::default()
        };
        let texte = formater(&Expr::rat(r.clone()), &o).unwrap();
        prop_assert_eq!(calcul(&texte), Expr::rat(r), "texte rendu: {}", texte);
    }

    #[test]
    fn prop_aller_retour_approche(n in 2i64..10_000, a in -1000i64..1000, b in 3i64..1000) {
        let racine = moteur()
            .evaluer(&format!("sqrt({n})"), &OptionsImpression::default(), 2000)
            .unwrap();
        if let Expr::Num(Nombre::Approx(i)) = calcul(&racine) {
            let n = rat(n, 1);
            prop_assert!(i.bas() * i.bas() <= n && n <= i.haut() * i.haut(), "{}", racine);
        } else {
            // carré parfait : rendu exact
            prop_assert!(!racine.starts_with('≈'), "{}", racine);
        }

        let r = rat(a, b);
        let texte = formater(&Expr::rat(r.clone()), &OptionsImpression::default()).unwrap();
        match calcul(&texte) {
            Expr::Num(Nombre::Approx(i)) => {
                prop_assert!(i.bas() <= &r && &r <= i.haut(), "{} -> {:?}", texte, i);
            }
            autre => prop_assert_eq!(autre, Expr::rat(r), "texte rendu: {}", texte),
        }
    }

    #[test]
    fn prop_conversions_inversibles(
        n in 1i64..10_000, d in 1i64..100,
        paire in 0usize..PAIRES_UNITES.len(),
    ) {
        let (u1, u2) = PAIRES_UNITES[paire];
        let v = litteral(&rat(n, d));
        let direct = calcul(&format!("{v} {u1}"));
        let aller_retour = calcul(&format!("({v} {u1} to {u2}) to {u1}"));
        prop_assert_eq!(aller_retour, direct);
    }

    #[test]
    fn prop_simplify_idempotent(e in arbre()) {
        let une = simplify(e);
        let deux = simplify(une.clone());
        prop_assert_eq!(deux, une);
    }
}
