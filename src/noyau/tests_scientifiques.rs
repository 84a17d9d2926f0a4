//! Tests scientifiques (campagne) : scénarios de référence + invariants + limites contrôlées.
//!
//! But : trouver les limites sans faire chauffer la machine.
//! - budget temps global par test
//! - tailles bornées (profondeur, longueur)
//! - deux régimes : exact (approximation désactivée, fractions) et options par défaut

use std::time::{Duration, Instant, SystemTime};

use num_bigint::BigInt;
use num_rational::BigRational;
use pretty_assertions::assert_eq;

use crate::moteur::{Moteur, SourceStatique};
use crate::noyau::erreurs::Avertissement;
use crate::noyau::expr::Expr;
use crate::noyau::options::{ModeApproximation, ModeFraction, OptionsEvaluation, OptionsImpression};
use crate::noyau::unites::TableTaux;

fn moteur() -> Moteur {
    let taux = TableTaux::nouvelle("EUR", SystemTime::now())
        .avec("USD", BigRational::new(BigInt::from(108), BigInt::from(100)))
        .avec("JPY", BigRational::from_integer(BigInt::from(160)));
    Moteur::initialiser(&SourceStatique::nouvelle(taux))
        .unwrap_or_else(|e| panic!("initialisation: {e}"))
}

fn options_exactes() -> OptionsImpression {
    OptionsImpression {
        mode_approximation: ModeApproximation::Desactive,
        mode_fraction: ModeFraction::ForcerFraction,
        ..OptionsImpression::default()
    }
}

fn eval_avec(texte: &str, o: &OptionsImpression) -> String {
    moteur()
        .evaluer(texte, o, 2000)
        .unwrap_or_else(|e| panic!("texte={texte:?} err={e}"))
}

fn eval_defaut(texte: &str) -> String {
    eval_avec(texte, &OptionsImpression::default())
}

fn assert_exact_eq(texte: &str, attendu: &str) {
    assert_eq!(eval_avec(texte, &options_exactes()), attendu, "texte={texte:?}");
}

fn assert_indefini(texte: &str) {
    let t = eval_avec(texte, &options_exactes());
    assert!(t.starts_with("indéfini ["), "texte={texte:?} -> {t}");
}

/// Budget global anti-gel.
fn budget(start: Instant, max: Duration) {
    if start.elapsed() > max {
        panic!("budget temps dépassé: {:?}", max);
    }
}

/* ------------------------ Scénarios de référence ------------------------ */

#[test]
fn sci_scenarios_de_reference() {
    assert_eq!(eval_defaut("1/3"), "0.333333333333…");
    assert_eq!(eval_defaut("2 + 2"), "4");
    assert_eq!(eval_defaut("1 m to ft"), "3.28083989501… ft");
    assert_eq!(eval_defaut("1/0 + 5"), "indéfini [division par zéro]");

    let t = eval_defaut("sqrt(-1)");
    assert!(t.starts_with("indéfini [non utilisable"), "{t}");

    let e = moteur()
        .evaluer("2 + * 3", &OptionsImpression::default(), 2000)
        .unwrap_err();
    assert_eq!(e.position, 4);
}

#[test]
fn sci_ascii() {
    let o = OptionsImpression::ascii();
    assert_eq!(eval_avec("1/3", &o), "0.333333333333...");
    assert_eq!(eval_avec("sqrt(-1)", &o).split(' ').next(), Some("indefini"));
    assert_eq!(eval_avec("-5/2", &o), "-2.5");
}

/* ------------------------ Invariants trig (angles spéciaux) ------------------------ */

#[test]
fn sci_indefinis_tan() {
    assert_indefini("tan(pi/2)");
    assert_indefini("tan(3*pi/2)");
    assert_indefini("tan(-pi/2)");
}

#[test]
fn sci_identites_symetrie() {
    // sin(-x) = -sin(x)
    assert_exact_eq("sin(-pi/4)", "−√2/2");
    assert_exact_eq("sin(pi/4)", "√2/2");

    // cos(-x) = cos(x)
    assert_exact_eq("cos(-pi/3)", "1/2");
    assert_exact_eq("cos(pi/3)", "1/2");

    // tan(-x) = -tan(x) (hors indéfini)
    assert_exact_eq("tan(-pi/6)", "−√3/3");
    assert_exact_eq("tan(pi/6)", "√3/3");
}

#[test]
fn sci_periodicite_angles() {
    assert_exact_eq("sin(9*pi/4)", "√2/2");
    assert_exact_eq("cos(7*pi/3)", "1/2");
    assert_exact_eq("tan(7*pi/6)", "√3/3");
    // la somme est repliée en coeff·π avant la table
    assert_exact_eq("sin(pi/4 + 2*pi)", "√2/2");
    assert_exact_eq("cos(30°)", "√3/2");
}

#[test]
fn sci_pythagore_et_parite() {
    assert_exact_eq("sin(x)^2 + cos(x)^2", "1");
    assert_exact_eq("sin(-x) + sin(x)", "0");
    assert_exact_eq("atan(1)", "π/4");
}

#[test]
fn sci_propagation_indefini() {
    assert_indefini("1 + tan(pi/2)");
    assert_indefini("tan(pi/2) + 1");
    assert_indefini("2 * tan(pi/2)");
    assert_indefini("tan(pi/2) / 3");
    assert_indefini("ln(0)");
    assert_indefini("0^-1");
}

/* ------------------------ Cohérence algébrique (zéro) ------------------------ */

#[test]
fn sci_zero_algebrique() {
    assert_exact_eq("(1/2 + 1/3) - 5/6", "0");
    assert_exact_eq("(2/3 * 3/4) - 1/2", "0");
    assert_exact_eq("sqrt(2)*sqrt(2) - 2", "0");
    assert_exact_eq("1/sqrt(3)", "√3/3");
    assert_exact_eq("sqrt(3)/3", "√3/3");
    // annulation structurelle
    assert_exact_eq("sqrt(3)/3 - 1/sqrt(3)", "0");
    assert_exact_eq("2x - x - x", "0");
    assert_exact_eq("sqrt(12)", "2√3");
}

/* ------------------------ Approximation certifiée ------------------------ */

#[test]
fn sci_approximation_auto() {
    assert_eq!(eval_defaut("sqrt(2)"), "≈1.41421356237");
    assert_eq!(eval_defaut("pi"), "≈3.14159265359");
    assert_eq!(eval_defaut("e"), "≈2.71828182846");

    let o = OptionsImpression::default().avec_precision(30);
    assert_eq!(eval_avec("pi", &o), "≈3.14159265358979323846264338328");

    // exact quand c’est possible, même en mode auto
    assert_eq!(eval_defaut("sin(pi/6)"), "0.5");
    assert_eq!(eval_defaut("ln(e^3)"), "3");
}

#[test]
fn sci_fonctions_entieres() {
    assert_exact_eq("gcd(12, 18)", "6");
    assert_exact_eq("lcm(4, 6)", "12");
    assert_exact_eq("20!", "2432902008176640000");
    assert_exact_eq("floor(7/2) + ceil(7/2)", "7");
    assert_exact_eq("max(1/3, 1/2)", "1/2");
    assert_exact_eq("abs(-3/4)", "3/4");
    assert_exact_eq("log(1000, 10)", "3");
    assert_exact_eq("log2(1/8)", "−3");
    assert_exact_eq("root(27, 3)", "3");
}

/* ------------------------ Unités ------------------------ */

#[test]
fn sci_conversions_inversibles() {
    assert_eq!(eval_defaut("1 ft to m"), "0.3048 m");
    assert_eq!(eval_defaut("(1 m to ft) to m"), "1 m");
    assert_eq!(eval_defaut("36 km/h to m/s"), "10 m/s");
    assert_eq!(eval_defaut("1 mi to km"), "1.609344 km");
    assert_eq!(eval_defaut("2 h + 30 min"), "2.5 h");
    assert_eq!(eval_defaut("1 m + 50 cm"), "1.5 m");

    let t = eval_defaut("1 m to s");
    assert!(t.contains("[dimensions incompatibles"), "{t}");
}

#[test]
fn sci_devises() {
    assert_eq!(eval_defaut("100 USD to EUR"), "92.5925925925… EUR");
    assert_eq!(eval_defaut("1 EUR to JPY"), "160 JPY");
}

/* ------------------------ Échéance ------------------------ */

#[test]
fn sci_echeance_minuscule() {
    let t0 = Instant::now();
    let m = moteur();
    let t = m
        .evaluer("fact(200000)", &OptionsImpression::default(), 1)
        .unwrap();
    assert!(t.contains("délai dépassé"), "{t}");
    // l’interruption coopérative rend la main vite
    budget(t0, Duration::from_secs(2));
}

#[test]
fn sci_echeance_par_pas() {
    let m = moteur();
    let o = OptionsEvaluation::default().avec_pas_max(20);
    let c = m.calculer("fact(200000) + fact(100000)", o).unwrap();
    assert!(c.avertissements.contains(&Avertissement::EcheanceDepassee));
    assert!(c.expr.taille() > 1);
}

/// Délai court : le calcul doit rendre la main dans le délai plus un sondage.
const DELAI_COURT_MS: u64 = 50;
const MARGE_SONDAGE: Duration = Duration::from_millis(450);

fn eval_delai_court(texte: &str) -> String {
    let m = moteur();
    let t0 = Instant::now();
    let t = m
        .evaluer(texte, &OptionsImpression::default(), DELAI_COURT_MS)
        .unwrap_or_else(|e| panic!("texte={texte:?} err={e}"));
    budget(t0, Duration::from_millis(DELAI_COURT_MS) + MARGE_SONDAGE);
    t
}

#[test]
fn sci_echeance_courte_racine_d_indice_enorme() {
    let t = eval_delai_court("root(2, 300000)");
    assert!(t.starts_with("≈1.0000023") || t.contains("délai dépassé"), "{t}");
    let t = eval_delai_court("root(-8, 1000001)");
    assert!(t.starts_with("≈−1.0000020") || t.contains("délai dépassé"), "{t}");
}

#[test]
fn sci_echeance_courte_puissances_enormes() {
    for texte in ["2^(10^7)", "(3/2)^(10^9)", "2^(2^40) + 1"] {
        let t = eval_delai_court(texte);
        assert!(t.contains("trop grand") || t.contains("délai dépassé"), "{texte}: {t}");
    }
}

#[test]
fn sci_echeance_courte_exposants_d_unites() {
    let t = eval_delai_court("1 km^3000000 to m^3000000");
    assert!(t.contains("trop grand"), "{t}");
    // exposant de dimension hors i32 : annoté, sans panique
    let t = eval_delai_court("1 N^1500000000 to N^1500000000");
    assert!(t.contains("trop grand"), "{t}");
}

/* ------------------------ Relecture des rendus ------------------------ */

#[test]
fn sci_rendus_approches_relus() {
    let cas = [
        ("sqrt(2)", "≈1.414"),
        ("1/3", "≈0.3333"),
        ("1 m to ft", "≈3.2808"),
        ("-sqrt(3)", "≈−1.732"),
    ];
    for (texte, debut) in cas {
        let rendu = eval_defaut(texte);
        let relu = eval_defaut(&rendu);
        assert!(relu.starts_with(debut), "{texte} -> {rendu} -> {relu}");
    }
    assert!(eval_defaut(&eval_defaut("1 m to ft")).ends_with(" ft"));

    let ascii = OptionsImpression::ascii();
    let rendu = eval_avec("1/3", &ascii);
    assert_eq!(rendu, "0.333333333333...");
    assert!(eval_avec(&rendu, &ascii).starts_with("~0.3333"));
}

#[test]
fn sci_litteral_a_exposant_demesure() {
    let m = moteur();
    let dix = BigInt::from(10);
    for (texte, k) in [("1e200000", 1), ("3E+150000", 3)] {
        let e: u32 = texte[texte.find(['e', 'E']).unwrap() + 1..]
            .trim_start_matches('+')
            .parse()
            .unwrap();
        let c = m.calculer(texte, OptionsEvaluation::default()).unwrap();
        assert_eq!(
            c.expr,
            Expr::rat(BigRational::from_integer(BigInt::from(k) * dix.pow(e))),
            "{texte}"
        );
    }
    // au-delà de BITS_MAX : annoté, jamais une erreur de syntaxe
    let t = eval_defaut("1e2000000");
    assert!(t.contains("trop grand"), "{t}");
    let t = eval_defaut("1e99999999999999999999");
    assert!(t.contains("trop grand"), "{t}");
}

/* ------------------------ Stress contrôlé (sans brûler) ------------------------ */

#[test]
fn sci_stress_profondeur_sqrt_safe() {
    let t0 = Instant::now();
    let max = Duration::from_millis(2000);

    // √ et ² alternés : reste rationnel à chaque étape
    let mut expr = "4".to_string();
    for k in 0..60 {
        expr = if k % 2 == 0 {
            format!("sqrt({expr})")
        } else {
            format!("({expr})^2")
        };
    }
    let t = eval_avec(&expr, &options_exactes());
    budget(t0, max);
    assert_eq!(t, "4");
}

#[test]
fn sci_stress_taille_somme_safe() {
    let t0 = Instant::now();
    let max = Duration::from_millis(2000);

    let expr = vec!["1/2"; 80].join(" + ");
    let t = eval_defaut(&expr);
    budget(t0, max);
    assert_eq!(t, "40");
}

#[test]
fn sci_stress_bigint_safe() {
    let t0 = Instant::now();
    let max = Duration::from_millis(2000);

    // gros numérateur contrôlé (100 chiffres) : 10^100/7
    let big = "9".repeat(100);
    let t = eval_defaut(&format!("{big}/7 + 1/7"));
    budget(t0, max);
    assert_eq!(t, "1.42857142857E+99…");
}
