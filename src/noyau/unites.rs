// src/noyau/unites.rs
//
// Registre des unités et devises.
// - catalogue fixe (SI + dérivées + impériales + données), préfixes SI / binaires
// - devises : instantané de taux remplaçable à chaud (Arc derrière RwLock)
// - chaque évaluation capture UNE vue (lecture cohérente, jamais déchirée)
//
// Tous les facteurs sont des rationnels EXACTS vers l’unité de base de la dimension.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use parking_lot::{Mutex, RwLock};

use super::echeance::Echeance;
use super::erreurs::{ErreurInitialisation, ErreurNombre, ErreurUnite};
use super::nombre::{rational_pow_int, rationnel_decimal, Nombre};

/// Au-delà, les taux restent utilisables mais le résultat est annoté.
pub const PEREMPTION_TAUX: Duration = Duration::from_secs(7 * 24 * 3600);

/* ------------------------ Dimension ------------------------ */

const SYMBOLES_DIMENSION: [&str; 9] = ["L", "M", "T", "I", "Θ", "N", "J", "¤", "bit"];

/// Exposants sur (longueur, masse, temps, courant, température, quantité,
/// intensité lumineuse, monnaie, information).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimension(pub [i32; 9]);

impl Dimension {
    pub const SANS: Dimension = Dimension([0; 9]);

    const fn base(i: usize) -> Dimension {
        let mut d = [0; 9];
        d[i] = 1;
        Dimension(d)
    }

    const fn de(v: [i32; 9]) -> Dimension {
        Dimension(v)
    }

    /// None si un exposant sort de i32.
    pub fn mul(self, o: Dimension) -> Option<Dimension> {
        let mut d = self.0;
        for (x, y) in d.iter_mut().zip(o.0) {
            *x = x.checked_add(y)?;
        }
        Some(Dimension(d))
    }

    pub fn puissance(self, k: i32) -> Option<Dimension> {
        let mut d = self.0;
        for x in d.iter_mut() {
            *x = x.checked_mul(k)?;
        }
        Some(Dimension(d))
    }

    pub fn est_sans(&self) -> bool {
        *self == Dimension::SANS
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.est_sans() {
            return write!(f, "1");
        }
        let mut premier = true;
        for (sym, k) in SYMBOLES_DIMENSION.iter().zip(self.0) {
            if k == 0 {
                continue;
            }
            if !premier {
                write!(f, "·")?;
            }
            premier = false;
            if k == 1 {
                write!(f, "{sym}")?;
            } else {
                write!(f, "{sym}^{k}")?;
            }
        }
        Ok(())
    }
}

const LONGUEUR: Dimension = Dimension::base(0);
const MASSE: Dimension = Dimension::base(1);
const TEMPS: Dimension = Dimension::base(2);
const COURANT: Dimension = Dimension::base(3);
const TEMPERATURE: Dimension = Dimension::base(4);
const QUANTITE: Dimension = Dimension::base(5);
const LUMINOSITE: Dimension = Dimension::base(6);
const MONNAIE: Dimension = Dimension::base(7);
const INFORMATION: Dimension = Dimension::base(8);

const SURFACE: Dimension = Dimension::de([2, 0, 0, 0, 0, 0, 0, 0, 0]);
const VOLUME: Dimension = Dimension::de([3, 0, 0, 0, 0, 0, 0, 0, 0]);
const FREQUENCE: Dimension = Dimension::de([0, 0, -1, 0, 0, 0, 0, 0, 0]);
const VITESSE: Dimension = Dimension::de([1, 0, -1, 0, 0, 0, 0, 0, 0]);
const FORCE: Dimension = Dimension::de([1, 1, -2, 0, 0, 0, 0, 0, 0]);
const ENERGIE: Dimension = Dimension::de([2, 1, -2, 0, 0, 0, 0, 0, 0]);
const PUISSANCE: Dimension = Dimension::de([2, 1, -3, 0, 0, 0, 0, 0, 0]);
const PRESSION: Dimension = Dimension::de([-1, 1, -2, 0, 0, 0, 0, 0, 0]);
const CHARGE: Dimension = Dimension::de([0, 0, 1, 1, 0, 0, 0, 0, 0]);
const TENSION: Dimension = Dimension::de([2, 1, -3, -1, 0, 0, 0, 0, 0]);
const RESISTANCE: Dimension = Dimension::de([2, 1, -3, -2, 0, 0, 0, 0, 0]);

/* ------------------------ Catalogue ------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Prefixes {
    Aucun,
    Si,
    SiEtBinaires,
}

/// (nom, alias, dimension, facteur vers la base (décimal ou a/b), préfixes)
const CATALOGUE: &[(&str, &[&str], Dimension, &str, Prefixes)] = &[
    // longueur
    ("m", &["meter", "metre"], LONGUEUR, "1", Prefixes::Si),
    ("in", &["inch"], LONGUEUR, "0.0254", Prefixes::Aucun),
    ("ft", &["foot", "feet"], LONGUEUR, "0.3048", Prefixes::Aucun),
    ("yd", &["yard"], LONGUEUR, "0.9144", Prefixes::Aucun),
    ("mi", &["mile"], LONGUEUR, "1609.344", Prefixes::Aucun),
    ("nmi", &[], LONGUEUR, "1852", Prefixes::Aucun),
    ("au", &[], LONGUEUR, "149597870700", Prefixes::Aucun),
    ("ly", &["lightyear"], LONGUEUR, "9460730472580800", Prefixes::Aucun),
    // masse (base : kg)
    ("g", &["gram", "gramme"], MASSE, "0.001", Prefixes::Si),
    ("t", &["tonne"], MASSE, "1000", Prefixes::Aucun),
    ("lb", &["pound"], MASSE, "0.45359237", Prefixes::Aucun),
    ("oz", &["ounce"], MASSE, "0.028349523125", Prefixes::Aucun),
    // temps
    ("s", &["second", "sec"], TEMPS, "1", Prefixes::Si),
    ("min", &["minute"], TEMPS, "60", Prefixes::Aucun),
    ("h", &["hour", "heure"], TEMPS, "3600", Prefixes::Aucun),
    ("d", &["day", "jour"], TEMPS, "86400", Prefixes::Aucun),
    ("wk", &["week", "semaine"], TEMPS, "604800", Prefixes::Aucun),
    ("yr", &["year", "an"], TEMPS, "31557600", Prefixes::Aucun),
    // bases SI restantes (température : échelle kelvin seulement)
    ("A", &["ampere"], COURANT, "1", Prefixes::Si),
    ("K", &["kelvin"], TEMPERATURE, "1", Prefixes::Si),
    ("mol", &["mole"], QUANTITE, "1", Prefixes::Si),
    ("cd", &["candela"], LUMINOSITE, "1", Prefixes::Si),
    // dérivées
    ("L", &["liter", "litre"], VOLUME, "0.001", Prefixes::Si),
    ("gal", &["gallon"], VOLUME, "0.003785411784", Prefixes::Aucun),
    ("ha", &["hectare"], SURFACE, "10000", Prefixes::Aucun),
    ("Hz", &["hertz"], FREQUENCE, "1", Prefixes::Si),
    ("mph", &[], VITESSE, "0.44704", Prefixes::Aucun),
    ("kn", &["knot"], VITESSE, "1852/3600", Prefixes::Aucun),
    ("N", &["newton"], FORCE, "1", Prefixes::Si),
    ("J", &["joule"], ENERGIE, "1", Prefixes::Si),
    ("cal", &["calorie"], ENERGIE, "4.184", Prefixes::Si),
    ("eV", &[], ENERGIE, "1.602176634e-19", Prefixes::Si),
    ("Wh", &[], ENERGIE, "3600", Prefixes::Si),
    ("W", &["watt"], PUISSANCE, "1", Prefixes::Si),
    ("Pa", &["pascal"], PRESSION, "1", Prefixes::Si),
    ("bar", &[], PRESSION, "100000", Prefixes::Si),
    ("atm", &[], PRESSION, "101325", Prefixes::Aucun),
    ("C", &["coulomb"], CHARGE, "1", Prefixes::Si),
    ("V", &["volt"], TENSION, "1", Prefixes::Si),
    ("Ω", &["ohm"], RESISTANCE, "1", Prefixes::Si),
    // information (base : bit)
    ("bit", &[], INFORMATION, "1", Prefixes::SiEtBinaires),
    ("B", &["byte", "octet"], INFORMATION, "8", Prefixes::SiEtBinaires),
];

const PREFIXES_SI: &[(&str, i32)] = &[
    ("da", 1),
    ("Y", 24),
    ("Z", 21),
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("h", 2),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("µ", -6),
    ("u", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("a", -18),
    ("z", -21),
    ("y", -24),
];

const PREFIXES_BINAIRES: &[(&str, u32)] = &[
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

fn facteur_texte(t: &str) -> Option<BigRational> {
    match t.split_once('/') {
        Some((n, d)) => {
            let d = rationnel_decimal(d)?;
            (!d.is_zero()).then(|| rationnel_decimal(n).map(|n| n / d))?
        }
        None => rationnel_decimal(t),
    }
}

#[derive(Clone, Debug)]
struct Unite {
    dimension: Dimension,
    facteur: BigRational,
    prefixes: Prefixes,
}

#[derive(Debug)]
struct Catalogue {
    unites: Vec<Unite>,
    index: HashMap<&'static str, usize>,
}

impl Catalogue {
    fn standard() -> Self {
        let mut unites = Vec::with_capacity(CATALOGUE.len());
        let mut index = HashMap::new();
        for (nom, alias, dimension, facteur, prefixes) in CATALOGUE {
            // table statique : un littéral invalide serait une faute de frappe ici
            let Some(facteur) = facteur_texte(facteur) else {
                tracing::error!(unite = nom, "facteur de conversion invalide, unité ignorée");
                continue;
            };
            let i = unites.len();
            unites.push(Unite {
                dimension: *dimension,
                facteur,
                prefixes: *prefixes,
            });
            index.insert(*nom, i);
            for a in alias.iter() {
                index.insert(*a, i);
            }
        }
        Self { unites, index }
    }

    /// Nom exact d’abord, puis préfixe + unité préfixable.
    fn chercher(&self, nom: &str) -> Option<(Dimension, BigRational)> {
        if let Some(&i) = self.index.get(nom) {
            let u = &self.unites[i];
            return Some((u.dimension, u.facteur.clone()));
        }

        for (p, bits) in PREFIXES_BINAIRES {
            if let Some(reste) = nom.strip_prefix(p) {
                if let Some(u) = self.prefixable(reste, Prefixes::SiEtBinaires) {
                    let f = &u.facteur * BigRational::from_integer(BigInt::one() << *bits as usize);
                    return Some((u.dimension, f));
                }
            }
        }

        for (p, e10) in PREFIXES_SI {
            if let Some(reste) = nom.strip_prefix(p) {
                if let Some(u) = self.prefixable(reste, Prefixes::Si) {
                    let p10 = BigRational::from_integer(BigInt::from(10).pow(e10.unsigned_abs()));
                    let f = if *e10 >= 0 {
                        &u.facteur * p10
                    } else {
                        &u.facteur / p10
                    };
                    return Some((u.dimension, f));
                }
            }
        }
        None
    }

    fn prefixable(&self, nom: &str, requis: Prefixes) -> Option<&Unite> {
        let u = &self.unites[*self.index.get(nom)?];
        let ok = match requis {
            Prefixes::Aucun => false,
            Prefixes::Si => u.prefixes != Prefixes::Aucun,
            Prefixes::SiEtBinaires => u.prefixes == Prefixes::SiEtBinaires,
        };
        ok.then_some(u)
    }
}

/* ------------------------ Taux de change ------------------------ */

/// Instantané des taux : `taux[code]` = unités de `code` pour 1 unité de `base`.
#[derive(Clone, Debug)]
pub struct TableTaux {
    pub base: String,
    pub taux: HashMap<String, BigRational>,
    pub mis_a_jour: SystemTime,
}

impl TableTaux {
    pub fn nouvelle(base: impl Into<String>, mis_a_jour: SystemTime) -> Self {
        Self {
            base: base.into(),
            taux: HashMap::new(),
            mis_a_jour,
        }
    }

    pub fn avec(mut self, code: impl Into<String>, taux: BigRational) -> Self {
        self.taux.insert(code.into(), taux);
        self
    }

    pub fn est_perimee(&self, maintenant: SystemTime) -> bool {
        maintenant
            .duration_since(self.mis_a_jour)
            .is_ok_and(|age| age > PEREMPTION_TAUX)
    }

    fn valider(&self) -> Result<(), ErreurInitialisation> {
        if self.base.is_empty() {
            return Err(ErreurInitialisation::DonneesManquantes(
                "devise de base".into(),
            ));
        }
        for (code, t) in &self.taux {
            if !t.is_positive() {
                return Err(ErreurInitialisation::TauxInvalide(code.clone()));
            }
        }
        Ok(())
    }

    /// Facteur vers la devise de base.
    fn facteur(&self, code: &str) -> Option<BigRational> {
        if code == self.base {
            return Some(BigRational::one());
        }
        self.taux.get(code).map(BigRational::recip)
    }
}

/* ------------------------ Registre partagé ------------------------ */

/// Unité résolue (nom simple, éventuellement préfixé).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniteResolue {
    pub dimension: Dimension,
    pub facteur: BigRational,
    pub monnaie: bool,
}

#[derive(Debug)]
pub struct Registre {
    catalogue: Catalogue,
    taux: RwLock<Arc<TableTaux>>,
    // validation + échange d’un rafraîchissement, hors du verrou des lecteurs
    rafraichissement: Mutex<()>,
}

impl Registre {
    pub fn nouveau(taux: TableTaux) -> Result<Self, ErreurInitialisation> {
        taux.valider()?;
        Ok(Self {
            catalogue: Catalogue::standard(),
            taux: RwLock::new(Arc::new(taux)),
            rafraichissement: Mutex::new(()),
        })
    }

    /// Capture l’instantané courant : toute l’évaluation le verra, même si un
    /// rafraîchissement arrive entre-temps.
    pub fn vue(&self) -> VueRegistre<'_> {
        VueRegistre {
            catalogue: &self.catalogue,
            taux: Arc::clone(&self.taux.read()),
        }
    }

    /// Remplace atomiquement les taux (et leur date). Sérialisé avec lui-même.
    pub fn refresh_rates(&self, nouveaux: TableTaux) -> Result<(), ErreurInitialisation> {
        let _seul = self.rafraichissement.lock();
        nouveaux.valider()?;

        let n = nouveaux.taux.len();
        let nouveaux = Arc::new(nouveaux);
        *self.taux.write() = nouveaux;

        tracing::info!(devises = n, "taux de change rafraîchis");
        Ok(())
    }

    pub fn mis_a_jour(&self) -> SystemTime {
        self.taux.read().mis_a_jour
    }
}

/// Vue cohérente du registre pour UNE évaluation.
#[derive(Clone, Debug)]
pub struct VueRegistre<'a> {
    catalogue: &'a Catalogue,
    taux: Arc<TableTaux>,
}

impl VueRegistre<'_> {
    pub fn resoudre(&self, nom: &str) -> Option<UniteResolue> {
        if let Some((dimension, facteur)) = self.catalogue.chercher(nom) {
            return Some(UniteResolue {
                dimension,
                facteur,
                monnaie: false,
            });
        }
        self.taux.facteur(nom).map(|facteur| UniteResolue {
            dimension: MONNAIE,
            facteur,
            monnaie: true,
        })
    }

    pub fn est_unite(&self, nom: &str) -> bool {
        self.resoudre(nom).is_some()
    }

    pub fn taux_perimes(&self) -> bool {
        self.taux.est_perimee(SystemTime::now())
    }

    /// Produit d’unités (nom, exposant) -> (dimension, facteur, contient une devise).
    /// Les facteurs passent par `rational_pow_int` : même plafond de bits que les
    /// puissances exactes, échéance sondée.
    pub fn facteur_compose(
        &self,
        unites: &[(String, i32)],
        echeance: &Echeance,
    ) -> Result<(Dimension, BigRational, bool), ErreurUnite> {
        let mut dim = Dimension::SANS;
        let mut facteur = BigRational::one();
        let mut monnaie = false;

        for (nom, k) in unites {
            echeance.verifier()?;
            let u = self
                .resoudre(nom)
                .ok_or_else(|| ErreurUnite::UniteInconnue(nom.clone()))?;
            dim = u
                .dimension
                .puissance(*k)
                .and_then(|d| dim.mul(d))
                .ok_or(ErreurNombre::Depassement)?;
            facteur *= rational_pow_int(&u.facteur, &BigInt::from(*k), echeance)?;
            monnaie |= u.monnaie;
        }
        Ok((dim, facteur, monnaie))
    }

    /// valeur · facteur(de) / facteur(vers), exact si la valeur l’est.
    pub fn convert(&self, valeur: &Nombre, de: &str, vers: &str) -> Result<Nombre, ErreurUnite> {
        let a = self
            .resoudre(de)
            .ok_or_else(|| ErreurUnite::UniteInconnue(de.to_string()))?;
        let b = self
            .resoudre(vers)
            .ok_or_else(|| ErreurUnite::UniteInconnue(vers.to_string()))?;

        if a.dimension != b.dimension {
            return Err(ErreurUnite::DimensionIncompatible {
                de: de.to_string(),
                vers: vers.to_string(),
            });
        }
        if a.facteur.is_zero() || b.facteur.is_zero() {
            return Err(ErreurUnite::UniteInconnue(vers.to_string()));
        }
        Ok(valeur * &Nombre::Exact(a.facteur / b.facteur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn registre() -> Registre {
        let t = TableTaux::nouvelle("EUR", SystemTime::now())
            .avec("USD", rat(108, 100))
            .avec("GBP", rat(85, 100));
        Registre::nouveau(t).unwrap()
    }

    #[test]
    fn metre_vers_pied_exact() {
        let r = registre();
        let v = r.vue().convert(&Nombre::entier(1), "m", "ft").unwrap();
        assert_eq!(v, Nombre::rationnel(1250, 381));
    }

    #[test]
    fn prefixes() {
        let r = registre();
        let vue = r.vue();
        assert_eq!(vue.resoudre("km").map(|u| u.facteur), Some(rat(1000, 1)));
        assert_eq!(vue.resoudre("mg").map(|u| u.facteur), Some(rat(1, 1_000_000)));
        assert_eq!(vue.resoudre("KiB").map(|u| u.facteur), Some(rat(8192, 1)));
        assert_eq!(vue.resoudre("µs").map(|u| u.facteur), Some(rat(1, 1_000_000)));
        // nom exact prioritaire : "min" est la minute, pas milli-"in"
        assert_eq!(vue.resoudre("min").map(|u| u.facteur), Some(rat(60, 1)));
        // pouce non préfixable
        assert!(vue.resoudre("kin").is_none());
        assert!(vue.resoudre("Kift").is_none());
    }

    #[test]
    fn dimensions_incompatibles() {
        let r = registre();
        let e = r.vue().convert(&Nombre::entier(1), "m", "s");
        assert!(matches!(e, Err(ErreurUnite::DimensionIncompatible { .. })));
    }

    #[test]
    fn compose_vitesse() {
        let r = registre();
        let (d, f, m) = r
            .vue()
            .facteur_compose(&[("km".into(), 1), ("h".into(), -1)], &Echeance::illimitee())
            .unwrap();
        assert_eq!(d, VITESSE);
        assert_eq!(f, rat(5, 18));
        assert!(!m);
        assert_eq!(d.to_string(), "L·T^-1");
    }

    #[test]
    fn exposants_demesures() {
        let r = registre();
        let vue = r.vue();
        let illimitee = Echeance::illimitee();

        // N = L·M·T^-2 : T^(-2·1.5e9) sort de i32
        let e = vue.facteur_compose(&[("N".into(), 1_500_000_000)], &illimitee);
        assert_eq!(e, Err(ErreurUnite::Calcul(ErreurNombre::Depassement)));

        // km^3e6 : facteur au-delà du plafond de bits, refusé sans le calculer
        let e = vue.facteur_compose(&[("km".into(), 3_000_000)], &illimitee);
        assert_eq!(e, Err(ErreurUnite::Calcul(ErreurNombre::Depassement)));

        assert_eq!(Dimension::de([i32::MAX, 0, 0, 0, 0, 0, 0, 0, 0]).mul(LONGUEUR), None);
        assert_eq!(LONGUEUR.puissance(-3), Some(Dimension::de([-3, 0, 0, 0, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn facteur_sous_echeance() {
        let r = registre();
        let ech = Echeance::illimitee().avec_pas_max(Some(0));
        let e = r.vue().facteur_compose(&[("m".into(), 2)], &ech);
        assert_eq!(e, Err(ErreurUnite::Calcul(ErreurNombre::Interrompu)));
    }

    #[test]
    fn devises_et_rafraichissement() {
        let r = registre();
        let avant = r.vue();
        let v = avant.convert(&Nombre::entier(1), "EUR", "USD").unwrap();
        assert_eq!(v, Nombre::rationnel(108, 100));

        let t = TableTaux::nouvelle("EUR", SystemTime::now()).avec("USD", rat(2, 1));
        r.refresh_rates(t).unwrap();

        // la vue capturée garde son instantané
        let v = avant.convert(&Nombre::entier(1), "EUR", "USD").unwrap();
        assert_eq!(v, Nombre::rationnel(108, 100));
        let v = r.vue().convert(&Nombre::entier(1), "EUR", "USD").unwrap();
        assert_eq!(v, Nombre::entier(2));
        assert!(r.vue().resoudre("GBP").is_none());
    }

    #[test]
    fn taux_invalides_et_perimes() {
        let r = registre();
        let t = TableTaux::nouvelle("EUR", SystemTime::now()).avec("USD", rat(-1, 1));
        assert!(matches!(
            r.refresh_rates(t),
            Err(ErreurInitialisation::TauxInvalide(_))
        ));

        let vieux = SystemTime::now() - Duration::from_secs(30 * 24 * 3600);
        r.refresh_rates(TableTaux::nouvelle("EUR", vieux)).unwrap();
        assert!(r.vue().taux_perimes());
        assert!(!registre().vue().taux_perimes());
    }
}
