//! Global physicochemical descriptors for peptide sequences.
//!
//! Produces the feature columns the internal models are trained on, in a
//! fixed order. Models are matched to these columns by name, so the order
//! here only matters for the features report.

use crate::config::FeaturesConfig;
use crate::error::MatrixError;
use crate::types::{FeatureMatrix, SequenceRecord};

const WATER_MASS: f64 = 18.015_28;
/// Mass change of replacing the C-terminal OH with NH2
const AMIDE_MASS_DELTA: f64 = -0.984_0;

const PKA_N_TERM: f64 = 8.6;
const PKA_C_TERM: f64 = 3.6;

const FEATURE_NAMES: [&str; 10] = [
    "Length",
    "MW",
    "Charge",
    "ChargeDensity",
    "pI",
    "InstabilityInd",
    "Aromaticity",
    "AliphaticInd",
    "BomanInd",
    "HydrophRatio",
];

/// Average residue mass (amino acid minus water)
fn residue_mass(aa: char) -> Option<f64> {
    let mass = match aa {
        'A' => 71.0788,
        'R' => 156.1875,
        'N' => 114.1038,
        'D' => 115.0886,
        'C' => 103.1388,
        'E' => 129.1155,
        'Q' => 128.1307,
        'G' => 57.0519,
        'H' => 137.1411,
        'I' => 113.1594,
        'L' => 113.1594,
        'K' => 128.1741,
        'M' => 131.1926,
        'F' => 147.1766,
        'P' => 97.1167,
        'S' => 87.0782,
        'T' => 101.1051,
        'W' => 186.2132,
        'Y' => 163.1760,
        'V' => 99.1326,
        _ => return None,
    };
    Some(mass)
}

/// Boman solubility scale (kcal/mol)
fn boman_value(aa: char) -> f64 {
    match aa {
        'L' | 'I' => 4.92,
        'V' => 4.04,
        'F' => 2.98,
        'M' => 2.35,
        'W' => 2.33,
        'A' => 1.81,
        'C' => 1.28,
        'G' => 0.94,
        'Y' => -0.14,
        'T' => -2.57,
        'S' => -3.40,
        'H' => -4.66,
        'Q' => -5.54,
        'K' => -5.55,
        'N' => -6.64,
        'E' => -6.81,
        'D' => -8.72,
        'R' => -14.92,
        _ => 0.0,
    }
}

/// Row and column order of [`DIWV`]
const DIWV_ALPHABET: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Guruprasad dipeptide instability weights, `DIWV[first][second]`
#[rustfmt::skip]
const DIWV: [[f64; 20]; 20] = [
    // A
    [1.0, 44.94, -7.49, 1.0, 1.0, 1.0, -7.49, 1.0, 1.0, 1.0, 1.0, 1.0, 20.26, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    // C
    [1.0, 1.0, 20.26, 1.0, 1.0, 1.0, 33.6, 1.0, 1.0, 20.26, 33.6, 1.0, 20.26, -6.54, 1.0, 1.0, 33.6, -6.54, 24.68, 1.0],
    // D
    [1.0, 1.0, 1.0, 1.0, -6.54, 1.0, 1.0, 1.0, -7.49, 1.0, 1.0, 1.0, 1.0, 1.0, -6.54, 20.26, -14.03, 1.0, 1.0, 1.0],
    // E
    [1.0, 44.94, 20.26, 33.6, 1.0, 1.0, -6.54, 20.26, 1.0, 1.0, 1.0, 1.0, 20.26, 20.26, 1.0, 20.26, 1.0, 1.0, -14.03, 1.0],
    // F
    [1.0, 1.0, 13.34, 1.0, 1.0, 1.0, 1.0, 1.0, -14.03, 1.0, 1.0, 1.0, 20.26, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 33.601],
    // G
    [-7.49, 1.0, 1.0, -6.54, 1.0, 13.34, 1.0, -7.49, -7.49, 1.0, 1.0, -7.49, 1.0, 1.0, 1.0, 1.0, -7.49, 1.0, 13.34, -7.49],
    // H
    [1.0, 1.0, 1.0, 1.0, -9.37, -9.37, 1.0, 44.94, 24.68, 1.0, 1.0, 24.68, -1.88, 1.0, 1.0, 1.0, -6.54, 1.0, -1.88, 44.94],
    // I
    [1.0, 1.0, 1.0, 44.94, 1.0, 1.0, 13.34, 1.0, -7.49, 20.26, 1.0, 1.0, -1.88, 1.0, 1.0, 1.0, 1.0, -7.49, 1.0, 1.0],
    // K
    [1.0, 1.0, 1.0, 1.0, 1.0, -7.49, 1.0, -7.49, 1.0, -7.49, 33.6, 1.0, -6.54, 24.64, 33.6, 1.0, 1.0, -7.49, 1.0, 1.0],
    // L
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, -7.49, 1.0, 1.0, 1.0, 20.26, 33.6, 20.26, 1.0, 1.0, 1.0, 24.68, 1.0],
    // M
    [13.34, 1.0, 1.0, 1.0, 1.0, 1.0, 58.28, 1.0, 1.0, 1.0, -1.88, 1.0, 44.94, -6.54, -6.54, 44.94, -1.88, 1.0, 1.0, 24.68],
    // N
    [1.0, -1.88, 1.0, 1.0, -14.03, -14.03, 1.0, 44.94, 24.68, 1.0, 1.0, 1.0, -1.88, -6.54, 1.0, 1.0, -7.49, 1.0, -9.37, 1.0],
    // P
    [20.26, -6.54, -6.54, 18.38, 20.26, 1.0, 1.0, 1.0, 1.0, 1.0, -6.54, 1.0, 20.26, 20.26, -6.54, 20.26, 1.0, 20.26, -1.88, 1.0],
    // Q
    [1.0, -6.54, 20.26, 20.26, -6.54, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 20.26, 20.26, 1.0, 44.94, 1.0, -6.54, 1.0, -6.54],
    // R
    [1.0, 1.0, 1.0, 1.0, 1.0, -7.49, 20.26, 1.0, 1.0, 1.0, 1.0, 13.34, 20.26, 20.26, 58.28, 44.94, 1.0, 1.0, 58.28, -6.54],
    // S
    [1.0, 33.6, 1.0, 20.26, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 44.94, 20.26, 20.26, 20.26, 1.0, 1.0, 1.0, 1.0],
    // T
    [1.0, 1.0, 1.0, 20.26, 13.34, -7.49, 1.0, 1.0, 1.0, 1.0, 1.0, -14.03, 1.0, -6.54, 1.0, 1.0, 1.0, 1.0, -14.03, 1.0],
    // V
    [1.0, 1.0, -14.03, 1.0, 1.0, -7.49, 1.0, 1.0, -1.88, 1.0, 1.0, 1.0, 20.26, 1.0, 1.0, 1.0, -7.49, 1.0, 1.0, -6.54],
    // W
    [-14.03, 1.0, 1.0, 1.0, 1.0, -9.37, 24.68, 1.0, 1.0, 13.34, 24.68, 13.34, 1.0, 1.0, 1.0, 1.0, -14.03, -7.49, 1.0, 1.0],
    // Y
    [24.68, 1.0, 24.68, -6.54, 1.0, -7.49, 13.34, 1.0, 1.0, 1.0, 44.94, 1.0, 13.34, 1.0, -15.91, 1.0, -7.49, 1.0, -9.37, 13.34],
];

fn diwv_index(aa: char) -> Option<usize> {
    DIWV_ALPHABET.find(aa)
}

/// Side-chain pKa and whether the group is basic
fn side_chain_pka(aa: char) -> Option<(f64, bool)> {
    match aa {
        'K' => Some((10.8, true)),
        'R' => Some((12.5, true)),
        'H' => Some((6.5, true)),
        'D' => Some((3.9, false)),
        'E' => Some((4.1, false)),
        'C' => Some((8.5, false)),
        'Y' => Some((10.1, false)),
        _ => None,
    }
}

/// Computes descriptor vectors for sequences.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    amide: bool,
    ph: f64,
}

impl FeatureExtractor {
    /// Create an extractor with an amidated C-terminus at pH 7.0.
    pub fn new() -> Self {
        Self {
            amide: true,
            ph: 7.0,
        }
    }

    pub fn from_config(config: &FeaturesConfig) -> Self {
        Self {
            amide: config.amide,
            ph: config.ph,
        }
    }

    /// Descriptor values for one sequence, ordered as [`feature_names`](Self::feature_names).
    ///
    /// Ratios are NaN for an empty sequence; the matrix zero-fills them.
    pub fn extract(&self, sequence: &str) -> Vec<f64> {
        let residues: Vec<char> = sequence.chars().map(|c| c.to_ascii_uppercase()).collect();
        let length = residues.len() as f64;
        let count = |set: &[char]| residues.iter().filter(|c| set.contains(c)).count() as f64;

        let mw = self.molecular_weight(&residues);
        let charge = self.net_charge(&residues, self.ph);

        let aliphatic = (count(&['A']) + 2.9 * count(&['V']) + 3.9 * count(&['I', 'L'])) / length
            * 100.0;
        let boman = -residues.iter().map(|&c| boman_value(c)).sum::<f64>() / length;

        vec![
            length,
            mw,
            charge,
            charge / mw,
            self.isoelectric_point(&residues),
            instability_index(&residues),
            count(&['F', 'W', 'Y']) / length,
            aliphatic,
            boman,
            count(&['A', 'C', 'F', 'I', 'L', 'M', 'V', 'W']) / length,
        ]
    }

    /// Build the feature matrix for a record set
    pub fn build_matrix(&self, records: Vec<SequenceRecord>) -> Result<FeatureMatrix, MatrixError> {
        let values = records.iter().map(|r| self.extract(&r.sequence)).collect();
        let columns = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        FeatureMatrix::new(records, columns, values)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Get feature names in output order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_NAMES.to_vec()
    }

    fn molecular_weight(&self, residues: &[char]) -> f64 {
        let residue_sum: f64 = residues.iter().filter_map(|&c| residue_mass(c)).sum();
        let terminus = if self.amide { AMIDE_MASS_DELTA } else { 0.0 };
        residue_sum + WATER_MASS + terminus
    }

    /// Henderson-Hasselbalch net charge
    fn net_charge(&self, residues: &[char], ph: f64) -> f64 {
        let positive = |pka: f64| 1.0 / (1.0 + 10f64.powf(ph - pka));
        let negative = |pka: f64| -1.0 / (1.0 + 10f64.powf(pka - ph));

        let mut charge = positive(PKA_N_TERM);
        if !self.amide {
            charge += negative(PKA_C_TERM);
        }
        for &aa in residues {
            if let Some((pka, basic)) = side_chain_pka(aa) {
                charge += if basic { positive(pka) } else { negative(pka) };
            }
        }
        charge
    }

    /// pH of zero net charge, found by bisection; charge falls monotonically with pH
    fn isoelectric_point(&self, residues: &[char]) -> f64 {
        let (mut low, mut high) = (0.0_f64, 14.0_f64);
        for _ in 0..60 {
            let mid = (low + high) / 2.0;
            if self.net_charge(residues, mid) > 0.0 {
                low = mid;
            } else {
                high = mid;
            }
        }
        (low + high) / 2.0
    }
}

/// Guruprasad instability index; dipeptides with a non-standard residue add nothing
fn instability_index(residues: &[char]) -> f64 {
    let total: f64 = residues
        .windows(2)
        .filter_map(|pair| Some(DIWV[diwv_index(pair[0])?][diwv_index(pair[1])?]))
        .sum();
    10.0 * total / residues.len() as f64
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(values: &[f64], name: &str) -> f64 {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        values[idx]
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 10);
        assert_eq!(extractor.feature_names().len(), 10);
        assert_eq!(extractor.extract("KKKK").len(), 10);
    }

    #[test]
    fn test_instability_follows_pi() {
        let names = FeatureExtractor::new().feature_names();
        let pi = names.iter().position(|n| *n == "pI").unwrap();
        assert_eq!(names[pi + 1], "InstabilityInd");
        assert_eq!(names[pi + 2], "Aromaticity");
    }

    #[test]
    fn test_instability_index() {
        let extractor = FeatureExtractor::new();
        // KK 1.0, KP -6.54, PE 18.38 over 4 residues
        let kkpe = feature(&extractor.extract("KKPE"), "InstabilityInd");
        assert!((kkpe - 32.1).abs() < 1e-9);
        assert!((feature(&extractor.extract("AAAA"), "InstabilityInd") - 7.5).abs() < 1e-9);

        let magainin = feature(&extractor.extract("GIGKFLHSAKKFGKAFVGEIMNS"), "InstabilityInd");
        assert!((magainin - -0.1043).abs() < 1e-3);
    }

    #[test]
    fn test_instability_skips_non_standard_residues() {
        let extractor = FeatureExtractor::new();
        // only the KK pair is scored
        let value = feature(&extractor.extract("KKXP"), "InstabilityInd");
        assert!((value - 2.5).abs() < 1e-9);
        assert_eq!(feature(&extractor.extract("K"), "InstabilityInd"), 0.0);
    }

    #[test]
    fn test_cationic_peptide_is_positive() {
        let extractor = FeatureExtractor::new();
        let values = extractor.extract("KWKLFKKIGAVLKVL");
        assert_eq!(feature(&values, "Length"), 15.0);
        assert!(feature(&values, "Charge") > 4.0);
        assert!(feature(&values, "pI") > 10.0);
    }

    #[test]
    fn test_acidic_peptide_has_low_pi() {
        let extractor = FeatureExtractor::new();
        let values = extractor.extract("DDEEDDEE");
        assert!(feature(&values, "Charge") < 0.0);
        assert!(feature(&values, "pI") < 5.0);
    }

    #[test]
    fn test_molecular_weight_of_glycine_dipeptide() {
        let free_acid = FeatureExtractor::from_config(&FeaturesConfig {
            amide: false,
            ph: 7.0,
        });
        let mw = feature(&free_acid.extract("GG"), "MW");
        assert!((mw - 132.118).abs() < 0.01);

        let amidated = feature(&FeatureExtractor::new().extract("GG"), "MW");
        assert!((mw - amidated - 0.984).abs() < 1e-6);
    }

    #[test]
    fn test_composition_ratios() {
        let values = FeatureExtractor::new().extract("AAWW");
        assert_eq!(feature(&values, "Aromaticity"), 0.5);
        assert_eq!(feature(&values, "HydrophRatio"), 1.0);
        assert_eq!(feature(&values, "AliphaticInd"), 50.0);
    }

    #[test]
    fn test_empty_sequence_is_zero_filled_in_matrix() {
        let matrix = FeatureExtractor::new()
            .build_matrix(vec![SequenceRecord::new("empty", "")])
            .unwrap();
        assert_eq!(matrix.value(0, "Aromaticity"), Some(0.0));
        assert_eq!(matrix.value(0, "BomanInd"), Some(0.0));
        assert_eq!(matrix.value(0, "Length"), Some(0.0));
    }
}
