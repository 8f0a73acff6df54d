//! CRT (Código de Regime Tributário) mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for any code outside the known table.
pub const UNRECOGNIZED_LABEL: &str = "Não identificado";

/// Tax regime of an NF-e emitter, decoded from its CRT code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// CRT 1.
    SimplesNacional,
    /// CRT 2.
    SimplesNacionalExcessoSublimite,
    /// CRT 3.
    RegimeNormal,
    /// CRT 4.
    Mei,
    /// Missing or unknown code.
    Unrecognized,
}

impl Regime {
    /// Decode a CRT value. Never fails: unknown values map to [`Regime::Unrecognized`].
    ///
    /// The code is matched verbatim, so `" 1"` is not CRT 1.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("1") => Regime::SimplesNacional,
            Some("2") => Regime::SimplesNacionalExcessoSublimite,
            Some("3") => Regime::RegimeNormal,
            Some("4") => Regime::Mei,
            _ => Regime::Unrecognized,
        }
    }

    /// Human-readable regime name as shown in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Regime::SimplesNacional => "Simples Nacional",
            Regime::SimplesNacionalExcessoSublimite => {
                "Simples Nacional, excesso sublimite de receita bruta"
            }
            Regime::RegimeNormal => "Regime Normal",
            Regime::Mei => "Microempreendedor Individual",
            Regime::Unrecognized => UNRECOGNIZED_LABEL,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a CRT code straight to its label.
pub fn regime_label(code: Option<&str>) -> &'static str {
    Regime::from_code(code).label()
}
