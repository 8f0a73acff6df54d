//! Field rules for NF-e emitters.

pub mod regime;
pub mod tax_id;

pub use regime::{regime_label, Regime, UNRECOGNIZED_LABEL};
pub use tax_id::{format_tax_id, validate_cnpj, validate_cpf, validate_tax_id};
