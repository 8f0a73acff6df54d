//! CNPJ/CPF (Brazilian tax ID) formatting and check-digit validation.

/// Digit count of an organizational tax ID (CNPJ).
pub const CNPJ_LEN: usize = 14;

/// Digit count of an individual tax ID (CPF).
pub const CPF_LEN: usize = 11;

const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Keep only the ASCII digits of a tax ID.
pub fn digits_of(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a tax ID into its punctuated display form.
///
/// 14 digits become `XX.XXX.XXX/XXXX-XX`, 11 digits become `XXX.XXX.XXX-XX`.
/// Any other digit count returns the input unchanged.
pub fn format_tax_id(raw: &str) -> String {
    let digits = digits_of(raw);

    match digits.len() {
        CNPJ_LEN => format!(
            "{}.{}.{}/{}-{}",
            &digits[0..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..12],
            &digits[12..14]
        ),
        CPF_LEN => format!(
            "{}.{}.{}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..11]
        ),
        _ => raw.to_string(),
    }
}

/// Validate a CNPJ using the mod-11 check digits.
///
/// Weights: 5,4,3,2,9,8,7,6,5,4,3,2 for the first digit and
/// 6,5,4,3,2,9,8,7,6,5,4,3,2 for the second.
pub fn validate_cnpj(raw: &str) -> bool {
    let digits = to_numbers(raw);

    if digits.len() != CNPJ_LEN || all_same(&digits) {
        return false;
    }

    let first = cnpj_check_digit(&digits[..12], &CNPJ_WEIGHTS[1..]);
    let second = cnpj_check_digit(&digits[..13], &CNPJ_WEIGHTS);

    digits[12] == first && digits[13] == second
}

/// Validate a CPF using the mod-11 check digits.
pub fn validate_cpf(raw: &str) -> bool {
    let digits = to_numbers(raw);

    if digits.len() != CPF_LEN || all_same(&digits) {
        return false;
    }

    digits[9] == cpf_check_digit(&digits[..9]) && digits[10] == cpf_check_digit(&digits[..10])
}

/// Validate a tax ID of either kind, chosen by digit count.
pub fn validate_tax_id(raw: &str) -> bool {
    match digits_of(raw).len() {
        CNPJ_LEN => validate_cnpj(raw),
        CPF_LEN => validate_cpf(raw),
        _ => false,
    }
}

fn to_numbers(raw: &str) -> Vec<u32> {
    raw.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn cnpj_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        rest => 11 - rest,
    }
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let len = digits.len() as u32;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (len + 1 - i as u32))
        .sum();
    (sum * 10) % 11 % 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cnpj() {
        assert_eq!(format_tax_id("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_tax_id("11.222.333/0001-81"), "11.222.333/0001-81");
        assert_eq!(format_tax_id(" 11 222 333 0001 81 "), "11.222.333/0001-81");
    }

    #[test]
    fn test_format_cpf() {
        assert_eq!(format_tax_id("52998224725"), "529.982.247-25");
        assert_eq!(format_tax_id("529.982.247-25"), "529.982.247-25");
    }

    #[test]
    fn test_format_other_lengths_pass_through() {
        assert_eq!(format_tax_id("12345"), "12345");
        assert_eq!(format_tax_id("ABC-12"), "ABC-12");
        assert_eq!(format_tax_id(""), "");
        assert_eq!(format_tax_id("112223330001810"), "112223330001810");
    }

    #[test]
    fn test_format_is_deterministic() {
        let once = format_tax_id("11222333000181");
        assert_eq!(format_tax_id(&once), once);
    }

    #[test]
    fn test_validate_cnpj() {
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(!validate_cnpj("11222333000182"));
        assert!(!validate_cnpj("00000000000000"));
        assert!(!validate_cnpj("1122233300018"));
    }

    #[test]
    fn test_validate_cpf() {
        assert!(validate_cpf("52998224725"));
        assert!(validate_cpf("529.982.247-25"));
        assert!(!validate_cpf("52998224726"));
        assert!(!validate_cpf("11111111111"));
    }

    #[test]
    fn test_validate_tax_id_dispatch() {
        assert!(validate_tax_id("11222333000181"));
        assert!(validate_tax_id("52998224725"));
        assert!(!validate_tax_id("12345"));
    }
}
