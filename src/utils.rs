// src/utils.rs
use ethers::types::U256;

/// Formats a base-unit amount with `decimals` fractional digits, trimming
/// trailing zeros (`formatUnits` without the trailing `.0`).
pub fn u256_to_human(value: U256, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    // at least one integer digit, so `0.025` rather than `.025`
    let digits = format!("{:0>width$}", value.to_string(), width = decimals + 1);
    let (integer, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{fraction}")
    }
}

/// Wei to ether.
pub fn format_ether(wei: U256) -> String {
    u256_to_human(wei, 18)
}
