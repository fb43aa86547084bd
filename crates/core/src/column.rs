//! Spreadsheet column addressing (bijective base-26: A..Z, AA, AB, ...).

/// Convert 0-based column index to letter(s): 0 -> A, 25 -> Z, 26 -> AA, etc.
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col + 1; // 1-indexed for calculation
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Convert column letter(s) back to a 0-based index. Case-insensitive.
/// Returns `None` for empty input, non-letters, or overflow.
pub fn letter_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n - 1)
}

/// A1 reference for a 0-based (row, col): (1, 1) -> "B2".
pub fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}

/// Parse an A1 reference ("B2", no sheet prefix, no `$`) into 0-based (row, col).
pub fn parse_cell_ref(cell: &str) -> Option<(usize, usize)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let col = letter_to_col(letters)?;
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}
