//! Atomic shell labels in the `K1`, `L3`, `M5` notation used by the rate tables.
//!
//! A shell token is a shell letter followed by a 1-based subshell index. The
//! letter fixes the principal quantum number, the index fixes `l` and `2j`
//! (`1 -> s1/2`, `2 -> p1/2`, `3 -> p3/2`, `4 -> d3/2`, ...).

const SHELL_LETTERS: [char; 7] = ['K', 'L', 'M', 'N', 'O', 'P', 'Q'];
const ORBITAL_LETTERS: [char; 7] = ['s', 'p', 'd', 'f', 'g', 'h', 'i'];
const MAX_SUBSHELL_INDEX: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShellInfo {
    pub principal: u32,
    pub subshell: u32,
    pub orbital_l: u32,
    pub two_j: u32,
}

impl ShellInfo {
    /// Position in the energy-ordered shell list (`K1 < L1 < L2 < ... < M1`).
    pub fn order_index(&self) -> u32 {
        self.principal * 10 + self.subshell
    }

    pub fn orbital_letter(&self) -> char {
        ORBITAL_LETTERS[self.orbital_l as usize]
    }
}

/// Parse one shell token such as `K1` or `M5`.
pub fn shell_info(label: &str) -> Option<ShellInfo> {
    let label = label.trim();
    let mut chars = label.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let principal = SHELL_LETTERS.iter().position(|candidate| *candidate == letter)? as u32 + 1;
    let subshell: u32 = chars.as_str().parse().ok()?;
    let max_subshell = (2 * principal - 1).min(MAX_SUBSHELL_INDEX);
    if subshell == 0 || subshell > max_subshell {
        return None;
    }

    let orbital_l = subshell / 2;
    let two_j = if subshell == 1 {
        1
    } else if subshell % 2 == 0 {
        2 * orbital_l - 1
    } else {
        2 * orbital_l + 1
    };

    Some(ShellInfo {
        principal,
        subshell,
        orbital_l,
        two_j,
    })
}

pub fn is_shell(label: &str) -> bool {
    shell_info(label).is_some()
}

/// Split a hole configuration such as `K1L3` into its shell tokens. Returns
/// `None` when any token is not a valid shell.
pub fn split_shell_tokens(label: &str) -> Option<Vec<&str>> {
    let bytes = label.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    for index in 1..=bytes.len() {
        let at_boundary = index == bytes.len() || bytes[index].is_ascii_alphabetic();
        if at_boundary {
            let token = &label[start..index];
            shell_info(token)?;
            tokens.push(token);
            start = index;
        }
    }

    Some(tokens)
}

/// Convert spectroscopic notation (`2p3/2`, `1s`, `3d5/2`) into a shell token
/// (`L3`, `K1`, `M5`). Shell tokens pass through unchanged.
pub fn shell_label_from_orbital(orbital: &str) -> Option<String> {
    let orbital = orbital.trim();
    if is_shell(orbital) {
        return Some(orbital.to_ascii_uppercase());
    }

    let split = orbital.find(|c: char| c.is_ascii_alphabetic())?;
    let principal: u32 = orbital[..split].parse().ok()?;
    let mut rest = orbital[split..].chars();
    let letter = rest.next()?.to_ascii_lowercase();
    let orbital_l = ORBITAL_LETTERS.iter().position(|c| *c == letter)? as u32;
    let j_part = rest.as_str();

    let subshell = if orbital_l == 0 {
        if !(j_part.is_empty() || j_part == "1/2" || j_part == "1") {
            return None;
        }
        1
    } else {
        let two_j: u32 = match j_part {
            "" => 2 * orbital_l + 1,
            value => value
                .strip_suffix("/2")
                .unwrap_or(value)
                .parse()
                .ok()?,
        };
        if two_j == 2 * orbital_l - 1 {
            2 * orbital_l
        } else if two_j == 2 * orbital_l + 1 {
            2 * orbital_l + 1
        } else {
            return None;
        }
    };

    let letter = *SHELL_LETTERS.get(principal.checked_sub(1)? as usize)?;
    let label = format!("{}{}", letter, subshell);
    is_shell(&label).then_some(label)
}

/// Parse an excited orbital such as `5d` into `(n, l)`.
pub fn parse_excited_orbital(orbital: &str) -> Option<(u32, u32)> {
    let orbital = orbital.trim();
    let split = orbital.find(|c: char| c.is_ascii_alphabetic())?;
    let principal: u32 = orbital[..split].parse().ok()?;
    let letter_part = &orbital[split..];
    let mut letters = letter_part.chars();
    let letter = letters.next()?.to_ascii_lowercase();
    if letters.next().is_some() {
        return None;
    }
    let orbital_l = ORBITAL_LETTERS.iter().position(|c| *c == letter)? as u32;
    (principal > orbital_l).then_some((principal, orbital_l))
}
