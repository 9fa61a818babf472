//! Password suggestions for account creation.
//!
//! Every draw goes through a [`CryptoRng`]; [`generate`] uses the thread-local
//! generator, [`generate_with`] lets callers supply a seeded one.

use rand::{CryptoRng, Rng, seq::SliceRandom};

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{};:,.?/";
const CONSONANTS: &[u8] = b"bcdfghjklmnprstvwz";
const VOWELS: &[u8] = b"aeiou";

/// Shortest password either style produces.
pub const MIN_LENGTH: usize = 4;
/// Length of [`PasswordStyle::strong`].
pub const STRONG_DEFAULT_LENGTH: usize = 20;
/// Length of [`PasswordStyle::memorable`].
pub const MEMORABLE_DEFAULT_LENGTH: usize = 16;

/// Shape of the generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStyle {
    /// Random characters drawn from every included class.
    Strong {
        /// Characters to produce, floored at [`MIN_LENGTH`].
        length: usize,
        /// Draw from the symbol class too.
        use_symbols: bool,
    },
    /// Pronounceable consonant/vowel runs with the odd digit.
    Memorable {
        /// Characters to produce, floored at [`MIN_LENGTH`].
        length: usize,
        /// Sprinkle digits between letters.
        include_digits: bool,
    },
}

impl PasswordStyle {
    /// 20 characters, symbols included.
    pub fn strong() -> Self {
        PasswordStyle::Strong {
            length: STRONG_DEFAULT_LENGTH,
            use_symbols: true,
        }
    }

    /// 16 characters, digits included.
    pub fn memorable() -> Self {
        PasswordStyle::Memorable {
            length: MEMORABLE_DEFAULT_LENGTH,
            include_digits: true,
        }
    }
}

impl Default for PasswordStyle {
    fn default() -> Self {
        Self::strong()
    }
}

/// Generate a password with the thread-local secure generator.
pub fn generate(style: PasswordStyle) -> String {
    generate_with(style, &mut rand::rng())
}

/// Generate a password drawing from `rng`.
pub fn generate_with<R: Rng + CryptoRng>(style: PasswordStyle, rng: &mut R) -> String {
    match style {
        PasswordStyle::Strong {
            length,
            use_symbols,
        } => strong(length.max(MIN_LENGTH), use_symbols, rng),
        PasswordStyle::Memorable {
            length,
            include_digits,
        } => memorable(length.max(MIN_LENGTH), include_digits, rng),
    }
}

fn pick<R: Rng>(rng: &mut R, pool: &[u8]) -> u8 {
    pool[rng.random_range(0..pool.len())]
}

fn strong<R: Rng>(length: usize, use_symbols: bool, rng: &mut R) -> String {
    let mut classes = vec![UPPERCASE, LOWERCASE, DIGITS];
    if use_symbols {
        classes.push(SYMBOLS);
    }
    let pool: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes.iter().map(|class| pick(rng, class)).collect();
    while chars.len() < length {
        chars.push(pick(rng, &pool));
    }
    chars.shuffle(rng);

    chars.into_iter().map(char::from).collect()
}

fn memorable<R: Rng>(length: usize, include_digits: bool, rng: &mut R) -> String {
    let mut out = String::with_capacity(length + 2);
    let mut consonant_turn = rng.random_bool(0.5);

    while out.len() < length {
        let pool = if consonant_turn { CONSONANTS } else { VOWELS };
        let syllable_len = rng.random_range(1..=2);
        for _ in 0..syllable_len {
            out.push(char::from(pick(rng, pool)));
            if include_digits && out.len() < length && rng.random_ratio(1, 8) {
                out.push(char::from(pick(rng, DIGITS)));
            }
        }
        consonant_turn = !consonant_turn;
    }

    out.truncate(length);
    out
}
