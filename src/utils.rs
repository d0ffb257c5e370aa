use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::statistics::Statistics;

/// Log through `info!`, dropping ANSI colour codes unless `$colorful` is set.
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        log::info!("{}", $crate::utils::strip_ansi_if_needed(&message, $colorful));
    }};
}

//-----------------------------------------------------------------------------
// Deterministic random streams
//-----------------------------------------------------------------------------

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the seed of sub-stream `index` from a global seed.
///
/// The result only depends on both arguments, never on the order in which
/// sub-streams are requested, so restarts can be scheduled on any number of
/// threads and still draw the same numbers.
pub fn derive_seed(global: u64, index: u64) -> u64 {
    splitmix64(global ^ splitmix64(index))
}

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform integer in `0..bound`, drawn as a u64 so the stream does not depend on the platform's usize width.
pub fn uniform_index(rng: &mut ChaCha8Rng, bound: usize) -> usize {
    debug_assert!(bound > 0);
    rng.gen_range(0..bound as u64) as usize
}

//-----------------------------------------------------------------------------
// Statistics and display helpers
//-----------------------------------------------------------------------------

/// Mean and sample standard deviation; the deviation is 0 with fewer than two values.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    match values.len() {
        0 => (0.0, 0.0),
        1 => (values[0], 0.0),
        _ => (values.iter().mean(), values.iter().std_dev()),
    }
}

pub fn strip_ansi_if_needed(text: &str, colorful: bool) -> String {
    if colorful {
        return text.to_string();
    }

    let mut stripped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // CSI sequences end on a byte in '@'..='~'
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        } else {
            stripped.push(c);
        }
    }
    stripped
}
