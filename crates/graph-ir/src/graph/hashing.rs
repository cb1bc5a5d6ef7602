//! Stable palette selection.
//!
//! The choice must not change between runs or platforms, so it hashes with
//! FNV-1a rather than the randomly seeded std hasher.

/// Picks one entry of `palette` for `key`. Returns `None` for an empty palette.
pub fn pick<'a, T>(palette: &'a [T], key: &str) -> Option<&'a T> {
    fn fnv1a(bytes: &[u8]) -> u64 {
        bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
        })
    }

    if palette.is_empty() {
        return None;
    }
    let idx = fnv1a(key.as_bytes()) % palette.len() as u64;
    palette.get(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_fnv1a_reference_vector() {
        let palette: Vec<u64> = (0..1000).collect();
        assert_eq!(pick(&palette, "a"), Some(&(0xaf63dc4c8601ec8c % 1000)));
        assert_eq!(pick(&palette, ""), Some(&(0xcbf29ce484222325 % 1000)));
    }

    #[test]
    fn pick_is_stable() {
        let palette = ["a", "b", "c"];
        assert_eq!(pick(&palette, "Relu"), pick(&palette, "Relu"));
        assert_eq!(pick::<&str>(&[], "Relu"), None);
    }
}
