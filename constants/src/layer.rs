/// Layer code alphabet used by pixel-order sprites and composite pipelines.
pub const LAYER_CODES: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Maximum layers a single frame can carry
pub const MAX_LAYERS: usize = LAYER_CODES.len();

/// Order slot value meaning "no layer at this depth"
pub const NO_LAYER: u8 = 255;

/// Prefix of a pixel-order token that skips pixels without any visible layer
pub const SKIP_TOKEN_PREFIX: char = '@';

/// Separator between pixel-order tokens
pub const TOKEN_SEPARATOR: char = '+';

/// Letter code for a layer index, if it fits the alphabet.
pub fn layer_code(index: usize) -> Option<char> {
    LAYER_CODES.get(index).map(|&code| code as char)
}

/// Layer index for a letter code.
pub fn layer_index(code: char) -> Option<usize> {
    if code.is_ascii_uppercase() {
        Some((code as u8 - b'A') as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_indices_agree() {
        for index in 0..MAX_LAYERS {
            let code = layer_code(index).unwrap();
            assert_eq!(layer_index(code), Some(index));
        }
        assert_eq!(layer_code(MAX_LAYERS), None);
        assert_eq!(layer_index('a'), None);
        assert_eq!(layer_index('@'), None);
    }
}
