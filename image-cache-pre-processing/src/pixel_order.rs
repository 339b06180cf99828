/// Pixel-order sprite decoding.
///
/// A descriptor is a `+` separated token stream covering every pixel of the source
/// image in row-major order. `@n` skips `n` pixels without any visible layer; a run of
/// letters lists the layers visible at one pixel, front to back.
use crate::error::{ConvertError, ConvertResult};
use crate::order::{LayerIndex, OrderArray, StackShape};
use clap::ValueEnum;
use constants::layer::{SKIP_TOKEN_PREFIX, TOKEN_SEPARATOR};
use serde::{Deserialize, Serialize};

/// Row order of the producer's token stream relative to the order array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RowOrder {
    /// Source row 0 is the top row, the order array starts at the bottom row.
    #[default]
    FlipY,
    /// Source and destination rows already match.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Skip(usize),
    Pixel(&'a [u8]),
}

/// Decodes pixel-order descriptors into [`OrderArray`]s of a fixed shape.
#[derive(Debug, Clone, Copy)]
pub struct PixelOrderDecoder {
    shape: StackShape,
    row_order: RowOrder,
}

impl PixelOrderDecoder {
    pub fn new(shape: StackShape, row_order: RowOrder) -> Self {
        Self { shape, row_order }
    }

    /// Decodes a full descriptor. The token stream is validated completely before any
    /// slot is written, so a corrupt frame never yields a partial order array.
    pub fn decode(&self, descriptor: &str) -> ConvertResult<OrderArray> {
        let tokens = self.tokenize(descriptor)?;
        let mut order = OrderArray::empty(self.shape);

        let mut idx = 0;
        for token in tokens {
            match token {
                Token::Skip(count) => idx += count,
                Token::Pixel(codes) => {
                    let pixel = self.destination(idx);
                    for (slot, &code) in codes.iter().enumerate() {
                        // Codes were checked against the layer count while tokenizing.
                        let layer = LayerIndex::new((code - b'A') as usize)?;
                        order.set(slot, pixel, layer);
                    }
                    idx += 1;
                }
            }
        }

        Ok(order)
    }

    /// Destination pixel of the `idx`-th source pixel.
    pub fn destination(&self, idx: usize) -> usize {
        match self.row_order {
            RowOrder::Source => idx,
            RowOrder::FlipY => {
                let width = self.shape.width;
                let row = idx / width;
                let col = idx % width;
                width * (self.shape.height - row - 1) + col
            }
        }
    }

    fn tokenize<'a>(&self, descriptor: &'a str) -> ConvertResult<Vec<Token<'a>>> {
        let expected = self.shape.image_size();
        let descriptor = descriptor.trim();

        if descriptor.is_empty() {
            return if expected == 0 {
                Ok(Vec::new())
            } else {
                Err(ConvertError::MalformedDescriptor(format!(
                    "empty descriptor for {} pixels",
                    expected
                )))
            };
        }

        let mut tokens = Vec::new();
        let mut covered = 0usize;

        for (position, piece) in descriptor.split(TOKEN_SEPARATOR).enumerate() {
            let token = self.parse_token(position, piece)?;
            covered = match token {
                Token::Skip(count) => covered.checked_add(count),
                Token::Pixel(_) => covered.checked_add(1),
            }
            .ok_or_else(|| {
                ConvertError::MalformedDescriptor("pixel count overflows".to_string())
            })?;

            if covered > expected {
                return Err(ConvertError::MalformedDescriptor(format!(
                    "token {} reaches pixel {} of {}",
                    position, covered, expected
                )));
            }
            tokens.push(token);
        }

        if covered != expected {
            return Err(ConvertError::MalformedDescriptor(format!(
                "descriptor covers {} pixels, expected {}",
                covered, expected
            )));
        }

        Ok(tokens)
    }

    fn parse_token<'a>(&self, position: usize, piece: &'a str) -> ConvertResult<Token<'a>> {
        if let Some(count) = piece.strip_prefix(SKIP_TOKEN_PREFIX) {
            let count = count.parse::<usize>().map_err(|_| {
                ConvertError::MalformedDescriptor(format!(
                    "token {}: invalid skip count '{}'",
                    position, count
                ))
            })?;
            return Ok(Token::Skip(count));
        }

        if piece.is_empty() {
            return Err(ConvertError::MalformedDescriptor(format!(
                "token {} is empty",
                position
            )));
        }

        if piece.len() > self.shape.layers {
            return Err(ConvertError::MalformedDescriptor(format!(
                "token {} lists {} layers, frame has {}",
                position,
                piece.len(),
                self.shape.layers
            )));
        }

        for code in piece.chars() {
            match LayerIndex::from_code(code) {
                Some(layer) if layer.get() < self.shape.layers => {}
                _ => {
                    return Err(ConvertError::MalformedDescriptor(format!(
                        "token {}: unknown layer code '{}'",
                        position, code
                    )));
                }
            }
        }

        Ok(Token::Pixel(piece.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constants::layer::NO_LAYER;

    fn decoder(width: usize, height: usize, layers: usize) -> PixelOrderDecoder {
        PixelOrderDecoder::new(
            StackShape::new(width, height, layers).unwrap(),
            RowOrder::FlipY,
        )
    }

    #[test]
    fn test_first_source_pixel_lands_on_bottom_row() {
        let order = decoder(2, 2, 1).decode("A+@3").unwrap();

        // Display pixel (0, height - 1) is index 2 in a 2x2 image.
        assert_eq!(order.as_bytes(), &[NO_LAYER, NO_LAYER, 0, NO_LAYER]);
    }

    #[test]
    fn test_source_row_order_keeps_positions() {
        let decoder = PixelOrderDecoder::new(StackShape::new(2, 2, 1).unwrap(), RowOrder::Source);
        let order = decoder.decode("A+@3").unwrap();
        assert_eq!(order.as_bytes(), &[0, NO_LAYER, NO_LAYER, NO_LAYER]);
    }

    #[test]
    fn test_multiple_layers_fill_depth_slots() {
        // 2x1 image, two layers: pixel 0 shows B in front of A, pixel 1 shows A only.
        let order = decoder(2, 1, 2).decode("BA+A").unwrap();
        assert_eq!(order.as_bytes(), &[1, 0, 0, NO_LAYER]);
        assert_eq!(order.visible_layers(0).count(), 2);
        assert_eq!(order.visible_layers(1).count(), 1);
    }

    #[test]
    fn test_skip_runs() {
        let order = decoder(3, 2, 2).decode("@2+AB+@2+B").unwrap();
        // Source idx 2 -> row 0, col 2 -> dest 5; source idx 5 -> row 1, col 2 -> dest 2.
        assert_eq!(order.get(0, 5).map(LayerIndex::get), Some(0));
        assert_eq!(order.get(1, 5).map(LayerIndex::get), Some(1));
        assert_eq!(order.get(0, 2).map(LayerIndex::get), Some(1));
        assert_eq!(order.get(1, 2), None);
        let filled = order.as_bytes().iter().filter(|&&b| b != NO_LAYER).count();
        assert_eq!(filled, 3);
    }

    #[test]
    fn test_coverage_mismatch_rejected() {
        let d = decoder(2, 2, 2);
        assert!(matches!(
            d.decode("A+B+A"),
            Err(ConvertError::MalformedDescriptor(_))
        ));
        assert!(matches!(
            d.decode("@3+A+B"),
            Err(ConvertError::MalformedDescriptor(_))
        ));
        assert!(d.decode("@4").is_ok());
        assert!(d.decode("").is_err());
    }

    #[test]
    fn test_unknown_or_excess_layers_rejected() {
        let d = decoder(1, 1, 2);
        assert!(d.decode("C").is_err());
        assert!(d.decode("a").is_err());
        assert!(d.decode("ABA").is_err());
        assert!(d.decode("@x").is_err());
        assert!(d.decode("A++").is_err());
    }

    #[test]
    fn test_every_pixel_visited_once() {
        let d = decoder(4, 3, 1);
        let order = d.decode(&vec!["A"; 12].join("+")).unwrap();
        assert!(order.as_bytes().iter().all(|&b| b == 0));

        let mut seen = vec![false; 12];
        for idx in 0..12 {
            let dest = d.destination(idx);
            assert!(!seen[dest]);
            seen[dest] = true;
        }
    }
}
