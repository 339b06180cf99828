/// Layer indices, stack shapes and the layer-major order array.
use crate::error::{ConvertError, ConvertResult};
use constants::layer::{MAX_LAYERS, NO_LAYER, layer_code, layer_index};

/// Index of a layer within a frame, bounded by the layer code alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerIndex(u8);

impl LayerIndex {
    pub fn new(index: usize) -> ConvertResult<Self> {
        if index < MAX_LAYERS {
            Ok(Self(index as u8))
        } else {
            Err(ConvertError::LayerOverflow(index + 1))
        }
    }

    /// Resolves a letter code (`A`..`Z`).
    pub fn from_code(code: char) -> Option<Self> {
        layer_index(code).map(|index| Self(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Letter code of this layer.
    pub fn code(self) -> char {
        layer_code(self.get()).unwrap_or('?')
    }

    /// Raw byte stored in an order slot.
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

/// Dimensions of one camera pose's layer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackShape {
    pub width: usize,
    pub height: usize,
    pub layers: usize,
}

impl StackShape {
    /// Creates a shape, failing fast when the layer count exceeds the alphabet or
    /// a float stack of this size would not be addressable.
    pub fn new(width: usize, height: usize, layers: usize) -> ConvertResult<Self> {
        if layers > MAX_LAYERS {
            return Err(ConvertError::LayerOverflow(layers));
        }

        let addressable = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(layers))
            .and_then(|slots| slots.checked_mul(size_of::<f32>()));
        if addressable.is_none() {
            return Err(ConvertError::InvalidDataset(format!(
                "{}x{} with {} layers is too large",
                width, height, layers
            )));
        }

        Ok(Self {
            width,
            height,
            layers,
        })
    }

    pub fn image_size(&self) -> usize {
        self.width * self.height
    }

    pub fn stack_size(&self) -> usize {
        self.image_size() * self.layers
    }
}

/// Per-pixel, per-depth-slot layer indices laid out layer-major:
/// slot `k` of pixel `p` lives at `k * image_size + p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArray {
    shape: StackShape,
    slots: Vec<u8>,
}

impl OrderArray {
    /// Order array with every slot set to [`NO_LAYER`].
    pub fn empty(shape: StackShape) -> Self {
        Self {
            shape,
            slots: vec![NO_LAYER; shape.stack_size()],
        }
    }

    /// Wraps raw slot bytes, validating the size and every stored index.
    pub fn from_raw(shape: StackShape, slots: Vec<u8>) -> ConvertResult<Self> {
        if slots.len() != shape.stack_size() {
            return Err(ConvertError::BufferSize {
                name: "order".to_string(),
                expected: shape.stack_size(),
                actual: slots.len(),
            });
        }

        if let Some(&bad) = slots
            .iter()
            .find(|&&slot| slot != NO_LAYER && slot as usize >= shape.layers)
        {
            return Err(ConvertError::InvalidDataset(format!(
                "order slot references layer {} of {}",
                bad, shape.layers
            )));
        }

        Ok(Self { shape, slots })
    }

    pub fn shape(&self) -> StackShape {
        self.shape
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.slots
    }

    /// Layer at a flat stack index, `None` for an empty slot.
    pub fn layer_at(&self, stack_index: usize) -> Option<LayerIndex> {
        match self.slots[stack_index] {
            NO_LAYER => None,
            index => Some(LayerIndex(index)),
        }
    }

    /// Layer visible at depth `slot` of `pixel`.
    pub fn get(&self, slot: usize, pixel: usize) -> Option<LayerIndex> {
        self.layer_at(slot * self.shape.image_size() + pixel)
    }

    pub(crate) fn set(&mut self, slot: usize, pixel: usize, layer: LayerIndex) {
        let image_size = self.shape.image_size();
        self.slots[slot * image_size + pixel] = layer.as_byte();
    }

    /// Visible layers of a pixel, front to back.
    pub fn visible_layers(&self, pixel: usize) -> impl Iterator<Item = LayerIndex> + '_ {
        (0..self.shape.layers).map_while(move |slot| self.get(slot, pixel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_index_bounds() {
        assert_eq!(LayerIndex::new(25).unwrap().code(), 'Z');
        assert!(matches!(
            LayerIndex::new(26),
            Err(ConvertError::LayerOverflow(27))
        ));
        assert_eq!(LayerIndex::from_code('C').unwrap().get(), 2);
    }

    #[test]
    fn test_shape_rejects_too_many_layers() {
        assert!(StackShape::new(4, 4, 26).is_ok());
        assert!(matches!(
            StackShape::new(4, 4, 27),
            Err(ConvertError::LayerOverflow(27))
        ));
    }

    #[test]
    fn test_shape_rejects_overflowing_dimensions() {
        assert!(matches!(
            StackShape::new(1usize << 32, 1usize << 32, 1),
            Err(ConvertError::InvalidDataset(_))
        ));
        assert!(StackShape::new(usize::MAX, 1, 2).is_err());
        assert_eq!(StackShape::new(4096, 4096, 26).unwrap().stack_size(), 4096 * 4096 * 26);
    }

    #[test]
    fn test_order_array_layout() {
        let shape = StackShape::new(2, 1, 2).unwrap();
        let mut order = OrderArray::empty(shape);
        order.set(0, 1, LayerIndex::new(1).unwrap());
        order.set(1, 1, LayerIndex::new(0).unwrap());

        assert_eq!(order.as_bytes(), &[255, 1, 255, 0]);
        let visible: Vec<usize> = order.visible_layers(1).map(LayerIndex::get).collect();
        assert_eq!(visible, vec![1, 0]);
        assert_eq!(order.visible_layers(0).count(), 0);
    }

    #[test]
    fn test_from_raw_validation() {
        let shape = StackShape::new(1, 1, 2).unwrap();
        assert!(OrderArray::from_raw(shape, vec![1, 255]).is_ok());
        assert!(OrderArray::from_raw(shape, vec![1]).is_err());
        assert!(OrderArray::from_raw(shape, vec![2, 255]).is_err());
    }
}
