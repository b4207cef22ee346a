use crate::KeyPoint;

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub data: Vec<u8>,
    pub keypoint: KeyPoint,
}

impl Descriptor {
    pub fn new(data: Vec<u8>, keypoint: KeyPoint) -> Self {
        Self { data, keypoint }
    }

    pub fn hamming_distance(&self, other: &Descriptor) -> u32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Euclidean distance treating every byte as one vector component.
    pub fn l2_distance(&self, other: &Descriptor) -> f32 {
        let sq: u64 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| {
                let d = a as i64 - b as i64;
                (d * d) as u64
            })
            .sum();
        (sq as f64).sqrt() as f32
    }
}

#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn keypoint(&self, idx: usize) -> Option<&KeyPoint> {
        self.descriptors.get(idx).map(|d| &d.keypoint)
    }
}
