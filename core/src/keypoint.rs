use nalgebra::Point2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub angle: f64,
    pub response: f64,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            angle: -1.0,
            response: 0.0,
        }
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    pub fn pt(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// A candidate correspondence between keypoint `query_idx` of the first
/// image and keypoint `train_idx` of the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl FeatureMatch {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matches {
    pub matches: Vec<FeatureMatch>,
}

impl Matches {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureMatch> {
        self.matches.iter()
    }
}

impl From<Vec<FeatureMatch>> for Matches {
    fn from(matches: Vec<FeatureMatch>) -> Self {
        Self { matches }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyPoints {
    pub keypoints: Vec<KeyPoint>,
}

impl KeyPoints {
    pub fn new() -> Self {
        Self {
            keypoints: Vec::new(),
        }
    }

    pub fn push(&mut self, kp: KeyPoint) {
        self.keypoints.push(kp);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyPoint> {
        self.keypoints.iter()
    }
}
