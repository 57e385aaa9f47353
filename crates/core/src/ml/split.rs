use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two partitions, each in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded split that keeps the class ratio in both partitions.
///
/// Each class sends `round(len * test_fraction)` rows to the test side, at
/// least one when it has two or more rows and never all of them, so every
/// class present in the labels is represented in training.
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> =
            labels.iter().enumerate().filter(|(_, label)| **label == class).map(|(i, _)| i).collect();
        members.shuffle(&mut rng);

        let held_out = if members.len() < 2 {
            0
        } else {
            let wanted = (members.len() as f64 * test_fraction).round() as usize;
            wanted.clamp(1, members.len() - 1)
        };

        test.extend_from_slice(&members[..held_out]);
        train.extend_from_slice(&members[held_out..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit { train, test }
}
