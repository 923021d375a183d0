use crate::{Path, Segment};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng().sample_iter(Alphanumeric).take(n).map(char::from).collect()
}

/// Creates an absolute path with `depth` random segments, some carrying an SNS index.
pub fn gen_random_path(depth: usize) -> Path {
    let mut rng = thread_rng();
    let segments = (0..depth)
        .map(|_| {
            let name = gen_rand_string(rng.gen_range(1..8));
            Segment::with_index(&name, rng.gen_range(1..4))
        })
        .collect();
    Path::absolute(segments)
}

/// Checks that both slices hold the same items, ignoring order.
pub fn compare_unordered<T: PartialEq + Clone>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining = b.to_vec();
    for x in a {
        match remaining.iter().position(|y| y == x) {
            None => return false,
            Some(idx) => {
                remaining.swap_remove(idx);
            }
        }
    }
    remaining.is_empty()
}
