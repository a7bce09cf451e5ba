//! Path exploration strategies.

use rand::rngs::StdRng;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// How the path group selects the next active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// First in, first out over insertion order. Fair: every reachable
    /// state at bounded depth is eventually selected.
    #[default]
    Bfs,
    /// Last in, first out: children before siblings.
    Dfs,
    /// Uniform choice, reproducible under a fixed seed.
    Random,
}

impl Strategy {
    /// Index of the next state to pop from an active list of `len` states.
    pub(crate) fn select(self, len: usize, rng: &mut StdRng) -> usize {
        debug_assert!(len > 0);
        match self {
            Strategy::Bfs => 0,
            Strategy::Dfs => len - 1,
            Strategy::Random => rng.gen_range(0..len),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Bfs => write!(f, "bfs"),
            Strategy::Dfs => write!(f, "dfs"),
            Strategy::Random => write!(f, "random"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(Strategy::Bfs),
            "dfs" => Ok(Strategy::Dfs),
            "random" => Ok(Strategy::Random),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn selection_order() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Strategy::Bfs.select(5, &mut rng), 0);
        assert_eq!(Strategy::Dfs.select(5, &mut rng), 4);
        let picked = Strategy::Random.select(5, &mut rng);
        assert!(picked < 5);
    }

    #[test]
    fn random_is_reproducible_under_a_seed() {
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..16)
                .map(|_| Strategy::Random.select(100, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(7), picks(7));
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("BFS".parse::<Strategy>().unwrap(), Strategy::Bfs);
        assert_eq!("dfs".parse::<Strategy>().unwrap(), Strategy::Dfs);
        assert!("hill-climb".parse::<Strategy>().is_err());
    }
}
