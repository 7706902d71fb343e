pub mod lexical;
mod ranker;

pub use ranker::{rank, RankWeights};
