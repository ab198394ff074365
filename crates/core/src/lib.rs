//! Budget model and bounded priority containers for the nous attention
//! scheduler.

pub mod bag;
pub mod budget;
pub mod cache;
pub mod error;
pub mod item;
pub mod queue;

pub use bag::{Bag, CurveBag, DelayBag, DelayCurve, PutResult, SelectionCurve, Strategy};
pub use budget::{
    identity_hash, ActivationMode, Budget, Forgetting, Rank, DEFAULT_ACTIVATION_EPSILON,
    DEFAULT_DECAY_RATE,
};
pub use cache::SubConceptCache;
pub use error::NousError;
pub use item::{Entry, Item};
pub use queue::TaskQueue;
